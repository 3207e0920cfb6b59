/// Runtime configuration
///
/// Layered, lowest priority first: built-in defaults, the per-user file
/// `$XDG_CONFIG_HOME/swipe-registry/config.toml`, an explicit file passed
/// on the command line, then `SWIPE_REGISTRY_*` environment variables.
use crate::RegistryResult;
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "SWIPE_REGISTRY";

/// Default monitor poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Mount point of sysfs; tests point this at a fake tree
    pub sysfs_root: PathBuf,

    /// Directory holding device nodes
    pub dev_root: PathBuf,

    /// Sleep between monitor ticks, e.g. "500ms" or "2s"
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,

    pub lsblk_program: String,
    pub df_program: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys"),
            dev_root: PathBuf::from("/dev"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            lsblk_program: "lsblk".to_string(),
            df_program: "df".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Load every layer. `explicit` must exist if given; the per-user file
    /// is optional.
    pub fn load(explicit: Option<&Path>) -> RegistryResult<Self> {
        Self::load_layers(Self::user_config_file(), explicit)
    }

    /// `$XDG_CONFIG_HOME/swipe-registry/config.toml`, if a home directory
    /// can be determined.
    pub fn user_config_file() -> Option<PathBuf> {
        ProjectDirs::from("org", "swipe", "swipe-registry")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub(crate) fn load_layers(
        user_file: Option<PathBuf>,
        explicit: Option<&Path>,
    ) -> RegistryResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = user_file {
            debug!(path = %path.display(), "Looking for user configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        if let Some(path) = explicit {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Durations as humantime strings ("500ms", "1m 30s").
mod duration_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(de::Error::custom)
    }
}
