/// Fake sysfs and /dev trees in a temporary directory
///
/// Device nodes are plain files, so the real probes open them fine and
/// then fail on the identify ioctl, which is exactly the per-device
/// failure path the enumerator must survive.

use std::fs;
use std::path::{Path, PathBuf};
use swipe_registry::RegistryConfig;
use tempfile::TempDir;

pub struct MockSysfs {
    dir: TempDir,
}

impl MockSysfs {
    pub fn new() -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("sys/block"))?;
        fs::create_dir_all(dir.path().join("dev"))?;
        Ok(Self { dir })
    }

    pub fn sys_root(&self) -> PathBuf {
        self.dir.path().join("sys")
    }

    pub fn dev_root(&self) -> PathBuf {
        self.dir.path().join("dev")
    }

    /// Add `/sys/block/<name>` with a sector count, an optional SCSI
    /// peripheral type code, and a matching node under `/dev`.
    pub fn add_device(
        &self,
        name: &str,
        sectors: u64,
        type_code: Option<u8>,
    ) -> std::io::Result<&Self> {
        let device_dir = self.sys_root().join("block").join(name);
        fs::create_dir_all(device_dir.join("device"))?;
        fs::write(device_dir.join("size"), format!("{}\n", sectors))?;

        if let Some(code) = type_code {
            fs::write(device_dir.join("device/type"), format!("{}\n", code))?;
        }

        fs::write(self.dev_root().join(name), b"")?;
        Ok(self)
    }

    /// Add an entry with no attributes at all
    pub fn add_bare_entry(&self, name: &str) -> std::io::Result<&Self> {
        fs::create_dir_all(self.sys_root().join("block").join(name))?;
        Ok(self)
    }

    pub fn config(&self) -> RegistryConfig {
        RegistryConfig {
            sysfs_root: self.sys_root(),
            dev_root: self.dev_root(),
            ..RegistryConfig::default()
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
