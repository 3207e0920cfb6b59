use crate::config::RegistryConfig;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// Columns requested from `df`; the order matters to [`super::usage`].
pub const DF_USAGE_ARGS: &[&str] = &["-B1", "--output=source,size,used,avail,pcent,target"];

/// Full topology listing, including the model column.
pub const LSBLK_TOPOLOGY_ARGS: &[&str] = &[
    "-b",
    "-o",
    "NAME,SIZE,MOUNTPOINT,TYPE,FSTYPE,MODEL",
    "--noheadings",
];

/// Cheaper listing used only to detect change between ticks.
pub const LSBLK_SNAPSHOT_ARGS: &[&str] = &[
    "-b",
    "-o",
    "NAME,SIZE,MOUNTPOINT,TYPE,FSTYPE",
    "--noheadings",
];

/// Runs an external program and hands back its stdout.
///
/// `None` means the tool is unavailable: it could not be spawned, or it
/// failed without printing anything. Callers treat that as an empty table.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = match Command::new(program).args(args).output() {
            Ok(output) => output,
            Err(e) => {
                warn!(program, error = %e, "External command unavailable");
                return None;
            }
        };

        if !output.status.success() {
            if output.stdout.is_empty() {
                warn!(program, status = %output.status, "External command failed");
                return None;
            }
            // df exits non-zero when a single mount is unreadable but still
            // prints every other row.
            debug!(program, status = %output.status, "Keeping partial output");
        }

        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// The two table-producing tools, bound to a runner.
#[derive(Clone)]
pub struct ExternalTools {
    runner: Arc<dyn CommandRunner>,
    lsblk_program: String,
    df_program: String,
}

impl ExternalTools {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        lsblk_program: impl Into<String>,
        df_program: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            lsblk_program: lsblk_program.into(),
            df_program: df_program.into(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            Arc::new(SystemCommandRunner),
            &config.lsblk_program,
            &config.df_program,
        )
    }

    /// Usage table with the header line removed.
    pub fn usage_output(&self) -> String {
        self.runner
            .run(&self.df_program, DF_USAGE_ARGS)
            .map(|text| strip_header(&text).to_string())
            .unwrap_or_default()
    }

    pub fn topology_output(&self) -> String {
        self.runner
            .run(&self.lsblk_program, LSBLK_TOPOLOGY_ARGS)
            .unwrap_or_default()
    }

    /// Topology (without models) followed by usage, compared verbatim
    /// between monitor ticks.
    pub fn snapshot(&self) -> String {
        let mut snapshot = self
            .runner
            .run(&self.lsblk_program, LSBLK_SNAPSHOT_ARGS)
            .unwrap_or_default();
        snapshot.push_str(&self.usage_output());
        snapshot
    }
}

fn strip_header(text: &str) -> &str {
    match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_header() {
        assert_eq!(strip_header("Filesystem 1B-blocks\n/dev/sda1 10\n"), "/dev/sda1 10\n");
        assert_eq!(strip_header("Filesystem 1B-blocks"), "");
        assert_eq!(strip_header(""), "");
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let runner = SystemCommandRunner;
        assert!(runner
            .run("/nonexistent/bin/swipe-registry-no-such-tool", &[])
            .is_none());
    }

    #[test]
    fn test_unavailable_tools_yield_empty_tables() {
        let tools = ExternalTools::new(
            Arc::new(SystemCommandRunner),
            "/nonexistent/bin/lsblk",
            "/nonexistent/bin/df",
        );
        assert_eq!(tools.usage_output(), "");
        assert_eq!(tools.topology_output(), "");
        assert_eq!(tools.snapshot(), "");
    }
}
