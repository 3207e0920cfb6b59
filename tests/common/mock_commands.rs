/// Mock command execution infrastructure for testing
///
/// Stands in for `lsblk` and `df` so the table and monitor paths can run
/// without touching the host's real devices.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use swipe_registry::table::CommandRunner;

/// Mock command output
#[derive(Clone, Debug)]
pub struct MockCommandOutput {
    pub stdout: String,
    pub success: bool,
}

impl MockCommandOutput {
    pub fn success(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            success: true,
        }
    }

    /// Tool ran but failed without printing anything
    #[allow(dead_code)]
    pub fn failure() -> Self {
        Self {
            stdout: String::new(),
            success: false,
        }
    }
}

/// Mock command registry, keyed by program name
///
/// Clones share the same table, so a test can keep one handle and swap
/// outputs while a monitor owns the other.
#[derive(Clone, Default)]
pub struct MockCommandRegistry {
    commands: Arc<Mutex<HashMap<String, MockCommandOutput>>>,
    invocations: Arc<Mutex<Vec<String>>>,
}

impl MockCommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mock command response
    pub fn register(&self, program: &str, output: MockCommandOutput) {
        self.commands
            .lock()
            .unwrap()
            .insert(program.to_string(), output);
    }

    /// Every `program args...` line run so far
    #[allow(dead_code)]
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }

    /// Clear all registered commands
    #[allow(dead_code)]
    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}

impl CommandRunner for MockCommandRegistry {
    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        self.invocations
            .lock()
            .unwrap()
            .push(format!("{} {}", program, args.join(" ")));

        let output = self.commands.lock().unwrap().get(program).cloned()?;
        if !output.success && output.stdout.is_empty() {
            return None;
        }

        Some(output.stdout)
    }
}

/// Mock lsblk output
pub struct MockLsblkData;

impl MockLsblkData {
    /// A SATA SSD with an EFI and a root partition
    pub fn sata_workstation() -> String {
        "\
sda      500107862016            disk                Samsung SSD 860 EVO 500GB
├─sda1      536870912 /boot/efi  part vfat
└─sda2   499569926144 /          part ext4
"
        .to_string()
    }

    /// The single-row topology from the registry contract
    pub fn single_mounted_disk() -> String {
        "sda 500000000000 /mnt ext4 disk SSD Model\n".to_string()
    }
}

/// Mock df output, header included as the real tool prints it
pub struct MockDfData;

impl MockDfData {
    pub fn header() -> &'static str {
        "Filesystem        1B-blocks         Used        Avail Use% Mounted on\n"
    }

    pub fn rows(rows: &[(&str, u64, u64, u64, &str)]) -> String {
        let mut text = Self::header().to_string();
        for (source, used, avail, pcent, target) in rows {
            text.push_str(&format!(
                "{} {} {} {} {}% {}\n",
                source,
                used + avail,
                used,
                avail,
                pcent,
                target
            ));
        }
        text
    }

    pub fn sata_workstation() -> String {
        Self::rows(&[
            ("/dev/sda1", 6_422_528, 530_448_384, 2, "/boot/efi"),
            ("/dev/sda2", 124_892_481_536, 374_677_444_608, 25, "/"),
            ("tmpfs", 0, 8_326_242_304, 0, "/dev/shm"),
        ])
    }

    pub fn single_mounted_disk() -> String {
        Self::rows(&[("/dev/sda", 100_000_000_000, 400_000_000_000, 20, "/mnt")])
    }
}
