// Single-line sysfs attribute access, rooted so tests can point it at a fake tree.

use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Read a one-line attribute file and trim it. Missing or unreadable files
/// yield `None`; callers decide what an absent attribute means.
pub fn read_attribute(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let line = raw.lines().next().unwrap_or("");
    Some(line.trim().to_string())
}

#[derive(Debug, Clone)]
pub struct SysfsReader {
    root: PathBuf,
}

impl SysfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The block-device namespace, `<root>/block`.
    pub fn block_dir(&self) -> PathBuf {
        self.root.join("block")
    }

    pub fn block_device_dir(&self, device_name: &str) -> PathBuf {
        self.block_dir().join(device_name)
    }

    /// Read `<root>/block/<device>/<attribute>`.
    pub fn read_block_attr(&self, device_name: &str, attribute: &str) -> Option<String> {
        read_attribute(&self.block_device_dir(device_name).join(attribute))
    }

    /// Numeric variant of [`read_block_attr`](Self::read_block_attr); an
    /// attribute that does not parse is treated as absent.
    pub fn read_block_u64(&self, device_name: &str, attribute: &str) -> Option<u64> {
        self.read_block_attr(device_name, attribute)?.parse().ok()
    }
}

impl Default for SysfsReader {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}
