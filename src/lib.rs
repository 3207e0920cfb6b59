pub mod config;
pub mod drives;
pub mod monitor;
pub mod sysfs;
pub mod table;

// Re-export the main entry points for convenience
pub use config::RegistryConfig;
pub use drives::{
    AtaIdentity, AtaIdentityProbe, DeviceClassifier, DeviceEnumerator, Identity, IdentityProbe,
    NvmeIdentity, NvmeIdentityProbe, ProbeError,
};
pub use monitor::{MonitorState, MonitorUpdate, UsageMonitor};
pub use table::{DiskEntry, UsageInfo};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Sector unit used by the sysfs `size` attribute, regardless of the device's
/// real logical sector size.
pub const SYSFS_SECTOR_SIZE: u64 = 512;

// Error types surfaced by the registry. Per-device probe failures never reach
// this level; they are absorbed by the enumerator.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Block device namespace {path} could not be listed: {source}")]
    NamespaceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Protocol family of a block device, as far as the classifier can tell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeviceType {
    // The desktop side has always keyed ATA/SATA disks on "sata".
    #[serde(rename = "sata", alias = "ata")]
    Ata,
    #[serde(rename = "nvme")]
    Nvme,
    #[serde(rename = "scsi")]
    Scsi,
    #[serde(rename = "unknown")]
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ata => "ata",
            DeviceType::Nvme => "nvme",
            DeviceType::Scsi => "scsi",
            DeviceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub logical_sector_size: u32,
    pub physical_sector_size: u32,
    pub user_addressable_sectors: u64,
}

impl Geometry {
    /// 512-byte logical and physical sectors covering `total_bytes`.
    pub fn for_capacity(total_bytes: u64) -> Self {
        Self {
            logical_sector_size: SYSFS_SECTOR_SIZE as u32,
            physical_sector_size: SYSFS_SECTOR_SIZE as u32,
            user_addressable_sectors: total_bytes / SYSFS_SECTOR_SIZE,
        }
    }

    /// Apply whatever the identity probe reported; zero fields mean "not
    /// reported" and leave the current value in place.
    pub fn overridden_by(self, reported: Geometry) -> Self {
        Self {
            logical_sector_size: non_zero_or(
                reported.logical_sector_size,
                self.logical_sector_size,
            ),
            physical_sector_size: non_zero_or(
                reported.physical_sector_size,
                self.physical_sector_size,
            ),
            user_addressable_sectors: if reported.user_addressable_sectors > 0 {
                reported.user_addressable_sectors
            } else {
                self.user_addressable_sectors
            },
        }
    }
}

fn non_zero_or(value: u32, fallback: u32) -> u32 {
    if value > 0 {
        value
    } else {
        fallback
    }
}

/// Data-destruction methods a device advertises.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SanitizeMethod {
    #[serde(rename = "nvme_sanitize")]
    NvmeSanitize,
    #[serde(rename = "nvme_format_nvm")]
    NvmeFormatNvm,
}

impl SanitizeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanitizeMethod::NvmeSanitize => "nvme_sanitize",
            SanitizeMethod::NvmeFormatNvm => "nvme_format_nvm",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityInfo {
    #[serde(rename = "isSecuritySupported")]
    pub supported: bool,
    #[serde(rename = "isSecurityEnabled")]
    pub enabled: bool,
    #[serde(rename = "isSecurityLocked")]
    pub locked: bool,
    #[serde(rename = "isSecurityFrozen")]
    pub frozen: bool,
    #[serde(rename = "isEnhancedEraseSupported")]
    pub enhanced_erase_supported: bool,
    #[serde(rename = "supportedSanitizationMethods")]
    pub supported_sanitization_methods: BTreeSet<SanitizeMethod>,
}

/// One discovered block device. Built fresh on every enumeration and never
/// modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "devicePath")]
    pub path: String,
    #[serde(rename = "deviceName")]
    pub name: String,
    pub device_type: DeviceType,
    pub total_bytes: u64,
    #[serde(flatten)]
    pub identity: Option<Identity>,
    pub geometry: Geometry,
    pub security: SecurityInfo,
    /// Filled by the partition collaborator, never by this crate.
    pub partitions: Vec<String>,
    pub uuid: String,
    pub model_name: String,
    pub serial_number: String,
}

pub const UNKNOWN_FIELD: &str = "Unknown";

impl Device {
    pub(crate) fn assemble(
        name: &str,
        path: String,
        device_type: DeviceType,
        total_bytes: u64,
        identity: Option<Identity>,
    ) -> Self {
        let mut geometry = Geometry::for_capacity(total_bytes);
        let mut security = SecurityInfo::default();
        let mut model_name = UNKNOWN_FIELD.to_string();
        let mut serial_number = UNKNOWN_FIELD.to_string();

        if let Some(identity) = &identity {
            security = identity.security();
            if let Some(reported) = identity.geometry() {
                geometry = geometry.overridden_by(reported);
            }
            if !identity.model_name().is_empty() {
                model_name = identity.model_name().to_string();
            }
            if !identity.serial_number().is_empty() {
                serial_number = identity.serial_number().to_string();
            }
        }

        Self {
            path,
            name: name.to_string(),
            device_type,
            total_bytes,
            identity,
            geometry,
            security,
            partitions: Vec::new(),
            uuid: String::new(),
            model_name,
            serial_number,
        }
    }

    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }
}
