// Identity probes: one ioctl per protocol family, plus decoding of the
// fixed-layout response buffers.

pub mod ata;
pub mod nvme;

use crate::{DeviceType, Geometry, SecurityInfo};
use ata::AtaIdentity;
use nvme::NvmeIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to open device {path}: {source}")]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Identify command failed on {path}: {source}")]
    IdentifyCommandFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No identity probe for {0} devices")]
    Unsupported(DeviceType),
}

/// Decoded identity data, shaped by the protocol that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Identity {
    #[serde(rename = "ataIdentity")]
    Ata(AtaIdentity),
    #[serde(rename = "nvmeIdentity")]
    Nvme(NvmeIdentity),
}

impl Identity {
    pub fn model_name(&self) -> &str {
        match self {
            Identity::Ata(ata) => &ata.model_name,
            Identity::Nvme(nvme) => &nvme.model_name,
        }
    }

    pub fn serial_number(&self) -> &str {
        match self {
            Identity::Ata(ata) => &ata.serial_number,
            Identity::Nvme(nvme) => &nvme.serial_number,
        }
    }

    pub fn firmware_revision(&self) -> &str {
        match self {
            Identity::Ata(ata) => &ata.firmware_revision,
            Identity::Nvme(nvme) => &nvme.firmware_revision,
        }
    }

    /// Security flags and sanitize methods this identity contributes to the
    /// device record.
    pub fn security(&self) -> SecurityInfo {
        match self {
            Identity::Ata(ata) => SecurityInfo {
                supported: ata.security.supported,
                enabled: ata.security.enabled,
                locked: ata.security.locked,
                frozen: ata.security.frozen,
                enhanced_erase_supported: ata.security.enhanced_erase_supported,
                ..SecurityInfo::default()
            },
            Identity::Nvme(nvme) => SecurityInfo {
                supported_sanitization_methods: nvme.supported_sanitization_methods.clone(),
                ..SecurityInfo::default()
            },
        }
    }

    /// Geometry reported by the device itself. Identify Controller carries no
    /// sector sizes (those live in the namespace data), so only ATA reports one.
    pub fn geometry(&self) -> Option<Geometry> {
        match self {
            Identity::Ata(ata) => Some(ata.geometry),
            Identity::Nvme(_) => None,
        }
    }
}

/// A protocol-specific identity probe.
pub trait IdentityProbe: Send + Sync {
    fn probe(&self, device_path: &Path) -> Result<Identity, ProbeError>;
}

/// Fixed-width ASCII field: cut at the first NUL, drop trailing spaces.
pub(crate) fn trim_ascii_field(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
        .trim_end_matches(' ')
        .to_string()
}
