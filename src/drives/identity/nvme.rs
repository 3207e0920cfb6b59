/// NVMe Identify Controller probe
///
/// Sends an admin Identify (CNS 01h) through `NVME_IOCTL_ADMIN_CMD` and decodes
/// the 4096-byte controller data structure at its documented byte offsets.
use super::{trim_ascii_field, Identity, IdentityProbe, ProbeError};
use crate::SanitizeMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

pub const NVME_IDENTIFY_LEN: usize = 4096;

const NVME_ADMIN_IDENTIFY: u8 = 0x06;
const NVME_IDENTIFY_CNS_CTRL: u32 = 0x01;

// _IOWR('N', 0x41, struct nvme_admin_cmd)
#[cfg(target_os = "linux")]
const NVME_IOCTL_ADMIN_CMD: libc::c_ulong = 0xC048_4E41;

const OFFSET_VID: usize = 0;
const OFFSET_SN: usize = 4;
const LEN_SN: usize = 20;
const OFFSET_MN: usize = 24;
const LEN_MN: usize = 40;
const OFFSET_FR: usize = 64;
const LEN_FR: usize = 8;
const OFFSET_CNTLID: usize = 78;
const OFFSET_VER: usize = 80;
const OFFSET_CCTEMP: usize = 268;
const OFFSET_HMPRE: usize = 272;
const OFFSET_SANICAP: usize = 328;

/// `struct nvme_admin_cmd` from linux/nvme_ioctl.h.
#[repr(C)]
#[derive(Debug, Default)]
#[allow(dead_code)]
struct NvmeAdminCmd {
    opcode: u8,
    flags: u8,
    rsvd1: u16,
    nsid: u32,
    cdw2: u32,
    cdw3: u32,
    metadata: u64,
    addr: u64,
    metadata_len: u32,
    data_len: u32,
    cdw10: u32,
    cdw11: u32,
    cdw12: u32,
    cdw13: u32,
    cdw14: u32,
    cdw15: u32,
    timeout_ms: u32,
    result: u32,
}

const _: () = assert!(std::mem::size_of::<NvmeAdminCmd>() == 72);

/// Page-aligned response buffer for the admin command.
#[repr(C, align(4096))]
struct IdentifyBuffer([u8; NVME_IDENTIFY_LEN]);

/// SANICAP bits 0..=2.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeCapabilities {
    pub crypto_erase: bool,
    pub block_erase: bool,
    pub overwrite: bool,
}

impl SanitizeCapabilities {
    pub fn from_sanicap(sanicap: u32) -> Self {
        Self {
            crypto_erase: sanicap & 0x01 != 0,
            block_erase: sanicap & 0x02 != 0,
            overwrite: sanicap & 0x04 != 0,
        }
    }

    /// Block erase and overwrite collapse into one reported method.
    pub fn methods(&self) -> BTreeSet<SanitizeMethod> {
        let mut methods = BTreeSet::new();
        if self.crypto_erase {
            methods.insert(SanitizeMethod::NvmeSanitize);
        }
        if self.block_erase || self.overwrite {
            methods.insert(SanitizeMethod::NvmeFormatNvm);
        }
        methods
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NvmeIdentity {
    pub serial_number: String,
    pub model_name: String,
    pub firmware_revision: String,
    /// PCI vendor id, rendered `0x%04X`.
    pub vendor_id: String,
    pub controller_id: String,
    pub nvme_version: String,
    /// Kelvin; 0 when not reported.
    pub critical_composite_temperature: u16,
    /// In 4 KiB units.
    pub host_memory_buffer_preferred_size: u32,
    pub sanitize_capabilities: SanitizeCapabilities,
    pub supported_sanitization_methods: BTreeSet<SanitizeMethod>,
}

impl NvmeIdentity {
    pub fn decode(raw: &[u8; NVME_IDENTIFY_LEN]) -> Self {
        let sanitize_capabilities = SanitizeCapabilities::from_sanicap(le_u32(raw, OFFSET_SANICAP));

        Self {
            serial_number: trim_ascii_field(&raw[OFFSET_SN..OFFSET_SN + LEN_SN]),
            model_name: trim_ascii_field(&raw[OFFSET_MN..OFFSET_MN + LEN_MN]),
            firmware_revision: trim_ascii_field(&raw[OFFSET_FR..OFFSET_FR + LEN_FR]),
            vendor_id: format!("0x{:04X}", le_u16(raw, OFFSET_VID)),
            controller_id: le_u16(raw, OFFSET_CNTLID).to_string(),
            nvme_version: format_version(le_u32(raw, OFFSET_VER)),
            critical_composite_temperature: le_u16(raw, OFFSET_CCTEMP),
            host_memory_buffer_preferred_size: le_u32(raw, OFFSET_HMPRE),
            supported_sanitization_methods: sanitize_capabilities.methods(),
            sanitize_capabilities,
        }
    }
}

fn le_u16(raw: &[u8; NVME_IDENTIFY_LEN], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn le_u32(raw: &[u8; NVME_IDENTIFY_LEN], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

/// VER: major in bits 31:16, minor in 15:8, tertiary in 7:0. Controllers
/// older than 1.2 leave it zero.
fn format_version(ver: u32) -> String {
    if ver == 0 {
        return "1.0".to_string();
    }
    let major = ver >> 16;
    let minor = (ver >> 8) & 0xff;
    let tertiary = ver & 0xff;
    if tertiary == 0 {
        format!("{}.{}", major, minor)
    } else {
        format!("{}.{}.{}", major, minor, tertiary)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NvmeIdentityProbe;

impl NvmeIdentityProbe {
    pub fn new() -> Self {
        Self
    }

    /// Raw Identify Controller data for `device_path` (controller or namespace node).
    pub fn read_identify(device_path: &Path) -> Result<Box<[u8; NVME_IDENTIFY_LEN]>, ProbeError> {
        let file = OpenOptions::new()
            .read(true)
            .open(device_path)
            .map_err(|source| ProbeError::DeviceOpenFailed {
                path: device_path.to_path_buf(),
                source,
            })?;

        let mut buffer = Box::new(IdentifyBuffer([0u8; NVME_IDENTIFY_LEN]));
        identify_controller(&file, &mut buffer).map_err(|source| {
            ProbeError::IdentifyCommandFailed {
                path: device_path.to_path_buf(),
                source,
            }
        })?;
        Ok(Box::new(buffer.0))
    }
}

impl IdentityProbe for NvmeIdentityProbe {
    fn probe(&self, device_path: &Path) -> Result<Identity, ProbeError> {
        let raw = Self::read_identify(device_path)?;
        Ok(Identity::Nvme(NvmeIdentity::decode(&raw)))
    }
}

#[cfg(target_os = "linux")]
fn identify_controller(file: &File, buffer: &mut IdentifyBuffer) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let mut cmd = NvmeAdminCmd {
        opcode: NVME_ADMIN_IDENTIFY,
        nsid: 0,
        addr: buffer.0.as_mut_ptr() as u64,
        data_len: NVME_IDENTIFY_LEN as u32,
        cdw10: NVME_IDENTIFY_CNS_CTRL,
        ..Default::default()
    };

    // SAFETY: cmd matches the kernel's struct nvme_admin_cmd layout and addr
    // points at a live 4096-byte buffer the controller writes into.
    let ret = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            NVME_IOCTL_ADMIN_CMD as _,
            &mut cmd as *mut NvmeAdminCmd,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    if ret > 0 {
        // Positive values are NVMe status codes from the controller.
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("NVMe status {:#x}", ret),
        ));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn identify_controller(_file: &File, _buffer: &mut IdentifyBuffer) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Not supported on this platform",
    ))
}
