use crate::sysfs::SysfsReader;
use crate::DeviceType;

/// SCSI peripheral device type codes found in `device/type`.
const SCSI_TYPE_DIRECT_ACCESS: i32 = 0;
const SCSI_TYPE_CD_DVD: i32 = 5;

/// Guesses a device's protocol family. This is a heuristic: the probe that
/// runs afterwards may still fail without changing the classification.
pub struct DeviceClassifier<'a> {
    sysfs: &'a SysfsReader,
}

impl<'a> DeviceClassifier<'a> {
    pub fn new(sysfs: &'a SysfsReader) -> Self {
        Self { sysfs }
    }

    pub fn classify(&self, device_name: &str) -> DeviceType {
        let type_code = self.sysfs.read_block_attr(device_name, "device/type");
        Self::classify_from(type_code.as_deref(), device_name)
    }

    /// Pure classification rule, split out so it can be tested without sysfs.
    ///
    /// NVMe namespaces have no `device/type`, so only a missing code falls
    /// back to the `nvme` name prefix. A code that is present but not a known
    /// number is `unknown`.
    pub(crate) fn classify_from(type_code: Option<&str>, device_name: &str) -> DeviceType {
        let Some(code) = type_code else {
            return if device_name.starts_with("nvme") {
                DeviceType::Nvme
            } else {
                DeviceType::Unknown
            };
        };

        match code.trim().parse::<i32>() {
            Ok(SCSI_TYPE_DIRECT_ACCESS) => DeviceType::Ata,
            Ok(SCSI_TYPE_CD_DVD) => DeviceType::Scsi,
            _ => DeviceType::Unknown,
        }
    }
}
