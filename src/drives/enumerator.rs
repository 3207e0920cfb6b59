use super::classifier::DeviceClassifier;
use super::identity::{
    ata::AtaIdentityProbe, nvme::NvmeIdentityProbe, Identity, IdentityProbe, ProbeError,
};
use crate::config::RegistryConfig;
use crate::sysfs::SysfsReader;
use crate::{Device, DeviceType, RegistryError, RegistryResult, SYSFS_SECTOR_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walks the block-device namespace and builds one [`Device`] per entry.
///
/// Enumeration is best-effort per device: a failed identity probe leaves the
/// record without identity data but never drops it or aborts the walk.
pub struct DeviceEnumerator {
    sysfs: SysfsReader,
    dev_root: PathBuf,
    ata_probe: Box<dyn IdentityProbe>,
    nvme_probe: Box<dyn IdentityProbe>,
}

impl DeviceEnumerator {
    /// Enumerator over the real sysfs and `/dev` with the ioctl probes.
    pub fn new(config: &RegistryConfig) -> Self {
        Self::with_probes(
            SysfsReader::new(&config.sysfs_root),
            &config.dev_root,
            Box::new(AtaIdentityProbe::new()),
            Box::new(NvmeIdentityProbe::new()),
        )
    }

    pub fn with_probes(
        sysfs: SysfsReader,
        dev_root: impl Into<PathBuf>,
        ata_probe: Box<dyn IdentityProbe>,
        nvme_probe: Box<dyn IdentityProbe>,
    ) -> Self {
        Self {
            sysfs,
            dev_root: dev_root.into(),
            ata_probe,
            nvme_probe,
        }
    }

    /// Enumerate every block device, in directory order.
    ///
    /// Only a namespace that cannot be listed is an error.
    pub fn enumerate(&self) -> RegistryResult<Vec<Device>> {
        let block_dir = self.sysfs.block_dir();
        let entries = fs::read_dir(&block_dir).map_err(|source| {
            RegistryError::NamespaceUnreadable {
                path: block_dir.clone(),
                source,
            }
        })?;

        let mut devices = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable block namespace entry");
                    continue;
                }
            };
            let device_name = entry.file_name();
            let device_name = device_name.to_string_lossy();

            if Self::should_skip_device(&device_name) {
                continue;
            }

            devices.push(self.assemble(&device_name));
        }

        debug!(count = devices.len(), "Block device enumeration finished");
        Ok(devices)
    }

    /// Enumerate a single device by short name (`sda`) or node path (`/dev/sda`).
    pub fn enumerate_one(&self, device: &str) -> RegistryResult<Device> {
        let device_name = Path::new(device)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RegistryError::DeviceNotFound(device.to_string()))?;

        if !self.sysfs.block_device_dir(device_name).exists() {
            return Err(RegistryError::DeviceNotFound(device.to_string()));
        }

        Ok(self.assemble(device_name))
    }

    /// Virtual devices are excluded.
    pub(crate) fn should_skip_device(device_name: &str) -> bool {
        device_name.starts_with('.')
            || device_name.starts_with("loop")
            || device_name.starts_with("ram")
    }

    fn assemble(&self, device_name: &str) -> Device {
        let device_path = self.dev_root.join(device_name);
        let device_type = DeviceClassifier::new(&self.sysfs).classify(device_name);

        let total_bytes = self
            .sysfs
            .read_block_u64(device_name, "size")
            .map(|sectors| sectors.saturating_mul(SYSFS_SECTOR_SIZE))
            .unwrap_or(0);

        let identity = match self.probe(device_type, &device_path) {
            Ok(identity) => Some(identity),
            Err(ProbeError::Unsupported(_)) => None,
            Err(e) => {
                debug!(device = %device_path.display(), error = %e, "Identity probe failed");
                None
            }
        };

        Device::assemble(
            device_name,
            device_path.to_string_lossy().into_owned(),
            device_type,
            total_bytes,
            identity,
        )
    }

    /// Run the probe selected by the device type.
    pub fn probe(
        &self,
        device_type: DeviceType,
        device_path: &Path,
    ) -> Result<Identity, ProbeError> {
        match device_type {
            DeviceType::Nvme => self.nvme_probe.probe(device_path),
            DeviceType::Ata => self.ata_probe.probe(device_path),
            DeviceType::Scsi | DeviceType::Unknown => Err(ProbeError::Unsupported(device_type)),
        }
    }
}
