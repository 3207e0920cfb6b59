// Block device discovery
//
// Organized structure:
// - classifier.rs: sysfs type code / name heuristic -> DeviceType
// - identity/: ATA and NVMe identity probes (ioctl + binary decoding)
// - enumerator.rs: walks /sys/block and assembles Device records

pub mod classifier;
pub mod enumerator;
pub mod identity;



pub use classifier::DeviceClassifier;
pub use enumerator::DeviceEnumerator;
pub use identity::{
    ata::{AtaIdentity, AtaIdentityProbe, AtaSecurityStatus},
    nvme::{NvmeIdentity, NvmeIdentityProbe, SanitizeCapabilities},
    Identity, IdentityProbe, ProbeError,
};
