/// ATA IDENTIFY DEVICE probe
///
/// Issues `HDIO_GET_IDENTITY` and decodes the 256-word response. Word numbers
/// below follow the ATA/ATAPI command set; every word is little-endian.
use super::{trim_ascii_field, Identity, IdentityProbe, ProbeError};
use crate::Geometry;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Size of the IDENTIFY DEVICE response (`struct hd_driveid`).
pub const ATA_IDENTIFY_LEN: usize = 512;

// linux/hdreg.h
#[cfg(target_os = "linux")]
const HDIO_GET_IDENTITY: libc::c_ulong = 0x030d;

const WORD_SERIAL: usize = 10;
const SERIAL_WORDS: usize = 10;
const WORD_FIRMWARE: usize = 23;
const FIRMWARE_WORDS: usize = 4;
const WORD_MODEL: usize = 27;
const MODEL_WORDS: usize = 20;
const WORD_CAPABILITIES: usize = 49;
const WORD_LBA28_SECTORS: usize = 60;
const WORD_COMMAND_SET_2: usize = 83;
const WORD_ENHANCED_ERASE_TIME: usize = 90;
const WORD_LBA48_SECTORS: usize = 100;
const WORD_SECTOR_SIZE: usize = 106;
const WORD_LOGICAL_SECTOR_SIZE: usize = 117;
// Security status lives in word 128. Word 83 is the command set word and
// carries no lock or freeze state.
const WORD_SECURITY_STATUS: usize = 128;

/// The five security flags carried in bits 1..=5 of the status word.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtaSecurityStatus {
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
}

impl AtaSecurityStatus {
    /// Bit 0 and bits 6..=15 are not interpreted.
    pub fn from_word(word: u16) -> Self {
        Self {
            supported: word & 0x0002 != 0,
            enabled: word & 0x0004 != 0,
            locked: word & 0x0008 != 0,
            frozen: word & 0x0010 != 0,
            enhanced_erase_supported: word & 0x0020 != 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtaIdentity {
    pub model_name: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub dma_support: bool,
    /// 0 when the drive does not report an estimate.
    pub enhanced_security_erase_time_minutes: u32,
    pub geometry: Geometry,
    pub security: AtaSecurityStatus,
}

impl AtaIdentity {
    pub fn decode(raw: &[u8; ATA_IDENTIFY_LEN]) -> Self {
        Self {
            model_name: decode_ata_string(word_range(raw, WORD_MODEL, MODEL_WORDS)),
            serial_number: decode_ata_string(word_range(raw, WORD_SERIAL, SERIAL_WORDS)),
            firmware_revision: decode_ata_string(word_range(raw, WORD_FIRMWARE, FIRMWARE_WORDS)),
            dma_support: word(raw, WORD_CAPABILITIES) & (1 << 8) != 0,
            enhanced_security_erase_time_minutes: enhanced_erase_minutes(word(
                raw,
                WORD_ENHANCED_ERASE_TIME,
            )),
            geometry: decode_geometry(raw),
            security: AtaSecurityStatus::from_word(word(raw, WORD_SECURITY_STATUS)),
        }
    }
}

fn word(raw: &[u8; ATA_IDENTIFY_LEN], index: usize) -> u16 {
    u16::from_le_bytes([raw[index * 2], raw[index * 2 + 1]])
}

fn word_range(raw: &[u8; ATA_IDENTIFY_LEN], first: usize, count: usize) -> &[u8] {
    &raw[first * 2..(first + count) * 2]
}

/// Decode a word-swapped ATA string: in each little-endian word the high
/// byte is the earlier character.
pub fn decode_ata_string(raw: &[u8]) -> String {
    let mut swapped = Vec::with_capacity(raw.len());
    for pair in raw.chunks_exact(2) {
        swapped.push(pair[1]);
        swapped.push(pair[0]);
    }
    trim_ascii_field(&swapped)
}

/// Inverse of [`decode_ata_string`], space-padded to `words` words. Longer
/// input is truncated. Used to build synthetic IDENTIFY buffers.
pub fn encode_ata_string(text: &str, words: usize) -> Vec<u8> {
    let mut padded: Vec<u8> = text.bytes().take(words * 2).collect();
    padded.resize(words * 2, b' ');
    for pair in padded.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    padded
}

/// Word 90: bit 15 selects the extended (15-bit) format, otherwise only bits
/// 0..=7 are valid. Units are 2 minutes.
fn enhanced_erase_minutes(raw: u16) -> u32 {
    let units = if raw & 0x8000 != 0 {
        raw & 0x7fff
    } else {
        raw & 0x00ff
    };
    u32::from(units) * 2
}

fn decode_geometry(raw: &[u8; ATA_IDENTIFY_LEN]) -> Geometry {
    let mut geometry = Geometry {
        logical_sector_size: 0,
        physical_sector_size: 0,
        user_addressable_sectors: 0,
    };

    // Word 106 is only meaningful when bit 14 is set and bit 15 clear.
    let sector_info = word(raw, WORD_SECTOR_SIZE);
    if sector_info & 0xc000 == 0x4000 {
        let mut logical = 512u32;
        if sector_info & (1 << 12) != 0 {
            // Words 117..=118 count 16-bit words, not bytes.
            let words = u32::from(word(raw, WORD_LOGICAL_SECTOR_SIZE))
                | (u32::from(word(raw, WORD_LOGICAL_SECTOR_SIZE + 1)) << 16);
            if let Some(bytes) = words.checked_mul(2).filter(|&bytes| bytes > 0) {
                logical = bytes;
            }
        }
        geometry.logical_sector_size = logical;
        geometry.physical_sector_size = if sector_info & (1 << 13) != 0 {
            let exponent = u32::from(sector_info & 0x000f);
            u32::try_from(u64::from(logical) << exponent).unwrap_or(logical)
        } else {
            logical
        };
    }

    let lba48 = word(raw, WORD_COMMAND_SET_2) & (1 << 10) != 0;
    geometry.user_addressable_sectors = if lba48 {
        (0..4).fold(0u64, |acc, i| {
            acc | (u64::from(word(raw, WORD_LBA48_SECTORS + i)) << (16 * i))
        })
    } else {
        u64::from(word(raw, WORD_LBA28_SECTORS))
            | (u64::from(word(raw, WORD_LBA28_SECTORS + 1)) << 16)
    };

    geometry
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AtaIdentityProbe;

impl AtaIdentityProbe {
    pub fn new() -> Self {
        Self
    }

    /// Raw IDENTIFY DEVICE data for `device_path`.
    pub fn read_identify(device_path: &Path) -> Result<[u8; ATA_IDENTIFY_LEN], ProbeError> {
        let file = open_nonblocking(device_path).map_err(|source| ProbeError::DeviceOpenFailed {
            path: device_path.to_path_buf(),
            source,
        })?;

        let mut raw = [0u8; ATA_IDENTIFY_LEN];
        hdio_get_identity(&file, &mut raw).map_err(|source| {
            ProbeError::IdentifyCommandFailed {
                path: device_path.to_path_buf(),
                source,
            }
        })?;
        Ok(raw)
    }
}

impl IdentityProbe for AtaIdentityProbe {
    fn probe(&self, device_path: &Path) -> Result<Identity, ProbeError> {
        let raw = Self::read_identify(device_path)?;
        Ok(Identity::Ata(AtaIdentity::decode(&raw)))
    }
}

#[cfg(unix)]
fn open_nonblocking(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_nonblocking(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).open(path)
}

#[cfg(target_os = "linux")]
fn hdio_get_identity(file: &File, raw: &mut [u8; ATA_IDENTIFY_LEN]) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: HDIO_GET_IDENTITY copies exactly sizeof(struct hd_driveid) = 512
    // bytes into the buffer, which lives for the whole call.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), HDIO_GET_IDENTITY as _, raw.as_mut_ptr()) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
fn hdio_get_identity(_file: &File, _raw: &mut [u8; ATA_IDENTIFY_LEN]) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set_word(raw: &mut [u8; ATA_IDENTIFY_LEN], index: usize, value: u16) {
        raw[index * 2..index * 2 + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_string(raw: &mut [u8; ATA_IDENTIFY_LEN], first: usize, words: usize, text: &str) {
        raw[first * 2..(first + words) * 2].copy_from_slice(&encode_ata_string(text, words));
    }

    fn sample_identify() -> [u8; ATA_IDENTIFY_LEN] {
        let mut raw = [0u8; ATA_IDENTIFY_LEN];
        put_string(&mut raw, WORD_SERIAL, SERIAL_WORDS, "S3Z9NB0K123456");
        put_string(&mut raw, WORD_FIRMWARE, FIRMWARE_WORDS, "RVT04B6Q");
        put_string(&mut raw, WORD_MODEL, MODEL_WORDS, "Samsung SSD 860 EVO 500GB");
        raw
    }

    #[test]
    fn test_decode_ata_string_word_swapped() {
        // "ST" stored as the word 0x5354, i.e. bytes [0x54, 0x53]
        assert_eq!(decode_ata_string(&[b'T', b'S', b'0', b'1']), "ST10");
    }

    #[test]
    fn test_decode_ata_string_trims_trailing_spaces() {
        assert_eq!(decode_ata_string(&[b'B', b'A', b' ', b'C', b' ', b' ']), "AB C");
    }

    #[test]
    fn test_decode_ata_string_odd_tail_ignored() {
        assert_eq!(decode_ata_string(&[b'B', b'A', b'Z']), "AB");
    }

    #[test]
    fn test_decode_identity_strings() {
        let identity = AtaIdentity::decode(&sample_identify());

        assert_eq!(identity.model_name, "Samsung SSD 860 EVO 500GB");
        assert_eq!(identity.serial_number, "S3Z9NB0K123456");
        assert_eq!(identity.firmware_revision, "RVT04B6Q");
    }

    #[test]
    fn test_security_bits_individually() {
        let expectations: [(u16, AtaSecurityStatus); 5] = [
            (
                1 << 1,
                AtaSecurityStatus { supported: true, ..Default::default() },
            ),
            (
                1 << 2,
                AtaSecurityStatus { enabled: true, ..Default::default() },
            ),
            (
                1 << 3,
                AtaSecurityStatus { locked: true, ..Default::default() },
            ),
            (
                1 << 4,
                AtaSecurityStatus { frozen: true, ..Default::default() },
            ),
            (
                1 << 5,
                AtaSecurityStatus { enhanced_erase_supported: true, ..Default::default() },
            ),
        ];

        for (word, expected) in expectations {
            assert_eq!(AtaSecurityStatus::from_word(word), expected, "word {:#06x}", word);
        }
    }

    #[test]
    fn test_security_ignores_bit0_and_high_bits() {
        assert_eq!(AtaSecurityStatus::from_word(0x0001), AtaSecurityStatus::default());
        assert_eq!(AtaSecurityStatus::from_word(0xffc1), AtaSecurityStatus::default());
    }

    #[test]
    fn test_security_read_from_status_word() {
        let mut raw = sample_identify();
        set_word(&mut raw, WORD_SECURITY_STATUS, 0x0012);

        let identity = AtaIdentity::decode(&raw);
        assert!(identity.security.supported);
        assert!(identity.security.frozen);
        assert!(!identity.security.enabled);
    }

    #[test]
    fn test_dma_and_erase_time() {
        let mut raw = sample_identify();
        assert!(!AtaIdentity::decode(&raw).dma_support);
        assert_eq!(AtaIdentity::decode(&raw).enhanced_security_erase_time_minutes, 0);

        set_word(&mut raw, WORD_CAPABILITIES, 1 << 8);
        set_word(&mut raw, WORD_ENHANCED_ERASE_TIME, 0x8000 | 300);
        let identity = AtaIdentity::decode(&raw);
        assert!(identity.dma_support);
        assert_eq!(identity.enhanced_security_erase_time_minutes, 600);

        // Legacy format: only the low byte counts
        set_word(&mut raw, WORD_ENHANCED_ERASE_TIME, 0x7f05);
        assert_eq!(AtaIdentity::decode(&raw).enhanced_security_erase_time_minutes, 10);
    }

    #[test]
    fn test_geometry_lba48_with_4k_physical() {
        let mut raw = sample_identify();
        set_word(&mut raw, WORD_COMMAND_SET_2, 1 << 10);
        // 976773168 sectors
        set_word(&mut raw, WORD_LBA48_SECTORS, 0x6030);
        set_word(&mut raw, WORD_LBA48_SECTORS + 1, 0x3a38);
        // valid, 8 logical per physical
        set_word(&mut raw, WORD_SECTOR_SIZE, 0x4000 | (1 << 13) | 3);

        let geometry = AtaIdentity::decode(&raw).geometry;
        assert_eq!(geometry.user_addressable_sectors, 976_773_168);
        assert_eq!(geometry.logical_sector_size, 512);
        assert_eq!(geometry.physical_sector_size, 4096);
    }

    #[test]
    fn test_geometry_long_logical_sectors() {
        let mut raw = sample_identify();
        set_word(&mut raw, WORD_SECTOR_SIZE, 0x4000 | (1 << 12));
        set_word(&mut raw, WORD_LOGICAL_SECTOR_SIZE, 2048);

        let geometry = AtaIdentity::decode(&raw).geometry;
        assert_eq!(geometry.logical_sector_size, 4096);
        assert_eq!(geometry.physical_sector_size, 4096);
    }

    #[test]
    fn test_geometry_oversized_logical_words_fall_back_to_512() {
        let mut raw = sample_identify();
        set_word(&mut raw, WORD_SECTOR_SIZE, 0x4000 | (1 << 12));
        set_word(&mut raw, WORD_LOGICAL_SECTOR_SIZE, 0xffff);
        set_word(&mut raw, WORD_LOGICAL_SECTOR_SIZE + 1, 0xffff);

        let geometry = AtaIdentity::decode(&raw).geometry;
        assert_eq!(geometry.logical_sector_size, 512);
        assert_eq!(geometry.physical_sector_size, 512);
    }

    #[test]
    fn test_geometry_physical_shift_past_u32_keeps_logical() {
        let mut raw = sample_identify();
        set_word(&mut raw, WORD_SECTOR_SIZE, 0x4000 | (1 << 13) | (1 << 12) | 0x000f);
        // 0x4000_0000 words = 0x8000_0000 bytes
        set_word(&mut raw, WORD_LOGICAL_SECTOR_SIZE + 1, 0x4000);

        let geometry = AtaIdentity::decode(&raw).geometry;
        assert_eq!(geometry.logical_sector_size, 0x8000_0000);
        assert_eq!(geometry.physical_sector_size, 0x8000_0000);
    }

    #[test]
    fn test_geometry_invalid_sector_word_reports_nothing() {
        let mut raw = sample_identify();
        set_word(&mut raw, WORD_SECTOR_SIZE, 0xc000 | (1 << 13) | 3);
        set_word(&mut raw, WORD_LBA28_SECTORS, 0x1000);

        let geometry = AtaIdentity::decode(&raw).geometry;
        assert_eq!(geometry.logical_sector_size, 0);
        assert_eq!(geometry.physical_sector_size, 0);
        assert_eq!(geometry.user_addressable_sectors, 0x1000);
    }

    #[test]
    fn test_probe_missing_device_is_open_failure() {
        let result = AtaIdentityProbe::new().probe(Path::new("/dev/does-not-exist-sd"));
        assert!(matches!(result, Err(ProbeError::DeviceOpenFailed { .. })));
    }

    #[test]
    fn test_probe_regular_file_is_command_failure() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        let result = AtaIdentityProbe::new().probe(file.path());
        assert!(matches!(result, Err(ProbeError::IdentifyCommandFailed { .. })));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(text in "[!-~]([ -~]{0,38}[!-~])?") {
            prop_assert_eq!(decode_ata_string(&encode_ata_string(&text, 20)), text);
        }

        #[test]
        fn prop_decode_matches_manual_swap(
            bytes in proptest::collection::vec(b'!'..=b'~', 0..20usize)
        ) {
            let mut raw = bytes.clone();
            if raw.len() % 2 == 1 {
                raw.pop();
            }
            let expected: String = raw
                .chunks_exact(2)
                .flat_map(|pair| [pair[1] as char, pair[0] as char])
                .collect();
            prop_assert_eq!(decode_ata_string(&raw), expected);
        }
    }
}
