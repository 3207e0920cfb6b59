// Parsing of the external topology and usage listings, and the join that
// turns them into the disk list pushed by the monitor.

pub mod command;
pub mod topology;
pub mod usage;


pub use command::{CommandRunner, ExternalTools, SystemCommandRunner};
pub use topology::{clean_device_name, parse_topology, TopologyRow};
pub use usage::{UsageRow, UsageTable};

use serde::{Deserialize, Serialize};

/// Filesystem usage attached to a disk entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageInfo {
    #[serde(rename = "used")]
    pub used_bytes: u64,
    #[serde(rename = "available")]
    pub available_bytes: u64,
    pub usage_percent: String,
}

impl Default for UsageInfo {
    fn default() -> Self {
        Self {
            used_bytes: 0,
            available_bytes: 0,
            usage_percent: "0%".to_string(),
        }
    }
}

impl From<&UsageRow> for UsageInfo {
    fn from(row: &UsageRow) -> Self {
        Self {
            used_bytes: row.used,
            available_bytes: row.available,
            usage_percent: row.percent.clone(),
        }
    }
}

/// A topology row joined with its usage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiskEntry {
    pub name: String,
    pub size: u64,
    /// Empty when not mounted.
    pub mountpoint: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub fstype: String,
    pub model: String,
    #[serde(flatten)]
    pub usage: UsageInfo,
}

impl DiskEntry {
    pub fn is_mounted(&self) -> bool {
        !self.mountpoint.is_empty()
    }
}

/// Join every topology row with usage, by mountpoint first and then by
/// device name. Unmatched rows get zero usage.
pub fn build_disk_list(topology_text: &str, usage_text: &str) -> Vec<DiskEntry> {
    let usage = UsageTable::parse(usage_text);

    parse_topology(topology_text)
        .into_iter()
        .map(|row| {
            let info = usage
                .lookup(row.mountpoint.as_deref(), &row.name)
                .map(UsageInfo::from)
                .unwrap_or_default();

            DiskEntry {
                name: row.name,
                size: row.size,
                mountpoint: row.mountpoint.unwrap_or_default(),
                kind: row.kind,
                fstype: row.fstype,
                model: row.model,
                usage: info,
            }
        })
        .collect()
}

/// Run both tools once and join their output.
pub fn collect_disks(tools: &ExternalTools) -> Vec<DiskEntry> {
    build_disk_list(&tools.topology_output(), &tools.usage_output())
}
