use serde::{Deserialize, Serialize};

use crate::inventory::DeviceCategory;

use super::{
    CardReaderRecord, CpuRecord, DiskRecord, MachineIdentity, MemoryRecord, MonitorRecord,
    NetworkAdapterRecord, PrinterRecord, ScannerRecord,
};

/// A category whose backend gave nothing this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFailure {
    pub category: DeviceCategory,
    pub reason: String,
}

/// One point-in-time capture of a machine and everything attached to it.
///
/// Child collections carry no ordering meaning. Persisting a snapshot
/// replaces whatever was stored for the machine before.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub machine: MachineIdentity,
    pub monitors: Vec<MonitorRecord>,
    pub printers: Vec<PrinterRecord>,
    pub scanners: Vec<ScannerRecord>,
    pub card_readers: Vec<CardReaderRecord>,
    pub cpus: Vec<CpuRecord>,
    pub memory: Option<MemoryRecord>,
    pub disks: Vec<DiskRecord>,
    pub network_adapters: Vec<NetworkAdapterRecord>,
    // unix seconds
    pub collected_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CategoryFailure>,
}

impl MachineSnapshot {
    pub fn new(machine: MachineIdentity) -> Self {
        Self {
            machine,
            collected_at: chrono::Utc::now().timestamp(),
            ..Self::default()
        }
    }

    /// Indented JSON for console display. Not a stable format.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
