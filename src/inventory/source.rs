use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

mod cups;
mod local;
mod sysfs;

pub use local::LocalSource;

/// One raw attribute bundle as a backend reported it. Only the normalizer
/// looks inside.
pub type RawRecord = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    System,
    Bios,
    OperatingSystem,
    Cpu,
    Memory,
    Disk,
    NetworkAdapter,
    Monitor,
    Printer,
    Scanner,
    CardReader,
}

impl DeviceCategory {
    pub const ALL: [DeviceCategory; 11] = [
        DeviceCategory::System,
        DeviceCategory::Bios,
        DeviceCategory::OperatingSystem,
        DeviceCategory::Cpu,
        DeviceCategory::Memory,
        DeviceCategory::Disk,
        DeviceCategory::NetworkAdapter,
        DeviceCategory::Monitor,
        DeviceCategory::Printer,
        DeviceCategory::Scanner,
        DeviceCategory::CardReader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::System => "system",
            DeviceCategory::Bios => "bios",
            DeviceCategory::OperatingSystem => "operating_system",
            DeviceCategory::Cpu => "cpu",
            DeviceCategory::Memory => "memory",
            DeviceCategory::Disk => "disk",
            DeviceCategory::NetworkAdapter => "network_adapter",
            DeviceCategory::Monitor => "monitor",
            DeviceCategory::Printer => "printer",
            DeviceCategory::Scanner => "scanner",
            DeviceCategory::CardReader => "card_reader",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform backend able to answer device queries.
///
/// Calls may block. Each category is queried on its own and may fail on its
/// own; the assembler runs them off the async executor with a timeout.
pub trait DeviceSource: Send + Sync {
    fn query(&self, category: DeviceCategory) -> Result<Vec<RawRecord>, SourceError>;
}
