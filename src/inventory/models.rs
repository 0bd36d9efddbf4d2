pub mod hardware;
pub mod machine;
pub mod peripherals;
pub mod snapshot;

pub use hardware::{CpuRecord, DiskRecord, MemoryRecord, NetworkAdapterRecord};
pub use machine::{MachineIdentity, NaturalKey};
pub use peripherals::{CardReaderRecord, MonitorRecord, PrinterRecord, ScannerRecord};
pub use snapshot::{CategoryFailure, MachineSnapshot};
