pub mod assembler;
pub mod models;
pub mod normalize;
pub mod source;

pub use assembler::SnapshotAssembler;
pub use models::{
    CardReaderRecord, CategoryFailure, CpuRecord, DiskRecord, MachineIdentity, MachineSnapshot,
    MemoryRecord, MonitorRecord, NetworkAdapterRecord, PrinterRecord, ScannerRecord,
};
pub use source::{DeviceCategory, DeviceSource, LocalSource, RawRecord};
