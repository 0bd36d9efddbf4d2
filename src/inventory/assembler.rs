use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use sysinfo::System;

use crate::config::CollectorConfig;
use crate::error::SourceError;

use super::models::{CategoryFailure, MachineIdentity, MachineSnapshot};
use super::normalize;
use super::source::{DeviceCategory, DeviceSource, RawRecord};

const UNKNOWN_MACHINE_NAME: &str = "unknown";

/// Builds one `MachineSnapshot` per call by querying every category of a
/// `DeviceSource`. A failing category contributes nothing and is noted on
/// the snapshot; it never fails the whole assembly.
pub struct SnapshotAssembler {
    source: Arc<dyn DeviceSource>,
    timeout: Duration,
}

impl SnapshotAssembler {
    pub fn new(source: Arc<dyn DeviceSource>, config: &CollectorConfig) -> Self {
        Self {
            source,
            timeout: config.timeout,
        }
    }

    pub async fn assemble(&self) -> MachineSnapshot {
        let start_time = std::time::Instant::now();

        let (system, bios, os, cpu, memory, disk, network, monitor, printer, scanner, card_reader) = tokio::join!(
            self.collect(DeviceCategory::System),
            self.collect(DeviceCategory::Bios),
            self.collect(DeviceCategory::OperatingSystem),
            self.collect(DeviceCategory::Cpu),
            self.collect(DeviceCategory::Memory),
            self.collect(DeviceCategory::Disk),
            self.collect(DeviceCategory::NetworkAdapter),
            self.collect(DeviceCategory::Monitor),
            self.collect(DeviceCategory::Printer),
            self.collect(DeviceCategory::Scanner),
            self.collect(DeviceCategory::CardReader),
        );

        let mut failures = vec![];
        let mut take = |category: DeviceCategory, result: Result<Vec<RawRecord>, SourceError>| {
            match result {
                Ok(raw) => {
                    debug!("{}: {} raw record(s)", category, raw.len());
                    raw
                }
                Err(e) => {
                    warn!("failed to collect {}: {}", category, e);
                    failures.push(CategoryFailure {
                        category,
                        reason: e.to_string(),
                    });
                    vec![]
                }
            }
        };

        let system = take(DeviceCategory::System, system);
        let bios = take(DeviceCategory::Bios, bios);
        let os = take(DeviceCategory::OperatingSystem, os);
        let cpu = take(DeviceCategory::Cpu, cpu);
        let memory = take(DeviceCategory::Memory, memory);
        let disk = take(DeviceCategory::Disk, disk);
        let network = take(DeviceCategory::NetworkAdapter, network);
        let monitor = take(DeviceCategory::Monitor, monitor);
        let printer = take(DeviceCategory::Printer, printer);
        let scanner = take(DeviceCategory::Scanner, scanner);
        let card_reader = take(DeviceCategory::CardReader, card_reader);

        let mut machine = MachineIdentity::default();
        normalize::apply_system(&mut machine, &system);
        normalize::apply_bios(&mut machine, &bios);
        normalize::apply_operating_system(&mut machine, &os);
        if machine.machine_name.trim().is_empty() {
            machine.machine_name = fallback_machine_name();
        }

        let mut snapshot = MachineSnapshot::new(machine);
        snapshot.cpus = normalize::cpus(&cpu);
        snapshot.memory = normalize::memory(&memory);
        snapshot.disks = normalize::disks(&disk);
        snapshot.network_adapters = normalize::network_adapters(&network);
        snapshot.monitors = normalize::monitors(&monitor);
        snapshot.printers = normalize::printers(&printer);
        snapshot.scanners = normalize::scanners(&scanner);
        snapshot.card_readers = normalize::card_readers(&card_reader);
        snapshot.failures = failures;

        info!(
            "assembled snapshot for {} in {:?}: {} monitor(s), {} printer(s), {} scanner(s), {} card reader(s), {} failed categor(ies)",
            snapshot.machine.machine_name,
            start_time.elapsed(),
            snapshot.monitors.len(),
            snapshot.printers.len(),
            snapshot.scanners.len(),
            snapshot.card_readers.len(),
            snapshot.failures.len()
        );

        snapshot
    }

    async fn collect(&self, category: DeviceCategory) -> Result<Vec<RawRecord>, SourceError> {
        let source = Arc::clone(&self.source);
        let task = tokio::task::spawn_blocking(move || source.query(category));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            // the backend panicked
            Ok(Err(join_err)) => Err(SourceError::query(category, join_err.to_string())),
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        }
    }
}

fn fallback_machine_name() -> String {
    System::host_name()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_MACHINE_NAME.to_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    /// Canned answers per category; anything not listed is unsupported.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub answers: HashMap<DeviceCategory, Vec<RawRecord>>,
        pub failing: Vec<DeviceCategory>,
        pub panicking: Vec<DeviceCategory>,
        pub slow: Vec<DeviceCategory>,
    }

    impl DeviceSource for FakeSource {
        fn query(&self, category: DeviceCategory) -> Result<Vec<RawRecord>, SourceError> {
            if self.panicking.contains(&category) {
                panic!("backend blew up");
            }
            if self.slow.contains(&category) {
                std::thread::sleep(Duration::from_millis(500));
            }
            if self.failing.contains(&category) {
                return Err(SourceError::query(category, "access denied"));
            }
            self.answers
                .get(&category)
                .cloned()
                .ok_or(SourceError::Unsupported(category))
        }
    }

    pub(crate) fn office_source() -> FakeSource {
        let units = |s: &str| s.encode_utf16().collect::<Vec<u16>>();

        let mut answers = HashMap::new();
        answers.insert(
            DeviceCategory::System,
            vec![json!({ "machine_name": "WS-042", "user_name": "somchai", "manufacturer": "HP", "model": "EliteDesk 800 G6" })],
        );
        answers.insert(
            DeviceCategory::Bios,
            vec![json!({ "serial_number": "5CG1234XYZ" })],
        );
        answers.insert(
            DeviceCategory::OperatingSystem,
            vec![json!({ "caption": "Microsoft Windows 11 Pro", "version": "10.0.22631", "architecture": "64-bit" })],
        );
        answers.insert(
            DeviceCategory::Monitor,
            vec![
                json!({ "manufacturer_name": units("DEL"), "user_friendly_name": units("DELL P2419H"), "serial_number_id": units("CN0ABC") }),
                json!({ "manufacturer_name": units("SAM"), "user_friendly_name": units("S24F350"), "serial_number_id": units("H4ZR") }),
            ],
        );
        answers.insert(
            DeviceCategory::Printer,
            vec![json!({ "name": "Office", "driver_name": "HP Universal Printing PCL 6", "network": true, "default": true, "shared": false })],
        );
        answers.insert(
            DeviceCategory::Scanner,
            vec![json!({ "name": "Canon MF240 Series USB Scanner Device", "manufacturer": "Canon" })],
        );
        answers.insert(
            DeviceCategory::CardReader,
            vec![json!({ "name": "Alcor Micro USB Smart Card Reader", "manufacturer": "Alcor Micro" })],
        );
        answers.insert(
            DeviceCategory::Cpu,
            vec![json!({ "name": "Intel(R) Core(TM) i5-10500", "cores": 6, "logical_processors": 12 })],
        );
        answers.insert(
            DeviceCategory::Memory,
            vec![json!({ "total_mb": 16384, "free_mb": 9000 })],
        );
        answers.insert(DeviceCategory::Disk, vec![]);
        answers.insert(
            DeviceCategory::NetworkAdapter,
            vec![json!({ "name": "Ethernet", "mac": "00:11:22:33:44:55", "ipv4": ["10.0.0.5"] })],
        );

        FakeSource {
            answers,
            ..FakeSource::default()
        }
    }

    fn assembler(source: FakeSource) -> SnapshotAssembler {
        let config = CollectorConfig {
            timeout: Duration::from_millis(200),
            ..CollectorConfig::default()
        };
        SnapshotAssembler::new(Arc::new(source), &config)
    }

    #[tokio::test]
    async fn assembles_every_category() {
        let snapshot = assembler(office_source()).assemble().await;

        assert_eq!(snapshot.machine.machine_name, "WS-042");
        assert_eq!(snapshot.machine.bios_serial.as_deref(), Some("5CG1234XYZ"));
        assert_eq!(snapshot.machine.os_architecture.as_deref(), Some("64-bit"));
        assert_eq!(snapshot.monitors.len(), 2);
        assert_eq!(snapshot.printers[0].manufacturer.as_deref(), Some("HP"));
        assert_eq!(snapshot.scanners[0].model.as_deref(), Some("Canon MF240 Series"));
        assert_eq!(snapshot.card_readers[0].model.as_deref(), Some("Alcor Micro"));
        assert_eq!(snapshot.memory.as_ref().unwrap().total_mb, Some(16384));
        assert!(snapshot.disks.is_empty());
        assert!(!snapshot.has_failures());
    }

    #[tokio::test]
    async fn failing_monitor_backend_does_not_affect_other_categories() {
        let mut source = office_source();
        source.failing.push(DeviceCategory::Monitor);

        let snapshot = assembler(source).assemble().await;

        assert!(snapshot.monitors.is_empty());
        assert_eq!(snapshot.printers.len(), 1);
        assert_eq!(snapshot.scanners.len(), 1);
        assert_eq!(snapshot.card_readers.len(), 1);
        assert_eq!(snapshot.machine.machine_name, "WS-042");
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].category, DeviceCategory::Monitor);
    }

    #[tokio::test]
    async fn panicking_and_slow_backends_degrade_to_empty() {
        let mut source = office_source();
        source.panicking.push(DeviceCategory::Printer);
        source.slow.push(DeviceCategory::Scanner);

        let snapshot = assembler(source).assemble().await;

        assert!(snapshot.printers.is_empty());
        assert!(snapshot.scanners.is_empty());
        assert_eq!(snapshot.monitors.len(), 2);

        let failed: Vec<DeviceCategory> = snapshot.failures.iter().map(|f| f.category).collect();
        assert!(failed.contains(&DeviceCategory::Printer));
        assert!(failed.contains(&DeviceCategory::Scanner));
    }

    #[tokio::test]
    async fn partial_identity_is_kept() {
        let mut source = office_source();
        source.failing.push(DeviceCategory::Bios);
        source.failing.push(DeviceCategory::OperatingSystem);

        let snapshot = assembler(source).assemble().await;

        assert_eq!(snapshot.machine.machine_name, "WS-042");
        assert_eq!(snapshot.machine.model.as_deref(), Some("EliteDesk 800 G6"));
        assert_eq!(snapshot.machine.bios_serial, None);
        assert_eq!(snapshot.machine.os_caption, None);
    }

    #[tokio::test]
    async fn machine_name_falls_back_when_system_query_fails() {
        let mut source = office_source();
        source.failing.push(DeviceCategory::System);

        let snapshot = assembler(source).assemble().await;

        assert!(!snapshot.machine.machine_name.is_empty());
        assert_eq!(snapshot.machine.user_name, None);
        assert_eq!(snapshot.machine.bios_serial.as_deref(), Some("5CG1234XYZ"));
    }

    #[tokio::test]
    async fn unsupported_everything_still_yields_a_snapshot() {
        let snapshot = assembler(FakeSource::default()).assemble().await;

        assert!(!snapshot.machine.machine_name.is_empty());
        assert_eq!(snapshot.failures.len(), DeviceCategory::ALL.len());
        assert!(snapshot.to_pretty_json().unwrap().contains("\"failures\""));
    }
}
