use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;

use log::debug;
use serde_json::{json, Value};
use sysinfo::{Disks, Networks, System};

use crate::config::CollectorConfig;
use crate::error::SourceError;

use super::{cups, sysfs, DeviceCategory, DeviceSource, RawRecord};

const LOOPBACK_INTERFACE: &str = "lo";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Answers device queries from the local host: `sysinfo` for the OS and
/// core hardware, sysfs for DMI/EDID/USB and CUPS for printers.
pub struct LocalSource {
    sysfs_root: PathBuf,
    cups_printers_conf: PathBuf,
}

impl LocalSource {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            sysfs_root: config.sysfs_root.clone(),
            cups_printers_conf: config.cups_printers_conf.clone(),
        }
    }

    fn system(&self) -> Vec<RawRecord> {
        let user_name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok();

        // DMI is often absent in containers; the host name alone is still useful
        let manufacturer = sysfs::read_dmi(&self.sysfs_root, "sys_vendor").unwrap_or_else(|e| {
            debug!("sys_vendor unavailable: {}", e);
            None
        });
        let model = sysfs::read_dmi(&self.sysfs_root, "product_name").unwrap_or_else(|e| {
            debug!("product_name unavailable: {}", e);
            None
        });

        vec![json!({
            "machine_name": System::host_name(),
            "user_name": user_name,
            "manufacturer": manufacturer,
            "model": model,
        })]
    }

    fn bios(&self) -> Result<Vec<RawRecord>, SourceError> {
        let serial = sysfs::read_dmi(&self.sysfs_root, "product_serial")?;
        Ok(vec![json!({ "serial_number": serial })])
    }

    fn operating_system(&self) -> Vec<RawRecord> {
        vec![json!({
            "caption": System::long_os_version(),
            "version": System::kernel_version(),
            "architecture": System::cpu_arch(),
        })]
    }

    fn cpu(&self) -> Result<Vec<RawRecord>, SourceError> {
        let mut system = System::new();
        system.refresh_cpu();

        let cpus = system.cpus();
        let Some(first) = cpus.first() else {
            return Err(SourceError::query(DeviceCategory::Cpu, "no cpu reported"));
        };

        Ok(vec![json!({
            "name": first.brand(),
            "vendor": first.vendor_id(),
            "cores": system.physical_core_count(),
            "logical_processors": cpus.len(),
        })])
    }

    fn memory(&self) -> Vec<RawRecord> {
        let mut system = System::new();
        system.refresh_memory();

        vec![json!({
            "total_mb": system.total_memory() / BYTES_PER_MB,
            "free_mb": system.available_memory() / BYTES_PER_MB,
        })]
    }

    fn disks(&self) -> Vec<RawRecord> {
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .map(|disk| {
                json!({
                    "model": disk.name().to_string_lossy(),
                    "size_bytes": disk.total_space(),
                    "interface_type": format!("{:?}", disk.kind()),
                    "mount_point": disk.mount_point().to_string_lossy(),
                })
            })
            .collect()
    }

    fn network_adapters(&self) -> Vec<RawRecord> {
        let networks = Networks::new_with_refreshed_list();

        let mut ipv4_by_interface: HashMap<String, Vec<String>> = HashMap::new();
        match local_ip_address::list_afinet_netifas() {
            Ok(addresses) => {
                for (interface, address) in addresses {
                    if let IpAddr::V4(v4) = address {
                        ipv4_by_interface
                            .entry(interface)
                            .or_default()
                            .push(v4.to_string());
                    }
                }
            }
            Err(e) => debug!("interface addresses unavailable: {}", e),
        }

        networks
            .list()
            .iter()
            .filter(|(name, _)| name.as_str() != LOOPBACK_INTERFACE)
            .map(|(name, data)| {
                let mac = data.mac_address();
                let mac = (!mac.is_unspecified()).then(|| mac.to_string());
                json!({
                    "name": name,
                    "mac": mac,
                    "ipv4": ipv4_by_interface.get(name).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }

    fn printers(&self) -> Result<Vec<RawRecord>, SourceError> {
        let content = match fs::read_to_string(&self.cups_printers_conf) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SourceError::Unsupported(DeviceCategory::Printer))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(cups::parse_printers_conf(&content))
    }

    fn monitors(&self) -> Result<Vec<RawRecord>, SourceError> {
        not_found_as_unsupported(DeviceCategory::Monitor, sysfs::monitors(&self.sysfs_root))
    }

    fn usb_devices(&self, category: DeviceCategory) -> Result<Vec<RawRecord>, SourceError> {
        not_found_as_unsupported(category, sysfs::usb_devices(&self.sysfs_root, category))
    }
}

fn not_found_as_unsupported(
    category: DeviceCategory,
    result: io::Result<Vec<Value>>,
) -> Result<Vec<RawRecord>, SourceError> {
    match result {
        Ok(records) => Ok(records),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::Unsupported(category)),
        Err(e) => Err(e.into()),
    }
}

impl DeviceSource for LocalSource {
    fn query(&self, category: DeviceCategory) -> Result<Vec<RawRecord>, SourceError> {
        match category {
            DeviceCategory::System => Ok(self.system()),
            DeviceCategory::Bios => self.bios(),
            DeviceCategory::OperatingSystem => Ok(self.operating_system()),
            DeviceCategory::Cpu => self.cpu(),
            DeviceCategory::Memory => Ok(self.memory()),
            DeviceCategory::Disk => Ok(self.disks()),
            DeviceCategory::NetworkAdapter => Ok(self.network_adapters()),
            DeviceCategory::Monitor => self.monitors(),
            DeviceCategory::Printer => self.printers(),
            DeviceCategory::Scanner | DeviceCategory::CardReader => self.usb_devices(category),
        }
    }
}
