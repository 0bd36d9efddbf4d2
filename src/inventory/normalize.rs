//! Raw backend bundles to typed records.
//!
//! Backends hand over JSON objects; the keys each category reads are:
//!
//! | category           | keys                                                              |
//! |--------------------|-------------------------------------------------------------------|
//! | `system`           | `machine_name`, `user_name`, `manufacturer`, `model`              |
//! | `bios`             | `serial_number`                                                   |
//! | `operating_system` | `caption`, `version`, `architecture`                              |
//! | `cpu`              | `name`, `vendor`, `cores`, `logical_processors`, `processor_id`   |
//! | `memory`           | `total_mb`, `free_mb`                                             |
//! | `disk`             | `model`, `serial`, `size_bytes`, `interface_type`, `mount_point`  |
//! | `network_adapter`  | `name`, `mac`, `ipv4` (array of strings)                          |
//! | `monitor`          | `manufacturer_name`, `user_friendly_name`, `serial_number_id`     |
//! | `printer`          | `name`, `driver_name`, `description`, `port_name`, `network`,     |
//! |                    | `default`, `shared`                                               |
//! | `scanner`          | `name`, `manufacturer`, `pnp_device_id`                           |
//! | `card_reader`      | `name`, `manufacturer`, `pnp_device_id`                           |
//!
//! Monitor keys hold 16-bit code unit arrays, zero terminated. Anything that
//! is missing, blank or the wrong shape becomes `None`; a bundle that is not
//! an object at all is skipped.

use log::debug;
use serde_json::{Map, Value};

use super::models::{
    CardReaderRecord, CpuRecord, DiskRecord, MachineIdentity, MemoryRecord, MonitorRecord,
    NetworkAdapterRecord, PrinterRecord, ScannerRecord,
};
use super::source::{DeviceCategory, RawRecord};

type Attrs = Map<String, Value>;

/// Checked in this order; the first hit wins.
const VENDOR_TOKENS: [&str; 9] = [
    "hp", "canon", "epson", "brother", "ricoh", "lexmark", "samsung", "kyocera", "xerox",
];

/// Driver-ish noise stripped from device names to leave the model.
const MODEL_NOISE: [&str; 5] = ["WIA", "USB", "Device", "Scanner", "Smart Card Reader"];

/// Guesses a vendor from free text such as a driver or device name.
///
/// `"HP Universal Printing PCL 6"` gives `"HP"`, `"Generic / Text Only"`
/// gives `None`.
pub fn guess_vendor(text: Option<&str>) -> Option<String> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();

    VENDOR_TOKENS
        .iter()
        .find(|token| lowered.contains(*token))
        .map(|token| token.to_uppercase())
}

/// Strips connection and class words from a device name to leave the model.
pub fn model_from_name(name: Option<&str>) -> Option<String> {
    let name = name?;
    if name.trim().is_empty() {
        return None;
    }

    let mut cleaned = name.to_owned();
    for noise in MODEL_NOISE {
        cleaned = remove_ignore_ascii_case(&cleaned, noise);
    }

    non_blank(cleaned.trim())
}

fn remove_ignore_ascii_case(haystack: &str, needle: &str) -> String {
    // ascii lowering keeps byte offsets identical to the input
    let lowered = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in lowered.match_indices(&needle) {
        out.push_str(&haystack[last..start]);
        last = start + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}

/// Decodes a zero terminated array of UTF-16 code units.
pub fn decode_code_units(value: Option<&Value>) -> Option<String> {
    let units = value?.as_array()?;

    let mut decoded = Vec::with_capacity(units.len());
    for unit in units {
        let unit = u16::try_from(unit.as_u64()?).ok()?;
        if unit == 0 {
            break;
        }
        decoded.push(unit);
    }

    let text = String::from_utf16(&decoded).ok()?;
    non_blank(text.trim())
}

fn non_blank(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

fn text(attrs: &Attrs, key: &str) -> Option<String> {
    match attrs.get(key)? {
        Value::String(s) => non_blank(s.trim()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(attrs: &Attrs, key: &str) -> Option<i64> {
    match attrs.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(attrs: &Attrs, key: &str) -> Option<bool> {
    match attrs.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn texts(attrs: &Attrs, key: &str) -> Vec<String> {
    match attrs.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().and_then(|s| non_blank(s.trim())))
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .filter_map(|part| non_blank(part.trim()))
            .collect(),
        _ => vec![],
    }
}

fn normalize_each<T>(
    category: DeviceCategory,
    raw: &[RawRecord],
    convert: fn(&Attrs) -> Option<T>,
) -> Vec<T> {
    let mut records = Vec::with_capacity(raw.len());
    for (idx, bundle) in raw.iter().enumerate() {
        let Some(attrs) = bundle.as_object() else {
            debug!("skipping malformed {} bundle #{}: {}", category, idx, bundle);
            continue;
        };
        if let Some(record) = convert(attrs) {
            records.push(record);
        }
    }
    records
}

fn first_object(raw: &[RawRecord]) -> Option<&Attrs> {
    raw.iter().find_map(Value::as_object)
}

pub fn apply_system(identity: &mut MachineIdentity, raw: &[RawRecord]) {
    let Some(attrs) = first_object(raw) else {
        return;
    };
    if let Some(name) = text(attrs, "machine_name") {
        identity.machine_name = name;
    }
    identity.user_name = text(attrs, "user_name");
    identity.manufacturer = text(attrs, "manufacturer");
    identity.model = text(attrs, "model");
}

pub fn apply_bios(identity: &mut MachineIdentity, raw: &[RawRecord]) {
    if let Some(attrs) = first_object(raw) {
        identity.bios_serial = text(attrs, "serial_number");
    }
}

pub fn apply_operating_system(identity: &mut MachineIdentity, raw: &[RawRecord]) {
    if let Some(attrs) = first_object(raw) {
        identity.os_caption = text(attrs, "caption");
        identity.os_version = text(attrs, "version");
        identity.os_architecture = text(attrs, "architecture");
    }
}

pub fn monitors(raw: &[RawRecord]) -> Vec<MonitorRecord> {
    normalize_each(DeviceCategory::Monitor, raw, |attrs| {
        Some(MonitorRecord {
            manufacturer: decode_code_units(attrs.get("manufacturer_name")),
            model: decode_code_units(attrs.get("user_friendly_name")),
            serial: decode_code_units(attrs.get("serial_number_id")),
        })
    })
}

pub fn printers(raw: &[RawRecord]) -> Vec<PrinterRecord> {
    normalize_each(DeviceCategory::Printer, raw, |attrs| {
        let name = text(attrs, "name");
        let driver_name = text(attrs, "driver_name");
        // the free-text description stands in for a missing driver
        let description = text(attrs, "description");
        let manufacturer = guess_vendor(
            driver_name
                .as_deref()
                .or(description.as_deref())
                .or(name.as_deref()),
        );

        Some(PrinterRecord {
            name,
            driver_name,
            port_name: text(attrs, "port_name"),
            is_network: flag(attrs, "network"),
            is_default: flag(attrs, "default"),
            is_shared: flag(attrs, "shared"),
            manufacturer,
        })
    })
}

pub fn scanners(raw: &[RawRecord]) -> Vec<ScannerRecord> {
    normalize_each(DeviceCategory::Scanner, raw, |attrs| {
        let name = text(attrs, "name");
        Some(ScannerRecord {
            model: model_from_name(name.as_deref()),
            manufacturer: text(attrs, "manufacturer"),
            pnp_device_id: text(attrs, "pnp_device_id"),
            name,
        })
    })
}

pub fn card_readers(raw: &[RawRecord]) -> Vec<CardReaderRecord> {
    normalize_each(DeviceCategory::CardReader, raw, |attrs| {
        let name = text(attrs, "name");
        Some(CardReaderRecord {
            model: model_from_name(name.as_deref()),
            manufacturer: text(attrs, "manufacturer"),
            pnp_device_id: text(attrs, "pnp_device_id"),
            name,
        })
    })
}

pub fn cpus(raw: &[RawRecord]) -> Vec<CpuRecord> {
    normalize_each(DeviceCategory::Cpu, raw, |attrs| {
        Some(CpuRecord {
            name: text(attrs, "name"),
            vendor: text(attrs, "vendor"),
            cores: integer(attrs, "cores").and_then(|v| i32::try_from(v).ok()),
            logical_processors: integer(attrs, "logical_processors")
                .and_then(|v| i32::try_from(v).ok()),
            processor_id: text(attrs, "processor_id"),
        })
    })
}

pub fn memory(raw: &[RawRecord]) -> Option<MemoryRecord> {
    normalize_each(DeviceCategory::Memory, raw, |attrs| {
        Some(MemoryRecord {
            total_mb: integer(attrs, "total_mb"),
            free_mb: integer(attrs, "free_mb"),
        })
    })
    .into_iter()
    .next()
}

pub fn disks(raw: &[RawRecord]) -> Vec<DiskRecord> {
    normalize_each(DeviceCategory::Disk, raw, |attrs| {
        Some(DiskRecord {
            model: text(attrs, "model"),
            serial: text(attrs, "serial"),
            size_bytes: integer(attrs, "size_bytes"),
            interface_type: text(attrs, "interface_type"),
            mount_point: text(attrs, "mount_point"),
        })
    })
}

pub fn network_adapters(raw: &[RawRecord]) -> Vec<NetworkAdapterRecord> {
    normalize_each(DeviceCategory::NetworkAdapter, raw, |attrs| {
        let ipv4 = texts(attrs, "ipv4");
        // loopback
        if !ipv4.is_empty() && ipv4.iter().all(|ip| ip.starts_with("127.")) {
            return None;
        }
        Some(NetworkAdapterRecord {
            name: text(attrs, "name"),
            mac: text(attrs, "mac"),
            ipv4,
        })
    })
}
