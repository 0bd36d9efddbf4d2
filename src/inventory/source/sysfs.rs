use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use serde_json::{json, Value};

use crate::inventory::DeviceCategory;

const EDID_MIN_LEN: usize = 128;
const EDID_DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];
const EDID_TAG_SERIAL: u8 = 0xFF;
const EDID_TAG_NAME: u8 = 0xFC;

const USB_CLASS_STILL_IMAGE: &str = "06";
const USB_CLASS_SMART_CARD: &str = "0b";

/// Reads one DMI attribute, e.g. `sys_vendor` or `product_serial`.
pub(super) fn read_dmi(sysfs_root: &Path, attribute: &str) -> io::Result<Option<String>> {
    let raw = fs::read_to_string(sysfs_root.join("class/dmi/id").join(attribute))?;
    let value = raw.trim();
    Ok(if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    })
}

/// Monitors attached to connected DRM outputs, described by their EDID.
pub(super) fn monitors(sysfs_root: &Path) -> io::Result<Vec<Value>> {
    let mut monitors = vec![];

    for entry in fs::read_dir(sysfs_root.join("class/drm"))? {
        let path = entry?.path();

        let connected = fs::read_to_string(path.join("status"))
            .map(|status| status.trim() == "connected")
            .unwrap_or(false);
        if !connected {
            continue;
        }

        let Ok(edid) = fs::read(path.join("edid")) else {
            continue;
        };
        if let Some(monitor) = parse_edid(&edid) {
            monitors.push(monitor);
        }
    }

    Ok(monitors)
}

/// Turns an EDID base block into a monitor bundle whose text fields are
/// zero terminated code unit arrays.
pub(super) fn parse_edid(edid: &[u8]) -> Option<Value> {
    if edid.len() < EDID_MIN_LEN || edid[0..8] != [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00] {
        return None;
    }

    // three 5-bit letters, 'A' == 1; a zero letter ends the id
    let packed = u16::from_be_bytes([edid[8], edid[9]]);
    let manufacturer: Vec<u16> = [(packed >> 10) & 0x1F, (packed >> 5) & 0x1F, packed & 0x1F]
        .iter()
        .map(|&letter| match letter {
            0 => 0,
            _ => u16::from(b'A') + letter - 1,
        })
        .chain(std::iter::once(0))
        .collect();

    let mut name = None;
    let mut serial = None;
    for offset in EDID_DESCRIPTOR_OFFSETS {
        let descriptor = &edid[offset..offset + 18];
        if descriptor[0..3] != [0, 0, 0] {
            continue;
        }
        match descriptor[3] {
            EDID_TAG_NAME => name = Some(descriptor_text(&descriptor[5..])),
            EDID_TAG_SERIAL => serial = Some(descriptor_text(&descriptor[5..])),
            _ => {}
        }
    }

    if serial.is_none() {
        let numeric = u32::from_le_bytes([edid[12], edid[13], edid[14], edid[15]]);
        if numeric != 0 {
            serial = Some(
                numeric
                    .to_string()
                    .encode_utf16()
                    .chain(std::iter::once(0))
                    .collect(),
            );
        }
    }

    Some(json!({
        "manufacturer_name": manufacturer,
        "user_friendly_name": name,
        "serial_number_id": serial,
    }))
}

// descriptor text ends at 0x0A and is space padded
fn descriptor_text(bytes: &[u8]) -> Vec<u16> {
    bytes
        .iter()
        .map(|b| if *b == 0x0A { 0 } else { u16::from(*b) })
        .collect()
}

/// USB devices exposing an interface of the class that matches `category`.
pub(super) fn usb_devices(sysfs_root: &Path, category: DeviceCategory) -> io::Result<Vec<Value>> {
    let wanted = match category {
        DeviceCategory::Scanner => USB_CLASS_STILL_IMAGE,
        DeviceCategory::CardReader => USB_CLASS_SMART_CARD,
        _ => return Ok(vec![]),
    };

    let devices_dir = sysfs_root.join("bus/usb/devices");
    let mut seen = HashSet::new();
    let mut devices = vec![];

    for entry in fs::read_dir(&devices_dir)? {
        let entry = entry?;
        let interface = entry.file_name().to_string_lossy().to_string();

        // interfaces are named "<device>:<config>.<interface>"
        let Some((device, _)) = interface.split_once(':') else {
            continue;
        };
        let class = read_trimmed(&entry.path().join("bInterfaceClass"));
        if !class.is_some_and(|c| c.eq_ignore_ascii_case(wanted)) {
            continue;
        }
        if !seen.insert(device.to_owned()) {
            continue;
        }

        let device_dir = devices_dir.join(device);
        let manufacturer = read_trimmed(&device_dir.join("manufacturer"));
        let product = read_trimmed(&device_dir.join("product"));
        let vendor_id = read_trimmed(&device_dir.join("idVendor"));
        let product_id = read_trimmed(&device_dir.join("idProduct"));
        let serial = read_trimmed(&device_dir.join("serial"));

        let pnp_device_id = match (vendor_id, product_id) {
            (Some(vid), Some(pid)) => Some(format!(
                "USB\\VID_{}&PID_{}\\{}",
                vid.to_uppercase(),
                pid.to_uppercase(),
                serial.unwrap_or_else(|| device.to_owned())
            )),
            _ => None,
        };

        devices.push(json!({
            "name": product,
            "manufacturer": manufacturer,
            "pnp_device_id": pnp_device_id,
        }));
    }

    Ok(devices)
}

fn read_trimmed(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let value = raw.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
