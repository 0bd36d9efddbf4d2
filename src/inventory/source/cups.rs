use serde_json::{json, Value};

const NETWORK_SCHEMES: [&str; 8] = ["ipp", "ipps", "http", "https", "socket", "lpd", "smb", "dnssd"];
const LOCAL_SCHEMES: [&str; 4] = ["usb", "parallel", "serial", "file"];

#[derive(Debug, Default)]
struct PrinterBlock {
    name: String,
    is_default: bool,
    info: Option<String>,
    make_model: Option<String>,
    device_uri: Option<String>,
    shared: Option<bool>,
}

impl PrinterBlock {
    fn into_bundle(self) -> Value {
        let network = self.device_uri.as_deref().and_then(uri_is_network);
        json!({
            "name": self.name,
            "driver_name": self.make_model,
            "description": self.info,
            "port_name": self.device_uri,
            "network": network,
            "default": self.is_default,
            "shared": self.shared,
        })
    }
}

/// Parses a CUPS `printers.conf` into printer bundles.
pub(super) fn parse_printers_conf(content: &str) -> Vec<Value> {
    let mut printers = vec![];
    let mut current: Option<PrinterBlock> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(tag) = line.strip_prefix('<').and_then(|l| l.strip_suffix('>')) {
            if tag.starts_with('/') {
                if let Some(block) = current.take() {
                    printers.push(block.into_bundle());
                }
                continue;
            }

            let (kind, name) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
            current = match kind {
                "Printer" | "DefaultPrinter" => Some(PrinterBlock {
                    name: name.trim().to_owned(),
                    is_default: kind == "DefaultPrinter",
                    ..PrinterBlock::default()
                }),
                // classes and anything else we do not report
                _ => None,
            };
            continue;
        }

        let Some(block) = current.as_mut() else {
            continue;
        };
        let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let value = value.trim();
        match key {
            "Info" => block.info = non_empty(value),
            "MakeModel" => block.make_model = non_empty(value),
            "DeviceURI" => block.device_uri = non_empty(value),
            "Shared" => {
                block.shared = match value.to_ascii_lowercase().as_str() {
                    "yes" | "true" | "on" => Some(true),
                    "no" | "false" | "off" => Some(false),
                    _ => None,
                }
            }
            _ => {}
        }
    }

    printers
}

fn uri_is_network(uri: &str) -> Option<bool> {
    let (scheme, _) = uri.split_once(':')?;
    let scheme = scheme.to_ascii_lowercase();
    if NETWORK_SCHEMES.contains(&scheme.as_str()) {
        Some(true)
    } else if LOCAL_SCHEMES.contains(&scheme.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
