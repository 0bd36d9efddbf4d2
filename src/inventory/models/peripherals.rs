use serde::{Deserialize, Serialize};

// Every field is optional: `None` means the backend could not tell.

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonitorRecord {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrinterRecord {
    pub name: Option<String>,
    pub driver_name: Option<String>,
    pub port_name: Option<String>,
    pub is_network: Option<bool>,
    pub is_default: Option<bool>,
    pub is_shared: Option<bool>,
    // guessed from the driver name, or the printer name when there is no driver
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScannerRecord {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub pnp_device_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CardReaderRecord {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub pnp_device_id: Option<String>,
}
