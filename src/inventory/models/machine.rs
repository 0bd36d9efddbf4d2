use serde::{Deserialize, Serialize};

/// Who the machine is. One stored row per host, keyed by BIOS serial when
/// known, otherwise by machine name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MachineIdentity {
    pub machine_name: String,
    pub user_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub bios_serial: Option<String>,
    pub os_caption: Option<String>,
    pub os_version: Option<String>,
    // e.g. "x86_64", "64-bit"
    pub os_architecture: Option<String>,
}

/// Which stored attribute recognises the machine across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaturalKey<'a> {
    BiosSerial(&'a str),
    MachineName(&'a str),
}

impl MachineIdentity {
    pub fn named(machine_name: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            ..Self::default()
        }
    }

    pub fn natural_key(&self) -> NaturalKey<'_> {
        match self.bios_serial.as_deref().map(str::trim) {
            Some(serial) if !serial.is_empty() => NaturalKey::BiosSerial(serial),
            _ => NaturalKey::MachineName(self.machine_name.trim()),
        }
    }
}
