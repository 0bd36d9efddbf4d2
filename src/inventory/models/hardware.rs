use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CpuRecord {
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub cores: Option<i32>,
    pub logical_processors: Option<i32>,
    pub processor_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemoryRecord {
    pub total_mb: Option<i64>,
    pub free_mb: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiskRecord {
    pub model: Option<String>,
    pub serial: Option<String>,
    pub size_bytes: Option<i64>,
    pub interface_type: Option<String>,
    pub mount_point: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdapterRecord {
    pub name: Option<String>,
    pub mac: Option<String>,
    pub ipv4: Vec<String>,
}
