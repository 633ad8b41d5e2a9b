// Process models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// CPU percent; may exceed 100 on multi-core hosts.
    pub cpu: f64,
    /// Resident memory as a percent of total memory.
    pub mem: f32,
    pub username: String,
}
