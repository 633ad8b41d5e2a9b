// Network interface rate models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetInterface {
    pub name: String,
    /// Receive rate in bytes/sec (computed from the previous sample).
    pub recv_rate: f64,
    /// Transmit rate in bytes/sec (computed from the previous sample).
    pub sent_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkStats {
    pub interfaces: Vec<NetInterface>,
    /// Sum of all interface receive rates, bytes/sec.
    pub total_recv: f64,
    /// Sum of all interface transmit rates, bytes/sec.
    pub total_sent: f64,
}
