// Domain models: the snapshot and its parts, plus monitored-system records

mod container;
mod network;
mod process;
mod registry;
mod storage;
mod system;

pub use container::{ContainerInfo, ContainerState};
pub use network::{NetInterface, NetworkStats};
pub use process::ProcessInfo;
pub use registry::{DeliveryMode, InvalidAddress, MonitoredSystem, NewSystem, TenantId};
pub use storage::{DiskHistoryEntry, DiskInfo, FolderSize};
pub use system::{HostInfo, LoadAverage, MemoryStats, SwapStats, SystemMetrics};
