// Build-time identity from Cargo.toml, shown on /version and sent on outbound requests

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `User-Agent` for pushes to a hub and pulls from agents, e.g. "hostwatch/0.3.0".
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
