pub mod backend;
pub mod bridge;
pub mod cli;
pub mod http;
pub mod service;
pub mod update;

use std::net::IpAddr;
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Immutable per-instance configuration. Built once by the CLI shell,
/// shared read-only with every request handler.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root directory under which repository paths are resolved. Also the
    /// working directory of every spawned transport subprocess.
    pub working_dir: PathBuf,
    pub bind_host: String,
    pub bind_port: u16,
    /// Additional client address allowed besides loopback. `None` means
    /// loopback-only: a missing allow-list is default-deny, not default-allow.
    pub allowed_client: Option<IpAddr>,
    pub read_only: bool,
}
