use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Which listening primitive the server binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    Port,
    LocalSocket,
}

/// Settings for one server run. Not modified once the server has started.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_mode: ListenMode,

    /// Interface to bind in port mode.
    /// Default: `0.0.0.0`
    pub bind_ip: IpAddr,

    /// TCP port; `0` lets the OS pick one.
    /// Default: 1080
    pub port: u16,

    /// Path of the local socket in local-socket mode.
    pub socket_name: String,

    /// Accept IPv6 targets, literal or resolved.
    pub allow_ipv6: bool,

    /// Relay sessions with no traffic for this long are closed.
    /// Default: 30 seconds
    pub max_idle_timeout: Duration,

    /// Upper bound on establishing one upstream connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_mode: ListenMode::Port,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 1080,
            socket_name: String::new(),
            allow_ipv6: false,
            max_idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
