use std::net::IpAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::config::{Config, ListenMode};

#[derive(Parser, Debug)]
#[command(name = "socksd", about = "SOCKS5 proxy server (CONNECT only)")]
pub struct Cli {
    /// Interface to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// TCP port to listen on (0 picks a free port)
    #[arg(short, long, default_value_t = 1080)]
    pub port: u16,

    /// Listen on a local socket at this path instead of a TCP port
    #[arg(long, value_name = "NAME", conflicts_with_all = ["bind", "port"])]
    pub local_socket: Option<String>,

    /// Allow connections to IPv6 targets
    #[arg(long)]
    pub allow_ipv6: bool,

    /// Close relays idle for this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub idle_timeout: u64,

    /// Give up connecting to a target after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub connect_timeout: u64,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn to_config(&self) -> anyhow::Result<Config> {
        if self.idle_timeout == 0 {
            anyhow::bail!("--idle-timeout must be at least 1 second");
        }
        let (listen_mode, socket_name) = match &self.local_socket {
            Some(name) if name.is_empty() => anyhow::bail!("--local-socket needs a name"),
            Some(name) => (ListenMode::LocalSocket, name.clone()),
            None => (ListenMode::Port, String::new()),
        };
        Ok(Config {
            listen_mode,
            bind_ip: self.bind,
            port: self.port,
            socket_name,
            allow_ipv6: self.allow_ipv6,
            max_idle_timeout: Duration::from_secs(self.idle_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("socksd").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_config_defaults() {
        let config = parse(&[]).to_config().unwrap();
        let default = Config::default();
        assert_eq!(config.listen_mode, ListenMode::Port);
        assert_eq!(config.port, default.port);
        assert_eq!(config.bind_ip, default.bind_ip);
        assert_eq!(config.allow_ipv6, default.allow_ipv6);
        assert_eq!(config.max_idle_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, default.connect_timeout);
    }

    #[test]
    fn local_socket_selects_local_mode() {
        let config = parse(&["--local-socket", "/tmp/socksd.sock", "--allow-ipv6"])
            .to_config()
            .unwrap();
        assert_eq!(config.listen_mode, ListenMode::LocalSocket);
        assert_eq!(config.socket_name, "/tmp/socksd.sock");
        assert!(config.allow_ipv6);
    }

    #[test]
    fn local_socket_conflicts_with_port() {
        let args = ["socksd", "--local-socket", "s", "--port", "9000"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        assert!(parse(&["--idle-timeout", "0"]).to_config().is_err());
    }

    #[test]
    fn timeouts_are_seconds() {
        let config = parse(&["-p", "0", "--idle-timeout", "5", "--connect-timeout", "2"])
            .to_config()
            .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.max_idle_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
    }
}
