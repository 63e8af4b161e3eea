//! Container process configuration

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Health check test value that disables any image-defined check
pub const HEALTHCHECK_DISABLED: &str = "NONE";

/// Network protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            other => Err(format!("unknown protocol {:?}", other)),
        }
    }
}

/// A container port with its protocol, e.g. `80/tcp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortProto {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortProto {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Tcp,
        }
    }

    pub fn udp(port: u16) -> Self {
        Self {
            port,
            protocol: Protocol::Udp,
        }
    }
}

impl fmt::Display for PortProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

impl FromStr for PortProto {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, protocol) = match s.split_once('/') {
            Some((port, proto)) => (port, proto.parse()?),
            None => (s, Protocol::Tcp),
        };
        let port = port
            .parse::<u16>()
            .map_err(|_| format!("invalid port {:?}", port))?;
        Ok(Self { port, protocol })
    }
}

/// Container health check
///
/// `test` follows the engine convention: empty inherits the image check,
/// `["NONE"]` disables it, otherwise `CMD`/`CMD-SHELL` followed by arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthConfig {
    pub test: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub start_period: Duration,
    pub start_interval: Duration,
    pub retries: u32,
}

impl HealthConfig {
    pub fn is_disabled(&self) -> bool {
        self.test.len() == 1 && self.test[0] == HEALTHCHECK_DISABLED
    }
}

/// Process-level container configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Image reference
    pub image: String,
    /// Command arguments
    pub cmd: Vec<String>,
    /// Entry point
    pub entrypoint: Vec<String>,
    /// Environment variables
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub working_dir: String,
    /// User to run as
    pub user: String,
    pub hostname: String,
    pub domainname: String,
    /// Exposed ports
    pub exposed_ports: BTreeSet<PortProto>,
    /// Container labels
    pub labels: BTreeMap<String, String>,
    /// Health check, `None` when never configured
    pub healthcheck: Option<HealthConfig>,
    pub tty: bool,
    pub open_stdin: bool,
    pub stop_signal: Option<String>,
    /// Grace period before the container is killed on stop
    pub stop_timeout: Option<Duration>,
}

impl ContainerConfig {
    /// Environment as `KEY=value` pairs
    pub fn env_list(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_proto() {
        assert_eq!("80".parse::<PortProto>().unwrap(), PortProto::tcp(80));
        assert_eq!("53/udp".parse::<PortProto>().unwrap(), PortProto::udp(53));
        assert!("http/tcp".parse::<PortProto>().is_err());
        assert!("80/icmp".parse::<PortProto>().is_err());
    }

    #[test]
    fn test_port_proto_display() {
        assert_eq!(PortProto::tcp(8080).to_string(), "8080/tcp");
    }

    #[test]
    fn test_healthcheck_disabled() {
        let hc = HealthConfig {
            test: vec![HEALTHCHECK_DISABLED.to_string()],
            ..HealthConfig::default()
        };
        assert!(hc.is_disabled());
        assert!(!HealthConfig::default().is_disabled());
    }
}
