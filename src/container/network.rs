//! Per-network endpoint configuration

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Endpoint settings for one attached network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSettings {
    pub aliases: Vec<String>,
    pub ipv4_address: Option<Ipv4Addr>,
    pub ipv6_address: Option<Ipv6Addr>,
    pub link_local_ips: Vec<IpAddr>,
    pub mac_address: Option<String>,
    pub driver_opts: BTreeMap<String, String>,
}

/// Networks the container attaches to, keyed by network name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkingConfig {
    pub endpoints: BTreeMap<String, EndpointSettings>,
}

impl NetworkingConfig {
    /// Endpoint for `network`, created empty on first use
    pub fn endpoint_mut(&mut self, network: &str) -> &mut EndpointSettings {
        self.endpoints.entry(network.to_string()).or_default()
    }
}

/// Validate a colon-separated 48-bit MAC address
pub fn parse_mac(s: &str) -> Result<String, String> {
    let octets: Vec<&str> = s.split(':').collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(format!("invalid MAC address {:?}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_created_once() {
        let mut net = NetworkingConfig::default();
        net.endpoint_mut("front").aliases.push("web".to_string());
        net.endpoint_mut("front").aliases.push("www".to_string());
        assert_eq!(net.endpoints.len(), 1);
        assert_eq!(net.endpoints["front"].aliases, vec!["web", "www"]);
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(parse_mac("02:42:AC:11:00:02").unwrap(), "02:42:ac:11:00:02");
        assert!(parse_mac("02:42:ac:11:00").is_err());
        assert!(parse_mac("zz:42:ac:11:00:02").is_err());
    }
}
