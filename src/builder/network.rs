//! Network endpoint setters
//!
//! Each setter names the network it configures; the endpoint is created on
//! first use.

use super::Op;
use crate::container::network::parse_mac;
use crate::container::{EndpointSettings, NetworkingConfig};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn field(network: &str, name: &str) -> String {
    format!("networks.{}.{}", network, name)
}

/// Attach to `network` with default endpoint settings
pub fn attach(network: &str) -> Op<NetworkingConfig> {
    let network = network.to_string();
    Op::new(field(&network, "name"), move |n: &mut NetworkingConfig| {
        if network.is_empty() {
            return Err("network name must not be empty".to_string());
        }
        n.endpoint_mut(&network);
        Ok(())
    })
}

/// Configure the endpoint on `network` with endpoint-level operations
///
/// Errors raised by the inner operations keep their own field names,
/// prefixed with the network.
pub fn endpoint<I>(network: &str, ops: I) -> Op<NetworkingConfig>
where
    I: IntoIterator<Item = Op<EndpointSettings>>,
{
    let network = network.to_string();
    let ops: Vec<Op<EndpointSettings>> = ops.into_iter().collect();
    Op::new(field(&network, "endpoint"), move |n: &mut NetworkingConfig| {
        let errors = super::apply(n.endpoint_mut(&network), ops.iter().cloned());
        if errors.is_empty() {
            return Ok(());
        }
        Err(errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; "))
    })
}

pub fn alias(network: &str, alias: &str) -> Op<NetworkingConfig> {
    let (network, alias) = (network.to_string(), alias.to_string());
    Op::new(field(&network, "aliases"), move |n: &mut NetworkingConfig| {
        if alias.is_empty() {
            return Err("alias must not be empty".to_string());
        }
        let endpoint = n.endpoint_mut(&network);
        if !endpoint.aliases.contains(&alias) {
            endpoint.aliases.push(alias.clone());
        }
        Ok(())
    })
}

pub fn ipv4_address(network: &str, address: &str) -> Op<NetworkingConfig> {
    let parsed = address
        .parse::<Ipv4Addr>()
        .map_err(|_| format!("invalid IPv4 address {:?}", address));
    let network = network.to_string();
    Op::or_fail(
        field(&network, "ipv4_address"),
        parsed.map(|ip| {
            Op::infallible(field(&network, "ipv4_address"), move |n: &mut NetworkingConfig| {
                n.endpoint_mut(&network).ipv4_address = Some(ip)
            })
        }),
    )
}

pub fn ipv6_address(network: &str, address: &str) -> Op<NetworkingConfig> {
    let parsed = address
        .parse::<Ipv6Addr>()
        .map_err(|_| format!("invalid IPv6 address {:?}", address));
    let network = network.to_string();
    Op::or_fail(
        field(&network, "ipv6_address"),
        parsed.map(|ip| {
            Op::infallible(field(&network, "ipv6_address"), move |n: &mut NetworkingConfig| {
                n.endpoint_mut(&network).ipv6_address = Some(ip)
            })
        }),
    )
}

pub fn link_local_ip(network: &str, address: &str) -> Op<NetworkingConfig> {
    let parsed = address
        .parse::<IpAddr>()
        .map_err(|_| format!("invalid link-local address {:?}", address));
    let network = network.to_string();
    Op::or_fail(
        field(&network, "link_local_ips"),
        parsed.map(|ip| {
            Op::infallible(field(&network, "link_local_ips"), move |n: &mut NetworkingConfig| {
                n.endpoint_mut(&network).link_local_ips.push(ip)
            })
        }),
    )
}

pub fn mac_address(network: &str, mac: &str) -> Op<NetworkingConfig> {
    let network = network.to_string();
    Op::or_fail(
        field(&network, "mac_address"),
        parse_mac(mac).map(|mac| {
            Op::infallible(field(&network, "mac_address"), move |n: &mut NetworkingConfig| {
                n.endpoint_mut(&network).mac_address = Some(mac.clone())
            })
        }),
    )
}

pub fn driver_opt(network: &str, key: &str, value: &str) -> Op<NetworkingConfig> {
    let (network, key, value) = (network.to_string(), key.to_string(), value.to_string());
    Op::infallible(field(&network, "driver_opts"), move |n: &mut NetworkingConfig| {
        n.endpoint_mut(&network)
            .driver_opts
            .insert(key.clone(), value.clone());
    })
}

/// Endpoint-level alias, for use with [`endpoint`]
pub fn endpoint_alias(alias: &str) -> Op<EndpointSettings> {
    let alias = alias.to_string();
    Op::new("aliases", move |e: &mut EndpointSettings| {
        if alias.is_empty() {
            return Err("alias must not be empty".to_string());
        }
        e.aliases.push(alias.clone());
        Ok(())
    })
}

/// Endpoint-level MAC address, for use with [`endpoint`]
pub fn endpoint_mac(mac: &str) -> Op<EndpointSettings> {
    Op::or_fail(
        "mac_address",
        parse_mac(mac).map(|mac| {
            Op::infallible("mac_address", move |e: &mut EndpointSettings| {
                e.mac_address = Some(mac.clone())
            })
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;
    use crate::error::ErrorKind;

    #[test]
    fn test_endpoint_setters() {
        let mut net = NetworkingConfig::default();
        let errors = apply(
            &mut net,
            [
                alias("front", "web"),
                ipv4_address("front", "172.20.0.10"),
                ipv6_address("front", "fd00::10"),
                mac_address("front", "02:42:ac:14:00:0a"),
                attach("back"),
            ],
        );
        assert!(errors.is_empty());
        let front = &net.endpoints["front"];
        assert_eq!(front.aliases, vec!["web"]);
        assert_eq!(front.ipv4_address, Some(Ipv4Addr::new(172, 20, 0, 10)));
        assert!(front.ipv6_address.is_some());
        assert_eq!(front.mac_address.as_deref(), Some("02:42:ac:14:00:0a"));
        assert!(net.endpoints.contains_key("back"));
    }

    #[test]
    fn test_invalid_addresses_collected() {
        let mut net = NetworkingConfig::default();
        let errors = apply(
            &mut net,
            [ipv4_address("front", "300.1.1.1"), ipv6_address("front", "::zz")],
        );
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::Network));
        assert_eq!(errors[0].field, "networks.front.ipv4_address");
        assert!(net.endpoints.is_empty());
    }

    #[test]
    fn test_nested_endpoint_failure_propagates() {
        let mut net = NetworkingConfig::default();
        let errors = apply(
            &mut net,
            [endpoint("front", [endpoint_alias("web"), endpoint_mac("bad")])],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "networks.front.endpoint");
        assert!(errors[0].message.starts_with("mac_address:"));
        assert_eq!(net.endpoints["front"].aliases, vec!["web"]);
    }
}
