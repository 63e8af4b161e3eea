//! Setters for project-level networks and volumes

/// Network definition setters
pub mod network {
    use crate::builder::Op;
    use crate::project::{IpamPool, NetworkDefinition};
    use std::net::IpAddr;

    pub fn driver(driver: &str) -> Op<NetworkDefinition> {
        let driver = driver.to_string();
        Op::new("networks.driver", move |n: &mut NetworkDefinition| {
            if n.external {
                return Err("external networks cannot set a driver".to_string());
            }
            n.driver = Some(driver.clone());
            Ok(())
        })
    }

    pub fn driver_opt(key: &str, value: &str) -> Op<NetworkDefinition> {
        let (key, value) = (key.to_string(), value.to_string());
        Op::infallible("networks.driver_opts", move |n: &mut NetworkDefinition| {
            n.driver_opts.insert(key.clone(), value.clone());
        })
    }

    pub fn label(key: &str, value: &str) -> Op<NetworkDefinition> {
        let (key, value) = (key.to_string(), value.to_string());
        Op::infallible("networks.labels", move |n: &mut NetworkDefinition| {
            n.labels.insert(key.clone(), value.clone());
        })
    }

    /// Use a network created outside the project
    pub fn external(name: Option<&str>) -> Op<NetworkDefinition> {
        let name = name.map(str::to_string);
        Op::new("networks.external", move |n: &mut NetworkDefinition| {
            if n.driver.is_some() || !n.ipam.is_empty() {
                return Err("external networks cannot be configured".to_string());
            }
            n.external = true;
            n.name = name.clone();
            Ok(())
        })
    }

    pub fn internal(internal: bool) -> Op<NetworkDefinition> {
        Op::infallible("networks.internal", move |n: &mut NetworkDefinition| n.internal = internal)
    }

    pub fn attachable(attachable: bool) -> Op<NetworkDefinition> {
        Op::infallible("networks.attachable", move |n: &mut NetworkDefinition| {
            n.attachable = attachable
        })
    }

    pub fn enable_ipv6(enable: bool) -> Op<NetworkDefinition> {
        Op::infallible("networks.enable_ipv6", move |n: &mut NetworkDefinition| {
            n.enable_ipv6 = enable
        })
    }

    fn parse_cidr(cidr: &str) -> Result<IpAddr, String> {
        let (addr, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| format!("invalid subnet {:?}: missing prefix length", cidr))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid subnet {:?}", cidr))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        match prefix.parse::<u8>() {
            Ok(p) if p <= max => Ok(addr),
            _ => Err(format!("invalid prefix length in {:?}", cidr)),
        }
    }

    /// Add an IPAM pool
    pub fn subnet(cidr: &str, gateway: Option<&str>) -> Op<NetworkDefinition> {
        let checked = parse_cidr(cidr).and_then(|net| match gateway {
            Some(gw) => {
                let gw_addr: IpAddr = gw
                    .parse()
                    .map_err(|_| format!("invalid gateway {:?}", gw))?;
                if gw_addr.is_ipv4() != net.is_ipv4() {
                    return Err(format!("gateway {:?} does not match subnet {:?}", gw, cidr));
                }
                Ok(())
            }
            None => Ok(()),
        });
        let pool = IpamPool {
            subnet: cidr.to_string(),
            gateway: gateway.map(str::to_string),
            ip_range: None,
        };
        Op::or_fail(
            "networks.ipam",
            checked.map(|()| {
                Op::new("networks.ipam", move |n: &mut NetworkDefinition| {
                    if n.external {
                        return Err("external networks cannot set IPAM".to_string());
                    }
                    if n.ipam.iter().any(|p| p.subnet == pool.subnet) {
                        return Err(format!("duplicate subnet {:?}", pool.subnet));
                    }
                    n.ipam.push(pool.clone());
                    Ok(())
                })
            }),
        )
    }
}

/// Volume definition setters
pub mod volume {
    use crate::builder::Op;
    use crate::project::VolumeDefinition;

    pub fn driver(driver: &str) -> Op<VolumeDefinition> {
        let driver = driver.to_string();
        Op::new("volumes.driver", move |v: &mut VolumeDefinition| {
            if v.external {
                return Err("external volumes cannot set a driver".to_string());
            }
            v.driver = Some(driver.clone());
            Ok(())
        })
    }

    pub fn driver_opt(key: &str, value: &str) -> Op<VolumeDefinition> {
        let (key, value) = (key.to_string(), value.to_string());
        Op::infallible("volumes.driver_opts", move |v: &mut VolumeDefinition| {
            v.driver_opts.insert(key.clone(), value.clone());
        })
    }

    pub fn label(key: &str, value: &str) -> Op<VolumeDefinition> {
        let (key, value) = (key.to_string(), value.to_string());
        Op::infallible("volumes.labels", move |v: &mut VolumeDefinition| {
            v.labels.insert(key.clone(), value.clone());
        })
    }

    pub fn external(name: Option<&str>) -> Op<VolumeDefinition> {
        let name = name.map(str::to_string);
        Op::new("volumes.external", move |v: &mut VolumeDefinition| {
            if v.driver.is_some() {
                return Err("external volumes cannot be configured".to_string());
            }
            v.external = true;
            v.name = name.clone();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;
    use crate::project::NetworkDefinition;

    #[test]
    fn test_network_subnets() {
        let mut net = NetworkDefinition::default();
        let errors = apply(
            &mut net,
            [
                network::driver("bridge"),
                network::subnet("172.28.0.0/16", Some("172.28.0.1")),
                network::subnet("172.28.0.0/16", None),
                network::subnet("10.0.0.0/40", None),
                network::subnet("fd00::/64", Some("10.0.0.1")),
            ],
        );
        assert_eq!(errors.len(), 3);
        assert_eq!(net.ipam.len(), 1);
        assert_eq!(net.ipam[0].gateway.as_deref(), Some("172.28.0.1"));
    }

    #[test]
    fn test_external_network_cannot_be_configured() {
        let mut net = NetworkDefinition::default();
        let errors = apply(&mut net, [network::external(Some("shared")), network::driver("overlay")]);
        assert_eq!(errors.len(), 1);
        assert!(net.external);
        assert_eq!(net.name.as_deref(), Some("shared"));
    }
}
