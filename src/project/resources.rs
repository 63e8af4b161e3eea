//! Project-level networks and volumes

use std::collections::BTreeMap;

/// IPAM address pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpamPool {
    pub subnet: String,
    pub gateway: Option<String>,
    pub ip_range: Option<String>,
}

/// A network declared by the project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDefinition {
    /// Name on the engine, when it differs from the project key
    pub name: Option<String>,
    pub driver: Option<String>,
    pub driver_opts: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub external: bool,
    pub internal: bool,
    pub attachable: bool,
    pub enable_ipv6: bool,
    pub ipam: Vec<IpamPool>,
}

/// A named volume declared by the project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeDefinition {
    pub name: Option<String>,
    pub driver: Option<String>,
    pub driver_opts: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub external: bool,
}
