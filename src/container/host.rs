//! Host-level container configuration: resources, mounts, ports, policies

use super::config::PortProto;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Restart policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    #[default]
    No,
    OnFailure { max_retries: u32 },
    Always,
    UnlessStopped,
}

impl RestartPolicy {
    /// Engine API policy name
    pub fn name(&self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::OnFailure { .. } => "on-failure",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::OnFailure { max_retries } if *max_retries > 0 => {
                write!(f, "on-failure:{}", max_retries)
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, retries) = match s.split_once(':') {
            Some((name, n)) => (name, Some(n)),
            None => (s, None),
        };
        match (name, retries) {
            ("" | "no", None) => Ok(RestartPolicy::No),
            ("always", None) => Ok(RestartPolicy::Always),
            ("unless-stopped", None) => Ok(RestartPolicy::UnlessStopped),
            ("on-failure", None) => Ok(RestartPolicy::OnFailure { max_retries: 0 }),
            ("on-failure", Some(n)) => n
                .parse()
                .map(|max_retries| RestartPolicy::OnFailure { max_retries })
                .map_err(|_| format!("invalid restart count {:?}", n)),
            _ => Err(format!("invalid restart policy {:?}", s)),
        }
    }
}

/// Mount propagation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Private,
    Rprivate,
    Shared,
    Rshared,
    Slave,
    Rslave,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Propagation::Private => "private",
            Propagation::Rprivate => "rprivate",
            Propagation::Shared => "shared",
            Propagation::Rshared => "rshared",
            Propagation::Slave => "slave",
            Propagation::Rslave => "rslave",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Propagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Propagation::Private),
            "rprivate" => Ok(Propagation::Rprivate),
            "shared" => Ok(Propagation::Shared),
            "rshared" => Ok(Propagation::Rshared),
            "slave" => Ok(Propagation::Slave),
            "rslave" => Ok(Propagation::Rslave),
            other => Err(format!("invalid propagation mode {:?}", other)),
        }
    }
}

/// SELinux relabeling requested on a bind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelinuxLabel {
    /// `z`: content shared between containers
    Shared,
    /// `Z`: content private to this container
    Private,
}

impl fmt::Display for SelinuxLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelinuxLabel::Shared => write!(f, "z"),
            SelinuxLabel::Private => write!(f, "Z"),
        }
    }
}

/// A host bind parsed from `source:target[:mode]`
///
/// Only constructed through [`BindSpec::parse`], so holders never need to
/// re-validate the string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindSpec {
    source: String,
    target: String,
    read_only: bool,
    propagation: Option<Propagation>,
    selinux: Option<SelinuxLabel>,
    nocopy: bool,
}

impl BindSpec {
    /// Parse and validate a bind string
    pub fn parse(spec: &str) -> Result<Self, String> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (source, target, mode) = match parts.as_slice() {
            [source, target] => (*source, *target, None),
            [source, target, mode] => (*source, *target, Some(*mode)),
            _ => return Err(format!("invalid bind {:?}: expected source:target[:mode]", spec)),
        };
        if source.is_empty() {
            return Err(format!("invalid bind {:?}: empty source", spec));
        }
        if !target.starts_with('/') {
            return Err(format!(
                "invalid bind {:?}: target {:?} is not an absolute path",
                spec, target
            ));
        }

        let mut bind = Self {
            source: source.to_string(),
            target: target.to_string(),
            read_only: false,
            propagation: None,
            selinux: None,
            nocopy: false,
        };

        let mut access_set = false;
        for token in mode.into_iter().flat_map(|m| m.split(',')) {
            match token {
                "ro" | "rw" => {
                    if access_set {
                        return Err(format!("invalid bind {:?}: duplicate access mode", spec));
                    }
                    access_set = true;
                    bind.read_only = token == "ro";
                }
                "z" | "Z" => {
                    if bind.selinux.is_some() {
                        return Err(format!("invalid bind {:?}: duplicate SELinux label", spec));
                    }
                    bind.selinux = Some(if token == "z" {
                        SelinuxLabel::Shared
                    } else {
                        SelinuxLabel::Private
                    });
                }
                "nocopy" => bind.nocopy = true,
                other => {
                    let propagation = other
                        .parse::<Propagation>()
                        .map_err(|_| format!("invalid bind {:?}: unknown mode {:?}", spec, other))?;
                    if bind.propagation.replace(propagation).is_some() {
                        return Err(format!("invalid bind {:?}: duplicate propagation", spec));
                    }
                }
            }
        }

        Ok(bind)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn propagation(&self) -> Option<Propagation> {
        self.propagation
    }

    pub fn selinux(&self) -> Option<SelinuxLabel> {
        self.selinux
    }

    pub fn nocopy(&self) -> bool {
        self.nocopy
    }

    /// Whether the source names a volume rather than a host path
    pub fn is_named_volume(&self) -> bool {
        !(self.source.starts_with('/') || self.source.starts_with('.') || self.source.starts_with('~'))
    }
}

impl fmt::Display for BindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.target)?;
        let mut mode = Vec::new();
        if self.read_only {
            mode.push("ro".to_string());
        }
        if let Some(label) = self.selinux {
            mode.push(label.to_string());
        }
        if let Some(propagation) = self.propagation {
            mode.push(propagation.to_string());
        }
        if self.nocopy {
            mode.push("nocopy".to_string());
        }
        if !mode.is_empty() {
            write!(f, ":{}", mode.join(","))?;
        }
        Ok(())
    }
}

/// Structured mount type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountType {
    Bind,
    Volume,
    Tmpfs,
}

impl fmt::Display for MountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountType::Bind => write!(f, "bind"),
            MountType::Volume => write!(f, "volume"),
            MountType::Tmpfs => write!(f, "tmpfs"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindOptions {
    pub propagation: Option<Propagation>,
    pub create_mountpoint: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeOptions {
    pub no_copy: bool,
    pub labels: BTreeMap<String, String>,
    pub subpath: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TmpfsOptions {
    /// Size in bytes, 0 for unlimited
    pub size_bytes: i64,
    /// Permission bits
    pub mode: u32,
}

/// Structured mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub kind: MountType,
    pub source: String,
    pub target: String,
    pub read_only: bool,
    pub consistency: Option<String>,
    pub bind_options: Option<BindOptions>,
    pub volume_options: Option<VolumeOptions>,
    pub tmpfs_options: Option<TmpfsOptions>,
}

impl Mount {
    pub fn new(kind: MountType, source: &str, target: &str) -> Self {
        Self {
            kind,
            source: source.to_string(),
            target: target.to_string(),
            read_only: false,
            consistency: None,
            bind_options: None,
            volume_options: None,
            tmpfs_options: None,
        }
    }
}

/// One host-side binding of a container port
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// A parsed `[host_ip:][host_port:]container_port[/protocol]` publish spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSpec {
    pub container: PortProto,
    pub binding: PortBinding,
}

impl FromStr for PublishSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // IPv6 hosts are bracketed: [::1]:8080:80
        let (host_ip, rest) = if let Some(stripped) = s.strip_prefix('[') {
            let (ip, rest) = stripped
                .split_once("]:")
                .ok_or_else(|| format!("invalid port spec {:?}", s))?;
            (ip.to_string(), rest)
        } else {
            (String::new(), s)
        };

        let parts: Vec<&str> = rest.split(':').collect();
        let (ip, host_port, container) = match (host_ip.is_empty(), parts.as_slice()) {
            (true, [container]) => (String::new(), String::new(), *container),
            (true, [host_port, container]) => (String::new(), host_port.to_string(), *container),
            (true, [ip, host_port, container]) => (ip.to_string(), host_port.to_string(), *container),
            (false, [host_port, container]) => (host_ip, host_port.to_string(), *container),
            _ => return Err(format!("invalid port spec {:?}", s)),
        };

        if !host_port.is_empty() && !is_port_or_range(&host_port) {
            return Err(format!("invalid host port {:?} in {:?}", host_port, s));
        }

        Ok(Self {
            container: container.parse()?,
            binding: PortBinding {
                host_ip: ip,
                host_port,
            },
        })
    }
}

fn is_port_or_range(s: &str) -> bool {
    match s.split_once('-') {
        Some((start, end)) => start.parse::<u16>().is_ok() && end.parse::<u16>().is_ok(),
        None => s.parse::<u16>().is_ok(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ulimit {
    pub name: String,
    pub soft: i64,
    pub hard: i64,
}

/// Logging driver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub driver: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightDevice {
    pub path: String,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleDevice {
    pub path: String,
    pub rate: u64,
}

/// Block IO settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlkioSettings {
    pub weight: u16,
    pub weight_device: Vec<WeightDevice>,
    pub device_read_bps: Vec<ThrottleDevice>,
    pub device_read_iops: Vec<ThrottleDevice>,
    pub device_write_bps: Vec<ThrottleDevice>,
    pub device_write_iops: Vec<ThrottleDevice>,
}

impl BlkioSettings {
    pub fn is_zero(&self) -> bool {
        self.weight == 0
            && self.weight_device.is_empty()
            && self.device_read_bps.is_empty()
            && self.device_read_iops.is_empty()
            && self.device_write_bps.is_empty()
            && self.device_write_iops.is_empty()
    }
}

/// Host configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostConfig {
    /// Memory limit in bytes
    pub memory: i64,
    /// Memory soft limit in bytes
    pub memory_reservation: i64,
    /// Memory plus swap limit in bytes, -1 for unlimited
    pub memory_swap: i64,
    pub memory_swappiness: Option<i64>,
    pub oom_kill_disable: Option<bool>,
    pub pids_limit: Option<i64>,
    pub cpu_shares: i64,
    pub cpu_period: i64,
    pub cpu_quota: i64,
    /// CPU quota in units of 1e-9 CPUs
    pub nano_cpus: i64,
    pub cpuset_cpus: String,
    pub shm_size: i64,
    pub blkio: BlkioSettings,
    pub restart_policy: RestartPolicy,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub binds: Vec<BindSpec>,
    pub mounts: Vec<Mount>,
    pub port_bindings: BTreeMap<PortProto, Vec<PortBinding>>,
    pub security_opt: Vec<String>,
    pub sysctls: BTreeMap<String, String>,
    pub ulimits: Vec<Ulimit>,
    pub log_config: LogConfig,
    pub privileged: bool,
    pub readonly_rootfs: bool,
    pub init: Option<bool>,
    pub network_mode: String,
    pub pid_mode: String,
    pub ipc_mode: String,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub extra_hosts: Vec<String>,
}

impl HostConfig {
    /// CPU count derived from `nano_cpus`
    pub fn cpus(&self) -> f64 {
        self.nano_cpus as f64 / 1e9
    }
}

/// Parse a human size such as `512m` or `1.5GiB` into bytes (binary units)
pub fn parse_size(s: &str) -> Result<i64, String> {
    static SIZE_RE: OnceLock<Regex> = OnceLock::new();
    let re = SIZE_RE.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)?)\s*([kKmMgGtTpP]?)(?:[iI]?[bB])?$").expect("valid size regex")
    });

    let caps = re
        .captures(s.trim())
        .ok_or_else(|| format!("invalid size {:?}", s))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| format!("invalid size {:?}", s))?;
    let multiplier: f64 = match caps[2].to_ascii_lowercase().as_str() {
        "" => 1.0,
        "k" => 1024.0,
        "m" => 1024.0 * 1024.0,
        "g" => 1024.0 * 1024.0 * 1024.0,
        "t" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
    };
    let bytes = value * multiplier;
    if bytes > i64::MAX as f64 {
        return Err(format!("size {:?} out of range", s));
    }
    Ok(bytes as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind_read_only() {
        let bind = BindSpec::parse("/srv/data:/data:ro").unwrap();
        assert_eq!(bind.source(), "/srv/data");
        assert_eq!(bind.target(), "/data");
        assert!(bind.read_only());
        assert_eq!(bind.to_string(), "/srv/data:/data:ro");
    }

    #[test]
    fn test_parse_bind_modes() {
        let bind = BindSpec::parse("cache:/var/cache:rw,Z,rslave").unwrap();
        assert!(!bind.read_only());
        assert_eq!(bind.selinux(), Some(SelinuxLabel::Private));
        assert_eq!(bind.propagation(), Some(Propagation::Rslave));
        assert!(bind.is_named_volume());
    }

    #[test]
    fn test_parse_bind_rejects_invalid() {
        assert!(BindSpec::parse("/only-source").is_err());
        assert!(BindSpec::parse(":/data").is_err());
        assert!(BindSpec::parse("/a:relative").is_err());
        assert!(BindSpec::parse("/a:/b:ro,rw").is_err());
        assert!(BindSpec::parse("/a:/b:bogus").is_err());
        assert!(BindSpec::parse("/a:/b:c:d").is_err());
    }

    #[test]
    fn test_parse_publish_spec() {
        let spec: PublishSpec = "0.0.0.0:8080:80/tcp".parse().unwrap();
        assert_eq!(spec.container, PortProto::tcp(80));
        assert_eq!(spec.binding.host_ip, "0.0.0.0");
        assert_eq!(spec.binding.host_port, "8080");

        let spec: PublishSpec = "[::1]:53:53/udp".parse().unwrap();
        assert_eq!(spec.binding.host_ip, "::1");
        assert_eq!(spec.container, PortProto::udp(53));

        let spec: PublishSpec = "9000".parse().unwrap();
        assert_eq!(spec.binding, PortBinding::default());

        assert!("a:b:c:d".parse::<PublishSpec>().is_err());
        assert!("x:80".parse::<PublishSpec>().is_err());
    }

    #[test]
    fn test_restart_policy_round_trip() {
        let policy: RestartPolicy = "on-failure:3".parse().unwrap();
        assert_eq!(policy, RestartPolicy::OnFailure { max_retries: 3 });
        assert_eq!(policy.to_string(), "on-failure:3");
        assert_eq!("unless-stopped".parse::<RestartPolicy>().unwrap(), RestartPolicy::UnlessStopped);
        assert!("sometimes".parse::<RestartPolicy>().is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("64k").unwrap(), 64 * 1024);
        assert_eq!(parse_size("512m").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_size("1GiB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("1.5g").unwrap(), 3 * 512 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_blkio_zero() {
        let mut blkio = BlkioSettings::default();
        assert!(blkio.is_zero());
        blkio.device_read_bps.push(ThrottleDevice {
            path: "/dev/sda".to_string(),
            rate: 1024,
        });
        assert!(!blkio.is_zero());
    }
}
