//! Host-level setters: resources, mounts, published ports, policies

use super::Op;
use crate::container::host::parse_size;
use crate::container::{
    BindSpec, HostConfig, Mount, PublishSpec, RestartPolicy, ThrottleDevice, Ulimit, WeightDevice,
};
use std::collections::BTreeMap;

/// Memory limit, e.g. `512m`
pub fn memory(size: &str) -> Op<HostConfig> {
    Op::or_fail(
        "mem_limit",
        parse_size(size).map(|bytes| {
            Op::new("mem_limit", move |h: &mut HostConfig| {
                if bytes < 6 * 1024 * 1024 {
                    return Err("minimum memory limit is 6MiB".to_string());
                }
                h.memory = bytes;
                Ok(())
            })
        }),
    )
}

pub fn memory_reservation(size: &str) -> Op<HostConfig> {
    Op::or_fail(
        "mem_reservation",
        parse_size(size).map(|bytes| {
            Op::infallible("mem_reservation", move |h: &mut HostConfig| {
                h.memory_reservation = bytes
            })
        }),
    )
}

/// Memory plus swap limit; `-1` for unlimited swap
pub fn memory_swap(size: &str) -> Op<HostConfig> {
    let parsed = if size.trim() == "-1" {
        Ok(-1)
    } else {
        parse_size(size)
    };
    Op::or_fail(
        "memswap_limit",
        parsed.map(|bytes| {
            Op::infallible("memswap_limit", move |h: &mut HostConfig| h.memory_swap = bytes)
        }),
    )
}

/// Kernel swappiness, 0 to 100
pub fn memory_swappiness(value: i64) -> Op<HostConfig> {
    Op::new("mem_swappiness", move |h: &mut HostConfig| {
        if !(0..=100).contains(&value) {
            return Err(format!("swappiness {} out of range 0-100", value));
        }
        h.memory_swappiness = Some(value);
        Ok(())
    })
}

pub fn oom_kill_disable(disable: bool) -> Op<HostConfig> {
    Op::infallible("oom_kill_disable", move |h: &mut HostConfig| {
        h.oom_kill_disable = Some(disable)
    })
}

/// Process count limit; `0` and negative values are passed through as given
pub fn pids_limit(limit: i64) -> Op<HostConfig> {
    Op::infallible("pids_limit", move |h: &mut HostConfig| h.pids_limit = Some(limit))
}

/// Fractional CPU count, stored as nano-CPUs
pub fn cpus(count: f64) -> Op<HostConfig> {
    Op::new("cpus", move |h: &mut HostConfig| {
        if !count.is_finite() || count < 0.0 {
            return Err(format!("invalid CPU count {}", count));
        }
        h.nano_cpus = (count * 1e9).round() as i64;
        Ok(())
    })
}

pub fn cpu_shares(shares: i64) -> Op<HostConfig> {
    Op::new("cpu_shares", move |h: &mut HostConfig| {
        if shares < 0 {
            return Err(format!("invalid CPU shares {}", shares));
        }
        h.cpu_shares = shares;
        Ok(())
    })
}

pub fn cpu_quota(period_us: i64, quota_us: i64) -> Op<HostConfig> {
    Op::new("cpu_quota", move |h: &mut HostConfig| {
        if !(1_000..=1_000_000).contains(&period_us) {
            return Err(format!("CPU period {} out of range 1000-1000000", period_us));
        }
        if quota_us != -1 && quota_us < 1_000 {
            return Err(format!("CPU quota {} below 1000", quota_us));
        }
        h.cpu_period = period_us;
        h.cpu_quota = quota_us;
        Ok(())
    })
}

pub fn cpuset(cpus: &str) -> Op<HostConfig> {
    let cpus = cpus.to_string();
    Op::new("cpuset", move |h: &mut HostConfig| {
        let valid = !cpus.is_empty()
            && cpus
                .split(',')
                .flat_map(|part| part.split('-'))
                .all(|n| n.parse::<u32>().is_ok());
        if !valid {
            return Err(format!("invalid cpuset {:?}", cpus));
        }
        h.cpuset_cpus = cpus.clone();
        Ok(())
    })
}

pub fn shm_size(size: &str) -> Op<HostConfig> {
    Op::or_fail(
        "shm_size",
        parse_size(size).map(|bytes| {
            Op::infallible("shm_size", move |h: &mut HostConfig| h.shm_size = bytes)
        }),
    )
}

pub fn restart(policy: RestartPolicy) -> Op<HostConfig> {
    Op::infallible("restart", move |h: &mut HostConfig| h.restart_policy = policy)
}

fn normalize_cap(cap: &str) -> Result<String, String> {
    let cap = cap.trim().to_ascii_uppercase();
    if cap.is_empty() || !cap.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("invalid capability {:?}", cap));
    }
    if cap == "ALL" || cap.starts_with("CAP_") {
        Ok(cap)
    } else {
        Ok(format!("CAP_{}", cap))
    }
}

pub fn cap_add(cap: &str) -> Op<HostConfig> {
    let cap = cap.to_string();
    Op::new("cap_add", move |h: &mut HostConfig| {
        let cap = normalize_cap(&cap)?;
        if !h.cap_add.contains(&cap) {
            h.cap_add.push(cap);
        }
        Ok(())
    })
}

pub fn cap_drop(cap: &str) -> Op<HostConfig> {
    let cap = cap.to_string();
    Op::new("cap_drop", move |h: &mut HostConfig| {
        let cap = normalize_cap(&cap)?;
        if !h.cap_drop.contains(&cap) {
            h.cap_drop.push(cap);
        }
        Ok(())
    })
}

/// Bind from a `source:target[:mode]` string
pub fn bind(spec: &str) -> Op<HostConfig> {
    Op::or_fail(
        "volumes",
        BindSpec::parse(spec).map(|bind| {
            Op::new("volumes", move |h: &mut HostConfig| {
                if h.binds.iter().any(|b| b.target() == bind.target())
                    || h.mounts.iter().any(|m| m.target == bind.target())
                {
                    return Err(format!("duplicate mount point {:?}", bind.target()));
                }
                h.binds.push(bind.clone());
                Ok(())
            })
        }),
    )
}

/// Structured mount
pub fn mount(mount: Mount) -> Op<HostConfig> {
    Op::new("volumes", move |h: &mut HostConfig| {
        if !mount.target.starts_with('/') {
            return Err(format!("mount target {:?} is not absolute", mount.target));
        }
        if h.mounts.iter().any(|m| m.target == mount.target)
            || h.binds.iter().any(|b| b.target() == mount.target)
        {
            return Err(format!("duplicate mount point {:?}", mount.target));
        }
        h.mounts.push(mount.clone());
        Ok(())
    })
}

/// Publish a port from `[host_ip:][host_port:]container_port[/protocol]`
///
/// Publishing the same container port more than once adds another host
/// binding for it.
pub fn publish(spec: &str) -> Op<HostConfig> {
    Op::or_fail(
        "ports",
        spec.parse::<PublishSpec>().map(|spec| {
            Op::infallible("ports", move |h: &mut HostConfig| {
                let bindings = h.port_bindings.entry(spec.container).or_default();
                if !bindings.contains(&spec.binding) {
                    bindings.push(spec.binding.clone());
                }
            })
        }),
    )
}

pub fn security_opt(opt: &str) -> Op<HostConfig> {
    let opt = opt.to_string();
    Op::new("security_opt", move |h: &mut HostConfig| {
        if opt != "no-new-privileges" && !opt.contains(&['=', ':'][..]) {
            return Err(format!("invalid security option {:?}", opt));
        }
        h.security_opt.push(opt.clone());
        Ok(())
    })
}

pub fn sysctl(key: &str, value: &str) -> Op<HostConfig> {
    let (key, value) = (key.to_string(), value.to_string());
    Op::new("sysctls", move |h: &mut HostConfig| {
        if key.is_empty() || key.contains('=') {
            return Err(format!("invalid sysctl {:?}", key));
        }
        h.sysctls.insert(key.clone(), value.clone());
        Ok(())
    })
}

pub fn ulimit(name: &str, soft: i64, hard: i64) -> Op<HostConfig> {
    let name = name.to_string();
    Op::new("ulimits", move |h: &mut HostConfig| {
        if soft > hard {
            return Err(format!("ulimit {}: soft limit {} exceeds hard limit {}", name, soft, hard));
        }
        h.ulimits.retain(|u| u.name != name);
        h.ulimits.push(Ulimit {
            name: name.clone(),
            soft,
            hard,
        });
        Ok(())
    })
}

/// Logging driver with its options
pub fn logging(driver: &str, options: &[(&str, &str)]) -> Op<HostConfig> {
    let driver = driver.to_string();
    let options: BTreeMap<String, String> = options
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Op::new("logging", move |h: &mut HostConfig| {
        if driver.is_empty() {
            return Err("logging driver must not be empty".to_string());
        }
        h.log_config.driver = driver.clone();
        h.log_config.options = options.clone();
        Ok(())
    })
}

/// Relative block IO weight, 10 to 1000
pub fn blkio_weight(weight: u16) -> Op<HostConfig> {
    Op::new("blkio_config.weight", move |h: &mut HostConfig| {
        if !(10..=1000).contains(&weight) {
            return Err(format!("blkio weight {} out of range 10-1000", weight));
        }
        h.blkio.weight = weight;
        Ok(())
    })
}

pub fn blkio_weight_device(path: &str, weight: u16) -> Op<HostConfig> {
    let path = path.to_string();
    Op::new("blkio_config.weight_device", move |h: &mut HostConfig| {
        if !(10..=1000).contains(&weight) {
            return Err(format!("blkio weight {} out of range 10-1000", weight));
        }
        h.blkio.weight_device.push(WeightDevice {
            path: path.clone(),
            weight,
        });
        Ok(())
    })
}

/// Which per-device throttle list a rate applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    ReadBps,
    ReadIops,
    WriteBps,
    WriteIops,
}

impl Throttle {
    fn field(self) -> &'static str {
        match self {
            Throttle::ReadBps => "blkio_config.device_read_bps",
            Throttle::ReadIops => "blkio_config.device_read_iops",
            Throttle::WriteBps => "blkio_config.device_write_bps",
            Throttle::WriteIops => "blkio_config.device_write_iops",
        }
    }
}

pub fn blkio_throttle(throttle: Throttle, path: &str, rate: u64) -> Op<HostConfig> {
    let path = path.to_string();
    Op::new(throttle.field(), move |h: &mut HostConfig| {
        if !path.starts_with("/dev/") {
            return Err(format!("{:?} is not a device path", path));
        }
        let device = ThrottleDevice {
            path: path.clone(),
            rate,
        };
        let list = match throttle {
            Throttle::ReadBps => &mut h.blkio.device_read_bps,
            Throttle::ReadIops => &mut h.blkio.device_read_iops,
            Throttle::WriteBps => &mut h.blkio.device_write_bps,
            Throttle::WriteIops => &mut h.blkio.device_write_iops,
        };
        list.push(device);
        Ok(())
    })
}

pub fn privileged(enabled: bool) -> Op<HostConfig> {
    Op::infallible("privileged", move |h: &mut HostConfig| h.privileged = enabled)
}

pub fn read_only(enabled: bool) -> Op<HostConfig> {
    Op::infallible("read_only", move |h: &mut HostConfig| h.readonly_rootfs = enabled)
}

pub fn init(enabled: bool) -> Op<HostConfig> {
    Op::infallible("init", move |h: &mut HostConfig| h.init = Some(enabled))
}

pub fn network_mode(mode: &str) -> Op<HostConfig> {
    let mode = mode.to_string();
    Op::infallible("network_mode", move |h: &mut HostConfig| h.network_mode = mode.clone())
}

pub fn pid_mode(mode: &str) -> Op<HostConfig> {
    let mode = mode.to_string();
    Op::infallible("pid", move |h: &mut HostConfig| h.pid_mode = mode.clone())
}

pub fn ipc_mode(mode: &str) -> Op<HostConfig> {
    let mode = mode.to_string();
    Op::infallible("ipc", move |h: &mut HostConfig| h.ipc_mode = mode.clone())
}

pub fn dns(server: &str) -> Op<HostConfig> {
    let server = server.to_string();
    Op::new("dns", move |h: &mut HostConfig| {
        server
            .parse::<std::net::IpAddr>()
            .map_err(|_| format!("invalid DNS server {:?}", server))?;
        h.dns.push(server.clone());
        Ok(())
    })
}

pub fn dns_search(domain: &str) -> Op<HostConfig> {
    let domain = domain.to_string();
    Op::infallible("dns_search", move |h: &mut HostConfig| h.dns_search.push(domain.clone()))
}

/// Extra `/etc/hosts` entry
pub fn extra_host(host: &str, ip: &str) -> Op<HostConfig> {
    let (host, ip) = (host.to_string(), ip.to_string());
    Op::new("extra_hosts", move |h: &mut HostConfig| {
        if host.is_empty() {
            return Err("extra host name must not be empty".to_string());
        }
        if ip != "host-gateway" && ip.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("invalid IP address {:?} for host {:?}", ip, host));
        }
        h.extra_hosts.push(format!("{}:{}", host, ip));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;
    use crate::container::{MountType, PortBinding, PortProto};

    #[test]
    fn test_memory_parse_failures_are_collected() {
        let mut host = HostConfig::default();
        let errors = apply(&mut host, [memory("1m"), memory("bogus"), memory("256m")]);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.field == "mem_limit"));
        assert_eq!(host.memory, 256 * 1024 * 1024);
    }

    #[test]
    fn test_publish_same_port_twice() {
        let mut host = HostConfig::default();
        let errors = apply(
            &mut host,
            [
                publish("127.0.0.1:8080:80"),
                publish("10.0.0.5:8080:80/tcp"),
                publish("127.0.0.1:8080:80"),
            ],
        );
        assert!(errors.is_empty());
        let bindings = &host.port_bindings[&PortProto::tcp(80)];
        assert_eq!(
            bindings,
            &vec![
                PortBinding {
                    host_ip: "127.0.0.1".to_string(),
                    host_port: "8080".to_string()
                },
                PortBinding {
                    host_ip: "10.0.0.5".to_string(),
                    host_port: "8080".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_bind_and_mount_conflict() {
        let mut host = HostConfig::default();
        let errors = apply(
            &mut host,
            [
                bind("./data:/data:ro"),
                mount(Mount::new(MountType::Tmpfs, "", "/data")),
                bind("nonsense"),
            ],
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(host.binds.len(), 1);
        assert!(host.mounts.is_empty());
    }

    #[test]
    fn test_capabilities_normalized() {
        let mut host = HostConfig::default();
        let errors = apply(&mut host, [cap_add("net_admin"), cap_add("CAP_NET_ADMIN"), cap_drop("ALL")]);
        assert!(errors.is_empty());
        assert_eq!(host.cap_add, vec!["CAP_NET_ADMIN"]);
        assert_eq!(host.cap_drop, vec!["ALL"]);
    }

    #[test]
    fn test_pointer_fields() {
        let mut host = HostConfig::default();
        assert_eq!(host.pids_limit, None);
        let errors = apply(&mut host, [pids_limit(0), memory_swappiness(101), oom_kill_disable(false)]);
        assert_eq!(errors.len(), 1);
        assert_eq!(host.pids_limit, Some(0));
        assert_eq!(host.memory_swappiness, None);
        assert_eq!(host.oom_kill_disable, Some(false));
    }

    #[test]
    fn test_blkio_throttle_validation() {
        let mut host = HostConfig::default();
        let errors = apply(
            &mut host,
            [
                blkio_throttle(Throttle::WriteIops, "/dev/sda", 100),
                blkio_throttle(Throttle::ReadBps, "sda", 100),
                blkio_weight(5),
            ],
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "blkio_config.device_read_bps");
        assert_eq!(host.blkio.device_write_iops.len(), 1);
        assert_eq!(host.blkio.weight, 0);
    }

    #[test]
    fn test_ulimit_replaces_by_name() {
        let mut host = HostConfig::default();
        let errors = apply(
            &mut host,
            [ulimit("nofile", 1024, 2048), ulimit("nofile", 4096, 8192), ulimit("nproc", 10, 5)],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(host.ulimits.len(), 1);
        assert_eq!(host.ulimits[0].soft, 4096);
    }
}
