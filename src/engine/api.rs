//! Engine API wire types for container creation

use crate::container::{
    BindOptions, Container, ContainerConfig, HealthConfig, HostConfig, Mount, NetworkingConfig,
    RestartPolicy, ThrottleDevice, TmpfsOptions, VolumeOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Empty JSON object, used as a set member marker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Empty {}

/// Body of `POST /containers/create`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entrypoint: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub working_dir: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domainname: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub exposed_ports: BTreeMap<String, Empty>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    pub tty: bool,
    pub open_stdin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<String>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<u64>,
    pub host_config: HostConfigBody,
    pub networking_config: NetworkingConfigBody,
}

/// Durations are nanoseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Healthcheck {
    pub test: Vec<String>,
    pub interval: u64,
    pub timeout: u64,
    pub start_period: u64,
    pub start_interval: u64,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicyBody {
    pub name: String,
    pub maximum_retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WeightDeviceBody {
    pub path: String,
    pub weight: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThrottleDeviceBody {
    pub path: String,
    pub rate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBindingBody {
    pub host_ip: String,
    pub host_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UlimitBody {
    pub name: String,
    pub soft: i64,
    pub hard: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogConfigBody {
    #[serde(rename = "Type")]
    pub driver: String,
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BindOptionsBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagation: Option<String>,
    pub create_mountpoint: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeOptionsBody {
    pub no_copy: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TmpfsOptionsBody {
    pub size_bytes: i64,
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountBody {
    #[serde(rename = "Type")]
    pub kind: String,
    pub source: String,
    pub target: String,
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_options: Option<BindOptionsBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_options: Option<VolumeOptionsBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmpfs_options: Option<TmpfsOptionsBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfigBody {
    pub memory: i64,
    pub memory_reservation: i64,
    pub memory_swap: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_swappiness: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oom_kill_disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pids_limit: Option<i64>,
    pub cpu_shares: i64,
    pub cpu_period: i64,
    pub cpu_quota: i64,
    pub nano_cpus: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cpuset_cpus: String,
    pub shm_size: i64,
    pub blkio_weight: u16,
    pub blkio_weight_device: Vec<WeightDeviceBody>,
    pub blkio_device_read_bps: Vec<ThrottleDeviceBody>,
    pub blkio_device_read_i_ops: Vec<ThrottleDeviceBody>,
    pub blkio_device_write_bps: Vec<ThrottleDeviceBody>,
    pub blkio_device_write_i_ops: Vec<ThrottleDeviceBody>,
    pub restart_policy: RestartPolicyBody,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub binds: Vec<String>,
    pub mounts: Vec<MountBody>,
    pub port_bindings: BTreeMap<String, Vec<PortBindingBody>>,
    pub security_opt: Vec<String>,
    pub sysctls: BTreeMap<String, String>,
    pub ulimits: Vec<UlimitBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfigBody>,
    pub privileged: bool,
    pub readonly_rootfs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pid_mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ipc_mode: String,
    pub dns: Vec<String>,
    pub dns_search: Vec<String>,
    pub extra_hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IpamConfigBody {
    #[serde(rename = "IPv4Address", skip_serializing_if = "Option::is_none")]
    pub ipv4_address: Option<String>,
    #[serde(rename = "IPv6Address", skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<String>,
    #[serde(rename = "LinkLocalIPs", skip_serializing_if = "Vec::is_empty")]
    pub link_local_ips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointBody {
    pub aliases: Vec<String>,
    #[serde(rename = "IPAMConfig", skip_serializing_if = "Option::is_none")]
    pub ipam_config: Option<IpamConfigBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub driver_opts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkingConfigBody {
    pub endpoints_config: BTreeMap<String, EndpointBody>,
}

/// Response of `POST /containers/create`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateResponse {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Warnings", default)]
    pub warnings: Vec<String>,
}

/// Error body returned by the engine
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

fn nanos(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl From<&HealthConfig> for Healthcheck {
    fn from(hc: &HealthConfig) -> Self {
        Self {
            test: hc.test.clone(),
            interval: nanos(hc.interval),
            timeout: nanos(hc.timeout),
            start_period: nanos(hc.start_period),
            start_interval: nanos(hc.start_interval),
            retries: hc.retries,
        }
    }
}

fn throttles(list: &[ThrottleDevice]) -> Vec<ThrottleDeviceBody> {
    list.iter()
        .map(|d| ThrottleDeviceBody {
            path: d.path.clone(),
            rate: d.rate,
        })
        .collect()
}

impl From<&Mount> for MountBody {
    fn from(m: &Mount) -> Self {
        Self {
            kind: m.kind.to_string(),
            source: m.source.clone(),
            target: m.target.clone(),
            read_only: m.read_only,
            consistency: m.consistency.clone(),
            bind_options: m.bind_options.as_ref().map(|o: &BindOptions| BindOptionsBody {
                propagation: o.propagation.map(|p| p.to_string()),
                create_mountpoint: o.create_mountpoint,
            }),
            volume_options: m.volume_options.as_ref().map(|o: &VolumeOptions| VolumeOptionsBody {
                no_copy: o.no_copy,
                labels: o.labels.clone(),
                subpath: o.subpath.clone(),
            }),
            tmpfs_options: m.tmpfs_options.as_ref().map(|o: &TmpfsOptions| TmpfsOptionsBody {
                size_bytes: o.size_bytes,
                mode: o.mode,
            }),
        }
    }
}

impl From<&HostConfig> for HostConfigBody {
    fn from(h: &HostConfig) -> Self {
        let max_retries = match h.restart_policy {
            RestartPolicy::OnFailure { max_retries } => max_retries,
            _ => 0,
        };
        Self {
            memory: h.memory,
            memory_reservation: h.memory_reservation,
            memory_swap: h.memory_swap,
            memory_swappiness: h.memory_swappiness,
            oom_kill_disable: h.oom_kill_disable,
            pids_limit: h.pids_limit,
            cpu_shares: h.cpu_shares,
            cpu_period: h.cpu_period,
            cpu_quota: h.cpu_quota,
            nano_cpus: h.nano_cpus,
            cpuset_cpus: h.cpuset_cpus.clone(),
            shm_size: h.shm_size,
            blkio_weight: h.blkio.weight,
            blkio_weight_device: h
                .blkio
                .weight_device
                .iter()
                .map(|d| WeightDeviceBody {
                    path: d.path.clone(),
                    weight: d.weight,
                })
                .collect(),
            blkio_device_read_bps: throttles(&h.blkio.device_read_bps),
            blkio_device_read_i_ops: throttles(&h.blkio.device_read_iops),
            blkio_device_write_bps: throttles(&h.blkio.device_write_bps),
            blkio_device_write_i_ops: throttles(&h.blkio.device_write_iops),
            restart_policy: RestartPolicyBody {
                name: h.restart_policy.name().to_string(),
                maximum_retry_count: max_retries,
            },
            cap_add: h.cap_add.clone(),
            cap_drop: h.cap_drop.clone(),
            binds: h.binds.iter().map(|b| b.to_string()).collect(),
            mounts: h.mounts.iter().map(MountBody::from).collect(),
            port_bindings: h
                .port_bindings
                .iter()
                .map(|(port, bindings)| {
                    (
                        port.to_string(),
                        bindings
                            .iter()
                            .map(|b| PortBindingBody {
                                host_ip: b.host_ip.clone(),
                                host_port: b.host_port.clone(),
                            })
                            .collect(),
                    )
                })
                .collect(),
            security_opt: h.security_opt.clone(),
            sysctls: h.sysctls.clone(),
            ulimits: h
                .ulimits
                .iter()
                .map(|u| UlimitBody {
                    name: u.name.clone(),
                    soft: u.soft,
                    hard: u.hard,
                })
                .collect(),
            log_config: if h.log_config.driver.is_empty() {
                None
            } else {
                Some(LogConfigBody {
                    driver: h.log_config.driver.clone(),
                    config: h.log_config.options.clone(),
                })
            },
            privileged: h.privileged,
            readonly_rootfs: h.readonly_rootfs,
            init: h.init,
            network_mode: h.network_mode.clone(),
            pid_mode: h.pid_mode.clone(),
            ipc_mode: h.ipc_mode.clone(),
            dns: h.dns.clone(),
            dns_search: h.dns_search.clone(),
            extra_hosts: h.extra_hosts.clone(),
        }
    }
}

impl From<&NetworkingConfig> for NetworkingConfigBody {
    fn from(n: &NetworkingConfig) -> Self {
        let endpoints_config = n
            .endpoints
            .iter()
            .map(|(name, e)| {
                let ipam = IpamConfigBody {
                    ipv4_address: e.ipv4_address.map(|ip| ip.to_string()),
                    ipv6_address: e.ipv6_address.map(|ip| ip.to_string()),
                    link_local_ips: e.link_local_ips.iter().map(|ip| ip.to_string()).collect(),
                };
                let body = EndpointBody {
                    aliases: e.aliases.clone(),
                    ipam_config: if ipam == IpamConfigBody::default() {
                        None
                    } else {
                        Some(ipam)
                    },
                    mac_address: e.mac_address.clone(),
                    driver_opts: e.driver_opts.clone(),
                };
                (name.clone(), body)
            })
            .collect();
        Self { endpoints_config }
    }
}

impl CreateRequest {
    fn from_config(c: &ContainerConfig, host: &HostConfig, net: &NetworkingConfig) -> Self {
        Self {
            image: c.image.clone(),
            cmd: c.cmd.clone(),
            entrypoint: c.entrypoint.clone(),
            env: c.env_list(),
            working_dir: c.working_dir.clone(),
            user: c.user.clone(),
            hostname: c.hostname.clone(),
            domainname: c.domainname.clone(),
            exposed_ports: c
                .exposed_ports
                .iter()
                .map(|p| (p.to_string(), Empty {}))
                .collect(),
            labels: c.labels.clone(),
            healthcheck: c.healthcheck.as_ref().map(Healthcheck::from),
            tty: c.tty,
            open_stdin: c.open_stdin,
            stop_signal: c.stop_signal.clone(),
            stop_timeout: c.stop_timeout.map(|d| d.as_secs()),
            host_config: HostConfigBody::from(host),
            networking_config: NetworkingConfigBody::from(net),
        }
    }
}

impl From<&Container> for CreateRequest {
    fn from(container: &Container) -> Self {
        Self::from_config(
            &container.config,
            &container.host_config,
            &container.network_config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{container as c, host as h, network as n};
    use std::time::Duration;

    #[test]
    fn test_create_body_shape() {
        let mut container = Container::new("web");
        container
            .with_config([
                c::image("nginx:alpine"),
                c::env("MODE", "prod"),
                c::expose("80"),
                c::healthcheck_cmd(["true"]),
                c::healthcheck_interval(Duration::from_secs(10)),
            ])
            .with_host_config([
                h::publish("8080:80"),
                h::restart(RestartPolicy::OnFailure { max_retries: 3 }),
                h::pids_limit(0),
            ])
            .with_network_config([n::ipv4_address("front", "172.28.0.5")]);
        assert!(container.errors().is_empty());

        let body = serde_json::to_value(CreateRequest::from(&container)).unwrap();
        assert_eq!(body["Image"], "nginx:alpine");
        assert_eq!(body["Env"][0], "MODE=prod");
        assert!(body["ExposedPorts"]["80/tcp"].is_object());
        assert_eq!(body["Healthcheck"]["Interval"], 10_000_000_000u64);
        assert_eq!(body["HostConfig"]["PortBindings"]["80/tcp"][0]["HostPort"], "8080");
        assert_eq!(body["HostConfig"]["RestartPolicy"]["Name"], "on-failure");
        assert_eq!(body["HostConfig"]["RestartPolicy"]["MaximumRetryCount"], 3);
        assert_eq!(body["HostConfig"]["PidsLimit"], 0);
        assert!(body["HostConfig"].get("MemorySwappiness").is_none());
        assert!(body["HostConfig"].get("LogConfig").is_none());
        assert_eq!(
            body["NetworkingConfig"]["EndpointsConfig"]["front"]["IPAMConfig"]["IPv4Address"],
            "172.28.0.5"
        );
    }
}
