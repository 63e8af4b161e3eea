//! Model to compose document translation
//!
//! Translation of a single service is pure and cannot fail; all checks
//! happen in [`Project::validate`] before a project is translated.

use super::document::*;
use crate::container::{
    BindSpec, BlkioSettings, Container, HealthConfig, HostConfig, LogConfig, Mount, MountType,
    RestartPolicy, ThrottleDevice,
};
use crate::error::Result;
use crate::project::{
    BuildSpec, DeploySpec, NetworkDefinition, Project, ResourceSpec, Service, UpdatePolicy,
    VolumeDefinition,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn non_zero(n: i64) -> Option<i64> {
    if n == 0 {
        None
    } else {
        Some(n)
    }
}

/// Translate a validated project
pub fn translate_project(project: &Project) -> Result<ProjectDocument> {
    if let Err(err) = project.validate() {
        debug!(project = project.name(), "refusing to translate invalid project");
        return Err(err);
    }

    let services: BTreeMap<String, ServiceDocument> = project
        .services()
        .map(|service| (service.name.clone(), translate_service(service)))
        .collect();
    let networks = project
        .networks()
        .iter()
        .map(|(name, def)| (name.clone(), translate_network(def)))
        .collect();
    let volumes = project
        .volumes()
        .iter()
        .map(|(name, def)| (name.clone(), translate_volume(def)))
        .collect();

    info!(project = project.name(), services = services.len(), "translated project");
    Ok(ProjectDocument {
        name: project.name().to_string(),
        services,
        networks,
        volumes,
    })
}

/// Translate one service: its container plus the compose-only settings
pub fn translate_service(service: &Service) -> ServiceDocument {
    let mut doc = translate_container(&service.container);
    let config = &service.config;

    doc.profiles = config.profiles.iter().cloned().collect();
    doc.depends_on = config
        .depends_on
        .iter()
        .map(|(name, edge)| {
            (
                name.clone(),
                DependsOnDocument {
                    condition: edge.condition.to_string(),
                    restart: edge.restart,
                    required: edge.required,
                },
            )
        })
        .collect();
    doc.build = config.build.as_ref().map(translate_build);
    doc.deploy = config.deploy.as_ref().map(translate_deploy);
    doc.pull_policy = config.pull_policy.map(|p| p.to_string());
    doc.scale = config.scale;

    // Replicated services cannot share a fixed container name
    if doc.deploy.is_some() {
        doc.container_name = None;
    }
    doc
}

/// Translate the engine-level part of a service
pub fn translate_container(container: &Container) -> ServiceDocument {
    let config = &container.config;
    let host = &container.host_config;

    let mut doc = ServiceDocument {
        image: non_empty(&config.image),
        container_name: non_empty(container.name()),
        platform: if container.platform.is_empty() {
            None
        } else {
            Some(container.platform.to_string())
        },
        command: config.cmd.clone(),
        entrypoint: config.entrypoint.clone(),
        environment: config.env.clone(),
        working_dir: non_empty(&config.working_dir),
        user: non_empty(&config.user),
        hostname: non_empty(&config.hostname),
        domainname: non_empty(&config.domainname),
        labels: config.labels.clone(),
        tty: config.tty,
        stdin_open: config.open_stdin,
        stop_signal: config.stop_signal.clone(),
        stop_grace_period: config.stop_timeout,
        expose: config.exposed_ports.iter().map(|p| p.to_string()).collect(),
        healthcheck: config.healthcheck.as_ref().map(translate_healthcheck),
        ..ServiceDocument::default()
    };

    translate_host(host, &mut doc);

    doc.networks = container
        .network_config
        .endpoints
        .iter()
        .map(|(name, endpoint)| {
            (
                name.clone(),
                ServiceNetworkDocument {
                    aliases: endpoint.aliases.clone(),
                    ipv4_address: endpoint.ipv4_address.map(|ip| ip.to_string()),
                    ipv6_address: endpoint.ipv6_address.map(|ip| ip.to_string()),
                    link_local_ips: endpoint.link_local_ips.iter().map(|ip| ip.to_string()).collect(),
                    mac_address: endpoint.mac_address.clone(),
                    driver_opts: endpoint.driver_opts.clone(),
                },
            )
        })
        .collect();

    doc
}

fn translate_healthcheck(hc: &HealthConfig) -> HealthcheckDocument {
    HealthcheckDocument {
        test: hc.test.clone(),
        interval: hc.interval,
        timeout: hc.timeout,
        start_period: hc.start_period,
        start_interval: if hc.start_interval.is_zero() {
            None
        } else {
            Some(hc.start_interval)
        },
        retries: hc.retries,
        disable: hc.is_disabled(),
    }
}

fn translate_host(host: &HostConfig, doc: &mut ServiceDocument) {
    doc.cpu_shares = non_zero(host.cpu_shares);
    doc.cpus = if host.nano_cpus == 0 {
        None
    } else {
        Some(host.cpus())
    };
    doc.cpuset = non_empty(&host.cpuset_cpus);
    doc.cpu_quota = non_zero(host.cpu_quota);
    doc.cpu_period = non_zero(host.cpu_period);
    doc.mem_limit = non_zero(host.memory);
    doc.mem_reservation = non_zero(host.memory_reservation);
    doc.memswap_limit = non_zero(host.memory_swap);
    doc.shm_size = non_zero(host.shm_size);

    // Unset and zero differ for these, so only Some is copied
    doc.mem_swappiness = host.memory_swappiness;
    doc.oom_kill_disable = host.oom_kill_disable;
    doc.pids_limit = host.pids_limit;

    doc.blkio_config = translate_blkio(&host.blkio);
    doc.logging = translate_logging(&host.log_config);
    doc.restart = match host.restart_policy {
        RestartPolicy::No => None,
        policy => Some(policy.to_string()),
    };

    doc.cap_add = host.cap_add.clone();
    doc.cap_drop = host.cap_drop.clone();
    doc.security_opt = host.security_opt.clone();
    doc.privileged = host.privileged;
    doc.read_only = host.readonly_rootfs;
    doc.init = host.init;
    doc.sysctls = host.sysctls.clone();
    doc.ulimits = host
        .ulimits
        .iter()
        .map(|u| {
            (
                u.name.clone(),
                UlimitDocument {
                    soft: u.soft,
                    hard: u.hard,
                },
            )
        })
        .collect();
    doc.network_mode = non_empty(&host.network_mode);
    doc.pid = non_empty(&host.pid_mode);
    doc.ipc = non_empty(&host.ipc_mode);
    doc.dns = host.dns.clone();
    doc.dns_search = host.dns_search.clone();
    doc.extra_hosts = host.extra_hosts.clone();

    doc.ports = host
        .port_bindings
        .iter()
        .flat_map(|(port, bindings)| {
            bindings.iter().map(move |binding| PortDocument {
                target: port.port,
                published: non_empty(&binding.host_port),
                host_ip: non_empty(&binding.host_ip),
                protocol: port.protocol.to_string(),
            })
        })
        .collect();

    doc.volumes = host
        .binds
        .iter()
        .map(translate_bind)
        .chain(host.mounts.iter().map(translate_mount))
        .collect();
}

fn translate_blkio(blkio: &BlkioSettings) -> Option<BlkioDocument> {
    if blkio.is_zero() {
        return None;
    }
    let throttles = |list: &[ThrottleDevice]| {
        list.iter()
            .map(|d| ThrottleDeviceDocument {
                path: d.path.clone(),
                rate: d.rate,
            })
            .collect::<Vec<_>>()
    };
    Some(BlkioDocument {
        weight: if blkio.weight == 0 {
            None
        } else {
            Some(blkio.weight)
        },
        weight_device: blkio
            .weight_device
            .iter()
            .map(|d| WeightDeviceDocument {
                path: d.path.clone(),
                weight: d.weight,
            })
            .collect(),
        device_read_bps: throttles(&blkio.device_read_bps),
        device_read_iops: throttles(&blkio.device_read_iops),
        device_write_bps: throttles(&blkio.device_write_bps),
        device_write_iops: throttles(&blkio.device_write_iops),
    })
}

fn translate_logging(log: &LogConfig) -> Option<LoggingDocument> {
    if log.driver.is_empty() {
        return None;
    }
    Some(LoggingDocument {
        driver: log.driver.clone(),
        options: log.options.clone(),
    })
}

fn translate_bind(bind: &BindSpec) -> ServiceVolumeDocument {
    let mut doc = ServiceVolumeDocument {
        source: Some(bind.source().to_string()),
        target: bind.target().to_string(),
        read_only: bind.read_only(),
        ..ServiceVolumeDocument::default()
    };
    if bind.is_named_volume() {
        doc.kind = MountType::Volume.to_string();
        if bind.nocopy() {
            doc.volume = Some(VolumeOptionsDocument {
                nocopy: true,
                subpath: None,
            });
        }
    } else {
        if bind.nocopy() {
            debug!(source = bind.source(), "nocopy ignored on host path bind");
        }
        doc.kind = MountType::Bind.to_string();
        doc.bind = Some(BindDocument {
            propagation: bind.propagation().map(|p| p.to_string()),
            create_host_path: Some(true),
            selinux: bind.selinux().map(|l| l.to_string()),
        });
    }
    doc
}

fn translate_mount(mount: &Mount) -> ServiceVolumeDocument {
    ServiceVolumeDocument {
        kind: mount.kind.to_string(),
        source: non_empty(&mount.source),
        target: mount.target.clone(),
        read_only: mount.read_only,
        consistency: mount.consistency.clone(),
        bind: mount.bind_options.as_ref().map(|o| BindDocument {
            propagation: o.propagation.map(|p| p.to_string()),
            create_host_path: Some(o.create_mountpoint),
            selinux: None,
        }),
        volume: mount.volume_options.as_ref().map(|o| VolumeOptionsDocument {
            nocopy: o.no_copy,
            subpath: o.subpath.clone(),
        }),
        tmpfs: mount.tmpfs_options.as_ref().map(|o| TmpfsDocument {
            size: non_zero(o.size_bytes),
            mode: if o.mode == 0 { None } else { Some(o.mode) },
        }),
    }
}

fn translate_build(build: &BuildSpec) -> BuildDocument {
    BuildDocument {
        context: build.context.clone(),
        dockerfile: build.dockerfile.clone(),
        dockerfile_inline: build.dockerfile_inline.clone(),
        args: build.args.clone(),
        target: build.target.clone(),
        labels: build.labels.clone(),
        no_cache: build.no_cache,
    }
}

fn translate_resource(spec: &ResourceSpec) -> ResourceDocument {
    ResourceDocument {
        cpus: spec.cpus.map(|c| c.to_string()),
        memory: spec.memory,
        pids: spec.pids,
    }
}

fn translate_policy(policy: &UpdatePolicy) -> UpdateConfigDocument {
    UpdateConfigDocument {
        parallelism: policy.parallelism,
        delay: policy.delay,
        failure_action: policy.failure_action.map(|a| a.to_string()),
        monitor: policy.monitor,
        max_failure_ratio: policy.max_failure_ratio,
        order: policy.order.map(|o| o.to_string()),
    }
}

fn translate_deploy(deploy: &DeploySpec) -> DeployDocument {
    let resources = &deploy.resources;
    DeployDocument {
        mode: deploy.mode.map(|m| m.to_string()),
        replicas: deploy.replicas,
        resources: if resources.limits.is_none() && resources.reservations.is_none() {
            None
        } else {
            Some(ResourcesDocument {
                limits: resources.limits.as_ref().map(translate_resource),
                reservations: resources.reservations.as_ref().map(translate_resource),
            })
        },
        update_config: deploy.update_config.as_ref().map(translate_policy),
        rollback_config: deploy.rollback_config.as_ref().map(translate_policy),
        labels: deploy.labels.clone(),
    }
}

fn translate_network(def: &NetworkDefinition) -> NetworkDocument {
    NetworkDocument {
        name: def.name.clone(),
        driver: def.driver.clone(),
        driver_opts: def.driver_opts.clone(),
        labels: def.labels.clone(),
        external: def.external,
        internal: def.internal,
        attachable: def.attachable,
        enable_ipv6: def.enable_ipv6,
        ipam: if def.ipam.is_empty() {
            None
        } else {
            Some(IpamDocument {
                config: def
                    .ipam
                    .iter()
                    .map(|pool| IpamPoolDocument {
                        subnet: pool.subnet.clone(),
                        gateway: pool.gateway.clone(),
                        ip_range: pool.ip_range.clone(),
                    })
                    .collect(),
            })
        },
    }
}

fn translate_volume(def: &VolumeDefinition) -> VolumeDocument {
    VolumeDocument {
        name: def.name.clone(),
        driver: def.driver.clone(),
        driver_opts: def.driver_opts.clone(),
        labels: def.labels.clone(),
        external: def.external,
    }
}
