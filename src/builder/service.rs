//! Compose-only service setters

use super::Op;
use crate::container::host::parse_size;
use crate::project::{
    BuildSpec, DependencyCondition, DependsOn, DeployMode, DeploySpec, PullPolicy, ResourceSpec,
    ServiceConfig, UpdatePolicy,
};

/// Activate the service only under `profile`
pub fn profile(profile: &str) -> Op<ServiceConfig> {
    let profile = profile.to_string();
    Op::new("profiles", move |s: &mut ServiceConfig| {
        if profile.is_empty() {
            return Err("profile must not be empty".to_string());
        }
        s.profiles.insert(profile.clone());
        Ok(())
    })
}

/// Require `service` to reach `condition` first
pub fn depends_on(service: &str, condition: DependencyCondition) -> Op<ServiceConfig> {
    let service = service.to_string();
    Op::new("depends_on", move |s: &mut ServiceConfig| {
        if service.is_empty() {
            return Err("dependency name must not be empty".to_string());
        }
        s.depends_on.insert(
            service.clone(),
            DependsOn {
                condition,
                ..DependsOn::default()
            },
        );
        Ok(())
    })
}

/// Start after `service` if the project defines it
pub fn depends_on_optional(service: &str) -> Op<ServiceConfig> {
    let service = service.to_string();
    Op::infallible("depends_on", move |s: &mut ServiceConfig| {
        s.depends_on.insert(
            service.clone(),
            DependsOn {
                required: false,
                ..DependsOn::default()
            },
        );
    })
}

/// Restart the service when `service` is updated
pub fn restart_with(service: &str) -> Op<ServiceConfig> {
    let service = service.to_string();
    Op::new("depends_on", move |s: &mut ServiceConfig| {
        let edge = s
            .depends_on
            .get_mut(&service)
            .ok_or_else(|| format!("no dependency on {:?}", service))?;
        edge.restart = true;
        Ok(())
    })
}

fn build(s: &mut ServiceConfig) -> &mut BuildSpec {
    s.build.get_or_insert_with(BuildSpec::default)
}

pub fn build_context(context: &str) -> Op<ServiceConfig> {
    let context = context.to_string();
    Op::new("build.context", move |s: &mut ServiceConfig| {
        if context.is_empty() {
            return Err("build context must not be empty".to_string());
        }
        build(s).context = context.clone();
        Ok(())
    })
}

/// Dockerfile path, relative to the context
pub fn dockerfile(path: &str) -> Op<ServiceConfig> {
    let path = path.to_string();
    Op::new("build.dockerfile", move |s: &mut ServiceConfig| {
        let spec = build(s);
        if spec.dockerfile_inline.is_some() {
            return Err("dockerfile conflicts with dockerfile_inline".to_string());
        }
        spec.dockerfile = Some(path.clone());
        Ok(())
    })
}

/// Dockerfile content given inline
pub fn dockerfile_inline(content: &str) -> Op<ServiceConfig> {
    let content = content.to_string();
    Op::new("build.dockerfile_inline", move |s: &mut ServiceConfig| {
        let spec = build(s);
        if spec.dockerfile.is_some() {
            return Err("dockerfile_inline conflicts with dockerfile".to_string());
        }
        spec.dockerfile_inline = Some(content.clone());
        Ok(())
    })
}

pub fn build_arg(key: &str, value: &str) -> Op<ServiceConfig> {
    let (key, value) = (key.to_string(), value.to_string());
    Op::new("build.args", move |s: &mut ServiceConfig| {
        if key.is_empty() {
            return Err("build argument name must not be empty".to_string());
        }
        build(s).args.insert(key.clone(), value.clone());
        Ok(())
    })
}

pub fn build_target(stage: &str) -> Op<ServiceConfig> {
    let stage = stage.to_string();
    Op::infallible("build.target", move |s: &mut ServiceConfig| {
        build(s).target = Some(stage.clone())
    })
}

pub fn build_no_cache(no_cache: bool) -> Op<ServiceConfig> {
    Op::infallible("build.no_cache", move |s: &mut ServiceConfig| build(s).no_cache = no_cache)
}

fn deploy(s: &mut ServiceConfig) -> &mut DeploySpec {
    s.deploy.get_or_insert_with(DeploySpec::default)
}

pub fn replicas(count: u32) -> Op<ServiceConfig> {
    Op::new("deploy.replicas", move |s: &mut ServiceConfig| {
        let spec = deploy(s);
        if spec.mode == Some(DeployMode::Global) {
            return Err("replicas cannot be set in global mode".to_string());
        }
        spec.replicas = Some(count);
        Ok(())
    })
}

pub fn deploy_mode(mode: DeployMode) -> Op<ServiceConfig> {
    Op::new("deploy.mode", move |s: &mut ServiceConfig| {
        let spec = deploy(s);
        if mode == DeployMode::Global && spec.replicas.is_some() {
            return Err("global mode conflicts with replicas".to_string());
        }
        spec.mode = Some(mode);
        Ok(())
    })
}

/// Which side of the deploy resources a setter writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceSide {
    Limits,
    Reservations,
}

fn resources(s: &mut ServiceConfig, side: ResourceSide) -> &mut ResourceSpec {
    let res = &mut deploy(s).resources;
    match side {
        ResourceSide::Limits => res.limits.get_or_insert_with(ResourceSpec::default),
        ResourceSide::Reservations => res.reservations.get_or_insert_with(ResourceSpec::default),
    }
}

fn resource_field(side: ResourceSide, name: &str) -> String {
    match side {
        ResourceSide::Limits => format!("deploy.resources.limits.{}", name),
        ResourceSide::Reservations => format!("deploy.resources.reservations.{}", name),
    }
}

pub fn deploy_cpus(side: ResourceSide, cpus: f64) -> Op<ServiceConfig> {
    Op::new(resource_field(side, "cpus"), move |s: &mut ServiceConfig| {
        if !cpus.is_finite() || cpus <= 0.0 {
            return Err(format!("invalid CPU count {}", cpus));
        }
        resources(s, side).cpus = Some(cpus);
        Ok(())
    })
}

pub fn deploy_memory(side: ResourceSide, size: &str) -> Op<ServiceConfig> {
    let field = resource_field(side, "memory");
    Op::or_fail(
        field.clone(),
        parse_size(size).map(|bytes| {
            Op::infallible(field, move |s: &mut ServiceConfig| {
                resources(s, side).memory = Some(bytes)
            })
        }),
    )
}

pub fn deploy_pids(side: ResourceSide, pids: i64) -> Op<ServiceConfig> {
    Op::infallible(resource_field(side, "pids"), move |s: &mut ServiceConfig| {
        resources(s, side).pids = Some(pids)
    })
}

fn check_policy(policy: &UpdatePolicy) -> Result<(), String> {
    if let Some(ratio) = policy.max_failure_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(format!("max_failure_ratio {} out of range 0-1", ratio));
        }
    }
    Ok(())
}

pub fn update_config(policy: UpdatePolicy) -> Op<ServiceConfig> {
    Op::new("deploy.update_config", move |s: &mut ServiceConfig| {
        check_policy(&policy)?;
        deploy(s).update_config = Some(policy.clone());
        Ok(())
    })
}

pub fn rollback_config(policy: UpdatePolicy) -> Op<ServiceConfig> {
    Op::new("deploy.rollback_config", move |s: &mut ServiceConfig| {
        check_policy(&policy)?;
        deploy(s).rollback_config = Some(policy.clone());
        Ok(())
    })
}

pub fn deploy_label(key: &str, value: &str) -> Op<ServiceConfig> {
    let (key, value) = (key.to_string(), value.to_string());
    Op::infallible("deploy.labels", move |s: &mut ServiceConfig| {
        deploy(s).labels.insert(key.clone(), value.clone());
    })
}

pub fn pull_policy(policy: PullPolicy) -> Op<ServiceConfig> {
    Op::infallible("pull_policy", move |s: &mut ServiceConfig| s.pull_policy = Some(policy))
}

pub fn scale(count: u32) -> Op<ServiceConfig> {
    Op::infallible("scale", move |s: &mut ServiceConfig| s.scale = Some(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;
    use crate::error::ErrorKind;

    #[test]
    fn test_dockerfile_conflict() {
        let mut config = ServiceConfig::default();
        let errors = apply(
            &mut config,
            [
                build_context("./api"),
                dockerfile("Dockerfile.dev"),
                dockerfile_inline("FROM scratch"),
                build_arg("VERSION", "1.2"),
            ],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Service);
        let build = config.build.unwrap();
        assert_eq!(build.context, "./api");
        assert_eq!(build.dockerfile.as_deref(), Some("Dockerfile.dev"));
        assert_eq!(build.args["VERSION"], "1.2");
    }

    #[test]
    fn test_deploy_resources() {
        let mut config = ServiceConfig::default();
        let errors = apply(
            &mut config,
            [
                replicas(3),
                deploy_cpus(ResourceSide::Limits, 0.5),
                deploy_memory(ResourceSide::Limits, "256m"),
                deploy_memory(ResourceSide::Reservations, "a lot"),
                deploy_mode(DeployMode::Global),
            ],
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "deploy.resources.reservations.memory");
        assert_eq!(errors[1].field, "deploy.mode");

        let deploy = config.deploy.unwrap();
        assert_eq!(deploy.replicas, Some(3));
        let limits = deploy.resources.limits.unwrap();
        assert_eq!(limits.cpus, Some(0.5));
        assert_eq!(limits.memory, Some(256 * 1024 * 1024));
        assert!(deploy.resources.reservations.is_none());
    }

    #[test]
    fn test_restart_with_requires_dependency() {
        let mut config = ServiceConfig::default();
        let errors = apply(
            &mut config,
            [
                restart_with("db"),
                depends_on("db", DependencyCondition::Healthy),
                restart_with("db"),
            ],
        );
        assert_eq!(errors.len(), 1);
        assert!(config.depends_on["db"].restart);
    }

    #[test]
    fn test_update_policy_ratio() {
        let mut config = ServiceConfig::default();
        let errors = apply(
            &mut config,
            [update_config(UpdatePolicy {
                max_failure_ratio: Some(1.5),
                ..UpdatePolicy::default()
            })],
        );
        assert_eq!(errors.len(), 1);
    }
}
