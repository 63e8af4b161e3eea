//! Compose project model
//!
//! A [`Project`] is a named, ordered collection of services plus the
//! networks and volumes they share. Like containers, projects collect
//! configuration errors instead of failing on the first one.

pub mod resources;
pub mod service;

pub use resources::{IpamPool, NetworkDefinition, VolumeDefinition};
pub use service::{
    BuildSpec, DependencyCondition, DependsOn, DeployMode, DeploySpec, FailureAction, PullPolicy,
    ResourceSpec, Resources, Service, ServiceConfig, UpdateOrder, UpdatePolicy,
};

use crate::builder::{apply, Op};
use crate::container::{Container, MountType};
use crate::error::{ComposeError, ConfigError, ConfigErrors, ErrorKind, Result};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Network every service joins when it names none
pub const DEFAULT_NETWORK: &str = "default";

fn project_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid project name regex"))
}

fn service_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("valid service name regex")
    })
}

/// Compose project
#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    services: IndexMap<String, Service>,
    networks: BTreeMap<String, NetworkDefinition>,
    volumes: BTreeMap<String, VolumeDefinition>,
    errors: Vec<ConfigError>,
}

impl Project {
    /// Create an empty project
    ///
    /// An invalid name is recorded as a configuration error.
    pub fn new(name: &str) -> Self {
        let mut errors = Vec::new();
        if !project_name_re().is_match(name) {
            errors.push(ConfigError::new(
                ErrorKind::Project,
                "name",
                format!(
                    "invalid project name {:?}: must be lowercase letters, digits, dashes or underscores",
                    name
                ),
            ));
        }
        Self {
            name: name.to_string(),
            services: IndexMap::new(),
            networks: BTreeMap::new(),
            volumes: BTreeMap::new(),
            errors,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Services in the order they were added
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn networks(&self) -> &BTreeMap<String, NetworkDefinition> {
        &self.networks
    }

    pub fn volumes(&self) -> &BTreeMap<String, VolumeDefinition> {
        &self.volumes
    }

    /// Add a service wrapping `container`
    ///
    /// The container's own errors are carried over to the project and the
    /// service is left out. A name that is already taken is rejected and the
    /// first definition kept.
    pub fn with_service<I, O>(&mut self, name: &str, container: Container, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<ServiceConfig>>>,
    {
        let field = format!("services.{}", name);
        if !service_name_re().is_match(name) {
            self.errors.push(ConfigError::new(
                ErrorKind::Project,
                field,
                format!("invalid service name {:?}", name),
            ));
            return self;
        }
        if self.services.contains_key(name) {
            warn!(project = %self.name, service = name, "duplicate service definition rejected");
            self.errors.push(ConfigError::new(
                ErrorKind::Project,
                field,
                "service is already defined",
            ));
            return self;
        }
        if let Err(ComposeError::Config(errors)) = container.validate() {
            debug!(
                project = %self.name,
                service = name,
                "container has {} configuration error(s)",
                errors.len()
            );
            self.errors.extend(errors.0);
            return self;
        }

        let mut config = ServiceConfig::default();
        let errors = apply(&mut config, ops);
        self.errors.extend(errors);

        self.services.insert(
            name.to_string(),
            Service {
                name: name.to_string(),
                container,
                config,
            },
        );
        self
    }

    /// Declare a network, configured by `ops`
    pub fn with_network<I, O>(&mut self, name: &str, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<NetworkDefinition>>>,
    {
        let definition = self.networks.entry(name.to_string()).or_default();
        let errors = apply(definition, ops);
        self.errors.extend(errors);
        self
    }

    /// Declare a named volume, configured by `ops`
    pub fn with_volume<I, O>(&mut self, name: &str, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<VolumeDefinition>>>,
    {
        let definition = self.volumes.entry(name.to_string()).or_default();
        let errors = apply(definition, ops);
        self.errors.extend(errors);
        self
    }

    /// Errors collected by builder calls so far
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Check collected errors and cross-service references
    ///
    /// References are only checked here, not when services are added, so
    /// services may be added in any order.
    pub fn validate(&self) -> Result<()> {
        let mut errors = self.errors.clone();
        errors.extend(self.reference_errors());
        if let Err(err) = self.start_order() {
            if let Some(cycle) = err.config_errors() {
                errors.extend(cycle.iter().cloned());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ComposeError::Config(ConfigErrors(errors)))
        }
    }

    fn reference_errors(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for service in self.services.values() {
            for (dep, edge) in &service.config.depends_on {
                if edge.required && !self.services.contains_key(dep) {
                    errors.push(ConfigError::new(
                        ErrorKind::Project,
                        format!("services.{}.depends_on", service.name),
                        format!("depends on undefined service {:?}", dep),
                    ));
                }
            }

            for network in service.container.network_config.endpoints.keys() {
                if network != DEFAULT_NETWORK && !self.networks.contains_key(network) {
                    errors.push(ConfigError::new(
                        ErrorKind::Project,
                        format!("services.{}.networks", service.name),
                        format!("refers to undefined network {:?}", network),
                    ));
                }
            }

            let host = &service.container.host_config;
            let named_volumes = host
                .binds
                .iter()
                .filter(|b| b.is_named_volume())
                .map(|b| b.source())
                .chain(
                    host.mounts
                        .iter()
                        .filter(|m| m.kind == MountType::Volume && !m.source.is_empty())
                        .map(|m| m.source.as_str()),
                );
            for volume in named_volumes {
                if !self.volumes.contains_key(volume) {
                    errors.push(ConfigError::new(
                        ErrorKind::Project,
                        format!("services.{}.volumes", service.name),
                        format!("refers to undefined volume {:?}", volume),
                    ));
                }
            }
        }
        errors
    }

    /// Service names ordered so that dependencies come first
    pub fn start_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for name in self.services.keys() {
            self.topological_sort(name, &mut visited, &mut visiting, &mut order)?;
        }

        Ok(order)
    }

    fn topological_sort(
        &self,
        service: &str,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(service) {
            return Ok(());
        }

        if visiting.contains(service) {
            return Err(ComposeError::Config(ConfigErrors(vec![ConfigError::new(
                ErrorKind::Project,
                format!("services.{}.depends_on", service),
                "circular dependency",
            )])));
        }

        // Dependencies on undefined services are reported by validate()
        let Some(config) = self.services.get(service) else {
            return Ok(());
        };

        visiting.insert(service.to_string());
        for dep in config.config.depends_on.keys() {
            self.topological_sort(dep, visited, visiting, order)?;
        }
        visiting.remove(service);

        visited.insert(service.to_string());
        order.push(service.to_string());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{container as c, host as h, network as n, service as s};

    fn container(name: &str, image: &str) -> Container {
        let mut container = Container::new(name);
        container.with_config([c::image(image)]);
        container
    }

    #[test]
    fn test_with_service_keeps_order() {
        let mut project = Project::new("demo");
        project
            .with_service("web", container("web", "nginx"), Vec::<Op<ServiceConfig>>::new())
            .with_service("api", container("api", "node"), Vec::<Op<ServiceConfig>>::new())
            .with_service("db", container("db", "postgres"), Vec::<Op<ServiceConfig>>::new());

        let names: Vec<&str> = project.services().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["web", "api", "db"]);
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let mut project = Project::new("demo");
        project
            .with_service("web", container("web", "nginx:1"), Vec::<Op<ServiceConfig>>::new())
            .with_service("web", container("web", "nginx:2"), Vec::<Op<ServiceConfig>>::new());

        assert_eq!(project.services().count(), 1);
        assert_eq!(project.service("web").unwrap().container.config.image, "nginx:1");
        let err = project.validate().unwrap_err();
        let errors = err.config_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.0[0].field, "services.web");
    }

    #[test]
    fn test_invalid_container_propagates() {
        let mut broken = Container::new("web");
        broken.with_host_config([h::memory("huge")]);

        let mut project = Project::new("demo");
        project.with_service("web", broken, Vec::<Op<ServiceConfig>>::new());

        assert!(project.service("web").is_none());
        let err = project.validate().unwrap_err();
        assert_eq!(err.config_errors().unwrap().0[0].kind, ErrorKind::Host);
    }

    #[test]
    fn test_invalid_project_name() {
        let project = Project::new("My Project");
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_start_order() {
        let mut project = Project::new("test");
        project
            .with_service("web", container("web", "nginx"), [s::depends_on("api", DependencyCondition::Started)])
            .with_service("api", container("api", "node"), [s::depends_on("db", DependencyCondition::Healthy)])
            .with_service("db", container("db", "postgres"), Vec::<Op<ServiceConfig>>::new());

        let order = project.start_order().unwrap();
        let pos = |name: &str| order.iter().position(|s| s == name).unwrap();
        assert!(pos("db") < pos("api"));
        assert!(pos("api") < pos("web"));
    }

    #[test]
    fn test_circular_dependency_detection() {
        let mut project = Project::new("test");
        project
            .with_service("a", container("a", "nginx"), [s::depends_on("b", DependencyCondition::Started)])
            .with_service("b", container("b", "nginx"), [s::depends_on("a", DependencyCondition::Started)]);

        assert!(project.start_order().is_err());
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_undefined_references() {
        let mut web = container("web", "nginx");
        web.with_network_config([n::alias("front", "www")])
            .with_host_config([h::bind("static:/usr/share/nginx/html:ro")]);

        let mut project = Project::new("demo");
        project.with_service(
            "web",
            web,
            [
                s::depends_on("cache", DependencyCondition::Started),
                s::depends_on_optional("metrics"),
            ],
        );

        let err = project.validate().unwrap_err();
        let fields: Vec<&str> = err
            .config_errors()
            .unwrap()
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(
            fields,
            vec!["services.web.depends_on", "services.web.networks", "services.web.volumes"]
        );

        project
            .with_network("front", Vec::<Op<NetworkDefinition>>::new())
            .with_volume("static", Vec::<Op<VolumeDefinition>>::new());
        let err = project.validate().unwrap_err();
        assert_eq!(err.config_errors().unwrap().len(), 1);
    }
}
