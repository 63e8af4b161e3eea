//! Container model
//!
//! A [`Container`] is the merged engine-level configuration of one
//! container: process settings, host settings, network endpoints and target
//! platform. All four records are always present (default-initialized), so
//! readers never deal with missing sections.

pub mod config;
pub mod host;
pub mod network;
pub mod platform;

pub use config::{ContainerConfig, HealthConfig, PortProto, Protocol, HEALTHCHECK_DISABLED};
pub use host::{
    BindOptions, BindSpec, BlkioSettings, HostConfig, LogConfig, Mount, MountType, PortBinding,
    Propagation, PublishSpec, RestartPolicy, SelinuxLabel, ThrottleDevice, TmpfsOptions, Ulimit,
    VolumeOptions, WeightDevice,
};
pub use network::{EndpointSettings, NetworkingConfig};
pub use platform::Platform;

use crate::builder::{apply, Op};
use crate::error::{ConfigError, ConfigErrors, ComposeError, Result};

/// One container's configuration plus the errors collected while building it
#[derive(Debug, Clone, Default)]
pub struct Container {
    name: String,
    pub config: ContainerConfig,
    pub host_config: HostConfig,
    pub network_config: NetworkingConfig,
    pub platform: Platform,
    errors: Vec<ConfigError>,
}

impl Container {
    /// Create an empty container configuration
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply process-level operations
    pub fn with_config<I, O>(&mut self, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<ContainerConfig>>>,
    {
        let errors = apply(&mut self.config, ops);
        self.record(errors)
    }

    /// Apply host-level operations
    pub fn with_host_config<I, O>(&mut self, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<HostConfig>>>,
    {
        let errors = apply(&mut self.host_config, ops);
        self.record(errors)
    }

    /// Apply network endpoint operations
    pub fn with_network_config<I, O>(&mut self, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<NetworkingConfig>>>,
    {
        let errors = apply(&mut self.network_config, ops);
        self.record(errors)
    }

    /// Apply platform operations
    pub fn with_platform<I, O>(&mut self, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<Platform>>>,
    {
        let errors = apply(&mut self.platform, ops);
        self.record(errors)
    }

    fn record(&mut self, errors: Vec<ConfigError>) -> &mut Self {
        for err in &errors {
            tracing::debug!(container = %self.name, "{}", err);
        }
        self.errors.extend(errors);
        self
    }

    /// Errors collected so far
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Fail with every collected error, if any
    pub fn validate(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ComposeError::Config(ConfigErrors(self.errors.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{container as c, host as h, network as n, platform as p};
    use crate::error::ErrorKind;

    #[test]
    fn test_new_container_is_default_initialized() {
        let container = Container::new("web");
        assert_eq!(container.name(), "web");
        assert_eq!(container.config, ContainerConfig::default());
        assert_eq!(container.host_config, HostConfig::default());
        assert!(container.network_config.endpoints.is_empty());
        assert!(container.platform.is_empty());
        assert!(container.validate().is_ok());
    }

    #[test]
    fn test_errors_accumulate_across_calls() {
        let mut container = Container::new("api");
        container
            .with_config([c::image("node:20"), c::env("PORT", "3000"), c::env("PORT", "4000")])
            .with_host_config([h::memory("lots"), h::cpus(1.5)])
            .with_network_config([n::mac_address("backend", "nope")])
            .with_platform([p::architecture("arm64")]);

        let kinds: Vec<ErrorKind> = container.errors().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ErrorKind::Container, ErrorKind::Host, ErrorKind::Network]);
        assert_eq!(container.config.image, "node:20");
        assert_eq!(container.config.env["PORT"], "3000");
        assert_eq!(container.host_config.nano_cpus, 1_500_000_000);
        assert_eq!(container.platform.architecture, "arm64");

        let err = container.validate().unwrap_err();
        assert_eq!(err.config_errors().map(|e| e.len()), Some(3));
    }
}
