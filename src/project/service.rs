//! Compose-only service settings

use crate::container::Container;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Condition a dependency must reach before the dependent service starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DependencyCondition {
    #[default]
    Started,
    Healthy,
    CompletedSuccessfully,
}

impl fmt::Display for DependencyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyCondition::Started => write!(f, "service_started"),
            DependencyCondition::Healthy => write!(f, "service_healthy"),
            DependencyCondition::CompletedSuccessfully => {
                write!(f, "service_completed_successfully")
            }
        }
    }
}

/// A dependency edge to another service of the same project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependsOn {
    pub condition: DependencyCondition,
    /// Restart this service when the dependency is updated
    pub restart: bool,
    /// When false, a missing dependency is ignored
    pub required: bool,
}

impl Default for DependsOn {
    fn default() -> Self {
        Self {
            condition: DependencyCondition::Started,
            restart: false,
            required: true,
        }
    }
}

/// Image build settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: Option<String>,
    pub dockerfile_inline: Option<String>,
    pub args: BTreeMap<String, String>,
    pub target: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub no_cache: bool,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            context: ".".to_string(),
            dockerfile: None,
            dockerfile_inline: None,
            args: BTreeMap::new(),
            target: None,
            labels: BTreeMap::new(),
            no_cache: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Replicated,
    Global,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Replicated => write!(f, "replicated"),
            DeployMode::Global => write!(f, "global"),
        }
    }
}

/// Resource amounts for deploy limits or reservations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSpec {
    pub cpus: Option<f64>,
    /// Bytes
    pub memory: Option<i64>,
    pub pids: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub limits: Option<ResourceSpec>,
    pub reservations: Option<ResourceSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Continue,
    Pause,
    Rollback,
}

impl fmt::Display for FailureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureAction::Continue => write!(f, "continue"),
            FailureAction::Pause => write!(f, "pause"),
            FailureAction::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrder {
    StopFirst,
    StartFirst,
}

impl fmt::Display for UpdateOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOrder::StopFirst => write!(f, "stop-first"),
            UpdateOrder::StartFirst => write!(f, "start-first"),
        }
    }
}

/// Update or rollback policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePolicy {
    pub parallelism: Option<u32>,
    pub delay: Option<Duration>,
    pub failure_action: Option<FailureAction>,
    pub monitor: Option<Duration>,
    pub max_failure_ratio: Option<f64>,
    pub order: Option<UpdateOrder>,
}

/// Replica and resource management
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploySpec {
    pub mode: Option<DeployMode>,
    pub replicas: Option<u32>,
    pub resources: Resources,
    pub update_config: Option<UpdatePolicy>,
    pub rollback_config: Option<UpdatePolicy>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPolicy {
    Always,
    Never,
    Missing,
    Build,
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullPolicy::Always => write!(f, "always"),
            PullPolicy::Never => write!(f, "never"),
            PullPolicy::Missing => write!(f, "missing"),
            PullPolicy::Build => write!(f, "build"),
        }
    }
}

/// Settings that exist only at the compose level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    pub profiles: BTreeSet<String>,
    pub depends_on: BTreeMap<String, DependsOn>,
    pub build: Option<BuildSpec>,
    pub deploy: Option<DeploySpec>,
    pub pull_policy: Option<PullPolicy>,
    pub scale: Option<u32>,
}

/// A named service: one container plus its compose-only settings
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub container: Container,
    pub config: ServiceConfig,
}

impl Service {
    /// Whether the service starts when `active` profiles are enabled
    ///
    /// Services without profiles are always active.
    pub fn is_active(&self, active: &BTreeSet<String>) -> bool {
        self.config.profiles.is_empty() || !self.config.profiles.is_disjoint(active)
    }
}
