//! Error types for rune-compose

use std::fmt;
use thiserror::Error;

/// Result type for rune-compose operations
pub type Result<T> = std::result::Result<T, ComposeError>;

/// The record an accumulated configuration error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    Container,
    Host,
    Network,
    Platform,
    Service,
    Project,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Container => write!(f, "container"),
            ErrorKind::Host => write!(f, "host"),
            ErrorKind::Network => write!(f, "network"),
            ErrorKind::Platform => write!(f, "platform"),
            ErrorKind::Service => write!(f, "service"),
            ErrorKind::Project => write!(f, "project"),
        }
    }
}

/// A single field-tagged configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} config: {field}: {message}")]
pub struct ConfigError {
    pub kind: ErrorKind,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(kind: ErrorKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every configuration error collected on a model, in the order recorded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Errors recorded against one field
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ConfigError> {
        self.0.iter().filter(move |e| e.field == field)
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

/// Mutually exclusive command options found while generating flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagConflicts(pub Vec<String>);

impl FlagConflicts {
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FlagConflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("\n"))
    }
}

impl std::error::Error for FlagConflicts {}

/// rune-compose error types
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("invalid configuration:\n{0}")]
    Config(ConfigErrors),

    #[error("incompatible flags:\n{0}")]
    FlagConflict(FlagConflicts),

    #[error("failed to parse event {line:?}: {source}")]
    EventParse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event stream cancelled")]
    Cancelled,

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Execution { command: String, status: String },

    #[error("engine returned {status}: {message}")]
    Engine { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ComposeError {
    pub fn is_config(&self) -> bool {
        matches!(self, ComposeError::Config(_))
    }

    pub fn is_flag_conflict(&self) -> bool {
        matches!(self, ComposeError::FlagConflict(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ComposeError::Cancelled)
    }

    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            ComposeError::Execution { .. } | ComposeError::Spawn { .. }
        )
    }

    /// Configuration errors carried by this error, if any
    pub fn config_errors(&self) -> Option<&ConfigErrors> {
        match self {
            ComposeError::Config(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ConfigErrors> for ComposeError {
    fn from(errors: ConfigErrors) -> Self {
        ComposeError::Config(errors)
    }
}

impl From<FlagConflicts> for ComposeError {
    fn from(conflicts: FlagConflicts) -> Self {
        ComposeError::FlagConflict(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::new(ErrorKind::Host, "memory", "invalid size \"lots\"");
        assert_eq!(err.to_string(), "host config: memory: invalid size \"lots\"");
    }

    #[test]
    fn test_config_errors_joined() {
        let errors = ConfigErrors(vec![
            ConfigError::new(ErrorKind::Container, "image", "empty"),
            ConfigError::new(ErrorKind::Network, "mac_address", "bad"),
        ]);
        let err = ComposeError::from(errors);
        assert!(err.is_config());
        let text = err.to_string();
        assert!(text.contains("container config: image: empty"));
        assert!(text.contains("network config: mac_address: bad"));
    }

    #[test]
    fn test_kind_matching() {
        let err = ComposeError::from(FlagConflicts(vec!["a".into()]));
        assert!(err.is_flag_conflict());
        assert!(!err.is_config());
        assert!(ComposeError::Cancelled.is_cancelled());
    }
}
