//! Runtime settings

use crate::compose::events::DEFAULT_CAPACITY;
use tracing::warn;

/// Default engine API address
pub const DEFAULT_ENGINE_HOST: &str = "http://localhost:2375";

/// Settings for the compose binary, the engine API and event streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Compose program
    pub compose_program: String,
    /// Arguments placed before everything else, e.g. `compose` for `docker compose`
    pub compose_args: Vec<String>,
    /// Engine API base URL
    pub engine_host: String,
    /// Capacity of the event and error channels
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compose_program: "docker".to_string(),
            compose_args: vec!["compose".to_string()],
            engine_host: DEFAULT_ENGINE_HOST.to_string(),
            event_buffer: DEFAULT_CAPACITY,
        }
    }
}

impl Settings {
    /// Defaults overlaid with `RUNE_COMPOSE_BIN`, `DOCKER_HOST` and
    /// `RUNE_COMPOSE_EVENT_BUFFER`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(bin) = lookup("RUNE_COMPOSE_BIN") {
            let mut parts = bin.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                settings.compose_program = program;
                settings.compose_args = parts.collect();
            }
        }

        if let Some(host) = lookup("DOCKER_HOST") {
            match engine_url(&host) {
                Some(url) => settings.engine_host = url,
                None => warn!(host = %host, "unsupported DOCKER_HOST, using {}", settings.engine_host),
            }
        }

        if let Some(buffer) = lookup("RUNE_COMPOSE_EVENT_BUFFER") {
            match buffer.parse::<usize>() {
                Ok(n) if n > 0 => settings.event_buffer = n,
                _ => warn!(value = %buffer, "invalid RUNE_COMPOSE_EVENT_BUFFER, ignoring"),
            }
        }

        settings
    }
}

/// HTTP base URL for a `DOCKER_HOST` value; unix sockets are not supported
fn engine_url(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('/');
    if let Some(rest) = host.strip_prefix("tcp://") {
        Some(format!("http://{}", rest))
    } else if host.starts_with("http://") || host.starts_with("https://") {
        Some(host.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.compose_program, "docker");
        assert_eq!(settings.compose_args, vec!["compose"]);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("RUNE_COMPOSE_BIN", "podman compose --log-level warn"),
            ("DOCKER_HOST", "tcp://10.0.0.5:2375"),
            ("RUNE_COMPOSE_EVENT_BUFFER", "256"),
        ]));
        assert_eq!(settings.compose_program, "podman");
        assert_eq!(settings.compose_args, vec!["compose", "--log-level", "warn"]);
        assert_eq!(settings.engine_host, "http://10.0.0.5:2375");
        assert_eq!(settings.event_buffer, 256);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let settings = Settings::from_lookup(lookup(&[
            ("DOCKER_HOST", "unix:///var/run/docker.sock"),
            ("RUNE_COMPOSE_EVENT_BUFFER", "0"),
        ]));
        assert_eq!(settings.engine_host, DEFAULT_ENGINE_HOST);
        assert_eq!(settings.event_buffer, DEFAULT_CAPACITY);
    }
}
