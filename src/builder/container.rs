//! Process-level setters

use super::Op;
use crate::container::{ContainerConfig, HealthConfig, PortProto, HEALTHCHECK_DISABLED};
use std::time::Duration;

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Image reference to run
pub fn image(reference: &str) -> Op<ContainerConfig> {
    let reference = reference.to_string();
    Op::new("image", move |c: &mut ContainerConfig| {
        if reference.trim().is_empty() {
            return Err("image reference must not be empty".to_string());
        }
        c.image = reference.clone();
        Ok(())
    })
}

pub fn cmd<I, S>(args: I) -> Op<ContainerConfig>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = strings(args);
    Op::infallible("command", move |c: &mut ContainerConfig| c.cmd = args.clone())
}

pub fn entrypoint<I, S>(args: I) -> Op<ContainerConfig>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = strings(args);
    Op::infallible("entrypoint", move |c: &mut ContainerConfig| {
        c.entrypoint = args.clone()
    })
}

fn check_env_key(key: &str) -> Result<(), String> {
    if key.is_empty() || key.contains('=') {
        return Err(format!("invalid environment variable name {:?}", key));
    }
    Ok(())
}

/// Add an environment variable, rejecting a key that is already set
pub fn env(key: &str, value: &str) -> Op<ContainerConfig> {
    let (key, value) = (key.to_string(), value.to_string());
    Op::new("environment", move |c: &mut ContainerConfig| {
        check_env_key(&key)?;
        if c.env.contains_key(&key) {
            return Err(format!("environment variable {:?} already set", key));
        }
        c.env.insert(key.clone(), value.clone());
        Ok(())
    })
}

/// Set an environment variable, replacing any previous value
pub fn env_override(key: &str, value: &str) -> Op<ContainerConfig> {
    let (key, value) = (key.to_string(), value.to_string());
    Op::new("environment", move |c: &mut ContainerConfig| {
        check_env_key(&key)?;
        c.env.insert(key.clone(), value.clone());
        Ok(())
    })
}

/// Set a label; the last value written wins
pub fn label(key: &str, value: &str) -> Op<ContainerConfig> {
    let (key, value) = (key.to_string(), value.to_string());
    Op::new("labels", move |c: &mut ContainerConfig| {
        if key.is_empty() {
            return Err("label key must not be empty".to_string());
        }
        c.labels.insert(key.clone(), value.clone());
        Ok(())
    })
}

/// Expose a port such as `80` or `53/udp`
pub fn expose(port: &str) -> Op<ContainerConfig> {
    Op::or_fail(
        "expose",
        port.parse::<PortProto>().map(|port| {
            Op::infallible("expose", move |c: &mut ContainerConfig| {
                c.exposed_ports.insert(port);
            })
        }),
    )
}

pub fn working_dir(path: &str) -> Op<ContainerConfig> {
    let path = path.to_string();
    Op::new("working_dir", move |c: &mut ContainerConfig| {
        if !path.starts_with('/') {
            return Err(format!("working directory {:?} is not absolute", path));
        }
        c.working_dir = path.clone();
        Ok(())
    })
}

pub fn user(user: &str) -> Op<ContainerConfig> {
    let user = user.to_string();
    Op::infallible("user", move |c: &mut ContainerConfig| c.user = user.clone())
}

pub fn hostname(name: &str) -> Op<ContainerConfig> {
    let name = name.to_string();
    Op::new("hostname", move |c: &mut ContainerConfig| {
        if name.len() > 63 || name.starts_with('-') || name.contains(char::is_whitespace) {
            return Err(format!("invalid hostname {:?}", name));
        }
        c.hostname = name.clone();
        Ok(())
    })
}

pub fn domainname(name: &str) -> Op<ContainerConfig> {
    let name = name.to_string();
    Op::infallible("domainname", move |c: &mut ContainerConfig| {
        c.domainname = name.clone()
    })
}

pub fn tty(enabled: bool) -> Op<ContainerConfig> {
    Op::infallible("tty", move |c: &mut ContainerConfig| c.tty = enabled)
}

pub fn stdin_open(enabled: bool) -> Op<ContainerConfig> {
    Op::infallible("stdin_open", move |c: &mut ContainerConfig| c.open_stdin = enabled)
}

pub fn stop_signal(signal: &str) -> Op<ContainerConfig> {
    let signal = signal.to_string();
    Op::new("stop_signal", move |c: &mut ContainerConfig| {
        if signal.is_empty() {
            return Err("stop signal must not be empty".to_string());
        }
        c.stop_signal = Some(signal.clone());
        Ok(())
    })
}

pub fn stop_timeout(timeout: Duration) -> Op<ContainerConfig> {
    Op::infallible("stop_grace_period", move |c: &mut ContainerConfig| {
        c.stop_timeout = Some(timeout)
    })
}

fn health(c: &mut ContainerConfig) -> &mut HealthConfig {
    c.healthcheck.get_or_insert_with(HealthConfig::default)
}

/// Append tokens to the health check test
///
/// The first token of a test must be `CMD` or `CMD-SHELL`.
pub fn healthcheck_test<I, S>(tokens: I) -> Op<ContainerConfig>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens = strings(tokens);
    Op::new("healthcheck.test", move |c: &mut ContainerConfig| {
        let hc = health(c);
        if hc.is_disabled() {
            return Err("health check is disabled".to_string());
        }
        if hc.test.is_empty() {
            match tokens.first().map(String::as_str) {
                Some("CMD") | Some("CMD-SHELL") => {}
                Some(other) => {
                    return Err(format!(
                        "health check test must start with CMD or CMD-SHELL, got {:?}",
                        other
                    ))
                }
                None => return Ok(()),
            }
        }
        hc.test.extend(tokens.iter().cloned());
        Ok(())
    })
}

/// Health check running `args` directly
pub fn healthcheck_cmd<I, S>(args: I) -> Op<ContainerConfig>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut tokens = vec!["CMD".to_string()];
    tokens.extend(strings(args));
    healthcheck_test(tokens)
}

/// Health check running `command` through the shell
pub fn healthcheck_shell(command: &str) -> Op<ContainerConfig> {
    healthcheck_test(["CMD-SHELL", command])
}

pub fn healthcheck_interval(interval: Duration) -> Op<ContainerConfig> {
    Op::infallible("healthcheck.interval", move |c: &mut ContainerConfig| {
        health(c).interval = interval
    })
}

pub fn healthcheck_timeout(timeout: Duration) -> Op<ContainerConfig> {
    Op::infallible("healthcheck.timeout", move |c: &mut ContainerConfig| {
        health(c).timeout = timeout
    })
}

pub fn healthcheck_start_period(period: Duration) -> Op<ContainerConfig> {
    Op::infallible("healthcheck.start_period", move |c: &mut ContainerConfig| {
        health(c).start_period = period
    })
}

pub fn healthcheck_start_interval(interval: Duration) -> Op<ContainerConfig> {
    Op::infallible("healthcheck.start_interval", move |c: &mut ContainerConfig| {
        health(c).start_interval = interval
    })
}

pub fn healthcheck_retries(retries: u32) -> Op<ContainerConfig> {
    Op::infallible("healthcheck.retries", move |c: &mut ContainerConfig| {
        health(c).retries = retries
    })
}

/// Disable any health check, including one defined by the image
pub fn disable_healthcheck() -> Op<ContainerConfig> {
    Op::infallible("healthcheck", |c: &mut ContainerConfig| {
        c.healthcheck = Some(HealthConfig {
            test: vec![HEALTHCHECK_DISABLED.to_string()],
            ..HealthConfig::default()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;

    #[test]
    fn test_env_rejects_duplicate_key() {
        let mut config = ContainerConfig::default();
        let errors = apply(
            &mut config,
            [env("MODE", "dev"), env("MODE", "prod"), env("A=B", "x")],
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(config.env["MODE"], "dev");
        assert_eq!(config.env.len(), 1);
    }

    #[test]
    fn test_env_override_last_write_wins() {
        let mut config = ContainerConfig::default();
        let errors = apply(&mut config, [env("MODE", "dev"), env_override("MODE", "prod")]);
        assert!(errors.is_empty());
        assert_eq!(config.env["MODE"], "prod");
        assert_eq!(config.env_list(), vec!["MODE=prod"]);
    }

    #[test]
    fn test_healthcheck_accumulates_tokens() {
        let mut config = ContainerConfig::default();
        let errors = apply(
            &mut config,
            [
                healthcheck_test(["CMD", "curl"]),
                healthcheck_test(["-f", "http://localhost/"]),
                healthcheck_retries(5),
            ],
        );
        assert!(errors.is_empty());
        let hc = config.healthcheck.unwrap();
        assert_eq!(hc.test, vec!["CMD", "curl", "-f", "http://localhost/"]);
        assert_eq!(hc.retries, 5);
    }

    #[test]
    fn test_healthcheck_requires_cmd_prefix() {
        let mut config = ContainerConfig::default();
        let errors = apply(&mut config, [healthcheck_test(["curl"])]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "healthcheck.test");
    }

    #[test]
    fn test_disable_healthcheck() {
        let mut config = ContainerConfig::default();
        let errors = apply(
            &mut config,
            [healthcheck_cmd(["true"]), disable_healthcheck(), healthcheck_shell("exit 0")],
        );
        assert_eq!(errors.len(), 1);
        assert!(config.healthcheck.unwrap().is_disabled());
    }

    #[test]
    fn test_expose_parse_failure_is_collected() {
        let mut config = ContainerConfig::default();
        let errors = apply(&mut config, [expose("8080/tcp"), expose("eighty")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "expose");
        assert!(config.exposed_ports.contains(&PortProto::tcp(8080)));
    }

    #[test]
    fn test_working_dir_must_be_absolute() {
        let mut config = ContainerConfig::default();
        let errors = apply(&mut config, [working_dir("app"), image("")]);
        assert_eq!(errors.len(), 2);
        assert!(config.working_dir.is_empty());
    }
}
