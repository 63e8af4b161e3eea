//! Compose subcommand options
//!
//! Each options struct renders itself into the argument list of one
//! compose subcommand. Mutually exclusive flags are all checked before an
//! error is returned, so a caller sees every conflict at once.

use crate::error::{FlagConflicts, Result};
use crate::project::PullPolicy;
use std::collections::BTreeMap;
use std::time::Duration;

/// Options of one compose subcommand
pub trait CommandOptions {
    /// Subcommand name, e.g. `up`
    fn subcommand(&self) -> &'static str;

    /// Flags in a stable order
    fn flags(&self) -> Result<Vec<String>>;

    /// Services the command is restricted to
    fn services(&self) -> &[String] {
        &[]
    }

    /// Subcommand, flags and services, ready to pass to the compose binary
    fn to_args(&self) -> Result<Vec<String>> {
        let mut args = vec![self.subcommand().to_string()];
        args.extend(self.flags()?);
        args.extend(self.services().iter().cloned());
        Ok(args)
    }
}

/// Collects conflicts between flags that are set together
#[derive(Debug, Default)]
struct Exclusions(Vec<String>);

impl Exclusions {
    fn check(&mut self, flag: &str, set: bool, others: &[(&str, bool)]) {
        if !set {
            return;
        }
        for (other, other_set) in others {
            if *other_set {
                self.0
                    .push(format!("{} cannot be combined with {}", flag, other));
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(FlagConflicts(self.0).into())
        }
    }
}

/// Pushes flags onto an argument list
#[derive(Debug, Default)]
struct Flags(Vec<String>);

impl Flags {
    fn switch(&mut self, flag: &str, set: bool) {
        if set {
            self.0.push(flag.to_string());
        }
    }

    fn value(&mut self, flag: &str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.0.push(flag.to_string());
            self.0.push(value.to_string());
        }
    }
}

/// Whole seconds, rounded up so a sub-second timeout never becomes zero
fn seconds(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Options for `compose up`
#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    pub detach: bool,
    /// Attach only to these services
    pub attach: Vec<String>,
    pub attach_dependencies: bool,
    pub watch: bool,
    pub wait: bool,
    pub wait_timeout: Option<Duration>,
    pub abort_on_container_exit: bool,
    pub abort_on_container_failure: bool,
    pub exit_code_from: Option<String>,
    pub build: bool,
    pub no_build: bool,
    pub force_recreate: bool,
    pub no_recreate: bool,
    pub no_deps: bool,
    pub remove_orphans: bool,
    pub pull: Option<PullPolicy>,
    pub timeout: Option<Duration>,
    pub scale: BTreeMap<String, u32>,
    pub services: Vec<String>,
}

impl UpOptions {
    fn check(&self) -> Result<()> {
        let attach = !self.attach.is_empty();
        let exit_code_from = self.exit_code_from.is_some();
        let mut ex = Exclusions::default();

        ex.check(
            "--detach",
            self.detach,
            &[
                ("--attach", attach),
                ("--attach-dependencies", self.attach_dependencies),
                ("--watch", self.watch),
                ("--abort-on-container-exit", self.abort_on_container_exit),
                ("--abort-on-container-failure", self.abort_on_container_failure),
                ("--exit-code-from", exit_code_from),
            ],
        );
        ex.check(
            "--wait",
            self.wait,
            &[
                ("--watch", self.watch),
                ("--attach", attach),
                ("--attach-dependencies", self.attach_dependencies),
                ("--detach", self.detach),
                ("--abort-on-container-exit", self.abort_on_container_exit),
                ("--abort-on-container-failure", self.abort_on_container_failure),
            ],
        );
        ex.check(
            "--attach",
            attach,
            &[("--attach-dependencies", self.attach_dependencies)],
        );
        ex.check(
            "--abort-on-container-exit",
            self.abort_on_container_exit,
            &[("--abort-on-container-failure", self.abort_on_container_failure)],
        );
        ex.check("--build", self.build, &[("--no-build", self.no_build)]);
        ex.check(
            "--force-recreate",
            self.force_recreate,
            &[("--no-recreate", self.no_recreate)],
        );
        ex.finish()
    }
}

impl CommandOptions for UpOptions {
    fn subcommand(&self) -> &'static str {
        "up"
    }

    fn flags(&self) -> Result<Vec<String>> {
        self.check()?;

        let mut f = Flags::default();
        f.switch("--detach", self.detach);
        for service in &self.attach {
            f.value("--attach", Some(service));
        }
        f.switch("--attach-dependencies", self.attach_dependencies);
        f.switch("--watch", self.watch);
        f.switch("--wait", self.wait);
        f.value("--wait-timeout", self.wait_timeout.map(seconds));
        f.switch("--abort-on-container-exit", self.abort_on_container_exit);
        f.switch("--abort-on-container-failure", self.abort_on_container_failure);
        f.value("--exit-code-from", self.exit_code_from.as_ref());
        f.switch("--build", self.build);
        f.switch("--no-build", self.no_build);
        f.switch("--force-recreate", self.force_recreate);
        f.switch("--no-recreate", self.no_recreate);
        f.switch("--no-deps", self.no_deps);
        f.switch("--remove-orphans", self.remove_orphans);
        f.value("--pull", self.pull);
        f.value("--timeout", self.timeout.map(seconds));
        for (service, count) in &self.scale {
            f.value("--scale", Some(format!("{}={}", service, count)));
        }
        Ok(f.0)
    }

    fn services(&self) -> &[String] {
        &self.services
    }
}

/// Which images `compose down` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveImages {
    All,
    Local,
}

impl std::fmt::Display for RemoveImages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoveImages::All => write!(f, "all"),
            RemoveImages::Local => write!(f, "local"),
        }
    }
}

/// Options for `compose down`
#[derive(Debug, Clone, Default)]
pub struct DownOptions {
    pub volumes: bool,
    pub remove_orphans: bool,
    pub rmi: Option<RemoveImages>,
    pub timeout: Option<Duration>,
    pub services: Vec<String>,
}

impl CommandOptions for DownOptions {
    fn subcommand(&self) -> &'static str {
        "down"
    }

    fn flags(&self) -> Result<Vec<String>> {
        let mut f = Flags::default();
        f.switch("--volumes", self.volumes);
        f.switch("--remove-orphans", self.remove_orphans);
        f.value("--rmi", self.rmi);
        f.value("--timeout", self.timeout.map(seconds));
        Ok(f.0)
    }

    fn services(&self) -> &[String] {
        &self.services
    }
}

/// Options for `compose build`
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub no_cache: bool,
    pub pull: bool,
    pub quiet: bool,
    pub push: bool,
    pub build_args: BTreeMap<String, String>,
    pub services: Vec<String>,
}

impl CommandOptions for BuildOptions {
    fn subcommand(&self) -> &'static str {
        "build"
    }

    fn flags(&self) -> Result<Vec<String>> {
        let mut ex = Exclusions::default();
        ex.check("--quiet", self.quiet, &[("--push", self.push)]);
        ex.finish()?;

        let mut f = Flags::default();
        f.switch("--no-cache", self.no_cache);
        f.switch("--pull", self.pull);
        f.switch("--quiet", self.quiet);
        f.switch("--push", self.push);
        for (key, value) in &self.build_args {
            f.value("--build-arg", Some(format!("{}={}", key, value)));
        }
        Ok(f.0)
    }

    fn services(&self) -> &[String] {
        &self.services
    }
}

/// How many log lines to show per container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tail {
    #[default]
    All,
    Lines(u32),
}

impl std::fmt::Display for Tail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tail::All => write!(f, "all"),
            Tail::Lines(n) => write!(f, "{}", n),
        }
    }
}

/// Options for `compose logs`
#[derive(Debug, Clone, Default)]
pub struct LogsOptions {
    pub follow: bool,
    pub timestamps: bool,
    pub no_color: bool,
    pub no_log_prefix: bool,
    pub tail: Option<Tail>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub services: Vec<String>,
}

impl CommandOptions for LogsOptions {
    fn subcommand(&self) -> &'static str {
        "logs"
    }

    fn flags(&self) -> Result<Vec<String>> {
        let mut f = Flags::default();
        f.switch("--follow", self.follow);
        f.switch("--timestamps", self.timestamps);
        f.switch("--no-color", self.no_color);
        f.switch("--no-log-prefix", self.no_log_prefix);
        f.value("--tail", self.tail);
        f.value("--since", self.since.as_ref());
        f.value("--until", self.until.as_ref());
        Ok(f.0)
    }

    fn services(&self) -> &[String] {
        &self.services
    }
}

/// Options for `compose events`; output is always JSON lines
#[derive(Debug, Clone, Default)]
pub struct EventsOptions {
    pub services: Vec<String>,
}

impl CommandOptions for EventsOptions {
    fn subcommand(&self) -> &'static str {
        "events"
    }

    fn flags(&self) -> Result<Vec<String>> {
        Ok(vec!["--json".to_string()])
    }

    fn services(&self) -> &[String] {
        &self.services
    }
}
