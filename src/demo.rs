//! Built-in example project used by the command line

use crate::builder::project::{network, volume};
use crate::builder::{container as c, host as h, network as n, service as s};
use crate::container::{Container, RestartPolicy};
use crate::project::{DependencyCondition, Project};
use std::time::Duration;

/// A web server in front of a database
///
/// `web` publishes 8080 and waits for `db` to report healthy; both share
/// the `back` network and the database keeps its data in `db-data`.
pub fn demo_project() -> Project {
    let mut web = Container::new("web");
    web.with_config([
        c::image("nginx:alpine"),
        c::healthcheck_cmd(["curl", "-f", "http://localhost"]),
        c::healthcheck_interval(Duration::from_secs(10)),
        c::healthcheck_timeout(Duration::from_secs(5)),
        c::healthcheck_retries(3),
    ])
    .with_host_config([
        h::publish("8080:80/tcp"),
        h::restart(RestartPolicy::UnlessStopped),
    ])
    .with_network_config([n::alias("back", "www")]);

    let mut db = Container::new("db");
    db.with_config([
        c::image("postgres:16-alpine"),
        c::env("POSTGRES_PASSWORD", "example"),
        c::healthcheck_shell("pg_isready -U postgres"),
        c::healthcheck_interval(Duration::from_secs(5)),
        c::healthcheck_retries(5),
    ])
    .with_host_config([
        h::bind("db-data:/var/lib/postgresql/data"),
        h::memory("512m"),
        h::pids_limit(200),
    ])
    .with_network_config([n::attach("back")]);

    let mut project = Project::new("demo");
    project
        .with_network("back", [network::driver("bridge")])
        .with_volume("db-data", [volume::driver("local")])
        .with_service("web", web, [s::depends_on("db", DependencyCondition::Healthy)])
        .with_service("db", db, [s::pull_policy(crate::project::PullPolicy::Missing)]);
    project
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::translate_project;

    #[test]
    fn test_demo_project_is_valid() {
        let project = demo_project();
        assert!(project.validate().is_ok(), "{:?}", project.errors());
        assert_eq!(project.start_order().unwrap(), vec!["db", "web"]);

        let doc = translate_project(&project).unwrap();
        assert_eq!(doc.services["web"].ports[0].to_string(), "8080:80/tcp");
        let data = &doc.services["db"].volumes[0];
        assert_eq!(data.kind, "volume");
        assert_eq!(data.source.as_deref(), Some("db-data"));
        assert!(doc.networks.contains_key("back"));
    }
}
