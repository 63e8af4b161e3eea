//! Runs the external compose binary
//!
//! The project document is piped to the binary on stdin (`-f -`), so
//! nothing is written to disk.

use super::document::ProjectDocument;
use super::events::{event_stream, Event};
use super::flags::{CommandOptions, EventsOptions};
use crate::error::{ComposeError, Result};
use crate::settings::Settings;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to a running compose binary
#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
    leading_args: Vec<String>,
}

/// A running `compose events` session
#[derive(Debug)]
pub struct EventSession {
    pub events: mpsc::Receiver<Event>,
    pub errors: mpsc::Receiver<ComposeError>,
    /// Finishes when the process exits or the stream is cancelled
    pub task: JoinHandle<Result<()>>,
}

impl Default for ComposeCli {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ComposeCli {
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.compose_program.clone(), settings.compose_args.clone())
    }

    /// Full argument list for one invocation
    pub fn args(&self, project: &str, options: &impl CommandOptions) -> Result<Vec<String>> {
        let mut args = self.leading_args.clone();
        args.extend(["-f", "-", "--project-name", project].map(String::from));
        args.extend(options.to_args()?);
        Ok(args)
    }

    fn describe(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the binary and feed it the document from a separate task
    ///
    /// Stdin is written concurrently with draining stdout. Join the
    /// returned writer once the child has exited.
    async fn spawn(
        &self,
        doc: &ProjectDocument,
        args: &[String],
        stdout: Stdio,
    ) -> Result<(Child, JoinHandle<Result<()>>)> {
        let yaml = doc.to_yaml()?;
        let command = self.describe(args);
        debug!(command = %command, bytes = yaml.len(), "spawning compose");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ComposeError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let writer = tokio::spawn(async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(yaml.as_bytes()).await {
                Ok(()) => Ok(()),
                // The binary may exit without reading the project
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(command = %command, "compose closed stdin early");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        });
        Ok((child, writer))
    }

    fn check_status(command: String, status: std::process::ExitStatus) -> Result<()> {
        if status.success() {
            info!(command = %command, "compose finished");
            Ok(())
        } else {
            warn!(command = %command, %status, "compose failed");
            Err(ComposeError::Execution {
                command,
                status: status.to_string(),
            })
        }
    }

    /// Run a subcommand with stdout and stderr inherited
    pub async fn run(&self, doc: &ProjectDocument, options: &impl CommandOptions) -> Result<()> {
        let args = self.args(&doc.name, options)?;
        let (mut child, writer) = self.spawn(doc, &args, Stdio::inherit()).await?;
        let status = child.wait().await?;
        join_writer(writer).await?;
        Self::check_status(self.describe(&args), status)
    }

    /// Run a subcommand and capture its stdout
    pub async fn output(
        &self,
        doc: &ProjectDocument,
        options: &impl CommandOptions,
    ) -> Result<Vec<u8>> {
        let args = self.args(&doc.name, options)?;
        let (child, writer) = self.spawn(doc, &args, Stdio::piped()).await?;
        let output = child.wait_with_output().await?;
        join_writer(writer).await?;
        Self::check_status(self.describe(&args), output.status)?;
        Ok(output.stdout)
    }

    /// Start `compose events` and stream its output as [`Event`]s
    ///
    /// Cancelling `cancel` stops the stream and kills the process.
    pub async fn events(
        &self,
        doc: &ProjectDocument,
        options: &EventsOptions,
        cancel: CancellationToken,
        capacity: usize,
    ) -> Result<EventSession> {
        let args = self.args(&doc.name, options)?;
        let command = self.describe(&args);
        let (mut child, writer) = self.spawn(doc, &args, Stdio::piped()).await?;
        let stdout = child.stdout.take().ok_or_else(|| ComposeError::Spawn {
            command: command.clone(),
            source: std::io::Error::other("stdout not captured"),
        })?;

        let (events, errors, mut sink) = event_stream(cancel, capacity);
        let task = tokio::spawn(async move {
            match sink.copy_from(stdout).await {
                Ok(bytes) => debug!(command = %command, bytes, "event output closed"),
                Err(err) if err.is_cancelled() => {
                    info!(command = %command, "event stream cancelled");
                    writer.abort();
                    stop(&mut child).await;
                    return Ok(());
                }
                Err(err) => {
                    writer.abort();
                    stop(&mut child).await;
                    return Err(err);
                }
            }
            let status = child.wait().await?;
            join_writer(writer).await?;
            Self::check_status(command, status)
        });

        Ok(EventSession {
            events,
            errors,
            task,
        })
    }
}

async fn join_writer(writer: JoinHandle<Result<()>>) -> Result<()> {
    writer
        .await
        .map_err(|e| ComposeError::Io(std::io::Error::other(e)))?
}

async fn stop(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "compose process already gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::document::ServiceDocument;
    use crate::compose::flags::{DownOptions, UpOptions};

    fn doc() -> ProjectDocument {
        ProjectDocument {
            name: "demo".to_string(),
            ..ProjectDocument::default()
        }
    }

    /// A stand-in for the compose binary that runs `script` under sh
    fn shell(script: &str) -> ComposeCli {
        ComposeCli::new("sh", vec!["-c".to_string(), script.to_string(), "compose".to_string()])
    }

    #[test]
    fn test_args_layout() {
        let cli = ComposeCli::new("docker", vec!["compose".to_string()]);
        let args = cli.args("demo", &DownOptions::default()).unwrap();
        assert_eq!(args, vec!["compose", "-f", "-", "--project-name", "demo", "down"]);
    }

    #[tokio::test]
    async fn test_flag_conflict_prevents_spawn() {
        let cli = ComposeCli::new("/nonexistent/compose", Vec::new());
        let opts = UpOptions {
            detach: true,
            watch: true,
            ..UpOptions::default()
        };
        let err = cli.run(&doc(), &opts).await.unwrap_err();
        assert!(err.is_flag_conflict());
    }

    #[tokio::test]
    async fn test_document_piped_to_stdin() {
        let cli = shell("cat");
        let out = cli.output(&doc(), &DownOptions::default()).await.unwrap();
        let yaml = String::from_utf8(out).unwrap();
        assert!(yaml.contains("name: demo"));
    }

    #[tokio::test]
    async fn test_large_document_echoed_back() {
        let mut large = doc();
        for i in 0..3000 {
            large.services.insert(
                format!("service-{i:04}"),
                ServiceDocument {
                    image: Some(format!("registry.example.com/team/image-{i}:latest")),
                    ..ServiceDocument::default()
                },
            );
        }
        let yaml = large.to_yaml().unwrap();
        assert!(yaml.len() > 64 * 1024);

        let cli = shell("cat");
        let out = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            cli.output(&large, &DownOptions::default()),
        )
        .await
        .expect("compose output stalled")
        .unwrap();
        assert_eq!(out.len(), yaml.len());
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let cli = shell("cat >/dev/null; exit 3");
        let err = cli.run(&doc(), &DownOptions::default()).await.unwrap_err();
        assert!(err.is_execution());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let cli = ComposeCli::new("/nonexistent/compose", Vec::new());
        let err = cli.run(&doc(), &DownOptions::default()).await.unwrap_err();
        assert!(matches!(err, ComposeError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_events_streamed() {
        let line = r#"{"time":"2024-05-01T12:00:00Z","type":"container","action":"start","id":"abc","service":"web","attributes":{}}"#;
        let cli = shell(&format!("cat >/dev/null; echo '{}'; echo bogus", line));
        let mut session = cli
            .events(&doc(), &EventsOptions::default(), CancellationToken::new(), 4)
            .await
            .unwrap();

        let event = session.events.recv().await.unwrap();
        assert_eq!(event.action, "start");
        assert!(session.errors.recv().await.is_some());
        session.task.await.unwrap().unwrap();
    }
}
