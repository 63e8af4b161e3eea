//! rune-compose - command line entry point
//!
//! Operates on the built-in demo project.

use clap::{Parser, Subcommand};
use rune_compose::compose::{
    translate_project, ComposeCli, DownOptions, EventsOptions, UpOptions,
};
use rune_compose::demo::demo_project;
use rune_compose::engine::EngineClient;
use rune_compose::error::{ComposeError, Result};
use rune_compose::settings::Settings;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compose projects defined in code
#[derive(Parser)]
#[command(name = "rune-compose")]
#[command(version)]
#[command(about = "Build compose projects in code and run them", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compose file of the demo project
    Config {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create and start the demo project
    Up {
        /// Run in the background
        #[arg(short, long)]
        detach: bool,
        /// Wait for services to be running or healthy
        #[arg(long)]
        wait: bool,
        /// Attach only to these services
        #[arg(long)]
        attach: Vec<String>,
        /// Build images before starting
        #[arg(long)]
        build: bool,
        /// Don't build images
        #[arg(long)]
        no_build: bool,
        /// Recreate containers even if unchanged
        #[arg(long)]
        force_recreate: bool,
        /// Remove containers not in the project
        #[arg(long)]
        remove_orphans: bool,
        /// Shutdown timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Services to start
        services: Vec<String>,
    },

    /// Stop and remove the demo project
    Down {
        /// Also remove named volumes
        #[arg(short, long)]
        volumes: bool,
        /// Remove containers not in the project
        #[arg(long)]
        remove_orphans: bool,
    },

    /// Stream container events until interrupted
    Events {
        /// Services to watch
        services: Vec<String>,
    },

    /// Create and start one service directly through the engine API
    Run {
        /// Service name
        service: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::from_env();
    let project = demo_project();

    match cli.command {
        Commands::Config { output } => {
            let doc = translate_project(&project)?;
            match output {
                Some(path) => {
                    doc.write_to(&path)?;
                    info!(path = %path.display(), "wrote compose file");
                }
                None => print!("{}", doc.to_yaml()?),
            }
        }

        Commands::Up {
            detach,
            wait,
            attach,
            build,
            no_build,
            force_recreate,
            remove_orphans,
            timeout,
            services,
        } => {
            let options = UpOptions {
                detach,
                wait,
                attach,
                build,
                no_build,
                force_recreate,
                remove_orphans,
                timeout: timeout.map(Duration::from_secs),
                services,
                ..UpOptions::default()
            };
            let doc = translate_project(&project)?;
            ComposeCli::from_settings(&settings).run(&doc, &options).await?;
        }

        Commands::Down {
            volumes,
            remove_orphans,
        } => {
            let options = DownOptions {
                volumes,
                remove_orphans,
                ..DownOptions::default()
            };
            let doc = translate_project(&project)?;
            ComposeCli::from_settings(&settings).run(&doc, &options).await?;
        }

        Commands::Events { services } => {
            let doc = translate_project(&project)?;
            let cancel = CancellationToken::new();
            let mut session = ComposeCli::from_settings(&settings)
                .events(
                    &doc,
                    &EventsOptions { services },
                    cancel.clone(),
                    settings.event_buffer,
                )
                .await?;

            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            });

            loop {
                tokio::select! {
                    event = session.events.recv() => match event {
                        Some(event) => println!("{}", serde_json::to_string(&event)?),
                        None => break,
                    },
                    Some(err) = session.errors.recv() => eprintln!("Warning: {}", err),
                }
            }

            session
                .task
                .await
                .map_err(|e| ComposeError::Io(std::io::Error::other(e)))??;
        }

        Commands::Run { service } => {
            project.validate()?;
            let Some(service) = project.service(&service) else {
                eprintln!("No such service: {}", service);
                std::process::exit(1);
            };
            let client = EngineClient::from_settings(&settings)?;
            let id = client.run(&service.container).await?;
            println!("{}", id);
        }
    }

    Ok(())
}
