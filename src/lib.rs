//! rune-compose - build container and compose project definitions in code
//!
//! Configuration is assembled with small setter operations from
//! [`builder`]. Invalid settings are collected as errors on the model
//! instead of aborting the build, and surface all at once on validation.
//! A validated [`Project`](project::Project) can be:
//!
//! - translated into a compose document and rendered as YAML
//! - handed to the compose binary, with its event output streamed back
//! - created container by container through the engine HTTP API

pub mod builder;
pub mod compose;
pub mod container;
pub mod demo;
pub mod engine;
pub mod error;
pub mod project;
pub mod settings;

pub use error::{ComposeError, Result};
