//! Compose document generation and the compose command line
//!
//! [`translate`] turns a validated [`Project`](crate::project::Project) into
//! a [`ProjectDocument`]. [`cli`] hands that document to the compose binary,
//! with arguments produced by the option types in [`flags`], and [`events`]
//! turns its event output back into typed values.

pub mod cli;
pub mod document;
pub mod duration;
pub mod events;
pub mod flags;
pub mod translate;

pub use cli::{ComposeCli, EventSession};
pub use document::{PortDocument, ProjectDocument, ServiceDocument};
pub use events::{event_stream, Event, EventSink};
pub use flags::{
    BuildOptions, CommandOptions, DownOptions, EventsOptions, LogsOptions, RemoveImages, Tail,
    UpOptions,
};
pub use translate::{translate_container, translate_project, translate_service};
