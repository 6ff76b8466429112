pub mod app;
pub mod config;
pub mod core;
pub mod format;
pub mod models;

pub use crate::app::AdminApp;
pub use crate::config::Config;
pub use crate::core::auth::MemoryAuth;
pub use crate::core::db::{Gateway, MemoryStore, SqliteStore, StoreError};
pub use crate::models::{Attendee, CheckInPayload, Project, ProjectStatus, ProjectUpdate};
