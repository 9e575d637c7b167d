// Blender Launcher - helper commands for a desktop Blender launcher
//
// This is the library crate containing the services and data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, SettingsManager};
pub use error::{LauncherError, LauncherResult};
pub use events::{EventFormat, ProgressEvent, ProgressReporter};
pub use models::{ConfigDocument, ExecutableEntry, LauncherSettings, VersionRecord};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
