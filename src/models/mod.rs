//! Data models shared by the launcher commands.
//!
//! - [`ConfigDocument`] / [`ExecutableEntry`]: the `config.json` store of known executables
//! - [`LauncherSettings`]: launcher preferences loaded from `Launcher Settings.yaml`
//! - [`VersionRecord`] / [`Channel`]: builds found on the official listing pages
//! - [`BuildInfoSidecar`]: the `.blinfo` file written next to a build
//!
//! Everything here is plain serializable data. File access lives in
//! [`crate::config`] and [`crate::services`].

pub mod build_info;
pub mod config;
pub mod version;

pub use build_info::{BLINFO_FILE_NAME, BuildInfoEntry, BuildInfoSidecar};
pub use config::{
    ConfigDocument, ExecutableEntry, IndexUrls, LauncherSettings, ProgressRange, SettingsFile,
    Timeouts,
};
pub use version::{Channel, SemVer, VersionRecord};
