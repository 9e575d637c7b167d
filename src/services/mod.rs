//! Services module - the work behind each launcher command.
//!
//! Services know nothing about the command line. They take explicit inputs,
//! report progress through a [`crate::events::ProgressReporter`] and return
//! `LauncherResult` values that `main.rs` turns into output and exit codes.
//!
//! # Components
//!
//! - [`process`]: the [`CommandRunner`] seam over `tokio::process`, with timeouts
//! - [`tool_detection`]: git/cmake/ninja/compiler detection and winget installs
//! - [`versions`]: scraping the official build listings into [`crate::models::VersionRecord`]s
//! - [`download`]: stream, extract and register an official archive
//! - [`clone_build`]: clone Blender at a branch and build it
//! - [`build_info`] and [`library`]: `.blinfo` sidecars and the build library scan
//! - [`headless`]: host side of the scripts run inside a background Blender
//! - [`file_utils`]: titles, file name sanitizing and executable checks
//!
//! Anything that spawns a process goes through [`CommandRunner`] so it can be
//! scripted in tests, except the render stream which must read output live.

pub mod build_info;
pub mod clone_build;
pub mod download;
pub mod file_utils;
pub mod headless;
pub mod library;
pub mod process;
pub mod tool_detection;
pub mod versions;

pub use build_info::{BuildInfoExtractor, detect_executable, parse_version_output};
pub use clone_build::{
    BuildFailure, BuildHost, BuildStage, CloneBuildOrchestrator, CloneBuildRequest,
};
pub use download::{DownloadRequest, Downloader, find_blender_exe};
pub use file_utils::{generate_title_from_filename, sanitize_filename, validate_executable_path};
pub use headless::{RenderRunner, RenderTracker, SceneMetadata};
pub use library::{LibraryItem, scan_library};
pub use process::{CommandOutput, CommandRunner, CommandSpec, TokioRunner};
pub use tool_detection::{Tool, ToolDetector, install_selection};
pub use versions::{ChannelSelector, TargetOs, VersionFetcher};
