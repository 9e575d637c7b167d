//! Command line definitions.
//!
//! Every subcommand is one launcher helper invoked by the host process. Results
//! go to stdout, either as one JSON object or as a stream of progress lines.

use blender_launcher::services::headless::parse_param;
use blender_launcher::services::{ChannelSelector, TargetOs, Tool};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "blender-launcher", version, about = "Helper commands for the Blender launcher")]
pub struct Cli {
    /// Folder holding `Launcher Settings.yaml` and the logs
    #[arg(long, global = true, default_value = "Launcher Data")]
    pub data_dir: Utf8PathBuf,

    /// Path of config.json (overrides the settings file)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    /// Do not mirror logs to stderr
    #[arg(long, global = true)]
    pub no_console: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Manage the executables stored in config.json
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Report (and optionally install) the build tools
    CheckTools {
        /// Install missing tools with winget
        #[arg(long)]
        install: bool,

        /// Comma separated subset, e.g. `git,cmake`
        #[arg(long, value_delimiter = ',')]
        tools: Vec<Tool>,
    },

    /// List downloadable builds as JSON events
    FetchVersions {
        /// stable, daily, patch, experimental or all
        #[arg(default_value = "all")]
        selector: ChannelSelector,

        /// Platform whose archives are listed (default: this machine)
        #[arg(long)]
        platform: Option<TargetOs>,
    },

    /// Download, extract and register an official build
    Download {
        version: String,
        url: String,
        target_dir: Utf8PathBuf,
        folder_name: String,
    },

    /// Clone Blender at a branch and compile it
    CloneBuild {
        repo: String,
        branch: String,
        target: Utf8PathBuf,

        /// Folder name for the checkout (default: `<repo>-<branch>`)
        #[arg(short, long)]
        name: Option<String>,

        /// Stop once the checkout is in place
        #[arg(long)]
        clone_only: bool,
    },

    /// List the builds of the library folder
    ScanLibrary {
        /// Library root (default: the configured library folder)
        root: Option<Utf8PathBuf>,

        /// Write `.blinfo` for builds that lack one
        #[arg(long)]
        write_blinfo: bool,
    },

    /// Write the `.blinfo` sidecar of a build folder
    BuildInfo {
        dir: Utf8PathBuf,

        #[arg(long)]
        exe: Option<Utf8PathBuf>,

        #[arg(long, default_value = "custom")]
        branch: String,
    },

    /// Render a .blend headless, streaming BL_REN markers
    Render {
        exe: Utf8PathBuf,
        blend: Utf8PathBuf,

        /// Render parameters forwarded as `key=value`
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Render script (default: the configured scripts folder)
        #[arg(long)]
        script: Option<Utf8PathBuf>,
    },

    /// Print the render settings of a .blend as JSON
    BlendInfo {
        exe: Utf8PathBuf,
        blend: Utf8PathBuf,

        #[arg(long)]
        script: Option<Utf8PathBuf>,
    },

    /// Inspect or toggle addons of a Blender executable
    Addons {
        #[command(subcommand)]
        action: AddonsCommand,
    },

    /// Print the display title derived from a file name
    Title { filename: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// List entries with `exists` and `size`
    GetExecutables,

    /// Add an entry with explicit fields
    AddExecutable {
        path: String,
        name: String,
        title: String,
        icon: Option<String>,
    },

    /// Add an entry, deriving name and title from the file name
    Add { path: Utf8PathBuf },

    RemoveExecutable { path: String },

    UpdateTitle { path: String, title: String },

    /// Check a path and describe the executable
    Validate { path: Utf8PathBuf },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AddonsCommand {
    /// List installed addons
    Probe {
        exe: Utf8PathBuf,

        #[arg(long)]
        script: Option<Utf8PathBuf>,
    },

    /// Enable or disable one addon
    Action {
        exe: Utf8PathBuf,
        #[arg(value_enum)]
        action: AddonAction,
        module: String,

        #[arg(long)]
        script: Option<Utf8PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonAction {
    Enable,
    Disable,
}
