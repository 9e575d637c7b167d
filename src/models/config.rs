use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document stored in `config.json`
///
/// Holds the list of known Blender executables. Keys other than `blenders` are
/// carried through untouched so a rewrite never drops data written by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub blenders: Vec<ExecutableEntry>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// A registered executable. `path` is the natural key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutableEntry {
    pub path: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ExecutableEntry {
    pub fn new(path: impl Into<String>, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            title: title.into(),
            icon: None,
            extra: IndexMap::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Display label: title, then name, then a placeholder
    pub fn label(&self) -> &str {
        if !self.title.is_empty() {
            &self.title
        } else if !self.name.is_empty() {
            &self.name
        } else {
            "Untitled"
        }
    }
}

impl ConfigDocument {
    /// Position of the entry whose path equals `path`
    pub fn find_index(&self, path: &str) -> Option<usize> {
        self.blenders.iter().position(|b| b.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.find_index(path).is_some()
    }
}

/// Launcher settings from `Launcher Settings.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(rename = "Launcher_Settings")]
    pub launcher: LauncherSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherSettings {
    #[serde(rename = "Config Path", default = "default_config_path")]
    pub config_path: String,

    #[serde(rename = "Library Folder", default)]
    pub library_folder: String,

    #[serde(rename = "Scripts Folder", default = "default_scripts_folder")]
    pub scripts_folder: String,

    #[serde(rename = "Index URLs", default)]
    pub index_urls: IndexUrls,

    #[serde(rename = "Max Stable Folders", default = "default_max_stable_folders")]
    pub max_stable_folders: usize,

    #[serde(rename = "Max Builds Per Channel", default = "default_max_builds")]
    pub max_builds_per_channel: usize,

    #[serde(rename = "Download Progress", default)]
    pub download_progress: ProgressRange,

    #[serde(rename = "Timeouts", default)]
    pub timeouts: Timeouts,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            library_folder: String::new(),
            scripts_folder: default_scripts_folder(),
            index_urls: IndexUrls::default(),
            max_stable_folders: default_max_stable_folders(),
            max_builds_per_channel: default_max_builds(),
            download_progress: ProgressRange::default(),
            timeouts: Timeouts::default(),
            debug_mode: false,
        }
    }
}

/// Static listing pages scraped by the version fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexUrls {
    #[serde(rename = "Stable")]
    pub stable: String,

    #[serde(rename = "Daily")]
    pub daily: String,

    #[serde(rename = "Patch")]
    pub patch: String,

    #[serde(rename = "Experimental")]
    pub experimental: String,
}

impl Default for IndexUrls {
    fn default() -> Self {
        Self {
            stable: "https://download.blender.org/release/".to_string(),
            daily: "https://builder.blender.org/download/daily/".to_string(),
            patch: "https://builder.blender.org/download/patch/".to_string(),
            experimental: "https://builder.blender.org/download/experimental/".to_string(),
        }
    }
}

/// Share of the overall progress bar given to the download phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRange {
    #[serde(rename = "Start")]
    pub start: u8,

    #[serde(rename = "End")]
    pub end: u8,
}

impl Default for ProgressRange {
    fn default() -> Self {
        Self { start: 5, end: 75 }
    }
}

impl ProgressRange {
    /// Map `done / total` bytes into this range
    pub fn scale(&self, done: u64, total: u64) -> u8 {
        if total == 0 {
            return self.start;
        }
        let span = self.end.saturating_sub(self.start) as u64;
        let offset = (done.min(total) * span) / total;
        self.start + offset as u8
    }
}

/// Timeouts in seconds for every external process the launcher runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(rename = "Tool Probe", default = "default_tool_probe_timeout")]
    pub tool_probe: u64,

    #[serde(rename = "Version Probe", default = "default_version_probe_timeout")]
    pub version_probe: u64,

    #[serde(rename = "Clone", default = "default_clone_timeout")]
    pub git_clone: u64,

    #[serde(rename = "Library Update", default = "default_update_timeout")]
    pub library_update: u64,

    #[serde(rename = "Compile", default = "default_compile_timeout")]
    pub compile: u64,

    #[serde(rename = "Render", default)]
    pub render: Option<u64>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            tool_probe: default_tool_probe_timeout(),
            version_probe: default_version_probe_timeout(),
            git_clone: default_clone_timeout(),
            library_update: default_update_timeout(),
            compile: default_compile_timeout(),
            render: None,
        }
    }
}

fn default_config_path() -> String {
    "config.json".to_string()
}

fn default_scripts_folder() -> String {
    "backend".to_string()
}

fn default_max_stable_folders() -> usize {
    15
}

fn default_max_builds() -> usize {
    50
}

fn default_tool_probe_timeout() -> u64 {
    6
}

fn default_version_probe_timeout() -> u64 {
    30
}

fn default_clone_timeout() -> u64 {
    1800
}

fn default_update_timeout() -> u64 {
    3600
}

fn default_compile_timeout() -> u64 {
    7200
}
