//! File-backed configuration.
//!
//! - [`ConfigManager`]: CRUD over `config.json`, the list of known executables
//! - [`SettingsManager`]: launcher preferences in `Launcher Settings.yaml`

pub mod settings;

pub use settings::SettingsManager;

use crate::error::{LauncherError, LauncherResult};
use crate::models::{ConfigDocument, ExecutableEntry};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use std::fs;

/// Manager for the `config.json` executable store.
///
/// Every operation reads the file fresh and every mutation rewrites it in full;
/// nothing is cached between calls. There is no locking: two processes mutating
/// the store at once race and the last writer wins.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: Utf8PathBuf,
}

/// Outcome of a title change, reported back to the host
#[derive(Debug, Clone, PartialEq)]
pub struct TitleUpdate {
    pub old_title: String,
    pub new_title: String,
    pub entry: ExecutableEntry,
}

impl ConfigManager {
    /// Create a manager for `config_path`, writing an empty document if the file is missing.
    pub fn new<P: AsRef<Utf8Path>>(config_path: P) -> LauncherResult<Self> {
        let manager = Self {
            config_path: config_path.as_ref().to_path_buf(),
        };

        if !manager.config_path.exists() {
            tracing::info!("Creating empty config at {}", manager.config_path);
            manager.save(&ConfigDocument::default())?;
        }

        Ok(manager)
    }

    /// Load the document.
    ///
    /// Never fails: a missing, unreadable or malformed file is logged and an empty
    /// document is returned. The file on disk is left as it is until the next save.
    pub fn load(&self) -> ConfigDocument {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!("Failed to read config {}: {}", self.config_path, e);
                return ConfigDocument::default();
            }
        };

        match parse_document(&contents) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("Resetting config {}: {}", self.config_path, e);
                ConfigDocument::default()
            }
        }
    }

    /// Write the whole document, 2-space indented.
    ///
    /// The JSON goes to a sibling temp file first and is renamed over the target,
    /// so readers never observe a half-written file.
    pub fn save(&self, doc: &ConfigDocument) -> LauncherResult<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| LauncherError::fs(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(doc)?;
        let tmp_path = Utf8PathBuf::from(format!("{}.tmp", self.config_path));
        fs::write(&tmp_path, json).map_err(|e| LauncherError::fs(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.config_path)
            .map_err(|e| LauncherError::fs(&self.config_path, e))?;

        tracing::debug!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Index of the entry whose path equals `exe_path`
    pub fn find_index(&self, exe_path: &str) -> Option<usize> {
        self.load().find_index(exe_path)
    }

    pub fn executables(&self) -> Vec<ExecutableEntry> {
        self.load().blenders
    }

    /// Append an entry; fails with `DuplicateEntry` if its path is already present.
    pub fn add_executable(&self, entry: ExecutableEntry) -> LauncherResult<()> {
        let mut doc = self.load();

        if doc.contains(&entry.path) {
            return Err(LauncherError::DuplicateEntry(entry.path));
        }

        tracing::info!("Adding executable {} ({})", entry.label(), entry.path);
        doc.blenders.push(entry);
        self.save(&doc)
    }

    /// Append an entry unless its path is already present.
    ///
    /// Returns `true` when the entry was written.
    pub fn register_if_absent(&self, entry: ExecutableEntry) -> LauncherResult<bool> {
        match self.add_executable(entry) {
            Ok(()) => Ok(true),
            Err(LauncherError::DuplicateEntry(path)) => {
                tracing::info!("Executable already configured, not adding: {}", path);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove the entry for `exe_path`; fails with `NotFound` if absent.
    pub fn remove_executable(&self, exe_path: &str) -> LauncherResult<ExecutableEntry> {
        let mut doc = self.load();

        let index = doc
            .find_index(exe_path)
            .ok_or_else(|| LauncherError::NotFound(exe_path.to_string()))?;

        let removed = doc.blenders.remove(index);
        self.save(&doc)?;

        tracing::info!("Removed executable {}", removed.label());
        Ok(removed)
    }

    /// Change the title of the entry for `exe_path`; fails with `NotFound` if absent.
    pub fn update_title(&self, exe_path: &str, new_title: &str) -> LauncherResult<TitleUpdate> {
        let mut doc = self.load();

        let index = doc
            .find_index(exe_path)
            .ok_or_else(|| LauncherError::NotFound(exe_path.to_string()))?;

        let entry = &mut doc.blenders[index];
        let old_title = if entry.title.is_empty() {
            "Untitled".to_string()
        } else {
            entry.title.clone()
        };
        entry.title = new_title.to_string();
        let entry = entry.clone();

        self.save(&doc)?;

        tracing::info!("Title updated: '{}' -> '{}'", old_title, new_title);
        Ok(TitleUpdate {
            old_title,
            new_title: new_title.to_string(),
            entry,
        })
    }

    /// Get the config file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

/// Parse `config.json` leniently.
///
/// The top level must be an object. A missing or non-array `blenders` becomes empty,
/// and individual entries that are not valid executables are dropped with a warning.
fn parse_document(contents: &str) -> LauncherResult<ConfigDocument> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Ok(ConfigDocument::default());
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| LauncherError::ConfigCorruption(e.to_string()))?;

    let Value::Object(mut map) = value else {
        return Err(LauncherError::ConfigCorruption(
            "top level is not an object".to_string(),
        ));
    };

    let blenders = match map.remove("blenders") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ExecutableEntry>(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping malformed executable entry: {}", e);
                    None
                }
            })
            .collect(),
        Some(other) => {
            tracing::warn!("'blenders' is not a list ({}), resetting it", type_name(&other));
            Vec::new()
        }
        None => Vec::new(),
    };

    Ok(ConfigDocument {
        blenders,
        extra: map.into_iter().collect(),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
