use crate::models::{LauncherSettings, SettingsFile};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the launcher preferences inside the data directory
pub const SETTINGS_FILE_NAME: &str = "Launcher Settings.yaml";

/// Loads and saves `Launcher Settings.yaml`.
///
/// Settings are optional: a missing file yields defaults. A file that exists but
/// does not parse is an error from [`SettingsManager::load_settings`]; the
/// command line uses [`SettingsManager::load_settings_or_default`] and logs it.
#[derive(Debug, Clone)]
pub struct SettingsManager {
    data_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl SettingsManager {
    /// Create a manager rooted at `data_dir` (e.g. "Launcher Data"), creating the directory.
    pub fn new<P: AsRef<Utf8Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create data directory: {}", data_dir))?;
        }

        Ok(Self {
            settings_path: data_dir.join(SETTINGS_FILE_NAME),
            data_dir,
        })
    }

    pub fn load_settings(&self) -> Result<LauncherSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(LauncherSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let file: SettingsFile = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(file.launcher)
    }

    /// Load settings, falling back to defaults when the file cannot be read or parsed.
    ///
    /// The load error comes back alongside the defaults so the caller can log it
    /// once logging is initialized.
    pub fn load_settings_or_default(&self) -> (LauncherSettings, Option<anyhow::Error>) {
        match self.load_settings() {
            Ok(settings) => (settings, None),
            Err(e) => (LauncherSettings::default(), Some(e)),
        }
    }

    pub fn save_settings(&self, settings: &LauncherSettings) -> Result<()> {
        let file = SettingsFile {
            launcher: settings.clone(),
        };
        let yaml_string =
            serde_yaml_ng::to_string(&file).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Resolve the `config.json` path.
    ///
    /// An explicit path wins; otherwise the settings value is used, relative to
    /// the data directory unless it is absolute.
    pub fn resolve_config_path(
        &self,
        settings: &LauncherSettings,
        explicit: Option<&Utf8Path>,
    ) -> Utf8PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let configured = Utf8Path::new(&settings.config_path);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.data_dir.join(configured)
        }
    }

    /// Directory holding the helper scripts run inside Blender
    pub fn scripts_dir(&self, settings: &LauncherSettings) -> Utf8PathBuf {
        let configured = Utf8Path::new(&settings.scripts_folder);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.data_dir.join(configured)
        }
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_settings_manager() -> (SettingsManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = SettingsManager::new(dir.join("Launcher Data")).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let (manager, _temp_dir) = create_test_settings_manager();
        let settings = manager.load_settings().unwrap();
        assert_eq!(settings.config_path, "config.json");
        assert_eq!(settings.max_stable_folders, 15);
    }

    #[test]
    fn test_save_and_load_settings() {
        let (manager, _temp_dir) = create_test_settings_manager();
        let mut settings = LauncherSettings::default();
        settings.library_folder = "D:/Blender Builds".to_string();
        settings.timeouts.compile = 60;
        settings.debug_mode = true;

        manager.save_settings(&settings).unwrap();
        let loaded = manager.load_settings().unwrap();

        assert_eq!(loaded.library_folder, "D:/Blender Builds");
        assert_eq!(loaded.timeouts.compile, 60);
        assert!(loaded.debug_mode);
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let (manager, _temp_dir) = create_test_settings_manager();
        fs::write(
            manager.settings_path(),
            "Launcher_Settings:\n  Library Folder: /srv/builds\n  Timeouts:\n    Compile: 10\n",
        )
        .unwrap();

        let loaded = manager.load_settings().unwrap();
        assert_eq!(loaded.library_folder, "/srv/builds");
        assert_eq!(loaded.timeouts.compile, 10);
        assert_eq!(loaded.timeouts.git_clone, 1800);
        assert_eq!(loaded.scripts_folder, "backend");
    }

    #[test]
    fn test_invalid_settings_is_error() {
        let (manager, _temp_dir) = create_test_settings_manager();
        fs::write(manager.settings_path(), "Launcher_Settings: [unclosed").unwrap();
        assert!(manager.load_settings().is_err());
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_defaults() {
        let (manager, _temp_dir) = create_test_settings_manager();
        fs::write(manager.settings_path(), "Launcher_Settings: [unclosed").unwrap();

        let (settings, error) = manager.load_settings_or_default();

        assert_eq!(settings.config_path, "config.json");
        assert_eq!(settings.timeouts.compile, 7200);
        assert!(!settings.debug_mode);
        let error = error.unwrap();
        assert!(format!("{error:#}").contains("Failed to parse settings"));
        assert_eq!(
            manager.resolve_config_path(&settings, None),
            manager.data_dir().join("config.json")
        );
    }

    #[test]
    fn test_valid_settings_load_without_error() {
        let (manager, _temp_dir) = create_test_settings_manager();
        let (settings, error) = manager.load_settings_or_default();
        assert!(error.is_none());
        assert_eq!(settings.max_stable_folders, 15);
    }

    #[test]
    fn test_resolve_config_path() {
        let (manager, _temp_dir) = create_test_settings_manager();
        let settings = LauncherSettings::default();

        let resolved = manager.resolve_config_path(&settings, None);
        assert_eq!(resolved, manager.data_dir().join("config.json"));

        let explicit = Utf8Path::new("/tmp/other.json");
        assert_eq!(
            manager.resolve_config_path(&settings, Some(explicit)),
            explicit
        );
    }
}
