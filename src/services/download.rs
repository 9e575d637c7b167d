//! Official archive installs.
//!
//! An archive is streamed to `blender.zip` inside its install folder, unpacked
//! there and removed. The Blender executable found inside is then registered in
//! `config.json`.

use crate::config::ConfigManager;
use crate::error::{LauncherError, LauncherResult};
use crate::events::{ProgressEvent, ProgressReporter};
use crate::models::{ExecutableEntry, LauncherSettings, ProgressRange};
use crate::services::file_utils::sanitize_filename;
use crate::services::process::executable_name;
use crate::services::versions::build_http_client;
use camino::{Utf8Path, Utf8PathBuf};
use futures_util::StreamExt;
use reqwest::Client;
use std::fs;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Name of the archive while it is being downloaded
pub const ARCHIVE_NAME: &str = "blender.zip";

/// What to install and where
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub version: String,
    pub url: String,
    pub target_dir: Utf8PathBuf,
    pub folder_name: String,
}

impl DownloadRequest {
    /// Folder the archive is extracted into.
    ///
    /// Uses the sanitized folder name, or the version when the folder name is
    /// blank. The result is always a direct child of `target_dir`.
    pub fn install_dir(&self) -> LauncherResult<Utf8PathBuf> {
        [self.folder_name.as_str(), self.version.as_str()]
            .into_iter()
            .map(sanitize_filename)
            .find(|name| is_child_folder_name(name))
            .map(|name| self.target_dir.join(name))
            .ok_or_else(|| LauncherError::InvalidFolderName(self.folder_name.clone()))
    }
}

fn is_child_folder_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}

/// Downloads an official archive, unpacks it and registers the executable
pub struct Downloader {
    client: Client,
    config: ConfigManager,
    progress: ProgressRange,
}

impl Downloader {
    pub fn new(settings: &LauncherSettings, config: ConfigManager) -> LauncherResult<Self> {
        let client = build_http_client(Duration::from_secs(settings.timeouts.version_probe))?;

        Ok(Self {
            client,
            config,
            progress: settings.download_progress,
        })
    }

    /// Run the whole install and return the executable path.
    ///
    /// If no executable turns up after extraction the extracted files are kept
    /// for inspection and `ExecutableNotFound` is returned.
    pub async fn install(
        &self,
        request: &DownloadRequest,
        reporter: &ProgressReporter,
    ) -> LauncherResult<Utf8PathBuf> {
        reporter.log(format!("Starting download: {}", request.version));
        reporter.log(format!("URL: {}", request.url));

        let install_dir = request.install_dir()?;
        fs::create_dir_all(&install_dir).map_err(|e| LauncherError::fs(&install_dir, e))?;
        reporter.log(format!("Created directory: {install_dir}"));

        reporter.progress(self.progress.start, "Download started...");
        let archive = install_dir.join(ARCHIVE_NAME);
        let bytes = match self.download_to(&request.url, &archive, reporter).await {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial_archive(&archive);
                return Err(e);
            }
        };
        reporter.log(format!("Download complete: {bytes} bytes"));

        reporter.progress(80, "Extraction...");
        let zip_path = archive.clone();
        let dest = install_dir.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_zip(&zip_path, &dest))
            .await
            .map_err(|e| LauncherError::Parse(format!("extraction task failed: {e}")))??;
        reporter.log(format!("Extracted {extracted} files"));

        fs::remove_file(&archive).map_err(|e| LauncherError::fs(&archive, e))?;

        reporter.progress(90, "Looking for the executable...");
        let exe = find_blender_exe(&install_dir)
            .ok_or_else(|| LauncherError::ExecutableNotFound(install_dir.clone()))?;
        reporter.log(format!("Found executable: {exe}"));

        self.register(&exe, &request.version, reporter)?;

        reporter.progress(100, "Installation complete!");
        reporter.emit(ProgressEvent::Complete {
            path: exe.to_string(),
        });
        Ok(exe)
    }

    /// Stream `url` into `dest`, reporting progress inside the configured range
    async fn download_to(
        &self,
        url: &str,
        dest: &Utf8Path,
        reporter: &ProgressReporter,
    ) -> LauncherResult<u64> {
        let network_error = |source| LauncherError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| LauncherError::fs(dest, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_percent = self.progress.start;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network_error)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::fs(dest, e))?;
            downloaded += chunk.len() as u64;

            let percent = self.progress.scale(downloaded, total);
            if percent != last_percent {
                last_percent = percent;
                let shown = if total > 0 { downloaded * 100 / total } else { 0 };
                reporter.progress(percent, format!("Downloading: {shown}%"));
            }
        }

        file.flush().await.map_err(|e| LauncherError::fs(dest, e))?;
        Ok(downloaded)
    }

    fn register(
        &self,
        exe: &Utf8Path,
        version: &str,
        reporter: &ProgressReporter,
    ) -> LauncherResult<()> {
        let title = format!("Blender {version}").trim().to_string();
        let name = exe.file_name().unwrap_or_default();
        let entry = ExecutableEntry::new(exe.as_str(), name, title.as_str());

        if self.config.register_if_absent(entry)? {
            reporter.log("config.json updated with the executable");
        } else {
            reporter.log("Entry already present in config.json, not adding");
        }
        reporter.emit(ProgressEvent::ConfigUpdated {
            path: exe.to_string(),
            title,
        });
        Ok(())
    }
}

fn remove_partial_archive(archive: &Utf8Path) {
    match fs::remove_file(archive) {
        Ok(()) => tracing::debug!("Removed partial download {}", archive),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial download {}: {}", archive, e),
    }
}

/// Extract every entry of `zip_path` into `dest`; returns the number of files written.
///
/// Entries whose names would escape `dest` are skipped.
pub fn extract_zip(zip_path: &Utf8Path, dest: &Utf8Path) -> LauncherResult<usize> {
    let file = fs::File::open(zip_path).map_err(|e| LauncherError::fs(zip_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe zip entry: {}", entry.name());
            continue;
        };
        let Ok(relative) = Utf8PathBuf::from_path_buf(relative) else {
            tracing::warn!("Skipping non UTF-8 zip entry: {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| LauncherError::fs(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| LauncherError::fs(parent, e))?;
        }
        let mut out = fs::File::create(&out_path).map_err(|e| LauncherError::fs(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::fs(&out_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                    .map_err(|e| LauncherError::fs(&out_path, e))?;
            }
        }

        written += 1;
    }

    Ok(written)
}

/// First file under `dir` named like the platform Blender executable, case-insensitively.
///
/// Directories are visited in name order so the result is stable.
pub fn find_blender_exe(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    find_file_named(dir, &executable_name("blender"))
}

pub(crate) fn find_file_named(dir: &Utf8Path, wanted: &str) -> Option<Utf8PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let file_type = e.file_type().ok()?;
            let path = Utf8PathBuf::from_path_buf(e.path()).ok()?;
            Some((path, file_type))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in &entries {
        if file_type.is_file()
            && path
                .file_name()
                .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
        {
            return Some(path.clone());
        }
    }

    entries
        .iter()
        .filter(|(_, file_type)| file_type.is_dir())
        .find_map(|(path, _)| find_file_named(path, wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_blender_exe_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let nested = root.join("blender-4.3.0-windows-x64");
        fs::create_dir_all(&nested).unwrap();
        let upper = executable_name("blender").to_uppercase();
        fs::write(nested.join(&upper), b"").unwrap();
        fs::write(nested.join("blender-launcher.exe"), b"").unwrap();

        assert_eq!(find_blender_exe(&root), Some(nested.join(upper)));
    }

    #[test]
    fn test_find_blender_exe_missing() {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("empty/deeper")).unwrap();
        assert_eq!(find_blender_exe(&root), None);
    }

    #[test]
    fn test_install_dir_is_sanitized() {
        let request = DownloadRequest {
            version: "4.3.0".to_string(),
            url: "https://example.org/blender.zip".to_string(),
            target_dir: Utf8PathBuf::from("/builds"),
            folder_name: "Blender 4.3: LTS".to_string(),
        };
        assert_eq!(
            request.install_dir().unwrap(),
            Utf8PathBuf::from("/builds/Blender 4.3_ LTS")
        );
    }

    #[test]
    fn test_blank_folder_name_falls_back_to_version() {
        let mut request = DownloadRequest {
            version: "4.3.0".to_string(),
            url: "https://example.org/blender.zip".to_string(),
            target_dir: Utf8PathBuf::from("/builds"),
            folder_name: "   ".to_string(),
        };
        assert_eq!(
            request.install_dir().unwrap(),
            Utf8PathBuf::from("/builds/4.3.0")
        );

        request.folder_name = "..".to_string();
        assert_eq!(
            request.install_dir().unwrap(),
            Utf8PathBuf::from("/builds/4.3.0")
        );

        request.version = String::new();
        assert!(matches!(
            request.install_dir(),
            Err(LauncherError::InvalidFolderName(_))
        ));
    }
}
