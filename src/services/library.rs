use crate::models::BLINFO_FILE_NAME;
use crate::services::build_info::{BuildInfoExtractor, DEFAULT_BRANCH, detect_executable};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;

/// One build folder found in the library
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryItem {
    pub path: Utf8PathBuf,
    pub has_exe: bool,
    pub has_blinfo: bool,
    pub exe: Option<Utf8PathBuf>,
}

/// Build folders exactly two levels below `root` (`<root>/<channel>/<build>`), sorted
pub fn build_folders(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut builds = Vec::new();
    for channel in sorted_subdirs(root) {
        builds.extend(sorted_subdirs(&channel));
    }
    builds
}

fn sorted_subdirs(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<Utf8PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.path()).ok())
        .collect();
    dirs.sort();
    dirs
}

/// Report every build folder of the library.
///
/// With an extractor, builds that have an executable but no `.blinfo` get one
/// written. Failures there are logged and the item is still returned.
pub async fn scan_library(
    root: &Utf8Path,
    extractor: Option<&BuildInfoExtractor<'_>>,
) -> Vec<LibraryItem> {
    let mut items = Vec::new();

    for build in build_folders(root) {
        let exe = detect_executable(&build);
        let mut has_blinfo = build.join(BLINFO_FILE_NAME).is_file();

        if let (Some(extractor), Some(exe_path), false) = (extractor, exe.as_deref(), has_blinfo) {
            match extractor
                .extract_and_write(&build, DEFAULT_BRANCH, Some(exe_path))
                .await
            {
                Ok(_) => has_blinfo = true,
                Err(e) => tracing::warn!("Could not write build info for {}: {}", build, e),
            }
        }

        items.push(LibraryItem {
            has_exe: exe.is_some(),
            has_blinfo,
            exe,
            path: build,
        });
    }

    tracing::info!("Scanned {} builds under {}", items.len(), root);
    items
}
