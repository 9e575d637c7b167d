use crate::error::{LauncherError, LauncherResult};
use crate::models::{BLINFO_FILE_NAME, BuildInfoEntry, BuildInfoSidecar};
use crate::services::process::{CommandRunner, CommandSpec};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::time::Duration;

static COMMIT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"build commit date:\s*(.*)").expect("Invalid commit date regex"));

static COMMIT_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"build commit time:\s*(.*)").expect("Invalid commit time regex"));

static BUILD_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"build hash:\s*([0-9a-fA-F]+)").expect("Invalid build hash regex"));

static PRODUCT_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Blender|Bforartists)\s+(\S+)").expect("Invalid product version regex")
});

/// Branch recorded for builds that did not come from an official channel
pub const DEFAULT_BRANCH: &str = "custom";

/// Sub-folders searched when the build folder has no executable at its top level
const NESTED_DIRS: &[&str] = &["bin", "build", "Release", "release"];

/// Fields read from the banner printed by `blender -v`
#[derive(Debug, Clone, PartialEq)]
pub struct VersionBanner {
    pub commit_time: NaiveDateTime,
    pub build_hash: String,
    pub subversion: String,
    pub custom_name: String,
}

/// Parse the `-v` banner.
///
/// Missing or malformed commit date/time fall back to the current local time;
/// other missing fields are empty strings.
pub fn parse_version_output(output: &str) -> VersionBanner {
    let capture = |re: &Regex| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    let commit_time = match (capture(&COMMIT_DATE), capture(&COMMIT_TIME)) {
        (Some(date), Some(time)) => {
            NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M")
                .unwrap_or_else(|e| {
                    tracing::debug!("Unparseable commit time '{} {}': {}", date, time, e);
                    Local::now().naive_local()
                })
        }
        _ => Local::now().naive_local(),
    };

    let build_hash = capture(&BUILD_HASH).unwrap_or_default();

    let first_line = output.lines().next().unwrap_or_default().trim();
    let (custom_name, subversion) = PRODUCT_VERSION
        .captures(first_line)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .unwrap_or_default();

    VersionBanner {
        commit_time,
        build_hash,
        subversion,
        custom_name,
    }
}

/// Find the Blender executable of a build folder.
///
/// The folder itself and the macOS bundle layouts are checked first, then the
/// usual build output folders, recursively.
pub fn detect_executable(build_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let candidates = [
        build_dir.join("blender.exe"),
        build_dir.join("blender"),
        build_dir.join("Bforartists/Bforartists.app/Contents/MacOS/Bforartists"),
        build_dir.join("Blender/Blender.app/Contents/MacOS/Blender"),
    ];
    if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
        return Some(found);
    }

    NESTED_DIRS
        .iter()
        .map(|sub| build_dir.join(sub))
        .filter(|dir| dir.is_dir())
        .find_map(|dir| detect_executable(&dir))
}

/// Writes `.blinfo` sidecars from what the executable reports about itself
pub struct BuildInfoExtractor<'a> {
    runner: &'a dyn CommandRunner,
    timeout: Duration,
}

impl<'a> BuildInfoExtractor<'a> {
    pub fn new(runner: &'a dyn CommandRunner, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Run `<exe> -v` and build the sidecar for `build_dir`.
    ///
    /// Only a failure to run the executable is an error; a banner that cannot
    /// be parsed still produces a sidecar with fallback values.
    pub async fn extract(
        &self,
        build_dir: &Utf8Path,
        branch: &str,
        exe_override: Option<&Utf8Path>,
    ) -> LauncherResult<BuildInfoSidecar> {
        let exe = match exe_override {
            Some(exe) => exe.to_path_buf(),
            None => detect_executable(build_dir)
                .ok_or_else(|| LauncherError::ExecutableNotFound(build_dir.to_path_buf()))?,
        };

        let spec = CommandSpec::new(exe.as_str()).arg("-v").timeout(self.timeout);
        let output = self.runner.run(&spec).await?;
        let banner = parse_version_output(&output.combined());

        let custom_executable = exe
            .strip_prefix(build_dir)
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();

        Ok(BuildInfoSidecar::single(BuildInfoEntry {
            branch: branch.to_string(),
            subversion: banner.subversion,
            build_hash: banner.build_hash,
            commit_time: banner.commit_time,
            custom_name: banner.custom_name,
            is_favorite: false,
            custom_executable,
        }))
    }

    /// `extract` then write `<build_dir>/.blinfo`
    pub async fn extract_and_write(
        &self,
        build_dir: &Utf8Path,
        branch: &str,
        exe_override: Option<&Utf8Path>,
    ) -> LauncherResult<BuildInfoSidecar> {
        let sidecar = self.extract(build_dir, branch, exe_override).await?;
        write_sidecar(build_dir, &sidecar)?;
        tracing::info!("Wrote {} in {}", BLINFO_FILE_NAME, build_dir);
        Ok(sidecar)
    }
}

pub fn write_sidecar(build_dir: &Utf8Path, sidecar: &BuildInfoSidecar) -> LauncherResult<()> {
    let path = build_dir.join(BLINFO_FILE_NAME);
    let json = serde_json::to_string(sidecar)?;
    fs::write(&path, json).map_err(|e| LauncherError::fs(&path, e))
}

pub fn read_sidecar(build_dir: &Utf8Path) -> LauncherResult<BuildInfoSidecar> {
    let path = build_dir.join(BLINFO_FILE_NAME);
    let content = fs::read_to_string(&path).map_err(|e| LauncherError::fs(&path, e))?;
    Ok(serde_json::from_str(&content)?)
}
