//! Build tool detection and installation.
//!
//! Each tool is looked for in three places, in order, and the first hit wins:
//! - the `PATH` (honouring `PATHEXT` on Windows)
//! - installer metadata: `vswhere` plus a filesystem probe for `cl.exe` (compiler only)
//! - a bounded-depth scan of well-known install roots
//!
//! Every lookup failure falls through silently to the next step. A tool that is
//! nowhere to be found is reported as absent; detection itself never errors.
//!
//! The optional install flow runs `winget` once per missing tool and reports
//! which installs worked, plus a remediation hint for known failure patterns.

use crate::error::LauncherError;
use crate::services::process::{
    CommandOutput, CommandRunner, CommandSpec, executable_name, find_in_path_list, output_tail,
    path_extensions,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Component vswhere must report for an install to count as a C++ toolchain
pub const VC_TOOLS_COMPONENT: &str = "Microsoft.VisualStudio.Component.VC.Tools.x86.x64";

const VS_INSTALL_OVERRIDE: &str = "--quiet --wait --norestart --add Microsoft.VisualStudio.Workload.NativeDesktop --includeRecommended";

const INSTALL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Depth limit for the install-root scan
const SCAN_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Git,
    Cmake,
    Ninja,
    Compiler,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Git, Tool::Cmake, Tool::Ninja, Tool::Compiler];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Git => "git",
            Tool::Cmake => "cmake",
            Tool::Ninja => "ninja",
            Tool::Compiler => "compiler",
        }
    }

    /// Binary names that satisfy this tool, without extension
    pub fn binaries(&self) -> &'static [&'static str] {
        match self {
            Tool::Git => &["git"],
            Tool::Cmake => &["cmake"],
            Tool::Ninja => &["ninja"],
            Tool::Compiler if cfg!(windows) => &["cl"],
            Tool::Compiler => &["cc", "gcc", "clang"],
        }
    }

    /// winget package installing this tool
    pub fn winget_package(&self) -> WingetPackage {
        match self {
            Tool::Git => WingetPackage::new("Git.Git").with_args(&["--silent"]),
            Tool::Cmake => WingetPackage::new("Kitware.CMake").with_args(&["--silent"]),
            Tool::Ninja => WingetPackage::new("Ninja-build.Ninja"),
            Tool::Compiler => WingetPackage::new("Microsoft.VisualStudio.2022.Community")
                .with_override(VS_INSTALL_OVERRIDE),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(Tool::Git),
            "cmake" => Ok(Tool::Cmake),
            "ninja" => Ok(Tool::Ninja),
            "compiler" | "visual_studio" | "msvc" => Ok(Tool::Compiler),
            other => Err(format!("unknown tool: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WingetPackage {
    pub id: &'static str,
    pub args: &'static [&'static str],
    pub override_args: Option<&'static str>,
}

impl WingetPackage {
    fn new(id: &'static str) -> Self {
        Self {
            id,
            args: &[],
            override_args: None,
        }
    }

    fn with_args(mut self, args: &'static [&'static str]) -> Self {
        self.args = args;
        self
    }

    fn with_override(mut self, override_args: &'static str) -> Self {
        self.override_args = Some(override_args);
        self
    }

    /// Full `winget install` argument list
    pub fn install_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "install",
            "--id",
            self.id,
            "-e",
            "--accept-package-agreements",
            "--accept-source-agreements",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(self.args.iter().map(|a| a.to_string()));
        if let Some(override_args) = self.override_args {
            args.push("--override".to_string());
            args.push(override_args.to_string());
        }
        args
    }

    /// The same install as a copy-pasteable command line
    pub fn command_line(&self) -> String {
        let mut line = format!(
            "winget install --id {} -e --accept-package-agreements --accept-source-agreements",
            self.id
        );
        for arg in self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if let Some(override_args) = self.override_args {
            line.push_str(&format!(" --override \"{override_args}\""));
        }
        line
    }
}

/// Where a tool was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Path,
    InstallerMetadata,
    DirectoryScan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub path: Utf8PathBuf,
    pub source: DetectionSource,
}

/// Presence report for `check-tools`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolReport {
    pub success: bool,
    pub tools: IndexMap<String, bool>,
    pub missing: Vec<String>,
}

/// Outcome of an install run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallReport {
    pub success: bool,
    pub installed: Vec<String>,
    pub failed: Vec<String>,
    pub tools: IndexMap<String, bool>,
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub struct ToolDetector {
    runner: Arc<dyn CommandRunner>,
    path_var: String,
    path_extensions: Vec<String>,
    vswhere_candidates: Vec<Utf8PathBuf>,
    scan_roots: Vec<Utf8PathBuf>,
    probe_timeout: Duration,
}

impl ToolDetector {
    /// Detector for the current machine
    pub fn new(runner: Arc<dyn CommandRunner>, probe_timeout: Duration) -> Self {
        Self {
            runner,
            path_var: std::env::var("PATH").unwrap_or_default(),
            path_extensions: path_extensions(),
            vswhere_candidates: default_vswhere_candidates(),
            scan_roots: default_scan_roots(),
            probe_timeout,
        }
    }

    /// Replace the `PATH` value searched in step one
    pub fn with_path_var(mut self, path_var: impl Into<String>) -> Self {
        self.path_var = path_var.into();
        self
    }

    pub fn with_vswhere_candidates(mut self, candidates: Vec<Utf8PathBuf>) -> Self {
        self.vswhere_candidates = candidates;
        self
    }

    pub fn with_scan_roots(mut self, roots: Vec<Utf8PathBuf>) -> Self {
        self.scan_roots = roots;
        self
    }

    /// Locate `tool`, or `None` if every detection step came up empty
    pub async fn detect(&self, tool: Tool) -> Option<Detection> {
        for binary in tool.binaries() {
            if let Some(path) = find_in_path_list(binary, &self.path_var, &self.path_extensions) {
                tracing::debug!("{} found on PATH: {}", tool, path);
                return Some(Detection {
                    path,
                    source: DetectionSource::Path,
                });
            }
        }

        if tool == Tool::Compiler {
            if let Some(path) = self.detect_msvc().await {
                tracing::debug!("{} found via vswhere: {}", tool, path);
                return Some(Detection {
                    path,
                    source: DetectionSource::InstallerMetadata,
                });
            }
        }

        let names: Vec<String> = tool.binaries().iter().map(|b| executable_name(b)).collect();
        for root in &self.scan_roots {
            if let Some(path) = scan_for_file(root, &names, SCAN_DEPTH) {
                tracing::debug!("{} found by directory scan: {}", tool, path);
                return Some(Detection {
                    path,
                    source: DetectionSource::DirectoryScan,
                });
            }
        }

        tracing::info!("{} not found", tool);
        None
    }

    /// Latest Visual Studio install with the VC tools component, if vswhere knows one
    pub async fn vs_installation(&self) -> Option<Utf8PathBuf> {
        query_vswhere(self.runner.as_ref(), &self.vswhere_candidates, self.probe_timeout).await
    }

    async fn detect_msvc(&self) -> Option<Utf8PathBuf> {
        let install = self.vs_installation().await?;
        probe_msvc_compiler(&install)
    }

    pub async fn check(&self, tools: &[Tool]) -> ToolReport {
        let mut status = IndexMap::new();
        for tool in tools {
            status.insert(tool.to_string(), self.detect(*tool).await.is_some());
        }
        let missing = missing_from(&status);
        ToolReport {
            success: true,
            tools: status,
            missing,
        }
    }

    /// Install `requested` tools, or every missing one when `requested` is `None`.
    ///
    /// Returns the refreshed presence map alongside what worked and what failed.
    pub async fn install(&self, requested: Option<&[Tool]>) -> InstallReport {
        let before = self.check(&Tool::ALL).await;

        let targets: Vec<Tool> = match requested {
            Some(tools) => tools.to_vec(),
            None => Tool::ALL
                .into_iter()
                .filter(|t| before.missing.iter().any(|m| m == t.as_str()))
                .collect(),
        };

        if targets.is_empty() {
            return InstallReport {
                success: true,
                installed: Vec::new(),
                failed: Vec::new(),
                tools: before.tools,
                missing: before.missing,
                hint: None,
                note: Some("nothing-to-install".to_string()),
            };
        }

        let mut installed = Vec::new();
        let mut failed = Vec::new();
        let mut hint = None;

        for tool in targets {
            let package = tool.winget_package();
            let spec = CommandSpec::new("winget")
                .args(package.install_args())
                .timeout(INSTALL_TIMEOUT);

            tracing::info!("Installing {} with winget ({})", tool, package.id);
            match self.runner.run(&spec).await {
                Ok(output) if output.success() => installed.push(tool.to_string()),
                Ok(output) => {
                    tracing::warn!("Install of {} failed with code {:?}", tool, output.code);
                    hint = hint.or_else(|| remediation_hint(tool, &output));
                    failed.push(tool.to_string());
                }
                Err(LauncherError::ToolMissing(_)) => {
                    tracing::warn!("winget not available, cannot install {}", tool);
                    hint = hint.or_else(|| Some(WINGET_MISSING_HINT.to_string()));
                    failed.push(tool.to_string());
                }
                Err(e) => {
                    tracing::warn!("Install of {} failed: {}", tool, e);
                    failed.push(tool.to_string());
                }
            }
        }

        let after = self.check(&Tool::ALL).await;
        InstallReport {
            success: true,
            installed,
            failed,
            tools: after.tools,
            missing: after.missing,
            hint,
            note: None,
        }
    }
}

/// Tools to pass to [`ToolDetector::install`] for a `--tools` list.
///
/// An empty list means the flag was not given, so every missing tool is
/// installed. A given list is installed exactly as named, once per tool.
pub fn install_selection(tools: &[Tool]) -> Option<Vec<Tool>> {
    if tools.is_empty() {
        return None;
    }
    let mut selected = Vec::with_capacity(tools.len());
    for tool in tools {
        if !selected.contains(tool) {
            selected.push(*tool);
        }
    }
    Some(selected)
}

const WINGET_MISSING_HINT: &str =
    "winget not found. Install App Installer from the Microsoft Store, then retry.";

/// Map known installer failure output to an actionable hint
pub fn remediation_hint(tool: Tool, output: &CommandOutput) -> Option<String> {
    let text = output.combined().to_lowercase();

    if text.contains("administrator") || text.contains("elevat") || text.contains("0x80070005") {
        return Some(format!(
            "Run an elevated PowerShell and execute: {}",
            tool.winget_package().command_line()
        ));
    }
    if text.contains("no package found") || text.contains("no applicable installer") {
        return Some(format!(
            "winget could not find {}; run `winget source update` and retry",
            tool.winget_package().id
        ));
    }
    if tool == Tool::Compiler {
        // The VS installer rarely says anything useful; always point at the workload.
        return Some(format!(
            "Install Visual Studio with the \"Desktop development with C++\" workload: {}",
            tool.winget_package().command_line()
        ));
    }
    if text.is_empty() {
        None
    } else {
        Some(output_tail(&text, 3, 300))
    }
}

fn missing_from(status: &IndexMap<String, bool>) -> Vec<String> {
    status
        .iter()
        .filter(|(_, present)| !**present)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Ask the first vswhere found among `candidates` for the newest install with the VC tools
pub async fn query_vswhere(
    runner: &dyn CommandRunner,
    candidates: &[Utf8PathBuf],
    probe_timeout: Duration,
) -> Option<Utf8PathBuf> {
    let vswhere = candidates.iter().find(|p| p.is_file())?;
    let spec = CommandSpec::new(vswhere.as_str())
        .args([
            "-latest",
            "-products",
            "*",
            "-requires",
            VC_TOOLS_COMPONENT,
            "-property",
            "installationPath",
        ])
        .timeout(probe_timeout);

    match runner.run(&spec).await {
        Ok(output) if output.success() => {
            let path = output.stdout.lines().next()?.trim();
            (!path.is_empty()).then(|| Utf8PathBuf::from(path))
        }
        Ok(output) => {
            tracing::debug!("vswhere exited with {:?}", output.code);
            None
        }
        Err(e) => {
            tracing::debug!("vswhere failed: {}", e);
            None
        }
    }
}

/// Look for `cl.exe` under `VC/Tools/MSVC/<version>/bin/Host*/<arch>/`
pub fn probe_msvc_compiler(install: &Utf8Path) -> Option<Utf8PathBuf> {
    let msvc_root = install.join("VC").join("Tools").join("MSVC");
    let entries = fs::read_dir(&msvc_root).ok()?;

    let mut versions: Vec<Utf8PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| Utf8PathBuf::from_path_buf(e.path()).ok())
        .filter(|p| p.is_dir())
        .collect();
    // Newest toolset first.
    versions.sort();
    versions.reverse();

    for version in versions {
        for (host, arch) in [("Hostx64", "x64"), ("Hostx86", "x86")] {
            let candidate = version.join("bin").join(host).join(arch).join("cl.exe");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Breadth-first search of `root` for a file named one of `names` (case-insensitive),
/// descending at most `max_depth` directory levels
pub fn scan_for_file(root: &Utf8Path, names: &[String], max_depth: usize) -> Option<Utf8PathBuf> {
    let mut frontier = vec![root.to_path_buf()];

    for _ in 0..=max_depth {
        let mut next = Vec::new();
        for dir in frontier {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                    continue;
                };
                let Ok(file_type) = entry.file_type() else {
                    continue;
                };
                if file_type.is_file() {
                    let matches = path
                        .file_name()
                        .is_some_and(|n| names.iter().any(|want| want.eq_ignore_ascii_case(n)));
                    if matches {
                        return Some(path);
                    }
                } else if file_type.is_dir() {
                    next.push(path);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    None
}

pub fn default_vswhere_candidates() -> Vec<Utf8PathBuf> {
    if !cfg!(windows) {
        return Vec::new();
    }
    vec![
        Utf8PathBuf::from(r"C:\Program Files (x86)\Microsoft Visual Studio\Installer\vswhere.exe"),
        Utf8PathBuf::from(r"C:\Program Files\Microsoft Visual Studio\Installer\vswhere.exe"),
    ]
}

fn default_scan_roots() -> Vec<Utf8PathBuf> {
    let vars: &[&str] = if cfg!(windows) {
        &["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"]
    } else {
        &[]
    };
    let mut roots: Vec<Utf8PathBuf> = vars
        .iter()
        .filter_map(|v| std::env::var(v).ok())
        .map(Utf8PathBuf::from)
        .collect();
    if !cfg!(windows) {
        roots.push(Utf8PathBuf::from("/usr/local/bin"));
        roots.push(Utf8PathBuf::from("/opt"));
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::process::MockCommandRunner;
    use tempfile::TempDir;

    fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    fn isolated_detector(runner: MockCommandRunner) -> ToolDetector {
        ToolDetector::new(Arc::new(runner), Duration::from_secs(1))
            .with_path_var("")
            .with_vswhere_candidates(Vec::new())
            .with_scan_roots(Vec::new())
    }

    #[test]
    fn test_tool_from_str_aliases() {
        assert_eq!("visual_studio".parse::<Tool>(), Ok(Tool::Compiler));
        assert_eq!("Git".parse::<Tool>(), Ok(Tool::Git));
        assert!("python".parse::<Tool>().is_err());
    }

    #[test]
    fn test_install_selection_keeps_explicit_list() {
        assert_eq!(install_selection(&[]), None);
        assert_eq!(install_selection(&[Tool::Git]), Some(vec![Tool::Git]));
        assert_eq!(install_selection(&Tool::ALL), Some(Tool::ALL.to_vec()));
        assert_eq!(
            install_selection(&[Tool::Git, Tool::Git, Tool::Ninja, Tool::Git]),
            Some(vec![Tool::Git, Tool::Ninja])
        );
    }

    #[test]
    fn test_winget_install_args() {
        let args = Tool::Compiler.winget_package().install_args();
        assert_eq!(args[..3], ["install", "--id", "Microsoft.VisualStudio.2022.Community"]);
        assert_eq!(args[args.len() - 2], "--override");
        assert!(args.last().unwrap().contains("NativeDesktop"));
    }

    #[test]
    fn test_probe_msvc_compiler() {
        let temp_dir = TempDir::new().unwrap();
        let install = utf8_dir(&temp_dir);
        let bin = install.join("VC/Tools/MSVC/14.38.33130/bin/Hostx64/x64");
        fs::create_dir_all(&bin).unwrap();
        assert_eq!(probe_msvc_compiler(&install), None);

        fs::write(bin.join("cl.exe"), b"").unwrap();
        assert_eq!(probe_msvc_compiler(&install), Some(bin.join("cl.exe")));
    }

    #[test]
    fn test_scan_depth_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let root = utf8_dir(&temp_dir);
        let deep = root.join("a/b/c/d/e");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("ninja"), b"").unwrap();
        fs::write(root.join("a/CMake"), b"").unwrap();

        let names = vec!["ninja".to_string()];
        assert_eq!(scan_for_file(&root, &names, 2), None);
        assert_eq!(scan_for_file(&root, &names, 5), Some(deep.join("ninja")));

        let names = vec!["cmake".to_string()];
        assert_eq!(scan_for_file(&root, &names, 1), Some(root.join("a/CMake")));
    }

    #[tokio::test]
    async fn test_absent_tool_is_reported_not_raised() {
        let runner = MockCommandRunner::new();
        let detector = isolated_detector(runner);

        let report = detector.check(&[Tool::Git, Tool::Ninja]).await;
        assert!(report.success);
        assert_eq!(report.tools.get("git"), Some(&false));
        assert_eq!(report.missing, ["git", "ninja"]);
    }

    #[tokio::test]
    async fn test_path_lookup_wins() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);
        let git = dir.join(executable_name("git"));
        fs::write(&git, b"").unwrap();

        let detector = isolated_detector(MockCommandRunner::new()).with_path_var(dir.as_str());
        let found = detector.detect(Tool::Git).await.unwrap();
        assert_eq!(found.source, DetectionSource::Path);
        assert_eq!(found.path, git);
    }

    #[tokio::test]
    async fn test_missing_winget_produces_hint() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|spec| spec.program == "winget")
            .returning(|_| Err(LauncherError::ToolMissing("winget".to_string())));

        let detector = isolated_detector(runner);
        let report = detector.install(Some(&[Tool::Cmake])).await;

        assert!(report.installed.is_empty());
        assert_eq!(report.failed, ["cmake"]);
        assert_eq!(report.hint.as_deref(), Some(WINGET_MISSING_HINT));
    }

    #[test]
    fn test_remediation_hint_for_elevation() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "Installer failed: requires administrator privileges".to_string(),
            stderr: String::new(),
        };
        let hint = remediation_hint(Tool::Git, &output).unwrap();
        assert!(hint.starts_with("Run an elevated PowerShell"));
        assert!(hint.contains("Git.Git"));
    }
}
