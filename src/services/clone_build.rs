//! Clone Blender from source and build it.
//!
//! The pipeline is linear and never retries:
//!
//! ```text
//! START -> CLONING -> TOOLCHAIN_CHECK -> LIB_FETCH -> COMPILE -> LOCATE_EXE -> DONE
//! ```
//!
//! Each stage reports `BL_CLONE:` progress events and a failure at any stage is
//! terminal: one `ERROR` event is emitted and the stage decides the exit code.
//! A destination that already holds a checkout of the same remote is reused and
//! announced with a single `SKIP` event instead of any clone progress.

use crate::error::LauncherError;
use crate::events::{ProgressEvent, ProgressReporter};
use crate::models::Timeouts;
use crate::services::process::{
    CommandOutput, CommandRunner, CommandSpec, executable_name, output_tail,
};
use crate::services::tool_detection::{default_vswhere_candidates, query_vswhere};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of every tagged line this pipeline prints
pub const MARKER_PREFIX: &str = "BL_CLONE:";

/// Depth limit when searching build output for the executable
const LOCATE_DEPTH: usize = 5;

/// Substrings that mark a line of build output as worth showing
const FAILURE_KEYWORDS: &[&str] = &[
    "error",
    "fail",
    "not found",
    "fatal",
    "cannot",
    "unable",
    "detection failed",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Start,
    Cloning,
    ToolchainCheck,
    LibFetch,
    Compile,
    LocateExe,
    Done,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStage::Start => "start",
            BuildStage::Cloning => "cloning",
            BuildStage::ToolchainCheck => "toolchain_check",
            BuildStage::LibFetch => "lib_fetch",
            BuildStage::Compile => "compile",
            BuildStage::LocateExe => "locate_exe",
            BuildStage::Done => "done",
        }
    }

    /// Process exit code when the pipeline stops in this stage
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildStage::Done => 0,
            BuildStage::Start => 1,
            BuildStage::Cloning => 2,
            BuildStage::ToolchainCheck => 3,
            BuildStage::LibFetch => 4,
            BuildStage::Compile => 5,
            BuildStage::LocateExe => 6,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct BuildFailure {
    pub stage: BuildStage,
    pub message: String,
    pub detail: Option<String>,
}

impl BuildFailure {
    fn new(stage: BuildStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.stage.exit_code()
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloneBuildRequest {
    pub repo: String,
    pub branch: String,
    pub target: Utf8PathBuf,
    /// Folder name override; derived from repo and branch when absent
    pub name: Option<String>,
    /// Stop after the checkout is in place
    pub clone_only: bool,
}

impl CloneBuildRequest {
    /// `<repo-name>-<branch>` with `/` in the branch replaced by `_`
    pub fn folder_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let trimmed = self.repo.trim().trim_end_matches('/');
        let base = trimmed.rsplit(['/', ':']).next().unwrap_or_default();
        let base = base.strip_suffix(".git").unwrap_or(base);
        let base = if base.is_empty() { "blender" } else { base };
        format!("{}-{}", base, self.branch.replace('/', "_"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub source_dir: Utf8PathBuf,
    /// Built executable; `None` in clone-only mode
    pub exe: Option<Utf8PathBuf>,
    /// The checkout already existed and was reused
    pub reused_checkout: bool,
}

/// Compiler environment the build scripts run in
#[derive(Debug, Clone, PartialEq)]
pub enum Toolchain {
    /// Visual Studio: an environment script to `call` before `make.bat`
    Msvc {
        install_path: Utf8PathBuf,
        env_script: Utf8PathBuf,
        env_args: String,
        /// Extra `make.bat` arguments, e.g. `2022b` for Build Tools installs
        make_args: Vec<String>,
    },
    /// A POSIX shell with `cc` and `make` on the PATH
    Posix,
}

impl Toolchain {
    fn describe(&self) -> String {
        match self {
            Toolchain::Msvc { install_path, .. } => format!("Visual Studio at {install_path}"),
            Toolchain::Posix => "system cc/make".to_string(),
        }
    }
}

/// Which build wrapper the checkout is driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildHost {
    /// `make.bat` inside a Visual Studio environment
    Windows,
    /// `make` from a POSIX shell
    Posix,
}

impl BuildHost {
    pub fn current() -> Self {
        if cfg!(windows) {
            BuildHost::Windows
        } else {
            BuildHost::Posix
        }
    }
}

/// The build wrapper step run inside a generated script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakeStep {
    /// `make update`: fetch precompiled libraries and submodules
    Update,
    /// `make`: full build
    Build,
}

impl MakeStep {
    fn script_stem(&self) -> &'static str {
        match self {
            MakeStep::Update => "temp_make_update",
            MakeStep::Build => "temp_make",
        }
    }
}

pub struct CloneBuildOrchestrator {
    runner: Arc<dyn CommandRunner>,
    timeouts: Timeouts,
    vswhere_candidates: Vec<Utf8PathBuf>,
    vs_fallback_roots: Vec<Utf8PathBuf>,
    host: BuildHost,
}

impl CloneBuildOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>, timeouts: Timeouts) -> Self {
        Self {
            runner,
            timeouts,
            vswhere_candidates: default_vswhere_candidates(),
            vs_fallback_roots: default_vs_roots(),
            host: BuildHost::current(),
        }
    }

    pub fn with_host(mut self, host: BuildHost) -> Self {
        self.host = host;
        self
    }

    pub fn with_vswhere_candidates(mut self, candidates: Vec<Utf8PathBuf>) -> Self {
        self.vswhere_candidates = candidates;
        self
    }

    pub fn with_vs_fallback_roots(mut self, roots: Vec<Utf8PathBuf>) -> Self {
        self.vs_fallback_roots = roots;
        self
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.tool_probe)
    }

    /// Run the pipeline. On failure the `ERROR` event has already been emitted.
    pub async fn run(
        &self,
        request: &CloneBuildRequest,
        reporter: &ProgressReporter,
    ) -> Result<BuildOutcome, BuildFailure> {
        match self.run_stages(request, reporter).await {
            Ok(outcome) => Ok(outcome),
            Err(failure) => {
                tracing::error!("{}", failure);
                reporter.error(failure.message.clone(), failure.detail.clone());
                Err(failure)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &CloneBuildRequest,
        reporter: &ProgressReporter,
    ) -> Result<BuildOutcome, BuildFailure> {
        reporter.emit(ProgressEvent::Start {
            text: "Starting clone and build".to_string(),
        });
        stage_progress(reporter, BuildStage::Start, 1, "Checking git...");
        self.check_git().await?;

        fs::create_dir_all(&request.target).map_err(|e| {
            BuildFailure::new(BuildStage::Start, "Cannot create the target folder")
                .with_detail(format!("{}: {e}", request.target))
        })?;

        let (source_dir, reused) = self.clone_stage(request, reporter).await?;

        if request.clone_only {
            reporter.emit(ProgressEvent::Done {
                exe: None,
                path: Some(source_dir.to_string()),
            });
            return Ok(BuildOutcome {
                source_dir,
                exe: None,
                reused_checkout: reused,
            });
        }

        stage_progress(reporter, BuildStage::ToolchainCheck, 18, "Checking the build toolchain...");
        let toolchain = self.toolchain_stage(&source_dir).await?;
        if let Toolchain::Msvc { make_args, .. } = &toolchain {
            if !make_args.is_empty() {
                reporter.log("Using Visual Studio Build Tools");
            }
        }
        stage_progress(
            reporter,
            BuildStage::ToolchainCheck,
            20,
            format!("Toolchain: {}", toolchain.describe()),
        );

        stage_progress(
            reporter,
            BuildStage::LibFetch,
            25,
            "Fetching libraries (make update), this can take 10-30 min...",
        );
        self.make_step(&source_dir, &toolchain, MakeStep::Update).await?;
        stage_progress(reporter, BuildStage::LibFetch, 60, "Libraries fetched");

        stage_progress(reporter, BuildStage::Compile, 65, "Compiling, this can take 30-60 min...");
        self.make_step(&source_dir, &toolchain, MakeStep::Build).await?;
        stage_progress(reporter, BuildStage::Compile, 95, "Compilation finished");

        stage_progress(reporter, BuildStage::LocateExe, 97, "Looking for the executable...");
        let exe = locate_built_exe(&source_dir).ok_or_else(|| {
            BuildFailure::new(
                BuildStage::LocateExe,
                format!("{} not found after compilation", executable_name("blender")),
            )
        })?;

        stage_progress(reporter, BuildStage::Done, 100, "Build succeeded!");
        reporter.emit(ProgressEvent::Done {
            exe: Some(exe.to_string()),
            path: Some(source_dir.to_string()),
        });

        Ok(BuildOutcome {
            source_dir,
            exe: Some(exe),
            reused_checkout: reused,
        })
    }

    async fn check_git(&self) -> Result<(), BuildFailure> {
        let spec = CommandSpec::new("git")
            .arg("--version")
            .timeout(self.probe_timeout());
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(BuildFailure::new(BuildStage::Start, "Git not found")
                .with_detail(output_tail(&output.combined(), 3, 300))),
            Err(e) => Err(BuildFailure::new(BuildStage::Start, "Git not found").with_detail(e.to_string())),
        }
    }

    /// Place the checkout, reusing a matching one. Returns the directory and whether it was reused.
    async fn clone_stage(
        &self,
        request: &CloneBuildRequest,
        reporter: &ProgressReporter,
    ) -> Result<(Utf8PathBuf, bool), BuildFailure> {
        let mut clone_dir = request.target.join(request.folder_name());

        if clone_dir.exists() {
            if self.origin_matches(&clone_dir, &request.repo).await {
                reporter.emit(ProgressEvent::Skip {
                    stage: BuildStage::Cloning.to_string(),
                    path: clone_dir.to_string(),
                    text: "Repository already cloned".to_string(),
                });
                self.disable_symlinks(&clone_dir).await;
                return Ok((clone_dir, true));
            }
            let suffixed = format!("{}-{}", clone_dir, chrono::Utc::now().timestamp());
            tracing::info!("{} exists with another remote, using {}", clone_dir, suffixed);
            clone_dir = Utf8PathBuf::from(suffixed);
        }

        stage_progress(
            reporter,
            BuildStage::Cloning,
            5,
            format!("Cloning into {clone_dir}..."),
        );
        let spec = CommandSpec::new("git")
            .args([
                "-c",
                "core.symlinks=false",
                "clone",
                "--branch",
                request.branch.as_str(),
                "--depth",
                "1",
                request.repo.as_str(),
                clone_dir.as_str(),
            ])
            .timeout(Duration::from_secs(self.timeouts.git_clone));

        match self.runner.run(&spec).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                return Err(BuildFailure::new(BuildStage::Cloning, "git clone failed")
                    .with_detail(output_tail(&output.combined(), 5, 400)));
            }
            Err(LauncherError::Timeout { after, .. }) => {
                return Err(BuildFailure::new(
                    BuildStage::Cloning,
                    format!("Clone timed out after {} min", after.as_secs() / 60),
                ));
            }
            Err(e) => {
                return Err(BuildFailure::new(BuildStage::Cloning, "git clone failed").with_detail(e.to_string()));
            }
        }

        self.disable_symlinks(&clone_dir).await;
        stage_progress(reporter, BuildStage::Cloning, 15, "Clone finished");
        Ok((clone_dir, false))
    }

    async fn origin_matches(&self, dir: &Utf8Path, repo: &str) -> bool {
        let spec = CommandSpec::new("git")
            .args(["-C", dir.as_str(), "remote", "get-url", "origin"])
            .timeout(self.probe_timeout());
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => remotes_match(output.stdout.trim(), repo),
            Ok(_) => false,
            Err(e) => {
                tracing::debug!("Could not read origin of {}: {}", dir, e);
                false
            }
        }
    }

    /// Symlinks in the library checkout break the bundled Python on Windows.
    async fn disable_symlinks(&self, dir: &Utf8Path) {
        let spec = CommandSpec::new("git")
            .args(["-C", dir.as_str(), "config", "core.symlinks", "false"])
            .timeout(self.probe_timeout());
        if let Err(e) = self.runner.run(&spec).await {
            tracing::warn!("Could not set core.symlinks in {}: {}", dir, e);
        }
    }

    async fn toolchain_stage(&self, source_dir: &Utf8Path) -> Result<Toolchain, BuildFailure> {
        match self.host {
            BuildHost::Windows => {
                if !source_dir.join("make.bat").is_file() {
                    return Err(BuildFailure::new(
                        BuildStage::ToolchainCheck,
                        "make.bat not found in the cloned repository",
                    ));
                }
                self.require_tool("cmake").await?;
                self.detect_msvc().await.ok_or_else(|| {
                    BuildFailure::new(
                        BuildStage::ToolchainCheck,
                        "Visual Studio with C++ tools not found. Install Build Tools or Community with \"Desktop development with C++\"",
                    )
                })
            }
            BuildHost::Posix => {
                if !source_dir.join("GNUmakefile").is_file()
                    && !source_dir.join("Makefile").is_file()
                {
                    return Err(BuildFailure::new(
                        BuildStage::ToolchainCheck,
                        "No makefile found in the cloned repository",
                    ));
                }
                for tool in ["cc", "make", "cmake"] {
                    self.require_tool(tool).await?;
                }
                Ok(Toolchain::Posix)
            }
        }
    }

    /// Fail the toolchain stage unless `tool --version` succeeds
    async fn require_tool(&self, tool: &str) -> Result<(), BuildFailure> {
        let spec = CommandSpec::new(tool)
            .arg("--version")
            .timeout(self.probe_timeout());
        match self.runner.run(&spec).await {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => {
                tracing::debug!("{} --version exited with {:?}", tool, output.code);
                Err(BuildFailure::new(BuildStage::ToolchainCheck, format!("{tool} not found")))
            }
            Err(e) => {
                tracing::debug!("{} probe failed: {}", tool, e);
                Err(BuildFailure::new(BuildStage::ToolchainCheck, format!("{tool} not found")))
            }
        }
    }

    async fn detect_msvc(&self) -> Option<Toolchain> {
        let install = match query_vswhere(
            self.runner.as_ref(),
            &self.vswhere_candidates,
            self.probe_timeout(),
        )
        .await
        {
            Some(path) => Some(path),
            None => self
                .vs_fallback_roots
                .iter()
                .find(|root| root.join("VC/Auxiliary/Build/vcvarsall.bat").is_file())
                .cloned(),
        }?;
        msvc_toolchain(&install)
    }

    async fn make_step(
        &self,
        source_dir: &Utf8Path,
        toolchain: &Toolchain,
        step: MakeStep,
    ) -> Result<(), BuildFailure> {
        let (stage, label, timeout) = match step {
            MakeStep::Update => (
                BuildStage::LibFetch,
                "make update",
                Duration::from_secs(self.timeouts.library_update),
            ),
            MakeStep::Build => (
                BuildStage::Compile,
                "make",
                Duration::from_secs(self.timeouts.compile),
            ),
        };

        let (file_name, contents) = build_script(toolchain, step);
        let script = source_dir.join(file_name);
        fs::write(&script, contents).map_err(|e| {
            BuildFailure::new(stage, format!("Cannot write {script}")).with_detail(e.to_string())
        })?;

        let spec = match toolchain {
            Toolchain::Msvc { .. } => CommandSpec::new("cmd.exe").args(["/c", script.as_str()]),
            Toolchain::Posix => CommandSpec::new("sh").arg(script.as_str()),
        }
        .cwd(source_dir)
        .env("BUILD_BLENDER_NO_PROMPT", "1")
        .timeout(timeout);

        let result = self.runner.run(&spec).await;

        if let Err(e) = fs::remove_file(&script) {
            tracing::debug!("Could not remove {}: {}", script, e);
        }

        match result {
            Ok(output) if output.success() => {
                tracing::debug!("{} output tail: {}", label, output_tail(&output.stdout, 10, 2000));
                Ok(())
            }
            Ok(output) => Err(BuildFailure::new(stage, format!("{label} failed"))
                .with_detail(failure_detail(&output))),
            Err(LauncherError::Timeout { after, .. }) => Err(BuildFailure::new(
                stage,
                format!("{label} timed out after {} min", after.as_secs() / 60),
            )),
            Err(e) => Err(BuildFailure::new(stage, format!("{label} failed")).with_detail(e.to_string())),
        }
    }
}

fn stage_progress(reporter: &ProgressReporter, stage: BuildStage, percent: u8, text: impl Into<String>) {
    reporter.emit(ProgressEvent::Progress {
        stage: Some(stage.to_string()),
        percent,
        text: text.into(),
    });
}

/// Lowercased `host/path` of a git remote.
///
/// Scheme, user info, a trailing slash and a `.git` suffix are dropped, and
/// scp-style `git@host:path` becomes `host/path`.
pub fn normalize_remote(url: &str) -> String {
    let mut s = url.trim().to_lowercase();

    if let Some(idx) = s.find("://") {
        s = s[idx + 3..].to_string();
    } else if let Some((host, path)) = s.split_once(':') {
        // scp-like syntax; a single letter before ':' is a Windows drive
        if host.len() > 1 && !path.starts_with('\\') {
            s = format!("{host}/{path}");
        }
    }

    if let Some(at) = s.find('@') {
        if s[..at].find('/').is_none() {
            s = s[at + 1..].to_string();
        }
    }

    let s = s.trim_end_matches('/');
    let s = s.strip_suffix(".git").unwrap_or(s);
    s.trim_end_matches('/').to_string()
}

/// Whether an existing checkout's origin refers to the requested repository.
///
/// Equal after normalisation, or one is a path suffix of the other
/// (`blender/blender` matches `projects.blender.org/blender/blender`).
pub fn remotes_match(existing: &str, requested: &str) -> bool {
    let a = normalize_remote(existing);
    let b = normalize_remote(requested);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.ends_with(&format!("/{b}")) || b.ends_with(&format!("/{a}"))
}

/// Toolchain description for a Visual Studio install directory
pub fn msvc_toolchain(install: &Utf8Path) -> Option<Toolchain> {
    let vsdevcmd = install.join("Common7").join("Tools").join("VsDevCmd.bat");
    let vcvarsall = install
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("vcvarsall.bat");

    let (env_script, env_args) = if vsdevcmd.is_file() {
        (vsdevcmd, "-arch=x64 -host_arch=x64".to_string())
    } else if vcvarsall.is_file() {
        (vcvarsall, "x64".to_string())
    } else {
        return None;
    };

    let mut make_args = Vec::new();
    if install.as_str().contains("BuildTools") {
        if install.as_str().contains("2022") {
            make_args.push("2022b".to_string());
        } else if install.as_str().contains("2019") {
            make_args.push("2019b".to_string());
        }
    }

    Some(Toolchain::Msvc {
        install_path: install.to_path_buf(),
        env_script,
        env_args,
        make_args,
    })
}

/// File name and contents of the transient script for `step`
pub fn build_script(toolchain: &Toolchain, step: MakeStep) -> (String, String) {
    match toolchain {
        Toolchain::Msvc {
            env_script,
            env_args,
            make_args,
            ..
        } => {
            let mut make_cmd = match step {
                MakeStep::Update => "make.bat update".to_string(),
                MakeStep::Build => "make.bat".to_string(),
            };
            for arg in make_args {
                make_cmd.push(' ');
                make_cmd.push_str(arg);
            }
            let contents = format!(
                "@echo off\r\n\
                 call \"{env_script}\" {env_args}\r\n\
                 if errorlevel 1 (\r\n\
                 \x20 echo ERROR: Visual Studio environment setup failed\r\n\
                 \x20 exit /b 1\r\n\
                 )\r\n\
                 set BUILD_BLENDER_NO_PROMPT=1\r\n\
                 cd /d \"%~dp0\"\r\n\
                 echo ===== Running {make_cmd} =====\r\n\
                 {make_cmd}\r\n\
                 exit /b %errorlevel%\r\n"
            );
            (format!("{}.bat", step.script_stem()), contents)
        }
        Toolchain::Posix => {
            let make_cmd = match step {
                MakeStep::Update => "make update",
                MakeStep::Build => "make",
            };
            let contents = format!(
                "#!/bin/sh\n\
                 set -e\n\
                 cd \"$(dirname \"$0\")\"\n\
                 export BUILD_BLENDER_NO_PROMPT=1\n\
                 echo \"===== Running {make_cmd} =====\"\n\
                 {make_cmd}\n"
            );
            (format!("{}.sh", step.script_stem()), contents)
        }
    }
}

/// Human-readable reason for a failed build step.
///
/// Lines with failure keywords win; otherwise the tail of stderr, then of stdout.
pub fn failure_detail(output: &CommandOutput) -> String {
    let combined = output.combined();
    let error_lines: Vec<&str> = combined
        .lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            FAILURE_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect();

    let mut detail = if !error_lines.is_empty() {
        output_tail(&error_lines.join("\n"), 5, 400)
    } else if !output.stderr.trim().is_empty() {
        output_tail(&output.stderr, 3, 300)
    } else {
        output_tail(&output.stdout, 5, 400)
    };

    let lower = combined.to_lowercase();
    if lower.contains("nativedesktop") || lower.contains("vcvarsall") || lower.contains("workload") {
        detail.push_str(
            " | Hint: install the \"Desktop development with C++\" workload in Visual Studio Installer",
        );
    }
    detail
}

/// Search the checkout and sibling `build_*` folders for the built executable.
///
/// Paths containing `bin` or `release` are preferred over other matches.
pub fn locate_built_exe(source_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let wanted = executable_name("blender");
    let mut roots = vec![source_dir.to_path_buf()];
    if let Some(parent) = source_dir.parent() {
        if let Ok(entries) = fs::read_dir(parent) {
            let mut siblings: Vec<Utf8PathBuf> = entries
                .filter_map(|e| e.ok())
                .filter_map(|e| Utf8PathBuf::from_path_buf(e.path()).ok())
                .filter(|p| p.is_dir() && p.file_name().is_some_and(|n| n.starts_with("build_")))
                .collect();
            siblings.sort();
            roots.extend(siblings);
        }
    }

    let mut fallback = None;
    for root in &roots {
        let mut found = Vec::new();
        collect_named(root, &wanted, 0, &mut found);
        found.sort();
        for candidate in found {
            let relative = candidate
                .strip_prefix(root)
                .map(|p| p.as_str().to_lowercase())
                .unwrap_or_default();
            if relative.contains("bin") || relative.contains("release") {
                return Some(candidate);
            }
            fallback.get_or_insert(candidate);
        }
    }
    fallback
}

fn collect_named(dir: &Utf8Path, wanted: &str, depth: usize, found: &mut Vec<Utf8PathBuf>) {
    if depth > LOCATE_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if path.file_name() != Some(".git") {
                collect_named(&path, wanted, depth + 1, found);
            }
        } else if path
            .file_name()
            .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
        {
            found.push(path);
        }
    }
}

fn default_vs_roots() -> Vec<Utf8PathBuf> {
    if !cfg!(windows) {
        return Vec::new();
    }
    let mut roots = Vec::new();
    for (base, year) in [
        (r"C:\Program Files\Microsoft Visual Studio", "2022"),
        (r"C:\Program Files (x86)\Microsoft Visual Studio", "2019"),
    ] {
        for edition in ["Community", "Professional", "Enterprise", "BuildTools"] {
            roots.push(Utf8PathBuf::from(base).join(year).join(edition));
        }
    }
    roots
}
