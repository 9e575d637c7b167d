use crate::error::{LauncherError, LauncherResult};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

/// A fully described external command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<Utf8PathBuf>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, after: Duration) -> Self {
        self.timeout = after;
        self
    }

    /// Program and arguments joined for logging
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Seam for running external programs.
///
/// Orchestration code only talks to this trait so tests can script git, vswhere
/// and the build wrapper without touching the machine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output.
    ///
    /// A nonzero exit is NOT an error here; callers inspect `CommandOutput::code`.
    /// Spawn failures and timeouts are errors.
    async fn run(&self, spec: &CommandSpec) -> LauncherResult<CommandOutput>;
}

/// Runs commands with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, spec: &CommandSpec) -> LauncherResult<CommandOutput> {
        tracing::info!("Executing: {}", spec.display());

        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let child = cmd.spawn().map_err(|e| spawn_error(&spec.program, e))?;

        let output = timeout(spec.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::warn!("{} timed out after {:?}", spec.program, spec.timeout);
                LauncherError::Timeout {
                    program: spec.program.clone(),
                    after: spec.timeout,
                }
            })?
            .map_err(|e| LauncherError::ExternalProcess {
                program: spec.program.clone(),
                code: None,
                detail: format!("failed to wait for process: {e}"),
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::info!(
            "{} completed in {:.2}s with exit code {:?}",
            spec.program,
            start.elapsed().as_secs_f32(),
            result.code
        );

        Ok(result)
    }
}

pub(crate) fn spawn_error(program: &str, e: std::io::Error) -> LauncherError {
    if e.kind() == std::io::ErrorKind::NotFound {
        LauncherError::ToolMissing(program.to_string())
    } else {
        LauncherError::ExternalProcess {
            program: program.to_string(),
            code: None,
            detail: format!("failed to start: {e}"),
        }
    }
}

/// Last `max_lines` non-empty lines of `text`, joined by ` | ` and capped at `max_chars`
pub fn output_tail(text: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    let joined = lines[start..].join(" | ");
    truncate_chars(&joined, max_chars)
}

/// Keep at most `max_chars` characters, never splitting a code point
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Platform file name for an executable, e.g. `blender.exe` on Windows
pub fn executable_name(base: &str) -> String {
    if cfg!(windows) {
        format!("{base}.exe")
    } else {
        base.to_string()
    }
}

/// Look `name` up on the `PATH` environment variable
pub fn find_in_path(name: &str) -> Option<Utf8PathBuf> {
    let path_var = std::env::var("PATH").ok()?;
    find_in_path_list(name, &path_var, &path_extensions())
}

/// Suffixes tried after a bare name on `PATH`; `PATHEXT` on Windows, none elsewhere
pub fn path_extensions() -> Vec<String> {
    if !cfg!(windows) {
        return Vec::new();
    }
    std::env::var("PATHEXT")
        .unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string())
        .split(';')
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Search each directory of a `PATH`-style list for `name`, trying `extensions` as suffixes
pub fn find_in_path_list(name: &str, path_var: &str, extensions: &[String]) -> Option<Utf8PathBuf> {
    let separator = if cfg!(windows) { ';' } else { ':' };
    for dir in path_var.split(separator).filter(|d| !d.trim().is_empty()) {
        let dir = Utf8Path::new(dir.trim().trim_matches('"'));
        let plain = dir.join(name);
        if plain.is_file() {
            return Some(plain);
        }
        for ext in extensions {
            let candidate = dir.join(format!("{name}{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_tail_keeps_last_lines() {
        let text = "one\n\ntwo\nthree\n  four  \n";
        assert_eq!(output_tail(text, 2, 400), "three | four");
        assert_eq!(output_tail(text, 10, 7), "one | t");
        assert_eq!(output_tail("", 5, 100), "");
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("échec", 2), "éc");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    #[test]
    fn test_find_in_path_list() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("ninja"), b"").unwrap();

        let found = find_in_path_list("ninja", dir.as_str(), &[]);
        assert_eq!(found, Some(dir.join("ninja")));
        assert_eq!(find_in_path_list("cmake", dir.as_str(), &[]), None);
    }

    #[test]
    fn test_find_in_path_list_with_extension() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("git.exe"), b"").unwrap();

        let found = find_in_path_list("git", dir.as_str(), &[".exe".to_string()]);
        assert_eq!(found, Some(dir.join("git.exe")));
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("git")
            .args(["clone", "--depth", "1"])
            .timeout(Duration::from_secs(5));
        assert_eq!(spec.display(), "git clone --depth 1");
        assert_eq!(spec.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            code: Some(1),
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        assert!(!output.success());
        assert_eq!(output.combined(), "out\nerr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_missing_program() {
        let spec = CommandSpec::new("definitely-not-a-real-program-4f1c");
        let result = TokioRunner.run(&spec).await;
        assert!(matches!(result, Err(LauncherError::ToolMissing(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_captures_output() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hello; exit 3"]);
        let output = TokioRunner.run(&spec).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_timeout() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(100));
        let result = TokioRunner.run(&spec).await;
        assert!(matches!(result, Err(LauncherError::Timeout { .. })));
    }
}
