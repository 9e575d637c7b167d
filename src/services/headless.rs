//! Host side of the scripts that run inside a headless Blender.
//!
//! The scripts themselves ship with the launcher (their folder is a setting).
//! This module builds the command lines, reads what the scripts print and turns
//! it into typed values:
//!
//! - `render`: streams `BL_REN:` markers, re-emitted through the event channel.
//!   [`RenderTracker`] guarantees one `INIT` and exactly one terminal marker.
//! - `blend-info`: a single `BL_META:<json>` line, parsed into [`SceneMetadata`].
//! - `addons probe`: a JSON list between `@@ADDONS_JSON_START@@` and `@@ADDONS_JSON_END@@`.
//! - `addons action`: `@@ACTION_OK@@` / `@@ACTION_FAIL@@`. The OK marker wins
//!   over the exit code and any traceback, since the script only prints it after
//!   checking the addon state.

use crate::error::{LauncherError, LauncherResult};
use crate::events::{ProgressEvent, ProgressReporter};
use crate::services::process::{CommandRunner, CommandSpec, output_tail, spawn_error};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

pub const RENDER_PREFIX: &str = "BL_REN:";
pub const META_PREFIX: &str = "BL_META:";
pub const ADDONS_START: &str = "@@ADDONS_JSON_START@@";
pub const ADDONS_END: &str = "@@ADDONS_JSON_END@@";
pub const ACTION_OK: &str = "@@ACTION_OK@@";
pub const ACTION_FAIL: &str = "@@ACTION_FAIL@@";

pub const RENDER_SCRIPT: &str = "render_headless.py";
pub const METADATA_SCRIPT: &str = "blend_info.py";
pub const ADDONS_PROBE_SCRIPT: &str = "blender_addons_probe.py";
pub const ADDON_ACTION_SCRIPT: &str = "blender_addon_action.py";

/// Default limits for the short-lived script runs
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(60);
pub const ADDONS_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
pub const ADDON_ACTION_TIMEOUT: Duration = Duration::from_secs(20);

/// Paths of the bundled in-Blender scripts
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessScripts {
    pub render: Utf8PathBuf,
    pub metadata: Utf8PathBuf,
    pub addons_probe: Utf8PathBuf,
    pub addon_action: Utf8PathBuf,
}

impl HeadlessScripts {
    pub fn in_dir(dir: &Utf8Path) -> Self {
        Self {
            render: dir.join(RENDER_SCRIPT),
            metadata: dir.join(METADATA_SCRIPT),
            addons_probe: dir.join(ADDONS_PROBE_SCRIPT),
            addon_action: dir.join(ADDON_ACTION_SCRIPT),
        }
    }
}

/// `<exe> -b --factory-startup --python <script> -- <trailing...>`
pub fn blender_command(exe: &Utf8Path, script: &Utf8Path, trailing: &[String]) -> CommandSpec {
    CommandSpec::new(exe.as_str())
        .args(["-b", "--factory-startup", "--python", script.as_str(), "--"])
        .args(trailing.iter().cloned())
}

// ── Render markers ─────────────────────────────────────

/// One `BL_REN:` line
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Init { mode: String, total: Option<u32> },
    Start,
    FrameStart { frame: Option<i64> },
    FrameDone { done: Option<u32>, total: Option<u32> },
    Stats { text: String },
    Path { path: String },
    Done,
    Cancel,
    Error { message: String },
}

impl RenderEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            RenderEvent::Init { .. } => "INIT",
            RenderEvent::Start => "START",
            RenderEvent::FrameStart { .. } => "FRAME_START",
            RenderEvent::FrameDone { .. } => "FRAME_DONE",
            RenderEvent::Stats { .. } => "STATS",
            RenderEvent::Path { .. } => "PATH",
            RenderEvent::Done => "DONE",
            RenderEvent::Cancel => "CANCEL",
            RenderEvent::Error { .. } => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderEvent::Done | RenderEvent::Cancel | RenderEvent::Error { .. }
        )
    }

    /// Exit code of the `render` command when this is the terminal marker
    pub fn exit_code(&self) -> i32 {
        match self {
            RenderEvent::Cancel => 2,
            RenderEvent::Error { .. } => 1,
            _ => 0,
        }
    }

    /// Parse a line of child output; `None` for anything that is not a known marker.
    pub fn parse(line: &str) -> Option<Self> {
        let body = line.trim().strip_prefix(RENDER_PREFIX)?;
        let (tag, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let fields = parse_fields(rest);
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        let number = |key: &str| get(key).and_then(|v| v.parse().ok());

        let event = match tag {
            "INIT" => RenderEvent::Init {
                mode: get("mode").unwrap_or_default(),
                total: number("total"),
            },
            "START" => RenderEvent::Start,
            "FRAME_START" => RenderEvent::FrameStart {
                frame: get("frame").and_then(|v| v.parse().ok()),
            },
            "FRAME_DONE" => RenderEvent::FrameDone {
                done: number("done"),
                total: number("total"),
            },
            "STATS" => RenderEvent::Stats {
                text: get("text").unwrap_or_default(),
            },
            "PATH" => RenderEvent::Path {
                path: get("path").unwrap_or_default(),
            },
            "DONE" => RenderEvent::Done,
            "CANCEL" => RenderEvent::Cancel,
            "ERROR" => RenderEvent::Error {
                message: get("message").unwrap_or_default(),
            },
            _ => return None,
        };
        Some(event)
    }

    pub fn to_progress_event(&self) -> ProgressEvent {
        let mut fields = Vec::new();
        let mut push = |key: &str, value: String| fields.push((key.to_string(), value));
        match self {
            RenderEvent::Init { mode, total } => {
                push("mode", mode.clone());
                if let Some(total) = total {
                    push("total", total.to_string());
                }
            }
            RenderEvent::FrameStart { frame: Some(frame) } => push("frame", frame.to_string()),
            RenderEvent::FrameDone { done, total } => {
                if let Some(done) = done {
                    push("done", done.to_string());
                }
                if let Some(total) = total {
                    push("total", total.to_string());
                }
            }
            RenderEvent::Stats { text } => push("text", text.clone()),
            RenderEvent::Path { path } => push("path", path.clone()),
            RenderEvent::Error { message } => push("message", message.clone()),
            _ => {}
        }
        ProgressEvent::Marker {
            tag: self.tag().to_string(),
            fields,
        }
    }
}

/// Split `key=value` pairs; a value runs until the next token that looks like `key=`.
fn parse_fields(rest: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for token in rest.split_whitespace() {
        match token.split_once('=') {
            Some((key, value))
                if !key.is_empty() && key.chars().all(|c| c.is_ascii_lowercase() || c == '_') =>
            {
                fields.push((key.to_string(), value.to_string()));
            }
            _ => match fields.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(token);
                }
                None => tracing::debug!("Ignoring stray marker token: {}", token),
            },
        }
    }
    fields
}

/// Enforces the marker contract on a render's output.
///
/// `INIT` is forwarded once, nothing follows a terminal marker, and a child that
/// exits without a terminal gets a synthesized `ERROR`.
#[derive(Debug, Default)]
pub struct RenderTracker {
    seen_init: bool,
    terminal: Option<RenderEvent>,
    frames_done: u32,
}

impl RenderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The event to forward, or `None` when it must be dropped
    pub fn accept(&mut self, event: RenderEvent) -> Option<RenderEvent> {
        if self.terminal.is_some() {
            tracing::debug!("Dropping {} after terminal marker", event.tag());
            return None;
        }
        match &event {
            RenderEvent::Init { .. } if self.seen_init => return None,
            RenderEvent::Init { .. } => self.seen_init = true,
            RenderEvent::FrameDone { .. } => self.frames_done += 1,
            _ => {}
        }
        if event.is_terminal() {
            self.terminal = Some(event.clone());
        }
        Some(event)
    }

    /// Close the stream once the child is gone
    pub fn finish(&mut self, reason: impl FnOnce() -> String) -> Option<RenderEvent> {
        if self.terminal.is_some() {
            return None;
        }
        let event = RenderEvent::Error { message: reason() };
        self.terminal = Some(event.clone());
        Some(event)
    }

    pub fn terminal(&self) -> Option<&RenderEvent> {
        self.terminal.as_ref()
    }

    pub fn frames_done(&self) -> u32 {
        self.frames_done
    }

    pub fn exit_code(&self) -> i32 {
        self.terminal.as_ref().map_or(1, RenderEvent::exit_code)
    }
}

/// Feed each marker line of `reader` through `tracker` and emit what survives
pub async fn forward_render_markers<R>(
    reader: R,
    tracker: &mut RenderTracker,
    reporter: &ProgressReporter,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        match RenderEvent::parse(&line) {
            Some(event) => {
                if let Some(event) = tracker.accept(event) {
                    reporter.emit(event.to_progress_event());
                }
            }
            None => tracing::debug!("blender: {}", line),
        }
    }
    Ok(())
}

/// What a render request needs besides the executable
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub blend_file: Utf8PathBuf,
    /// Forwarded to the script as `key=value`
    pub params: Vec<(String, String)>,
}

impl RenderRequest {
    fn trailing_args(&self) -> Vec<String> {
        std::iter::once(self.blend_file.to_string())
            .chain(self.params.iter().map(|(k, v)| format!("{k}={v}")))
            .collect()
    }
}

/// Parse `key=value` command line parameters
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

pub struct RenderRunner {
    exe: Utf8PathBuf,
    script: Utf8PathBuf,
    timeout: Option<Duration>,
}

impl RenderRunner {
    pub fn new(exe: impl Into<Utf8PathBuf>, script: impl Into<Utf8PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            script: script.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Render and stream markers; returns the command exit code (0 done, 1 error, 2 cancel).
    ///
    /// Output is read while the child runs. The host cancels by killing this process.
    pub async fn run(
        &self,
        request: &RenderRequest,
        reporter: &ProgressReporter,
    ) -> LauncherResult<i32> {
        let spec = blender_command(&self.exe, &self.script, &request.trailing_args());
        tracing::info!("Executing: {}", spec.display());

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&spec.program, e))?;

        let stdout = child.stdout.take().ok_or_else(|| LauncherError::ExternalProcess {
            program: spec.program.clone(),
            code: None,
            detail: "stdout not captured".to_string(),
        })?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut bytes = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut bytes).await {
                    tracing::debug!("Reading render stderr failed: {}", e);
                }
                String::from_utf8_lossy(&bytes).into_owned()
            })
        });

        let mut tracker = RenderTracker::new();
        let streamed = forward_render_markers(stdout, &mut tracker, reporter);
        let stream_result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, streamed).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Render timed out after {:?}", limit);
                    if let Err(e) = child.kill().await {
                        tracing::debug!("Killing timed out render failed: {}", e);
                    }
                    if let Some(event) = tracker.finish(|| format!("timeout after {}s", limit.as_secs())) {
                        reporter.emit(event.to_progress_event());
                    }
                    return Ok(tracker.exit_code());
                }
            },
            None => streamed.await,
        };
        if let Err(e) = stream_result {
            tracing::warn!("Reading render output failed: {}", e);
        }

        let status = child.wait().await.map_err(|e| LauncherError::ExternalProcess {
            program: spec.program.clone(),
            code: None,
            detail: format!("failed to wait for process: {e}"),
        })?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if let Some(event) = tracker.finish(|| {
            let tail = output_tail(&stderr, 3, 300);
            match status.code() {
                Some(code) if tail.is_empty() => format!("exited with code {code} without a result"),
                Some(code) => format!("exited with code {code}: {tail}"),
                None => "killed before finishing".to_string(),
            }
        }) {
            reporter.emit(event.to_progress_event());
        }

        tracing::info!(
            "Render finished: {} frames, exit {}",
            tracker.frames_done(),
            tracker.exit_code()
        );
        Ok(tracker.exit_code())
    }
}

// ── Scene metadata ─────────────────────────────────────

/// Render settings of a `.blend` file as reported by the metadata script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub raw_width: Option<u32>,
    pub raw_height: Option<u32>,
    pub resolution_percentage: Option<u32>,
    pub frame_start: Option<i64>,
    pub frame_end: Option<i64>,
    pub frame_current: Option<i64>,
    pub fps: Option<f64>,
    pub fps_num: Option<u32>,
    pub fps_base: Option<f64>,
    pub output: Option<String>,
    pub output_abs: Option<String>,
    pub engine: Option<String>,
    pub engine_raw: Option<String>,
    pub file_format: Option<String>,
    pub color_mode: Option<String>,
    pub blend_file: Option<String>,
}

/// Find the `BL_META:` line and parse its payload
pub fn parse_scene_metadata(stdout: &str) -> LauncherResult<SceneMetadata> {
    let payload = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix(META_PREFIX))
        .ok_or_else(|| LauncherError::Parse(format!("no {META_PREFIX} line in output")))?;
    Ok(serde_json::from_str(payload.trim())?)
}

pub async fn read_scene_metadata(
    runner: &dyn CommandRunner,
    exe: &Utf8Path,
    script: &Utf8Path,
    blend_file: &Utf8Path,
) -> LauncherResult<SceneMetadata> {
    let spec = blender_command(exe, script, &[blend_file.to_string(), "--quit".to_string()])
        .timeout(METADATA_TIMEOUT);
    let output = runner.run(&spec).await?;
    parse_scene_metadata(&output.stdout).map_err(|e| match e {
        LauncherError::Parse(_) => LauncherError::ExternalProcess {
            program: exe.to_string(),
            code: output.code,
            detail: output_tail(&output.combined(), 5, 400),
        },
        other => other,
    })
}

// ── Addons ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub module: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bl_info: Value,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub file: Option<String>,
}

/// Addon list printed between the probe markers
pub fn parse_addon_probe(stdout: &str) -> LauncherResult<Vec<AddonInfo>> {
    let start = stdout
        .find(ADDONS_START)
        .ok_or_else(|| LauncherError::Parse("addon probe printed no start marker".to_string()))?;
    let body = &stdout[start + ADDONS_START.len()..];
    let end = body
        .find(ADDONS_END)
        .ok_or_else(|| LauncherError::Parse("addon probe printed no end marker".to_string()))?;
    Ok(serde_json::from_str(body[..end].trim())?)
}

pub async fn probe_addons(
    runner: &dyn CommandRunner,
    exe: &Utf8Path,
    script: &Utf8Path,
) -> LauncherResult<Vec<AddonInfo>> {
    let spec = blender_command(exe, script, &[]).timeout(ADDONS_PROBE_TIMEOUT);
    let output = runner.run(&spec).await?;
    parse_addon_probe(&output.stdout)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddonActionKind {
    Enable,
    Disable,
}

impl AddonActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddonActionKind::Enable => "enable",
            AddonActionKind::Disable => "disable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddonActionOutcome {
    Confirmed,
    ValidationFailed,
    NoConfirmation,
}

impl AddonActionOutcome {
    pub fn success(&self) -> bool {
        matches!(self, AddonActionOutcome::Confirmed)
    }
}

/// Read the verdict of the action script. The exit code plays no part.
pub fn interpret_addon_action(stdout: &str) -> AddonActionOutcome {
    if stdout.contains(ACTION_OK) {
        AddonActionOutcome::Confirmed
    } else if stdout.contains(ACTION_FAIL) {
        AddonActionOutcome::ValidationFailed
    } else {
        AddonActionOutcome::NoConfirmation
    }
}

pub async fn run_addon_action(
    runner: &dyn CommandRunner,
    exe: &Utf8Path,
    script: &Utf8Path,
    action: AddonActionKind,
    module: &str,
) -> LauncherResult<AddonActionOutcome> {
    let trailing = [
        "action".to_string(),
        action.as_str().to_string(),
        "module".to_string(),
        module.to_string(),
    ];
    let spec = blender_command(exe, script, &trailing).timeout(ADDON_ACTION_TIMEOUT);
    let output = runner.run(&spec).await?;
    let outcome = interpret_addon_action(&output.stdout);
    if outcome.success() && !output.success() {
        tracing::info!(
            "{} {} confirmed despite exit code {:?}",
            action.as_str(),
            module,
            output.code
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::collect_events;

    #[test]
    fn test_parse_render_markers() {
        assert_eq!(
            RenderEvent::parse("BL_REN:INIT mode=ANIMATION total=120"),
            Some(RenderEvent::Init {
                mode: "ANIMATION".to_string(),
                total: Some(120)
            })
        );
        assert_eq!(
            RenderEvent::parse("BL_REN:FRAME_DONE done=3 total=10"),
            Some(RenderEvent::FrameDone {
                done: Some(3),
                total: Some(10)
            })
        );
        assert_eq!(
            RenderEvent::parse("BL_REN:ERROR message=render_failed: out of memory (CUDA)"),
            Some(RenderEvent::Error {
                message: "render_failed: out of memory (CUDA)".to_string()
            })
        );
        assert_eq!(RenderEvent::parse("BL_REN:DONE\r"), Some(RenderEvent::Done));
        assert_eq!(RenderEvent::parse("Fra:1 Mem:12M"), None);
        assert_eq!(RenderEvent::parse("BL_REN:SOMETHING"), None);
    }

    #[test]
    fn test_tracker_single_init_and_terminal() {
        let mut tracker = RenderTracker::new();
        let init = RenderEvent::Init {
            mode: "STILL".to_string(),
            total: Some(1),
        };
        assert!(tracker.accept(init.clone()).is_some());
        assert!(tracker.accept(init).is_none());
        assert!(tracker.accept(RenderEvent::Done).is_some());
        assert!(tracker.accept(RenderEvent::Error { message: "late".to_string() }).is_none());
        assert!(tracker.finish(|| "unused".to_string()).is_none());
        assert_eq!(tracker.exit_code(), 0);
    }

    #[test]
    fn test_tracker_synthesizes_error() {
        let mut tracker = RenderTracker::new();
        tracker.accept(RenderEvent::Start);
        let synthesized = tracker.finish(|| "exited with code 139".to_string());
        assert_eq!(
            synthesized,
            Some(RenderEvent::Error {
                message: "exited with code 139".to_string()
            })
        );
        assert_eq!(tracker.exit_code(), 1);
    }

    #[test]
    fn test_cancel_exit_code() {
        let mut tracker = RenderTracker::new();
        tracker.accept(RenderEvent::Cancel);
        assert_eq!(tracker.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_forward_render_markers() {
        let output = b"Blender 4.3.0\n\
            BL_REN:INIT mode=ANIMATION total=2\n\
            BL_REN:START\n\
            Fra:1 Mem:30M\n\
            BL_REN:FRAME_DONE done=1 total=2\n\
            BL_REN:FRAME_DONE done=2 total=2\n\
            BL_REN:DONE\n\
            BL_REN:DONE\n" as &[u8];

        let (reporter, rx) = ProgressReporter::channel();
        let mut tracker = RenderTracker::new();
        forward_render_markers(output, &mut tracker, &reporter)
            .await
            .unwrap();
        drop(reporter);

        let tags: Vec<String> = collect_events(rx)
            .await
            .iter()
            .map(|e| e.tag().to_string())
            .collect();
        assert_eq!(tags, ["INIT", "START", "FRAME_DONE", "FRAME_DONE", "DONE"]);
        assert_eq!(tracker.frames_done(), 2);
    }

    #[test]
    fn test_render_marker_rendering() {
        let event = RenderEvent::FrameDone {
            done: Some(1),
            total: Some(4),
        };
        assert_eq!(
            event.to_progress_event().to_tagged_line(RENDER_PREFIX),
            "BL_REN:FRAME_DONE done=1 total=4"
        );
    }

    #[test]
    fn test_parse_scene_metadata() {
        let stdout = "Read blend: scene.blend\n\
            BL_META:{\"width\": 1920, \"height\": 1080, \"frame_start\": 1, \"frame_end\": 250, \
            \"fps\": 24.0, \"engine\": \"CYCLES\", \"file_format\": \"PNG\", \"output\": \"//render/\"}\n\
            Blender quit\n";
        let meta = parse_scene_metadata(stdout).unwrap();
        assert_eq!(meta.width, Some(1920));
        assert_eq!(meta.frame_end, Some(250));
        assert_eq!(meta.engine.as_deref(), Some("CYCLES"));
        assert_eq!(meta.color_mode, None);
    }

    #[test]
    fn test_parse_scene_metadata_missing_line() {
        let result = parse_scene_metadata("BL_ERROR: bpy not available\n");
        assert!(matches!(result, Err(LauncherError::Parse(_))));
    }

    #[test]
    fn test_parse_addon_probe() {
        let stdout = "noise\n@@ADDONS_JSON_START@@\n\
            [{\"module\": \"node_wrangler\", \"name\": \"Node Wrangler\", \"bl_info\": {\"version\": [3, 54]}, \"enabled\": true, \"file\": null}]\n\
            @@ADDONS_JSON_END@@\n";
        let addons = parse_addon_probe(stdout).unwrap();
        assert_eq!(addons.len(), 1);
        assert_eq!(addons[0].module, "node_wrangler");
        assert!(addons[0].enabled);
        assert_eq!(addons[0].bl_info["version"][1], 54);
    }

    #[test]
    fn test_parse_addon_probe_without_markers() {
        assert!(parse_addon_probe("Traceback (most recent call last):").is_err());
    }

    #[test]
    fn test_interpret_addon_action() {
        let noisy = "Traceback (most recent call last):\n  ...\nRuntimeError: unregister\n@@ACTION_OK@@\n";
        assert_eq!(interpret_addon_action(noisy), AddonActionOutcome::Confirmed);
        assert_eq!(
            interpret_addon_action("@@ACTION_FAIL@@\n"),
            AddonActionOutcome::ValidationFailed
        );
        assert_eq!(interpret_addon_action(""), AddonActionOutcome::NoConfirmation);
    }

    #[test]
    fn test_blender_command_layout() {
        let spec = blender_command(
            Utf8Path::new("/opt/blender/blender"),
            Utf8Path::new("/scripts/render_headless.py"),
            &["scene.blend".to_string(), "engine=CYCLES".to_string()],
        );
        assert_eq!(
            spec.args,
            [
                "-b",
                "--factory-startup",
                "--python",
                "/scripts/render_headless.py",
                "--",
                "scene.blend",
                "engine=CYCLES"
            ]
        );
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("frame_end=10").unwrap(),
            ("frame_end".to_string(), "10".to_string())
        );
        assert!(parse_param("=oops").is_err());
        assert!(parse_param("novalue").is_err());
    }
}
