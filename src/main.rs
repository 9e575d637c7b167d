//! Blender Launcher - command line entry point.
//!
//! Each invocation runs one helper command for the desktop host and exits:
//!
//! 1. Parse arguments (clap)
//! 2. Load `Launcher Settings.yaml` from the data directory
//! 3. Initialize logging → `<data dir>/logs/blender-launcher.<date>` (+ stderr)
//! 4. Build a current-thread tokio runtime and run the command
//! 5. Exit with the command's code
//!
//! stdout carries only command output: one JSON object, JSON event lines
//! (`fetch-versions`, `download`) or tagged marker lines (`clone-build` with
//! `BL_CLONE:`, `render` with `BL_REN:`). Logs never go to stdout.

mod cli;

use anyhow::{Context, Result};
use blender_launcher::events::print_events;
use blender_launcher::services::build_info::BuildInfoExtractor;
use blender_launcher::services::clone_build::MARKER_PREFIX;
use blender_launcher::services::file_utils::executable_info;
use blender_launcher::services::headless::{
    self, AddonActionKind, HeadlessScripts, RENDER_PREFIX, RenderRequest,
};
use blender_launcher::services::{
    CloneBuildOrchestrator, CloneBuildRequest, DownloadRequest, Downloader, TargetOs, TokioRunner,
    Tool, ToolDetector, VersionFetcher, generate_title_from_filename, install_selection,
    scan_library,
};
use blender_launcher::{
    APP_NAME, ConfigManager, EventFormat, ExecutableEntry, LauncherSettings, ProgressReporter,
    SettingsManager, VERSION,
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use cli::{AddonAction, AddonsCommand, Cli, Command, ConfigCommand};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_manager = SettingsManager::new(&cli.data_dir)?;
    let (settings, settings_error) = settings_manager.load_settings_or_default();
    let debug_mode = cli.debug || settings.debug_mode;

    let guard = blender_launcher::logging::setup_logging_with_console(
        &cli.data_dir.join("logs"),
        APP_NAME,
        debug_mode,
        !cli.no_console,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    if let Some(e) = settings_error {
        tracing::warn!("Using default settings: {:#}", e);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let app = App {
        settings,
        settings_manager,
        config_override: cli.config.clone(),
    };
    let code = runtime.block_on(app.run(cli.command));

    tracing::info!("Exiting with code {}", code);
    drop(runtime);
    drop(guard);
    std::process::exit(code);
}

struct App {
    settings: LauncherSettings,
    settings_manager: SettingsManager,
    config_override: Option<Utf8PathBuf>,
}

impl App {
    async fn run(&self, command: Command) -> i32 {
        match command {
            Command::Config { action } => self.config_command(action),
            Command::CheckTools { install, tools } => self.check_tools(install, tools).await,
            Command::FetchVersions { selector, platform } => {
                let os = platform.unwrap_or_else(TargetOs::current);
                with_printer(EventFormat::Json, |reporter| async move {
                    match VersionFetcher::new(&self.settings, os) {
                        Ok(fetcher) => {
                            fetcher.fetch(selector, &reporter).await;
                            0
                        }
                        Err(e) => {
                            reporter.error(e.to_string(), None);
                            1
                        }
                    }
                })
                .await
            }
            Command::Download {
                version,
                url,
                target_dir,
                folder_name,
            } => {
                let request = DownloadRequest {
                    version,
                    url,
                    target_dir,
                    folder_name,
                };
                with_printer(EventFormat::Json, |reporter| async move {
                    match self.download(&request, &reporter).await {
                        Ok(()) => 0,
                        Err(e) => {
                            tracing::error!("Download failed: {:#}", e);
                            reporter.error(format!("{e:#}"), None);
                            1
                        }
                    }
                })
                .await
            }
            Command::CloneBuild {
                repo,
                branch,
                target,
                name,
                clone_only,
            } => {
                let request = CloneBuildRequest {
                    repo,
                    branch,
                    target,
                    name,
                    clone_only,
                };
                let orchestrator = CloneBuildOrchestrator::new(
                    Arc::new(TokioRunner),
                    self.settings.timeouts.clone(),
                );
                with_printer(
                    EventFormat::Tagged {
                        prefix: MARKER_PREFIX,
                    },
                    |reporter| async move {
                        match orchestrator.run(&request, &reporter).await {
                            Ok(_) => 0,
                            Err(failure) => failure.exit_code(),
                        }
                    },
                )
                .await
            }
            Command::ScanLibrary { root, write_blinfo } => {
                let root = root.unwrap_or_else(|| Utf8PathBuf::from(&self.settings.library_folder));
                let runner = TokioRunner;
                let extractor = BuildInfoExtractor::new(&runner, self.probe_timeout());
                let items = scan_library(&root, write_blinfo.then_some(&extractor)).await;
                print_json(&json!({ "success": true, "items": items }));
                0
            }
            Command::BuildInfo { dir, exe, branch } => {
                let runner = TokioRunner;
                let extractor = BuildInfoExtractor::new(&runner, self.probe_timeout());
                match extractor.extract_and_write(&dir, &branch, exe.as_deref()).await {
                    Ok(data) => json_result(json!({ "success": true, "data": data })),
                    Err(e) => json_failure(e),
                }
            }
            Command::Render {
                exe,
                blend,
                params,
                script,
            } => {
                let script = script.unwrap_or_else(|| self.scripts().render);
                let runner = headless::RenderRunner::new(exe, script)
                    .with_timeout(self.settings.timeouts.render.map(Duration::from_secs));
                let request = RenderRequest {
                    blend_file: blend,
                    params,
                };
                with_printer(
                    EventFormat::Tagged {
                        prefix: RENDER_PREFIX,
                    },
                    |reporter| async move {
                        match runner.run(&request, &reporter).await {
                            Ok(code) => code,
                            Err(e) => {
                                tracing::error!("Render could not start: {}", e);
                                reporter.emit(
                                    headless::RenderEvent::Error {
                                        message: e.to_string(),
                                    }
                                    .to_progress_event(),
                                );
                                1
                            }
                        }
                    },
                )
                .await
            }
            Command::BlendInfo { exe, blend, script } => {
                let script = script.unwrap_or_else(|| self.scripts().metadata);
                match headless::read_scene_metadata(&TokioRunner, &exe, &script, &blend).await {
                    Ok(meta) => json_result(json!({ "success": true, "data": meta })),
                    Err(e) => json_failure(e),
                }
            }
            Command::Addons { action } => self.addons_command(action).await,
            Command::Title { filename } => {
                let title = generate_title_from_filename(&filename);
                json_result(json!({ "success": true, "title": title }))
            }
        }
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeouts.tool_probe)
    }

    fn scripts(&self) -> HeadlessScripts {
        HeadlessScripts::in_dir(&self.settings_manager.scripts_dir(&self.settings))
    }

    fn config_manager(&self) -> Result<ConfigManager> {
        let path = self
            .settings_manager
            .resolve_config_path(&self.settings, self.config_override.as_deref());
        ConfigManager::new(&path).with_context(|| format!("Failed to open config at {path}"))
    }

    fn config_command(&self, action: ConfigCommand) -> i32 {
        match self.config_action(action) {
            Ok(value) => json_result(value),
            Err(e) => {
                tracing::error!("Config command failed: {:#}", e);
                print_json(&json!({ "success": false, "error": format!("{e:#}") }));
                1
            }
        }
    }

    fn config_action(&self, action: ConfigCommand) -> Result<Value> {
        let value = match action {
            ConfigCommand::Validate { path } => {
                let info = executable_info(&path)?;
                json!({ "success": true, "valid": true, "info": info })
            }
            ConfigCommand::GetExecutables => {
                let executables: Vec<Value> = self
                    .config_manager()?
                    .executables()
                    .into_iter()
                    .map(|entry| {
                        let path = Utf8Path::new(&entry.path);
                        let size = std::fs::metadata(path).map(|m| m.len()).ok();
                        let mut value = json!(entry);
                        value["exists"] = json!(path.exists());
                        value["size"] = json!(size);
                        value
                    })
                    .collect();
                json!({ "success": true, "executables": executables })
            }
            ConfigCommand::AddExecutable {
                path,
                name,
                title,
                icon,
            } => {
                let mut entry = ExecutableEntry::new(path, name, title);
                if let Some(icon) = icon.filter(|i| !i.is_empty()) {
                    entry = entry.with_icon(icon);
                }
                self.config_manager()?.add_executable(entry.clone())?;
                json!({ "success": true, "executable": entry })
            }
            ConfigCommand::Add { path } => {
                let info = executable_info(&path)?;
                let entry = ExecutableEntry::new(info.path.as_str(), info.name, info.title);
                self.config_manager()?.add_executable(entry.clone())?;
                json!({ "success": true, "executable": entry })
            }
            ConfigCommand::RemoveExecutable { path } => {
                let removed = self.config_manager()?.remove_executable(&path)?;
                json!({ "success": true, "removed": removed })
            }
            ConfigCommand::UpdateTitle { path, title } => {
                let update = self.config_manager()?.update_title(&path, &title)?;
                json!({
                    "success": true,
                    "old_title": update.old_title,
                    "new_title": update.new_title,
                    "executable": update.entry,
                })
            }
        };
        Ok(value)
    }

    async fn check_tools(&self, install: bool, tools: Vec<Tool>) -> i32 {
        let detector = ToolDetector::new(Arc::new(TokioRunner), self.probe_timeout());
        if install {
            let selection = install_selection(&tools);
            let report = detector.install(selection.as_deref()).await;
            json_result(json!(report))
        } else {
            let requested = if tools.is_empty() {
                Tool::ALL.to_vec()
            } else {
                tools
            };
            let report = detector.check(&requested).await;
            json_result(json!(report))
        }
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        reporter: &ProgressReporter,
    ) -> Result<()> {
        let downloader = Downloader::new(&self.settings, self.config_manager()?)?;
        downloader.install(request, reporter).await?;
        Ok(())
    }

    async fn addons_command(&self, action: AddonsCommand) -> i32 {
        let runner = TokioRunner;
        match action {
            AddonsCommand::Probe { exe, script } => {
                let script = script.unwrap_or_else(|| self.scripts().addons_probe);
                match headless::probe_addons(&runner, &exe, &script).await {
                    Ok(addons) => json_result(json!({ "success": true, "addons": addons })),
                    Err(e) => json_failure(e),
                }
            }
            AddonsCommand::Action {
                exe,
                action,
                module,
                script,
            } => {
                let script = script.unwrap_or_else(|| self.scripts().addon_action);
                let kind = match action {
                    AddonAction::Enable => AddonActionKind::Enable,
                    AddonAction::Disable => AddonActionKind::Disable,
                };
                match headless::run_addon_action(&runner, &exe, &script, kind, &module).await {
                    Ok(outcome) if outcome.success() => {
                        json_result(json!({ "success": true, "module": module }))
                    }
                    Ok(outcome) => {
                        print_json(&json!({ "success": false, "error": outcome, "module": module }));
                        1
                    }
                    Err(e) => json_failure(e),
                }
            }
        }
    }
}

/// Run `work` with a reporter whose events a printer task writes to stdout.
///
/// Returns once every event has been printed.
async fn with_printer<F, Fut>(format: EventFormat, work: F) -> i32
where
    F: FnOnce(ProgressReporter) -> Fut,
    Fut: Future<Output = i32>,
{
    let (reporter, rx) = ProgressReporter::channel();
    let printer = tokio::spawn(print_events(rx, format));
    let code = work(reporter).await;
    match printer.await {
        Ok(lines) => tracing::debug!("Printed {} event lines", lines),
        Err(e) => tracing::error!("Event printer failed: {}", e),
    }
    code
}

fn print_json(value: &Value) {
    println!("{value}");
}

fn json_result(value: Value) -> i32 {
    print_json(&value);
    0
}

fn json_failure(error: impl std::fmt::Display) -> i32 {
    tracing::error!("{}", error);
    print_json(&json!({ "success": false, "error": error.to_string() }));
    1
}
