// Progress event channel
//
// Services never print. They send typed ProgressEvent values through a
// ProgressReporter; a single printer task owns stdout and renders each event
// either as a tagged marker line or as a one-line JSON object.

use crate::models::{Channel, VersionRecord};
use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc;

/// Events emitted by long-running commands for the host process
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressEvent {
    /// A command has started
    Start { text: String },

    /// Overall progress moved forward
    Progress {
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
        #[serde(rename = "progress")]
        percent: u8,
        text: String,
    },

    /// A stage was skipped because its result already exists
    Skip {
        stage: String,
        path: String,
        text: String,
    },

    /// Free-form diagnostic for the host log
    Log { message: String },

    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// An install finished; `path` is the executable
    Complete { path: String },

    /// `config.json` gained (or already had) an entry
    ConfigUpdated { path: String, title: String },

    /// Result list for one channel
    Versions {
        version_type: Channel,
        versions: Vec<VersionRecord>,
    },

    /// Terminal success of a clone/build
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        exe: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// A marker forwarded verbatim from a child process, e.g. `BL_REN:FRAME_DONE`
    Marker {
        tag: String,
        fields: Vec<(String, String)>,
    },
}

/// How the printer renders events on stdout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventFormat {
    /// `{"type": "progress", ...}` per line
    Json,
    /// `PREFIX:TAG key=value ...` per line
    Tagged { prefix: &'static str },
}

impl ProgressEvent {
    pub fn progress(percent: u8, text: impl Into<String>) -> Self {
        Self::Progress {
            stage: None,
            percent,
            text: text.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            detail: None,
        }
    }

    /// Marker tag used in the tagged rendering
    pub fn tag(&self) -> &str {
        match self {
            Self::Start { .. } => "START",
            Self::Progress { .. } => "PROGRESS",
            Self::Skip { .. } => "SKIP",
            Self::Log { .. } => "LOG",
            Self::Error { .. } => "ERROR",
            Self::Complete { .. } => "COMPLETE",
            Self::ConfigUpdated { .. } => "CONFIG_UPDATED",
            Self::Versions { .. } => "VERSIONS",
            Self::Done { .. } => "DONE",
            Self::Marker { tag, .. } => tag,
        }
    }

    fn fields(&self) -> Vec<(&str, String)> {
        match self {
            Self::Start { text } => vec![("text", text.clone())],
            Self::Progress {
                stage,
                percent,
                text,
            } => {
                let mut fields = Vec::with_capacity(3);
                if let Some(stage) = stage {
                    fields.push(("stage", stage.clone()));
                }
                fields.push(("progress", percent.to_string()));
                fields.push(("text", text.clone()));
                fields
            }
            Self::Skip { stage, path, text } => vec![
                ("stage", stage.clone()),
                ("path", path.clone()),
                ("text", text.clone()),
            ],
            Self::Log { message } => vec![("message", message.clone())],
            Self::Error { message, detail } => {
                let mut fields = vec![("message", message.clone())];
                if let Some(detail) = detail {
                    fields.push(("detail", detail.clone()));
                }
                fields
            }
            Self::Complete { path } => vec![("path", path.clone())],
            Self::ConfigUpdated { path, title } => {
                vec![("path", path.clone()), ("title", title.clone())]
            }
            Self::Versions {
                version_type,
                versions,
            } => vec![
                ("version_type", version_type.to_string()),
                ("count", versions.len().to_string()),
            ],
            Self::Done { exe, path } => {
                let mut fields = Vec::new();
                if let Some(exe) = exe {
                    fields.push(("exe", exe.clone()));
                }
                if let Some(path) = path {
                    fields.push(("path", path.clone()));
                }
                fields
            }
            Self::Marker { fields, .. } => fields
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect(),
        }
    }

    /// Render as `PREFIX:TAG key=value ...`.
    ///
    /// Line breaks inside values are replaced by spaces so one event is always one line.
    pub fn to_tagged_line(&self, prefix: &str) -> String {
        let mut line = format!("{}{}", prefix, self.tag());
        for (key, value) in self.fields() {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&sanitize_value(&value));
        }
        line
    }

    pub fn to_json_line(&self) -> String {
        match self {
            // Forwarded markers have no fixed schema, flatten their fields.
            Self::Marker { tag, fields } => {
                let mut map = serde_json::Map::new();
                map.insert("type".into(), "marker".into());
                map.insert("tag".into(), tag.clone().into());
                for (k, v) in fields {
                    map.insert(k.clone(), sanitize_value(v).into());
                }
                serde_json::Value::Object(map).to_string()
            }
            _ => serde_json::to_string(self).unwrap_or_else(|e| {
                format!(r#"{{"type":"error","message":"unserializable event: {e}"}}"#)
            }),
        }
    }

    pub fn render(&self, format: EventFormat) -> String {
        match format {
            EventFormat::Json => self.to_json_line(),
            EventFormat::Tagged { prefix } => self.to_tagged_line(prefix),
        }
    }
}

fn sanitize_value(value: &str) -> String {
    value.replace(['\n', '\r'], " ").trim().to_string()
}

/// Sending half of the event channel, cloned into every service that reports progress
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    /// Create a reporter and the receiver the printer drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        tracing::debug!("event {}", event.tag());
        if self.tx.send(event).is_err() {
            tracing::warn!("Progress receiver dropped, event discarded");
        }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Log {
            message: message.into(),
        });
    }

    pub fn progress(&self, percent: u8, text: impl Into<String>) {
        self.emit(ProgressEvent::progress(percent, text));
    }

    pub fn error(&self, message: impl Into<String>, detail: Option<String>) {
        self.emit(ProgressEvent::Error {
            message: message.into(),
            detail,
        });
    }
}

/// Drain `rx` to stdout until every reporter is dropped.
///
/// Returns the number of lines written.
pub async fn print_events(
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
    format: EventFormat,
) -> usize {
    let mut written = 0;
    while let Some(event) = rx.recv().await {
        let line = event.render(format);
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = writeln!(handle, "{}", line).and_then(|_| handle.flush()) {
            tracing::error!("Failed to write event to stdout: {}", e);
            continue;
        }
        written += 1;
    }
    written
}

/// Collect every event from `rx` into a vector once all reporters are dropped
pub async fn collect_events(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
