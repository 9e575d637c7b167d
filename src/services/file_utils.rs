use crate::error::{LauncherError, LauncherResult};
use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Lowercase word boundary inside CamelCase, e.g. `tG` in `FactoryGame`
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("Invalid camel case regex"));

/// Names that do not title-case well on their own
const SPECIAL_TITLES: &[(&str, &str)] = &[
    ("blender", "Blender"),
    ("git-bash", "Git Bash"),
    ("code", "Visual Studio Code"),
    ("chrome", "Google Chrome"),
    ("firefox", "Mozilla Firefox"),
    ("steam", "Steam"),
    ("discord", "Discord"),
    ("notepad++", "Notepad++"),
    ("gimp", "GIMP"),
    ("vlc", "VLC Media Player"),
    ("photoshop", "Adobe Photoshop"),
    ("illustrator", "Adobe Illustrator"),
    ("aftereffects", "Adobe After Effects"),
    ("unity", "Unity"),
    ("unreal", "Unreal Engine"),
    ("maya", "Autodesk Maya"),
    ("max", "3ds Max"),
    ("cinema4d", "Cinema 4D"),
    ("zbrush", "ZBrush"),
];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const MAX_FILENAME_CHARS: usize = 255;

/// Turn an executable file name into a display title.
///
/// `blender.exe` -> `Blender`, `my_custom_app.exe` -> `My Custom App`,
/// `FactoryGameSteam.exe` -> `Factory Game Steam`. Short all-caps words such as
/// `API` are kept as they are.
pub fn generate_title_from_filename(filename: &str) -> String {
    let stem = Utf8Path::new(filename).file_stem().unwrap_or(filename);

    let lower = stem.to_lowercase();
    if let Some((_, title)) = SPECIAL_TITLES.iter().find(|(name, _)| *name == lower) {
        return (*title).to_string();
    }

    let spaced = stem.replace(['-', '_', '.'], " ");
    let spaced = CAMEL_BOUNDARY.replace_all(&spaced, "$1 $2");

    spaced
        .split_whitespace()
        .map(|word| {
            if is_acronym(word) {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// At most 4 characters, at least one letter, every letter uppercase
fn is_acronym(word: &str) -> bool {
    word.chars().count() <= 4
        && word.chars().any(char::is_alphabetic)
        && !word.chars().any(char::is_lowercase)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Whether `path` points at something the OS can launch.
///
/// On Windows the extension must be `.exe`, `.bat`, `.cmd` or `.com`; elsewhere
/// an execute permission bit must be set.
pub fn validate_executable_path(path: &Utf8Path) -> bool {
    if path.as_str().is_empty() || !path.is_file() {
        return false;
    }

    if cfg!(windows) {
        let ext = path.extension().map(str::to_ascii_lowercase);
        matches!(ext.as_deref(), Some("exe" | "bat" | "cmd" | "com"))
    } else {
        has_execute_bit(path)
    }
}

#[cfg(unix)]
fn has_execute_bit(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn has_execute_bit(_path: &Utf8Path) -> bool {
    true
}

/// Make `filename` safe to create on any platform.
///
/// Path separators and other reserved characters become `_`, the result is
/// capped at 255 characters and trimmed, and reserved device names get a `_` prefix.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .take(MAX_FILENAME_CHARS)
        .collect();
    let clean = replaced.trim();

    let upper = clean.to_uppercase();
    let base = upper.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.contains(&upper.as_str()) || RESERVED_NAMES.contains(&base) {
        format!("_{clean}")
    } else {
        clean.to_string()
    }
}

/// Facts about an executable shown by the host when registering it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutableInfo {
    pub path: Utf8PathBuf,
    pub name: String,
    pub title: String,
    pub directory: Utf8PathBuf,
    pub size: u64,
    pub extension: String,
}

pub fn executable_info(path: &Utf8Path) -> LauncherResult<ExecutableInfo> {
    if !validate_executable_path(path) {
        return Err(LauncherError::ExecutableNotFound(path.to_path_buf()));
    }

    let metadata = std::fs::metadata(path).map_err(|e| LauncherError::fs(path, e))?;
    let absolute = path
        .canonicalize_utf8()
        .unwrap_or_else(|_| path.to_path_buf());
    let name = path.file_name().unwrap_or_default().to_string();

    Ok(ExecutableInfo {
        title: generate_title_from_filename(&name),
        directory: absolute.parent().map(Utf8Path::to_path_buf).unwrap_or_default(),
        extension: path
            .extension()
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default(),
        size: metadata.len(),
        path: absolute,
        name,
    })
}
