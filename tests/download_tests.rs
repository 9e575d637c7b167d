//! Integration tests for installing official archives
//!
//! These tests verify:
//! - Zip extraction keeps layout and skips entries escaping the target
//! - The executable is found case-insensitively in nested folders
//! - A full install streams, extracts, deletes the archive and registers the build
//! - An archive without an executable fails with `ExecutableNotFound` and keeps its files
//! - HTTP error statuses and dropped connections fail without registering anything
//!   and leave no partial archive behind

use blender_launcher::events::collect_events;
use blender_launcher::models::LauncherSettings;
use blender_launcher::services::download::{ARCHIVE_NAME, extract_zip, find_blender_exe};
use blender_launcher::services::process::executable_name;
use blender_launcher::services::{DownloadRequest, Downloader};
use blender_launcher::{ConfigManager, LauncherError, ProgressEvent, ProgressReporter};
use camino::Utf8PathBuf;
use std::fs;
use std::io::{Cursor, Write};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zip::write::SimpleFileOptions;

fn create_test_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

/// Build an in-memory zip from `(name, contents)` pairs; names ending in `/` are folders
fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().unix_permissions(0o755);
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

fn blender_archive() -> Vec<u8> {
    let exe = format!("blender-4.3.0-x64/{}", executable_name("blender"));
    build_zip(&[
        ("blender-4.3.0-x64/", ""),
        (exe.as_str(), "binary"),
        ("blender-4.3.0-x64/4.3/scripts/startup/init.py", "print('hi')"),
    ])
}

/// Answer one request with `head` then `body`, closing the socket afterwards
async fn serve_raw(head: String, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{addr}/blender-4.3.0-x64.zip")
}

/// Serve `body` once over plain HTTP and return the URL
async fn serve_once(body: Vec<u8>) -> String {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    serve_raw(head, body).await
}

fn request_for(url: String, root: &Utf8PathBuf) -> DownloadRequest {
    DownloadRequest {
        version: "4.3.0".to_string(),
        url,
        target_dir: root.join("stable"),
        folder_name: "blender-4.3.0".to_string(),
    }
}

#[test]
fn test_extract_zip_layout() {
    let (_temp_dir, root) = create_test_dir();
    let archive = root.join("archive.zip");
    fs::write(&archive, blender_archive()).unwrap();

    let dest = root.join("out");
    let written = extract_zip(&archive, &dest).unwrap();

    assert_eq!(written, 2);
    assert!(dest.join("blender-4.3.0-x64/4.3/scripts/startup/init.py").is_file());
}

#[test]
fn test_extract_zip_skips_escaping_entries() {
    let (_temp_dir, root) = create_test_dir();
    let archive = root.join("evil.zip");
    fs::write(
        &archive,
        build_zip(&[("../outside.txt", "nope"), ("inside.txt", "ok")]),
    )
    .unwrap();

    let dest = root.join("out");
    let written = extract_zip(&archive, &dest).unwrap();

    assert_eq!(written, 1);
    assert!(dest.join("inside.txt").is_file());
    assert!(!root.join("outside.txt").exists());
}

#[test]
fn test_find_single_executable() {
    let (_temp_dir, root) = create_test_dir();
    let nested = root.join("a/b");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join(executable_name("blender")), b"").unwrap();

    assert_eq!(
        find_blender_exe(&root),
        Some(nested.join(executable_name("blender")))
    );
}

#[tokio::test]
async fn test_full_install_registers_executable() {
    let (_temp_dir, root) = create_test_dir();
    let config = ConfigManager::new(root.join("config.json")).unwrap();
    let downloader = Downloader::new(&LauncherSettings::default(), config.clone()).unwrap();

    let request = DownloadRequest {
        version: "4.3.0".to_string(),
        url: serve_once(blender_archive()).await,
        target_dir: root.join("stable"),
        folder_name: "blender-4.3.0".to_string(),
    };

    let (reporter, rx) = ProgressReporter::channel();
    let exe = downloader.install(&request, &reporter).await.unwrap();
    drop(reporter);

    let install_dir = root.join("stable/blender-4.3.0");
    assert_eq!(
        exe,
        install_dir.join("blender-4.3.0-x64").join(executable_name("blender"))
    );
    assert!(!install_dir.join(ARCHIVE_NAME).exists());

    let entries = config.executables();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Blender 4.3.0");
    assert_eq!(entries[0].path, exe.as_str());

    let events = collect_events(rx).await;
    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents.first(), Some(&5));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::ConfigUpdated { .. })));
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
}

#[tokio::test]
async fn test_install_without_executable_keeps_files() {
    let (_temp_dir, root) = create_test_dir();
    let config = ConfigManager::new(root.join("config.json")).unwrap();
    let downloader = Downloader::new(&LauncherSettings::default(), config.clone()).unwrap();

    let request = DownloadRequest {
        version: "4.3.0".to_string(),
        url: serve_once(build_zip(&[("docs/readme.txt", "no binary here")])).await,
        target_dir: root.clone(),
        folder_name: "broken".to_string(),
    };

    let (reporter, _rx) = ProgressReporter::channel();
    let result = downloader.install(&request, &reporter).await;

    assert!(matches!(result, Err(LauncherError::ExecutableNotFound(_))));
    assert!(root.join("broken/docs/readme.txt").is_file());
    assert!(config.executables().is_empty());
}

#[tokio::test]
async fn test_http_error_status_registers_nothing() {
    let (_temp_dir, root) = create_test_dir();
    let config = ConfigManager::new(root.join("config.json")).unwrap();
    let downloader = Downloader::new(&LauncherSettings::default(), config.clone()).unwrap();
    let url = serve_raw(
        "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\n".to_string(),
        b"not found".to_vec(),
    )
    .await;

    let (reporter, rx) = ProgressReporter::channel();
    let result = downloader.install(&request_for(url, &root), &reporter).await;
    drop(reporter);

    assert!(matches!(
        result,
        Err(LauncherError::HttpStatus { status: 404, .. })
    ));
    assert!(!root.join("stable/blender-4.3.0").join(ARCHIVE_NAME).exists());
    assert!(config.executables().is_empty());
    let events = collect_events(rx).await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::Complete { .. } | ProgressEvent::ConfigUpdated { .. })));
}

#[tokio::test]
async fn test_connection_dropped_mid_body_removes_partial_archive() {
    let (_temp_dir, root) = create_test_dir();
    let config = ConfigManager::new(root.join("config.json")).unwrap();
    let downloader = Downloader::new(&LauncherSettings::default(), config.clone()).unwrap();
    let archive = blender_archive();
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        archive.len() + 4096
    );
    let url = serve_raw(head, archive).await;

    let (reporter, _rx) = ProgressReporter::channel();
    let result = downloader.install(&request_for(url, &root), &reporter).await;

    assert!(matches!(result, Err(LauncherError::Network { .. })));
    assert!(!root.join("stable/blender-4.3.0").join(ARCHIVE_NAME).exists());
    assert!(config.executables().is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let (_temp_dir, root) = create_test_dir();
    let config = ConfigManager::new(root.join("config.json")).unwrap();
    let downloader = Downloader::new(&LauncherSettings::default(), config.clone()).unwrap();
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (reporter, _rx) = ProgressReporter::channel();
    let result = downloader
        .install(&request_for(format!("http://{addr}/blender.zip"), &root), &reporter)
        .await;

    assert!(matches!(result, Err(LauncherError::Network { .. })));
    assert!(config.executables().is_empty());
}
