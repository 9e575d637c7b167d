//! Integration tests for the official build listings
//!
//! These tests verify:
//! - Stable folder pages parse into records for the requested platform only
//! - Builder archives (daily/patch/experimental) parse with hash and branch
//! - Ordering: stable by version, builders by listing time
//! - Merging records that share a hash
//! - An unreachable channel yields an error event plus an empty list

use blender_launcher::events::collect_events;
use blender_launcher::models::{Channel, LauncherSettings};
use blender_launcher::services::versions::{
    PageFormat, dedup_records, parse_release_folders, sort_builder, sort_stable,
};
use blender_launcher::services::{ChannelSelector, TargetOs, VersionFetcher};
use blender_launcher::{ProgressEvent, ProgressReporter};
use reqwest::Url;

const STABLE_FOLDER: &str = r#"<html><body><pre>
<a href="../">../</a>
<a href="blender-4.2.1-linux-x64.tar.xz">blender-4.2.1-linux-x64.tar.xz</a>           20-Aug-2024 10:01   340M
<a href="blender-4.2.1-windows-x64.zip">blender-4.2.1-windows-x64.zip</a>            20-Aug-2024 10:02   380M
<a href="blender-4.2.1-windows-x64.zip.sha256">blender-4.2.1-windows-x64.zip.sha256</a>  20-Aug-2024 10:02   64
<a href="blender-4.3.0-windows-x64.zip">blender-4.3.0-windows-x64.zip</a>            18-Nov-2024 17:40   390M
<a href="blender-4.3.0-windows-arm64.zip">blender-4.3.0-windows-arm64.zip</a>        18-Nov-2024 17:41   370M
<a href="blender-4.3.0-macos-arm64.dmg">blender-4.3.0-macos-arm64.dmg</a>            18-Nov-2024 17:42   300M
</pre></body></html>"#;

const DAILY_ARCHIVE: &str = r#"<table>
<tr><td><a href="https://cdn.builder.blender.org/download/daily/archive/blender-4.4.0-alpha%2Bmain.a1b2c3d4e5f6-windows.amd64-release.zip">zip</a></td><td>2024-11-20 04:12</td></tr>
<tr><td><a href="https://cdn.builder.blender.org/download/daily/archive/blender-4.3.1-candidate%2Bv43.0f1e2d3c4b5a-windows.amd64-release.zip">zip</a></td><td>2024-11-21 03:00</td></tr>
<tr><td><a href="https://cdn.builder.blender.org/download/daily/archive/blender-4.4.0-alpha%2Bmain.a1b2c3d4e5f6-windows.amd64-release.zip">zip</a></td><td>2024-11-20 04:12</td></tr>
<tr><td><a href="https://cdn.builder.blender.org/download/daily/archive/blender-4.4.0-alpha%2Bmain.a1b2c3d4e5f6-linux.x86_64-release.zip">zip</a></td><td>2024-11-20 04:12</td></tr>
</table>"#;

fn page_url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

#[test]
fn test_stable_folder_for_windows() {
    let url = page_url("https://download.blender.org/release/Blender4.3/");
    let mut records = PageFormat::StableIndex.parse(&url, STABLE_FOLDER, TargetOs::Windows);
    sort_stable(&mut records);

    let versions: Vec<(&str, Option<&str>)> = records
        .iter()
        .map(|r| (r.version.as_str(), r.architecture.as_deref()))
        .collect();
    assert_eq!(
        versions,
        [
            ("4.3.0", Some("x64")),
            ("4.3.0", Some("arm64")),
            ("4.2.1", Some("x64")),
        ]
    );
    assert_eq!(
        records[0].url,
        "https://download.blender.org/release/Blender4.3/blender-4.3.0-windows-x64.zip"
    );
    assert!(records.iter().all(|r| r.channel == Channel::Stable));
    assert!(records[0].date.is_some());
}

#[test]
fn test_stable_folder_other_platform_is_empty() {
    let url = page_url("https://download.blender.org/release/Blender4.3/");
    assert!(PageFormat::StableIndex
        .parse(&url, STABLE_FOLDER, TargetOs::MacOs)
        .is_empty());
}

#[test]
fn test_daily_archive_ordering_and_merge() {
    let url = page_url("https://builder.blender.org/download/daily/archive/");
    let mut records = PageFormat::DailyArchive.parse(&url, DAILY_ARCHIVE, TargetOs::Windows);
    assert_eq!(records.len(), 3);

    sort_builder(&mut records);
    dedup_records(&mut records);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].version, "4.3.1-candidate+v43.0f1e2d3c4b5a");
    assert_eq!(records[0].branch.as_deref(), Some("v43"));
    assert_eq!(records[1].hash.as_deref(), Some("a1b2c3d4e5f6"));
    assert_eq!(records[1].architecture.as_deref(), Some("amd64"));
    assert!(records.iter().all(|r| r.channel == Channel::Daily));
}

#[test]
fn test_release_root_keeps_newest_folders() {
    let html = r#"<a href="Blender2.79/">Blender2.79/</a>
        <a href="Blender4.2/">Blender4.2/</a>
        <a href="Blender4.3/">Blender4.3/</a>
        <a href="Blender3.6/">Blender3.6/</a>
        <a href="BlenderBenchmark2.0/">BlenderBenchmark2.0/</a>"#;
    assert_eq!(
        parse_release_folders(html, 2),
        ["Blender4.3", "Blender4.2"]
    );
}

#[test]
fn test_version_record_json_shape() {
    let url = page_url("https://download.blender.org/release/Blender4.3/");
    let records = PageFormat::StableIndex.parse(&url, STABLE_FOLDER, TargetOs::Windows);
    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["type"], "stable");
    assert!(json.get("version").is_some());
    assert!(json.get("url").is_some());
}

#[tokio::test]
async fn test_unreachable_channel_reports_error_and_empty_list() {
    let mut settings = LauncherSettings::default();
    settings.index_urls.patch = "http://127.0.0.1:9/patch/".to_string();
    settings.timeouts.version_probe = 2;

    let fetcher = VersionFetcher::new(&settings, TargetOs::Windows).unwrap();
    let (reporter, rx) = ProgressReporter::channel();
    fetcher
        .fetch(ChannelSelector::One(Channel::Patch), &reporter)
        .await;
    drop(reporter);

    let events = collect_events(rx).await;
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Error { .. })));
    let versions = events.iter().find_map(|e| match e {
        ProgressEvent::Versions {
            version_type,
            versions,
        } => Some((*version_type, versions.len())),
        _ => None,
    });
    assert_eq!(versions, Some((Channel::Patch, 0)));
}
