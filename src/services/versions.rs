//! Official build listings.
//!
//! The release server and the build bot publish plain directory listings. Each
//! listing flavour is a [`PageFormat`]; parsing a page is a pure function from
//! HTML to [`VersionRecord`]s so a format change stays local to one variant.

use crate::error::{LauncherError, LauncherResult};
use crate::events::{ProgressEvent, ProgressReporter};
use crate::models::{Channel, IndexUrls, LauncherSettings, SemVer, VersionRecord};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Url};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const USER_AGENT: &str = "Blender-Launcher/1.0";

static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("Invalid href regex"));

static RELEASE_FOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href\s*=\s*["'](?:[^"']*/)?Blender(\d+)\.(\d+)/["']"#)
        .expect("Invalid release folder regex")
});

/// `blender-4.3.0-windows-x64.zip`, `blender-4.2.0-beta2-windows-arm64.zip`
static STABLE_ARCHIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"blender-(\d+\.\d+\.\d+(?:\.\d+)?(?:-[a-zA-Z]+\d*)?)-(windows|linux|macos)-(x64|arm64)\.zip$",
    )
    .expect("Invalid stable archive regex")
});

/// `blender-4.4.0-alpha+main.a1b2c3d4e5f6-windows.amd64-release.zip`
static BUILDER_ARCHIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"blender-(\d+\.\d+\.\d+)-([a-zA-Z]+)\+([^\s/]+?)\.([0-9a-f]{7,40})-(windows|linux|darwin|macos)\.(amd64|x86_64|arm64)-release\.zip$",
    )
    .expect("Invalid builder archive regex")
});

/// Apache listing timestamp, `18-Nov-2024 17:36`
static LISTING_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2})|(\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2})")
        .expect("Invalid listing date regex")
});

/// Which listings to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelector {
    All,
    One(Channel),
}

impl ChannelSelector {
    pub fn channels(&self) -> Vec<Channel> {
        match self {
            ChannelSelector::All => Channel::ALL.to_vec(),
            ChannelSelector::One(channel) => vec![*channel],
        }
    }
}

impl FromStr for ChannelSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(ChannelSelector::All)
        } else {
            s.parse().map(ChannelSelector::One)
        }
    }
}

impl fmt::Display for ChannelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSelector::All => f.write_str("all"),
            ChannelSelector::One(channel) => channel.fmt(f),
        }
    }
}

/// Operating system whose archives are listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Windows,
    Linux,
    MacOs,
}

impl TargetOs {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            TargetOs::MacOs
        } else if cfg!(windows) {
            TargetOs::Windows
        } else {
            TargetOs::Linux
        }
    }

    fn matches(&self, token: &str) -> bool {
        match self {
            TargetOs::Windows => token == "windows",
            TargetOs::Linux => token == "linux",
            TargetOs::MacOs => token == "macos" || token == "darwin",
        }
    }
}

impl FromStr for TargetOs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" => Ok(TargetOs::Windows),
            "linux" => Ok(TargetOs::Linux),
            "macos" | "darwin" => Ok(TargetOs::MacOs),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Listing page flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    /// One `BlenderX.Y/` release folder on the release server
    StableIndex,
    DailyArchive,
    PatchArchive,
    ExperimentalArchive,
}

impl PageFormat {
    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Stable => PageFormat::StableIndex,
            Channel::Daily => PageFormat::DailyArchive,
            Channel::Patch => PageFormat::PatchArchive,
            Channel::Experimental => PageFormat::ExperimentalArchive,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            PageFormat::StableIndex => Channel::Stable,
            PageFormat::DailyArchive => Channel::Daily,
            PageFormat::PatchArchive => Channel::Patch,
            PageFormat::ExperimentalArchive => Channel::Experimental,
        }
    }

    /// Extract every archive for `os` linked from `html`.
    ///
    /// Relative links are resolved against `page_url`. Checksums and non-zip
    /// files are ignored. Unknown markup yields an empty list, never an error.
    pub fn parse(&self, page_url: &Url, html: &str, os: TargetOs) -> Vec<VersionRecord> {
        let links: Vec<_> = HREF.captures_iter(html).collect();
        let mut records = Vec::new();

        for (i, caps) in links.iter().enumerate() {
            let (Some(whole), Some(href)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let href = href.as_str();
            if href.contains(".sha256") || !href.ends_with(".zip") {
                continue;
            }

            // Text between this link and the next one holds the listing columns.
            let tail_end = links
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(html.len(), |m| m.start());
            let tail = &html[whole.end()..tail_end];

            let Ok(url) = page_url.join(href) else {
                tracing::debug!("Skipping unjoinable href {}", href);
                continue;
            };
            let file_name = url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .unwrap_or_default()
                .to_string();
            let file_name = percent_decode_plus(&file_name);

            let record = match self {
                PageFormat::StableIndex => parse_stable_name(&file_name, os),
                _ => parse_builder_name(&file_name, os, self.channel()),
            };
            if let Some(mut record) = record {
                record.url = url.to_string();
                record.date = parse_listing_date(tail);
                records.push(record);
            }
        }

        records
    }
}

fn parse_stable_name(file_name: &str, os: TargetOs) -> Option<VersionRecord> {
    let caps = STABLE_ARCHIVE.captures(file_name)?;
    if !os.matches(&caps[2]) {
        return None;
    }
    Some(VersionRecord {
        version: caps[1].to_string(),
        url: String::new(),
        channel: Channel::Stable,
        date: None,
        hash: None,
        architecture: Some(caps[3].to_string()),
        branch: None,
    })
}

fn parse_builder_name(file_name: &str, os: TargetOs, channel: Channel) -> Option<VersionRecord> {
    let caps = BUILDER_ARCHIVE.captures(file_name)?;
    if !os.matches(&caps[5]) {
        return None;
    }
    Some(VersionRecord {
        version: format!("{}-{}+{}.{}", &caps[1], &caps[2], &caps[3], &caps[4]),
        url: String::new(),
        channel,
        date: None,
        hash: Some(caps[4].to_string()),
        architecture: Some(caps[6].to_string()),
        branch: Some(caps[3].to_string()),
    })
}

/// URLs carry `+` as `%2B`; decode just that so the archive pattern matches
fn percent_decode_plus(name: &str) -> String {
    name.replace("%2B", "+").replace("%2b", "+")
}

/// First listing timestamp in `text`, if any
pub fn parse_listing_date(text: &str) -> Option<NaiveDateTime> {
    let caps = LISTING_DATE.captures(text)?;
    if let Some(apache) = caps.get(1) {
        return NaiveDateTime::parse_from_str(apache.as_str(), "%d-%b-%Y %H:%M").ok();
    }
    let iso = caps.get(2)?.as_str().replace('T', " ");
    NaiveDateTime::parse_from_str(&iso, "%Y-%m-%d %H:%M").ok()
}

/// `BlenderX.Y/` folder names on the release root, newest first, at most `limit`
pub fn parse_release_folders(html: &str, limit: usize) -> Vec<String> {
    let mut versions: Vec<(u32, u32)> = RELEASE_FOLDER
        .captures_iter(html)
        .filter_map(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        .collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();
    versions
        .into_iter()
        .take(limit)
        .map(|(major, minor)| format!("Blender{major}.{minor}"))
        .collect()
}

/// Newest first by parsed version; unparseable versions sink to the end
pub fn sort_stable(records: &mut [VersionRecord]) {
    records.sort_by(|a, b| compare_versions(&b.version, &a.version));
}

/// Newest listing timestamp first, then by version
pub fn sort_builder(records: &mut [VersionRecord]) {
    records.sort_by(|a, b| match (a.date, b.date) {
        (Some(da), Some(db)) => db
            .cmp(&da)
            .then_with(|| compare_versions(&b.version, &a.version)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => compare_versions(&b.version, &a.version),
    });
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (SemVer::parse(a), SemVer::parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Keep the first record per hash (or per URL when there is no hash)
pub fn dedup_records(records: &mut Vec<VersionRecord>) {
    let mut seen = HashSet::new();
    records.retain(|r| {
        let key = r.hash.clone().unwrap_or_else(|| r.url.clone());
        seen.insert(key)
    });
}

/// Fetches and parses the official listings
pub struct VersionFetcher {
    client: Client,
    urls: IndexUrls,
    max_stable_folders: usize,
    max_builds: usize,
    os: TargetOs,
}

impl VersionFetcher {
    pub fn new(settings: &LauncherSettings, os: TargetOs) -> LauncherResult<Self> {
        let client = build_http_client(Duration::from_secs(settings.timeouts.version_probe))?;
        Ok(Self {
            client,
            urls: settings.index_urls.clone(),
            max_stable_folders: settings.max_stable_folders,
            max_builds: settings.max_builds_per_channel,
            os,
        })
    }

    fn index_url(&self, channel: Channel) -> &str {
        match channel {
            Channel::Stable => &self.urls.stable,
            Channel::Daily => &self.urls.daily,
            Channel::Patch => &self.urls.patch,
            Channel::Experimental => &self.urls.experimental,
        }
    }

    async fn get_text(&self, url: &Url) -> LauncherResult<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| LauncherError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| LauncherError::Network {
            url: url.to_string(),
            source,
        })
    }

    /// Walk the newest release folders and collect their archives.
    ///
    /// A folder that fails to load is logged and skipped; only a failure on
    /// the release root fails the channel.
    pub async fn fetch_stable(&self, reporter: &ProgressReporter) -> LauncherResult<Vec<VersionRecord>> {
        let root = parse_url(self.index_url(Channel::Stable))?;
        let root_html = self.get_text(&root).await?;
        let folders = parse_release_folders(&root_html, self.max_stable_folders);
        tracing::info!("Found {} release folders", folders.len());

        let mut records = Vec::new();
        for folder in folders {
            let folder_url = root
                .join(&format!("{folder}/"))
                .map_err(|e| LauncherError::Parse(format!("bad folder url {folder}: {e}")))?;
            match self.get_text(&folder_url).await {
                Ok(html) => {
                    records.extend(PageFormat::StableIndex.parse(&folder_url, &html, self.os));
                }
                Err(e) => {
                    tracing::warn!("Skipping folder {}: {}", folder, e);
                    reporter.log(format!("Error fetching folder {folder}: {e}"));
                }
            }
        }

        sort_stable(&mut records);
        dedup_records(&mut records);
        Ok(records)
    }

    pub async fn fetch_builder(&self, channel: Channel) -> LauncherResult<Vec<VersionRecord>> {
        let url = parse_url(self.index_url(channel))?;
        let html = self.get_text(&url).await?;

        let mut records = PageFormat::for_channel(channel).parse(&url, &html, self.os);
        sort_builder(&mut records);
        dedup_records(&mut records);
        records.truncate(self.max_builds);
        Ok(records)
    }

    pub async fn fetch_channel(
        &self,
        channel: Channel,
        reporter: &ProgressReporter,
    ) -> LauncherResult<Vec<VersionRecord>> {
        match channel {
            Channel::Stable => self.fetch_stable(reporter).await,
            other => self.fetch_builder(other).await,
        }
    }

    /// Fetch every selected channel, emitting one `versions` event per channel.
    ///
    /// A failing channel emits an `error` event and an empty list; the others
    /// still run.
    pub async fn fetch(&self, selector: ChannelSelector, reporter: &ProgressReporter) {
        reporter.log("Starting Blender version fetch...");

        for channel in selector.channels() {
            reporter.log(format!("Fetching {channel} versions..."));
            let versions = match self.fetch_channel(channel, reporter).await {
                Ok(versions) => {
                    reporter.log(format!("Found {} {} versions", versions.len(), channel));
                    versions
                }
                Err(e) => {
                    tracing::error!("Failed to fetch {} versions: {}", channel, e);
                    reporter.error(format!("Failed to fetch {channel} versions: {e}"), None);
                    Vec::new()
                }
            };
            reporter.emit(ProgressEvent::Versions {
                version_type: channel,
                versions,
            });
        }

        reporter.log("Version fetch completed");
    }
}

fn parse_url(raw: &str) -> LauncherResult<Url> {
    Url::parse(raw).map_err(|e| LauncherError::Parse(format!("invalid index url {raw}: {e}")))
}

/// Shared client for every request the launcher makes
pub fn build_http_client(timeout: Duration) -> LauncherResult<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .build()
        .map_err(|source| LauncherError::Network {
            url: String::new(),
            source,
        })
}
