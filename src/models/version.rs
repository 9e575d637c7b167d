use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Release track a build comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Daily,
    Patch,
    Experimental,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Stable,
        Channel::Daily,
        Channel::Patch,
        Channel::Experimental,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Daily => "daily",
            Channel::Patch => "patch",
            Channel::Experimental => "experimental",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stable" => Ok(Channel::Stable),
            "daily" => Ok(Channel::Daily),
            "patch" => Ok(Channel::Patch),
            "experimental" => Ok(Channel::Experimental),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// A downloadable build found on a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub url: String,
    #[serde(rename = "type")]
    pub channel: Channel,
    pub date: Option<NaiveDateTime>,
    pub hash: Option<String>,
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Numeric part of a Blender version plus its pre-release suffix.
///
/// `4.3.0` > `4.3.0-rc` > `4.3.0-beta` > `4.2.9`. Unknown suffixes sort below releases.
#[derive(Debug, Clone)]
pub struct SemVer {
    pub parts: Vec<u32>,
    pub suffix: Option<String>,
}

impl SemVer {
    pub fn parse(raw: &str) -> Option<Self> {
        let core = raw.split('+').next()?;
        let (numbers, suffix) = match core.split_once('-') {
            Some((n, s)) => (n, Some(s.to_ascii_lowercase())),
            None => (core, None),
        };

        let parts = numbers
            .split('.')
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }

        Some(Self { parts, suffix })
    }

    fn suffix_rank(&self) -> u8 {
        match self.suffix.as_deref() {
            None => 5,
            Some(s) if s.starts_with("stable") || s.starts_with("release") => 5,
            Some(s) if s.starts_with("rc") || s.starts_with("candidate") => 4,
            Some(s) if s.starts_with("beta") => 3,
            Some(s) if s.starts_with("alpha") => 2,
            Some(_) => 1,
        }
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.suffix_rank()
            .cmp(&other.suffix_rank())
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemVer {}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
