use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Current `.blinfo` schema version
pub const BLINFO_FILE_VERSION: u32 = 1;

/// File name of the sidecar stored in each build folder
pub const BLINFO_FILE_NAME: &str = ".blinfo";

/// Contents of a `.blinfo` sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfoSidecar {
    pub file_version: u32,
    pub blinfo: Vec<BuildInfoEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfoEntry {
    pub branch: String,
    pub subversion: String,
    pub build_hash: String,
    #[serde(with = "iso_seconds")]
    pub commit_time: NaiveDateTime,
    pub custom_name: String,
    pub is_favorite: bool,
    pub custom_executable: String,
}

impl BuildInfoSidecar {
    pub fn single(entry: BuildInfoEntry) -> Self {
        Self {
            file_version: BLINFO_FILE_VERSION,
            blinfo: vec![entry],
        }
    }
}

/// ISO-8601 without offset, e.g. `2024-11-18T17:36:00`
mod iso_seconds {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(serde::de::Error::custom)
    }
}
