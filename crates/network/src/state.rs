//! Session state and query results

use serde::Serialize;
use squery_core::AppId;
use squery_protocol::{ModEntry, SplitFormat};
use std::collections::{BTreeSet, HashMap};

use crate::config::QueryConfig;
use crate::tags::DayzTags;

/// Per-session protocol state
///
/// Owned by exactly one session. The challenge changes whenever the server
/// hands out a new one; the split flags are learned from the info reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Last challenge issued by the server
    pub challenge: Option<u32>,

    /// Split responses use the GoldSrc one-byte header (protocol 48)
    pub goldsrc_splits: bool,

    /// Split headers omit the max packet size (2006-era engines)
    pub skip_size_in_split_header: bool,

    /// Issue the dedicated challenge request before players/rules
    pub legacy_challenge: bool,

    /// Expect the GoldSrc info reply layout
    pub goldsrc_info: bool,
}

impl SessionState {
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            legacy_challenge: config.legacy_challenge,
            goldsrc_info: config.goldsrc_info,
            ..Default::default()
        }
    }

    /// Split header layout for the fragment assembler
    pub fn split_format(&self) -> SplitFormat {
        SplitFormat {
            goldsrc: self.goldsrc_splits,
            skip_size: self.skip_size_in_split_header,
        }
    }
}

/// One connected player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub name: String,
    pub score: i32,
    /// Seconds connected
    pub time: f32,
}

/// Mod block of a GoldSrc info reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldSrcMod {
    pub link: String,
    pub download: String,
    pub version: u32,
    pub size: u32,
    pub mod_type: u8,
    pub dll: u8,
}

/// Fields collected during the query that are not part of the final result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawState {
    pub protocol: u8,
    /// Server address as reported by GoldSrc info replies
    pub address: Option<String>,
    pub folder: String,
    pub game: String,
    pub app_id: AppId,
    pub num_players: u8,
    pub num_bots: u8,
    /// `d` dedicated, `l` listen, `p` SourceTV relay
    pub server_type: char,
    /// `l` Linux, `w` Windows, `m`/`o` macOS
    pub environment: char,
    pub secure: bool,
    pub version: String,
    pub steam_id: Option<u64>,
    pub sourcetv_port: Option<u16>,
    pub sourcetv_name: Option<String>,
    /// Tags in the order the server sent them
    pub tags: Vec<String>,
    pub game_mod: Option<GoldSrcMod>,
    pub players: Vec<Player>,
    pub rules: HashMap<String, String>,
    pub dayz_tags: Option<DayzTags>,
    pub dayz_mods: Vec<ModEntry>,
}

/// Final result of a query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub map: String,
    pub password: bool,
    #[serde(rename = "maxplayers")]
    pub max_players: u8,
    #[serde(rename = "numplayers")]
    pub num_players: u8,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_port: Option<u16>,
    pub tags: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_acceleration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub night_acceleration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_person: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dlc_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_hive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    pub mods: Vec<ModEntry>,
}
