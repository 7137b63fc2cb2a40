//! Core type definitions

use serde::{Deserialize, Serialize};

/// Steam application ID reported by a server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(pub u32);

impl AppId {
    /// DayZ standalone, the only title that embeds a mod list in its rules
    pub const DAYZ: AppId = AppId(221100);

    /// 2006-era engines that omit the max packet size from split headers.
    ///
    /// See https://developer.valvesoftware.com/wiki/Server_queries
    pub const NO_SPLIT_SIZE: [AppId; 4] = [AppId(215), AppId(17550), AppId(17700), AppId(240)];

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Whether this title omits the split-size field when running protocol 7
    pub fn omits_split_size(&self) -> bool {
        Self::NO_SPLIT_SIZE.contains(self)
    }
}

impl From<u32> for AppId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Byte order used when writing the challenge into a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "le" | "little" => Some(Self::Little),
            "be" | "big" => Some(Self::Big),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Little => "le",
            Self::Big => "be",
        }
    }
}
