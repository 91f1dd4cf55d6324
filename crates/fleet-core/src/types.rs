//! Shared types used across fleet crates.

use serde::{Deserialize, Serialize};

/// aXAPI version spoken by an appliance's management interface.
///
/// Stored as its number (21 or 30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(into = "u32", from = "u32")]
pub enum AxapiVersion {
    /// Legacy 2.1 API.
    V21,
    /// 3.0 API (the default for anything that is not 2.1).
    #[default]
    V30,
}

impl AxapiVersion {
    /// Normalise a user-supplied version string.
    ///
    /// `"2.1"` and `"21"` select the legacy API; every other input,
    /// including garbage, selects 3.0.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim() {
            "2.1" | "21" => AxapiVersion::V21,
            _ => AxapiVersion::V30,
        }
    }

    pub fn as_number(&self) -> u32 {
        match self {
            AxapiVersion::V21 => 21,
            AxapiVersion::V30 => 30,
        }
    }
}

impl From<AxapiVersion> for u32 {
    fn from(version: AxapiVersion) -> Self {
        version.as_number()
    }
}

impl From<u32> for AxapiVersion {
    fn from(n: u32) -> Self {
        if n == 21 { AxapiVersion::V21 } else { AxapiVersion::V30 }
    }
}

/// Interpret an undercloud flag. Only a case-insensitive `true` is true.
pub fn parse_undercloud(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}
