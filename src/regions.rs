//! Region codes and the preset region lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Two-letter ISO 3166-1 alpha-2 country code, stored uppercase.
///
/// Any syntactically valid code is accepted; a code neither upstream knows
/// simply yields no data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    /// Returns the uppercase code (World Bank style).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercase code (Steam `cc` style).
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Returns the English country name if the code is one we know.
    pub fn name(&self) -> Option<&'static str> {
        KNOWN.iter().find(|(code, _)| *code == self.0).map(|(_, name)| *name)
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegionCode {
    type Err = RegionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Steam accepts "uk"; ISO says GB.
        if trimmed.eq_ignore_ascii_case("uk") {
            return Ok(RegionCode("GB".to_string()));
        }
        if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(RegionCode(trimmed.to_ascii_uppercase()))
        } else {
            Err(RegionParseError(s.to_string()))
        }
    }
}

impl TryFrom<String> for RegionCode {
    type Error = RegionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionParseError(String);

impl fmt::Display for RegionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid region code '{}'. Expected two letters, e.g. US, PL, DE", self.0)
    }
}

impl std::error::Error for RegionParseError {}

const KNOWN: &[(&str, &str)] = &[
    ("AU", "Australia"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CN", "China"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("ES", "Spain"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("HU", "Hungary"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("PL", "Poland"),
    ("RU", "Russia"),
    ("SE", "Sweden"),
    ("US", "United States"),
];

/// Regions queried by the price comparison endpoint.
pub const COMPARISON_REGIONS: &[&str] = &[
    "US", "GB", "DE", "FR", "PL", "RU", "BR", "AU", "JP", "KR", "CA", "SE", "NO", "CZ", "HU",
    "CN", "IT", "ES", "NL", "MX",
];

/// Regions used for the CSV export and indicator download.
pub const EXPORT_REGIONS: &[&str] = &[
    "PL", "US", "DE", "FR", "BR", "IN", "CN", "MX", "JP", "KR", "CA", "AU", "SE", "CZ", "HU",
    "IT", "ES", "NL",
];

/// Parses a preset list. Presets are compile-time constants of valid codes.
pub fn preset(codes: &[&str]) -> Vec<RegionCode> {
    codes.iter().filter_map(|c| c.parse().ok()).collect()
}

/// Returns every region we have a name for, sorted by code.
pub fn known() -> Vec<RegionCode> {
    KNOWN.iter().map(|(code, _)| RegionCode(code.to_string())).collect()
}
