use serde::{Deserialize, Serialize};

/// One entry of the upstream symbol universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyStatus {
    pub name: String,
    pub symbol: String,
    #[serde(rename = "isEnabled")]
    pub enabled: bool,
}

/// A company as stored. The row id and the first-inserted name are
/// stable across status refreshes; only `enabled` follows the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub enabled: bool,
}
