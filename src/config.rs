//! Engine configuration

use bigdecimal::BigDecimal;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::{GstError, GstResult};

/// Tunables for normalization and ITC reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest per-head and total difference still treated as a match
    pub matching_tolerance: BigDecimal,
    /// Supply categories whose credit is blocked, matched case-insensitively
    /// as substrings of the invoice's category
    pub blocked_categories: Vec<String>,
    /// Reject GSTINs whose check character does not verify
    pub enforce_gstin_checksum: bool,
    /// How long finished background jobs stay available for polling
    pub job_retention_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching_tolerance: BigDecimal::from(0),
            blocked_categories: [
                "motor vehicle",
                "food and beverages",
                "outdoor catering",
                "beauty treatment",
                "health services",
                "club membership",
                "life insurance",
                "travel benefits",
                "works contract",
                "personal consumption",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            enforce_gstin_checksum: false,
            job_retention_secs: 3600,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `GST_ENGINE_*` environment variables,
    /// falling back to defaults for anything unset.
    ///
    /// `GST_ENGINE_BLOCKED_CATEGORIES` is a comma-separated list.
    pub fn from_env() -> GstResult<Self> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("GST_ENGINE")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("blocked_categories"),
            )
            .build()
            .and_then(|c| c.try_deserialize::<EngineConfig>())
            .map_err(|e| GstError::Config(e.to_string()))?
            .validated()
    }

    /// Parse a JSON document
    pub fn from_json(json: &str) -> GstResult<Self> {
        serde_json::from_str::<EngineConfig>(json)
            .map_err(|e| GstError::Config(e.to_string()))?
            .validated()
    }

    fn validated(self) -> GstResult<Self> {
        if self.matching_tolerance < BigDecimal::from(0) {
            return Err(GstError::Config(format!(
                "matching tolerance must not be negative, got {}",
                self.matching_tolerance
            )));
        }
        Ok(self)
    }

    /// Block-list entry matching a supply category, if any
    pub fn blocked_by(&self, category: &str) -> Option<&str> {
        let category = category.to_lowercase();
        self.blocked_categories
            .iter()
            .map(String::as_str)
            .find(|blocked| {
                !blocked.trim().is_empty() && category.contains(&blocked.to_lowercase())
            })
    }

    pub fn job_retention(&self) -> Duration {
        i64::try_from(self.job_retention_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}
