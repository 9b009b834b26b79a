use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::num::IntErrorKind;
use validator::Validate;

pub const SENTINEL_HEADING: &str = "unable to fetch data";

fn default_num_results() -> i64 {
    10
}

/// Parses an integer, clamping out-of-range digit strings to the `i64` bounds
/// so they still reach range validation.
fn saturating_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().parse::<i64>() {
        Ok(value) => Ok(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(de::Error::custom(format!("invalid integer {raw:?}: {e}"))),
        },
    }
}

/// Form body accepted by `POST /get-json`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchForm {
    #[validate(length(min = 1))]
    pub query: String,
    #[serde(default = "default_num_results", deserialize_with = "saturating_i64")]
    #[validate(range(min = 1, max = 100))]
    pub num_results: i64,
}

/// A single item as returned by the search provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchResultItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub pagemap: Option<PageMap>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageMap {
    #[serde(default)]
    pub metatags: Vec<HashMap<String, Value>>,
}

impl SearchResultItem {
    /// Non-empty string value of `key` in the first metatags block.
    pub fn metatag(&self, key: &str) -> Option<&str> {
        self.pagemap
            .as_ref()
            .and_then(|pagemap| pagemap.metatags.first())
            .and_then(|tags| tags.get(key))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SimplifiedResult {
    OpenGraph {
        og_title: String,
        og_url: String,
        og_description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        h1_tags: Option<Vec<String>>,
    },
    Fallback {
        broken_title: String,
        broken_url: String,
        broken_description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        h1_tags: Option<Vec<String>>,
    },
}

impl SimplifiedResult {
    pub fn set_headings(&mut self, headings: Vec<String>) {
        match self {
            SimplifiedResult::OpenGraph { h1_tags, .. }
            | SimplifiedResult::Fallback { h1_tags, .. } => *h1_tags = Some(headings),
        }
    }

    #[cfg(test)]
    pub fn headings(&self) -> Option<&[String]> {
        match self {
            SimplifiedResult::OpenGraph { h1_tags, .. }
            | SimplifiedResult::Fallback { h1_tags, .. } => h1_tags.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub limit_left_today: i64,
    pub results: Vec<SimplifiedResult>,
}

/// Daily usage record, persisted as `{"date": "YYYY-MM-DD", "count": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageState {
    pub date: NaiveDate,
    pub count: u64,
}

impl UsageState {
    pub fn fresh(date: NaiveDate) -> Self {
        Self { date, count: 0 }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub quota_used_today: u64,
    pub quota_limit: u64,
    pub extract_metadata: bool,
    pub scrape_headings: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
