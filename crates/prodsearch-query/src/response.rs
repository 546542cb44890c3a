//! Engine-neutral search response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use prodsearch_core::SearchHit;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    pub total: u64,
    pub hits: Vec<SearchHit>,
    /// Keyed by aggregation name.
    #[serde(default)]
    pub aggregations: BTreeMap<String, RawAggregation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAggregation {
    #[serde(default)]
    pub buckets: Vec<RawBucket>,
}

/// A terms bucket (`key`, `doc_count`) or a range bucket (which also
/// carries `from`/`to`). Terms keys may be strings or numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBucket {
    pub key: Value,
    pub doc_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
}

impl RawBucket {
    pub fn key_string(&self) -> String {
        match &self.key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
