//! Prefix completion requests against the `name-suggest` completion suggester.

use serde_json::{json, Value};

use prodsearch_core::{Error, Result};

pub const SUGGESTER: &str = "name-suggest";

#[derive(Debug, Clone, PartialEq)]
pub struct SuggestBody {
    pub prefix: String,
    pub field: String,
    pub size: usize,
}

impl SuggestBody {
    /// Trims the prefix; a blank prefix is [`Error::EmptyPrefix`].
    pub fn new(prefix: &str, field: &str, size: usize) -> Result<Self> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(Error::EmptyPrefix);
        }
        Ok(Self { prefix: prefix.to_string(), field: field.to_string(), size })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "_source": false,
            "suggest": {
                SUGGESTER: {
                    "prefix": self.prefix,
                    "completion": { "field": self.field, "size": self.size, "skip_duplicates": true }
                }
            }
        })
    }
}

/// Option texts from a `suggest` response, in engine order.
pub fn parse_suggestions(response: &Value) -> Vec<String> {
    response["suggest"][SUGGESTER]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry["options"].as_array())
        .flatten()
        .filter_map(|option| option["text"].as_str().map(str::to_string))
        .collect()
}
