//! Domain types shared by the query builders, engines and the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::filter::FilterSpec;
use crate::normalize::normalize_query;

pub const DEFAULT_SIZE: usize = 10;
pub const MAX_SIZE: usize = 100;

/// A single product review. Reviews without text are dropped before they
/// reach the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub rating: f32,
    pub text: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub username: String,
}

/// A product with its reviews and the embedding of its concatenated text.
///
/// `text_vector` is empty when the document comes back from a search (the
/// vector is excluded from the returned source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_vector: Vec<f32>,
}

/// Retrieval strategy tag. Unknown tags resolve to [`SearchMode::Basic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum SearchMode {
    #[default]
    Basic,
    Fuzzy,
    Faceted,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub const ALL: [SearchMode; 5] = [
        SearchMode::Basic,
        SearchMode::Fuzzy,
        SearchMode::Faceted,
        SearchMode::Semantic,
        SearchMode::Hybrid,
    ];

    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "basic" => SearchMode::Basic,
            "fuzzy" => SearchMode::Fuzzy,
            "faceted" => SearchMode::Faceted,
            "semantic" => SearchMode::Semantic,
            "hybrid" => SearchMode::Hybrid,
            other => {
                tracing::debug!(tag = other, "unknown search mode, using basic");
                SearchMode::Basic
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Basic => "basic",
            SearchMode::Fuzzy => "fuzzy",
            SearchMode::Faceted => "faceted",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }

    /// Whether the strategy needs a query embedding.
    pub fn needs_embedding(self) -> bool {
        matches!(self, SearchMode::Semantic | SearchMode::Hybrid)
    }

    pub fn returns_facets(self) -> bool {
        matches!(self, SearchMode::Faceted)
    }
}

impl From<String> for SearchMode {
    fn from(tag: String) -> Self {
        SearchMode::from_tag(&tag)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search call. `query` holds the normalized query text.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub filters: FilterSpec,
    pub size: usize,
    pub deadline: Option<Instant>,
}

impl SearchRequest {
    pub fn new(raw_query: &str, mode: SearchMode) -> Self {
        Self {
            query: normalize_query(raw_query),
            mode,
            filters: FilterSpec::default(),
            size: DEFAULT_SIZE,
            deadline: None,
        }
    }

    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn validate(&self, max_size: usize) -> Result<()> {
        if self.size == 0 || self.size > max_size {
            return Err(Error::InvalidSize { size: self.size, max: max_size });
        }
        Ok(())
    }
}

/// A ranked document. `highlight` maps field names to marked-up fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f32,
    #[serde(flatten)]
    pub document: Document,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub highlight: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetBucket {
    pub key: String,
    pub doc_count: u64,
}

/// A rating histogram bucket; `key` renders the bounds, e.g. `1.0-2.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
    pub doc_count: u64,
}

/// Bucketed counts over the filtered result set, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetSet {
    pub brands: Vec<FacetBucket>,
    pub categories: Vec<FacetBucket>,
    pub manufacturers: Vec<FacetBucket>,
    pub ratings: Vec<RatingBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub mode: SearchMode,
    pub total: u64,
    pub hits: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<FacetSet>,
}

impl SearchResult {
    /// The result of a query that normalized to nothing.
    pub fn empty(mode: SearchMode) -> Self {
        Self { mode, total: 0, hits: Vec::new(), facets: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_tag_falls_back_to_basic() {
        assert_eq!(SearchMode::from_tag("unknown"), SearchMode::Basic);
        assert_eq!(SearchMode::from_tag(" Hybrid "), SearchMode::Hybrid);
        let parsed: SearchMode = serde_json::from_str("\"vector\"").expect("mode");
        assert_eq!(parsed, SearchMode::Basic);
    }

    #[test]
    fn mode_tags_round_trip_through_display() {
        for mode in SearchMode::ALL {
            assert_eq!(SearchMode::from_tag(&mode.to_string()), mode);
        }
    }

    #[test]
    fn only_vector_modes_need_embeddings() {
        let needing: Vec<SearchMode> =
            SearchMode::ALL.into_iter().filter(|m| m.needs_embedding()).collect();
        assert_eq!(needing, [SearchMode::Semantic, SearchMode::Hybrid]);
    }

    #[test]
    fn request_normalizes_and_validates_size() {
        let req = SearchRequest::new("  Wireless MOUSE! ", SearchMode::Basic);
        assert_eq!(req.query, "wireless mouse");
        assert!(req.validate(MAX_SIZE).is_ok());
        assert!(req.clone().with_size(0).validate(MAX_SIZE).is_err());
        assert!(req.with_size(101).validate(MAX_SIZE).is_err());
    }

    #[test]
    fn hit_serializes_flat_without_vector() {
        let hit = SearchHit {
            score: 1.5,
            document: Document {
                id: "p1".into(),
                name: "Echo Dot".into(),
                brand: "Amazon".into(),
                categories: vec!["Speakers".into()],
                manufacturer: String::new(),
                reviews: vec![],
                text_vector: vec![],
            },
            highlight: BTreeMap::new(),
        };
        let json = serde_json::to_value(&hit).expect("json");
        assert_eq!(json["id"], "p1");
        assert_eq!(json["score"], 1.5);
        assert!(json.get("text_vector").is_none());
        assert!(json.get("highlight").is_none());
    }
}
