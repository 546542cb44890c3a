//! Caller-facing search parameters.

use serde::{Deserialize, Serialize};

use prodsearch_core::types::DEFAULT_SIZE;
use prodsearch_core::{Error, FilterSpec, RangeBounds, Result, Scalar, SearchMode, SearchRequest};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

/// Flat request shape: list-valued `category` and `brand`, a scalar
/// `manufacturer` and a rating window. The mode is a free-form tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub query: String,
    pub mode: String,
    pub category: Vec<String>,
    pub brand: Vec<String>,
    pub manufacturer: Option<String>,
    pub min_rating: f64,
    pub max_rating: f64,
    pub size: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            mode: SearchMode::Basic.to_string(),
            category: Vec::new(),
            brand: Vec::new(),
            manufacturer: None,
            min_rating: MIN_RATING,
            max_rating: MAX_RATING,
            size: DEFAULT_SIZE,
        }
    }
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    /// The filters these parameters describe. A rating range is only
    /// added when the window is narrower than the full 0-5 scale.
    pub fn filters(&self) -> Result<FilterSpec> {
        let rating_error = |reason: String| Error::InvalidFilter { field: "reviews.rating".into(), reason };
        for (name, value) in [("min_rating", self.min_rating), ("max_rating", self.max_rating)] {
            if !(MIN_RATING..=MAX_RATING).contains(&value) {
                return Err(rating_error(format!("{name} {value} is outside {MIN_RATING}..={MAX_RATING}")));
            }
        }
        if self.min_rating > self.max_rating {
            return Err(rating_error(format!("min_rating {} exceeds max_rating {}", self.min_rating, self.max_rating)));
        }

        let mut filters = FilterSpec::new();
        if !self.category.is_empty() {
            filters.insert("categories", self.category.clone());
        }
        if !self.brand.is_empty() {
            filters.insert("brand", self.brand.clone());
        }
        if let Some(manufacturer) = self.manufacturer.as_deref().filter(|m| !m.trim().is_empty()) {
            filters.insert("manufacturer", Scalar::from(manufacturer));
        }
        if self.min_rating > MIN_RATING || self.max_rating < MAX_RATING {
            filters.insert("reviews.rating", RangeBounds::new(Some(self.min_rating), Some(self.max_rating)));
        }
        Ok(filters)
    }

    pub fn into_request(self) -> Result<SearchRequest> {
        let filters = self.filters()?;
        Ok(SearchRequest::new(&self.query, SearchMode::from_tag(&self.mode))
            .with_filters(filters)
            .with_size(self.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodsearch_core::FilterValue;

    #[test]
    fn full_rating_window_adds_no_range() {
        let filters = SearchParams::new("tablet").filters().expect("filters");
        assert!(filters.is_empty());
    }

    #[test]
    fn maps_every_parameter_to_its_field() {
        let params = SearchParams {
            category: vec!["Tablets".into()],
            brand: vec!["Amazon".into(), "Acme".into()],
            manufacturer: Some("Amazon".into()),
            min_rating: 4.0,
            ..SearchParams::new("fire")
        };
        let filters = params.filters().expect("filters");
        let fields: Vec<&str> = filters.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, ["categories", "brand", "manufacturer", "reviews.rating"]);
        assert_eq!(filters.get("reviews.rating"), Some(&FilterValue::Range(RangeBounds::new(Some(4.0), Some(5.0)))));
    }

    #[test]
    fn rejects_ratings_off_the_scale() {
        let params = SearchParams { max_rating: 6.0, ..SearchParams::new("x") };
        assert!(matches!(params.filters(), Err(Error::InvalidFilter { .. })));
        let inverted = SearchParams { min_rating: 4.0, max_rating: 2.0, ..SearchParams::new("x") };
        assert!(inverted.filters().is_err());
    }

    #[test]
    fn unknown_mode_tag_becomes_basic() {
        let request = SearchParams { mode: "vector".into(), ..SearchParams::new("Echo  Dot!") }.into_request().expect("request");
        assert_eq!(request.mode, SearchMode::Basic);
        assert_eq!(request.query, "echo dot");
        assert_eq!(request.size, 10);
    }

    #[test]
    fn deserializes_with_defaults() {
        let params: SearchParams = serde_json::from_str(r#"{"query": "echo", "brand": ["Amazon"]}"#).expect("params");
        assert_eq!(params.max_rating, 5.0);
        assert_eq!(params.mode, "basic");
        assert_eq!(params.brand, ["Amazon"]);
    }
}
