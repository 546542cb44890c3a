use prodsearch_core::config::Settings;
use prodsearch_core::{Document, Error, FilterSpec, SearchMode, SearchRequest, SearchResult};

#[test]
fn catalog_line_parses_with_optional_fields_missing() {
    let doc: Document = serde_json::from_str(
        r#"{"id":"AVpf","name":"Fire HD 8","brand":"Amazon","reviews":[{"rating":4,"text":"Great for kids","date":"2017-01-05T00:00:00Z"}]}"#,
    )
    .expect("document");
    assert!(doc.categories.is_empty());
    assert!(doc.text_vector.is_empty());
    assert_eq!(doc.reviews[0].rating, 4.0);
    assert!(doc.reviews[0].date.is_some());
    assert_eq!(doc.reviews[0].title, "");
}

#[test]
fn empty_result_serializes_without_facets() {
    let value = serde_json::to_value(SearchResult::empty(SearchMode::Faceted)).expect("json");
    assert_eq!(value, serde_json::json!({ "mode": "faceted", "total": 0, "hits": [] }));
}

#[test]
fn request_keeps_filters_and_query_form() {
    let filters: FilterSpec = serde_json::from_str(r#"{"brand": ["Amazon"]}"#).expect("filters");
    let req = SearchRequest::new("Echo   Dot?", SearchMode::from_tag("faceted")).with_filters(filters.clone());
    assert_eq!(req.query, "echo dot");
    assert_eq!(req.mode, SearchMode::Faceted);
    assert_eq!(req.filters, filters);
}

#[test]
fn default_settings_are_valid() {
    assert!(Settings::default().validate().is_ok());
}

#[test]
fn inconsistent_sizes_are_rejected() {
    let mut settings = Settings::default();
    settings.search.default_size = 50;
    settings.search.max_size = 20;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

    let mut settings = Settings::default();
    settings.search.num_candidates = 10;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));

    let mut settings = Settings::default();
    settings.embedding.dimension = 0;
    assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
}
