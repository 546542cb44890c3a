use prodsearch_core::{FilterSpec, RangeBounds, SearchMode};
use prodsearch_query::{build_search, FilterCompiler, QueryOptions, StrategyInput};
use serde_json::json;

fn compiled(spec: &FilterSpec) -> Vec<prodsearch_query::FilterClause> {
    FilterCompiler::default().compile(spec).expect("compile")
}

#[test]
fn hybrid_request_has_complete_wire_shape() {
    let filters = compiled(&FilterSpec::new().with("brand", vec!["Amazon"]));
    let vector = [0.0_f32, 1.0];
    let input = StrategyInput::new("kindle", &filters, 3).with_vector(&vector);
    let body = build_search(SearchMode::Hybrid, &input, &QueryOptions::default()).to_json();

    assert_eq!(
        body,
        json!({
            "size": 3,
            "track_total_hits": true,
            "_source": { "excludes": ["text_vector"] },
            "query": { "bool": {
                "must": [{ "multi_match": {
                    "query": "kindle",
                    "fields": ["name^3", "brand^2", "categories", "reviews.text", "reviews.title^2"],
                    "type": "best_fields",
                    "minimum_should_match": "30%"
                }}],
                "should": [
                    { "multi_match": {
                        "query": "kindle",
                        "fields": ["name^4", "brand^3", "categories^2", "reviews.text", "reviews.title^2"],
                        "type": "phrase",
                        "boost": 2.0
                    }},
                    { "script_score": {
                        "query": { "match_all": {} },
                        "script": {
                            "source": "cosineSimilarity(params.query_vector, 'text_vector') + 1.0",
                            "params": { "query_vector": [0.0, 1.0] }
                        },
                        "boost": 0.5
                    }}
                ],
                "filter": [{ "bool": {
                    "should": [{ "term": { "brand": { "value": "Amazon" } } }],
                    "minimum_should_match": 1
                }}]
            }},
            "highlight": {
                "pre_tags": ["<em>"],
                "post_tags": ["</em>"],
                "fields": { "name": {}, "reviews.text": {}, "reviews.title": {} }
            }
        })
    );
}

#[test]
fn faceted_request_filters_do_not_score() {
    let filters = compiled(
        &FilterSpec::new()
            .with("manufacturer", "Amazon")
            .with("reviews.rating", RangeBounds::new(Some(4.0), Some(5.0))),
    );
    let input = StrategyInput::new("echo", &filters, 10);
    let body = build_search(SearchMode::Faceted, &input, &QueryOptions::default()).to_json();

    let bool_query = &body["query"]["bool"];
    assert!(bool_query.get("should").is_none());
    assert_eq!(
        bool_query["filter"],
        json!([
            { "term": { "manufacturer": { "value": "Amazon" } } },
            { "range": { "reviews.rating": { "gte": 4.0, "lte": 5.0 } } }
        ])
    );
    assert_eq!(body["aggs"]["brands"], json!({ "terms": { "field": "brand", "size": 20 } }));
    let ranges = &body["aggs"]["ratings"]["range"]["ranges"];
    assert_eq!(ranges.as_array().map(Vec::len), Some(2));
    assert_eq!(ranges[0], json!({ "from": 4.0, "to": 5.0 }));
    assert_eq!(ranges[1]["from"], 5.0);
    assert_eq!(ranges[1]["key"], "5.0-*");
    assert!(ranges[1]["to"].as_f64().is_some_and(|to| to > 5.0 && to < 5.001));
}

#[test]
fn faceted_request_without_rating_filter_asks_for_every_bucket() {
    let input = StrategyInput::new("echo", &[], 10);
    let body = build_search(SearchMode::Faceted, &input, &QueryOptions::default()).to_json();
    assert_eq!(
        body["aggs"]["ratings"]["range"]["ranges"],
        json!([{ "to": 1.0 }, { "from": 1.0, "to": 2.0 }, { "from": 2.0, "to": 3.0 },
               { "from": 3.0, "to": 4.0 }, { "from": 4.0, "to": 5.0 }, { "from": 5.0 }])
    );
}

#[test]
fn semantic_pool_stays_fixed_for_any_size() {
    let vector = [1.0_f32, 0.0];
    for size in [1, 10, 50] {
        let input = StrategyInput::new("running shoes", &[], size).with_vector(&vector);
        let body = build_search(SearchMode::Semantic, &input, &QueryOptions::default()).to_json();
        assert_eq!(body["query"]["knn"]["num_candidates"], 100);
        assert_eq!(body["query"]["knn"]["k"], size);
    }
}
