use prodsearch_core::{Document, FilterSpec, RangeBounds, Review, SearchMode};
use prodsearch_engine::{EngineError, IndexEngine, MemoryEngine};
use prodsearch_query::dsl::{BoolQuery, Knn, VECTOR_FIELD};
use prodsearch_query::{build_search, FilterCompiler, Query, QueryOptions, SearchBody, StrategyInput, SuggestBody};

fn review(rating: f32, text: &str) -> Review {
    Review { date: None, rating, text: text.into(), title: String::new(), username: "shopper".into() }
}

fn product(id: &str, name: &str, brand: &str, categories: &[&str], reviews: Vec<Review>, vector: [f32; 3]) -> Document {
    Document {
        id: id.into(),
        name: name.into(),
        brand: brand.into(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        manufacturer: if brand == "Amazon" { "Amazon".into() } else { String::new() },
        reviews,
        text_vector: vector.to_vec(),
    }
}

fn catalog() -> Vec<Document> {
    vec![
        product("p1", "Logitech Wireless Mouse", "Logitech", &["Electronics", "Mice"], vec![review(5.0, "smooth and responsive")], [1.0, 0.0, 0.0]),
        product("p2", "USB Keyboard", "Acme", &["Electronics"], vec![review(2.0, "works well with my wireless mouse")], [0.8, 0.2, 0.0]),
        product("p3", "Echo Dot", "Amazon", &["Speakers"], vec![review(4.0, "great speaker"), review(3.0, "decent sound")], [0.0, 1.0, 0.0]),
        product("p4", "Fire HD 8 Tablet", "Amazon", &["Tablets", "Electronics"], vec![review(4.5, "kids love this tablet")], [0.0, 0.0, 1.0]),
    ]
}

async fn engine() -> MemoryEngine {
    MemoryEngine::with_documents(&catalog()).await.expect("index")
}

fn body(mode: SearchMode, query: &str, filters: &FilterSpec, vector: Option<&[f32]>) -> SearchBody {
    let clauses = FilterCompiler::default().compile(filters).expect("filters");
    let mut input = StrategyInput::new(query, &clauses, 10);
    if let Some(v) = vector {
        input = input.with_vector(v);
    }
    build_search(mode, &input, &QueryOptions::default())
}

fn ids(response: &prodsearch_query::EngineResponse) -> Vec<&str> {
    response.hits.iter().map(|h| h.document.id.as_str()).collect()
}

#[tokio::test]
async fn basic_ranks_name_phrase_above_review_mentions() {
    let engine = engine().await;
    let response = engine.search(&body(SearchMode::Basic, "wireless mouse", &FilterSpec::new(), None)).await.expect("search");
    assert_eq!(ids(&response), ["p1", "p2"]);
    assert!(response.hits[0].score > response.hits[1].score);
    assert_eq!(response.total, 2);
    assert!(response.hits.iter().all(|h| h.document.text_vector.is_empty()));
}

#[tokio::test]
async fn highlights_use_configured_markers() {
    let engine = engine().await;
    let response = engine.search(&body(SearchMode::Basic, "wireless mouse", &FilterSpec::new(), None)).await.expect("search");
    assert_eq!(response.hits[0].highlight["name"], ["Logitech <em>Wireless</em> <em>Mouse</em>"]);
    assert_eq!(response.hits[1].highlight["reviews.text"], ["works well with my <em>wireless</em> <em>mouse</em>"]);
}

#[tokio::test]
async fn fuzzy_tolerates_a_dropped_letter() {
    let engine = engine().await;
    let response = engine.search(&body(SearchMode::Fuzzy, "wireles mouse", &FilterSpec::new(), None)).await.expect("search");
    assert_eq!(ids(&response).first(), Some(&"p1"));
}

#[tokio::test]
async fn faceted_counts_cover_the_filtered_set() {
    let engine = engine().await;
    let filters = FilterSpec::new().with("brand", vec!["Amazon", "Logitech"]);
    let response = engine.search(&body(SearchMode::Faceted, "Electronics", &filters, None)).await.expect("search");
    assert_eq!(ids(&response), ["p1", "p4"]);

    let facets = prodsearch_query::collect_facets(&response.aggregations);
    let brands: Vec<(&str, u64)> = facets.brands.iter().map(|b| (b.key.as_str(), b.doc_count)).collect();
    assert_eq!(brands, [("Amazon", 1), ("Logitech", 1)]);
    assert_eq!(facets.ratings.len(), 6);
    assert_eq!(facets.ratings.iter().map(|b| b.doc_count).sum::<u64>(), response.total);
}

#[tokio::test]
async fn rating_histogram_stays_inside_the_filter_window() {
    let engine = engine().await;
    let filters = FilterSpec::new().with("reviews.rating", RangeBounds::new(Some(4.0), Some(5.0)));
    let response = engine.search(&body(SearchMode::Faceted, "speaker tablet", &filters, None)).await.expect("search");
    let mut found = ids(&response);
    found.sort_unstable();
    assert_eq!(found, ["p3", "p4"]);

    let facets = prodsearch_query::collect_facets(&response.aggregations);
    let ratings: Vec<(&str, u64)> = facets.ratings.iter().map(|b| (b.key.as_str(), b.doc_count)).collect();
    assert_eq!(ratings, [("4.0-5.0", 2), ("5.0-*", 0)]);
    assert_eq!(facets.ratings.iter().map(|b| b.doc_count).sum::<u64>(), response.total);
}

#[tokio::test]
async fn keyword_fields_compare_case_sensitively() {
    let engine = engine().await;
    let lowered = engine.search(&body(SearchMode::Basic, "amazon", &FilterSpec::new(), None)).await.expect("search");
    assert_eq!(lowered.total, 0);

    let exact = engine.search(&body(SearchMode::Basic, "Amazon", &FilterSpec::new(), None)).await.expect("search");
    let mut found = ids(&exact);
    found.sort_unstable();
    assert_eq!(found, ["p3", "p4"]);
    assert_eq!(exact.hits[0].highlight["brand"], ["<em>Amazon</em>"]);

    let filters = FilterSpec::new().with("brand", vec!["amazon"]);
    let filtered = engine.search(&body(SearchMode::Basic, "tablet", &filters, None)).await.expect("search");
    assert!(filtered.hits.is_empty());
}

#[tokio::test]
async fn rating_range_keeps_documents_with_any_review_inside() {
    let engine = engine().await;
    let filters = FilterSpec::new().with("reviews.rating", RangeBounds::new(Some(4.0), Some(5.0)));
    let query = Query::Bool(BoolQuery {
        must: vec![Query::MatchAll],
        filter: prodsearch_query::filter::to_queries(&FilterCompiler::default().compile(&filters).expect("filters")),
        ..BoolQuery::default()
    });
    let response = engine.search(&SearchBody::new(query, 10)).await.expect("search");
    let mut found = ids(&response);
    found.sort_unstable();
    assert_eq!(found, ["p1", "p3", "p4"]);
}

#[tokio::test]
async fn knn_ranks_by_similarity_within_filters() {
    let engine = engine().await;
    let query = Query::Knn(Knn {
        field: VECTOR_FIELD.into(),
        vector: vec![1.0, 0.1, 0.0],
        k: 2,
        num_candidates: 100,
        filter: vec![Query::Term { field: "categories".into(), value: "Electronics".into() }],
    });
    let response = engine.search(&SearchBody::new(query, 10)).await.expect("search");
    assert_eq!(ids(&response), ["p1", "p2"]);
    assert!(response.hits[0].score <= 1.0 && response.hits[1].score >= 0.5);
}

#[tokio::test]
async fn knn_below_the_root_is_rejected() {
    let engine = engine().await;
    let knn = Query::Knn(Knn { field: VECTOR_FIELD.into(), vector: vec![1.0, 0.0, 0.0], k: 1, num_candidates: 10, filter: vec![] });
    let query = Query::Bool(BoolQuery { must: vec![knn], ..BoolQuery::default() });
    let err = engine.search(&SearchBody::new(query, 10)).await.expect_err("must fail");
    assert!(matches!(err, EngineError::UnsupportedQuery(_)));
}

#[tokio::test]
async fn suggestions_complete_names_case_insensitively() {
    let engine = engine().await;
    let body = SuggestBody::new("fi", "name.completion", 5).expect("body");
    assert_eq!(engine.suggest(&body).await.expect("suggest"), ["Fire HD 8 Tablet"]);
    let other = SuggestBody::new("fi", "brand.completion", 5).expect("body");
    assert!(engine.suggest(&other).await.is_err());
}

#[tokio::test]
async fn bulk_rejects_mismatched_vectors_and_replaces_by_id() {
    let engine = engine().await;
    let mut bad = catalog()[0].clone();
    bad.id = "p9".into();
    bad.text_vector = vec![1.0, 0.0];
    let mut renamed = catalog()[2].clone();
    renamed.name = "Echo Dot (3rd Gen)".into();

    let report = engine.bulk_index(&[bad, renamed]).await.expect("bulk");
    assert_eq!(report.indexed, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "p9");
    assert_eq!(engine.len().await, 4);

    let body = SuggestBody::new("echo", "name.completion", 5).expect("body");
    assert_eq!(engine.suggest(&body).await.expect("suggest"), ["Echo Dot (3rd Gen)"]);
}
