//! Typed index query descriptor.
//!
//! Builders produce these values; [`SearchBody::to_json`] renders the wire form
//! accepted by Elasticsearch-compatible engines, and the in-process engine
//! evaluates the same tree directly.

use serde_json::{json, Map, Value};

use prodsearch_core::{RangeBounds, Scalar};

/// The stored embedding field. Never returned in `_source`.
pub const VECTOR_FIELD: &str = "text_vector";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldBoost {
    pub field: String,
    pub boost: f64,
}

impl FieldBoost {
    pub fn new(field: impl Into<String>, boost: f64) -> Self {
        Self { field: field.into(), boost }
    }

    /// `name^3`, or the bare field name at boost 1.
    pub fn render(&self) -> String {
        if (self.boost - 1.0).abs() < f64::EPSILON {
            self.field.clone()
        } else {
            format!("{}^{}", self.field, self.boost)
        }
    }
}

pub fn weighted(spec: &[(&str, f64)]) -> Vec<FieldBoost> {
    spec.iter().map(|(f, b)| FieldBoost::new(*f, *b)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    BestFields,
    Phrase,
    PhrasePrefix,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::BestFields => "best_fields",
            MatchKind::Phrase => "phrase",
            MatchKind::PhrasePrefix => "phrase_prefix",
        }
    }
}

/// Edit-distance tolerance. `Auto` allows no edits for terms of 1-2 chars,
/// one edit for 3-5 chars and two edits beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    Auto,
}

impl Fuzziness {
    pub fn max_edits(self, term_chars: usize) -> usize {
        match self {
            Fuzziness::Auto => match term_chars {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatch {
    pub query: String,
    pub fields: Vec<FieldBoost>,
    pub kind: MatchKind,
    /// Percentage of query terms that must match, e.g. `30` for `"30%"`.
    pub minimum_should_match: Option<u8>,
    pub fuzziness: Option<Fuzziness>,
    pub boost: Option<f64>,
}

impl MultiMatch {
    pub fn new(kind: MatchKind, query: &str, fields: Vec<FieldBoost>) -> Self {
        Self { query: query.to_string(), fields, kind, minimum_should_match: None, fuzziness: None, boost: None }
    }

    pub fn best_fields(query: &str, fields: Vec<FieldBoost>) -> Self {
        Self::new(MatchKind::BestFields, query, fields)
    }

    pub fn phrase(query: &str, fields: Vec<FieldBoost>) -> Self {
        Self::new(MatchKind::Phrase, query, fields)
    }

    pub fn phrase_prefix(query: &str, fields: Vec<FieldBoost>) -> Self {
        Self::new(MatchKind::PhrasePrefix, query, fields)
    }

    pub fn min_match_percent(mut self, percent: u8) -> Self {
        self.minimum_should_match = Some(percent);
        self
    }

    pub fn fuzzy(mut self, fuzziness: Fuzziness) -> Self {
        self.fuzziness = Some(fuzziness);
        self
    }

    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub filter: Vec<Query>,
    pub minimum_should_match: Option<usize>,
    pub boost: Option<f64>,
}

/// `cosineSimilarity(query_vector, field) + offset`, evaluated per document.
#[derive(Debug, Clone, PartialEq)]
pub struct CosineScript {
    pub field: String,
    pub vector: Vec<f32>,
    pub offset: f64,
}

impl CosineScript {
    pub fn source(&self) -> String {
        format!("cosineSimilarity(params.query_vector, '{}') + {:?}", self.field, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Knn {
    pub field: String,
    pub vector: Vec<f32>,
    pub k: usize,
    pub num_candidates: usize,
    pub filter: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    MultiMatch(MultiMatch),
    MatchPhrase { field: String, query: String, boost: f64 },
    Term { field: String, value: Scalar },
    Range { field: String, bounds: RangeBounds },
    Bool(BoolQuery),
    ScriptScore { query: Box<Query>, script: CosineScript, boost: f64 },
    Knn(Knn),
}

impl Query {
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::MultiMatch(mm) => {
                let mut body = Map::new();
                body.insert("query".into(), json!(mm.query));
                body.insert("fields".into(), json!(mm.fields.iter().map(FieldBoost::render).collect::<Vec<_>>()));
                body.insert("type".into(), json!(mm.kind.as_str()));
                if let Some(pct) = mm.minimum_should_match {
                    body.insert("minimum_should_match".into(), json!(format!("{pct}%")));
                }
                if let Some(Fuzziness::Auto) = mm.fuzziness {
                    body.insert("fuzziness".into(), json!("AUTO"));
                }
                if let Some(boost) = mm.boost {
                    body.insert("boost".into(), json!(boost));
                }
                json!({ "multi_match": body })
            }
            Query::MatchPhrase { field, query, boost } => {
                json!({ "match_phrase": { field.as_str(): { "query": query, "boost": boost } } })
            }
            Query::Term { field, value } => json!({ "term": { field.as_str(): { "value": value } } }),
            Query::Range { field, bounds } => json!({ "range": { field.as_str(): bounds } }),
            Query::Bool(b) => {
                let mut body = Map::new();
                for (key, clauses) in [("must", &b.must), ("should", &b.should), ("filter", &b.filter)] {
                    if !clauses.is_empty() {
                        body.insert(key.into(), Value::Array(clauses.iter().map(Query::to_json).collect()));
                    }
                }
                if let Some(msm) = b.minimum_should_match {
                    body.insert("minimum_should_match".into(), json!(msm));
                }
                if let Some(boost) = b.boost {
                    body.insert("boost".into(), json!(boost));
                }
                json!({ "bool": body })
            }
            Query::ScriptScore { query, script, boost } => json!({
                "script_score": {
                    "query": query.to_json(),
                    "script": { "source": script.source(), "params": { "query_vector": script.vector } },
                    "boost": boost,
                }
            }),
            Query::Knn(knn) => {
                let mut body = json!({
                    "field": knn.field,
                    "query_vector": knn.vector,
                    "k": knn.k,
                    "num_candidates": knn.num_candidates,
                });
                if !knn.filter.is_empty() {
                    body["filter"] = Value::Array(knn.filter.iter().map(Query::to_json).collect());
                }
                json!({ "knn": body })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub fields: Vec<String>,
    pub pre_tag: String,
    pub post_tag: String,
}

/// One bucket of a range aggregation: `from` inclusive, `to` exclusive.
/// An explicit `key` overrides the key derived from the bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBucketSpec {
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub key: Option<String>,
}

/// Smallest `f64` above `v`. Turns an inclusive upper bound into an
/// exclusive one.
fn next_up(v: f64) -> f64 {
    if v.is_nan() || v == f64::INFINITY {
        return v;
    }
    if v == 0.0 {
        return f64::from_bits(1);
    }
    let bits = v.to_bits();
    f64::from_bits(if v > 0.0 { bits + 1 } else { bits - 1 })
}

impl RangeBucketSpec {
    pub const fn new(from: Option<f64>, to: Option<f64>) -> Self {
        Self { from, to, key: None }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.from.map_or(true, |lo| value >= lo) && self.to.map_or(true, |hi| value < hi)
    }

    /// Engine-style bucket key: `1.0-2.0`, `*-1.0`, `5.0-*`.
    pub fn key(&self) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }
        let bound = |b: Option<f64>| b.map_or_else(|| "*".to_string(), |v| format!("{v:?}"));
        format!("{}-{}", bound(self.from), bound(self.to))
    }

    /// This bucket narrowed to the inclusive `window`, or `None` when they do
    /// not overlap. A narrowed bucket keeps its original key.
    pub fn clip(&self, window: &RangeBounds) -> Option<Self> {
        let tighter = |a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64| match (a, b) {
            (Some(a), Some(b)) => Some(pick(a, b)),
            (a, b) => a.or(b),
        };
        let from = tighter(self.from, window.gte, f64::max);
        let to = tighter(self.to, window.lte.map(next_up), f64::min);
        if let (Some(lo), Some(hi)) = (from, to) {
            if lo >= hi {
                return None;
            }
        }
        let key = if from == self.from && to == self.to { self.key.clone() } else { Some(self.key()) };
        Some(Self { from, to, key })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Terms { name: String, field: String, size: usize },
    Range { name: String, field: String, ranges: Vec<RangeBucketSpec> },
}

impl Aggregation {
    pub fn name(&self) -> &str {
        match self {
            Aggregation::Terms { name, .. } | Aggregation::Range { name, .. } => name,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size, .. } => json!({ "terms": { "field": field, "size": size } }),
            Aggregation::Range { field, ranges, .. } => {
                let ranges: Vec<Value> = ranges
                    .iter()
                    .map(|r| {
                        let mut m = Map::new();
                        if let Some(from) = r.from {
                            m.insert("from".into(), json!(from));
                        }
                        if let Some(to) = r.to {
                            m.insert("to".into(), json!(to));
                        }
                        if let Some(key) = &r.key {
                            m.insert("key".into(), json!(key));
                        }
                        Value::Object(m)
                    })
                    .collect();
                json!({ "range": { "field": field, "ranges": ranges } })
            }
        }
    }
}

/// A complete search request for one engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBody {
    pub query: Query,
    pub size: usize,
    pub highlight: Option<Highlight>,
    pub aggregations: Vec<Aggregation>,
}

impl SearchBody {
    pub fn new(query: Query, size: usize) -> Self {
        Self { query, size, highlight: None, aggregations: Vec::new() }
    }

    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = Some(highlight);
        self
    }

    pub fn with_aggregations(mut self, aggregations: Vec<Aggregation>) -> Self {
        self.aggregations = aggregations;
        self
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "size": self.size,
            "query": self.query.to_json(),
            "_source": { "excludes": [VECTOR_FIELD] },
            "track_total_hits": true,
        });
        if let Some(h) = &self.highlight {
            let fields: Map<String, Value> = h.fields.iter().map(|f| (f.clone(), json!({}))).collect();
            body["highlight"] = json!({ "pre_tags": [h.pre_tag], "post_tags": [h.post_tag], "fields": fields });
        }
        if !self.aggregations.is_empty() {
            let aggs: Map<String, Value> =
                self.aggregations.iter().map(|a| (a.name().to_string(), a.to_json())).collect();
            body["aggs"] = Value::Object(aggs);
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_boosts_render_in_caret_form() {
        let rendered: Vec<String> =
            weighted(&[("name", 3.0), ("categories", 1.0), ("x", 0.5)]).iter().map(FieldBoost::render).collect();
        assert_eq!(rendered, ["name^3", "categories", "x^0.5"]);
    }

    #[test]
    fn auto_fuzziness_follows_term_length() {
        let edits: Vec<usize> = [1, 2, 3, 5, 6, 12].iter().map(|n| Fuzziness::Auto.max_edits(*n)).collect();
        assert_eq!(edits, [0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn multi_match_serializes_optional_parts() {
        let q = Query::MultiMatch(
            MultiMatch::best_fields("wireless mouse", weighted(&[("name", 3.0)])).min_match_percent(30).fuzzy(Fuzziness::Auto),
        );
        assert_eq!(
            q.to_json(),
            json!({ "multi_match": {
                "query": "wireless mouse", "fields": ["name^3"], "type": "best_fields",
                "minimum_should_match": "30%", "fuzziness": "AUTO"
            }})
        );
    }

    #[test]
    fn bool_omits_empty_clause_lists() {
        let q = Query::Bool(BoolQuery { must: vec![Query::MatchAll], ..BoolQuery::default() });
        assert_eq!(q.to_json(), json!({ "bool": { "must": [{ "match_all": {} }] } }));
    }

    #[test]
    fn range_bucket_keys_and_membership() {
        let below = RangeBucketSpec::new(None, Some(1.0));
        let mid = RangeBucketSpec::new(Some(4.0), Some(5.0));
        let top = RangeBucketSpec::new(Some(5.0), None);
        assert_eq!((below.key(), mid.key(), top.key()), ("*-1.0".into(), "4.0-5.0".into(), "5.0-*".into()));
        assert!(mid.contains(4.0) && !mid.contains(5.0) && top.contains(5.0));
    }

    #[test]
    fn clipping_drops_disjoint_buckets_and_narrows_the_rest() {
        let window = RangeBounds::new(Some(3.5), Some(5.0));
        assert_eq!(RangeBucketSpec::new(Some(2.0), Some(3.0)).clip(&window), None);
        assert_eq!(RangeBucketSpec::new(None, Some(3.5)).clip(&window), None);

        let partial = RangeBucketSpec::new(Some(3.0), Some(4.0)).clip(&window).expect("overlaps");
        assert_eq!((partial.from, partial.to), (Some(3.5), Some(4.0)));
        assert_eq!(partial.key(), "3.0-4.0");

        let inside = RangeBucketSpec::new(Some(4.0), Some(5.0));
        assert_eq!(inside.clip(&window), Some(inside.clone()));

        let top = RangeBucketSpec::new(Some(5.0), None).clip(&window).expect("holds the upper bound");
        assert!(top.contains(5.0) && !top.contains(5.01));
        assert_eq!(top.key(), "5.0-*");
        assert_eq!(top.clip(&window), Some(top.clone()));
    }

    #[test]
    fn explicit_bucket_key_is_sent_to_the_engine() {
        let mut spec = RangeBucketSpec::new(Some(5.0), Some(6.0));
        spec.key = Some("5.0-*".into());
        let agg = Aggregation::Range { name: "ratings".into(), field: "reviews.rating".into(), ranges: vec![spec] };
        assert_eq!(agg.to_json()["range"]["ranges"][0], json!({ "from": 5.0, "to": 6.0, "key": "5.0-*" }));
    }

    #[test]
    fn body_excludes_vector_and_renders_highlight() {
        let body = SearchBody::new(Query::MatchAll, 10).with_highlight(Highlight {
            fields: vec!["name".into()],
            pre_tag: "<em>".into(),
            post_tag: "</em>".into(),
        });
        let json = body.to_json();
        assert_eq!(json["_source"]["excludes"], json!(["text_vector"]));
        assert_eq!(json["highlight"]["pre_tags"], json!(["<em>"]));
        assert_eq!(json["highlight"]["fields"]["name"], json!({}));
        assert!(json.get("aggs").is_none());
    }

    #[test]
    fn script_source_includes_offset() {
        let script = CosineScript { field: VECTOR_FIELD.into(), vector: vec![1.0], offset: 1.0 };
        assert_eq!(script.source(), "cosineSimilarity(params.query_vector, 'text_vector') + 1.0");
    }
}
