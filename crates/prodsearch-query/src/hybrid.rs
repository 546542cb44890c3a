//! Hybrid scoring policy.
//!
//! A document must pass the lexical gate (best-fields match on at least
//! [`LEXICAL_GATE_MIN_MATCH`] percent of query terms) to be returned at all.
//! Its score is then the lexical score plus an exact-phrase bonus plus
//! `VECTOR_WEIGHT * (cosine + VECTOR_SCORE_OFFSET)`. The offset keeps the
//! script score non-negative and shifts every gated document equally.

use crate::dsl::{weighted, BoolQuery, CosineScript, MultiMatch, Query, SearchBody, VECTOR_FIELD};
use crate::filter::to_queries;
use crate::strategy::{lexical_match, QueryOptions, StrategyInput};

pub const LEXICAL_GATE_MIN_MATCH: u8 = 30;
pub const PHRASE_FIELDS: [(&str, f64); 5] =
    [("name", 4.0), ("brand", 3.0), ("categories", 2.0), ("reviews.text", 1.0), ("reviews.title", 2.0)];
pub const PHRASE_WEIGHT: f64 = 2.0;
pub const VECTOR_WEIGHT: f64 = 0.5;
pub const VECTOR_SCORE_OFFSET: f64 = 1.0;

const HIGHLIGHT: [&str; 3] = ["name", "reviews.text", "reviews.title"];

pub(crate) fn hybrid(input: &StrategyInput<'_>, options: &QueryOptions) -> SearchBody {
    let mut should = vec![Query::MultiMatch(MultiMatch::phrase(input.query, weighted(&PHRASE_FIELDS)).boost(PHRASE_WEIGHT))];
    match input.usable_vector() {
        Some(vector) => should.push(Query::ScriptScore {
            query: Box::new(Query::MatchAll),
            script: CosineScript { field: VECTOR_FIELD.into(), vector: vector.to_vec(), offset: VECTOR_SCORE_OFFSET },
            boost: VECTOR_WEIGHT,
        }),
        None => tracing::debug!("zero query vector, hybrid search runs without the vector clause"),
    }
    let query = Query::Bool(BoolQuery {
        must: vec![Query::MultiMatch(lexical_match(input.query, LEXICAL_GATE_MIN_MATCH))],
        should,
        filter: to_queries(input.filters),
        ..BoolQuery::default()
    });
    SearchBody::new(query, input.size).with_highlight(options.highlight(&HIGHLIGHT))
}
