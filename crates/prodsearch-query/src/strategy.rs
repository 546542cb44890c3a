//! Retrieval strategy builders, one per [`SearchMode`].
//!
//! Each builder is a pure function of the normalized query, the compiled
//! filter clauses, the result size and (for vector modes) the query
//! embedding. Compiled filters are attached as non-scoring clauses in every
//! mode.

use prodsearch_core::config::SearchSettings;
use prodsearch_core::normalize::term_count;
use prodsearch_core::SearchMode;

use crate::dsl::{weighted, BoolQuery, Fuzziness, Highlight, Knn, MultiMatch, Query, SearchBody, VECTOR_FIELD};
use crate::facets::{facet_aggregations, RATING_FIELD};
use crate::filter::{to_queries, FilterClause};
use crate::hybrid;

/// Weighting shared by the best-fields match of every lexical strategy.
pub const LEXICAL_FIELDS: [(&str, f64); 5] =
    [("name", 3.0), ("brand", 2.0), ("categories", 1.0), ("reviews.text", 1.0), ("reviews.title", 2.0)];
pub const PREFIX_FIELDS: [(&str, f64); 3] = [("name", 1.0), ("reviews.title", 1.0), ("reviews.text", 1.0)];

pub const NAME_PHRASE_BOOST: f64 = 5.0;
pub const BRAND_PHRASE_BOOST: f64 = 4.0;
pub const LEXICAL_MIN_MATCH: u8 = 30;
/// Phrase-prefix is only added for queries shorter than this many terms.
pub const PREFIX_MAX_TERMS: usize = 3;
pub const SEMANTIC_PREFILTER_MIN_MATCH: u8 = 20;

const BASIC_HIGHLIGHT: [&str; 4] = ["name", "brand", "reviews.text", "reviews.title"];

/// Engine-facing knobs taken from `[search]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub num_candidates: usize,
    pub facet_size: usize,
    pub lexical_prefilter: bool,
    pub pre_tag: String,
    pub post_tag: String,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from(&SearchSettings::default())
    }
}

impl From<&SearchSettings> for QueryOptions {
    fn from(s: &SearchSettings) -> Self {
        Self {
            num_candidates: s.num_candidates,
            facet_size: s.facet_size,
            lexical_prefilter: s.lexical_prefilter,
            pre_tag: s.highlight_pre_tag.clone(),
            post_tag: s.highlight_post_tag.clone(),
        }
    }
}

impl QueryOptions {
    pub(crate) fn highlight(&self, fields: &[&str]) -> Highlight {
        Highlight {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            pre_tag: self.pre_tag.clone(),
            post_tag: self.post_tag.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub query: &'a str,
    pub filters: &'a [FilterClause],
    pub size: usize,
    /// Query embedding; `None` or all zeros means no usable vector.
    pub vector: Option<&'a [f32]>,
}

impl<'a> StrategyInput<'a> {
    pub fn new(query: &'a str, filters: &'a [FilterClause], size: usize) -> Self {
        Self { query, filters, size, vector: None }
    }

    pub fn with_vector(mut self, vector: &'a [f32]) -> Self {
        self.vector = Some(vector);
        self
    }

    /// The embedding, unless it is missing or the zero vector.
    pub fn usable_vector(&self) -> Option<&'a [f32]> {
        self.vector.filter(|v| v.iter().any(|x| *x != 0.0))
    }
}

pub fn build_search(mode: SearchMode, input: &StrategyInput<'_>, options: &QueryOptions) -> SearchBody {
    tracing::debug!(%mode, terms = term_count(input.query), filters = input.filters.len(), "building query");
    match mode {
        SearchMode::Basic => basic(input, options),
        SearchMode::Fuzzy => fuzzy(input),
        SearchMode::Faceted => faceted(input, options),
        SearchMode::Semantic => semantic(input, options),
        SearchMode::Hybrid => hybrid::hybrid(input, options),
    }
}

pub(crate) fn lexical_match(query: &str, min_match: u8) -> MultiMatch {
    MultiMatch::best_fields(query, weighted(&LEXICAL_FIELDS)).min_match_percent(min_match)
}

fn basic(input: &StrategyInput<'_>, options: &QueryOptions) -> SearchBody {
    let q = input.query;
    let mut should = vec![
        Query::MatchPhrase { field: "name".into(), query: q.into(), boost: NAME_PHRASE_BOOST },
        Query::MatchPhrase { field: "brand".into(), query: q.into(), boost: BRAND_PHRASE_BOOST },
        Query::MultiMatch(lexical_match(q, LEXICAL_MIN_MATCH)),
    ];
    if term_count(q) < PREFIX_MAX_TERMS {
        should.push(Query::MultiMatch(MultiMatch::phrase_prefix(q, weighted(&PREFIX_FIELDS))));
    }
    let query = Query::Bool(BoolQuery {
        should,
        filter: to_queries(input.filters),
        minimum_should_match: Some(1),
        ..BoolQuery::default()
    });
    SearchBody::new(query, input.size).with_highlight(options.highlight(&BASIC_HIGHLIGHT))
}

fn fuzzy(input: &StrategyInput<'_>) -> SearchBody {
    let query = Query::Bool(BoolQuery {
        must: vec![Query::MultiMatch(MultiMatch::best_fields(input.query, weighted(&LEXICAL_FIELDS)).fuzzy(Fuzziness::Auto))],
        filter: to_queries(input.filters),
        ..BoolQuery::default()
    });
    SearchBody::new(query, input.size)
}

fn faceted(input: &StrategyInput<'_>, options: &QueryOptions) -> SearchBody {
    let query = Query::Bool(BoolQuery {
        must: vec![Query::MultiMatch(MultiMatch::best_fields(input.query, weighted(&LEXICAL_FIELDS)))],
        filter: to_queries(input.filters),
        ..BoolQuery::default()
    });
    let rating_window = input.filters.iter().find_map(|clause| match clause {
        FilterClause::Range { field, bounds } if field == RATING_FIELD => Some(bounds),
        _ => None,
    });
    SearchBody::new(query, input.size).with_aggregations(facet_aggregations(options.facet_size, rating_window))
}

fn semantic(input: &StrategyInput<'_>, options: &QueryOptions) -> SearchBody {
    let prefilter = Query::MultiMatch(lexical_match(input.query, SEMANTIC_PREFILTER_MIN_MATCH));
    let query = match input.usable_vector() {
        Some(vector) => {
            let mut filter = Vec::with_capacity(input.filters.len() + 1);
            if options.lexical_prefilter {
                filter.push(prefilter);
            }
            filter.extend(to_queries(input.filters));
            Query::Knn(Knn {
                field: VECTOR_FIELD.into(),
                vector: vector.to_vec(),
                k: input.size,
                num_candidates: options.num_candidates.max(input.size),
                filter,
            })
        }
        None => {
            tracing::debug!("zero query vector, semantic search runs on the lexical prefilter");
            Query::Bool(BoolQuery { must: vec![prefilter], filter: to_queries(input.filters), ..BoolQuery::default() })
        }
    };
    SearchBody::new(query, input.size)
}
