//! prodsearch-query
//!
//! Turns a normalized query, compiled filters and a retrieval mode into an
//! index query descriptor, and turns index responses back into facets and
//! suggestions. Everything here is pure: no I/O, no shared state.

pub mod dsl;
pub mod facets;
pub mod filter;
pub mod hybrid;
pub mod response;
pub mod strategy;
pub mod suggest;

pub use dsl::{Aggregation, BoolQuery, FieldBoost, Highlight, MatchKind, MultiMatch, Query, SearchBody};
pub use facets::collect_facets;
pub use filter::{FilterClause, FilterCompiler};
pub use response::{EngineResponse, RawAggregation, RawBucket};
pub use strategy::{build_search, QueryOptions, StrategyInput};
pub use suggest::SuggestBody;
