#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::{FilterSpec, FilterValue, RangeBounds, Scalar};
pub use normalize::normalize_query;
pub use types::{
    Document, FacetBucket, FacetSet, RatingBucket, Review, SearchHit, SearchMode, SearchRequest,
    SearchResult,
};
