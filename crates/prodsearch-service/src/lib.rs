#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! prodsearch-service
//!
//! The search orchestrator: normalizes the query, compiles filters, embeds
//! when the strategy needs a vector, builds the strategy's query, dispatches
//! it to the index engine and shapes the result.

pub mod params;
pub mod service;

pub use params::SearchParams;
pub use service::SearchService;
