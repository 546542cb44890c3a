//! prodsearch-engine
//!
//! The [`IndexEngine`] capability consumed by the search service, an HTTP
//! client for Elasticsearch-compatible services, and an in-process engine
//! that evaluates the same query descriptors over a document set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use prodsearch_core::Document;
use prodsearch_query::{EngineResponse, SearchBody, SuggestBody};

mod aggs;
pub mod analysis;
pub mod corpus;
pub mod elastic;
pub mod error;
mod highlight;
pub mod memory;
mod scoring;

pub use elastic::ElasticsearchEngine;
pub use error::EngineError;
pub use memory::MemoryEngine;

#[async_trait]
pub trait IndexEngine: Send + Sync {
    async fn search(&self, body: &SearchBody) -> Result<EngineResponse, EngineError>;
    async fn suggest(&self, body: &SuggestBody) -> Result<Vec<String>, EngineError>;
    async fn bulk_index(&self, documents: &[Document]) -> Result<BulkReport, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Outcome of a bulk load. Failed items are reported, never dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    pub indexed: usize,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
