use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::instrument;

use prodsearch_core::config::{SearchSettings, Settings, SuggestSettings};
use prodsearch_core::traits::Embedder;
use prodsearch_core::types::MAX_SIZE;
use prodsearch_core::{normalize_query, Document, Error, Result, SearchRequest, SearchResult};
use prodsearch_engine::{BulkReport, IndexEngine};
use prodsearch_query::{build_search, collect_facets, FilterCompiler, QueryOptions, StrategyInput, SuggestBody};

/// Runs `fut` against an optional deadline.
async fn within<F: Future>(deadline: Option<Instant>, stage: &'static str, fut: F) -> Result<F::Output> {
    match deadline {
        None => Ok(fut.await),
        Some(deadline) if deadline <= Instant::now() => Err(Error::DeadlineExceeded { stage }),
        Some(deadline) => tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), fut)
            .await
            .map_err(|_| Error::DeadlineExceeded { stage }),
    }
}

/// Search orchestration over an injected engine and embedder. Holds no
/// per-call state, so one instance serves concurrent callers.
pub struct SearchService {
    engine: Arc<dyn IndexEngine>,
    embedder: Arc<dyn Embedder>,
    compiler: FilterCompiler,
    options: QueryOptions,
    search: SearchSettings,
    suggest: SuggestSettings,
}

impl SearchService {
    pub fn new(engine: Arc<dyn IndexEngine>, embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        Self {
            engine,
            embedder,
            compiler: FilterCompiler::new(settings.search.range_fields.clone()),
            options: QueryOptions::from(&settings.search),
            search: settings.search.clone(),
            suggest: settings.suggest.clone(),
        }
    }

    #[instrument(skip(self, request), fields(mode = %request.mode, size = request.size))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let start = Instant::now();
        request.validate(self.search.max_size)?;

        let query = normalize_query(&request.query);
        if query.is_empty() {
            tracing::debug!("query normalized to nothing, returning no results");
            return Ok(SearchResult::empty(request.mode));
        }

        let filters = self.compiler.compile(&request.filters)?;
        let vector = if request.mode.needs_embedding() {
            Some(self.embed(&query, request.deadline).await?)
        } else {
            None
        };

        let mut input = StrategyInput::new(&query, &filters, request.size);
        if let Some(v) = vector.as_deref() {
            input = input.with_vector(v);
        }
        let body = build_search(request.mode, &input, &self.options);
        let response = within(request.deadline, "search", self.engine.search(&body)).await??;

        let facets = request.mode.returns_facets().then(|| collect_facets(&response.aggregations));
        tracing::info!(
            query = %query,
            total = response.total,
            hits = response.hits.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(SearchResult { mode: request.mode, total: response.total, hits: response.hits, facets })
    }

    /// Completions for `prefix`; `size` defaults to the configured suggestion size.
    #[instrument(skip(self))]
    pub async fn suggest(&self, prefix: &str, size: Option<usize>) -> Result<Vec<String>> {
        let size = size.unwrap_or(self.suggest.default_size);
        if size == 0 || size > MAX_SIZE {
            return Err(Error::InvalidSize { size, max: MAX_SIZE });
        }
        let body = SuggestBody::new(prefix, &self.suggest.field, size)?;
        Ok(self.engine.suggest(&body).await?)
    }

    pub async fn index(&self, documents: &[Document]) -> Result<BulkReport> {
        Ok(self.engine.bulk_index(documents).await?)
    }

    /// Embeds on the blocking pool; the model call is CPU-bound.
    async fn embed(&self, text: &str, deadline: Option<Instant>) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        let task = tokio::task::spawn_blocking(move || embedder.embed(&text));
        let vector = within(deadline, "embedding", task)
            .await?
            .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
            .map_err(|e| {
                tracing::warn!(error = %e, "embedding failed");
                Error::Embedding(format!("{e:#}"))
            })?;
        tracing::debug!(dim = vector.len(), "query embedded");
        Ok(vector)
    }
}
