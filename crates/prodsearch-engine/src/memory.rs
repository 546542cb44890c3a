//! In-process index engine.
//!
//! Holds analyzed documents in memory and evaluates query descriptors the
//! way an Elasticsearch index with an English analyzer would: BM25 over the
//! text fields (`name`, `reviews.text`, `reviews.title`), exact keyword
//! fields, numeric `reviews.rating`, cosine similarity over `text_vector`.
//! Used by tests and offline runs.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tokio::sync::RwLock;

use prodsearch_core::{Document, SearchHit};
use prodsearch_query::{EngineResponse, Query, SearchBody, SuggestBody};

use crate::aggs::aggregate;
use crate::analysis::{Analyzer, Term};
use crate::highlight::{highlight, HighlightTerms};
use crate::scoring::Scorer;
use crate::{BulkFailure, BulkReport, EngineError, IndexEngine};

pub const TEXT_FIELDS: [&str; 3] = ["name", "reviews.text", "reviews.title"];
const COMPLETION_FIELD: &str = "name.completion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text,
    Keyword,
    Numeric,
    Unknown,
}

pub(crate) fn field_kind(field: &str) -> FieldKind {
    match field {
        "name" | "reviews.text" | "reviews.title" => FieldKind::Text,
        "id" | "name.keyword" | "brand" | "categories" | "manufacturer" | "reviews.username" => FieldKind::Keyword,
        "reviews.rating" => FieldKind::Numeric,
        _ => FieldKind::Unknown,
    }
}

/// Raw string values of a text or keyword field. Empty strings are not indexed.
pub(crate) fn string_values<'a>(doc: &'a Document, field: &str) -> Vec<&'a str> {
    let values: Vec<&str> = match field {
        "id" => vec![&doc.id],
        "name" | "name.keyword" => vec![&doc.name],
        "brand" => vec![&doc.brand],
        "categories" => doc.categories.iter().map(String::as_str).collect(),
        "manufacturer" => vec![&doc.manufacturer],
        "reviews.text" => doc.reviews.iter().map(|r| r.text.as_str()).collect(),
        "reviews.title" => doc.reviews.iter().map(|r| r.title.as_str()).collect(),
        "reviews.username" => doc.reviews.iter().map(|r| r.username.as_str()).collect(),
        _ => Vec::new(),
    };
    values.into_iter().filter(|v| !v.is_empty()).collect()
}

pub(crate) fn numeric_values(doc: &Document, field: &str) -> Vec<f64> {
    match field {
        "reviews.rating" => doc.reviews.iter().map(|r| f64::from(r.rating)).collect(),
        _ => Vec::new(),
    }
}

pub(crate) struct AnalyzedValue {
    pub text: String,
    pub terms: Vec<Term>,
}

pub(crate) struct IndexedDoc {
    pub doc: Document,
    pub text: HashMap<&'static str, Vec<AnalyzedValue>>,
}

impl IndexedDoc {
    fn new(doc: Document, analyzer: &Analyzer) -> Self {
        let text = TEXT_FIELDS
            .iter()
            .map(|field| {
                let values = string_values(&doc, field)
                    .into_iter()
                    .map(|v| AnalyzedValue { text: v.to_string(), terms: analyzer.analyze(v) })
                    .collect();
                (*field, values)
            })
            .collect();
        Self { doc, text }
    }

    pub fn values(&self, field: &str) -> &[AnalyzedValue] {
        self.text.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_len(&self, field: &str) -> usize {
        self.values(field).iter().map(|v| v.terms.len()).sum()
    }
}

/// Per-field document frequencies for BM25.
#[derive(Default)]
pub(crate) struct FieldStats {
    pub docs: usize,
    pub total_len: usize,
    pub df: HashMap<String, usize>,
}

impl FieldStats {
    pub fn avg_len(&self) -> f32 {
        if self.docs == 0 {
            1.0
        } else {
            self.total_len as f32 / self.docs as f32
        }
    }

    pub fn df(&self, key: &str) -> usize {
        self.df.get(key).copied().unwrap_or(0)
    }
}

#[derive(Default)]
pub(crate) struct Corpus {
    pub docs: Vec<IndexedDoc>,
    by_id: HashMap<String, usize>,
    pub text_stats: HashMap<&'static str, FieldStats>,
    /// Keyword fields, keyed by lower-cased value.
    pub keyword_stats: HashMap<&'static str, FieldStats>,
    dim: Option<usize>,
}

const KEYWORD_FIELDS: [&str; 5] = ["id", "brand", "categories", "manufacturer", "reviews.username"];

impl Corpus {
    fn upsert(&mut self, doc: IndexedDoc) {
        match self.by_id.get(&doc.doc.id) {
            Some(&slot) => self.docs[slot] = doc,
            None => {
                self.by_id.insert(doc.doc.id.clone(), self.docs.len());
                self.docs.push(doc);
            }
        }
    }

    fn rebuild_stats(&mut self) {
        let mut text_stats: HashMap<&'static str, FieldStats> = HashMap::new();
        let mut keyword_stats: HashMap<&'static str, FieldStats> = HashMap::new();
        for d in &self.docs {
            for field in TEXT_FIELDS {
                let len = d.field_len(field);
                if len == 0 {
                    continue;
                }
                let stats = text_stats.entry(field).or_default();
                stats.docs += 1;
                stats.total_len += len;
                let unique: BTreeSet<&str> = d.values(field).iter().flat_map(|v| v.terms.iter().map(|t| t.stem.as_str())).collect();
                for stem in unique {
                    *stats.df.entry(stem.to_string()).or_insert(0) += 1;
                }
            }
            for field in KEYWORD_FIELDS {
                let unique: BTreeSet<String> = string_values(&d.doc, field).into_iter().map(str::to_string).collect();
                if unique.is_empty() {
                    continue;
                }
                let stats = keyword_stats.entry(field).or_default();
                stats.docs += 1;
                stats.total_len += unique.len();
                for value in unique {
                    *stats.df.entry(value).or_insert(0) += 1;
                }
            }
        }
        self.text_stats = text_stats;
        self.keyword_stats = keyword_stats;
    }
}

/// Ranked by score, ties broken by ascending id.
fn rank(scored: &mut [(f32, &IndexedDoc)]) {
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.doc.id.cmp(&b.1.doc.id)));
}

#[derive(Default)]
pub struct MemoryEngine {
    analyzer: Analyzer,
    corpus: RwLock<Corpus>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine preloaded with `documents`.
    pub async fn with_documents(documents: &[Document]) -> Result<Self, EngineError> {
        let engine = Self::new();
        let report = engine.bulk_index(documents).await?;
        if !report.is_clean() {
            tracing::warn!(failed = report.failed.len(), "some documents were rejected");
        }
        Ok(engine)
    }

    pub async fn len(&self) -> usize {
        self.corpus.read().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IndexEngine for MemoryEngine {
    async fn search(&self, body: &SearchBody) -> Result<EngineResponse, EngineError> {
        let start = Instant::now();
        let corpus = self.corpus.read().await;
        let scorer = Scorer::new(&corpus, &self.analyzer);

        let mut scored: Vec<(f32, &IndexedDoc)> = match &body.query {
            Query::Knn(knn) => scorer.knn(knn)?,
            query => {
                let mut matched = Vec::new();
                for doc in &corpus.docs {
                    if let Some(score) = scorer.eval(query, doc)? {
                        matched.push((score, doc));
                    }
                }
                matched
            }
        };
        rank(&mut scored);

        let aggregations = aggregate(&body.aggregations, scored.iter().map(|(_, d)| *d));
        let terms = body.highlight.as_ref().map(|h| (h, HighlightTerms::collect(&body.query, &self.analyzer)));
        let total = scored.len() as u64;
        let hits = scored
            .into_iter()
            .take(body.size)
            .map(|(score, indexed)| {
                let mut document = indexed.doc.clone();
                document.text_vector.clear();
                let highlight = terms.as_ref().map(|(h, t)| highlight(indexed, h, t)).unwrap_or_default();
                SearchHit { score, document, highlight }
            })
            .collect::<Vec<_>>();
        tracing::debug!(total, returned = hits.len(), elapsed_ms = start.elapsed().as_millis() as u64, "memory search");
        Ok(EngineResponse { total, hits, aggregations })
    }

    async fn suggest(&self, body: &SuggestBody) -> Result<Vec<String>, EngineError> {
        if body.field != COMPLETION_FIELD {
            return Err(EngineError::UnsupportedQuery(format!("no completion structure on '{}'", body.field)));
        }
        let prefix = body.prefix.to_lowercase();
        let corpus = self.corpus.read().await;
        let names: BTreeSet<&str> = corpus
            .docs
            .iter()
            .map(|d| d.doc.name.as_str())
            .filter(|name| name.to_lowercase().starts_with(&prefix))
            .collect();
        Ok(names.into_iter().take(body.size).map(str::to_string).collect())
    }

    async fn bulk_index(&self, documents: &[Document]) -> Result<BulkReport, EngineError> {
        let mut corpus = self.corpus.write().await;
        let mut report = BulkReport::default();
        for doc in documents {
            if doc.id.is_empty() {
                report.failed.push(BulkFailure { id: String::new(), reason: "document has no id".into() });
                continue;
            }
            let dims = doc.text_vector.len();
            if dims > 0 {
                match corpus.dim {
                    Some(expected) if expected != dims => {
                        tracing::warn!(id = %doc.id, dims, expected, "vector dimension mismatch");
                        report.failed.push(BulkFailure {
                            id: doc.id.clone(),
                            reason: format!("text_vector has {dims} dimensions, index expects {expected}"),
                        });
                        continue;
                    }
                    None => corpus.dim = Some(dims),
                    Some(_) => {}
                }
            }
            corpus.upsert(IndexedDoc::new(doc.clone(), &self.analyzer));
            report.indexed += 1;
        }
        corpus.rebuild_stats();
        tracing::info!(indexed = report.indexed, failed = report.failed.len(), "bulk index complete");
        Ok(report)
    }
}
