//! HTTP client for an Elasticsearch-compatible search service.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use prodsearch_core::config::EngineSettings;
use prodsearch_core::{Document, SearchHit};
use prodsearch_query::suggest::parse_suggestions;
use prodsearch_query::{EngineResponse, RawAggregation, SearchBody, SuggestBody};

use crate::{BulkFailure, BulkReport, EngineError, IndexEngine};

pub struct ElasticsearchEngine {
    client: Client,
    base_url: String,
    index: String,
    credentials: Option<(String, String)>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
    #[serde(default)]
    aggregations: BTreeMap<String, RawAggregation>,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    total: Option<Total>,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Total {
    value: u64,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(default)]
    highlight: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<BTreeMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl BulkItem {
    fn failure_reason(&self) -> Option<String> {
        if self.status < 300 && self.error.is_none() {
            return None;
        }
        Some(match &self.error {
            Some(err) => err["reason"].as_str().map_or_else(|| err.to_string(), str::to_string),
            None => format!("status {}", self.status),
        })
    }
}

impl ElasticsearchEngine {
    pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
        let client = Client::builder().timeout(Duration::from_millis(settings.timeout_ms)).build()?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            index: settings.index.clone(),
            credentials: settings.credentials().map(|(u, p)| (u.to_string(), p.to_string())),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}/{}", self.base_url, path));
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, EngineError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "engine request failed");
            return Err(EngineError::Status { status: status.as_u16(), body });
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn decode_hit(hit: Hit) -> Result<SearchHit, EngineError> {
        let mut source = hit.source;
        if let Value::Object(map) = &mut source {
            map.entry("id").or_insert_with(|| Value::String(hit.id.clone()));
        }
        let document: Document = serde_json::from_value(source)?;
        Ok(SearchHit { score: hit.score.unwrap_or(0.0), document, highlight: hit.highlight })
    }
}

#[async_trait]
impl IndexEngine for ElasticsearchEngine {
    async fn search(&self, body: &SearchBody) -> Result<EngineResponse, EngineError> {
        let start = Instant::now();
        let path = format!("{}/_search", self.index);
        let raw = self.send(self.request(Method::POST, &path).json(&body.to_json())).await?;
        let parsed: SearchResponse = serde_json::from_value(raw)?;
        let hits = parsed.hits.hits.into_iter().map(Self::decode_hit).collect::<Result<Vec<_>, _>>()?;
        let total = parsed.hits.total.map_or(hits.len() as u64, |t| t.value);
        tracing::debug!(total, returned = hits.len(), elapsed_ms = start.elapsed().as_millis() as u64, "engine search");
        Ok(EngineResponse { total, hits, aggregations: parsed.aggregations })
    }

    async fn suggest(&self, body: &SuggestBody) -> Result<Vec<String>, EngineError> {
        let path = format!("{}/_search", self.index);
        let raw = self.send(self.request(Method::POST, &path).json(&body.to_json())).await?;
        Ok(parse_suggestions(&raw))
    }

    async fn bulk_index(&self, documents: &[Document]) -> Result<BulkReport, EngineError> {
        if documents.is_empty() {
            return Ok(BulkReport::default());
        }
        let mut ndjson = String::new();
        for doc in documents {
            let action = serde_json::json!({ "index": { "_index": self.index, "_id": doc.id } });
            ndjson.push_str(&action.to_string());
            ndjson.push('\n');
            ndjson.push_str(&serde_json::to_string(doc)?);
            ndjson.push('\n');
        }
        let request = self
            .request(Method::POST, "_bulk?refresh=true")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(ndjson);
        let parsed: BulkResponse = serde_json::from_value(self.send(request).await?)?;

        let mut report = BulkReport::default();
        for item in parsed.items.iter().flat_map(BTreeMap::values) {
            match item.failure_reason() {
                Some(reason) => report.failed.push(BulkFailure { id: item.id.clone(), reason }),
                None => report.indexed += 1,
            }
        }
        if !report.is_clean() {
            tracing::warn!(failed = report.failed.len(), "bulk indexing rejected documents");
        }
        tracing::info!(indexed = report.indexed, failed = report.failed.len(), "bulk index complete");
        Ok(report)
    }
}
