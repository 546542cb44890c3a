use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use prodsearch_core::config::{Config, Settings};
use prodsearch_core::traits::Embedder;
use prodsearch_core::Document;
use prodsearch_embed::get_default_embedder;
use prodsearch_engine::corpus::load_jsonl;
use prodsearch_engine::{BulkReport, ElasticsearchEngine, IndexEngine, MemoryEngine};
use prodsearch_service::params::{MAX_RATING, MIN_RATING};
use prodsearch_service::{SearchParams, SearchService};

const INDEX_BATCH: usize = 64;

#[derive(Parser)]
#[command(name = "prodsearch", about = "Product search over an Elasticsearch-compatible index")]
struct Cli {
    /// Engine that serves the queries
    #[arg(long, value_enum, default_value_t = EngineKind::Elastic)]
    engine: EngineKind,
    /// JSON Lines catalog loaded into the in-process engine at startup
    #[arg(long, env = "APP_CORPUS")]
    corpus: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineKind {
    Elastic,
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search and print the result as JSON
    Search {
        query: String,
        /// basic, fuzzy, faceted, semantic or hybrid
        #[arg(long, default_value = "basic")]
        mode: String,
        #[arg(long)]
        category: Vec<String>,
        #[arg(long)]
        brand: Vec<String>,
        #[arg(long)]
        manufacturer: Option<String>,
        #[arg(long, default_value_t = MIN_RATING)]
        min_rating: f64,
        #[arg(long, default_value_t = MAX_RATING)]
        max_rating: f64,
        #[arg(long)]
        size: Option<usize>,
        /// Abort the search after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Complete a product-name prefix
    Suggest {
        prefix: String,
        #[arg(long)]
        size: Option<usize>,
    },
    /// Bulk-index a JSON Lines catalog, embedding products that lack a vector
    Index { path: PathBuf },
}

/// Text a product vector is computed from.
fn embedding_text(doc: &Document) -> String {
    let reviews: Vec<&str> = doc.reviews.iter().map(|r| r.text.as_str()).collect();
    format!("{} {} {} {}", doc.name, doc.brand, doc.categories.join(" "), reviews.join(" "))
}

fn fill_vectors(docs: &mut [Document], embedder: &dyn Embedder) -> Result<()> {
    let missing: Vec<usize> = docs.iter().enumerate().filter(|(_, d)| d.text_vector.is_empty()).map(|(i, _)| i).collect();
    if missing.is_empty() {
        return Ok(());
    }
    let texts: Vec<String> = missing.iter().map(|&i| embedding_text(&docs[i])).collect();
    let vectors = tokio::task::block_in_place(|| embedder.embed_batch(&texts)).context("embedding products")?;
    for (i, vector) in missing.into_iter().zip(vectors) {
        docs[i].text_vector = vector;
    }
    Ok(())
}

async fn load_into(engine: &MemoryEngine, path: &Path, embedder: &dyn Embedder) -> Result<()> {
    let mut docs = load_jsonl(path)?;
    fill_vectors(&mut docs, embedder)?;
    let report = engine.bulk_index(&docs).await?;
    if !report.is_clean() {
        tracing::warn!(failed = report.failed.len(), "some products were not loaded");
    }
    Ok(())
}

async fn open_engine(cli: &Cli, settings: &Settings, embedder: &dyn Embedder) -> Result<Arc<dyn IndexEngine>> {
    match cli.engine {
        EngineKind::Elastic => Ok(Arc::new(ElasticsearchEngine::new(&settings.engine)?)),
        EngineKind::Memory => {
            let engine = MemoryEngine::new();
            match &cli.corpus {
                Some(path) => load_into(&engine, path, embedder).await?,
                None => tracing::warn!("in-process engine started without --corpus"),
            }
            Ok(Arc::new(engine))
        }
    }
}

async fn index(service: &SearchService, path: &Path, embedder: &dyn Embedder) -> Result<BulkReport> {
    let mut docs = load_jsonl(path)?;
    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} products ({eta})")?
            .progress_chars("#>-"),
    );

    let mut total = BulkReport::default();
    for batch in docs.chunks_mut(INDEX_BATCH) {
        fill_vectors(batch, embedder)?;
        let report = service.index(batch).await?;
        total.indexed += report.indexed;
        total.failed.extend(report.failed);
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("done");
    Ok(total)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Config::load().and_then(|c| c.settings()).context("loading configuration")?;
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.embedding)?);
    let engine = open_engine(&cli, &settings, embedder.as_ref()).await?;
    let service = SearchService::new(engine, Arc::clone(&embedder), &settings);

    match cli.command {
        Commands::Search { query, mode, category, brand, manufacturer, min_rating, max_rating, size, deadline_ms } => {
            let params = SearchParams {
                query,
                mode,
                category,
                brand,
                manufacturer,
                min_rating,
                max_rating,
                size: size.unwrap_or(settings.search.default_size),
            };
            let mut request = params.into_request()?;
            if let Some(ms) = deadline_ms {
                request = request.with_deadline(Instant::now() + Duration::from_millis(ms));
            }
            let result = service.search(&request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Suggest { prefix, size } => {
            let suggestions = service.suggest(&prefix, size).await?;
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }
        Commands::Index { path } => {
            let report = index(&service, &path, embedder.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                anyhow::bail!("{} of {} products failed to index", report.failed.len(), report.indexed + report.failed.len());
            }
        }
    }
    Ok(())
}
