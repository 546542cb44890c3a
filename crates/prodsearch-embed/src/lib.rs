//! prodsearch-embed
//!
//! Embedding providers: a local all-MiniLM-L6-v2 sentence encoder on candle,
//! a deterministic hashing embedder for tests and development, and the input
//! guard every provider is wrapped in (zero vector for near-empty input,
//! truncation of oversized input).

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use prodsearch_core::config::EmbeddingSettings;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use prodsearch_core::traits::Embedder;

const MAX_TOKENS: usize = 256;

pub struct MiniLmModel { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize }

impl MiniLmModel {
    pub fn load(model_dir: &Path, dim: usize) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence encoder");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?)?;
        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // SAFETY: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DTYPE, &device)? }
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path)
                .with_context(|| format!("reading {}", weights_path.display()))?;
            let weights_map: std::collections::HashMap<String, candle_core::Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, DType::F32, &device)
        };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(dim, "sentence encoder loaded");
        Ok(Self { model, tokenizer, device, dim })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, token_type_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, MAX_TOKENS, &self.device)?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        anyhow::ensure!(emb.len() == self.dim, "model produced {} dims, expected {}", emb.len(), self.dim);
        if start.elapsed().as_millis() > 100 { tracing::warn!(elapsed_ms = start.elapsed().as_millis() as u64, "slow embedding"); }
        Ok(emb)
    }
}

impl Embedder for MiniLmModel {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { MAX_TOKENS }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_one(t)).collect() }
}

/// Hashes whitespace tokens into buckets of an L2-normalized vector. Texts
/// sharing tokens land close together; identical input gives identical output.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder { pub fn new(dim: usize) -> Self { Self { dim } } }

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { MAX_TOKENS }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        Ok(texts.iter().map(|text| {
            let mut v = vec![0f32; self.dim];
            for (i, token) in text.split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += val + (i as f32 % 3.0) * 0.01; }
            let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
        }).collect())
    }
}

/// Wraps a provider with the input contract: text is trimmed and
/// lower-cased, input shorter than `min_chars` embeds to the zero vector
/// without calling the model, and input longer than `max_chars` is truncated.
pub struct GuardedEmbedder { inner: Box<dyn Embedder>, min_chars: usize, max_chars: usize }

impl GuardedEmbedder {
    pub fn new(inner: Box<dyn Embedder>, settings: &EmbeddingSettings) -> Self {
        Self { inner, min_chars: settings.min_input_chars, max_chars: settings.max_input_chars }
    }

    /// The text actually sent to the model, or `None` for the zero vector.
    pub fn prepare(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars { return None; }
        let lowered = trimmed.to_lowercase();
        Some(if lowered.chars().count() > self.max_chars { lowered.chars().take(self.max_chars).collect() } else { lowered })
    }
}

impl Embedder for GuardedEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<Option<String>> = texts.iter().map(|t| self.prepare(t)).collect();
        let to_embed: Vec<String> = prepared.iter().flatten().cloned().collect();
        let mut embedded = (if to_embed.is_empty() { Vec::new() } else { self.inner.embed_batch(&to_embed)? }).into_iter();
        let dim = self.dim();
        prepared.iter().map(|p| match p {
            None => Ok(vec![0.0; dim]),
            Some(_) => {
                let v = embedded.next().ok_or_else(|| anyhow!("embedder returned fewer vectors than inputs"))?;
                anyhow::ensure!(v.len() == dim, "embedder returned {} dims, expected {}", v.len(), dim);
                Ok(v)
            }
        }).collect()
    }
}

/// Build the configured provider, wrapped in [`GuardedEmbedder`].
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the hashing embedder.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let forced = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let inner: Box<dyn Embedder> = if settings.use_fake || forced {
        tracing::info!(dim = settings.dimension, "using FakeEmbedder");
        Box::new(FakeEmbedder::new(settings.dimension))
    } else {
        Box::new(MiniLmModel::load(&resolve_model_dir(settings)?, settings.dimension)?)
    };
    Ok(Box::new(GuardedEmbedder::new(inner, settings)))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    let configured = settings.model_path();
    if configured.exists() { return Ok(configured); }
    let name = settings.model.rsplit('/').next().unwrap_or(&settings.model);
    let local = Path::new("models").join(name);
    if local.exists() { tracing::info!(dir = %local.display(), "using local model dir"); return Ok(local); }
    Err(anyhow!("Could not locate model directory for {} (tried {} and {})", settings.model, configured.display(), local.display()))
}
