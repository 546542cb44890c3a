use anyhow::anyhow;

/// Maps text to a fixed-width vector. Implementations must be deterministic
/// for a given model and input, and every vector they return has `dim()`
/// components.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }
}
