//! Loading product documents from JSON Lines files.
//!
//! Reviews without text are dropped and products left with no reviews are
//! skipped, matching what the index expects.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use prodsearch_core::Document;

pub fn load_jsonl(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut documents = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document", path.display(), line_no + 1))?;
        doc.reviews.retain(|r| !r.text.trim().is_empty());
        if doc.reviews.is_empty() {
            skipped += 1;
            continue;
        }
        documents.push(doc);
    }
    if skipped > 0 {
        tracing::warn!(skipped, path = %path.display(), "skipped products without reviews");
    }
    tracing::info!(documents = documents.len(), path = %path.display(), "loaded corpus");
    Ok(documents)
}
