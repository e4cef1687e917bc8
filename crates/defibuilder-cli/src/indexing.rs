//! `index` command: embed a passage corpus into a vector index.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use defibuilder_core::Embedder;
use defibuilder_store::{MemoryIndex, VectorIndex};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusEntry {
    Text(String),
    Passage { content: String },
}

/// Read a JSON array of passages. Blank passages are dropped.
pub fn read_corpus(path: &Path) -> anyhow::Result<Vec<String>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading corpus {}", path.display()))?;
    parse_corpus(&text).with_context(|| format!("parsing corpus {}", path.display()))
}

fn parse_corpus(text: &str) -> anyhow::Result<Vec<String>> {
    let entries: Vec<CorpusEntry> = serde_json::from_str(text)?;
    Ok(entries
        .into_iter()
        .map(|e| match e {
            CorpusEntry::Text(s) | CorpusEntry::Passage { content: s } => s,
        })
        .filter(|s| !s.trim().is_empty())
        .collect())
}

pub async fn write_json(
    out: &Path,
    embedder: Arc<dyn Embedder>,
    passages: Vec<String>,
) -> anyhow::Result<usize> {
    let start = Instant::now();
    let index = MemoryIndex::build(embedder, passages)
        .await
        .context("embedding passages")?;
    index
        .save(out)
        .with_context(|| format!("writing index {}", out.display()))?;
    eprintln!(
        "  Embedded {} passages in {:.1}s",
        index.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(index.len())
}

#[cfg(feature = "lancedb")]
pub async fn write_lance(
    out: &Path,
    embedder: Arc<dyn Embedder>,
    passages: &[String],
) -> anyhow::Result<usize> {
    let index = defibuilder_store::LanceIndex::open(out, embedder)
        .await
        .with_context(|| format!("opening LanceDB at {}", out.display()))?;
    Ok(index
        .index_passages(passages)
        .await
        .context("writing passages table")?)
}

#[cfg(not(feature = "lancedb"))]
pub async fn write_lance(
    _out: &Path,
    _embedder: Arc<dyn Embedder>,
    _passages: &[String],
) -> anyhow::Result<usize> {
    anyhow::bail!("LanceDB support not compiled in; rebuild with --features lancedb")
}

#[cfg(feature = "lancedb")]
pub async fn open_lance(
    path: &Path,
    embedder: Arc<dyn Embedder>,
) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let index = defibuilder_store::LanceIndex::open(path, embedder)
        .await
        .with_context(|| format!("opening LanceDB at {}", path.display()))?;
    Ok(Arc::new(index))
}

#[cfg(not(feature = "lancedb"))]
pub async fn open_lance(
    path: &Path,
    _embedder: Arc<dyn Embedder>,
) -> anyhow::Result<Arc<dyn VectorIndex>> {
    anyhow::bail!(
        "{} is a LanceDB directory but LanceDB support is not compiled in",
        path.display()
    )
}
