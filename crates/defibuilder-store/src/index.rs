//! In-memory vector index over reference passages.
//!
//! Holds every passage with its embedding and scores by brute-force cosine
//! similarity, which is plenty for a curated corpus of a few thousand
//! snippets. Persisted as a single JSON file produced by the `index` command.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use defibuilder_core::Embedder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::StoreError;
use crate::mmr::{self, MmrParams};

const EMBED_BATCH_SIZE: usize = 64;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
}

/// Nearest-neighbour search over reference passages.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-`k` passages for `query`. With `diversity`, candidates are
    /// re-ranked by maximal marginal relevance instead of pure similarity.
    async fn search(&self, query: &str, k: usize, diversity: bool)
    -> Result<Vec<Passage>, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedPassage {
    content: String,
    embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    dim: usize,
    passages: Vec<IndexedPassage>,
}

pub struct MemoryIndex {
    embedder: Arc<dyn Embedder>,
    passages: Vec<IndexedPassage>,
    mmr: MmrParams,
}

impl MemoryIndex {
    /// Embed `passages` and build an index over them.
    pub async fn build(
        embedder: Arc<dyn Embedder>,
        passages: Vec<String>,
    ) -> Result<Self, StoreError> {
        let mut indexed = Vec::with_capacity(passages.len());
        for chunk in passages.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let embeddings = embedder
                .embed_batch(&texts)
                .await
                .map_err(StoreError::Embedding)?;
            if embeddings.len() != chunk.len() {
                return Err(StoreError::Other(format!(
                    "embedder returned {} vectors for {} passages",
                    embeddings.len(),
                    chunk.len()
                )));
            }
            indexed.extend(
                chunk
                    .iter()
                    .zip(embeddings)
                    .map(|(content, embedding)| IndexedPassage {
                        content: content.clone(),
                        embedding,
                    }),
            );
        }
        info!(passages = indexed.len(), dim = embedder.dim(), "built memory index");
        Ok(Self {
            embedder,
            passages: indexed,
            mmr: MmrParams::default(),
        })
    }

    /// Load a persisted index. The embedder must produce vectors of the
    /// same dimension the index was built with.
    pub fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        let file: IndexFile = serde_json::from_str(&text)?;
        if file.dim != embedder.dim() {
            return Err(StoreError::DimensionMismatch {
                expected: file.dim,
                actual: embedder.dim(),
            });
        }
        info!(path = %path.display(), passages = file.passages.len(), "loaded memory index");
        Ok(Self {
            embedder,
            passages: file.passages,
            mmr: MmrParams::default(),
        })
    }

    /// Persist the index as JSON.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let file = IndexFile {
            dim: self.embedder.dim(),
            passages: self.passages.clone(),
        };
        std::fs::write(path, serde_json::to_vec(&file)?)?;
        Ok(())
    }

    pub fn with_mmr(mut self, mmr: MmrParams) -> Self {
        self.mmr = mmr;
        self
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
        diversity: bool,
    ) -> Result<Vec<Passage>, StoreError> {
        if self.passages.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(query)
            .await
            .map_err(StoreError::Embedding)?;

        let all: Vec<Vec<f32>> = self.passages.iter().map(|p| p.embedding.clone()).collect();
        let picked = if diversity {
            let fetch = mmr::nearest(&query_vec, &all, self.mmr.fetch_k.max(k));
            let candidates: Vec<Vec<f32>> = fetch.iter().map(|&i| all[i].clone()).collect();
            mmr::select(&query_vec, &candidates, k, self.mmr.lambda)
                .into_iter()
                .map(|j| fetch[j])
                .collect()
        } else {
            mmr::nearest(&query_vec, &all, k)
        };

        debug!(k, diversity, returned = picked.len(), "memory index search");
        Ok(picked
            .into_iter()
            .map(|i| Passage {
                content: self.passages[i].content.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defibuilder_core::{PipelineError, normalize};

    /// Bag-of-keywords embedder: one axis per keyword.
    struct KeywordEmbedder;

    const KEYWORDS: [&str; 4] = ["mint", "burn", "royalty", "vault"];

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn dim(&self) -> usize {
            KEYWORDS.len()
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v: Vec<f32> = KEYWORDS
                        .iter()
                        .map(|k| t.matches(k).count() as f32)
                        .collect();
                    normalize(&mut v);
                    v
                })
                .collect())
        }
    }

    fn corpus() -> Vec<String> {
        vec![
            "mint mint tokens to an address".into(),
            "mint mint mint with a cap".into(),
            "mint with royalty royalty support".into(),
            "vault deposit and withdraw".into(),
        ]
    }

    #[tokio::test]
    async fn plain_search_orders_by_similarity() {
        let index = MemoryIndex::build(Arc::new(KeywordEmbedder), corpus())
            .await
            .unwrap();
        let hits = index.search("mint", 2, false).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.starts_with("mint mint"));
        assert!(hits[1].content.starts_with("mint mint"));
    }

    #[tokio::test]
    async fn diverse_search_covers_another_aspect() {
        let index = MemoryIndex::build(Arc::new(KeywordEmbedder), corpus())
            .await
            .unwrap();
        let hits = index.search("mint royalty", 2, true).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|p| p.content.as_str()).collect();
        assert!(contents.contains(&"mint with royalty royalty support"));
        assert!(
            contents.iter().any(|c| c.starts_with("mint mint")),
            "expected one pure-mint passage, got {contents:?}"
        );
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let index = MemoryIndex::build(Arc::new(KeywordEmbedder), vec![])
            .await
            .unwrap();
        assert!(index.is_empty());
        assert!(index.search("mint", 5, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_and_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        let index = MemoryIndex::build(Arc::new(KeywordEmbedder), corpus())
            .await
            .unwrap();
        index.save(&path).unwrap();

        let loaded = MemoryIndex::load(&path, Arc::new(KeywordEmbedder)).unwrap();
        assert_eq!(loaded.len(), 4);
        let hits = loaded.search("vault", 1, false).await.unwrap();
        assert_eq!(hits[0].content, "vault deposit and withdraw");
    }

    #[tokio::test]
    async fn load_rejects_dimension_mismatch() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        std::fs::write(&path, r#"{"dim": 384, "passages": []}"#).unwrap();
        let result = MemoryIndex::load(&path, Arc::new(KeywordEmbedder));
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch {
                expected: 384,
                actual: 4
            })
        ));
    }
}
