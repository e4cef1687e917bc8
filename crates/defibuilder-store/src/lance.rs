//! LanceDB-backed vector index for the reference passage corpus.
//!
//! One table, `passages`, with a `content` text column and a `vector`
//! column of `FixedSizeList<Float32, dim>`. Lance does the nearest-neighbour
//! fetch; MMR re-ranking happens here over the returned vectors.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, FixedSizeListBuilder, Float32Array, Float32Builder,
    LargeStringArray, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use defibuilder_core::Embedder;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::{debug, info};

use crate::mmr::{self, MmrParams};
use crate::{Passage, StoreError, VectorIndex};

const PASSAGES_TABLE: &str = "passages";
const EMBED_BATCH_SIZE: usize = 64;

pub struct LanceIndex {
    db: lancedb::Connection,
    embedder: Arc<dyn Embedder>,
    mmr: MmrParams,
}

impl LanceIndex {
    /// Connect to a LanceDB database at the given path.
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, StoreError> {
        let uri = path
            .to_str()
            .ok_or_else(|| StoreError::Other("non-UTF8 database path".into()))?;
        let db = lancedb::connect(uri).execute().await?;
        Ok(Self {
            db,
            embedder,
            mmr: MmrParams::default(),
        })
    }

    pub fn with_mmr(mut self, mmr: MmrParams) -> Self {
        self.mmr = mmr;
        self
    }

    /// Embed `passages` and (re)create the `passages` table from them.
    pub async fn index_passages(&self, passages: &[String]) -> Result<usize, StoreError> {
        if passages.is_empty() {
            return Err(StoreError::Other("no passages provided".into()));
        }

        let dim = self.embedder.dim();
        let schema = Arc::new(Schema::new(vec![
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dim as i32,
                ),
                true,
            ),
        ]));

        let mut batches = Vec::new();
        for chunk in passages.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = chunk.iter().map(String::as_str).collect();
            let embeddings = self
                .embedder
                .embed_batch(&texts)
                .await
                .map_err(StoreError::Embedding)?;

            let mut vectors = FixedSizeListBuilder::new(Float32Builder::new(), dim as i32);
            for emb in &embeddings {
                if emb.len() != dim {
                    return Err(StoreError::DimensionMismatch {
                        expected: dim,
                        actual: emb.len(),
                    });
                }
                vectors.values().append_slice(emb);
                vectors.append(true);
            }

            batches.push(RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from(texts)),
                    Arc::new(vectors.finish()),
                ],
            )?);
        }

        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

        // Drop existing table if it exists, then create fresh.
        let existing = self.db.table_names().execute().await?;
        if existing.iter().any(|name| name == PASSAGES_TABLE) {
            self.db.drop_table(PASSAGES_TABLE, &[]).await?;
        }
        self.db
            .create_table(PASSAGES_TABLE, Box::new(reader))
            .execute()
            .await?;

        info!(table = PASSAGES_TABLE, rows = passages.len(), "created LanceDB passages table");
        Ok(passages.len())
    }

    /// Count rows in the `passages` table.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let table = self.db.open_table(PASSAGES_TABLE).execute().await?;
        Ok(table.count_rows(None).await?)
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn search(
        &self,
        query: &str,
        k: usize,
        diversity: bool,
    ) -> Result<Vec<Passage>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(query)
            .await
            .map_err(StoreError::Embedding)?;

        let fetch = if diversity { self.mmr.fetch_k.max(k) } else { k };
        let table = self.db.open_table(PASSAGES_TABLE).execute().await?;
        let batches: Vec<RecordBatch> = table
            .vector_search(query_vec.as_slice())?
            .column("vector")
            .limit(fetch)
            .execute()
            .await?
            .try_collect()
            .await?;

        let (contents, vectors) = extract_rows(&batches)?;
        let picked = if diversity {
            mmr::select(&query_vec, &vectors, k, self.mmr.lambda)
        } else {
            // Lance already returns nearest first.
            (0..contents.len().min(k)).collect()
        };

        debug!(k, diversity, fetched = contents.len(), "lance search");
        Ok(picked
            .into_iter()
            .map(|i| Passage {
                content: contents[i].clone(),
            })
            .collect())
    }
}

/// Pull `content` and `vector` columns out of search result batches.
fn extract_rows(batches: &[RecordBatch]) -> Result<(Vec<String>, Vec<Vec<f32>>), StoreError> {
    let mut contents = Vec::new();
    let mut vectors = Vec::new();

    for batch in batches {
        let content_col = batch
            .column_by_name("content")
            .ok_or_else(|| StoreError::Other("missing 'content' column".into()))?;
        let vector_col = batch
            .column_by_name("vector")
            .ok_or_else(|| StoreError::Other("missing 'vector' column".into()))?;

        let fsl = vector_col
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| StoreError::Other("vector column is not FixedSizeList".into()))?;

        for row in 0..batch.num_rows() {
            let Some(text) = get_string(content_col.as_ref(), row) else {
                continue;
            };
            let values = fsl.value(row);
            let vector = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| StoreError::Other("vector values are not Float32".into()))?;
            contents.push(text);
            vectors.push(vector.values().to_vec());
        }
    }

    Ok((contents, vectors))
}

/// Handles both `Utf8` and `LargeUtf8` text columns.
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        Some(arr.value(row).to_string())
    } else {
        col.as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|arr| arr.value(row).to_string())
    }
}
