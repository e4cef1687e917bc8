//! Storage layer: reference catalog (examples + prompt templates) and vector
//! indexes for retrieval. LanceDB backend behind the `lancedb` feature.

mod catalog;
mod error;
mod index;
pub mod mmr;

pub use catalog::{Catalog, ReferenceStore};
pub use error::StoreError;
pub use index::{MemoryIndex, Passage, VectorIndex};
pub use mmr::MmrParams;

#[cfg(feature = "lancedb")]
mod lance;
#[cfg(feature = "lancedb")]
pub use lance::LanceIndex;
