//! Text embedding seam shared by the vector indexes and the AI clients.

use async_trait::async_trait;

use crate::PipelineError;

/// Produces L2-normalized embedding vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality.
    fn dim(&self) -> usize;

    /// Embed a batch of texts, returning one normalized vector per input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PipelineError::transport(crate::Service::Embeddings, "empty embedding response")
            })
    }
}

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity. Vectors of different length compare over the shared prefix.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_gives_unit_norm() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector_is_noop() {
        let mut v = vec![0.0; 4];
        normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn cosine_of_orthogonal_and_parallel() {
        assert_eq!(cosine_sim(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_sim(&[2.0, 0.0], &[5.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_sim(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    struct Fixed;

    #[async_trait]
    impl Embedder for Fixed {
        fn dim(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn embed_defaults_to_single_batch() {
        assert_eq!(Fixed.embed("anything").await.unwrap(), vec![1.0, 0.0]);
    }
}
