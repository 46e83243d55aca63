use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::error::RetrievalError;

/// Local sentence embeddings, loaded on first use and reused afterwards
#[derive(Clone, Default)]
pub struct Embedder {
    model: Arc<Mutex<Option<TextEmbedding>>>,
}

impl Embedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let slot = self.model.clone();

        // ONNX inference is CPU bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| RetrievalError::Embedding("embedding model lock poisoned".into()))?;

            if guard.is_none() {
                info!("Loading embedding model");
                let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
                    .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
                *guard = Some(model);
            }
            let Some(model) = guard.as_mut() else {
                return Err(RetrievalError::Embedding("embedding model unavailable".into()));
            };

            model
                .embed(texts, None)
                .map_err(|e| RetrievalError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| RetrievalError::Embedding(e.to_string()))?
    }

    /// Keep the `k` documents closest to `query`, most similar first
    pub async fn rank<T>(
        &self,
        query: &str,
        documents: Vec<(String, T)>,
        k: usize,
    ) -> Result<Vec<T>, RetrievalError> {
        if documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut texts = Vec::with_capacity(documents.len() + 1);
        texts.push(query.to_string());
        texts.extend(documents.iter().map(|(text, _)| text.clone()));

        let mut vectors = self.embed(texts).await?;
        if vectors.len() != documents.len() + 1 {
            return Err(RetrievalError::Embedding(format!(
                "expected {} embeddings, got {}",
                documents.len() + 1,
                vectors.len()
            )));
        }
        let query_vector = vectors.remove(0);

        let order = top_k_by_similarity(&query_vector, &vectors, k);
        let mut slots: Vec<Option<T>> = documents.into_iter().map(|(_, doc)| Some(doc)).collect();
        Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Indices of the `k` candidates most similar to `query`, best first
pub(crate) fn top_k_by_similarity(query: &[f32], candidates: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}
