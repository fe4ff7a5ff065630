use crate::{Chunk, ModelError, RetrievedChunk, StoreError};
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Ids of every chunk already persisted in this index.
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError>;

    async fn add_chunks(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError>;

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError>;
}
