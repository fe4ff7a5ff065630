use crate::traits::VectorIndex;
use crate::{Chunk, Language, RetrievedChunk, StoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

const SCROLL_PAGE: usize = 256;

/// Remote store keeping each language in its own Qdrant collection.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: Option<usize>,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size: None,
        }
    }

    pub fn for_language(endpoint: impl Into<String>, prefix: &str, language: Language) -> Self {
        Self::new(endpoint, format!("{prefix}_{}", language.tag()))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    /// Creates the collection with cosine distance unless it already exists.
    pub async fn ensure_collection(&mut self, vector_size: usize) -> Result<(), StoreError> {
        if self.vector_size == Some(vector_size) {
            return Ok(());
        }

        let response = self.client.get(self.collection_url()).send().await?;
        if response.status().is_success() {
            let parsed: Value = response.json().await?;
            let existing = parsed
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64)
                .map(|size| size as usize);
            if let Some(existing) = existing {
                if existing != vector_size {
                    return Err(StoreError::Request(format!(
                        "collection {} has vector size {} but embeddings have {}",
                        self.collection, existing, vector_size
                    )));
                }
            }
            self.vector_size = Some(vector_size);
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        info!(collection = %self.collection, vector_size, "created qdrant collection");
        self.vector_size = Some(vector_size);
        Ok(())
    }

    /// Drops the collection. Returns whether it existed.
    pub async fn reset(&mut self) -> Result<bool, StoreError> {
        let response = self.client.delete(self.collection_url()).send().await?;
        self.vector_size = None;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        let removed = parsed.pointer("/result").and_then(Value::as_bool).unwrap_or(true);
        info!(collection = %self.collection, removed, "deleted qdrant collection");
        Ok(removed)
    }
}

/// Qdrant only accepts integers or UUIDs as point ids.
pub fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes()).to_string()
}

fn backend_error(status: StatusCode) -> StoreError {
    StoreError::BackendResponse {
        backend: "qdrant".to_string(),
        details: status.to_string(),
    }
}

fn scroll_page(parsed: &Value) -> (Vec<String>, Option<Value>) {
    let ids = parsed
        .pointer("/result/points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(|point| point.pointer("/payload/chunk_id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let next = parsed
        .pointer("/result/next_page_offset")
        .filter(|offset| !offset.is_null())
        .cloned();

    (ids, next)
}

fn hits_from_response(parsed: &Value) -> Vec<RetrievedChunk> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.iter()
        .map(|hit| {
            let text_field = |name: &str| {
                hit.pointer(&format!("/payload/{name}"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            RetrievedChunk {
                chunk_id: text_field("chunk_id"),
                source: text_field("source"),
                page: hit
                    .pointer("/payload/page")
                    .and_then(Value::as_u64)
                    .unwrap_or_default() as u32,
                text: text_field("text"),
                score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
            }
        })
        .collect()
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let mut ids = HashSet::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": ["chunk_id"],
                "with_vector": false,
            });
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let response = self
                .client
                .post(format!("{}/points/scroll", self.collection_url()))
                .json(&body)
                .send()
                .await?;

            if response.status() == StatusCode::NOT_FOUND {
                return Ok(ids);
            }
            if !response.status().is_success() {
                return Err(backend_error(response.status()));
            }

            let parsed: Value = response.json().await?;
            let (page_ids, next) = scroll_page(&parsed);
            ids.extend(page_ids);

            match next {
                Some(next) => offset = Some(next),
                None => return Ok(ids),
            }
        }
    }

    async fn add_chunks(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let Some(vector_size) = embeddings.first().map(Vec::len) else {
            return Ok(());
        };
        self.ensure_collection(vector_size).await?;

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| {
                if embedding.len() != vector_size {
                    return Err(StoreError::Request(format!(
                        "embedding dimension {} != {}",
                        embedding.len(),
                        vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&chunk.chunk_id),
                    "vector": embedding,
                    "payload": {
                        "chunk_id": chunk.chunk_id,
                        "source": chunk.source,
                        "page": chunk.page,
                        "chunk_index": chunk.chunk_index,
                        "text": chunk.text,
                    },
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        Ok(())
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        Ok(hits_from_response(&parsed))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url()))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or_default() as usize)
    }
}
