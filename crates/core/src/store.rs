use crate::models::{Chunk, Language, RetrievedChunk, StoredChunk};
use crate::traits::VectorIndex;
use crate::StoreError;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub const STORE_FILE: &str = "chunks.jsonl";

/// Directory holding one language's store under `store_root`.
pub fn language_store_path(store_root: &Path, language: Language) -> PathBuf {
    store_root.join(language.tag())
}

/// Deletes a language's persisted store. Returns whether anything was removed.
pub async fn reset_language_store(store_root: &Path, language: Language) -> Result<bool, StoreError> {
    let path = language_store_path(store_root, language);
    match tokio::fs::remove_dir_all(&path).await {
        Ok(()) => {
            info!(%language, path = %path.display(), "cleared database");
            Ok(true)
        }
        Err(error) if error.kind() == ErrorKind::NotFound => {
            info!(%language, path = %path.display(), "no database found to clear");
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}

/// File-backed vector store: one JSON record per line, fully loaded on open
/// and searched by brute-force cosine similarity.
#[derive(Debug)]
pub struct LocalVectorStore {
    dir: PathBuf,
    entries: Vec<StoredChunk>,
    ids: HashSet<String>,
}

impl LocalVectorStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let path = dir.join(STORE_FILE);

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => parse_records(&path, &contents)?,
            Err(error) if error.kind() == ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };
        let ids = entries.iter().map(|entry| entry.chunk_id.clone()).collect();
        debug!(path = %dir.display(), entries = entries.len(), "opened local vector store");

        Ok(Self { dir, entries, ids })
    }

    pub async fn open_language(store_root: &Path, language: Language) -> Result<Self, StoreError> {
        Self::open(language_store_path(store_root, language)).await
    }

    pub fn entries(&self) -> &[StoredChunk] {
        &self.entries
    }

    fn dimensions(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.embedding.len())
    }

    fn validate_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let expected = self
            .dimensions()
            .or_else(|| embeddings.first().map(Vec::len));
        let mut seen = HashSet::new();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if chunk.chunk_id.is_empty() {
                return Err(StoreError::Request("chunk has no id".to_string()));
            }
            if self.ids.contains(&chunk.chunk_id) || !seen.insert(chunk.chunk_id.as_str()) {
                return Err(StoreError::DuplicateId(chunk.chunk_id.clone()));
            }
            if Some(embedding.len()) != expected || embedding.is_empty() {
                return Err(StoreError::Request(format!(
                    "embedding dimension {} for {} doesn't match store dimension {}",
                    embedding.len(),
                    chunk.chunk_id,
                    expected.unwrap_or_default()
                )));
            }
        }

        Ok(())
    }
}

fn parse_records(path: &Path, contents: &str) -> Result<Vec<StoredChunk>, StoreError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|error| StoreError::CorruptRecord {
                path: path.display().to_string(),
                line: index + 1,
                details: error.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl VectorIndex for LocalVectorStore {
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.ids.clone())
    }

    async fn add_chunks(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
        self.validate_batch(chunks, embeddings)?;
        if chunks.is_empty() {
            return Ok(());
        }

        let records: Vec<StoredChunk> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk::new(chunk, embedding.clone()))
            .collect();

        let mut buffer = String::new();
        for record in &records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(STORE_FILE))
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        for record in records {
            self.ids.insert(record.chunk_id.clone());
            self.entries.push(record);
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
        if let Some(dimensions) = self.dimensions() {
            if query_vector.len() != dimensions {
                return Err(StoreError::Request(format!(
                    "query dimension {} doesn't match store dimension {dimensions}",
                    query_vector.len()
                )));
            }
        }

        let mut hits: Vec<RetrievedChunk> = self
            .entries
            .iter()
            .filter_map(|entry| {
                cosine_similarity(query_vector, &entry.embedding).map(|score| RetrievedChunk {
                    chunk_id: entry.chunk_id.clone(),
                    source: entry.source.clone(),
                    page: entry.page,
                    text: entry.text.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}
