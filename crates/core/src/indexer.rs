use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::ingest::{load_documents, SkippedPdf};
use crate::traits::VectorIndex;
use crate::{Chunk, DocumentPage, IndexError, Language};
use std::path::Path;
use tracing::{debug, info, warn};

/// Chunks embedded and written per request.
pub const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug)]
pub struct IndexReport {
    pub language: Language,
    pub pages: usize,
    pub chunks: usize,
    pub existing: usize,
    pub added: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

impl IndexReport {
    fn empty(language: Language) -> Self {
        Self {
            language,
            pages: 0,
            chunks: 0,
            existing: 0,
            added: 0,
            skipped_files: Vec::new(),
        }
    }
}

/// Loads, chunks and incrementally stores every PDF in `data_dir`.
pub async fn index_language<X, E, V>(
    language: Language,
    data_dir: &Path,
    chunking: ChunkingConfig,
    extractor: &X,
    embedder: &E,
    store: &mut V,
) -> Result<IndexReport, IndexError>
where
    X: PdfExtractor + ?Sized,
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    info!(%language, path = %data_dir.display(), "indexing documents");

    let loaded = load_documents(data_dir, extractor);
    if loaded.pages.is_empty() {
        warn!(%language, "no documents found");
        let mut report = IndexReport::empty(language);
        report.skipped_files = loaded.skipped_files;
        return Ok(report);
    }

    let mut report = index_pages(language, &loaded.pages, chunking, embedder, store).await?;
    report.skipped_files = loaded.skipped_files;
    Ok(report)
}

/// Adds the chunks of `pages` whose ids aren't in `store` yet.
pub async fn index_pages<E, V>(
    language: Language,
    pages: &[DocumentPage],
    chunking: ChunkingConfig,
    embedder: &E,
    store: &mut V,
) -> Result<IndexReport, IndexError>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    let chunks = chunk_documents(pages, chunking)?;
    info!(%language, chunks = chunks.len(), "split into chunks");

    let existing_ids = store.existing_ids().await?;
    info!(%language, existing = existing_ids.len(), "existing documents in database");

    let new_chunks: Vec<Chunk> = chunks
        .iter()
        .filter(|chunk| !existing_ids.contains(&chunk.chunk_id))
        .cloned()
        .collect();

    if new_chunks.is_empty() {
        info!(%language, "database is already up to date");
    } else {
        info!(%language, added = new_chunks.len(), model = embedder.model_name(), "adding new chunks");
        for batch in new_chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = embedder.embed_documents(&texts).await?;
            store.add_chunks(batch, &embeddings).await?;
            debug!(%language, batch = batch.len(), "stored batch");
        }
    }

    Ok(IndexReport {
        language,
        pages: pages.len(),
        chunks: chunks.len(),
        existing: existing_ids.len(),
        added: new_chunks.len(),
        skipped_files: Vec::new(),
    })
}
