pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod ollama;
pub mod query;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{assign_chunk_ids, chunk_documents, split_documents, ChunkingConfig, RecursiveSplitter};
pub use config::{RagConfig, RetrievalSettings};
pub use embeddings::{
    embedding_model_for, CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL, TAMIL_EMBEDDING_MODEL,
};
pub use error::{IndexError, IngestError, ModelError, QueryError, StoreError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use indexer::{index_language, index_pages, IndexReport};
pub use ingest::{discover_pdf_files, load_documents, LoadReport, SkippedPdf};
pub use llm::{OllamaLlm, DEFAULT_LLM_MODEL};
pub use models::{Answer, Chunk, DocumentPage, Language, RetrievedChunk, StoredChunk};
pub use ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
pub use query::QueryPipeline;
pub use store::{language_store_path, reset_language_store, LocalVectorStore};
pub use stores::QdrantStore;
pub use traits::{LanguageModel, VectorIndex};
