use crate::chunking::ChunkingConfig;
use crate::llm::DEFAULT_LLM_MODEL;
use crate::models::Language;
use crate::ollama::DEFAULT_OLLAMA_URL;
use crate::store::language_store_path;
use std::path::PathBuf;

/// How many chunks each retrieval strategy pulls from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    /// Results of the single English similarity search.
    pub english_top_k: usize,
    /// Results per generated query in Tamil multi-query retrieval.
    pub tamil_top_k_per_query: usize,
    /// Number of paraphrases requested from the model.
    pub paraphrase_count: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            english_top_k: 5,
            tamil_top_k_per_query: 3,
            paraphrase_count: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Holds one sub-folder of PDFs per language.
    pub data_dir: PathBuf,
    /// Holds one persisted store per language.
    pub store_dir: PathBuf,
    pub ollama_url: String,
    pub llm_model: String,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalSettings,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            store_dir: PathBuf::from("chroma"),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl RagConfig {
    pub fn data_path(&self, language: Language) -> PathBuf {
        self.data_dir.join(language.tag())
    }

    pub fn store_path(&self, language: Language) -> PathBuf {
        language_store_path(&self.store_dir, language)
    }
}
