use anyhow::Context;
use bilingual_rag_core::{
    index_language, reset_language_store, CharacterNgramEmbedder, Embedder, Language,
    LocalVectorStore, LopdfExtractor, OllamaClient, OllamaEmbedder, OllamaLlm, QdrantStore,
    QueryPipeline, RagConfig, VectorIndex, DEFAULT_LLM_MODEL, DEFAULT_OLLAMA_URL,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bilingual-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder holding one sub-folder of PDFs per language
    #[arg(long, env = "RAG_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Folder holding one vector store per language
    #[arg(long, env = "RAG_STORE_DIR", default_value = "chroma", global = true)]
    store_dir: PathBuf,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    ollama_url: String,

    /// Model used for query normalization, paraphrasing and answers
    #[arg(long, env = "RAG_LLM_MODEL", default_value = DEFAULT_LLM_MODEL, global = true)]
    llm_model: String,

    /// Where chunks and embeddings are persisted
    #[arg(long, value_enum, default_value_t = Backend::Local, global = true)]
    backend: Backend,

    /// Qdrant base URL, used with `--backend qdrant`
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333", global = true)]
    qdrant_url: String,

    /// Qdrant collection prefix; the language tag is appended
    #[arg(long, default_value = "textbooks", global = true)]
    qdrant_prefix: String,

    /// Embed with the built-in trigram embedder instead of Ollama.
    #[arg(long, default_value_t = false, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Index the PDFs of one language into its vector store.
    Index {
        /// Language to index.
        #[arg(long, value_enum)]
        lang: LangArg,
        /// Delete the language's store before indexing.
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
    /// Answer a question from one language's textbooks.
    Query {
        /// The question you want to ask.
        question: String,
        /// Language of the textbooks to search and of the answer.
        #[arg(long, value_enum)]
        lang: LangArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LangArg {
    Tamil,
    English,
}

impl From<LangArg> for Language {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::Tamil => Language::Tamil,
            LangArg::English => Language::English,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Local,
    Qdrant,
}

impl Cli {
    fn config(&self) -> RagConfig {
        RagConfig {
            data_dir: self.data_dir.clone(),
            store_dir: self.store_dir.clone(),
            ollama_url: self.ollama_url.clone(),
            llm_model: self.llm_model.clone(),
            ..RagConfig::default()
        }
    }

    fn embedder(&self, client: &OllamaClient, language: Language) -> Box<dyn Embedder> {
        if self.offline {
            Box::new(CharacterNgramEmbedder::default())
        } else {
            Box::new(OllamaEmbedder::for_language(client.clone(), language))
        }
    }

    async fn reset_store(&self, config: &RagConfig, language: Language) -> anyhow::Result<bool> {
        let removed = match self.backend {
            Backend::Local => reset_language_store(&config.store_dir, language).await?,
            Backend::Qdrant => {
                QdrantStore::for_language(&self.qdrant_url, &self.qdrant_prefix, language)
                    .reset()
                    .await?
            }
        };
        Ok(removed)
    }

    async fn open_store(&self, config: &RagConfig, language: Language) -> anyhow::Result<Box<dyn VectorIndex>> {
        let store: Box<dyn VectorIndex> = match self.backend {
            Backend::Local => Box::new(
                LocalVectorStore::open(config.store_path(language))
                    .await
                    .with_context(|| format!("opening {language} store"))?,
            ),
            Backend::Qdrant => Box::new(QdrantStore::for_language(
                &self.qdrant_url,
                &self.qdrant_prefix,
                language,
            )),
        };
        Ok(store)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.config();
    let client = OllamaClient::new(&config.ollama_url)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "bilingual-rag boot"
    );

    match &cli.command {
        Command::Index { lang, reset } => {
            let language = Language::from(*lang);

            if *reset {
                cli.reset_store(&config, language).await?;
            }

            let embedder = cli.embedder(&client, language);
            let mut store = cli.open_store(&config, language).await?;
            let report = index_language(
                language,
                &config.data_path(language),
                config.chunking,
                &LopdfExtractor,
                embedder.as_ref(),
                store.as_mut(),
            )
            .await?;

            if !report.skipped_files.is_empty() {
                warn!(skipped_files = report.skipped_files.len(), %language, "some pdfs were skipped");
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            println!(
                "{language}: {} pages, {} chunks, {} already stored, {} added at {}",
                report.pages,
                report.chunks,
                report.existing,
                report.added,
                Utc::now().to_rfc3339()
            );
        }
        Command::Query { question, lang } => {
            let language = Language::from(*lang);
            let embedder = cli.embedder(&client, language);
            let store = cli.open_store(&config, language).await?;
            let llm = OllamaLlm::new(client.clone(), config.llm_model.clone());

            let pipeline = QueryPipeline::new(language, &llm, embedder.as_ref(), store.as_ref())
                .with_settings(config.retrieval);
            let answer = pipeline.answer(question).await?;

            println!("\nRESPONSE:\n{}", answer.text);
            println!("\nSOURCES: {:?}", answer.sources);
        }
    }

    Ok(())
}
