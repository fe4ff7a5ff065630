use crate::config::RetrievalSettings;
use crate::embeddings::Embedder;
use crate::traits::{LanguageModel, VectorIndex};
use crate::{Answer, Language, QueryError, RetrievedChunk};
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const LIST_MARKER: &str = r"^\s*(?:\d+\s*[.)]|[-*•])\s*";

pub fn normalization_prompt(question: &str, language: Language) -> String {
    let target = language.display_name();
    format!(
        "You are a bilingual education assistant.\n\
         Convert the following user query into {target}.\n\
         If it is already in {target} or written in Tanglish, rewrite it in proper {target} script.\n\
         User Query: {question}\n\
         Result (output only the text):"
    )
}

pub fn multi_query_prompt(question: &str, count: usize) -> String {
    format!(
        "You are an AI language model assistant proficient in Tamil.\n\
         The user is studying from a textbook. Generate {count} different versions of the given \
         user question in Tamil to help retrieve the most relevant sections from the database.\n\
         Write each version on its own line.\n\
         Original question: {question}"
    )
}

pub fn answer_prompt(context: &str, question: &str, language: Language) -> String {
    format!(
        "Answer strictly in {language}.\n\
         Answer ONLY using the context below. If the answer is not in the context, say you don't know.\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n",
        language = language.display_name(),
    )
}

/// One query per non-blank line, with list numbering and bullets removed.
/// Lead-in lines such as "Here are five versions:" are dropped.
pub fn parse_query_lines(text: &str) -> Result<Vec<String>, regex::Error> {
    let marker = Regex::new(LIST_MARKER)?;
    Ok(text
        .lines()
        .map(|line| marker.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty() && !is_preamble(line))
        .collect())
}

fn is_preamble(line: &str) -> bool {
    line.ends_with(':') || line.ends_with('：')
}

pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Appends `hits` to `target`, skipping chunk ids already present.
fn union_hits(target: &mut Vec<RetrievedChunk>, seen: &mut HashSet<String>, hits: Vec<RetrievedChunk>) {
    for hit in hits {
        if seen.insert(hit.chunk_id.clone()) {
            target.push(hit);
        }
    }
}

/// Normalize, retrieve and answer against one language's store.
pub struct QueryPipeline<'a, L: ?Sized, E: ?Sized, V: ?Sized> {
    language: Language,
    llm: &'a L,
    embedder: &'a E,
    store: &'a V,
    settings: RetrievalSettings,
}

impl<'a, L, E, V> QueryPipeline<'a, L, E, V>
where
    L: LanguageModel + ?Sized,
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    pub fn new(language: Language, llm: &'a L, embedder: &'a E, store: &'a V) -> Self {
        Self {
            language,
            llm,
            embedder,
            store,
            settings: RetrievalSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RetrievalSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Rewrites the question into clean target-language text. Falls back to
    /// the question itself when the model returns nothing.
    pub async fn normalize_query(&self, question: &str) -> Result<String, QueryError> {
        let response = self
            .llm
            .invoke(&normalization_prompt(question, self.language))
            .await?;
        let normalized = response.trim();

        if normalized.is_empty() {
            return Ok(question.trim().to_string());
        }
        Ok(normalized.to_string())
    }

    /// Paraphrases of `question` for multi-query retrieval.
    pub async fn generate_queries(&self, question: &str) -> Result<Vec<String>, QueryError> {
        let count = self.settings.paraphrase_count;
        let response = self.llm.invoke(&multi_query_prompt(question, count)).await?;
        let mut queries = parse_query_lines(&response)?;
        queries.truncate(count);
        Ok(queries)
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, QueryError> {
        match self.language {
            Language::Tamil => self.retrieve_multi_query(query).await,
            Language::English => {
                let vector = self.embedder.embed_query(query).await?;
                Ok(self
                    .store
                    .similarity_search(&vector, self.settings.english_top_k)
                    .await?)
            }
        }
    }

    async fn retrieve_multi_query(&self, query: &str) -> Result<Vec<RetrievedChunk>, QueryError> {
        let mut queries = self.generate_queries(query).await?;
        if queries.is_empty() {
            queries.push(query.to_string());
        }
        debug!(queries = ?queries, "generated queries");

        let vectors = self.embedder.embed_documents(&queries).await?;
        let mut results = Vec::new();
        let mut seen = HashSet::new();
        for vector in &vectors {
            let hits = self
                .store
                .similarity_search(vector, self.settings.tamil_top_k_per_query)
                .await?;
            union_hits(&mut results, &mut seen, hits);
        }

        Ok(results)
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        info!(language = %self.language, "normalizing query");
        let search_query = self.normalize_query(question).await?;
        info!(query = %search_query, "optimized query");

        let chunks = self.retrieve(&search_query).await?;
        info!(retrieved = chunks.len(), "retrieved relevant context");

        let prompt = answer_prompt(&build_context(&chunks), &search_query, self.language);
        info!(language = %self.language, "generating final response");
        let text = self.llm.invoke(&prompt).await?;

        Ok(Answer {
            question: search_query,
            text: text.trim().to_string(),
            sources: chunks.into_iter().map(|chunk| chunk.chunk_id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CharacterNgramEmbedder, Chunk, ModelError, StoreError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with canned responses in order and records every prompt.
    #[derive(Default)]
    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
                prompts: Mutex::default(),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ModelError::BadResponse {
                    model: "scripted".to_string(),
                    details: "no scripted reply left".to_string(),
                })
        }
    }

    /// Serves one canned result list per search and records each `k`.
    #[derive(Default)]
    struct ScriptedStore {
        results: Mutex<VecDeque<Vec<RetrievedChunk>>>,
        searches: Mutex<Vec<usize>>,
    }

    impl ScriptedStore {
        fn new(results: Vec<Vec<RetrievedChunk>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                searches: Mutex::default(),
            }
        }

        fn searches(&self) -> Vec<usize> {
            self.searches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VectorIndex for ScriptedStore {
        async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
            Ok(HashSet::new())
        }

        async fn add_chunks(&mut self, _chunks: &[Chunk], _embeddings: &[Vec<f32>]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn similarity_search(
            &self,
            _query_vector: &[f32],
            k: usize,
        ) -> Result<Vec<RetrievedChunk>, StoreError> {
            self.searches.lock().unwrap().push(k);
            Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn hit(id: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            source: "book.pdf".to_string(),
            page: 1,
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[tokio::test]
    async fn english_uses_a_single_search() {
        let llm = ScriptedLlm::new(&["  What is photosynthesis?  ", "Plants make food from light.\n"]);
        let store = ScriptedStore::new(vec![vec![
            hit("bio.pdf:4:0", "Photosynthesis happens in leaves."),
            hit("bio.pdf:4:1", "Chlorophyll absorbs light."),
        ]]);
        let embedder = CharacterNgramEmbedder::default();

        let pipeline = QueryPipeline::new(Language::English, &llm, &embedder, &store);
        let answer = pipeline.answer("wat is fotosynthesis").await.unwrap();

        assert_eq!(answer.question, "What is photosynthesis?");
        assert_eq!(answer.text, "Plants make food from light.");
        assert_eq!(answer.sources, vec!["bio.pdf:4:0", "bio.pdf:4:1"]);
        assert_eq!(store.searches(), vec![5]);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("into English"));
        assert!(prompts[0].contains("wat is fotosynthesis"));
        assert!(prompts[1].starts_with("Answer strictly in English."));
        assert!(prompts[1].contains(
            "Photosynthesis happens in leaves.\n\n---\n\nChlorophyll absorbs light."
        ));
        assert!(prompts[1].contains("Question:\nWhat is photosynthesis?"));
    }

    #[tokio::test]
    async fn tamil_unions_multi_query_results() {
        let llm = ScriptedLlm::new(&[
            "ஒளிச்சேர்க்கை என்றால் என்ன?",
            "1. ஒளிச்சேர்க்கை என்றால் என்ன?\n2) தாவரங்கள் உணவு தயாரிப்பது எப்படி?\n\n- இலைகளின் பங்கு என்ன?",
            "தாவரங்கள் ஒளியிலிருந்து உணவு தயாரிக்கின்றன.",
        ]);
        let store = ScriptedStore::new(vec![
            vec![hit("a", "A"), hit("b", "B")],
            vec![hit("b", "B"), hit("c", "C")],
            vec![hit("a", "A")],
        ]);
        let embedder = CharacterNgramEmbedder::default();

        let pipeline = QueryPipeline::new(Language::Tamil, &llm, &embedder, &store);
        let answer = pipeline.answer("oli serkkai enna").await.unwrap();

        assert_eq!(answer.sources, vec!["a", "b", "c"]);
        assert_eq!(store.searches(), vec![3, 3, 3]);
        assert_eq!(answer.text, "தாவரங்கள் ஒளியிலிருந்து உணவு தயாரிக்கின்றன.");

        let prompts = llm.prompts();
        assert!(prompts[1].contains("Generate 5 different versions"));
        assert!(prompts[1].contains("Original question: ஒளிச்சேர்க்கை என்றால் என்ன?"));
        assert!(prompts[2].starts_with("Answer strictly in Tamil."));
        assert!(prompts[2].contains("A\n\n---\n\nB\n\n---\n\nC"));
    }

    #[tokio::test]
    async fn tamil_without_paraphrases_searches_the_question() {
        let llm = ScriptedLlm::new(&["கேள்வி", "  \n \n", "பதில்"]);
        let store = ScriptedStore::new(vec![vec![hit("x", "X")]]);
        let embedder = CharacterNgramEmbedder::default();

        let pipeline = QueryPipeline::new(Language::Tamil, &llm, &embedder, &store);
        let answer = pipeline.answer("kelvi").await.unwrap();

        assert_eq!(store.searches(), vec![3]);
        assert_eq!(answer.sources, vec!["x"]);
    }

    #[tokio::test]
    async fn paraphrases_are_capped_at_the_requested_count() {
        let llm = ScriptedLlm::new(&["q1\nq2\nq3\nq4"]);
        let store = ScriptedStore::default();
        let embedder = CharacterNgramEmbedder::default();

        let settings = RetrievalSettings {
            paraphrase_count: 2,
            ..RetrievalSettings::default()
        };
        let pipeline = QueryPipeline::new(Language::Tamil, &llm, &embedder, &store).with_settings(settings);
        let queries = pipeline.generate_queries("q").await.unwrap();
        assert_eq!(queries, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn lead_in_line_does_not_take_a_paraphrase_slot() {
        let llm = ScriptedLlm::new(&["Here are five versions of the question:\n1. a\n2. b\n3. c\n4. d\n5. e"]);
        let store = ScriptedStore::default();
        let embedder = CharacterNgramEmbedder::default();

        let pipeline = QueryPipeline::new(Language::Tamil, &llm, &embedder, &store);
        let queries = pipeline.generate_queries("q").await.unwrap();
        assert_eq!(queries, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn blank_normalization_falls_back_to_question() {
        let llm = ScriptedLlm::new(&["   "]);
        let store = ScriptedStore::default();
        let embedder = CharacterNgramEmbedder::default();

        let pipeline = QueryPipeline::new(Language::English, &llm, &embedder, &store);
        let normalized = pipeline.normalize_query("  what is a cell ").await.unwrap();
        assert_eq!(normalized, "what is a cell");
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_calling_the_model() {
        let llm = ScriptedLlm::default();
        let store = ScriptedStore::default();
        let embedder = CharacterNgramEmbedder::default();

        let pipeline = QueryPipeline::new(Language::English, &llm, &embedder, &store);
        let result = pipeline.answer("   ").await;
        assert!(matches!(result, Err(QueryError::EmptyQuestion)));
        assert!(llm.prompts().is_empty());
    }

    #[test]
    fn list_markers_are_stripped_from_generated_queries() {
        let parsed = parse_query_lines("1. first\n 2) second\n- third\n* fourth\n• fifth\n\n  sixth  ").unwrap();
        assert_eq!(parsed, vec!["first", "second", "third", "fourth", "fifth", "sixth"]);
    }

    #[test]
    fn context_joins_chunks_with_separator() {
        assert_eq!(build_context(&[]), "");
        assert_eq!(build_context(&[hit("a", "one"), hit("b", "two")]), "one\n\n---\n\ntwo");
    }
}
