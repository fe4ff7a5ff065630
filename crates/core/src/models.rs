use crate::embeddings::embedding_model_for;
use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages with their own data directory and vector store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Tamil,
    English,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Tamil, Language::English];

    /// Tag used for directory names, collection names and CLI values.
    pub fn tag(self) -> &'static str {
        match self {
            Language::Tamil => "tamil",
            Language::English => "english",
        }
    }

    /// Human-facing name used inside prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Tamil => "Tamil",
            Language::English => "English",
        }
    }

    pub fn embedding_model(self) -> &'static str {
        embedding_model_for(self.tag())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tamil" => Ok(Language::Tamil),
            "english" => Ok(Language::English),
            other => Err(IngestError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Text of one PDF page. `source` is the file name, `page` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentPage {
    pub source: String,
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `<source>:<page>:<chunk_index>`, empty until ids are assigned.
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub chunk_index: u32,
    pub text: String,
}

impl Chunk {
    pub fn page_key(&self) -> String {
        format!("{}:{}", self.source, self.page)
    }
}

/// One persisted vector store record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub text: String,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl StoredChunk {
    pub fn new(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            source: chunk.source.clone(),
            page: chunk.page,
            text: chunk.text.clone(),
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The question after normalization into the target language.
    pub question: String,
    pub text: String,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parses_case_insensitively() {
        assert_eq!("Tamil".parse::<Language>().unwrap(), Language::Tamil);
        assert_eq!(" english ".parse::<Language>().unwrap(), Language::English);
        assert!("french".parse::<Language>().is_err());
    }

    #[test]
    fn language_display_matches_tag() {
        for language in Language::ALL {
            assert_eq!(language.to_string(), language.tag());
        }
    }
}
