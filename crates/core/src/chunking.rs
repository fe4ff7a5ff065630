use crate::error::IngestError;
use crate::models::{Chunk, DocumentPage};
use std::collections::VecDeque;
use tracing::debug;

/// Paragraph, line, word, then character boundaries.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Sizes are counted in `char`s, so Tamil text is measured by code point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 80,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits text on the coarsest separator present, merging small pieces back
/// together up to the chunk size and recursing into pieces that are too long.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|sep| sep.to_string()).collect(),
        })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (position, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                finer = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge_pieces(&small));
                small.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge_pieces(&small));
        }

        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkingConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > chunk_size {
                if total > chunk_size {
                    debug!(total, chunk_size, "created a chunk longer than the configured size");
                }

                if !window.is_empty() {
                    if let Some(chunk) = join_trimmed(&window) {
                        merged.push(chunk);
                    }

                    // Keep at most `chunk_overlap` chars of the tail, and only
                    // as much as still leaves room for the next piece.
                    while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                        match window.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_trimmed(&window) {
            merged.push(chunk);
        }

        merged
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_trimmed(pieces: &VecDeque<&str>) -> Option<String> {
    let joined = pieces.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Splits on `separator`, leaving each separator at the start of the piece
/// that follows it. An empty separator splits into single chars.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Splits every page into chunks, in page order. Ids are left empty.
pub fn split_documents(pages: &[DocumentPage], splitter: &RecursiveSplitter) -> Vec<Chunk> {
    pages
        .iter()
        .flat_map(|page| {
            splitter.split_text(&page.text).into_iter().map(|text| Chunk {
                chunk_id: String::new(),
                source: page.source.clone(),
                page: page.page,
                chunk_index: 0,
                text,
            })
        })
        .collect()
}

/// Gives every chunk the id `<source>:<page>:<n>`, where `n` counts chunks
/// within a page and restarts at 0 whenever the page changes.
pub fn assign_chunk_ids(chunks: &mut [Chunk]) {
    let mut last_page: Option<String> = None;
    let mut index = 0u32;

    for chunk in chunks.iter_mut() {
        let page_key = chunk.page_key();
        if last_page.as_deref() == Some(page_key.as_str()) {
            index += 1;
        } else {
            index = 0;
        }

        chunk.chunk_index = index;
        chunk.chunk_id = format!("{page_key}:{index}");
        last_page = Some(page_key);
    }
}

/// Splits the pages and assigns stable ids in one pass.
pub fn chunk_documents(pages: &[DocumentPage], config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    let splitter = RecursiveSplitter::new(config)?;
    let mut chunks = split_documents(pages, &splitter);
    assign_chunk_ids(&mut chunks);
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(source: &str, page: u32, text: &str) -> DocumentPage {
        DocumentPage {
            source: source.to_string(),
            page,
            text: text.to_string(),
        }
    }

    fn small_config() -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: 20,
            chunk_overlap: 8,
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|n| format!("w{n:02}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(matches!(
            RecursiveSplitter::new(config),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let splitter = RecursiveSplitter::new(small_config()).unwrap();
        let chunks = splitter.split_text(&numbered_words(30));

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert_eq!(chunks[0], "w00 w01 w02 w03 w04");
        assert!(chunks[1].starts_with("w03 w04"));
    }

    #[test]
    fn paragraph_breaks_are_preferred() {
        let splitter = RecursiveSplitter::new(ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 5,
        })
        .unwrap();
        let text = "Plants make food from light.\n\nAnimals eat plants or animals.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec!["Plants make food from light.", "Animals eat plants or animals."]
        );
    }

    #[test]
    fn tamil_text_is_measured_in_chars() {
        let splitter = RecursiveSplitter::new(ChunkingConfig::default()).unwrap();
        let chunks = splitter.split_text(&"அ".repeat(1000));
        let lengths: Vec<_> = chunks.iter().map(|chunk| chunk.chars().count()).collect();
        assert_eq!(lengths, vec![800, 280]);
    }

    #[test]
    fn blank_text_yields_no_chunks() {
        let splitter = RecursiveSplitter::new(small_config()).unwrap();
        assert!(splitter.split_text(" \n\n \n ").is_empty());
    }

    #[test]
    fn chunk_ids_restart_on_page_change() {
        let long = numbered_words(8);
        let pages = vec![
            page("science.pdf", 1, &long),
            page("science.pdf", 2, "short"),
            page("maths.pdf", 2, &long),
        ];
        let chunks = chunk_documents(&pages, small_config()).unwrap();
        let ids: Vec<_> = chunks.iter().map(|chunk| chunk.chunk_id.as_str()).collect();

        assert_eq!(
            ids,
            vec![
                "science.pdf:1:0",
                "science.pdf:1:1",
                "science.pdf:2:0",
                "maths.pdf:2:0",
                "maths.pdf:2:1",
            ]
        );
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[2].chunk_index, 0);
    }

    #[test]
    fn chunk_ids_are_stable_across_runs() {
        let pages = vec![page("a.pdf", 1, &numbered_words(40)), page("a.pdf", 2, "tail")];
        let first = chunk_documents(&pages, small_config()).unwrap();
        let second = chunk_documents(&pages, small_config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn separators_stay_with_the_following_piece() {
        assert_eq!(split_keeping_separator("a b  c", " "), vec!["a", " b", " ", " c"]);
        assert_eq!(split_keeping_separator("இது", ""), vec!["இ", "த", "ு"]);
    }
}
