use crate::extractor::PdfExtractor;
use crate::{DocumentPage, IngestError};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// PDF files directly inside `folder`, sorted by file name.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub pages: Vec<DocumentPage>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Loads the non-empty pages of every PDF in `folder`.
///
/// A missing folder is logged and treated as empty. Files that fail to parse
/// are logged, recorded in the report and skipped.
pub fn load_documents<E: PdfExtractor + ?Sized>(folder: &Path, extractor: &E) -> LoadReport {
    let mut report = LoadReport::default();

    if !folder.is_dir() {
        warn!(path = %folder.display(), "data path does not exist");
        return report;
    }

    for path in discover_pdf_files(folder) {
        match load_file(&path, extractor) {
            Ok(pages) => report.pages.extend(pages),
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read pdf, skipping");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(pages = report.pages.len(), "loaded pages into memory");
    report
}

fn load_file<E: PdfExtractor + ?Sized>(path: &Path, extractor: &E) -> Result<Vec<DocumentPage>, IngestError> {
    let source = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();

    let pages = extractor.extract_pages(path)?;
    info!(file = %source, total_pages = pages.len(), "opened pdf");

    let mut documents = Vec::with_capacity(pages.len());
    for page in pages {
        let text = page.text.trim();
        if text.is_empty() {
            info!(file = %source, page = page.number, "skipping empty page");
            continue;
        }

        documents.push(DocumentPage {
            source: source.clone(),
            page: page.number,
            text: text.to_string(),
        });
    }

    Ok(documents)
}
