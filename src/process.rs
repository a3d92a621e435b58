//! Document processing: raw pages to index entries.

use crate::error::{Error, Result};
use crate::extract::PageExtractor;
use crate::models::{IndexEntry, PageText, SourceFile};

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"<file>-page-<index>"`, zero-based.
pub fn entry_id(file_name: &str, page_index: usize) -> String {
    format!("{}{}", entry_prefix(file_name), page_index)
}

/// Prefix shared by every entry id of `file_name`.
pub fn entry_prefix(file_name: &str) -> String {
    format!("{}-page-", file_name)
}

/// Extract and clean every page of `file`, dropping pages that clean to
/// nothing. A document with no text at all yields an empty list.
pub fn process_document(extractor: &dyn PageExtractor, file: &SourceFile) -> Result<Vec<PageText>> {
    let raw_pages = extractor
        .extract_pages(&file.path)
        .map_err(|e| Error::document_read(&file.file_name, e))?;

    Ok(raw_pages
        .iter()
        .enumerate()
        .filter_map(|(page_index, raw)| {
            let text = clean_text(raw);
            (!text.is_empty()).then_some(PageText { page_index, text })
        })
        .collect())
}

pub fn to_entries(file_name: &str, pages: &[PageText]) -> Vec<IndexEntry> {
    pages
        .iter()
        .map(|p| IndexEntry {
            id: entry_id(file_name, p.page_index),
            text: p.text.clone(),
        })
        .collect()
}
