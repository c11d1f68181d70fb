//! Plain-text filing loader.
//!
//! Form feed characters (`\x0c`, as emitted by `pdftotext`) mark page
//! breaks. Each non-blank page becomes its own [`Document`] with a 1-based
//! `page` entry in its metadata and id `<file stem>#p<page>`. Files without
//! form feeds yield a single document with id `<file stem>`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use filing_rag::Document;
use filing_rag::document::PAGE_KEY;

const PAGE_BREAK: char = '\x0c';

/// Read one filing from disk.
pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    load_with_stem(path, &file_stem(path))
}

/// Read several filings, in the order given.
///
/// Files sharing a stem (`2020/aapl.txt`, `2021/aapl.txt`) are named by
/// their path without extension instead, so document ids stay unique.
pub fn load_files(paths: &[impl AsRef<Path>]) -> Result<Vec<Document>> {
    let paths: Vec<&Path> = paths.iter().map(AsRef::as_ref).collect();
    let mut documents = Vec::new();
    for (path, stem) in paths.iter().zip(document_stems(&paths)) {
        documents.extend(load_with_stem(path, &stem)?);
    }
    Ok(documents)
}

/// Id stem for each path: the file stem, or the extension-less path when
/// another file has the same stem.
pub fn document_stems(paths: &[&Path]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|path| file_stem(path)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }
    paths
        .iter()
        .zip(&stems)
        .map(|(path, stem)| {
            if counts[stem.as_str()] > 1 {
                path.with_extension("").to_string_lossy().into_owned()
            } else {
                stem.clone()
            }
        })
        .collect()
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "document".into())
}

fn load_with_stem(path: &Path, stem: &str) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let uri = format!("file://{}", path.display());
    Ok(documents_from_text(stem, &text)
        .into_iter()
        .map(|doc| doc.with_source_uri(uri.clone()))
        .collect())
}

/// Split extracted filing text into per-page documents.
pub fn documents_from_text(stem: &str, text: &str) -> Vec<Document> {
    if !text.contains(PAGE_BREAK) {
        return vec![Document::new(stem, text)];
    }
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| {
            let number = i + 1;
            Document::new(format!("{stem}#p{number}"), page)
                .with_metadata(PAGE_KEY, number.to_string())
                .with_metadata("source", stem)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_page_breaks_is_one_document() {
        let docs = documents_from_text("aapl-10k", "Risk factors.");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "aapl-10k");
        assert!(docs[0].metadata.is_empty());
    }

    #[test]
    fn form_feeds_split_pages_and_skip_blank_ones() {
        let docs = documents_from_text("aapl-10k", "Cover\x0c \n\x0cRisk factors");
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["aapl-10k#p1", "aapl-10k#p3"]);
        assert_eq!(docs[1].metadata.get(PAGE_KEY).map(String::as_str), Some("3"));
        assert_eq!(docs[1].text, "Risk factors");
    }

    #[test]
    fn same_stem_in_different_directories_gets_distinct_ids() {
        let paths = [Path::new("2020/aapl.txt"), Path::new("2021/aapl.txt"), Path::new("nflx.txt")];
        assert_eq!(document_stems(&paths), vec!["2020/aapl", "2021/aapl", "nflx"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
