//! PDF metadata extraction

use std::path::Path;

use lopdf::Object;

use super::graph::DocumentGraph;
use super::text::decode_text_string;
use crate::error::{Error, Result};

/// PDF metadata
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    /// Number of pages in the PDF
    pub page_count: u32,
    /// Document title (if present)
    pub title: Option<String>,
    /// Document author (if present)
    pub author: Option<String>,
    /// Header version, e.g. `1.7`
    pub version: String,
    /// Whether the document permits page assembly
    pub assembly_allowed: bool,
}

/// Read an entry of the document information dictionary
fn info_entry(graph: &DocumentGraph, key: &[u8]) -> Option<String> {
    let info = graph.document().trailer.get(b"Info").ok()?;
    let info = graph.resolve_dictionary(info)?;
    match graph.resolve(info.get(key).ok()?)? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Metadata of an opened graph
pub fn graph_metadata(graph: &DocumentGraph) -> Result<PdfMetadata> {
    let page_count = graph.page_count();
    if page_count == 0 {
        return Err(Error::EmptyPdf(graph.name().to_string()));
    }

    Ok(PdfMetadata {
        page_count,
        title: info_entry(graph, b"Title"),
        author: info_entry(graph, b"Author"),
        version: graph.document().version.clone(),
        assembly_allowed: graph.permissions().allows_assembly(),
    })
}

/// Extract metadata from a PDF file
pub fn extract_metadata(path: &Path) -> Result<PdfMetadata> {
    let graph = DocumentGraph::open(path)?;
    graph_metadata(&graph)
}

/// Count the number of pages in a PDF file
pub fn count_pages(path: &Path) -> Result<u32> {
    let graph = DocumentGraph::open(path)?;
    match graph.page_count() {
        0 => Err(Error::EmptyPdf(path.display().to_string())),
        count => Ok(count),
    }
}
