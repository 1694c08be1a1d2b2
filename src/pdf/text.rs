//! Text shown on a page
//!
//! Only the string operands of the text showing operators are collected. Glyph codes are
//! taken as bytes; there is no font encoding or CMap lookup, which is enough to match
//! patterns in documents using simple encodings.

use lopdf::content::{Content, Operation};
use lopdf::Object;

use super::graph::{DocumentGraph, PageHandle};
use crate::error::Result;

/// Text of a page, one line per text line break operator
pub fn page_text(graph: &DocumentGraph, page: PageHandle) -> Result<String> {
    let content = graph.page_content(page)?;
    let content = Content::decode(&content)?;
    Ok(operations_text(&content.operations))
}

pub fn operations_text(operations: &[Operation]) -> String {
    let mut text = String::new();
    for operation in operations {
        match operation.operator.as_str() {
            "Tj" => push_strings(&mut text, &operation.operands),
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    push_strings(&mut text, items);
                }
            }
            "'" | "\"" => {
                new_line(&mut text);
                if let Some(shown) = operation.operands.last() {
                    push_strings(&mut text, std::slice::from_ref(shown));
                }
            }
            "T*" | "Td" | "TD" | "ET" => new_line(&mut text),
            _ => {}
        }
    }
    text.trim_end().to_string()
}

fn push_strings(text: &mut String, operands: &[Object]) {
    for operand in operands {
        if let Object::String(bytes, _) = operand {
            text.push_str(&decode_text_string(bytes));
        }
    }
}

fn new_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, UTF-8, or single-byte text
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| *b as char).collect(),
    }
}
