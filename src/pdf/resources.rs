//! Resource usage of a page's content stream

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::Object;

use super::graph::{DocumentGraph, PageHandle};
use crate::error::Result;

/// Resource categories whose entries are looked up by name from content streams
pub const NAMED_CATEGORIES: [&[u8]; 7] = [
    b"Font",
    b"XObject",
    b"ExtGState",
    b"ColorSpace",
    b"Pattern",
    b"Shading",
    b"Properties",
];

pub fn is_named_category(key: &[u8]) -> bool {
    NAMED_CATEGORIES.contains(&key)
}

/// Resource names referenced by a content stream, per category
#[derive(Debug, Default, Clone)]
pub struct UsedResources {
    names: HashMap<Vec<u8>, HashSet<Vec<u8>>>,
}

impl UsedResources {
    pub fn contains(&self, category: &[u8], name: &[u8]) -> bool {
        self.names
            .get(category)
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }

    pub fn count(&self, category: &[u8]) -> usize {
        self.names.get(category).map(HashSet::len).unwrap_or(0)
    }

    fn insert(&mut self, category: &[u8], name: &[u8]) {
        self.names
            .entry(category.to_vec())
            .or_default()
            .insert(name.to_vec());
    }
}

/// Scan the page's content stream for the resources it uses
pub fn used_resources(source: &DocumentGraph, page: PageHandle) -> Result<UsedResources> {
    let content = source.page_content(page)?;
    let content = Content::decode(&content)?;
    Ok(scan_operations(&content.operations))
}

pub fn scan_operations(operations: &[Operation]) -> UsedResources {
    let mut used = UsedResources::default();
    for operation in operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "Tf" => record_name(&mut used, b"Font", operands.first()),
            "Do" => record_name(&mut used, b"XObject", operands.first()),
            "gs" => record_name(&mut used, b"ExtGState", operands.first()),
            "cs" | "CS" => record_name(&mut used, b"ColorSpace", operands.first()),
            "scn" | "SCN" => record_name(&mut used, b"Pattern", operands.last()),
            "sh" => record_name(&mut used, b"Shading", operands.first()),
            "BDC" | "DP" => record_name(&mut used, b"Properties", operands.get(1)),
            _ => {}
        }
        // inline image dictionaries can name a color space resource
        for operand in operands {
            let dict = match operand {
                Object::Dictionary(dict) => dict,
                Object::Stream(stream) => &stream.dict,
                _ => continue,
            };
            for key in [&b"CS"[..], &b"ColorSpace"[..]] {
                record_name(&mut used, b"ColorSpace", dict.get(key).ok());
            }
        }
    }
    used
}

fn record_name(used: &mut UsedResources, category: &[u8], operand: Option<&Object>) {
    if let Some(Object::Name(name)) = operand {
        used.insert(category, name);
    }
}
