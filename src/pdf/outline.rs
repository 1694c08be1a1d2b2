//! Document outline (bookmarks) reading

use std::collections::HashSet;

use lopdf::{Dictionary, Object, ObjectId};

use super::graph::DocumentGraph;
use super::text::decode_text_string;

/// A bookmark pointing at a page of the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    /// Depth in the outline tree, top-level items are level 1
    pub level: u32,
    pub title: String,
    /// 1-based page number of the bookmark's target
    pub page: u32,
}

/// Every outline item whose destination resolves to a page, in outline order
pub fn outline_items(graph: &DocumentGraph) -> Vec<OutlineItem> {
    let mut items = Vec::new();
    let root = graph
        .document()
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Outlines").ok())
        .and_then(|outlines| graph.resolve_dictionary(outlines));
    let first = match root.and_then(|root| first_child(root)) {
        Some(first) => first,
        None => return items,
    };
    let mut visited = HashSet::new();
    walk(graph, first, 1, &mut visited, &mut items);
    items
}

fn first_child(dict: &Dictionary) -> Option<ObjectId> {
    match dict.get(b"First") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

fn walk(
    graph: &DocumentGraph,
    first: ObjectId,
    level: u32,
    visited: &mut HashSet<ObjectId>,
    items: &mut Vec<OutlineItem>,
) {
    let mut current = Some(first);
    while let Some(id) = current {
        if !visited.insert(id) {
            return;
        }
        let item = match graph.document().get_dictionary(id) {
            Ok(item) => item,
            Err(_) => return,
        };
        if let Some(page) = target_page(graph, item) {
            let title = match item.get(b"Title").ok().and_then(|t| graph.resolve(t)) {
                Some(Object::String(bytes, _)) => decode_text_string(bytes),
                _ => String::new(),
            };
            items.push(OutlineItem { level, title, page });
        }
        if let Some(child) = first_child(item) {
            walk(graph, child, level + 1, visited, items);
        }
        current = match item.get(b"Next") {
            Ok(Object::Reference(next)) => Some(*next),
            _ => None,
        };
    }
}

fn target_page(graph: &DocumentGraph, item: &Dictionary) -> Option<u32> {
    let dest = match item.get(b"Dest") {
        Ok(dest) => dest,
        Err(_) => {
            let action = graph.resolve_dictionary(item.get(b"A").ok()?)?;
            match action.get(b"S") {
                Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => action.get(b"D").ok()?,
                _ => return None,
            }
        }
    };
    let dest = graph.resolve_destination(dest)?;
    graph.page_number_of(dest.page)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::pdf::graph::fixtures::Fixture;

    /// Attach a flat outline with one `(title, page index)` entry per item, plus a child
    /// under the first item when `child` is given
    pub fn add_outline(fixture: &mut Fixture, entries: &[(&str, usize)], child: Option<(&str, usize)>) {
        let outlines_id = fixture.document.new_object_id();
        let ids: Vec<ObjectId> = entries.iter().map(|_| fixture.document.new_object_id()).collect();
        for (i, (title, page)) in entries.iter().enumerate() {
            let mut item = Dictionary::from_iter(vec![
                ("Title", Object::string_literal(*title)),
                ("Parent", Object::Reference(outlines_id)),
                (
                    "Dest",
                    Object::Array(vec![
                        Object::Reference(fixture.page_ids[*page]),
                        Object::Name(b"Fit".to_vec()),
                    ]),
                ),
            ]);
            if i + 1 < ids.len() {
                item.set("Next", Object::Reference(ids[i + 1]));
            }
            if i > 0 {
                item.set("Prev", Object::Reference(ids[i - 1]));
            }
            if let (0, Some((child_title, child_page))) = (i, child) {
                let child_id = fixture.document.add_object(Dictionary::from_iter(vec![
                    ("Title", Object::string_literal(child_title)),
                    ("Parent", Object::Reference(ids[0])),
                    (
                        "Dest",
                        Object::Array(vec![
                            Object::Reference(fixture.page_ids[child_page]),
                            Object::Name(b"Fit".to_vec()),
                        ]),
                    ),
                ]));
                item.set("First", Object::Reference(child_id));
                item.set("Last", Object::Reference(child_id));
            }
            fixture.document.objects.insert(ids[i], Object::Dictionary(item));
        }
        let mut outlines = Dictionary::from_iter(vec![("Type", Object::Name(b"Outlines".to_vec()))]);
        if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
            outlines.set("First", Object::Reference(*first));
            outlines.set("Last", Object::Reference(*last));
        }
        fixture.document.objects.insert(outlines_id, Object::Dictionary(outlines));

        let catalog_id = match fixture.document.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => *id,
            _ => unreachable!("fixtures always have a catalog"),
        };
        fixture
            .document
            .get_dictionary_mut(catalog_id)
            .unwrap()
            .set("Outlines", Object::Reference(outlines_id));
    }
}
