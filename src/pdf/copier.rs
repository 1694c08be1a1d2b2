//! Page copying between object graphs
//!
//! A page is copied together with everything it transitively references. Every indirect
//! object goes through the destination's [`ObjectLookupTable`](super::lookup::ObjectLookupTable),
//! so an object shared by several copied pages (or reached twice through a cycle) is copied
//! exactly once per destination.
//!
//! Other pages are never pulled in through references: a reference to a page is kept only if
//! that page already has a copy in the destination. Link destinations are not copied at all;
//! they are recorded as pending links and resolved by the sanitizer once every page is in place.

use std::fmt;

use log::{trace, warn};
use lopdf::{Dictionary, Object, ObjectId, Stream};

use super::destination::{DestinationGraph, PendingLink};
use super::graph::{DocumentGraph, PageHandle, INHERITABLE_PAGE_KEYS};
use super::resources;
use crate::error::Result;

/// How much of a page's resource dictionary is copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// Copy the resource dictionary as is, including entries the page never uses
    #[default]
    Full,
    /// Copy only the resources named by the page's content stream
    Optimized,
}

/// Non-fatal problems found while copying a page
#[derive(Debug, Clone, PartialEq)]
pub enum CopyWarning {
    /// A referenced object is missing from the source; the reference was dropped
    UnresolvedReference {
        document: String,
        page: u32,
        object: ObjectId,
    },
    /// The content stream could not be scanned; resources were copied in full
    MalformedContent {
        document: String,
        page: u32,
        reason: String,
    },
}

impl fmt::Display for CopyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyWarning::UnresolvedReference { document, page, object } => write!(
                f,
                "Page {} of {}: unable to resolve object {} {} R, reference dropped",
                page, document, object.0, object.1
            ),
            CopyWarning::MalformedContent { document, page, reason } => write!(
                f,
                "Page {} of {}: unable to scan content stream ({}), all resources copied",
                page, document, reason
            ),
        }
    }
}

/// Result of copying one page
#[derive(Debug)]
pub struct CopiedPage {
    /// The new page in the destination graph
    pub id: ObjectId,
    pub warnings: Vec<CopyWarning>,
}

/// Copies pages from a source graph into a destination graph
#[derive(Debug, Clone, Copy, Default)]
pub struct PageCopier {
    mode: CopyMode,
}

impl PageCopier {
    pub fn new(mode: CopyMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> CopyMode {
        self.mode
    }

    /// Copy `page` of `source` and append it to `destination`.
    ///
    /// Copying a page that already has a copy in `destination` appends another page sharing
    /// the same resources.
    pub fn copy_of(
        &self,
        source: &DocumentGraph,
        page: PageHandle,
        destination: &mut DestinationGraph,
    ) -> Result<CopiedPage> {
        let page_dict = source.page_dictionary(page)?;
        let graph = source.id();
        let repeat = destination.lookup.get(graph, page.id).is_some();
        let new_page = destination.reserve_id();
        if !repeat {
            destination.lookup.record(graph, page.id, new_page);
        }
        trace!("Copying page {} of {} as {:?}", page.number, source.name(), new_page);

        let mut session = CopySession {
            source,
            destination,
            page,
            new_page,
            warnings: Vec::new(),
        };

        let mut copy = Dictionary::new();
        for (key, value) in page_dict.iter() {
            match key.as_slice() {
                b"Parent" | b"B" | b"Annots" | b"Resources" => continue,
                _ => {}
            }
            if let Some(value) = session.copy_value(value) {
                copy.set(key.clone(), value);
            }
        }

        for key in INHERITABLE_PAGE_KEYS {
            if key == b"Resources" || page_dict.has(key) {
                continue;
            }
            if let Some(value) = source.inherited_attribute(page, key) {
                if let Some(value) = session.copy_value(value) {
                    copy.set(key.to_vec(), value);
                }
            }
        }
        if !copy.has(b"MediaBox") {
            trace!("Page {} of {} has no MediaBox, using Letter", page.number, source.name());
            copy.set(
                "MediaBox",
                Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            );
        }

        if let Some(resources) = source.inherited_attribute(page, b"Resources") {
            let resources = match self.mode {
                CopyMode::Full => session.copy_value(resources),
                CopyMode::Optimized => session.copy_used_resources(resources),
            };
            if let Some(resources) = resources {
                copy.set("Resources", resources);
            }
        }

        if let Ok(annots) = page_dict.get(b"Annots") {
            let annots = session.copy_page_annotations(annots, repeat);
            if !annots.is_empty() {
                copy.set("Annots", Object::Array(annots));
            }
        }

        copy.set("Type", Object::Name(b"Page".to_vec()));
        let CopySession {
            destination,
            warnings,
            ..
        } = session;
        destination.push_page(new_page, copy);

        Ok(CopiedPage {
            id: new_page,
            warnings,
        })
    }
}

struct CopySession<'a> {
    source: &'a DocumentGraph,
    destination: &'a mut DestinationGraph,
    page: PageHandle,
    new_page: ObjectId,
    warnings: Vec<CopyWarning>,
}

impl<'a> CopySession<'a> {
    /// Copy a value, returning `None` when it must be dropped
    fn copy_value(&mut self, value: &'a Object) -> Option<Object> {
        match value {
            Object::Reference(id) => self.copy_reference(*id).map(Object::Reference),
            Object::Dictionary(dict) => Some(Object::Dictionary(self.copy_dictionary(dict))),
            Object::Array(items) => Some(Object::Array(
                items
                    .iter()
                    .map(|item| self.copy_value(item).unwrap_or(Object::Null))
                    .collect(),
            )),
            Object::Stream(stream) => Some(Object::Stream(Stream {
                dict: self.copy_dictionary(&stream.dict),
                content: stream.content.clone(),
                allows_compression: stream.allows_compression,
                start_position: None,
            })),
            other => Some(other.clone()),
        }
    }

    fn copy_dictionary(&mut self, dict: &'a Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if let Some(value) = self.copy_value(value) {
                copy.set(key.clone(), value);
            }
        }
        copy
    }

    fn copy_reference(&mut self, id: ObjectId) -> Option<ObjectId> {
        let source = self.source;
        let graph = source.id();
        if let Some(mapped) = self.destination.lookup.get(graph, id) {
            return Some(mapped);
        }
        let object = match source.object(id) {
            Some(object) => object,
            None => {
                self.unresolved(id);
                return None;
            }
        };
        if source.page_number_of(id).is_some() {
            trace!("Dropping reference to page object {:?} not in the destination", id);
            return None;
        }
        if let Object::Dictionary(dict) = object {
            if has_type(dict, b"Pages") {
                return None;
            }
            if is_annotation(dict) {
                return self.copy_annotation(Some(id), dict, false);
            }
        }

        let new_id = self.destination.reserve_id();
        self.destination.lookup.record(graph, id, new_id);
        let copy = self.copy_value(object).unwrap_or(Object::Null);
        self.destination.set_object(new_id, copy);
        Some(new_id)
    }

    /// Copy the entries of the page's `/Annots` and point them at the new page
    fn copy_page_annotations(&mut self, annots: &'a Object, repeat: bool) -> Vec<Object> {
        let source = self.source;
        let items = match source.resolve(annots) {
            Some(Object::Array(items)) => items,
            _ => return Vec::new(),
        };

        let mut copied = Vec::new();
        for item in items {
            let (id, dict) = match item {
                Object::Reference(id) => match source.object(*id) {
                    Some(Object::Dictionary(dict)) => (Some(*id), dict),
                    Some(_) => continue,
                    None => {
                        self.unresolved(*id);
                        continue;
                    }
                },
                Object::Dictionary(dict) => (None, dict),
                _ => continue,
            };
            let existing = match id {
                Some(id) if !repeat => self.destination.lookup.get(source.id(), id),
                _ => None,
            };
            let new_id = match existing.or_else(|| self.copy_annotation(id, dict, repeat)) {
                Some(new_id) => new_id,
                None => continue,
            };
            if let Ok(annotation) = self.destination.document.get_dictionary_mut(new_id) {
                annotation.set("P", Object::Reference(self.new_page));
            }
            copied.push(Object::Reference(new_id));
        }
        copied
    }

    /// Copy an annotation without its page and destination entries.
    ///
    /// `fresh` copies are not recorded in the lookup table.
    fn copy_annotation(&mut self, id: Option<ObjectId>, annotation: &'a Dictionary, fresh: bool) -> Option<ObjectId> {
        let graph = self.source.id();
        let new_id = self.destination.reserve_id();
        if let (Some(id), false) = (id, fresh) {
            self.destination.lookup.record(graph, id, new_id);
        }

        let mut copy = Dictionary::new();
        for (key, value) in annotation.iter() {
            match key.as_slice() {
                b"P" => continue,
                b"Dest" => {
                    self.record_link(new_id, value, None);
                    continue;
                }
                b"A" => {
                    if let Some((action, dest)) = self.goto_action(value) {
                        let mut rest = Dictionary::new();
                        for (key, value) in action.iter().filter(|(key, _)| key.as_slice() != b"D") {
                            if let Some(value) = self.copy_value(value) {
                                rest.set(key.clone(), value);
                            }
                        }
                        self.record_link(new_id, dest, Some(rest));
                        continue;
                    }
                }
                _ => {}
            }
            if let Some(value) = self.copy_value(value) {
                copy.set(key.clone(), value);
            }
        }
        let parent = match copy.get(b"Parent") {
            Ok(Object::Reference(parent)) if fresh && is_widget(&copy) => Some(*parent),
            _ => None,
        };
        self.destination.set_object(new_id, Object::Dictionary(copy));
        self.destination.annotations.insert(new_id);
        if let Some(parent) = parent {
            self.add_kid(parent, new_id);
        }
        Some(new_id)
    }

    /// List a fresh widget copy among its field's `/Kids`
    fn add_kid(&mut self, field: ObjectId, widget: ObjectId) {
        let field = match self.destination.document.get_dictionary_mut(field) {
            Ok(field) => field,
            Err(_) => return,
        };
        match field.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => {
                if !kids.iter().any(|kid| matches!(kid, Object::Reference(id) if *id == widget)) {
                    kids.push(Object::Reference(widget));
                }
            }
            Ok(_) => {}
            Err(_) => field.set("Kids", Object::Array(vec![Object::Reference(widget)])),
        }
    }

    /// A GoTo action and its `/D` entry
    fn goto_action(&self, action: &'a Object) -> Option<(&'a Dictionary, &'a Object)> {
        let action = self.source.resolve_dictionary(action)?;
        match action.get(b"S") {
            Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => {
                action.get(b"D").ok().map(|dest| (action, dest))
            }
            _ => None,
        }
    }

    /// `action` is the copied GoTo action without its `/D`, when the destination came from one
    fn record_link(&mut self, annotation: ObjectId, dest: &'a Object, action: Option<Dictionary>) {
        match self.source.resolve_destination(dest) {
            Some(target) => self.destination.links.push(PendingLink {
                annotation,
                graph: self.source.id(),
                page: target.page,
                view: target.view,
                action,
            }),
            None => trace!(
                "Dropping unresolvable destination of annotation on page {} of {}",
                self.page.number,
                self.source.name()
            ),
        }
    }

    fn copy_used_resources(&mut self, resources: &'a Object) -> Option<Object> {
        let source = self.source;
        let dict = match source.resolve_dictionary(resources) {
            Some(dict) => dict,
            None => return self.copy_value(resources),
        };
        let used = match resources::used_resources(source, self.page) {
            Ok(used) => used,
            Err(e) => {
                let warning = CopyWarning::MalformedContent {
                    document: source.name().to_string(),
                    page: self.page.number,
                    reason: e.to_string(),
                };
                warn!("{}", warning);
                self.warnings.push(warning);
                return self.copy_value(resources);
            }
        };

        let mut rebuilt = Dictionary::new();
        for (category, value) in dict.iter() {
            if !resources::is_named_category(category) {
                if let Some(value) = self.copy_value(value) {
                    rebuilt.set(category.clone(), value);
                }
                continue;
            }
            let entries = match source.resolve_dictionary(value) {
                Some(entries) => entries,
                None => continue,
            };
            let mut subset = Dictionary::new();
            for (name, entry) in entries.iter() {
                if !used.contains(category, name) {
                    continue;
                }
                if let Some(entry) = self.copy_value(entry) {
                    subset.set(name.clone(), entry);
                }
            }
            if !subset.is_empty() {
                rebuilt.set(category.clone(), Object::Dictionary(subset));
            }
        }
        Some(Object::Dictionary(rebuilt))
    }

    fn unresolved(&mut self, object: ObjectId) {
        let warning = CopyWarning::UnresolvedReference {
            document: self.source.name().to_string(),
            page: self.page.number,
            object,
        };
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

fn has_type(dict: &Dictionary, expected: &[u8]) -> bool {
    matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name.as_slice() == expected)
}

/// Annotations are recognised by their type, or by carrying both a subtype and a rectangle
pub(crate) fn is_annotation(dict: &Dictionary) -> bool {
    has_type(dict, b"Annot") || (dict.has(b"Subtype") && dict.has(b"Rect") && !dict.has(b"BBox"))
}

pub(crate) fn is_widget(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Widget")
}
