//! Source document graphs
//!
//! A [`DocumentGraph`] is one opened PDF held in memory as a lopdf object graph.
//! Objects are addressed by their lopdf `ObjectId`, scoped by the graph's [`GraphId`]
//! so identities from different sources never collide.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_RESOLVE_DEPTH: usize = 32;

/// Process-unique identity of an opened graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    fn next() -> Self {
        GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A page within a specific graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle {
    pub graph: GraphId,
    /// 1-based page number
    pub number: u32,
    pub id: ObjectId,
}

/// A destination resolved to a page of the source graph
#[derive(Debug, Clone, PartialEq)]
pub struct ExplicitDestination {
    pub page: ObjectId,
    /// Fit type and its parameters, e.g. `/XYZ 0 792 null`
    pub view: Vec<Object>,
}

/// Access permissions declared by the document's encryption dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    flags: Option<i64>,
    revision: i64,
}

impl Permissions {
    const MODIFY: i64 = 1 << 3;
    const ASSEMBLE: i64 = 1 << 10;

    /// Permissions of an unencrypted document
    pub fn unrestricted() -> Self {
        Self { flags: None, revision: 0 }
    }

    pub fn from_flags(flags: i64, revision: i64) -> Self {
        Self { flags: Some(flags), revision }
    }

    /// Whether pages may be inserted, rotated, deleted or extracted
    pub fn allows_assembly(&self) -> bool {
        match self.flags {
            None => true,
            // revision 2 handlers have no dedicated assemble bit
            Some(flags) if self.revision <= 2 => flags & Self::MODIFY != 0,
            Some(flags) => flags & Self::ASSEMBLE != 0,
        }
    }

    pub fn ensure_assembly(&self, document: &str) -> Result<()> {
        if self.allows_assembly() {
            Ok(())
        } else {
            Err(Error::Permission {
                document: document.to_string(),
                permission: "document assembly",
            })
        }
    }
}

/// An opened source document
#[derive(Debug)]
pub struct DocumentGraph {
    id: GraphId,
    name: String,
    document: Document,
    pages: Vec<ObjectId>,
    page_numbers: HashMap<ObjectId, u32>,
}

impl DocumentGraph {
    /// Open and parse a PDF file
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        debug!("Opening input {}", path.display());
        let document = Document::load(path).map_err(|cause| Error::SourceOpen {
            path: path.to_path_buf(),
            cause,
        })?;
        Ok(Self::from_document(path.display().to_string(), document))
    }

    /// Parse a PDF held in memory
    pub fn load_mem(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        let document = Document::load_mem(bytes).map_err(|cause| Error::SourceOpen {
            path: name.clone().into(),
            cause,
        })?;
        Ok(Self::from_document(name, document))
    }

    /// Wrap an already parsed document
    pub fn from_document(name: impl Into<String>, document: Document) -> Self {
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        let page_numbers = pages
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as u32 + 1))
            .collect();
        Self {
            id: GraphId::next(),
            name: name.into(),
            document,
            pages,
            page_numbers,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Identity used in messages and output naming
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// The page at 1-based position `number`
    pub fn page(&self, number: u32) -> Result<PageHandle> {
        let out_of_range = || Error::PageOutOfRange {
            document: self.name.clone(),
            page: number,
            page_count: self.page_count(),
        };
        if number == 0 {
            return Err(out_of_range());
        }
        let id = self
            .pages
            .get(number as usize - 1)
            .copied()
            .ok_or_else(out_of_range)?;
        Ok(PageHandle { graph: self.id, number, id })
    }

    pub fn pages(&self) -> impl Iterator<Item = PageHandle> + '_ {
        self.pages.iter().enumerate().map(move |(i, id)| PageHandle {
            graph: self.id,
            number: i as u32 + 1,
            id: *id,
        })
    }

    /// The 1-based page number of a page object, if `id` is a page of this graph
    pub fn page_number_of(&self, id: ObjectId) -> Option<u32> {
        self.page_numbers.get(&id).copied()
    }

    pub fn permissions(&self) -> Permissions {
        let encrypt = match self.document.trailer.get(b"Encrypt") {
            Ok(obj) => obj,
            Err(_) => return Permissions::unrestricted(),
        };
        let dict = match self.resolve_dictionary(encrypt) {
            Some(dict) => dict,
            None => return Permissions::unrestricted(),
        };
        let flags = dict.get(b"P").and_then(Object::as_i64).ok();
        let revision = dict.get(b"R").and_then(Object::as_i64).unwrap_or(3);
        match flags {
            Some(flags) => Permissions::from_flags(flags, revision),
            None => Permissions::unrestricted(),
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.document.objects.get(&id)
    }

    /// Follow references until a direct object is reached
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        let mut current = obj;
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(id) => current = self.object(*id)?,
                other => return Some(other),
            }
        }
        None
    }

    pub fn resolve_dictionary<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj)? {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    /// Ensure a handle was issued by this graph
    pub fn check_handle(&self, page: PageHandle) -> Result<()> {
        let index = (page.number as usize).checked_sub(1);
        if page.graph == self.id && index.and_then(|i| self.pages.get(i)) == Some(&page.id) {
            Ok(())
        } else {
            Err(Error::General(format!(
                "Page handle {} does not belong to {}",
                page.number, self.name
            )))
        }
    }

    pub fn page_dictionary(&self, page: PageHandle) -> Result<&Dictionary> {
        self.check_handle(page)?;
        Ok(self.document.get_dictionary(page.id)?)
    }

    /// Decoded content of a page, all content streams joined in order
    pub fn page_content(&self, page: PageHandle) -> Result<Vec<u8>> {
        let dict = self.page_dictionary(page)?;
        let contents = match dict.get(b"Contents") {
            Ok(contents) => contents,
            Err(_) => return Ok(Vec::new()),
        };
        let streams: Vec<&Object> = match contents {
            Object::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let mut content = Vec::new();
        for stream in streams {
            let stream = match self.resolve(stream) {
                Some(Object::Stream(stream)) => stream,
                _ => {
                    return Err(Error::General(format!(
                        "Page {} of {} has a content entry that is not a stream",
                        page.number, self.name
                    )))
                }
            };
            if stream.dict.has(b"Filter") {
                content.extend(stream.decompressed_content()?);
            } else {
                content.extend_from_slice(&stream.content);
            }
            content.push(b'\n');
        }
        Ok(content)
    }

    /// Look up a page attribute, walking the page tree for inheritable keys
    pub fn inherited_attribute(&self, page: PageHandle, key: &[u8]) -> Option<&Object> {
        let mut dict = self.page_dictionary(page).ok()?;
        let mut visited = HashSet::new();
        loop {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            let parent = match dict.get(b"Parent") {
                Ok(Object::Reference(id)) => *id,
                _ => return None,
            };
            if !visited.insert(parent) {
                return None;
            }
            dict = self.document.get_dictionary(parent).ok()?;
        }
    }

    /// Resolve a destination (explicit array, name or string) to a page of this graph
    pub fn resolve_destination(&self, dest: &Object) -> Option<ExplicitDestination> {
        match self.resolve(dest)? {
            Object::Array(items) => self.explicit_destination(items),
            Object::Name(name) | Object::String(name, _) => {
                let target = self.named_destination(name)?;
                match self.resolve(target)? {
                    Object::Array(items) => self.explicit_destination(items),
                    // `<< /D [...] >>` form used by the /Dests dictionary
                    Object::Dictionary(dict) => match self.resolve(dict.get(b"D").ok()?)? {
                        Object::Array(items) => self.explicit_destination(items),
                        _ => None,
                    },
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn explicit_destination(&self, items: &[Object]) -> Option<ExplicitDestination> {
        let (first, rest) = items.split_first()?;
        let page = match first {
            Object::Reference(id) if self.page_numbers.contains_key(id) => *id,
            // page indices are only valid in remote destinations, tolerate them here
            Object::Integer(index) if *index >= 0 => *self.pages.get(*index as usize)?,
            _ => return None,
        };
        let view = rest
            .iter()
            .filter(|o| !matches!(o, Object::Reference(_)))
            .cloned()
            .collect();
        Some(ExplicitDestination { page, view })
    }

    fn named_destination(&self, name: &[u8]) -> Option<&Object> {
        let catalog = self.document.catalog().ok()?;
        if let Some(dests) = catalog.get(b"Dests").ok().and_then(|d| self.resolve_dictionary(d)) {
            if let Ok(found) = dests.get(name) {
                return Some(found);
            }
        }
        let names = catalog.get(b"Names").ok().and_then(|n| self.resolve_dictionary(n))?;
        let tree = names.get(b"Dests").ok().and_then(|d| self.resolve_dictionary(d))?;
        self.name_tree_lookup(tree, name, 0)
    }

    fn name_tree_lookup<'a>(&'a self, node: &'a Dictionary, name: &[u8], depth: usize) -> Option<&'a Object> {
        if depth > MAX_RESOLVE_DEPTH {
            return None;
        }
        if let Some(Object::Array(pairs)) = node.get(b"Names").ok().and_then(|n| self.resolve(n)) {
            for pair in pairs.chunks(2) {
                if let [key, value] = pair {
                    if let Some(Object::String(key, _)) = self.resolve(key) {
                        if key.as_slice() == name {
                            return Some(value);
                        }
                    }
                }
            }
        }
        if let Some(Object::Array(kids)) = node.get(b"Kids").ok().and_then(|k| self.resolve(k)) {
            for kid in kids {
                let kid = match self.resolve_dictionary(kid) {
                    Some(kid) => kid,
                    None => continue,
                };
                if !within_limits(self, kid, name) {
                    continue;
                }
                if let Some(found) = self.name_tree_lookup(kid, name, depth + 1) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Release the graph. Consumes `self`; the parsed document is dropped on return.
    pub fn close(self) {
        debug!("Closing {}", self.name);
    }
}

fn within_limits(graph: &DocumentGraph, node: &Dictionary, name: &[u8]) -> bool {
    let limits = match node.get(b"Limits").ok().and_then(|l| graph.resolve(l)) {
        Some(Object::Array(limits)) => limits,
        _ => return true,
    };
    match (limits.first().and_then(|o| graph.resolve(o)), limits.get(1).and_then(|o| graph.resolve(o))) {
        (Some(Object::String(low, _)), Some(Object::String(high, _))) => {
            low.as_slice() <= name && name <= high.as_slice()
        }
        _ => true,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_pages_are_numbered_from_one() {
        let fixture = document_with_pages(3);
        let graph = DocumentGraph::from_document("three.pdf", fixture.document);
        assert_eq!(graph.page_count(), 3);
        let page = graph.page(2).unwrap();
        assert_eq!(page.number, 2);
        assert_eq!(page.id, fixture.page_ids[1]);
        assert_eq!(graph.page_number_of(fixture.page_ids[2]), Some(3));
    }

    #[test]
    fn test_page_out_of_range() {
        let graph = DocumentGraph::from_document("one.pdf", document_with_pages(1).document);
        assert!(matches!(
            graph.page(0),
            Err(Error::PageOutOfRange { page: 0, .. })
        ));
        assert!(matches!(
            graph.page(2),
            Err(Error::PageOutOfRange { page: 2, page_count: 1, .. })
        ));
    }

    #[test]
    fn test_handle_from_other_graph_is_rejected() {
        let first = DocumentGraph::from_document("a.pdf", document_with_pages(1).document);
        let second = DocumentGraph::from_document("b.pdf", document_with_pages(1).document);
        let page = first.page(1).unwrap();
        assert!(second.page_dictionary(page).is_err());
        assert!(first.page_dictionary(page).is_ok());
    }

    #[test]
    fn test_inherited_attributes() {
        let graph = DocumentGraph::from_document("doc.pdf", document_with_pages(2).document);
        let page = graph.page(1).unwrap();
        assert!(matches!(
            graph.inherited_attribute(page, b"Resources"),
            Some(Object::Reference(_))
        ));
        assert!(matches!(
            graph.inherited_attribute(page, b"MediaBox"),
            Some(Object::Array(_))
        ));
        assert!(graph.inherited_attribute(page, b"Rotate").is_none());
    }

    #[test]
    fn test_unencrypted_document_allows_assembly() {
        let graph = DocumentGraph::from_document("doc.pdf", document_with_pages(1).document);
        assert!(graph.permissions().allows_assembly());
    }

    #[test]
    fn test_assembly_permission_bits() {
        let mut fixture = document_with_pages(1);
        let encrypt_id = fixture.document.add_object(Dictionary::from_iter(vec![
            ("Filter", Object::Name(b"Standard".to_vec())),
            ("R", Object::Integer(3)),
            ("P", Object::Integer(-1 & !(1 << 10))),
        ]));
        fixture.document.trailer.set("Encrypt", Object::Reference(encrypt_id));
        let graph = DocumentGraph::from_document("locked.pdf", fixture.document);
        assert!(!graph.permissions().allows_assembly());
        assert!(matches!(
            graph.permissions().ensure_assembly("locked.pdf"),
            Err(Error::Permission { .. })
        ));

        assert!(Permissions::from_flags(1 << 3, 2).allows_assembly());
        assert!(!Permissions::from_flags(1 << 10, 2).allows_assembly());
    }

    #[test]
    fn test_resolve_named_destination() {
        let mut fixture = document_with_pages(2);
        let target = fixture.page_ids[1];
        let dests_id = fixture.document.add_object(Dictionary::from_iter(vec![(
            "Names",
            Object::Array(vec![
                Object::string_literal("chapter"),
                Object::Array(vec![Object::Reference(target), Object::Name(b"Fit".to_vec())]),
            ]),
        )]));
        let catalog_id = fixture.document.trailer.get(b"Root").unwrap().as_reference().unwrap();
        fixture
            .document
            .get_dictionary_mut(catalog_id)
            .unwrap()
            .set(
                "Names",
                Object::Dictionary(Dictionary::from_iter(vec![("Dests", Object::Reference(dests_id))])),
            );
        let graph = DocumentGraph::from_document("named.pdf", fixture.document);

        let resolved = graph
            .resolve_destination(&Object::string_literal("chapter"))
            .unwrap();
        assert_eq!(resolved.page, target);
        assert_eq!(resolved.view, vec![Object::Name(b"Fit".to_vec())]);
        assert!(graph
            .resolve_destination(&Object::string_literal("missing"))
            .is_none());
    }
}
