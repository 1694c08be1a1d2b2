//! Destination graphs being assembled from copied pages

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::Local;
use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::forms;
use super::graph::GraphId;
use super::lookup::ObjectLookupTable;
use super::sanitizer::{self, SanitizeReport};
use crate::error::{Error, Result};
use crate::geometry::RectangularBox;

/// PDF header version written to outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PdfVersion {
    V1_4,
    #[default]
    V1_5,
    V1_6,
    V1_7,
    V2_0,
}

impl PdfVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfVersion::V1_4 => "1.4",
            PdfVersion::V1_5 => "1.5",
            PdfVersion::V1_6 => "1.6",
            PdfVersion::V1_7 => "1.7",
            PdfVersion::V2_0 => "2.0",
        }
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PdfVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1.4" => Ok(PdfVersion::V1_4),
            "1.5" => Ok(PdfVersion::V1_5),
            "1.6" => Ok(PdfVersion::V1_6),
            "1.7" => Ok(PdfVersion::V1_7),
            "2.0" => Ok(PdfVersion::V2_0),
            other => Err(Error::InvalidPlan(format!("Unsupported PDF version: {}", other))),
        }
    }
}

/// How a finished destination is written
#[derive(Debug, Clone, Default)]
pub struct FinishOptions {
    pub version: PdfVersion,
    pub compress: bool,
    /// Build an AcroForm from the copied widgets
    pub form_fields: bool,
}

/// A link whose target page is only known in source terms
#[derive(Debug, Clone)]
pub(crate) struct PendingLink {
    /// Copied annotation that carried the destination
    pub annotation: ObjectId,
    pub graph: GraphId,
    /// Target page in the source graph
    pub page: ObjectId,
    pub view: Vec<Object>,
    /// Copied GoTo action without `/D`, when the destination came from one rather than `/Dest`
    pub action: Option<Dictionary>,
}

/// A finished document ready to be staged
#[derive(Debug)]
pub struct FinishedDocument {
    pub document: Document,
    pub pages: usize,
    pub report: SanitizeReport,
}

/// One output unit under construction
#[derive(Debug)]
pub struct DestinationGraph {
    pub(crate) document: Document,
    pub(crate) lookup: ObjectLookupTable,
    pub(crate) links: Vec<PendingLink>,
    pub(crate) annotations: HashSet<ObjectId>,
    catalog_id: ObjectId,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl DestinationGraph {
    pub fn new(version: PdfVersion) -> Self {
        let mut document = Document::with_version(version.as_str());
        let pages_id = document.new_object_id();
        let catalog_id = document.new_object_id();
        document.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Count", Object::Integer(0)),
                ("Kids", Object::Array(vec![])),
            ])),
        );
        document.objects.insert(
            catalog_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Catalog".to_vec())),
                ("Pages", Object::Reference(pages_id)),
            ])),
        );
        document.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            document,
            lookup: ObjectLookupTable::new(),
            links: Vec::new(),
            annotations: HashSet::new(),
            catalog_id,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Destination pages in output order
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.kids
    }

    pub fn lookup(&self) -> &ObjectLookupTable {
        &self.lookup
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn catalog_id(&self) -> ObjectId {
        self.catalog_id
    }

    pub(crate) fn reserve_id(&mut self) -> ObjectId {
        self.document.new_object_id()
    }

    pub(crate) fn set_object(&mut self, id: ObjectId, object: Object) {
        self.document.objects.insert(id, object);
    }

    /// Attach a fully copied page dictionary to the page tree
    pub(crate) fn push_page(&mut self, id: ObjectId, mut page: Dictionary) {
        page.set("Parent", Object::Reference(self.pages_id));
        self.document.objects.insert(id, Object::Dictionary(page));
        self.kids.push(id);
    }

    /// Set both MediaBox and CropBox of a destination page
    pub fn set_page_boxes(&mut self, page: ObjectId, area: &RectangularBox) -> Result<()> {
        if !self.kids.contains(&page) {
            return Err(Error::General(format!(
                "Object {} {} is not a page of this document",
                page.0, page.1
            )));
        }
        let dict = self.document.get_dictionary_mut(page)?;
        dict.set("MediaBox", area.to_object());
        dict.set("CropBox", area.to_object());
        Ok(())
    }

    /// Run the reference sanitizer over everything copied so far
    pub fn sanitize(&mut self) -> SanitizeReport {
        sanitizer::sanitize(self)
    }

    /// Sanitize, complete the page tree and return the document to be written
    pub fn finish(mut self, options: &FinishOptions) -> Result<FinishedDocument> {
        let report = self.sanitize();
        if options.form_fields {
            forms::rebuild_acroform(&mut self)?;
        }
        self.write_page_tree()?;
        self.write_info();

        self.document.version = options.version.to_string();
        let pruned = self.document.prune_objects();
        debug!(
            "Finished destination with {} pages, pruned {} unreachable objects",
            self.kids.len(),
            pruned.len()
        );
        if options.compress {
            self.document.compress();
        }
        debug!("Clearing lookup table with {} entries", self.lookup.len());
        self.lookup.clear();

        Ok(FinishedDocument {
            pages: self.kids.len(),
            document: self.document,
            report,
        })
    }

    fn write_page_tree(&mut self) -> Result<()> {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = self.document.get_dictionary_mut(self.pages_id)?;
        pages.set("Count", Object::Integer(kids.len() as i64));
        pages.set("Kids", Object::Array(kids));
        Ok(())
    }

    fn write_info(&mut self) {
        let info = Dictionary::from_iter(vec![
            (
                "Producer",
                Object::string_literal(format!("pdf-assemble {}", env!("CARGO_PKG_VERSION"))),
            ),
            (
                "CreationDate",
                Object::string_literal(Local::now().format("D:%Y%m%d%H%M%S").to_string()),
            ),
        ]);
        let info_id = self.document.add_object(info);
        self.document.trailer.set("Info", Object::Reference(info_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.7".parse::<PdfVersion>().unwrap(), PdfVersion::V1_7);
        assert_eq!(PdfVersion::default().to_string(), "1.5");
        assert!("3.1".parse::<PdfVersion>().is_err());
    }

    #[test]
    fn test_new_destination_is_empty() {
        let destination = DestinationGraph::new(PdfVersion::V1_6);
        assert_eq!(destination.page_count(), 0);
        assert!(destination.lookup().is_empty());
        assert!(destination.document().catalog().is_ok());
    }

    #[test]
    fn test_finish_writes_page_tree() {
        let mut destination = DestinationGraph::new(PdfVersion::V1_4);
        let page_id = destination.reserve_id();
        destination.push_page(
            page_id,
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                ),
            ]),
        );
        let area = RectangularBox::from_points(0.0, 0.0, 300.0, 300.0).unwrap();
        destination.set_page_boxes(page_id, &area).unwrap();
        assert!(destination.set_page_boxes((999, 0), &area).is_err());

        let finished = destination
            .finish(&FinishOptions {
                version: PdfVersion::V1_4,
                compress: false,
                form_fields: false,
            })
            .unwrap();
        assert_eq!(finished.pages, 1);
        assert_eq!(finished.document.version, "1.4");
        let pages = finished.document.get_pages();
        assert_eq!(pages.len(), 1);
        let page = finished.document.get_dictionary(pages[&1]).unwrap();
        assert_eq!(page.get(b"CropBox").unwrap(), &area.to_object());
        assert!(finished.document.trailer.get(b"Info").is_ok());
    }
}
