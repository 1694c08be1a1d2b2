//! Interactive form of a destination graph

use std::collections::HashSet;

use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::destination::DestinationGraph;
use super::sanitizer::annotations_on_pages;
use crate::error::Result;

/// Point the destination catalog's `/AcroForm` at the root fields of every widget on its pages.
///
/// Nothing is written when no page carries a form widget.
pub(crate) fn rebuild_acroform(destination: &mut DestinationGraph) -> Result<()> {
    let widgets = annotations_on_pages(&destination.document, destination.page_ids());
    let fields = root_fields(&destination.document, &widgets);
    if fields.is_empty() {
        return Ok(());
    }
    debug!("Writing AcroForm with {} root fields", fields.len());

    let acroform = Dictionary::from_iter(vec![(
        "Fields",
        Object::Array(fields.into_iter().map(Object::Reference).collect()),
    )]);
    let catalog_id = destination.catalog_id();
    destination
        .document
        .get_dictionary_mut(catalog_id)?
        .set("AcroForm", Object::Dictionary(acroform));
    Ok(())
}

/// Top-most field of every widget that belongs to a form field, in first-seen order
fn root_fields(document: &Document, annotations: &[ObjectId]) -> Vec<ObjectId> {
    let mut roots = Vec::new();
    let mut seen = HashSet::new();
    for annotation in annotations {
        let dict = match document.get_dictionary(*annotation) {
            Ok(dict) => dict,
            Err(_) => continue,
        };
        let is_widget =
            matches!(dict.get(b"Subtype"), Ok(Object::Name(s)) if s.as_slice() == b"Widget");
        if !is_widget {
            continue;
        }

        let mut root = *annotation;
        let mut is_field = dict.has(b"FT") || dict.has(b"T");
        let mut visited = HashSet::from([root]);
        while let Ok(Object::Reference(parent)) =
            document.get_dictionary(root).and_then(|d| d.get(b"Parent"))
        {
            if !visited.insert(*parent) || document.get_dictionary(*parent).is_err() {
                break;
            }
            root = *parent;
            is_field = true;
        }
        if is_field && seen.insert(root) {
            roots.push(root);
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::copier::PageCopier;
    use crate::pdf::destination::{FinishOptions, PdfVersion};
    use crate::pdf::graph::fixtures::*;
    use crate::pdf::graph::DocumentGraph;

    fn form_document() -> Fixture {
        let mut fixture = document_with_pages(2);
        for page in 0..2 {
            let widget = fixture.document.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Annot".to_vec())),
                ("Subtype", Object::Name(b"Widget".to_vec())),
                ("FT", Object::Name(b"Tx".to_vec())),
                ("T", Object::string_literal(format!("name{}", page))),
                ("Rect", Object::Array(vec![0.into(), 0.into(), 50.into(), 20.into()])),
            ]));
            push_annotation(&mut fixture, page, widget);
        }
        fixture
    }

    #[test]
    fn test_acroform_lists_fields_on_destination_pages() {
        let source = DocumentGraph::from_document("form.pdf", form_document().document);
        let mut destination = DestinationGraph::new(PdfVersion::V1_5);
        PageCopier::default()
            .copy_of(&source, source.page(2).unwrap(), &mut destination)
            .unwrap();

        let finished = destination
            .finish(&FinishOptions {
                form_fields: true,
                ..Default::default()
            })
            .unwrap();
        let catalog = finished.document.catalog().unwrap();
        let acroform = catalog.get(b"AcroForm").unwrap().as_dict().unwrap();
        let fields = acroform.get(b"Fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 1);
        let field = finished
            .document
            .get_dictionary(fields[0].as_reference().unwrap())
            .unwrap();
        assert_eq!(field.get(b"T").unwrap().as_str().unwrap(), b"name1");
    }

    #[test]
    fn test_no_acroform_without_widgets() {
        let source = DocumentGraph::from_document("plain.pdf", document_with_pages(1).document);
        let mut destination = DestinationGraph::new(PdfVersion::V1_5);
        PageCopier::default()
            .copy_of(&source, source.page(1).unwrap(), &mut destination)
            .unwrap();
        let finished = destination
            .finish(&FinishOptions {
                form_fields: true,
                ..Default::default()
            })
            .unwrap();
        assert!(finished.document.catalog().unwrap().get(b"AcroForm").is_err());
    }
}
