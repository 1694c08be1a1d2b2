//! Reference sanitizing of a destination graph
//!
//! Runs once every page of a destination has been copied. Link annotations get their
//! destinations back only when the target page made it into the same output, form field
//! trees are cut back to the widgets that are actually on a destination page, and signature
//! values are cleared since the signed byte ranges no longer exist.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::copier::is_widget;
use super::destination::DestinationGraph;

/// What the sanitizer changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Links pointed at their target's copy
    pub rewritten: usize,
    /// Links left without a destination because their target page was not copied
    pub removed: usize,
    /// Widgets removed from their field's `/Kids` because they are on no destination page
    pub orphaned_kids: usize,
    pub signatures_cleared: usize,
}

pub(crate) fn sanitize(destination: &mut DestinationGraph) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    rewrite_links(destination, &mut report);

    let on_pages = annotations_on_pages(&destination.document, destination.page_ids());
    remove_orphaned_widgets(destination, &on_pages, &mut report);
    clear_signatures(&mut destination.document, &on_pages, &mut report);

    debug!(
        "Sanitized destination: {} links rewritten, {} removed, {} orphaned widgets, {} signatures cleared",
        report.rewritten, report.removed, report.orphaned_kids, report.signatures_cleared
    );
    report
}

fn rewrite_links(destination: &mut DestinationGraph, report: &mut SanitizeReport) {
    let links = std::mem::take(&mut destination.links);
    for link in links {
        let target = destination
            .lookup
            .get(link.graph, link.page)
            .filter(|id| destination.page_ids().contains(id));
        let target = match target {
            Some(target) => target,
            None => {
                warn!(
                    "Removing link destination of annotation {} {} R, its target page was not copied",
                    link.annotation.0, link.annotation.1
                );
                report.removed += 1;
                continue;
            }
        };
        let annotation = match destination.document.get_dictionary_mut(link.annotation) {
            Ok(annotation) => annotation,
            Err(_) => continue,
        };
        let mut dest = Vec::with_capacity(link.view.len() + 1);
        dest.push(Object::Reference(target));
        dest.extend(link.view);
        match link.action {
            Some(mut action) => {
                action.set("D", Object::Array(dest));
                annotation.set("A", Object::Dictionary(action));
            }
            None => annotation.set("Dest", Object::Array(dest)),
        }
        report.rewritten += 1;
    }
}

/// Annotations listed in the `/Annots` of the given pages
pub(crate) fn annotations_on_pages(document: &Document, pages: &[ObjectId]) -> Vec<ObjectId> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    for page in pages {
        let annots = match document.get_dictionary(*page).and_then(|p| p.get(b"Annots")) {
            Ok(Object::Array(annots)) => annots,
            _ => continue,
        };
        for annot in annots {
            if let Object::Reference(id) = annot {
                if seen.insert(*id) {
                    found.push(*id);
                }
            }
        }
    }
    found
}

fn parent_of(dict: &Dictionary) -> Option<ObjectId> {
    match dict.get(b"Parent") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    }
}

fn remove_orphaned_widgets(
    destination: &mut DestinationGraph,
    on_pages: &[ObjectId],
    report: &mut SanitizeReport,
) {
    let on_pages: HashSet<ObjectId> = on_pages.iter().copied().collect();
    let mut orphans_by_field: HashMap<ObjectId, HashSet<ObjectId>> = HashMap::new();
    for annotation in &destination.annotations {
        if on_pages.contains(annotation) {
            continue;
        }
        let dict = match destination.document.get_dictionary(*annotation) {
            Ok(dict) if is_widget(dict) => dict,
            _ => continue,
        };
        if let Some(parent) = parent_of(dict) {
            orphans_by_field.entry(parent).or_default().insert(*annotation);
        }
    }

    for (field, orphans) in orphans_by_field {
        let field = match destination.document.get_dictionary_mut(field) {
            Ok(field) => field,
            Err(_) => continue,
        };
        if let Ok(Object::Array(kids)) = field.get_mut(b"Kids") {
            let before = kids.len();
            kids.retain(|kid| !matches!(kid, Object::Reference(id) if orphans.contains(id)));
            let removed = before - kids.len();
            if removed > 0 {
                warn!("Removed {} widgets not on any output page from a form field", removed);
            }
            report.orphaned_kids += removed;
        }
    }
}

fn clear_signatures(document: &mut Document, on_pages: &[ObjectId], report: &mut SanitizeReport) {
    let mut signature_fields = Vec::new();
    let mut visited = HashSet::new();
    for annotation in on_pages {
        let mut current = Some(*annotation);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let dict = match document.get_dictionary(id) {
                Ok(dict) => dict,
                Err(_) => break,
            };
            let is_signature =
                matches!(dict.get(b"FT"), Ok(Object::Name(ft)) if ft.as_slice() == b"Sig");
            if is_signature && dict.has(b"V") {
                signature_fields.push(id);
            }
            current = parent_of(dict);
        }
    }

    for id in signature_fields {
        if let Ok(field) = document.get_dictionary_mut(id) {
            field.remove(b"V");
            report.signatures_cleared += 1;
        }
    }
    if report.signatures_cleared > 0 {
        warn!("Cleared {} signature values", report.signatures_cleared);
    }
}
