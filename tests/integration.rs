//! Integration tests for the PDF assemble library

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdf_assemble::pdf::{count_pages, CopyMode, CopyWarning};
use pdf_assemble::task::{
    execute, CombineReorderParameters, CopyPlanEntry, MixInput, MixParameters, OutputOptions,
    SplitParameters, SplitPolicy, TaskEvents, TaskParameters, TaskState,
};
use pdf_assemble::Error;
use tempfile::TempDir;

/// Records what a task reported
#[derive(Default)]
struct Recorder {
    steps: Vec<(u32, u32)>,
    states: Vec<TaskState>,
    releases: Vec<(usize, u32)>,
    warnings: Vec<CopyWarning>,
}

impl TaskEvents for Recorder {
    fn step_completed(&mut self, completed: u32, total: u32) {
        self.steps.push((completed, total));
    }

    fn warning(&mut self, warning: &CopyWarning) {
        self.warnings.push(warning.clone());
    }

    fn state_changed(&mut self, _from: TaskState, to: TaskState) {
        self.states.push(to);
    }

    fn source_released(&mut self, index: usize) {
        let completed = self.steps.last().map(|(c, _)| *c).unwrap_or(0);
        self.releases.push((index, completed));
    }
}

fn page_content(label: &str, fonts: &[&str]) -> Vec<u8> {
    let mut operations = vec![Operation::new("BT", vec![])];
    for font in fonts {
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(12)],
        ));
    }
    operations.push(Operation::new(
        "Tj",
        vec![Object::String(label.as_bytes().to_vec(), StringFormat::Literal)],
    ));
    operations.push(Operation::new("ET", vec![]));
    Content { operations }.encode().unwrap()
}

fn font(document: &mut Document, base: &str) -> ObjectId {
    document.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base.as_bytes().to_vec())),
    ]))
}

/// Write a document whose page `n` shows `"{label}{n}"` in font F1. Every page shares a
/// resource dictionary holding two fonts, F1 and F2. `links` lists `(from, to)` page indexes.
fn write_document(path: &Path, label: &str, pages: u32, links: &[(usize, usize)]) {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let helvetica = font(&mut document, "Helvetica");
    let courier = font(&mut document, "Courier");
    let resources_id = document.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![
            ("F1", Object::Reference(helvetica)),
            ("F2", Object::Reference(courier)),
        ])),
    )]));

    let mut page_ids = Vec::new();
    for n in 1..=pages {
        let content_id = document.add_object(Stream::new(
            Dictionary::new(),
            page_content(&format!("{}{}", label, n), &["F1"]),
        ));
        page_ids.push(document.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
        ])));
    }

    for &(from, to) in links {
        let annot_id = document.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Annot".to_vec())),
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "Rect",
                Object::Array(vec![0.into(), 0.into(), 100.into(), 20.into()]),
            ),
            ("P", Object::Reference(page_ids[from])),
            (
                "Dest",
                Object::Array(vec![Object::Reference(page_ids[to]), Object::Name(b"Fit".to_vec())]),
            ),
        ]));
        let page = document.get_dictionary_mut(page_ids[from]).unwrap();
        match page.get_mut(b"Annots") {
            Ok(Object::Array(annots)) => annots.push(Object::Reference(annot_id)),
            _ => page.set("Annots", Object::Array(vec![Object::Reference(annot_id)])),
        }
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
        (
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
        ),
    ]);
    document.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = document.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    document.trailer.set("Root", Object::Reference(catalog_id));
    document.save(path).expect("Failed to write test document");
}

fn uncompressed() -> OutputOptions {
    OutputOptions {
        compress: false,
        ..Default::default()
    }
}

/// Labels of the pages of a written output, in page order
fn page_labels(path: &Path) -> Vec<String> {
    let document = Document::load(path).expect("Failed to load output");
    document
        .get_pages()
        .values()
        .map(|id| {
            let content = document.get_page_content(*id).unwrap();
            let operations = Content::decode(&content).unwrap().operations;
            operations
                .iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| op.operands.first())
                .and_then(|o| o.as_str().ok())
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .unwrap_or_default()
        })
        .collect()
}

/// Every reference in `document` points at an object it contains
fn assert_references_resolve(document: &Document) {
    fn walk(document: &Document, object: &Object) {
        match object {
            Object::Reference(id) => assert!(
                document.objects.contains_key(id),
                "dangling reference {} {} R",
                id.0,
                id.1
            ),
            Object::Array(items) => items.iter().for_each(|o| walk(document, o)),
            Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| walk(document, o)),
            Object::Stream(stream) => stream.dict.iter().for_each(|(_, o)| walk(document, o)),
            _ => {}
        }
    }
    for object in document.objects.values() {
        walk(document, object);
    }
    document.trailer.iter().for_each(|(_, o)| walk(document, o));
}

fn font_count(document: &Document) -> usize {
    document
        .objects
        .values()
        .filter(|o| {
            o.as_dict()
                .ok()
                .and_then(|d| d.get(b"Type").ok())
                .and_then(|t| t.as_name().ok())
                == Some(b"Font".as_slice())
        })
        .count()
}

#[test]
fn test_split_every_three_pages() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let source = temp_dir.path().join("manual.pdf");
    write_document(&source, "P", 7, &[]);
    let output_dir = temp_dir.path().join("parts");

    let parameters = TaskParameters::Split(SplitParameters {
        source,
        policy: SplitPolicy::EveryNPages(3),
        output_dir: output_dir.clone(),
        prefix: "part_[FILENUMBER]".to_string(),
        options: uncompressed(),
    });
    let mut events = Recorder::default();
    let outputs = execute(&parameters, &mut events).expect("Split failed");

    assert_eq!(outputs.len(), 3);
    let labels: Vec<Vec<String>> = outputs.iter().map(|o| page_labels(&o.destination)).collect();
    assert_eq!(labels[0], ["P1", "P2", "P3"]);
    assert_eq!(labels[1], ["P4", "P5", "P6"]);
    assert_eq!(labels[2], ["P7"]);
    assert!(output_dir.join("part_1.pdf").exists());
    assert_eq!(events.states.last(), Some(&TaskState::Done));
    for output in &outputs {
        assert_references_resolve(&Document::load(&output.destination).unwrap());
    }

    // No staging files are left behind
    let leftovers = std::fs::read_dir(&output_dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_combine_reorder_releases_sources_and_reports_progress() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let sources: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|label| {
            let path = temp_dir.path().join(format!("{}.pdf", label));
            write_document(&path, &label.to_uppercase(), 3, &[]);
            path
        })
        .collect();
    let output = temp_dir.path().join("combined.pdf");

    let parameters = TaskParameters::CombineReorder(CombineReorderParameters {
        sources,
        plan: CopyPlanEntry::parse_plan("0:1,1:3,2:2,1:1,0:2").unwrap(),
        output: output.clone(),
        copy_form_fields: false,
        options: uncompressed(),
    });
    let mut events = Recorder::default();
    execute(&parameters, &mut events).expect("Combine failed");

    assert_eq!(page_labels(&output), ["A1", "B3", "C2", "B1", "A2"]);

    let completed: Vec<u32> = events.steps.iter().map(|(c, _)| *c).collect();
    assert_eq!(completed, [1, 2, 3, 4, 5]);
    assert!(events.steps.iter().all(|(_, total)| *total == 5));

    // Each source is released right after the last step that reads it
    assert_eq!(events.releases, [(2, 3), (1, 4), (0, 5)]);
}

#[test]
fn test_mix_alternates_pages() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let first = temp_dir.path().join("odd.pdf");
    let second = temp_dir.path().join("even.pdf");
    write_document(&first, "A", 5, &[]);
    write_document(&second, "B", 3, &[]);
    let output = temp_dir.path().join("mixed.pdf");

    let parameters = TaskParameters::Mix(MixParameters {
        first: MixInput::new(first),
        second: MixInput::new(second),
        output: output.clone(),
        options: uncompressed(),
    });
    execute(&parameters, &mut Recorder::default()).expect("Mix failed");

    assert_eq!(
        page_labels(&output),
        ["A1", "B1", "A2", "B2", "A3", "B3", "A4", "A5"]
    );
    assert_eq!(count_pages(&output).unwrap(), 8);
}

#[test]
fn test_existing_output_is_left_untouched() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let source = temp_dir.path().join("source.pdf");
    write_document(&source, "S", 2, &[]);
    let output = temp_dir.path().join("taken.pdf");
    std::fs::write(&output, b"not yours").unwrap();

    let parameters = TaskParameters::CombineReorder(CombineReorderParameters::concatenate(
        vec![source],
        &[2],
        output.clone(),
    ));
    let mut events = Recorder::default();
    let err = execute(&parameters, &mut events).unwrap_err();

    assert!(matches!(err, Error::Commit(_)), "unexpected error: {}", err);
    assert_eq!(std::fs::read(&output).unwrap(), b"not yours");
    assert_eq!(events.states.last(), Some(&TaskState::Failed));
}

#[test]
fn test_links_follow_their_targets_across_a_split() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let source = temp_dir.path().join("linked.pdf");
    // Page 1 links to page 2 (same output), page 3 links to page 1 (other output)
    write_document(&source, "L", 4, &[(0, 1), (2, 0)]);

    let parameters = TaskParameters::Split(SplitParameters {
        source,
        policy: SplitPolicy::EveryNPages(2),
        output_dir: temp_dir.path().to_path_buf(),
        prefix: "[BASENAME]_[FILENUMBER]".to_string(),
        options: uncompressed(),
    });
    let outputs = execute(&parameters, &mut Recorder::default()).expect("Split failed");
    assert_eq!(outputs.len(), 2);

    let link_dest = |path: &Path| -> (Vec<ObjectId>, Option<Object>) {
        let document = Document::load(path).unwrap();
        assert_references_resolve(&document);
        let pages: Vec<ObjectId> = document.get_pages().values().copied().collect();
        let mut dest = None;
        for page in &pages {
            let annots = match document.get_dictionary(*page).unwrap().get(b"Annots") {
                Ok(Object::Array(annots)) => annots.clone(),
                _ => continue,
            };
            for annot in annots {
                let dict = document.get_dictionary(annot.as_reference().unwrap()).unwrap();
                if let Ok(owner) = dict.get(b"P") {
                    assert_eq!(owner.as_reference().unwrap(), *page);
                }
                dest = dict.get(b"Dest").ok().cloned();
            }
        }
        (pages, dest)
    };

    let (first_pages, first_dest) = link_dest(&outputs[0].destination);
    let first_dest = first_dest.expect("link within the output keeps its destination");
    let target = first_dest.as_array().unwrap()[0].as_reference().unwrap();
    assert_eq!(target, first_pages[1]);

    let (_, second_dest) = link_dest(&outputs[1].destination);
    assert!(second_dest.is_none(), "link to a page in another output must lose its destination");
}

#[test]
fn test_optimized_copy_drops_unused_resources() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let source = temp_dir.path().join("fonts.pdf");
    write_document(&source, "F", 2, &[]);

    let run = |mode: CopyMode, name: &str| -> Document {
        let output = temp_dir.path().join(name);
        let mut parameters =
            CombineReorderParameters::concatenate(vec![source.clone()], &[2], output.clone());
        parameters.options = OutputOptions {
            copy_mode: mode,
            ..uncompressed()
        };
        execute(&TaskParameters::CombineReorder(parameters), &mut Recorder::default())
            .expect("Combine failed");
        Document::load(&output).unwrap()
    };

    let full = run(CopyMode::Full, "full.pdf");
    let optimized = run(CopyMode::Optimized, "optimized.pdf");

    assert_eq!(font_count(&full), 2);
    assert_eq!(font_count(&optimized), 1);
    assert_references_resolve(&full);
    assert_references_resolve(&optimized);
}

#[test]
fn test_missing_source_fails_without_output() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let output = temp_dir.path().join("never.pdf");

    let parameters = TaskParameters::CombineReorder(CombineReorderParameters::concatenate(
        vec![temp_dir.path().join("missing.pdf")],
        &[1],
        output.clone(),
    ));
    let mut events = Recorder::default();
    let err = execute(&parameters, &mut events).unwrap_err();

    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(!output.exists());
    assert!(events.warnings.is_empty());
    assert_eq!(events.states.last(), Some(&TaskState::Failed));
}
