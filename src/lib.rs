//! PDF Assemble Library
//!
//! A cross-platform library for building new PDF documents out of pages of existing ones.
//! This library provides functionality to:
//! - Split a document by page count, page list, bookmark level or text content
//! - Combine and reorder pages of several documents
//! - Mix (alternate) the pages of two documents
//! - Crop pages to one or more areas
//!
//! Pages are copied together with everything they reference. Objects shared between pages are
//! copied once per output, links are rewritten to point into the output or removed, and
//! outputs only appear under their final names once the whole task succeeded.
//!
//! # Example
//!
//! ```no_run
//! use pdf_assemble::task::{execute, SilentEvents, SplitParameters, SplitPolicy, TaskParameters};
//! use std::path::PathBuf;
//!
//! let parameters = TaskParameters::Split(SplitParameters {
//!     source: PathBuf::from("handbook.pdf"),
//!     policy: SplitPolicy::EveryNPages(10),
//!     output_dir: PathBuf::from("parts"),
//!     prefix: "[BASENAME]_[FILENUMBER]".to_string(),
//!     options: Default::default(),
//! });
//!
//! let outputs = execute(&parameters, &mut SilentEvents).expect("Failed to split");
//! for output in outputs {
//!     println!("{}: {} pages", output.name, output.pages);
//! }
//! ```

pub mod error;
pub mod geometry;
pub mod naming;
pub mod pdf;
pub mod task;

// Re-export commonly used items
pub use error::{Error, Result};
