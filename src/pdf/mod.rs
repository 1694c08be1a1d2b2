//! PDF object graph manipulation
//!
//! Everything that reads or writes lopdf object graphs lives here: opening sources,
//! copying pages between graphs, and sanitizing the result.

pub mod copier;
pub mod destination;
mod forms;
pub mod graph;
pub mod lookup;
pub mod metadata;
pub mod outline;
pub mod resources;
pub mod sanitizer;
pub mod text;

// Re-export commonly used items
pub use copier::{CopiedPage, CopyMode, CopyWarning, PageCopier};
pub use destination::{DestinationGraph, FinishOptions, FinishedDocument, PdfVersion};
pub use graph::{DocumentGraph, GraphId, PageHandle, Permissions};
pub use lookup::ObjectLookupTable;
pub use metadata::{count_pages, extract_metadata, PdfMetadata};
pub use outline::{outline_items, OutlineItem};
pub use sanitizer::SanitizeReport;
