//! Error types for the PDF assembly library

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF assembly library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Task parameters rejected before any copying took place
    #[error("Invalid task parameters: {0}")]
    InvalidPlan(String),

    /// A plan or split policy references a page the document does not have
    #[error("Page {page} of {document} is out of range (document has {page_count} pages)")]
    PageOutOfRange {
        document: String,
        page: u32,
        page_count: u32,
    },

    /// A source document could not be parsed
    #[error("Unable to open {}: {cause}", .path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        cause: lopdf::Error,
    },

    /// The source document forbids the requested operation
    #[error("Permission denied on {document}: {permission} is not allowed")]
    Permission {
        document: String,
        permission: &'static str,
    },

    /// A finished destination could not be written to its staging buffer
    #[error("Unable to write output {name}: {cause}")]
    OutputWrite {
        name: String,
        #[source]
        cause: std::io::Error,
    },

    /// One or more staged outputs could not be committed to their final names
    #[error("{}", describe_commit_failures(.0))]
    Commit(Vec<CommitFailure>),

    /// The caller cancelled the task between two pages
    #[error("Task cancelled after {completed} of {total} steps")]
    Cancelled { completed: u32, total: u32 },

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {0}")]
    EmptyPdf(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// True when every commit failure is a name collision
    pub fn is_name_collision(&self) -> bool {
        matches!(self, Error::Commit(failures)
            if !failures.is_empty() && failures.iter().all(CommitFailure::is_collision))
    }
}

/// Why a single staged output was not committed
#[derive(Debug)]
pub enum CommitFailureKind {
    /// The final name exists and overwrite is disabled
    Collision,
    /// Moving the staged file into place failed
    Io(std::io::Error),
}

/// A staged output that could not be committed
#[derive(Debug)]
pub struct CommitFailure {
    pub destination: PathBuf,
    pub kind: CommitFailureKind,
}

impl CommitFailure {
    pub fn is_collision(&self) -> bool {
        matches!(self.kind, CommitFailureKind::Collision)
    }
}

impl fmt::Display for CommitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CommitFailureKind::Collision => write!(
                f,
                "{} already exists and overwrite is disabled",
                self.destination.display()
            ),
            CommitFailureKind::Io(e) => {
                write!(f, "unable to write {}: {}", self.destination.display(), e)
            }
        }
    }
}

fn describe_commit_failures(failures: &[CommitFailure]) -> String {
    let details: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
    format!("Unable to commit outputs: {}", details.join("; "))
}
