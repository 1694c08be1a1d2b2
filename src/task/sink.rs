//! Staging and committing outputs
//!
//! Finished destinations are written to temporary files in the directory of their final name.
//! Nothing appears under a final name until [`OutputSink::commit`], and staged files that are
//! never committed are deleted when the sink is dropped.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::error::{CommitFailure, CommitFailureKind, Error, Result};
use crate::pdf::FinishedDocument;

/// A staged output and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDescriptor {
    /// Temporary location the output was staged at
    pub staging: PathBuf,
    /// Final file name
    pub name: String,
    /// Final path
    pub destination: PathBuf,
    pub overwrite: bool,
    /// Number of pages written
    pub pages: usize,
}

struct StagedOutput {
    file: NamedTempFile,
    descriptor: OutputDescriptor,
}

/// Outputs of one task, staged until the task succeeds
pub struct OutputSink {
    overwrite: bool,
    staged: Vec<StagedOutput>,
    names: HashSet<PathBuf>,
}

impl OutputSink {
    pub fn new(overwrite: bool) -> Self {
        Self {
            overwrite,
            staged: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn staged(&self) -> impl Iterator<Item = &OutputDescriptor> {
        self.staged.iter().map(|s| &s.descriptor)
    }

    /// Write a finished destination to a staging file next to `destination`
    pub fn stage(&mut self, finished: FinishedDocument, destination: PathBuf) -> Result<&OutputDescriptor> {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidPlan(format!("Output {} is not a file name", destination.display()))
            })?;
        if !self.names.insert(destination.clone()) {
            return Err(Error::InvalidPlan(format!(
                "Output name {} is used more than once",
                name
            )));
        }
        let write_error = |cause: io::Error| Error::OutputWrite {
            name: name.clone(),
            cause,
        };

        let directory = staging_directory(&destination);
        std::fs::create_dir_all(&directory).map_err(write_error)?;
        let mut file = tempfile::Builder::new()
            .prefix(".pdf-assemble-")
            .suffix(".tmp")
            .tempfile_in(&directory)
            .map_err(write_error)?;
        debug!("Created output temporary buffer {}", file.path().display());

        let FinishedDocument {
            mut document,
            pages,
            ..
        } = finished;
        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|e| write_error(io::Error::other(e.to_string())))?;
        file.write_all(&bytes).map_err(write_error)?;
        file.flush().map_err(write_error)?;

        let descriptor = OutputDescriptor {
            staging: file.path().to_path_buf(),
            name,
            destination,
            overwrite: self.overwrite,
            pages,
        };
        self.staged.push(StagedOutput { file, descriptor });
        Ok(&self.staged[self.staged.len() - 1].descriptor)
    }

    /// Move every staged output to its final name.
    ///
    /// Every output is attempted. Outputs committed before a failure stay in place; the
    /// failures are reported together.
    pub fn commit(self) -> Result<Vec<OutputDescriptor>> {
        let mut committed = Vec::new();
        let mut failures = Vec::new();
        for StagedOutput { file, descriptor } in self.staged {
            let destination = descriptor.destination.clone();
            let result = if descriptor.overwrite {
                file.persist(&destination)
            } else if destination.exists() {
                failures.push(CommitFailure {
                    destination,
                    kind: CommitFailureKind::Collision,
                });
                continue;
            } else {
                file.persist_noclobber(&destination)
            };
            match result {
                Ok(_) => {
                    info!("Written {}", destination.display());
                    committed.push(descriptor);
                }
                Err(e) => {
                    let kind = if e.error.kind() == io::ErrorKind::AlreadyExists {
                        CommitFailureKind::Collision
                    } else {
                        CommitFailureKind::Io(e.error)
                    };
                    failures.push(CommitFailure { destination, kind });
                }
            }
        }
        if failures.is_empty() {
            Ok(committed)
        } else {
            Err(Error::Commit(failures))
        }
    }

    /// Drop every staged output without committing
    pub fn discard(self) {
        if !self.staged.is_empty() {
            debug!("Discarding {} staged outputs", self.staged.len());
        }
    }
}

fn staging_directory(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
