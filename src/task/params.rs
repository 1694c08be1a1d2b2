//! Typed task parameters
//!
//! Every task takes one parameter struct. `validate` checks everything that can be checked
//! without opening a source; page numbers against actual page counts are checked once the
//! sources are open, still before any page is copied.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::geometry::RectangularBox;
use crate::pdf::{CopyMode, FinishOptions, PdfVersion};

use super::strategy::SplitPolicy;

/// Options shared by every task that writes outputs
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Replace existing files with the same name
    pub overwrite: bool,
    pub copy_mode: CopyMode,
    pub version: PdfVersion,
    /// Compress streams of the written outputs
    pub compress: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            copy_mode: CopyMode::Full,
            version: PdfVersion::V1_5,
            compress: true,
        }
    }
}

impl OutputOptions {
    pub(crate) fn finish_options(&self, form_fields: bool) -> FinishOptions {
        FinishOptions {
            version: self.version,
            compress: self.compress,
            form_fields,
        }
    }
}

/// One page of the assembly plan: page `page` (1-based) of source `source` (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyPlanEntry {
    pub source: usize,
    pub page: u32,
}

impl CopyPlanEntry {
    pub fn new(source: usize, page: u32) -> Self {
        Self { source, page }
    }

    /// Parse a plan such as `0:1-3,1:2,0:5`: comma separated `source:pages` groups where pages
    /// is a single page or an inclusive range, descending ranges included.
    pub fn parse_plan(plan: &str) -> Result<Vec<CopyPlanEntry>> {
        let mut entries = Vec::new();
        for group in plan.split(',').map(str::trim).filter(|g| !g.is_empty()) {
            let invalid = || Error::InvalidPlan(format!("Invalid plan entry '{}'", group));
            let (source, pages) = group.split_once(':').ok_or_else(invalid)?;
            let source: usize = source.trim().parse().map_err(|_| invalid())?;
            let (start, end) = match pages.split_once('-') {
                Some((start, end)) => (start, end),
                None => (pages, pages),
            };
            let start: u32 = start.trim().parse().map_err(|_| invalid())?;
            let end: u32 = end.trim().parse().map_err(|_| invalid())?;
            if start <= end {
                entries.extend((start..=end).map(|page| CopyPlanEntry::new(source, page)));
            } else {
                entries.extend((end..=start).rev().map(|page| CopyPlanEntry::new(source, page)));
            }
        }
        Ok(entries)
    }
}

/// Split one source into several outputs
#[derive(Debug, Clone)]
pub struct SplitParameters {
    pub source: PathBuf,
    pub policy: SplitPolicy,
    /// Directory the outputs are written to
    pub output_dir: PathBuf,
    /// Name template, see [`crate::naming`]
    pub prefix: String,
    pub options: OutputOptions,
}

impl SplitParameters {
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::InvalidPlan("No output directory given".to_string()));
        }
        self.policy.ensure_is_valid()
    }
}

/// Combine pages of several sources into one output, in plan order
#[derive(Debug, Clone)]
pub struct CombineReorderParameters {
    pub sources: Vec<PathBuf>,
    pub plan: Vec<CopyPlanEntry>,
    pub output: PathBuf,
    /// Rebuild the interactive form from the copied widgets
    pub copy_form_fields: bool,
    pub options: OutputOptions,
}

impl CombineReorderParameters {
    /// Parameters copying every page of every source, sources in order
    pub fn concatenate(sources: Vec<PathBuf>, page_counts: &[u32], output: PathBuf) -> Self {
        let plan = page_counts
            .iter()
            .enumerate()
            .flat_map(|(source, count)| (1..=*count).map(move |page| CopyPlanEntry::new(source, page)))
            .collect();
        Self {
            sources,
            plan,
            output,
            copy_form_fields: false,
            options: OutputOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::InvalidPlan("No sources given".to_string()));
        }
        if self.plan.is_empty() {
            return Err(Error::InvalidPlan("The assembly plan is empty".to_string()));
        }
        ensure_output(&self.output)?;
        for (position, entry) in self.plan.iter().enumerate() {
            if entry.source >= self.sources.len() {
                return Err(Error::InvalidPlan(format!(
                    "Plan entry {} uses source {} but only {} sources were given",
                    position + 1,
                    entry.source,
                    self.sources.len()
                )));
            }
            if entry.page == 0 {
                return Err(Error::InvalidPlan(format!(
                    "Plan entry {} uses page 0, pages are numbered from 1",
                    position + 1
                )));
            }
        }
        Ok(())
    }
}

/// One of the two inputs of a mix
#[derive(Debug, Clone)]
pub struct MixInput {
    pub path: PathBuf,
    /// Walk the source from its last page to its first
    pub reverse: bool,
    /// Pages taken from this input before switching to the other one
    pub step: u32,
}

impl MixInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reverse: false,
            step: 1,
        }
    }
}

/// Alternate the pages of two sources into one output
#[derive(Debug, Clone)]
pub struct MixParameters {
    pub first: MixInput,
    pub second: MixInput,
    pub output: PathBuf,
    pub options: OutputOptions,
}

impl MixParameters {
    pub fn validate(&self) -> Result<()> {
        ensure_output(&self.output)?;
        for input in [&self.first, &self.second] {
            if input.step == 0 {
                return Err(Error::InvalidPlan(format!(
                    "Step for {} must be at least 1",
                    input.path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Copy every page of a source once per crop area
#[derive(Debug, Clone)]
pub struct CropParameters {
    pub source: PathBuf,
    pub areas: Vec<RectangularBox>,
    pub output: PathBuf,
    pub options: OutputOptions,
}

impl CropParameters {
    pub fn validate(&self) -> Result<()> {
        ensure_output(&self.output)?;
        if self.areas.is_empty() {
            return Err(Error::InvalidPlan("No crop areas given".to_string()));
        }
        self.areas.iter().try_for_each(RectangularBox::ensure_is_valid)
    }
}

fn ensure_output(output: &std::path::Path) -> Result<()> {
    if output.file_name().is_none() {
        return Err(Error::InvalidPlan(format!(
            "Output {} is not a file name",
            output.display()
        )));
    }
    Ok(())
}
