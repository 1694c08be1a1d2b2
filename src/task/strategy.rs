//! Split boundaries
//!
//! A [`SplitPolicy`] is what the caller asks for. It is checked for consistency before any
//! I/O and resolved against the opened source into an [`OutputStrategy`], which answers for
//! every page whether it opens a new output and whether it closes the current one.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use regex::Regex;

use crate::error::{Error, Result};
use crate::pdf::outline::outline_items;
use crate::pdf::text::page_text;
use crate::pdf::DocumentGraph;

/// How a document is split
#[derive(Debug, Clone, PartialEq)]
pub enum SplitPolicy {
    /// A new output every `n` pages
    EveryNPages(u32),
    /// Close an output after each of the listed pages
    AfterPages(Vec<u32>),
    /// Open an output at each bookmark of the given outline level, optionally only at
    /// bookmarks whose title matches a regular expression
    BookmarkLevel { level: u32, matching: Option<String> },
    /// Open an output at each page whose text matches a regular expression, when the matched
    /// text differs from the previous match
    TextContent { pattern: String },
}

impl SplitPolicy {
    /// Checks that need no source
    pub fn ensure_is_valid(&self) -> Result<()> {
        match self {
            SplitPolicy::EveryNPages(0) => Err(Error::InvalidPlan(
                "Split size must be at least 1 page".to_string(),
            )),
            SplitPolicy::EveryNPages(_) => Ok(()),
            SplitPolicy::AfterPages(pages) if pages.is_empty() => Err(Error::InvalidPlan(
                "No pages to split after".to_string(),
            )),
            SplitPolicy::AfterPages(pages) if pages.contains(&0) => Err(Error::InvalidPlan(
                "Cannot split after page 0, pages are numbered from 1".to_string(),
            )),
            SplitPolicy::AfterPages(_) => Ok(()),
            SplitPolicy::BookmarkLevel { level: 0, .. } => Err(Error::InvalidPlan(
                "Bookmark levels are numbered from 1".to_string(),
            )),
            SplitPolicy::BookmarkLevel { matching, .. } => {
                matching.as_deref().map(compile).transpose().map(|_| ())
            }
            SplitPolicy::TextContent { pattern } => compile(pattern).map(|_| ()),
        }
    }

    /// Resolve the policy against the source it splits
    pub fn resolve(&self, source: &DocumentGraph) -> Result<OutputStrategy> {
        self.ensure_is_valid()?;
        let strategy = match self {
            SplitPolicy::EveryNPages(size) => OutputStrategy::FixedCount { size: *size },
            SplitPolicy::AfterPages(pages) => OutputStrategy::PageList {
                pages: pages.iter().copied().collect(),
            },
            SplitPolicy::BookmarkLevel { level, matching } => {
                let matching = matching.as_deref().map(compile).transpose()?;
                let mut openings = BTreeMap::new();
                for item in outline_items(source) {
                    if item.level != *level {
                        continue;
                    }
                    if let Some(regex) = &matching {
                        if !regex.is_match(&item.title) {
                            continue;
                        }
                    }
                    openings.entry(item.page).or_insert(item.title);
                }
                debug!("Found {} bookmarks at level {}", openings.len(), level);
                OutputStrategy::Bookmarks { openings }
            }
            SplitPolicy::TextContent { pattern } => {
                let regex = compile(pattern)?;
                let mut openings = BTreeMap::new();
                let mut last_match: Option<String> = None;
                for page in source.pages() {
                    let text = match page_text(source, page) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Unable to read text of page {}: {}", page.number, e);
                            continue;
                        }
                    };
                    let found = match regex.find(&text) {
                        Some(found) => found.as_str().trim().to_string(),
                        None => continue,
                    };
                    if last_match.as_deref() != Some(found.as_str()) {
                        openings.insert(page.number, found.clone());
                        last_match = Some(found);
                    }
                }
                debug!("Text pattern opens {} outputs", openings.len());
                OutputStrategy::TextContent { openings }
            }
        };
        strategy.ensure_is_valid(source.page_count())?;
        Ok(strategy)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::InvalidPlan(format!("Invalid pattern '{}': {}", pattern, e)))
}

/// Split boundaries resolved against a source
#[derive(Debug, Clone, PartialEq)]
pub enum OutputStrategy {
    FixedCount { size: u32 },
    /// Outputs close after each listed page
    PageList { pages: BTreeSet<u32> },
    /// Outputs open at each page carrying a bookmark, keyed to the bookmark title
    Bookmarks { openings: BTreeMap<u32, String> },
    /// Outputs open at each page whose text matched, keyed to the matched text
    TextContent { openings: BTreeMap<u32, String> },
}

impl OutputStrategy {
    /// Whether `page` starts a new output. The first page always does.
    pub fn is_opening(&self, page: u32) -> bool {
        if page <= 1 {
            return true;
        }
        match self {
            OutputStrategy::FixedCount { size } => *size > 0 && (page - 1) % size == 0,
            OutputStrategy::PageList { pages } => pages.contains(&(page - 1)),
            OutputStrategy::Bookmarks { openings } | OutputStrategy::TextContent { openings } => {
                openings.contains_key(&page)
            }
        }
    }

    /// Whether the current output ends with `page`. The splitter also closes at the last page.
    pub fn is_closing(&self, page: u32) -> bool {
        match self {
            OutputStrategy::FixedCount { size } => *size > 0 && page % size == 0,
            OutputStrategy::PageList { pages } => pages.contains(&page),
            OutputStrategy::Bookmarks { openings } | OutputStrategy::TextContent { openings } => {
                openings.contains_key(&(page + 1))
            }
        }
    }

    pub fn ensure_is_valid(&self, total_pages: u32) -> Result<()> {
        match self {
            OutputStrategy::FixedCount { size: 0 } => Err(Error::InvalidPlan(
                "Split size must be at least 1 page".to_string(),
            )),
            OutputStrategy::PageList { pages } if pages.is_empty() => Err(Error::InvalidPlan(
                "No pages to split after".to_string(),
            )),
            OutputStrategy::PageList { pages } => match pages.iter().find(|p| **p > total_pages) {
                Some(page) => Err(Error::InvalidPlan(format!(
                    "Cannot split after page {}, the document has {} pages",
                    page, total_pages
                ))),
                None => Ok(()),
            },
            OutputStrategy::Bookmarks { openings } if openings.is_empty() => Err(
                Error::InvalidPlan("No bookmarks to split at".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Bookmark title or matched text opening an output at `page`
    pub fn bookmark_at(&self, page: u32) -> Option<&str> {
        match self {
            OutputStrategy::Bookmarks { openings } | OutputStrategy::TextContent { openings } => {
                openings.get(&page).map(String::as_str)
            }
            _ => None,
        }
    }
}
