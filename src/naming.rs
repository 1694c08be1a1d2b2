//! Output file naming
//!
//! Split outputs are named from a prefix template. Supported placeholders:
//!
//! - `[BASENAME]` - source file name without extension
//! - `[FILENUMBER]` - 1-based number of the output
//! - `[CURRENTPAGE]` - source page number the output starts at
//! - `[BOOKMARK_NAME]` - title of the bookmark that opened the output, if any
//! - `[TIMESTAMP]` - local time the name was generated, `YYYYMMDD_HHMMSS`

use std::path::Path;

use chrono::Local;

const BASENAME: &str = "[BASENAME]";
const FILENUMBER: &str = "[FILENUMBER]";
const CURRENTPAGE: &str = "[CURRENTPAGE]";
const BOOKMARK_NAME: &str = "[BOOKMARK_NAME]";
const TIMESTAMP: &str = "[TIMESTAMP]";

/// Values available to a name template
#[derive(Debug, Clone, Default)]
pub struct NameRequest {
    pub basename: String,
    pub file_number: usize,
    pub page: u32,
    pub bookmark: Option<String>,
}

impl NameRequest {
    pub fn new(source: &Path) -> Self {
        let basename = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            basename,
            ..Default::default()
        }
    }

    pub fn file_number(mut self, file_number: usize) -> Self {
        self.file_number = file_number;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn bookmark(mut self, bookmark: Option<String>) -> Self {
        self.bookmark = bookmark;
        self
    }
}

/// Generate the file name of one output of a task producing several outputs.
///
/// Templates with neither `[FILENUMBER]` nor `[CURRENTPAGE]` get the file number prepended so
/// that names stay unique.
pub fn generate_name(template: &str, request: &NameRequest) -> String {
    let template = if template.trim().is_empty() { BASENAME } else { template };
    let mut name = template
        .replace(BASENAME, &request.basename)
        .replace(FILENUMBER, &request.file_number.to_string())
        .replace(CURRENTPAGE, &request.page.to_string())
        .replace(BOOKMARK_NAME, request.bookmark.as_deref().unwrap_or(""))
        .replace(TIMESTAMP, &Local::now().format("%Y%m%d_%H%M%S").to_string());
    if !template.contains(FILENUMBER) && !template.contains(CURRENTPAGE) {
        name = format!("{}_{}", request.file_number, name);
    }
    to_file_name(&name)
}

/// Make a single file name: no path separators, `.pdf` extension
pub fn to_file_name(name: &str) -> String {
    let mut name: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NameRequest {
        NameRequest::new(Path::new("/docs/report.pdf"))
            .file_number(3)
            .page(12)
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            generate_name("[BASENAME]_part[FILENUMBER]", &request()),
            "report_part3.pdf"
        );
        assert_eq!(
            generate_name("[CURRENTPAGE]-[BASENAME]", &request()),
            "12-report.pdf"
        );
        let name = generate_name(
            "[FILENUMBER] [BOOKMARK_NAME]",
            &request().bookmark(Some("Chapter 2".to_string())),
        );
        assert_eq!(name, "3 Chapter 2.pdf");
    }

    #[test]
    fn test_file_number_added_when_missing() {
        assert_eq!(generate_name("split", &request()), "3_split.pdf");
        assert_eq!(generate_name("", &request()), "3_report.pdf");
    }

    #[test]
    fn test_timestamp_placeholder() {
        let name = generate_name("[FILENUMBER]_[TIMESTAMP]", &request());
        assert!(!name.contains("[TIMESTAMP]"));
        assert!(name.starts_with("3_"));
    }

    #[test]
    fn test_separators_are_replaced() {
        let name = generate_name(
            "[FILENUMBER]_[BOOKMARK_NAME]",
            &request().bookmark(Some("A/B\\C".to_string())),
        );
        assert_eq!(name, "3_A_B_C.pdf");
        assert_eq!(to_file_name("already.PDF"), "already.PDF");
    }
}
