//! Structural readability probe for PDF artifacts.
//!
//! The probe performs a structural open rather than a full parse: it
//! checks the header, the end-of-file marker, the cross-reference
//! machinery, and that the document carries at least one page and one
//! content stream. That is enough to catch the failure modes seen in
//! practice on stored artifacts: truncated uploads, HTML error pages
//! saved as `.pdf`, and zero-byte objects.

use std::fmt;

use thiserror::Error;

/// How deep into the file the `%PDF-` header may legally sit.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// How far from the end the `%%EOF` marker is searched for.
const EOF_SEARCH_WINDOW: usize = 2048;

/// Summary of a structurally readable PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfSummary {
    /// Number of page objects found.
    pub pages: usize,
}

/// Structural violations detected by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PdfCheckError {
    /// The file does not start with a `%PDF-` header.
    #[error("missing %PDF- header")]
    MissingHeader,

    /// The file has no `%%EOF` marker near its end; usually truncation.
    #[error("missing %%EOF marker (file truncated?)")]
    MissingEof,

    /// No cross-reference table or stream was found.
    #[error("missing cross-reference section")]
    MissingXref,

    /// The document has no page objects.
    #[error("document has no pages")]
    NoPages,

    /// No content stream could be located; nothing is extractable.
    #[error("document has no content stream")]
    NoContentStream,
}

/// Byte-level subslice search.
fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Counts non-overlapping occurrences of `needle` in `haystack`.
fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    let mut count = 0;
    let mut rest = haystack;
    while let Some(position) = find_subslice(rest, needle) {
        count += 1;
        rest = &rest[position + needle.len()..];
    }
    count
}

/// Counts page objects: `/Type /Page` occurrences that are not
/// `/Type /Pages` (the page-tree node), tolerating optional whitespace
/// between the name tokens.
fn count_page_objects(bytes: &[u8]) -> usize {
    let mut count = 0;
    for gap in ["", " ", "\n", "\r\n", "\t"] {
        let needle = format!("/Type{gap}/Page");
        let mut rest = bytes;
        while let Some(position) = find_subslice(rest, needle.as_bytes()) {
            let after = position + needle.len();
            // `/Type /Pages` and `/Type /PageLabels` are not page objects.
            let is_page = rest
                .get(after)
                .is_none_or(|next| !next.is_ascii_alphanumeric());
            if is_page {
                count += 1;
            }
            rest = &rest[after..];
        }
    }
    count
}

/// Runs the structural probe over raw artifact bytes.
///
/// # Errors
///
/// Returns the first [`PdfCheckError`] violation, in header → EOF →
/// xref → pages → content-stream order.
pub fn check_pdf(bytes: &[u8]) -> Result<PdfSummary, PdfCheckError> {
    let header_window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if find_subslice(header_window, b"%PDF-").is_none() {
        return Err(PdfCheckError::MissingHeader);
    }

    let eof_start = bytes.len().saturating_sub(EOF_SEARCH_WINDOW);
    if find_subslice(&bytes[eof_start..], b"%%EOF").is_none() {
        return Err(PdfCheckError::MissingEof);
    }

    let has_xref_table = find_subslice(bytes, b"xref").is_some();
    let has_xref_stream = find_subslice(bytes, b"/Type /XRef").is_some()
        || find_subslice(bytes, b"/Type/XRef").is_some();
    if !has_xref_table && !has_xref_stream {
        return Err(PdfCheckError::MissingXref);
    }

    let pages = count_page_objects(bytes);
    if pages == 0 {
        return Err(PdfCheckError::NoPages);
    }

    // Extraction of one unit: the document must carry at least one
    // stream with a matching terminator.
    if count_occurrences(bytes, b"stream") < 2 || find_subslice(bytes, b"endstream").is_none() {
        return Err(PdfCheckError::NoContentStream);
    }

    Ok(PdfSummary { pages })
}

impl fmt::Display for PdfSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} page(s)", self.pages)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use crate::test_support::minimal_pdf;

    #[test]
    fn test_minimal_pdf_is_readable() {
        let summary = check_pdf(&minimal_pdf()).unwrap();
        assert_eq!(summary.pages, 1);
    }

    #[test]
    fn test_html_error_page_fails_header_check() {
        let err = check_pdf(b"<html><body>503 Service Unavailable</body></html>").unwrap_err();
        assert_eq!(err, PdfCheckError::MissingHeader);
    }

    #[test]
    fn test_empty_file_fails_header_check() {
        assert_eq!(check_pdf(b"").unwrap_err(), PdfCheckError::MissingHeader);
    }

    #[test]
    fn test_truncated_pdf_fails_eof_check() {
        let full = minimal_pdf();
        let truncated = &full[..full.len() - 10];
        assert_eq!(check_pdf(truncated).unwrap_err(), PdfCheckError::MissingEof);
    }

    #[test]
    fn test_pdf_without_pages_fails() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"%PDF-1.4\n");
        bytes.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        bytes.extend_from_slice(b"xref\n0 2\ntrailer\n<< /Size 2 >>\n%%EOF\n");
        assert_eq!(check_pdf(&bytes).unwrap_err(), PdfCheckError::NoPages);
    }

    #[test]
    fn test_pdf_without_content_stream_fails() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"%PDF-1.4\n");
        bytes.extend_from_slice(b"3 0 obj\n<< /Type /Page >>\nendobj\n");
        bytes.extend_from_slice(b"xref\n0 2\ntrailer\n%%EOF\n");
        assert_eq!(
            check_pdf(&bytes).unwrap_err(),
            PdfCheckError::NoContentStream
        );
    }

    #[test]
    fn test_pages_node_alone_is_not_a_page() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"%PDF-1.4\n");
        bytes.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        bytes.extend_from_slice(b"xref\n0 2\ntrailer\n%%EOF\n");
        assert_eq!(check_pdf(&bytes).unwrap_err(), PdfCheckError::NoPages);
    }

    #[test]
    fn test_compact_name_tokens_are_recognized() {
        let pdf = minimal_pdf();
        let compact = String::from_utf8(pdf)
            .unwrap()
            .replace("/Type /Page ", "/Type/Page ")
            .into_bytes();
        assert!(check_pdf(&compact).is_ok());
    }

    #[test]
    fn test_garbage_prefix_within_window_is_tolerated() {
        // Some generators emit a byte-order mark or junk before the header.
        let mut bytes = b"\xef\xbb\xbfjunk".to_vec();
        bytes.extend_from_slice(&minimal_pdf());
        assert!(check_pdf(&bytes).is_ok());
    }
}
