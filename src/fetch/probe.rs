//! Landing-page probe for the designated PDF affordance.
//!
//! Each landing page carries a single "download as PDF" anchor identified
//! by its title attribute. The probe extracts that anchor's target,
//! requires the expected artifact extension, and absolutizes it against
//! the site base URL.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::identity::compile_static_regex;

/// Title attribute of the designated PDF affordance.
pub const PDF_AFFORDANCE_TITLE: &str = "Accéder au document au format PDF";

// Anchor attributes appear in either order, so two patterns: one for
// title-before-href and one for href-before-title.
static TITLE_THEN_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<a\s[^>]*title\s*=\s*["']Accéder au document au format PDF["'][^>]*href\s*=\s*["']([^"']+)["']"#,
    )
});
static HREF_THEN_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["'][^>]*title\s*=\s*["']Accéder au document au format PDF["']"#,
    )
});

/// Result of probing a landing page for its PDF affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkProbe {
    /// Absolute URL of the PDF artifact.
    Pdf(String),
    /// No usable affordance: missing anchor, missing target, or a target
    /// without the expected extension.
    NoLink,
}

/// Searches `html` for the designated PDF affordance.
///
/// Returns [`LinkProbe::NoLink`] when the anchor is absent or its target
/// does not end in `.pdf`; relative targets are absolutized against
/// `base`.
#[must_use]
pub fn find_pdf_link(html: &str, base: &Url) -> LinkProbe {
    let href = TITLE_THEN_HREF_RE
        .captures(html)
        .or_else(|| HREF_THEN_TITLE_RE.captures(html))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string());

    let Some(href) = href else {
        debug!("no PDF affordance on landing page");
        return LinkProbe::NoLink;
    };

    if !href.to_ascii_lowercase().ends_with(".pdf") {
        debug!(href = %href, "affordance target is not a PDF");
        return LinkProbe::NoLink;
    }

    match base.join(&href) {
        Ok(absolute) => LinkProbe::Pdf(absolute.to_string()),
        Err(e) => {
            debug!(href = %href, error = %e, "affordance target failed to absolutize");
            LinkProbe::NoLink
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.assemblee-nationale.fr").unwrap()
    }

    #[test]
    fn test_probe_finds_relative_pdf_link() {
        let html = r#"<html><body>
            <a title="Accéder au document au format PDF" href="/dyn/17/textes/pl0042.pdf">PDF</a>
        </body></html>"#;
        assert_eq!(
            find_pdf_link(html, &base()),
            LinkProbe::Pdf("https://www.assemblee-nationale.fr/dyn/17/textes/pl0042.pdf".into())
        );
    }

    #[test]
    fn test_probe_handles_href_before_title() {
        let html = r#"<a href="/dyn/17/textes/pl0042.pdf" class="doc" title="Accéder au document au format PDF">PDF</a>"#;
        assert!(matches!(find_pdf_link(html, &base()), LinkProbe::Pdf(_)));
    }

    #[test]
    fn test_probe_keeps_absolute_pdf_link() {
        let html = r#"<a title="Accéder au document au format PDF" href="https://cdn.example.fr/doc.pdf">PDF</a>"#;
        assert_eq!(
            find_pdf_link(html, &base()),
            LinkProbe::Pdf("https://cdn.example.fr/doc.pdf".into())
        );
    }

    #[test]
    fn test_probe_missing_anchor_is_no_link() {
        let html = r#"<a title="Autre document" href="/doc.pdf">autre</a>"#;
        assert_eq!(find_pdf_link(html, &base()), LinkProbe::NoLink);
    }

    #[test]
    fn test_probe_non_pdf_target_is_no_link() {
        let html =
            r#"<a title="Accéder au document au format PDF" href="/dyn/17/textes/pl0042.html">x</a>"#;
        assert_eq!(find_pdf_link(html, &base()), LinkProbe::NoLink);
    }

    #[test]
    fn test_probe_empty_href_is_no_link() {
        let html = r#"<a title="Accéder au document au format PDF" href="">x</a>"#;
        assert_eq!(find_pdf_link(html, &base()), LinkProbe::NoLink);
    }

    #[test]
    fn test_probe_uppercase_extension_is_accepted() {
        let html = r#"<a title="Accéder au document au format PDF" href="/doc.PDF">x</a>"#;
        assert!(matches!(find_pdf_link(html, &base()), LinkProbe::Pdf(_)));
    }

    #[test]
    fn test_probe_ignores_other_anchors_around_the_affordance() {
        let html = r#"
            <a href="/menu.html" title="Menu">menu</a>
            <a class="button" title="Accéder au document au format PDF" href="/dyn/17/ta/ta0007.pdf">PDF</a>
            <a href="/contact.html">contact</a>
        "#;
        assert_eq!(
            find_pdf_link(html, &base()),
            LinkProbe::Pdf("https://www.assemblee-nationale.fr/dyn/17/ta/ta0007.pdf".into())
        );
    }
}
