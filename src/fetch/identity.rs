//! Document identity resolution from landing-page URLs.
//!
//! URLs are classified against a fixed, ordered table of path patterns.
//! Evaluation stops at the first match; the patterns can overlap, so the
//! table order is load-bearing and must not be reordered.

use std::sync::LazyLock;

use regex::Regex;

/// Document type used when no pattern matches.
pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown";

/// Artifact file extension produced by the dispatcher.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Compiles a pattern known to be valid at build time.
#[allow(clippy::expect_used)]
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex pattern must compile")
}

/// Ordered identity table; first match wins.
static IDENTITY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "proposition_loi",
            compile_static_regex(r"propositions/pion([\w-]+)\.asp"),
        ),
        (
            "projet_loi",
            compile_static_regex(r"projets/pl([\w-]+)\.asp"),
        ),
        (
            "rapport_legislatif",
            compile_static_regex(r"rapports/r([\w-]+)\.asp"),
        ),
        ("texte_adopte", compile_static_regex(r"/ta/ta([\w-]+)\.asp")),
        (
            "dossier_legislatif",
            compile_static_regex(r"/textes/l17b(\d+)_"),
        ),
    ]
});

/// A resolved `(document_type, document_id)` pair.
///
/// `doc_id` is `None` when the URL matched no pattern; such items cannot
/// be named and are reported as `no_id` by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    /// Document type from the pattern table, or
    /// [`UNKNOWN_DOCUMENT_TYPE`].
    pub doc_type: &'static str,
    /// Capture from the matching pattern.
    pub doc_id: Option<String>,
}

impl DocumentIdentity {
    /// Returns the deterministic artifact name
    /// `{document_type}_{document_id}.pdf`, or `None` when there is no
    /// document id.
    #[must_use]
    pub fn artifact_name(&self) -> Option<String> {
        self.doc_id
            .as_ref()
            .map(|id| format!("{}_{}.{ARTIFACT_EXTENSION}", self.doc_type, id))
    }
}

/// Classifies a URL against the identity table, first match wins.
#[must_use]
pub fn resolve_identity(url: &str) -> DocumentIdentity {
    for (doc_type, pattern) in IDENTITY_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(url) {
            let doc_id = captures.get(1).map(|m| m.as_str().to_string());
            return DocumentIdentity { doc_type, doc_id };
        }
    }
    DocumentIdentity {
        doc_type: UNKNOWN_DOCUMENT_TYPE,
        doc_id: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_proposition_loi() {
        let identity = resolve_identity(
            "https://www.assemblee-nationale.fr/dyn/17/textes/propositions/pion1234.asp",
        );
        assert_eq!(identity.doc_type, "proposition_loi");
        assert_eq!(identity.doc_id.as_deref(), Some("1234"));
        assert_eq!(
            identity.artifact_name().unwrap(),
            "proposition_loi_1234.pdf"
        );
    }

    #[test]
    fn test_resolve_projet_loi() {
        let identity =
            resolve_identity("https://www.assemblee-nationale.fr/17/projets/pl0042.asp");
        assert_eq!(identity.doc_type, "projet_loi");
        assert_eq!(identity.doc_id.as_deref(), Some("0042"));
    }

    #[test]
    fn test_resolve_rapport_legislatif() {
        let identity =
            resolve_identity("https://www.assemblee-nationale.fr/17/rapports/r0099.asp");
        assert_eq!(identity.doc_type, "rapport_legislatif");
        assert_eq!(identity.doc_id.as_deref(), Some("0099"));
    }

    #[test]
    fn test_resolve_texte_adopte() {
        let identity = resolve_identity("https://www.assemblee-nationale.fr/17/ta/ta0007.asp");
        assert_eq!(identity.doc_type, "texte_adopte");
        assert_eq!(identity.doc_id.as_deref(), Some("0007"));
    }

    #[test]
    fn test_resolve_dossier_legislatif() {
        let identity = resolve_identity(
            "https://www.assemblee-nationale.fr/dyn/17/textes/l17b0321_projet-loi",
        );
        assert_eq!(identity.doc_type, "dossier_legislatif");
        assert_eq!(identity.doc_id.as_deref(), Some("0321"));
    }

    #[test]
    fn test_resolve_unmatched_url_is_unknown_without_id() {
        let identity = resolve_identity("https://www.assemblee-nationale.fr/dyn/actualites");
        assert_eq!(identity.doc_type, UNKNOWN_DOCUMENT_TYPE);
        assert!(identity.doc_id.is_none());
        assert!(identity.artifact_name().is_none());
    }

    #[test]
    fn test_resolution_order_is_first_match_wins() {
        // A URL that could match both the proposition and the dossier
        // pattern must resolve to the earlier table entry.
        let identity = resolve_identity(
            "https://www.assemblee-nationale.fr/dyn/17/textes/l17b0555_propositions/pion0555.asp",
        );
        assert_eq!(identity.doc_type, "proposition_loi");
        assert_eq!(identity.doc_id.as_deref(), Some("0555"));
    }

    #[test]
    fn test_doc_id_allows_suffixed_ids() {
        let identity =
            resolve_identity("https://www.assemblee-nationale.fr/17/ta/ta0007-a1.asp");
        assert_eq!(identity.doc_id.as_deref(), Some("0007-a1"));
        assert_eq!(identity.artifact_name().unwrap(), "texte_adopte_0007-a1.pdf");
    }
}
