//! Path canonicalization and target classification.
//!
//! Every path comparison in the engine happens on the canonical form produced
//! here; classification is the security gate deciding whether a target stays
//! on the site.

use url::Url;

/// Schemes that must never appear in a redirect target, checked by prefix so
/// they are caught even when the rest of the string fails to parse as a URL.
const DANGEROUS_SCHEMES: [&str; 4] = ["javascript:", "data:", "vbscript:", "file:"];

/// Shape of a redirect target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// A site-internal path.
    Internal,
    /// A full URL with scheme and authority.
    AbsoluteUrl,
    /// A `//host/...` URL that inherits the current scheme.
    ProtocolRelative,
    /// `javascript:`, `data:`, `vbscript:`, or `file:`.
    DangerousScheme,
}

/// Canonicalize a path: empty becomes `/`, a missing leading slash is added,
/// a single trailing slash (except root) is stripped, and the whole string is
/// case-folded. Idempotent.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    let mut normalized = trimmed.to_lowercase();
    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Classify a target string. Dangerous schemes are checked first: `file://`
/// would otherwise also parse as an absolute URL, and `javascript:` payloads
/// do not parse with an authority at all.
pub fn classify_target(target: &str) -> TargetKind {
    let target = target.trim();
    if DANGEROUS_SCHEMES.iter().any(|scheme| {
        target
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    }) {
        return TargetKind::DangerousScheme;
    }
    if target.starts_with("//") {
        return TargetKind::ProtocolRelative;
    }
    match Url::parse(target) {
        Ok(url) if url.has_authority() => TargetKind::AbsoluteUrl,
        _ => TargetKind::Internal,
    }
}

/// Canonical stored form of a target: internal paths are normalized like any
/// other path, external URLs are stored verbatim (modulo surrounding space).
pub fn normalize_target(target: &str) -> String {
    let trimmed = target.trim();
    match classify_target(trimmed) {
        TargetKind::Internal => normalize_path(trimmed),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_basic_forms() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("about"), "/about");
        assert_eq!(normalize_path("/about/"), "/about");
        assert_eq!(normalize_path("/Blog/Posts/"), "/blog/posts");
        assert_eq!(normalize_path("  /padded  "), "/padded");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["", "/", "About/", "/a/b/c/", "/MIXED/Case", "no-slash"] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn classify_internal_paths() {
        assert_eq!(classify_target("/about"), TargetKind::Internal);
        assert_eq!(classify_target("relative/page"), TargetKind::Internal);
        assert_eq!(classify_target("/a?b=c"), TargetKind::Internal);
    }

    #[test]
    fn classify_absolute_urls() {
        assert_eq!(
            classify_target("https://example.com/page"),
            TargetKind::AbsoluteUrl
        );
        assert_eq!(
            classify_target("HTTP://EXAMPLE.COM"),
            TargetKind::AbsoluteUrl
        );
    }

    #[test]
    fn classify_protocol_relative() {
        assert_eq!(
            classify_target("//evil.example/phish"),
            TargetKind::ProtocolRelative
        );
    }

    #[test]
    fn classify_dangerous_schemes() {
        assert_eq!(
            classify_target("javascript:alert(1)"),
            TargetKind::DangerousScheme
        );
        assert_eq!(
            classify_target("JavaScript:alert(1)"),
            TargetKind::DangerousScheme
        );
        assert_eq!(
            classify_target("data:text/html,<script>"),
            TargetKind::DangerousScheme
        );
        assert_eq!(
            classify_target("VBSCRIPT:msgbox"),
            TargetKind::DangerousScheme
        );
        assert_eq!(
            classify_target("file:///etc/passwd"),
            TargetKind::DangerousScheme
        );
        assert_eq!(
            classify_target("  javascript:alert(1)"),
            TargetKind::DangerousScheme
        );
    }

    #[test]
    fn normalize_target_keeps_external_verbatim() {
        assert_eq!(normalize_target("/About/"), "/about");
        assert_eq!(
            normalize_target("https://Example.com/Page"),
            "https://Example.com/Page"
        );
    }
}
