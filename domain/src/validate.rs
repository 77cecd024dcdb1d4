//! Input validation. Each validator inspects the raw caller-supplied string
//! and returns every independent finding in one pass; normalization happens
//! only after these checks, since it would mask formatting problems.

use crate::normalize::{classify_target, TargetKind};
use crate::{NormalizedPath, Policy, RouteChecker, ValidationCode, ValidationError};

/// Check a source path for well-formedness.
pub fn validate_source(source: &str) -> Vec<ValidationError> {
    let source = source.trim();
    if source.is_empty() {
        return vec![ValidationError::new(
            ValidationCode::SourceRequired,
            Some("source_path"),
        )];
    }
    let mut errors = Vec::new();
    if !source.starts_with('/') {
        errors.push(ValidationError::new(
            ValidationCode::SourceMustStartWithSlash,
            Some("source_path"),
        ));
    }
    if classify_target(source) == TargetKind::AbsoluteUrl {
        errors.push(ValidationError::new(
            ValidationCode::SourceCannotBeUrl,
            Some("source_path"),
        ));
    }
    errors
}

/// Check a target for safety. With `require_internal_targets` (the default)
/// anything that leaves the site is rejected; when the policy explicitly
/// allows external targets the shape checks are skipped entirely.
pub fn validate_target(target: &str, policy: &Policy) -> Vec<ValidationError> {
    let target = target.trim();
    if target.is_empty() {
        return vec![ValidationError::new(
            ValidationCode::TargetRequired,
            Some("target_path"),
        )];
    }
    if !policy.require_internal_targets {
        return Vec::new();
    }
    match classify_target(target) {
        TargetKind::AbsoluteUrl | TargetKind::DangerousScheme => {
            vec![ValidationError::new(
                ValidationCode::ExternalTargetNotAllowed,
                Some("target_path"),
            )]
        }
        TargetKind::ProtocolRelative => vec![ValidationError::new(
            ValidationCode::InvalidTargetPath,
            Some("target_path"),
        )],
        TargetKind::Internal => Vec::new(),
    }
}

/// Best-effort collision check against application routes. No checker means
/// no findings.
pub fn validate_collision(
    source: &NormalizedPath,
    routes: Option<&dyn RouteChecker>,
    policy: &Policy,
) -> Vec<ValidationError> {
    if !policy.prevent_collisions_with_routes {
        return Vec::new();
    }
    match routes {
        Some(checker) if checker.route_exists(source) => vec![ValidationError::new(
            ValidationCode::RouteCollision,
            Some("source_path"),
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::routes::StaticRouteChecker;

    fn codes(errors: &[ValidationError]) -> Vec<ValidationCode> {
        errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn source_empty_is_required() {
        assert_eq!(
            codes(&validate_source("")),
            vec![ValidationCode::SourceRequired]
        );
        assert_eq!(
            codes(&validate_source("   ")),
            vec![ValidationCode::SourceRequired]
        );
    }

    #[test]
    fn source_without_slash() {
        assert_eq!(
            codes(&validate_source("old-page")),
            vec![ValidationCode::SourceMustStartWithSlash]
        );
    }

    #[test]
    fn source_as_url_reports_both_findings() {
        let errors = validate_source("https://example.com/old");
        assert_eq!(
            codes(&errors),
            vec![
                ValidationCode::SourceMustStartWithSlash,
                ValidationCode::SourceCannotBeUrl,
            ]
        );
    }

    #[test]
    fn source_ok() {
        assert!(validate_source("/old-page").is_empty());
    }

    #[test]
    fn target_empty_is_required() {
        assert_eq!(
            codes(&validate_target("", &Policy::default())),
            vec![ValidationCode::TargetRequired]
        );
    }

    #[test]
    fn target_external_rejected_by_default() {
        let policy = Policy::default();
        assert_eq!(
            codes(&validate_target("https://evil.example/phish", &policy)),
            vec![ValidationCode::ExternalTargetNotAllowed]
        );
        assert_eq!(
            codes(&validate_target("javascript:alert(1)", &policy)),
            vec![ValidationCode::ExternalTargetNotAllowed]
        );
        assert_eq!(
            codes(&validate_target("//evil.example", &policy)),
            vec![ValidationCode::InvalidTargetPath]
        );
    }

    #[test]
    fn target_external_allowed_when_policy_disabled() {
        let policy = Policy {
            require_internal_targets: false,
            ..Policy::default()
        };
        assert!(validate_target("https://partner.example/page", &policy).is_empty());
        assert!(validate_target("//cdn.example/asset", &policy).is_empty());
    }

    #[test]
    fn target_internal_ok() {
        assert!(validate_target("/new-page", &Policy::default()).is_empty());
    }

    #[test]
    fn collision_reported_when_route_claimed() {
        let routes = StaticRouteChecker::new(["/admin", "/login"]);
        let errors = validate_collision(
            &NormalizedPath::new("/admin"),
            Some(&routes),
            &Policy::default(),
        );
        assert_eq!(codes(&errors), vec![ValidationCode::RouteCollision]);
    }

    #[test]
    fn collision_skipped_without_checker_or_flag() {
        let source = NormalizedPath::new("/admin");
        assert!(validate_collision(&source, None, &Policy::default()).is_empty());

        let routes = StaticRouteChecker::new(["/admin"]);
        let policy = Policy {
            prevent_collisions_with_routes: false,
            ..Policy::default()
        };
        assert!(validate_collision(&source, Some(&routes), &policy).is_empty());
    }
}
