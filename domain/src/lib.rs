//! Domain library for the Redirect Engine.
//!
//! This crate holds the domain types, ports (traits), the validation and
//! graph-walk logic, and the orchestrating service. Keep storage adapters and
//! IO concerns out of this crate; the in-memory adapter under `adapters` is
//! for tests and local demos only.

use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use serde::Serialize;

/// Opaque identifier of a stored redirect. Assigned at creation, immutable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedirectId(String);

impl RedirectId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RedirectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical path string: leading slash, no trailing slash except root,
/// case-folded. Every comparison, lookup, and stored source path goes through
/// this type so the graph never sees two spellings of the same node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// Normalize any path-ish input. Never fails; the empty string becomes `/`.
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(normalize::normalize_path(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for NormalizedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored redirect mapping. The sole entity of this engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
    pub id: RedirectId,
    pub source_path: NormalizedPath,
    /// Normalized internal path, or an external URL when the policy allows it.
    pub target_path: String,
    pub status_code: u16,
    /// Disabled redirects are invisible to resolution but stay listable.
    pub enabled: bool,
    pub created_at: SystemTime,
    /// Last time the redirect was updated through the service.
    pub updated_at: Option<SystemTime>,
    /// Optional actor attribution; the engine attaches no semantics to it.
    pub created_by: Option<String>,
    /// Optional free-text annotation.
    pub notes: Option<String>,
}

impl Redirect {
    /// Create a new Redirect with default values for enabled (true) and the
    /// optional fields (unset).
    pub fn new(
        id: RedirectId,
        source_path: NormalizedPath,
        target_path: String,
        status_code: u16,
        created_at: SystemTime,
    ) -> Self {
        Self {
            id,
            source_path,
            target_path,
            status_code,
            enabled: true,
            created_at,
            updated_at: None,
            created_by: None,
            notes: None,
        }
    }
}

/// Configuration controlling validation strictness and defaults.
#[derive(Clone, Debug)]
pub struct Policy {
    /// Global on/off. When false, resolution goes dark; management still works.
    pub enabled: bool,
    pub default_status_code: u16,
    /// Reject targets that leave the site (open-redirect prevention).
    pub require_internal_targets: bool,
    /// Longest chain of enabled redirects allowed, counting the new edge.
    pub max_chain_length: usize,
    pub prevent_loops: bool,
    pub prevent_collisions_with_routes: bool,
    /// When true only utm_* parameters are carried over to the final target;
    /// when false every original parameter is.
    pub preserve_utm_params: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enabled: true,
            default_status_code: 301,
            require_internal_targets: true,
            max_chain_length: 3,
            prevent_loops: true,
            prevent_collisions_with_routes: true,
            preserve_utm_params: true,
        }
    }
}

/// Closed set of validation error codes reported by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    SourceRequired,
    SourceMustStartWithSlash,
    SourceCannotBeUrl,
    SourceExists,
    TargetRequired,
    ExternalTargetNotAllowed,
    InvalidTargetPath,
    RedirectLoop,
    ChainTooLong,
    RouteCollision,
    NotFound,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::SourceRequired => "source_required",
            ValidationCode::SourceMustStartWithSlash => "source_must_start_with_slash",
            ValidationCode::SourceCannotBeUrl => "source_cannot_be_url",
            ValidationCode::SourceExists => "source_exists",
            ValidationCode::TargetRequired => "target_required",
            ValidationCode::ExternalTargetNotAllowed => "external_target_not_allowed",
            ValidationCode::InvalidTargetPath => "invalid_target_path",
            ValidationCode::RedirectLoop => "redirect_loop",
            ValidationCode::ChainTooLong => "chain_too_long",
            ValidationCode::RouteCollision => "route_collision",
            ValidationCode::NotFound => "not_found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source_required" => Some(ValidationCode::SourceRequired),
            "source_must_start_with_slash" => Some(ValidationCode::SourceMustStartWithSlash),
            "source_cannot_be_url" => Some(ValidationCode::SourceCannotBeUrl),
            "source_exists" => Some(ValidationCode::SourceExists),
            "target_required" => Some(ValidationCode::TargetRequired),
            "external_target_not_allowed" => Some(ValidationCode::ExternalTargetNotAllowed),
            "invalid_target_path" => Some(ValidationCode::InvalidTargetPath),
            "redirect_loop" => Some(ValidationCode::RedirectLoop),
            "chain_too_long" => Some(ValidationCode::ChainTooLong),
            "route_collision" => Some(ValidationCode::RouteCollision),
            "not_found" => Some(ValidationCode::NotFound),
            _ => None,
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            ValidationCode::SourceRequired => "source path is required",
            ValidationCode::SourceMustStartWithSlash => "source path must start with '/'",
            ValidationCode::SourceCannotBeUrl => "source path cannot be a full URL",
            ValidationCode::SourceExists => "a redirect for this source path already exists",
            ValidationCode::TargetRequired => "target path is required",
            ValidationCode::ExternalTargetNotAllowed => {
                "external targets are not allowed by the current policy"
            }
            ValidationCode::InvalidTargetPath => "target path is not a valid internal path",
            ValidationCode::RedirectLoop => "redirect would create a loop",
            ValidationCode::ChainTooLong => "redirect chain would exceed the configured maximum",
            ValidationCode::RouteCollision => {
                "source path collides with an existing application route"
            }
            ValidationCode::NotFound => "redirect not found",
        }
    }
}

/// A single reported validation problem: code, human-readable message, and
/// the offending field when one applies. Validators return lists of these
/// rather than failing on the first finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl ValidationError {
    pub fn new(code: ValidationCode, field: Option<&'static str>) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            field,
        }
    }

    pub fn with_message<S: Into<String>>(
        code: ValidationCode,
        field: Option<&'static str>,
        message: S,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            field,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.field {
            Some(field) => write!(f, "{} ({}): {}", self.code.as_str(), field, self.message),
            None => write!(f, "{}: {}", self.code.as_str(), self.message),
        }
    }
}

/// Fatal, unexpected failures. Validation findings are values, never errors;
/// the only thing the engine treats as an error proper is a broken store.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("repository error: {0}")]
    Repository(String),
}

/// Error type of the service operations: either a non-empty list of
/// validation findings the caller must fix, or a fatal repository failure.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed")]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Repository(#[from] CoreError),
}

impl ServiceError {
    /// The validation findings, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            ServiceError::Invalid(errors) => Some(errors),
            ServiceError::Repository(_) => None,
        }
    }
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Identifier source; deterministic by sequence number in some strategies.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, seq: u64) -> RedirectId;
}

/// Repository port for persisting and loading redirects. Every path crossing
/// this boundary is already normalized by the caller.
pub trait RedirectRepository: Send + Sync {
    fn get_by_id(&self, id: &RedirectId) -> Result<Option<Redirect>, CoreError>;
    fn get_by_source(&self, source: &NormalizedPath) -> Result<Option<Redirect>, CoreError>;
    /// Upsert; returns the stored redirect.
    fn save(&self, redirect: Redirect) -> Result<Redirect, CoreError>;
    /// Returns false when the id does not exist.
    fn delete(&self, id: &RedirectId) -> Result<bool, CoreError>;
    fn list_all(&self) -> Result<Vec<Redirect>, CoreError>;
}

/// Optional port answering whether a path is already claimed by an
/// application route. Absence of an implementation disables the check.
pub trait RouteChecker: Send + Sync {
    fn route_exists(&self, path: &NormalizedPath) -> bool;
}

pub mod adapters;
pub mod graph;
pub mod id;
pub mod normalize;
pub mod resolve;
pub mod service;
pub mod validate;
