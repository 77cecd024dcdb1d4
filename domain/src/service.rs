//! Application service orchestrating creation, mutation, and resolution of
//! redirects.
//!
//! Every write goes through the same pipeline: raw input validation, then
//! normalization, then the graph checks (uniqueness, loops, chain length,
//! route collisions) against the repository port. The service is generic over
//! repository, id generator, and clock, and keeps a simple monotonically
//! increasing counter to feed the id generator. This keeps the domain
//! testable without external dependencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::normalize::normalize_target;
use crate::resolve::{self, Resolution};
use crate::validate::{validate_collision, validate_source, validate_target};
use crate::{
    graph, Clock, CoreError, IdGenerator, NormalizedPath, Policy, Redirect, RedirectId,
    RedirectRepository, RouteChecker, ServiceError, ValidationCode, ValidationError,
};

/// Input data for creating a new redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewRedirect {
    pub source_path: String,
    pub target_path: String,
    /// Falls back to the policy default when unset.
    pub status_code: Option<u16>,
    pub created_by: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; only fields that are present are re-validated and applied.
/// `notes` uses a double Option so callers can clear it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedirectUpdate {
    pub source_path: Option<String>,
    pub target_path: Option<String>,
    pub status_code: Option<u16>,
    pub enabled: Option<bool>,
    pub notes: Option<Option<String>>,
}

/// One operation request per exposed service operation. Boundaries that speak
/// a command envelope (the demo CLI does) funnel everything through
/// [`RedirectService::dispatch`], and the compiler keeps the match exhaustive
/// as operations are added.
#[derive(Clone, Debug)]
pub enum RedirectRequest {
    Create(NewRedirect),
    Update {
        id: RedirectId,
        changes: RedirectUpdate,
    },
    Delete {
        id: RedirectId,
    },
    GetById {
        id: RedirectId,
    },
    GetBySource {
        path: String,
    },
    ListAll,
    Resolve {
        path: String,
    },
    ValidateAll,
}

/// Result payload of a dispatched operation.
#[derive(Clone, Debug)]
pub enum RedirectResponse {
    Redirect(Redirect),
    MaybeRedirect(Option<Redirect>),
    Deleted(bool),
    Redirects(Vec<Redirect>),
    Resolved(Option<Resolution>),
    Findings(Vec<(Redirect, Vec<ValidationError>)>),
}

pub struct RedirectService<R: RedirectRepository, G: IdGenerator, C: Clock> {
    repo: R,
    ids: G,
    clock: C,
    policy: Policy,
    routes: Option<Arc<dyn RouteChecker>>,
    next_seq: AtomicU64,
}

impl<R: RedirectRepository, G: IdGenerator, C: Clock> RedirectService<R, G, C> {
    pub fn new(repo: R, ids: G, clock: C, policy: Policy) -> Self {
        Self {
            repo,
            ids,
            clock,
            policy,
            routes: None,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Attach the optional route-checker port.
    pub fn with_route_checker(mut self, routes: Arc<dyn RouteChecker>) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn reserve_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a new redirect after running the full validation pipeline.
    pub fn create(&self, input: NewRedirect) -> Result<Redirect, ServiceError> {
        let mut errors = validate_source(&input.source_path);
        errors.extend(validate_target(&input.target_path, &self.policy));
        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        let source = NormalizedPath::new(&input.source_path);
        let target = normalize_target(&input.target_path);

        // A path pointing at itself invalidates everything downstream, so it
        // is the one finding reported alone.
        if self.policy.prevent_loops && source.as_str() == target {
            return Err(ServiceError::Invalid(vec![ValidationError::new(
                ValidationCode::RedirectLoop,
                Some("target_path"),
            )]));
        }

        let mut errors = Vec::new();
        if self.repo.get_by_source(&source)?.is_some() {
            errors.push(ValidationError::new(
                ValidationCode::SourceExists,
                Some("source_path"),
            ));
        }
        if self.policy.prevent_loops {
            errors.extend(graph::detect_loop(&source, &target, &self.repo, &self.policy)?);
        }
        errors.extend(graph::validate_chain_length(&target, &self.repo, &self.policy)?);
        errors.extend(validate_collision(&source, self.routes.as_deref(), &self.policy));
        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        let id = self.ids.next_id(self.reserve_seq());
        let mut redirect = Redirect::new(
            id,
            source,
            target,
            input.status_code.unwrap_or(self.policy.default_status_code),
            self.clock.now(),
        );
        redirect.created_by = input.created_by;
        redirect.notes = input.notes;
        Ok(self.repo.save(redirect)?)
    }

    /// Apply a partial update, re-validating exactly the fields present.
    pub fn update(
        &self,
        id: &RedirectId,
        changes: RedirectUpdate,
    ) -> Result<Redirect, ServiceError> {
        let Some(mut redirect) = self.repo.get_by_id(id)? else {
            return Err(ServiceError::Invalid(vec![ValidationError::new(
                ValidationCode::NotFound,
                None,
            )]));
        };

        let mut errors = Vec::new();

        let mut new_source = None;
        if let Some(ref raw) = changes.source_path {
            let source_errors = validate_source(raw);
            if source_errors.is_empty() {
                let candidate = NormalizedPath::new(raw);
                if candidate != redirect.source_path {
                    if let Some(other) = self.repo.get_by_source(&candidate)? {
                        if other.id != redirect.id {
                            errors.push(ValidationError::new(
                                ValidationCode::SourceExists,
                                Some("source_path"),
                            ));
                        }
                    }
                }
                new_source = Some(candidate);
            } else {
                errors.extend(source_errors);
            }
        }

        let mut new_target = None;
        if let Some(ref raw) = changes.target_path {
            let target_errors = validate_target(raw, &self.policy);
            if target_errors.is_empty() {
                let candidate = normalize_target(raw);
                let walk_source = new_source.as_ref().unwrap_or(&redirect.source_path);
                if self.policy.prevent_loops {
                    errors.extend(graph::detect_loop(
                        walk_source,
                        &candidate,
                        &self.repo,
                        &self.policy,
                    )?);
                }
                errors.extend(graph::validate_chain_length(
                    &candidate,
                    &self.repo,
                    &self.policy,
                )?);
                new_target = Some(candidate);
            } else {
                errors.extend(target_errors);
            }
        }

        if !errors.is_empty() {
            return Err(ServiceError::Invalid(errors));
        }

        if let Some(source) = new_source {
            redirect.source_path = source;
        }
        if let Some(target) = new_target {
            redirect.target_path = target;
        }
        if let Some(status_code) = changes.status_code {
            redirect.status_code = status_code;
        }
        if let Some(enabled) = changes.enabled {
            redirect.enabled = enabled;
        }
        if let Some(notes) = changes.notes {
            redirect.notes = notes;
        }
        redirect.updated_at = Some(self.clock.now());
        Ok(self.repo.save(redirect)?)
    }

    /// Unconditional delete; false when the id is unknown.
    pub fn delete(&self, id: &RedirectId) -> Result<bool, CoreError> {
        self.repo.delete(id)
    }

    pub fn get(&self, id: &RedirectId) -> Result<Option<Redirect>, CoreError> {
        self.repo.get_by_id(id)
    }

    /// Lookup by source path; the input is normalized before the lookup.
    pub fn get_by_source(&self, path: &str) -> Result<Option<Redirect>, CoreError> {
        self.repo.get_by_source(&NormalizedPath::new(path))
    }

    pub fn list_all(&self) -> Result<Vec<Redirect>, CoreError> {
        self.repo.list_all()
    }

    /// Integrity audit: re-run target validation and loop detection over the
    /// whole stored set. Chain length is deliberately not re-checked here,
    /// since chains legitimately grow past creation-time bounds over time.
    pub fn validate_all(&self) -> Result<Vec<(Redirect, Vec<ValidationError>)>, CoreError> {
        let mut findings = Vec::new();
        for redirect in self.repo.list_all()? {
            let mut errors = validate_target(&redirect.target_path, &self.policy);
            if self.policy.prevent_loops {
                errors.extend(graph::detect_loop(
                    &redirect.source_path,
                    &redirect.target_path,
                    &self.repo,
                    &self.policy,
                )?);
            }
            if !errors.is_empty() {
                findings.push((redirect, errors));
            }
        }
        Ok(findings)
    }

    /// Resolve an inbound path to its final target and status code.
    pub fn resolve(&self, path: &str) -> Result<Option<Resolution>, CoreError> {
        resolve::follow_chain(&self.repo, &self.policy, path)
    }

    /// Resolve a full request URL (path plus query) and merge the original
    /// query parameters onto the final target per policy, yielding the
    /// Location the HTTP boundary should send.
    pub fn resolve_request(&self, original_url: &str) -> Result<Option<Resolution>, CoreError> {
        let (path, _) = resolve::split_query(original_url);
        let Some(resolution) = self.resolve(path)? else {
            return Ok(None);
        };
        let location = resolve::preserve_query_params(
            original_url,
            &resolution.target,
            self.policy.preserve_utm_params,
        );
        Ok(Some(Resolution {
            target: location,
            status_code: resolution.status_code,
        }))
    }

    /// Single entry point over the operation enum.
    pub fn dispatch(&self, request: RedirectRequest) -> Result<RedirectResponse, ServiceError> {
        match request {
            RedirectRequest::Create(input) => {
                Ok(RedirectResponse::Redirect(self.create(input)?))
            }
            RedirectRequest::Update { id, changes } => {
                Ok(RedirectResponse::Redirect(self.update(&id, changes)?))
            }
            RedirectRequest::Delete { id } => Ok(RedirectResponse::Deleted(self.delete(&id)?)),
            RedirectRequest::GetById { id } => {
                Ok(RedirectResponse::MaybeRedirect(self.get(&id)?))
            }
            RedirectRequest::GetBySource { path } => {
                Ok(RedirectResponse::MaybeRedirect(self.get_by_source(&path)?))
            }
            RedirectRequest::ListAll => Ok(RedirectResponse::Redirects(self.list_all()?)),
            RedirectRequest::Resolve { path } => {
                Ok(RedirectResponse::Resolved(self.resolve_request(&path)?))
            }
            RedirectRequest::ValidateAll => {
                Ok(RedirectResponse::Findings(self.validate_all()?))
            }
        }
    }
}
