//! Chain resolution and query-parameter carry-over.
//!
//! Resolution re-reads the chain from the repository on every call; there is
//! deliberately no cache in the engine. The hop count is bounded by the
//! policy, and when the bound is reached the last fully-resolved hop wins.

use std::collections::HashSet;

use url::form_urlencoded;

use crate::{CoreError, NormalizedPath, Policy, RedirectRepository};

/// Tracking parameters carried across a redirect when UTM preservation is on.
const UTM_KEYS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_content",
    "utm_term",
];

/// Outcome of following a redirect chain: where to send the client, and with
/// which status code (always the code of the last hop actually followed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub target: String,
    pub status_code: u16,
}

/// Follow enabled redirects starting at `path` for at most
/// `max_chain_length` hops. `None` when nothing matches or the feature is
/// globally disabled.
pub fn follow_chain<R: RedirectRepository + ?Sized>(
    repo: &R,
    policy: &Policy,
    path: &str,
) -> Result<Option<Resolution>, CoreError> {
    if !policy.enabled {
        return Ok(None);
    }
    let source = NormalizedPath::new(path);
    let first = match repo.get_by_source(&source)? {
        Some(redirect) if redirect.enabled => redirect,
        _ => return Ok(None),
    };
    let mut target = first.target_path;
    let mut status_code = first.status_code;
    for _ in 1..policy.max_chain_length {
        let next_source = NormalizedPath::new(&target);
        match repo.get_by_source(&next_source)? {
            Some(next) if next.enabled => {
                target = next.target_path;
                status_code = next.status_code;
            }
            _ => break,
        }
    }
    Ok(Some(Resolution {
        target,
        status_code,
    }))
}

/// Split a URL-ish string into its base and query (without the `?`).
pub fn split_query(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((base, query)) => (base, query),
        None => (url, ""),
    }
}

/// Merge query parameters from the originally requested URL onto the target,
/// producing the externally observable Location. With `preserve_utm` only the
/// utm_* tracking keys are carried over; otherwise every original parameter
/// is. Parameters already present on the target always win.
pub fn preserve_query_params(original_url: &str, target_path: &str, preserve_utm: bool) -> String {
    let (_, original_query) = split_query(original_url);
    let (target_base, target_query) = split_query(target_path);

    let mut merged: Vec<(String, String)> = form_urlencoded::parse(target_query.as_bytes())
        .into_owned()
        .collect();
    let taken: HashSet<String> = merged
        .iter()
        .map(|(key, _)| key.to_ascii_lowercase())
        .collect();

    for (key, value) in form_urlencoded::parse(original_query.as_bytes()).into_owned() {
        let folded = key.to_ascii_lowercase();
        if taken.contains(&folded) {
            continue;
        }
        if preserve_utm && !UTM_KEYS.contains(&folded.as_str()) {
            continue;
        }
        merged.push((key, value));
    }

    if merged.is_empty() {
        return target_base.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&merged)
        .finish();
    format!("{}?{}", target_base, query)
}
