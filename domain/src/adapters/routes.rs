//! A fixed-set route checker, fed from configuration or test fixtures.

use std::collections::HashSet;

use crate::{NormalizedPath, RouteChecker};

/// Route checker backed by a static set of reserved paths.
pub struct StaticRouteChecker {
    routes: HashSet<NormalizedPath>,
}

impl StaticRouteChecker {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            routes: routes.into_iter().map(NormalizedPath::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl RouteChecker for StaticRouteChecker {
    fn route_exists(&self, path: &NormalizedPath) -> bool {
        self.routes.contains(path)
    }
}
