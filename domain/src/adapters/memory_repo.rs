//! Simple in-memory repository for tests and local demos. Not intended for
//! high concurrency beyond the internal mutex guarding the map.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{CoreError, NormalizedPath, Redirect, RedirectId, RedirectRepository};

/// In-memory repository keyed by redirect id; source lookups scan linearly,
/// which is fine at test and demo scale.
pub struct InMemoryRedirectRepo {
    inner: Mutex<BTreeMap<String, Redirect>>,
}

impl InMemoryRedirectRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryRedirectRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl RedirectRepository for InMemoryRedirectRepo {
    fn get_by_id(&self, id: &RedirectId) -> Result<Option<Redirect>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.get(id.as_str()).cloned())
    }

    fn get_by_source(&self, source: &NormalizedPath) -> Result<Option<Redirect>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map
            .values()
            .find(|redirect| redirect.source_path == *source)
            .cloned())
    }

    fn save(&self, redirect: Redirect) -> Result<Redirect, CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        map.insert(redirect.id.as_str().to_string(), redirect.clone());
        Ok(redirect)
    }

    fn delete(&self, id: &RedirectId) -> Result<bool, CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        Ok(map.remove(id.as_str()).is_some())
    }

    fn list_all(&self) -> Result<Vec<Redirect>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let mut all: Vec<Redirect> = map.values().cloned().collect();
        all.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn mk_redirect(id: &str, source: &str, target: &str) -> Redirect {
        Redirect::new(
            RedirectId::new(id),
            NormalizedPath::new(source),
            target.to_string(),
            301,
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn save_get_roundtrip() {
        let repo = InMemoryRedirectRepo::new();
        let redirect = mk_redirect("1", "/old", "/new");
        repo.save(redirect.clone()).expect("save");
        let got = repo.get_by_id(&redirect.id).expect("get").expect("some");
        assert_eq!(got.target_path, "/new");
    }

    #[test]
    fn save_is_an_upsert() {
        let repo = InMemoryRedirectRepo::new();
        let mut redirect = mk_redirect("1", "/old", "/new");
        repo.save(redirect.clone()).expect("save");
        redirect.target_path = "/newer".to_string();
        repo.save(redirect.clone()).expect("save again");
        let got = repo.get_by_id(&redirect.id).expect("get").expect("some");
        assert_eq!(got.target_path, "/newer");
    }

    #[test]
    fn get_by_source_finds_the_edge() {
        let repo = InMemoryRedirectRepo::new();
        repo.save(mk_redirect("1", "/old", "/new")).expect("save");
        let got = repo
            .get_by_source(&NormalizedPath::new("/old"))
            .expect("get")
            .expect("some");
        assert_eq!(got.id.as_str(), "1");
        assert!(repo
            .get_by_source(&NormalizedPath::new("/missing"))
            .expect("get")
            .is_none());
    }

    #[test]
    fn delete_reports_existence() {
        let repo = InMemoryRedirectRepo::new();
        let redirect = mk_redirect("1", "/old", "/new");
        repo.save(redirect.clone()).expect("save");
        assert!(repo.delete(&redirect.id).expect("delete"));
        assert!(!repo.delete(&redirect.id).expect("delete again"));
        assert!(repo.get_by_id(&redirect.id).expect("get").is_none());
    }

    #[test]
    fn list_all_is_ordered_by_source() {
        let repo = InMemoryRedirectRepo::new();
        repo.save(mk_redirect("2", "/zebra", "/a")).expect("save");
        repo.save(mk_redirect("1", "/apple", "/b")).expect("save");
        let all = repo.list_all().expect("list");
        let sources: Vec<&str> = all.iter().map(|r| r.source_path.as_str()).collect();
        assert_eq!(sources, vec!["/apple", "/zebra"]);
    }
}
