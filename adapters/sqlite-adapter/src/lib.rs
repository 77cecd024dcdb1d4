//! sqlite-adapter — SQLite implementation of the RedirectRepository port for
//! local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based repository to run the system locally
//!   without external services.
//! - Implements the `RedirectRepository` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as seconds since UNIX_EPOCH (u64).
//! - A partial unique index on enabled source paths gives this backend the
//!   repository-level uniqueness enforcement the engine's create-then-check
//!   sequence cannot guarantee on its own.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{CoreError, NormalizedPath, Redirect, RedirectId, RedirectRepository};
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed repository for local development.
pub struct SqliteRedirectRepo {
    conn: std::sync::Mutex<Connection>,
}

impl SqliteRedirectRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/redirects.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/redirects.db".to_string());
        // Ensure directory exists
        if let Some(dir) = std::path::Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(path)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS redirects (
            id TEXT PRIMARY KEY,
            source_path TEXT NOT NULL,
            target_path TEXT NOT NULL,
            status_code INTEGER NOT NULL DEFAULT 301,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER,
            created_by TEXT,
            notes TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_redirects_source ON redirects(source_path);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_redirects_enabled_source
            ON redirects(source_path) WHERE enabled = 1;
        "#,
    )
    .map_err(map_sqerr)?;
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn row_to_redirect(row: &rusqlite::Row) -> rusqlite::Result<Redirect> {
    let id: String = row.get(0)?;
    let source: String = row.get(1)?;
    let target: String = row.get(2)?;
    let status_code: i64 = row.get(3)?;
    let enabled: i64 = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    let updated_at: Option<i64> = row.get(6)?;
    let created_by: Option<String> = row.get(7)?;
    let notes: Option<String> = row.get(8)?;

    Ok(Redirect {
        id: RedirectId::new(id),
        // Stored values are already canonical; re-normalizing is idempotent.
        source_path: NormalizedPath::new(source),
        target_path: target,
        status_code: status_code as u16,
        enabled: enabled != 0,
        created_at: secs_to_system_time(created_at as u64),
        updated_at: updated_at.map(|t| secs_to_system_time(t as u64)),
        created_by,
        notes,
    })
}

const SELECT_COLUMNS: &str =
    "id, source_path, target_path, status_code, enabled, created_at, updated_at, created_by, notes";

impl RedirectRepository for SqliteRedirectRepo {
    fn get_by_id(&self, id: &RedirectId) -> Result<Option<Redirect>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM redirects WHERE id = ?1"),
            params![id.as_str()],
            row_to_redirect,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn get_by_source(&self, source: &NormalizedPath) -> Result<Option<Redirect>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM redirects WHERE source_path = ?1 \
                 ORDER BY enabled DESC LIMIT 1"
            ),
            params![source.as_str()],
            row_to_redirect,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn save(&self, redirect: Redirect) -> Result<Redirect, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        conn.execute(
            "INSERT INTO redirects \
                 (id, source_path, target_path, status_code, enabled, created_at, updated_at, created_by, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(id) DO UPDATE SET \
                 source_path = excluded.source_path, \
                 target_path = excluded.target_path, \
                 status_code = excluded.status_code, \
                 enabled = excluded.enabled, \
                 updated_at = excluded.updated_at, \
                 created_by = excluded.created_by, \
                 notes = excluded.notes",
            params![
                redirect.id.as_str(),
                redirect.source_path.as_str(),
                redirect.target_path,
                redirect.status_code as i64,
                redirect.enabled as i64,
                system_time_to_secs(redirect.created_at) as i64,
                redirect.updated_at.map(|t| system_time_to_secs(t) as i64),
                redirect.created_by,
                redirect.notes,
            ],
        )
        .map_err(map_sqerr)?;
        Ok(redirect)
    }

    fn delete(&self, id: &RedirectId) -> Result<bool, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let affected = conn
            .execute("DELETE FROM redirects WHERE id = ?1", params![id.as_str()])
            .map_err(map_sqerr)?;
        Ok(affected > 0)
    }

    fn list_all(&self) -> Result<Vec<Redirect>, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM redirects ORDER BY source_path"
            ))
            .map_err(map_sqerr)?;
        let rows = stmt
            .query_map([], row_to_redirect)
            .map_err(map_sqerr)?;
        let mut all = Vec::new();
        for row in rows {
            all.push(row.map_err(map_sqerr)?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteRedirectRepo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = SqliteRedirectRepo::new(dir.path().join("redirects.db")).expect("open");
        (dir, repo)
    }

    fn mk_redirect(id: &str, source: &str, target: &str) -> Redirect {
        let mut redirect = Redirect::new(
            RedirectId::new(id),
            NormalizedPath::new(source),
            target.to_string(),
            301,
            secs_to_system_time(1_700_000_000),
        );
        redirect.created_by = Some("admin@example.com".to_string());
        redirect
    }

    #[test]
    fn save_get_roundtrip_preserves_fields() {
        let (_dir, repo) = open_temp();
        let mut redirect = mk_redirect("r1", "/old", "/new");
        redirect.notes = Some("moved in the 2024 restructure".to_string());
        repo.save(redirect.clone()).expect("save");

        let got = repo.get_by_id(&redirect.id).expect("get").expect("some");
        assert_eq!(got, redirect);
        let by_source = repo
            .get_by_source(&NormalizedPath::new("/old"))
            .expect("get")
            .expect("some");
        assert_eq!(by_source.id, redirect.id);
    }

    #[test]
    fn save_upserts_on_id() {
        let (_dir, repo) = open_temp();
        let mut redirect = mk_redirect("r1", "/old", "/new");
        repo.save(redirect.clone()).expect("save");
        redirect.target_path = "/newer".to_string();
        redirect.updated_at = Some(secs_to_system_time(1_700_000_100));
        repo.save(redirect.clone()).expect("save again");

        let got = repo.get_by_id(&redirect.id).expect("get").expect("some");
        assert_eq!(got.target_path, "/newer");
        assert!(got.updated_at.is_some());
        assert_eq!(repo.list_all().expect("list").len(), 1);
    }

    #[test]
    fn enabled_source_uniqueness_is_enforced() {
        let (_dir, repo) = open_temp();
        repo.save(mk_redirect("r1", "/old", "/new")).expect("save");
        let err = repo.save(mk_redirect("r2", "/old", "/other")).unwrap_err();
        assert!(matches!(err, CoreError::Repository(_)));

        // A disabled row at the same source is allowed.
        let mut disabled = mk_redirect("r3", "/old", "/retired");
        disabled.enabled = false;
        repo.save(disabled).expect("disabled duplicate");
    }

    #[test]
    fn delete_reports_existence() {
        let (_dir, repo) = open_temp();
        let redirect = mk_redirect("r1", "/old", "/new");
        repo.save(redirect.clone()).expect("save");
        assert!(repo.delete(&redirect.id).expect("delete"));
        assert!(!repo.delete(&redirect.id).expect("delete again"));
    }

    #[test]
    fn list_all_orders_by_source() {
        let (_dir, repo) = open_temp();
        repo.save(mk_redirect("r1", "/zebra", "/a")).expect("save");
        repo.save(mk_redirect("r2", "/apple", "/b")).expect("save");
        let sources: Vec<String> = repo
            .list_all()
            .expect("list")
            .into_iter()
            .map(|r| r.source_path.into_string())
            .collect();
        assert_eq!(sources, vec!["/apple", "/zebra"]);
    }
}
