use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::plan::BuildPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Applied,
    Cleaned,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Applied => "applied",
            SessionState::Cleaned => "cleaned",
        }
    }

    fn parse(s: &str) -> Option<SessionState> {
        match s {
            "pending" => Some(SessionState::Pending),
            "applied" => Some(SessionState::Applied),
            "cleaned" => Some(SessionState::Cleaned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub build_id: String,
    pub site_id: String,
    pub state: SessionState,
    pub created_at: String,
    pub updated_at: String,
}

/// What `enqueue` stored, handed back once by `claim`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedBuild {
    pub plan: BuildPlan,
    pub design: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub pending: usize,
    pub applied: usize,
    pub cleaned: usize,
}

/// Build plans parked while a site is provisioned, keyed by build id.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<SessionStore> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<SessionStore> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<SessionStore> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS build_sessions (
                build_id    TEXT PRIMARY KEY,
                site_id     TEXT NOT NULL,
                state       TEXT NOT NULL DEFAULT 'pending'
                            CHECK(state IN ('pending','applied','cleaned')),
                plan_json   TEXT,
                design_json TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_state ON build_sessions(state);
            ",
        )?;
        Ok(SessionStore { conn })
    }

    /// Park a plan under `build_id`. Returns false when the id already exists;
    /// the stored entry is never overwritten.
    pub fn enqueue(
        &self,
        build_id: &str,
        site_id: &str,
        plan: &BuildPlan,
        design: Option<&Value>,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let plan_json = serde_json::to_string(plan)?;
        let design_json = design.map(serde_json::to_string).transpose()?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO build_sessions
                 (build_id, site_id, state, plan_json, design_json, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?5)",
            params![build_id, site_id, plan_json, design_json, now],
        )?;
        debug!(build_id, inserted, "enqueue");
        Ok(inserted == 1)
    }

    /// Move a pending session to applied and return its payload. Only the
    /// first caller gets `Some`; later signals for the same id get `None`.
    pub fn claim(&self, build_id: &str) -> Result<Option<ClaimedBuild>> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE build_sessions SET state = 'applied', updated_at = ?2
             WHERE build_id = ?1 AND state = 'pending'",
            params![build_id, now],
        )?;
        if changed == 0 {
            debug!(build_id, "claim ignored, session not pending");
            return Ok(None);
        }
        let (plan_json, design_json): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT plan_json, design_json FROM build_sessions WHERE build_id = ?1",
            [build_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let plan_json =
            plan_json.ok_or_else(|| Error::validation(format!("session {} has no plan", build_id)))?;
        let plan = BuildPlan::from_value(serde_json::from_str(&plan_json)?)?;
        let design = design_json.map(|s| serde_json::from_str(&s)).transpose()?;
        Ok(Some(ClaimedBuild { plan, design }))
    }

    /// Mark a session cleaned and drop its payload. Safe to call in any state.
    pub fn cleanup(&self, build_id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE build_sessions
             SET state = 'cleaned', plan_json = NULL, design_json = NULL, updated_at = ?2
             WHERE build_id = ?1",
            params![build_id, now],
        )?;
        Ok(changed == 1)
    }

    pub fn get(&self, build_id: &str) -> Result<Option<SessionRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT build_id, site_id, state, created_at, updated_at
                 FROM build_sessions WHERE build_id = ?1",
                [build_id],
                read_row,
            )
            .optional()?;
        row.map(record_from_row).transpose()
    }

    pub fn list(&self, limit: Option<usize>) -> Result<Vec<SessionRecord>> {
        let sql = match limit {
            Some(n) => format!(
                "SELECT build_id, site_id, state, created_at, updated_at
                 FROM build_sessions ORDER BY created_at DESC, build_id LIMIT {}",
                n
            ),
            None => "SELECT build_id, site_id, state, created_at, updated_at
                 FROM build_sessions ORDER BY created_at DESC, build_id"
                .to_string(),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(record_from_row).collect()
    }

    pub fn stats(&self) -> Result<SessionStats> {
        let count = |state: &str| -> Result<usize> {
            Ok(self.conn.query_row(
                "SELECT COUNT(*) FROM build_sessions WHERE state = ?1",
                [state],
                |r| r.get(0),
            )?)
        };
        Ok(SessionStats {
            pending: count("pending")?,
            applied: count("applied")?,
            cleaned: count("cleaned")?,
        })
    }
}

type RecordRow = (String, String, String, String, String);

fn read_row(r: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
}

fn record_from_row(
    (build_id, site_id, state, created_at, updated_at): RecordRow,
) -> Result<SessionRecord> {
    let state = SessionState::parse(&state)
        .ok_or_else(|| Error::validation(format!("unknown session state `{}`", state)))?;
    Ok(SessionRecord {
        build_id,
        site_id,
        state,
        created_at,
        updated_at,
    })
}

/// Wait for the provisioning step to signal completion, then claim the
/// parked plan. On timeout, or when provisioning itself fails, the session
/// is cleaned up and `NotReady` is returned. A signal that arrives after the
/// session was already claimed yields `Ok(None)`.
pub async fn await_and_apply<F>(
    store: &SessionStore,
    build_id: &str,
    signal: F,
    timeout: Duration,
) -> Result<Option<ClaimedBuild>>
where
    F: Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(timeout, signal).await {
        Ok(Ok(())) => {
            let claimed = store.claim(build_id)?;
            if claimed.is_some() {
                info!(build_id, "completion signal received, plan claimed");
            }
            Ok(claimed)
        }
        Ok(Err(e)) => {
            warn!(build_id, "provisioning failed: {:#}", e);
            store.cleanup(build_id)?;
            Err(Error::not_ready(format!("provisioning failed: {:#}", e)))
        }
        Err(_) => {
            warn!(
                build_id,
                "no completion signal after {:.1}s, cleaning up",
                timeout.as_secs_f64()
            );
            store.cleanup(build_id)?;
            Err(Error::not_ready(format!(
                "no completion signal for build {} within {:.1}s",
                build_id,
                timeout.as_secs_f64()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan() -> BuildPlan {
        BuildPlan::from_value(json!({ "status": "ready", "plugins": ["seo"] })).unwrap()
    }

    #[test]
    fn enqueue_is_write_once() {
        let store = SessionStore::in_memory().unwrap();
        assert!(store.enqueue("b1", "acme", &plan(), None).unwrap());
        let other = BuildPlan::default();
        assert!(!store.enqueue("b1", "other", &other, None).unwrap());
        let rec = store.get("b1").unwrap().unwrap();
        assert_eq!(rec.site_id, "acme");
        assert_eq!(rec.state, SessionState::Pending);
    }

    #[test]
    fn duplicate_claims_apply_once() {
        let store = SessionStore::in_memory().unwrap();
        let design = json!({ "document": { "children": [] } });
        store.enqueue("b1", "acme", &plan(), Some(&design)).unwrap();

        let first = store.claim("b1").unwrap().unwrap();
        assert_eq!(first.plan.plugins, vec!["seo"]);
        assert_eq!(first.design, Some(design));
        assert!(store.claim("b1").unwrap().is_none());
        assert!(store.claim("missing").unwrap().is_none());
        assert_eq!(store.get("b1").unwrap().unwrap().state, SessionState::Applied);
    }

    #[test]
    fn cleanup_from_any_state() {
        let store = SessionStore::in_memory().unwrap();
        store.enqueue("b1", "acme", &plan(), None).unwrap();
        store.enqueue("b2", "acme", &plan(), None).unwrap();
        store.claim("b2").unwrap();
        assert!(store.cleanup("b1").unwrap());
        assert!(store.cleanup("b2").unwrap());
        assert!(!store.cleanup("nope").unwrap());
        assert!(store.claim("b1").unwrap().is_none());
        let stats = store.stats().unwrap();
        assert_eq!(stats, SessionStats { pending: 0, applied: 0, cleaned: 2 });
        assert_eq!(store.list(Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data/sessions.sqlite");
        {
            let store = SessionStore::open(&path).unwrap();
            store.enqueue("b1", "acme", &plan(), None).unwrap();
        }
        let store = SessionStore::open(&path).unwrap();
        assert!(store.claim("b1").unwrap().is_some());
    }

    #[tokio::test]
    async fn signal_then_claim() {
        let store = SessionStore::in_memory().unwrap();
        store.enqueue("b1", "acme", &plan(), None).unwrap();
        let got = await_and_apply(&store, "b1", async { Ok(()) }, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(got.is_some());
        let again = await_and_apply(&store, "b1", async { Ok(()) }, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn missing_signal_times_out_and_cleans() {
        let store = SessionStore::in_memory().unwrap();
        store.enqueue("b1", "acme", &plan(), None).unwrap();
        let err = await_and_apply(
            &store,
            "b1",
            std::future::pending::<anyhow::Result<()>>(),
            Duration::from_millis(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
        assert_eq!(store.get("b1").unwrap().unwrap().state, SessionState::Cleaned);
    }

    #[tokio::test]
    async fn failed_provisioning_cleans() {
        let store = SessionStore::in_memory().unwrap();
        store.enqueue("b1", "acme", &plan(), None).unwrap();
        let err = await_and_apply(
            &store,
            "b1",
            async { Err(anyhow::anyhow!("disk full")) },
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotReady(m) if m.contains("disk full")));
        assert!(store.claim("b1").unwrap().is_none());
    }
}
