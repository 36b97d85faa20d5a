//! PostgreSQL coordination backend.
//!
//! Sessions are heartbeat rows; a session is live while
//! `renewed_at + ttl > NOW()`. A lock row belongs to one session and can only
//! be taken over once its owning session is no longer live.
//!
//! Another replica may take a key as soon as `renewed_at + ttl` passes, so
//! the holder gives up earlier: every renewal and monitor query is bounded by
//! a timeout, and the session is reported lost once
//! three quarters of its TTL have passed since the last confirmed renewal.

use async_trait::async_trait;
use routing_types::LockError;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::client::{stop_requested, CoordinationClient};
use crate::db::map_lock_err;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS lock_sessions (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        ttl_ms BIGINT NOT NULL,
        health_checks BOOLEAN NOT NULL DEFAULT FALSE,
        renewed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS locks (
        key TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        value BYTEA NOT NULL,
        acquired_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
];

const MIN_RENEW_PERIOD: Duration = Duration::from_millis(100);
const MIN_RETRY_DELAY: Duration = Duration::from_millis(25);

const SESSION_LIVE: &str = "renewed_at + ttl_ms * INTERVAL '1 millisecond' > NOW()";

/// Coordination backend on a shared PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PgCoordinator {
    pool: PgPool,
    poll_interval: Duration,
}

impl PgCoordinator {
    pub fn new(pool: PgPool, poll_interval: Duration) -> Self {
        Self { pool, poll_interval }
    }

    /// Create the session and lock tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), LockError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await.map_err(|e| map_lock_err(&e))?;
        }
        Ok(())
    }

    async fn session_live(&self, session_id: &str) -> Result<bool, sqlx::Error> {
        let sql = format!("SELECT 1 FROM lock_sessions WHERE id = $1 AND {SESSION_LIVE}");
        let row = sqlx::query(&sql).bind(session_id).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    async fn try_acquire(&self, key: &str, value: &[u8], session_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO locks (key, session_id, value)
               SELECT $1, $2, $3
               WHERE EXISTS (
                   SELECT 1 FROM lock_sessions s
                   WHERE s.id = $2 AND s.renewed_at + s.ttl_ms * INTERVAL '1 millisecond' > NOW()
               )
               ON CONFLICT (key) DO UPDATE
                   SET session_id = EXCLUDED.session_id, value = EXCLUDED.value, acquired_at = NOW()
               WHERE locks.session_id = EXCLUDED.session_id
                  OR NOT EXISTS (
                      SELECT 1 FROM lock_sessions s
                      WHERE s.id = locks.session_id
                        AND s.renewed_at + s.ttl_ms * INTERVAL '1 millisecond' > NOW()
                  )"#,
        )
        .bind(key)
        .bind(session_id)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn current_holder(&self, key: &str) -> Result<Option<Holder>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT l.session_id, s.ttl_ms,
                      COALESCE(s.renewed_at + s.ttl_ms * INTERVAL '1 millisecond' > NOW(), FALSE) AS live
               FROM locks l LEFT JOIN lock_sessions s ON s.id = l.session_id
               WHERE l.key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Holder {
            session_id: r.get("session_id"),
            ttl: r.get::<Option<i64>, _>("ttl_ms").map(|ms| Duration::from_millis(ms.max(0) as u64)),
            live: r.get("live"),
        }))
    }
}

struct Holder {
    session_id: String,
    ttl: Option<Duration>,
    live: bool,
}

/// How long after its last confirmed renewal a session stops being trusted
/// locally. A quarter of the TTL is left for clock drift and the in-flight
/// query, so the holder steps down before any other replica can take the key.
fn step_down_after(ttl: Duration) -> Duration {
    ttl.saturating_sub(ttl / 4)
}

/// Run `query`, failing with a timed-out I/O error once `limit` passes.
///
/// A partitioned connection can otherwise block until the OS gives up on it.
async fn bounded<T>(
    limit: Duration,
    query: impl Future<Output = Result<T, sqlx::Error>>,
) -> Result<T, sqlx::Error> {
    match tokio::time::timeout(limit, query).await {
        Ok(result) => result,
        Err(_) => Err(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("query timed out after {limit:?}"),
        ))),
    }
}

/// Renewal loop behind `renew_periodic`.
///
/// `renew` gets the time left before step-down and reports whether the
/// session row was still live and got refreshed.
async fn keep_renewed<F, Fut>(
    session_id: &str,
    ttl: Duration,
    mut done: watch::Receiver<bool>,
    mut renew: F,
) -> Result<(), LockError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = Result<bool, sqlx::Error>>,
{
    let period = (ttl / 2).max(MIN_RENEW_PERIOD);
    let retry_delay = (period / 4).max(MIN_RETRY_DELAY);
    let give_up = step_down_after(ttl);
    // Slightly later than the insert stamp; the step-down margin absorbs it.
    let mut last_renewed = Instant::now();
    let mut wait = period;

    loop {
        tokio::select! {
            biased;
            () = stop_requested(&mut done) => return Ok(()),
            () = tokio::time::sleep(wait) => {},
        }

        let attempt = Instant::now();
        let remaining = give_up.saturating_sub(attempt.duration_since(last_renewed));
        if remaining.is_zero() {
            warn!(session = %session_id, "session not renewed in time, stepping down");
            return Err(LockError::Backend {
                message: format!("session {session_id} not renewed within {give_up:?}"),
            });
        }

        match renew(remaining).await {
            Ok(true) => {
                last_renewed = attempt;
                wait = period;
            },
            Ok(false) => {
                return Err(LockError::SessionInvalid { session_id: session_id.to_string() });
            },
            Err(err) => {
                warn!(session = %session_id, error = %err, "session renewal attempt failed");
                if last_renewed.elapsed() >= give_up {
                    return Err(map_lock_err(&err));
                }
                wait = retry_delay.min(give_up.saturating_sub(last_renewed.elapsed()));
            },
        }
    }
}

#[async_trait]
impl CoordinationClient for PgCoordinator {
    async fn create_session(
        &self,
        name: &str,
        ttl: Duration,
        with_health_checks: bool,
    ) -> Result<String, LockError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO lock_sessions (id, name, ttl_ms, health_checks) VALUES ($1, $2, $3, $4)")
            .bind(&id)
            .bind(name)
            .bind(ttl.as_millis() as i64)
            .bind(with_health_checks)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::SessionCreate { name: name.to_string(), message: e.to_string() })?;
        Ok(id)
    }

    async fn renew_periodic(
        &self,
        session_id: &str,
        ttl: Duration,
        mut done: watch::Receiver<bool>,
    ) -> Result<(), LockError> {
        let sql = format!("UPDATE lock_sessions SET renewed_at = NOW() WHERE id = $1 AND {SESSION_LIVE}");
        keep_renewed(session_id, ttl, done, |limit| {
            let query = sqlx::query(&sql).bind(session_id).execute(&self.pool);
            async move { bounded(limit, query).await.map(|result| result.rows_affected() == 1) }
        })
        .await
    }

    async fn destroy_session(&self, session_id: &str) -> Result<(), LockError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_lock_err(&e))?;
        sqlx::query("DELETE FROM locks WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_lock_err(&e))?;
        sqlx::query("DELETE FROM lock_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_lock_err(&e))?;
        tx.commit().await.map_err(|e| map_lock_err(&e))
    }

    async fn acquire_lock(
        &self,
        key: &str,
        value: &[u8],
        session_id: &str,
    ) -> Result<(), LockError> {
        loop {
            let acquired = self.try_acquire(key, value, session_id).await.map_err(|e| {
                LockError::AcquireFailed { key: key.to_string(), message: e.to_string() }
            })?;
            if acquired {
                return Ok(());
            }

            let live = self.session_live(session_id).await.map_err(|e| LockError::AcquireFailed {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            if !live {
                return Err(LockError::SessionInvalid { session_id: session_id.to_string() });
            }

            debug!(key = %key, session = %session_id, "lock held elsewhere, polling");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn monitor_lock(&self, key: &str, session_id: &str) -> LockError {
        let mut last_confirmed = Instant::now();
        // Until the first confirmation reports the session TTL.
        let mut tolerance = self.poll_interval * 3;
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let attempt = Instant::now();
            match bounded(self.poll_interval, self.current_holder(key)).await {
                Ok(Some(holder)) if holder.session_id == session_id && holder.live => {
                    last_confirmed = attempt;
                    if let Some(ttl) = holder.ttl {
                        tolerance = step_down_after(ttl);
                    }
                },
                Ok(_) => return LockError::LockLost { key: key.to_string() },
                Err(err) => {
                    warn!(key = %key, error = %err, "failed to confirm lock holder");
                    if last_confirmed.elapsed() >= tolerance {
                        return LockError::LockLost { key: key.to_string() };
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_down_precedes_expiry() {
        for secs in [1, 2, 15, 60] {
            let ttl = Duration::from_secs(secs);
            let step_down = step_down_after(ttl);
            assert!(step_down < ttl);
            assert!(step_down >= ttl / 2, "must outlast one renewal period");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_query_times_out() {
        let started = Instant::now();
        let result = bounded(Duration::from_secs(2), std::future::pending::<Result<(), sqlx::Error>>()).await;

        match result {
            Err(sqlx::Error::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::TimedOut),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partitioned_renewal_steps_down_before_expiry() {
        let ttl = Duration::from_secs(15);
        let (_done_tx, done) = watch::channel(false);
        let started = Instant::now();
        let mut calls = 0;

        let result = keep_renewed("s-1", ttl, done, |limit| {
            calls += 1;
            let first = calls == 1;
            async move {
                if first {
                    return Ok(true);
                }
                // The socket hangs: only the timeout ends the query.
                bounded(limit, std::future::pending::<Result<bool, sqlx::Error>>()).await
            }
        })
        .await;

        assert!(matches!(result, Err(LockError::Backend { .. })), "got {result:?}");
        let stepped_down = started.elapsed();
        // Last renewal at ttl/2; the key is stealable from there plus ttl.
        assert!(stepped_down < ttl / 2 + ttl, "stepped down at {stepped_down:?}");
        assert!(stepped_down <= ttl / 2 + step_down_after(ttl));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_renewal_error_is_retried() {
        let (_done_tx, done) = watch::channel(false);
        let mut calls = 0;

        let result = timeout_after(Duration::from_secs(30), keep_renewed("s-1", Duration::from_secs(10), done, |_| {
            calls += 1;
            let call = calls;
            async move {
                match call {
                    1 => Err(sqlx::Error::PoolTimedOut),
                    2..=4 => Ok(true),
                    _ => Ok(false),
                }
            }
        }))
        .await;

        assert!(matches!(result, Some(Err(LockError::SessionInvalid { .. }))), "got {result:?}");
        assert_eq!(calls, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_stops_when_done() {
        let (done_tx, done) = watch::channel(false);
        done_tx.send_replace(true);

        let result = keep_renewed("s-1", Duration::from_secs(10), done, |_| async { Ok(true) }).await;
        assert_eq!(result, Ok(()));
    }

    async fn timeout_after<T>(limit: Duration, fut: impl Future<Output = T>) -> Option<T> {
        tokio::time::timeout(limit, fut).await.ok()
    }

    #[tokio::test]
    async fn test_finished_query_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, sqlx::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
