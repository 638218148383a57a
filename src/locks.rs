use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::AppResult;

pub const INITIATION_LOCK: &str = "settlement:initiation";
pub const CONFIRMATION_LOCK: &str = "settlement:confirmation";
pub const BALANCE_CHECK_LOCK: &str = "settlement:balance_check";

/// Named, non-blocking, cluster-wide mutual exclusion for the settlement
/// jobs. `try_acquire` never waits: a held lock means "someone else is
/// already running this" and the caller exits with an informational status.
#[async_trait]
pub trait JobLock: Send + Sync {
    async fn try_acquire(&self, key: &str) -> AppResult<bool>;

    async fn release(&self, key: &str) -> AppResult<()>;
}

/// Postgres advisory-lock implementation. Each held lock pins one pooled
/// connection for its lifetime - advisory locks are session-scoped, so the
/// unlock must run on the connection that acquired it.
pub struct PgJobLock {
    pool: PgPool,
    held: Mutex<HashMap<String, PoolConnection<Postgres>>>,
}

impl PgJobLock {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl JobLock for PgJobLock {
    async fn try_acquire(&self, key: &str) -> AppResult<bool> {
        let mut held = self.held.lock().await;
        if held.contains_key(key) {
            return Ok(false);
        }

        let mut conn = self.pool.acquire().await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(advisory_key(key))
            .fetch_one(&mut *conn)
            .await?;

        if acquired {
            held.insert(key.to_string(), conn);
        }

        Ok(acquired)
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        let conn = self.held.lock().await.remove(key);

        let Some(mut conn) = conn else {
            warn!("Release of lock '{key}' that was not held here");
            return Ok(());
        };

        let unlocked: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(advisory_key(key))
            .fetch_one(&mut *conn)
            .await?;

        if !unlocked {
            warn!("Advisory unlock for '{key}' reported not held");
        }

        Ok(())
    }
}

/// Stable 64-bit advisory key from a lock name
fn advisory_key(key: &str) -> i64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_keys_are_stable_and_distinct() {
        assert_eq!(advisory_key(INITIATION_LOCK), advisory_key(INITIATION_LOCK));
        assert_ne!(advisory_key(INITIATION_LOCK), advisory_key(CONFIRMATION_LOCK));
        assert_ne!(advisory_key(CONFIRMATION_LOCK), advisory_key(BALANCE_CHECK_LOCK));
    }
}
