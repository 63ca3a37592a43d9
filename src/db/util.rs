//! Retrying units of work that lose a write race.
//!
//! SQLite allows one writer at a time. A deferred transaction that read under an
//! older snapshot cannot upgrade its lock once another writer has committed, so it
//! fails with `SQLITE_BUSY` (or one of its extended codes). Running the whole unit
//! again from a fresh snapshot resolves it.
use std::{future::Future, time::Duration};

use tracing::debug;

use super::{StoreError, StoreResult};

/// Extended result codes sqlx reports for busy or locked databases.
const RETRY_CODES: &[&str] = &[
    "5",   // SQLITE_BUSY
    "261", // SQLITE_BUSY_RECOVERY
    "517", // SQLITE_BUSY_SNAPSHOT
    "773", // SQLITE_BUSY_TIMEOUT
    "6",   // SQLITE_LOCKED
    "262", // SQLITE_LOCKED_SHAREDCACHE
];

const MAX_RETRIES: usize = 60;
const TIMEOUT_MS: u64 = 5000;

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// backoff budget runs out. Each call must start its own transaction.
pub(crate) async fn retry_sqlite<F, Fut, T>(operation: F) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Err(err) if is_retryable_sqlite_error(&err) => {
                match get_wait_ms_sqlite(attempt, TIMEOUT_MS) {
                    Some(wait_ms) if attempt < MAX_RETRIES => {
                        debug!(attempt, wait_ms, "database busy, retrying");
                        tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                        attempt += 1;
                    }
                    _ => return Err(err),
                }
            }
            result => return result,
        }
    }
}

fn is_retryable_sqlite_error(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Query(sqlx::Error::Database(db_err))
            if db_err.code().is_some_and(|code| RETRY_CODES.contains(&code.as_ref()))
    )
}

/// Backoff schedule modelled on SQLite's own busy handler.
fn get_wait_ms_sqlite(attempt: usize, timeout: u64) -> Option<u64> {
    const DELAYS: [u64; 12] = [1, 2, 5, 10, 15, 20, 25, 25, 25, 50, 50, 100];
    const TOTALS: [u64; 12] = [0, 1, 3, 8, 18, 33, 53, 78, 103, 128, 178, 228];
    const LAST: usize = DELAYS.len() - 1;

    let (delay, prior) = if attempt > LAST {
        let extra = (attempt - LAST) as u64;
        (DELAYS[LAST], TOTALS[LAST] + DELAYS[LAST] * extra)
    } else {
        (DELAYS[attempt], TOTALS[attempt])
    };

    (prior + delay <= timeout).then_some(delay)
}
