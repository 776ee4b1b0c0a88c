//! Retry policy for sqlite writes that hit `SQLITE_BUSY`/`SQLITE_LOCKED`
//! (spec §7's `StoreWriteConflict`). Shape mirrors the node client's
//! reconnect backoff: jittered exponential delay with a capped attempt
//! count.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WriteBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Number of retries after the first attempt. `0` disables retrying.
    pub max_attempts: u32,
}

impl Default for WriteBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            backoff_factor: 2.0,
            max_attempts: 4,
        }
    }
}

impl WriteBackoff {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.backoff_factor.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        let jitter = capped_ms * 0.25 * pseudo_random_fraction(attempt);
        Duration::from_millis((capped_ms + jitter) as u64)
    }

    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Cheap deterministic "random" fraction in [0, 1), just enough to spread
/// retries issued in the same instant across different delays.
fn pseudo_random_fraction(attempt: u32) -> f64 {
    let hash = attempt.wrapping_mul(2654435761);
    (hash as f64) / (u32::MAX as f64)
}

/// True for the two sqlite error codes a retry can plausibly clear.
pub fn is_retryable(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_caps() {
        let b = WriteBackoff::default();
        assert!(b.delay_for_attempt(0) < b.delay_for_attempt(1));
        assert!(b.delay_for_attempt(10) <= b.max_delay + b.max_delay.mul_f64(0.25));
    }

    #[test]
    fn gives_up_past_max_attempts() {
        let b = WriteBackoff::default();
        assert!(!b.should_give_up(0));
        assert!(b.should_give_up(b.max_attempts));
    }

    #[test]
    fn busy_and_locked_are_retryable_other_sqlite_errors_are_not() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseBusy,
                extended_code: 5,
            },
            None,
        );
        let locked = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::DatabaseLocked,
                extended_code: 6,
            },
            None,
        );
        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: 19,
            },
            None,
        );
        assert!(is_retryable(&busy));
        assert!(is_retryable(&locked));
        assert!(!is_retryable(&constraint));
        assert!(!is_retryable(&rusqlite::Error::QueryReturnedNoRows));
    }
}
