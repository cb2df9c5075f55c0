//! Staleness predicate for commands stuck awaiting payment.
//!
//! A single pure function of `(created_at, now, threshold)` so that the
//! periodic background sweep and the lazy check inside
//! [`CommandStore::create`][crate::store::CommandStore::create] can never
//! disagree about which commands are expired for a given `now`.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// How long a command may wait for payment confirmation before it expires.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// `true` when a command created at `created_at` has waited at least
/// `threshold` as of `now`.
pub fn is_stale(created_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
    now.signed_duration_since(created_at) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_command_is_not_stale() {
        let now = Utc::now();
        assert!(!is_stale(now, now, DEFAULT_PAYMENT_TIMEOUT));
    }

    #[test]
    fn command_at_threshold_is_stale() {
        let now = Utc::now();
        let created = now - chrono::Duration::seconds(300);
        assert!(is_stale(created, now, DEFAULT_PAYMENT_TIMEOUT));
    }

    #[test]
    fn command_just_under_threshold_is_not_stale() {
        let now = Utc::now();
        let created = now - chrono::Duration::seconds(299);
        assert!(!is_stale(created, now, DEFAULT_PAYMENT_TIMEOUT));
    }

    #[test]
    fn huge_threshold_never_stale() {
        let now = Utc::now();
        let created = now - chrono::Duration::days(365);
        assert!(!is_stale(created, now, Duration::MAX));
    }
}
