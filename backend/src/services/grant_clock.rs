use chrono::{DateTime, Utc};

use crate::db::entities::portable_grant;
use crate::db::enums::GrantStatus;

/// Remaining seconds of a grant as of `now`.
///
/// The stored balance is exact at `state_changed_at`. Only an active grant
/// burns time; a `state_changed_at` in the future counts as no elapsed time.
pub fn remaining_now(
    status: GrantStatus,
    remaining_seconds: i64,
    state_changed_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    let stored = remaining_seconds.max(0);
    if status != GrantStatus::Active {
        return stored;
    }
    let elapsed = (now - state_changed_at).num_seconds().max(0);
    (stored - elapsed).max(0)
}

impl portable_grant::Model {
    pub fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        remaining_now(self.status, self.remaining_seconds, self.state_changed_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(unix: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(unix, 0).unwrap()
    }

    #[test]
    fn test_active_grant_burns_elapsed_time() {
        assert_eq!(remaining_now(GrantStatus::Active, 600, at(1_000), at(1_100)), 500);
    }

    #[test]
    fn test_partial_seconds_are_floored() {
        let now = at(1_100) + Duration::milliseconds(999);
        assert_eq!(remaining_now(GrantStatus::Active, 600, at(1_000), now), 500);
    }

    #[test]
    fn test_future_anchor_counts_as_zero_elapsed() {
        assert_eq!(remaining_now(GrantStatus::Active, 600, at(2_000), at(1_000)), 600);
    }

    #[test]
    fn test_paused_and_ended_are_frozen() {
        assert_eq!(remaining_now(GrantStatus::Paused, 600, at(0), at(100_000)), 600);
        assert_eq!(remaining_now(GrantStatus::Ended, 0, at(0), at(100_000)), 0);
    }

    #[test]
    fn test_never_negative() {
        assert_eq!(remaining_now(GrantStatus::Active, 60, at(0), at(10_000)), 0);
        assert_eq!(remaining_now(GrantStatus::Paused, -5, at(0), at(0)), 0);
    }

    #[test]
    fn test_monotonically_non_increasing_while_active() {
        let mut previous = i64::MAX;
        for t in (0..1_000).step_by(37) {
            let value = remaining_now(GrantStatus::Active, 700, at(0), at(t));
            assert!(value <= previous);
            previous = value;
        }
        assert_eq!(previous, 0);
    }
}
