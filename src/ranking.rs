//! Reddit-style "hot" ranking.
//!
//! `score = log10(max(|votes|, 1)) + sign(votes) * elapsed / 45000`, where
//! `elapsed` is measured from a fixed epoch shared by every post, not from
//! the post's own creation time.

use chrono::{DateTime, TimeZone, Utc};

/// Seconds over which the time term grows by one order of magnitude of votes (12.5 hours)
pub const DECAY_SECONDS: f64 = 45_000.0;

/// Milliseconds since the Unix epoch of 2022-07-08T09:28:16.766Z
const TRENDING_EPOCH_MS: i64 = 1_657_272_496_766;

/// Reference instant all elapsed times are measured from
pub fn trending_epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(TRENDING_EPOCH_MS)
        .single()
        .unwrap_or_default()
}

/// Whole seconds from the trending epoch to `now` (floored)
pub fn elapsed_seconds(now: DateTime<Utc>) -> f64 {
    (now.timestamp_millis() - TRENDING_EPOCH_MS).div_euclid(1000) as f64
}

/// Trending score for a net vote count at a given elapsed time
pub fn score(vote_delta: i64, elapsed_seconds: f64) -> f64 {
    let sign = vote_delta.signum() as f64;
    let magnitude = vote_delta.unsigned_abs().max(1) as f64;
    magnitude.log10() + sign * elapsed_seconds / DECAY_SECONDS
}

/// Trending score for a net vote count, evaluated at `now`
pub fn score_at(vote_delta: i64, now: DateTime<Utc>) -> f64 {
    score(vote_delta, elapsed_seconds(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_votes_score_zero() {
        for t in [0.0, 1.0, 45_000.0, 1e9] {
            assert_eq!(score(0, t), 0.0);
        }
    }

    #[test]
    fn test_decay_constant() {
        assert_eq!(score(1, 45_000.0), 1.0);
        assert_eq!(score(-1, 45_000.0), -1.0);
    }

    #[test]
    fn test_log_weighting() {
        assert!((score(10, 0.0) - 1.0).abs() < 1e-12);
        assert!((score(-100, 0.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_in_votes() {
        let t = 90_000.0;
        for v in 1..200 {
            assert!(score(v + 1, t) > score(v, t));
        }
        for v in -200..-1 {
            // Larger negative magnitude raises the log term
            assert!(score(v - 1, t) > score(v, t));
        }
    }

    #[test]
    fn test_epoch() {
        assert_eq!(
            trending_epoch().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "2022-07-08T09:28:16.766Z"
        );
        assert_eq!(elapsed_seconds(trending_epoch()), 0.0);

        let later = trending_epoch() + chrono::Duration::milliseconds(45_000_999);
        assert_eq!(elapsed_seconds(later), 45_000.0);
        assert_eq!(score_at(1, later), 1.0);
    }
}
