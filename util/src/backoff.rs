use std::time::Duration;

use rand::Rng;

const CAP: Duration = Duration::from_secs(10);
const BASE: Duration = Duration::from_millis(200);

/// Full-jitter exponential backoff for the batch writer's retry loop
/// (4.C Batch writer): delay grows with `attempt` but is capped at ~10s
/// and randomized across `[0, cap]` so retrying tasks don't all wake up
/// in lockstep against a recovering engine.
pub fn delay(attempt: u32) -> Duration {
    let exp = BASE.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let cap = exp.min(CAP);
    let jittered_ms = rand::rng().random_range(0..=cap.as_millis().max(1) as u64);
    Duration::from_millis(jittered_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_exceeds_cap() {
        for attempt in 0..10 {
            assert!(delay(attempt) <= CAP);
        }
    }
}
