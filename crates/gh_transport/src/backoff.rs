use std::time::Duration;

/// Largest shift applied to the initial delay; keeps `2^n` from overflowing.
const MAX_DOUBLINGS: u32 = 16;

/// Capped exponential delay for retry number `attempt` (zero based), plus
/// additive jitter drawn from `[0, delay * jitter_frac]`.
pub fn exponential_jitter_backoff(
    initial: Duration,
    attempt: u32,
    max: Duration,
    jitter_frac: f32,
) -> Duration {
    let factor = 1u32 << attempt.min(MAX_DOUBLINGS);
    let capped = initial.saturating_mul(factor).min(max);
    capped + jitter(capped, jitter_frac)
}

fn jitter(delay: Duration, jitter_frac: f32) -> Duration {
    let frac = if jitter_frac.is_finite() {
        jitter_frac.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let bound = delay.mul_f32(frac).as_millis() as u64;
    if bound == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(fastrand::u64(0..=bound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let initial = Duration::from_millis(500);
        let max = Duration::from_secs(5);
        assert_eq!(exponential_jitter_backoff(initial, 0, max, 0.0), initial);
        assert_eq!(
            exponential_jitter_backoff(initial, 2, max, 0.0),
            Duration::from_secs(2)
        );
        assert_eq!(exponential_jitter_backoff(initial, 30, max, 0.0), max);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let initial = Duration::from_millis(1000);
        let max = Duration::from_secs(60);
        for _ in 0..200 {
            let delay = exponential_jitter_backoff(initial, 1, max, 0.25);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn nonsense_jitter_is_ignored() {
        let initial = Duration::from_millis(100);
        let max = Duration::from_secs(1);
        let delay = exponential_jitter_backoff(initial, 0, max, f32::NAN);
        assert_eq!(delay, initial);
    }
}
