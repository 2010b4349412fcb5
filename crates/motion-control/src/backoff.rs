//! Retry backoff policy for the gesture loop.

use std::time::Duration;

/// Delay before the first retry.
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Ceiling for the exponential growth.
pub const MAX_DELAY: Duration = Duration::from_secs(8);

/// Delay to apply after `consecutive_failures` failed attempts.
///
/// `base * 2^(failures - 1)`, capped at [`MAX_DELAY`]. Zero failures means no
/// backoff is needed.
pub fn delay_for_attempt(consecutive_failures: u32) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }
    let exponent = (consecutive_failures - 1).min(10);
    let factor = 2u32.saturating_pow(exponent);
    BASE_DELAY.saturating_mul(factor).min(MAX_DELAY)
}
