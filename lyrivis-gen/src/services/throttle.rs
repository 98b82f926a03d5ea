//! Rate throttle for the external image generator
//!
//! Only genuinely new phrases ever reach the generator, so the throttle
//! is keyed to the discovery ordinal within a job: the n-th newly
//! discovered uncached phrase (0-based, distinct phrases only) waits
//! `floor(n / phrases_per_interval) * interval` before its request.
//! Cached and already-pending phrases incur no delay.

use std::time::Duration;

/// Delay to apply before the generation request for the `ordinal`-th new
/// phrase of a job
pub fn throttle_delay(ordinal: usize, phrases_per_interval: usize, interval: Duration) -> Duration {
    let per_interval = phrases_per_interval.max(1);
    interval * (ordinal / per_interval) as u32
}
