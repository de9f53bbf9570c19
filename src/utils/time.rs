//! Wall-clock access for the statistics and the shapers. All engine
//! timestamps are unix milliseconds; the shapers additionally work in
//! nanoseconds for queueing precision.

use std::sync::atomic::{AtomicU64, Ordering};
use time::{macros::format_description, OffsetDateTime};

pub const NANOS_PER_MILLI: u64 = 1_000_000;

// 0 means the ticker is not running and the OS clock is read directly
static CACHED_NOW_MS: AtomicU64 = AtomicU64::new(0);

#[inline]
fn wall_clock_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / NANOS_PER_MILLI as i128) as u64
}

/// Current unix time in milliseconds, served from the cache when the
/// ticker is running.
pub fn curr_time_millis() -> u64 {
    match CACHED_NOW_MS.load(Ordering::Relaxed) {
        0 => wall_clock_millis(),
        cached => cached,
    }
}

#[inline]
pub fn curr_time_nanos() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos()
}

#[inline]
pub fn milli2nano(ms: u64) -> u64 {
    ms * NANOS_PER_MILLI
}

#[inline]
pub fn sleep_for_ms(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

#[inline]
pub fn sleep_for_ns(ns: u64) {
    std::thread::sleep(std::time::Duration::from_nanos(ns));
}

/// Keeps a cached timestamp fresh at millisecond granularity, sparing the
/// hot path one clock read per statistics update under high concurrency.
pub fn start_time_ticker() {
    CACHED_NOW_MS.store(wall_clock_millis(), Ordering::SeqCst);
    std::thread::spawn(|| loop {
        CACHED_NOW_MS.store(wall_clock_millis(), Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(1));
    });
}

/// Timestamp string with nanosecond precision; the entry builder uses it
/// as the fallback resource name.
pub fn format_time_nanos_curr() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:9]"
        ))
        .unwrap()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn milli_nano_conversion() {
        assert_eq!(milli2nano(0), 0);
        assert_eq!(milli2nano(3), 3_000_000);
    }

    #[test]
    fn clocks_agree() {
        let ms = curr_time_millis();
        let ns = curr_time_nanos();
        let diff = ns / NANOS_PER_MILLI as i128 - ms as i128;
        assert!(diff.abs() < 100, "clock drift {} ms", diff);
    }

    #[test]
    fn monotonic_enough() {
        let t1 = curr_time_millis();
        sleep_for_ms(5);
        let t2 = curr_time_millis();
        assert!(t2 >= t1 + 4);
    }
}
