//! SQLITE_BUSY handling for multi-connection deployments.
//!
//! **Busy handler:** SQLite allows only one busy handler per connection.
//! We use a single handler that both counts retries and implements
//! timeout (sleep/backoff); we do *not* set PRAGMA busy_timeout because
//! that would conflict with our custom handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Default max wait for the busy handler (matches typical PRAGMA busy_timeout).
pub(crate) const BUSY_TIMEOUT_MS: u64 = 5000;

/// Process-wide SQLITE_BUSY retry count (rusqlite busy_handler is a
/// function pointer, so we use a static). With several stores open in
/// one process the attribution is ambiguous; treat it as a process
/// contention signal.
pub(crate) static SQLITE_BUSY_COUNT: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Start of current "busy wait" session (per thread) for timeout enforcement.
    static BUSY_SESSION_START: std::cell::RefCell<Option<Instant>> = const { std::cell::RefCell::new(None) };
}

/// Snapshot of the process-wide busy count.
pub fn busy_count() -> u64 {
    SQLITE_BUSY_COUNT.load(Ordering::Relaxed)
}

/// Reset the process-wide busy count (call when starting a measured window).
pub fn reset_busy_count() {
    SQLITE_BUSY_COUNT.store(0, Ordering::Relaxed);
}

/// Busy handler for rusqlite: count retries, sleep with backoff, and
/// respect the timeout. Return true to retry, false to give up (SQLite
/// will then return SQLITE_BUSY to the caller).
pub(crate) fn busy_handler(retries: i32) -> bool {
    SQLITE_BUSY_COUNT.fetch_add(1, Ordering::Relaxed);

    BUSY_SESSION_START.with(|cell| {
        let mut start = cell.borrow_mut();
        // Each new "busy wait" starts with retries == 0; use that to start the session timer.
        if retries == 0 {
            *start = Some(Instant::now());
        }
        let elapsed_ms = start
            .as_ref()
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0);
        if elapsed_ms >= BUSY_TIMEOUT_MS {
            *start = None;
            return false;
        }
        // Backoff: 1, 2, 4, 8, ... ms, capped at 50 ms
        let delay_ms = (1u64 << retries.min(10)).min(50);
        thread::sleep(Duration::from_millis(delay_ms));
        true
    })
}
