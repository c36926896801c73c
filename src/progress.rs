//! Step counter and progress signal.
//!
//! # Protocol
//! ```text
//! reset(n)  → steps = n, step = -1
//! advance() → step += 1, emit step / steps
//! abort()   → emit -1 (hide)
//! progress reaches 1 → emit -1 after HIDE_DELAY
//! ```
//!
//! Reporting can be switched off (silent resumes); the arithmetic still runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::events::EventBus;

/// Progress value that tells listeners to hide the indicator.
pub const HIDE: f64 = -1.0;

/// Delay between reaching the final step and the hide signal.
pub const HIDE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct Counters {
    step: i64,
    steps: i64,
}

/// Drives the progress bus from step advances.
#[derive(Debug)]
pub struct StepTracker {
    counters: Mutex<Counters>,
    reporting: AtomicBool,
    progress: Arc<EventBus<f64>>,
}

impl StepTracker {
    pub fn new(progress: Arc<EventBus<f64>>) -> Self {
        Self {
            counters: Mutex::new(Counters { step: -1, steps: 0 }),
            reporting: AtomicBool::new(true),
            progress,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reset(&self, steps: u32) {
        let mut counters = self.lock();
        counters.steps = steps as i64;
        counters.step = -1;
    }

    /// Move to the next step. Returns the new progress value.
    pub fn advance(&self) -> f64 {
        let progress = {
            let mut counters = self.lock();
            counters.step += 1;
            if counters.steps > 0 {
                counters.step as f64 / counters.steps as f64
            } else {
                1.0
            }
        };

        if self.is_reporting() {
            self.progress.emit(&progress);
            if progress >= 1.0 {
                self.schedule_hide();
            }
        }
        progress
    }

    /// Abandon the current operation's progress display.
    pub fn abort(&self) {
        if self.is_reporting() {
            self.progress.emit(&HIDE);
        }
    }

    /// `true` once the final step has been reached.
    pub fn is_complete(&self) -> bool {
        let counters = self.lock();
        counters.steps > 0 && counters.step >= counters.steps
    }

    pub fn step(&self) -> i64 {
        self.lock().step
    }

    pub fn steps(&self) -> i64 {
        self.lock().steps
    }

    pub fn set_reporting(&self, enabled: bool) {
        self.reporting.store(enabled, Ordering::SeqCst);
    }

    pub fn is_reporting(&self) -> bool {
        self.reporting.load(Ordering::SeqCst)
    }

    fn schedule_hide(&self) {
        let progress = self.progress.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(HIDE_DELAY).await;
                    progress.emit(&HIDE);
                });
            }
            Err(_) => progress.emit(&HIDE),
        }
    }
}
