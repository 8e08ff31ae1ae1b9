//! A small manual-reset event, the Rust analogue of Python's `threading.Event`.
//!
//! The installer uses two of these: one signaled whenever the worker
//! finishes a job (`wait_for_job` polls it), and one signaled whenever the
//! download cache changes (`wait_for_installs` polls it). Built on
//! `Condvar` rather than a channel because many waiters may want to observe
//! the same signal without consuming it.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A boolean flag with condvar-backed `set`/`wait`/`clear`.
#[derive(Default)]
pub struct ManualResetEvent {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl ManualResetEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    pub fn set(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.condvar.notify_all();
    }

    /// Clear the flag without waking anyone.
    pub fn clear(&self) {
        *self.flag.lock().unwrap() = false;
    }

    /// Block until the flag is set or `timeout` elapses. Returns whether the
    /// flag was observed set. Mirrors `threading.Event.wait(timeout)`.
    pub fn wait(&self, timeout: Duration) -> bool {
        let flag = self.flag.lock().unwrap();
        if *flag {
            return true;
        }
        let (flag, result) = self
            .condvar
            .wait_timeout(flag, timeout)
            .unwrap();
        *flag || !result.timed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_times_out_when_never_set() {
        let event = ManualResetEvent::new();
        assert!(!event.wait(Duration::from_millis(20)));
    }

    #[test]
    fn wait_returns_true_once_set() {
        let event = ManualResetEvent::new();
        event.set();
        assert!(event.wait(Duration::from_millis(20)));
    }

    #[test]
    fn set_wakes_a_blocked_waiter() {
        let event = Arc::new(ManualResetEvent::new());
        let waiter = Arc::clone(&event);
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        event.set();
        assert!(handle.join().unwrap());
    }
}
