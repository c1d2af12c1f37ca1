//! Busy gate shared by sends and model switches.
//!
//! One actor at a time holds the gate. Sends never wait: a send that finds
//! the gate taken is refused. Model switches wait for the gate to become
//! idle, woken by the watch channel instead of sampling a flag.

use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Sending,
    SwitchingModel,
}

impl Activity {
    pub fn is_idle(self) -> bool {
        self == Activity::Idle
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Activity::Idle => "idle",
            Activity::Sending => "sending",
            Activity::SwitchingModel => "switching model",
        };
        f.write_str(label)
    }
}

pub struct ActivityGate {
    tx: watch::Sender<Activity>,
}

impl Default for ActivityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Activity::Idle);
        Self { tx }
    }

    pub fn current(&self) -> Activity {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Activity> {
        self.tx.subscribe()
    }

    /// Take the gate if it is idle. The check and the set are one step.
    pub fn try_begin(&self, activity: Activity) -> Option<ActivityGuard<'_>> {
        debug_assert!(!activity.is_idle());
        let acquired = self.tx.send_if_modified(|current| {
            if current.is_idle() {
                *current = activity;
                true
            } else {
                false
            }
        });
        acquired.then(|| ActivityGuard { gate: self })
    }

    /// Wait until the gate is idle, then take it.
    pub async fn begin_when_idle(&self, activity: Activity) -> ActivityGuard<'_> {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(guard) = self.try_begin(activity) {
                return guard;
            }
            // The sender lives in `self`, so the channel cannot close while we wait.
            let _ = rx.wait_for(|current| current.is_idle()).await;
        }
    }

    fn release(&self) {
        self.tx.send_replace(Activity::Idle);
    }
}

/// Holds the gate; dropping it returns the gate to idle.
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct ActivityGuard<'a> {
    gate: &'a ActivityGate,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
