//! Explicit request-deduplication, replacing the ad-hoc in-flight map the
//! portal client kept. Identical concurrent calls (same action, same actor
//! token, same payload) collapse onto one leader execution whose result is
//! fanned out to every waiter. Entries are cleaned up on completion,
//! success or failure; the TTL only bounds how long a stuck in-flight entry
//! may keep absorbing callers.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;

/// Content fingerprint for a call. Mirrors the portal client's in-flight
/// key: action, session token, and the canonical JSON payload. serde_json
/// maps are key-ordered, so equal payloads always fingerprint equally.
pub fn fingerprint(action: &str, token: Option<&str>, data: &Value) -> String {
    format!(
        "{}|{}|{}",
        action.trim().to_ascii_uppercase(),
        token.unwrap_or_default(),
        data
    )
}

enum SlotState<T> {
    Pending,
    Done(T),
    Abandoned,
}

struct Slot<T> {
    started_at: Instant,
    state: Mutex<SlotState<T>>,
    signal: Condvar,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            state: Mutex::new(SlotState::Pending),
            signal: Condvar::new(),
        }
    }
}

pub struct RequestCoalescer<T> {
    ttl: Duration,
    slots: Mutex<HashMap<String, Arc<Slot<T>>>>,
}

impl<T: Clone> RequestCoalescer<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `op` once per in-flight fingerprint. The first caller for a key
    /// becomes the leader; concurrent callers with the same key block until
    /// the leader finishes and receive a clone of its result. Once the
    /// leader completes, the entry is gone and the next identical call runs
    /// for itself.
    pub fn run<F>(&self, key: &str, op: F) -> T
    where
        F: FnOnce() -> T,
    {
        enum Role<T> {
            Leader(Arc<Slot<T>>),
            Follower(Arc<Slot<T>>),
        }

        let mut op = Some(op);
        loop {
            let role = {
                let mut slots = self.slots.lock().expect("coalescer mutex poisoned");
                match slots.get(key) {
                    Some(slot) if slot.started_at.elapsed() <= self.ttl => {
                        Role::Follower(slot.clone())
                    }
                    _ => {
                        // No entry, or a stuck leader past the TTL: take over.
                        let slot = Arc::new(Slot::new());
                        slots.insert(key.to_string(), slot.clone());
                        Role::Leader(slot)
                    }
                }
            };

            match role {
                Role::Leader(slot) => {
                    let run = op.take().expect("leader executes at most once");
                    return self.lead(key, slot, run);
                }
                Role::Follower(slot) => {
                    if let Some(value) = self.follow(&slot) {
                        return value;
                    }
                    // Leader abandoned or timed out; loop around and take over.
                }
            }
        }
    }

    fn lead<F>(&self, key: &str, slot: Arc<Slot<T>>, op: F) -> T
    where
        F: FnOnce() -> T,
    {
        let guard = LeaderGuard {
            coalescer: self,
            key,
            slot: Some(slot),
            completed: false,
        };
        let value = op();
        guard.finish(&value);
        value
    }

    fn follow(&self, slot: &Arc<Slot<T>>) -> Option<T> {
        let mut state = slot.state.lock().expect("coalescer slot poisoned");
        loop {
            match &*state {
                SlotState::Done(value) => return Some(value.clone()),
                SlotState::Abandoned => return None,
                SlotState::Pending => {
                    let (next, timeout) = slot
                        .signal
                        .wait_timeout(state, self.ttl)
                        .expect("coalescer slot poisoned");
                    state = next;
                    if timeout.timed_out() && matches!(*state, SlotState::Pending) {
                        // The leader is stuck past the TTL; give up waiting.
                        return None;
                    }
                }
            }
        }
    }

    fn settle(&self, key: &str, slot: &Option<Arc<Slot<T>>>, state: SlotState<T>) {
        if let Some(slot) = slot {
            {
                let mut current = slot.state.lock().expect("coalescer slot poisoned");
                *current = state;
            }
            slot.signal.notify_all();
        }

        // Only remove the entry if it is still ours; a stale takeover may
        // have replaced it already.
        if let Some(ours) = slot {
            let mut slots = self.slots.lock().expect("coalescer mutex poisoned");
            if slots.get(key).is_some_and(|current| Arc::ptr_eq(ours, current)) {
                slots.remove(key);
            }
        }
    }

    /// Drop in-flight entries whose leader exceeded the TTL.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        let mut slots = self.slots.lock().expect("coalescer mutex poisoned");
        slots.retain(|_, slot| slot.started_at.elapsed() <= ttl);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.slots.lock().expect("coalescer mutex poisoned").len()
    }
}

struct LeaderGuard<'a, T: Clone> {
    coalescer: &'a RequestCoalescer<T>,
    key: &'a str,
    slot: Option<Arc<Slot<T>>>,
    completed: bool,
}

impl<T: Clone> LeaderGuard<'_, T> {
    fn finish(mut self, value: &T) {
        self.coalescer
            .settle(self.key, &self.slot, SlotState::Done(value.clone()));
        self.completed = true;
    }
}

impl<T: Clone> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        // The leader panicked: wake the waiters so they retry for
        // themselves instead of blocking forever.
        let slot = self.slot.take();
        self.coalescer.settle(self.key, &slot, SlotState::Abandoned);
    }
}
