//! Per-identity cooldown gate for attendance events.

use crate::types::Identity;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

/// Suppresses repeat events for an identity inside the cooldown window.
///
/// The window is measured from the last *accepted* event; rejected attempts
/// never move it. State lives only as long as the gate, so a restarted
/// process starts with every identity open.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_accepted: HashMap<Identity, Instant>,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check and, on success, record `now` for `identity`.
    pub fn allow(&mut self, identity: &Identity, now: Instant) -> bool {
        if !self.is_open(identity, now) {
            return false;
        }
        self.record(identity, now);
        true
    }

    /// Whether an event for `identity` would be accepted at `now`. Read-only.
    pub fn is_open(&self, identity: &Identity, now: Instant) -> bool {
        match self.last_accepted.get(identity) {
            None => true,
            Some(&last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    /// Mark an event for `identity` as accepted at `now`.
    pub fn record(&mut self, identity: &Identity, now: Instant) {
        self.last_accepted.insert(identity.clone(), now);
    }

    /// Time left before `identity` is accepted again, if it is currently closed.
    pub fn remaining(&self, identity: &Identity, now: Instant) -> Option<Duration> {
        let last = *self.last_accepted.get(identity)?;
        self.cooldown
            .checked_sub(now.saturating_duration_since(last))
            .filter(|d| !d.is_zero())
    }
}
