use std::time::Duration;

use crate::client::config::DEFAULT_IDLE_THRESHOLD_SECS;

/// Inactivity lock. `tick` is driven once per second by the GUI timer,
/// user input calls `activity`. Purely cosmetic: unlocking needs no
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleLock {
    idle_secs: u64,
    threshold_secs: u64,
    locked: bool,
}

impl Default for IdleLock {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_IDLE_THRESHOLD_SECS))
    }
}

impl IdleLock {
    pub fn new(threshold: Duration) -> Self {
        Self {
            idle_secs: 0,
            threshold_secs: threshold.as_secs().max(1),
            locked: false,
        }
    }

    /// One second elapsed. Returns true on the tick that engages the lock.
    pub fn tick(&mut self) -> bool {
        self.idle_secs = self.idle_secs.saturating_add(1);
        if !self.locked && self.idle_secs >= self.threshold_secs {
            self.locked = true;
            log::info!("[IDLE] locked after {}s without input", self.idle_secs);
            return true;
        }
        false
    }

    pub fn activity(&mut self) {
        self.idle_secs = 0;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
        self.idle_secs = 0;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn idle_secs(&self) -> u64 {
        self.idle_secs
    }

    pub fn threshold_secs(&self) -> u64 {
        self.threshold_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_exactly_at_threshold() {
        let mut lock = IdleLock::new(Duration::from_secs(3));
        assert!(!lock.tick());
        assert!(!lock.tick());
        assert!(lock.tick());
        assert!(lock.is_locked());
        // already locked, no second transition
        assert!(!lock.tick());
    }

    #[test]
    fn activity_resets_the_counter() {
        let mut lock = IdleLock::new(Duration::from_secs(2));
        lock.tick();
        lock.activity();
        assert!(!lock.tick());
        assert!(!lock.is_locked());
    }

    #[test]
    fn input_while_locked_keeps_overlay_until_unlock() {
        let mut lock = IdleLock::new(Duration::from_secs(1));
        lock.tick();
        lock.activity();
        assert!(lock.is_locked());
        lock.unlock();
        assert!(!lock.is_locked());
        assert_eq!(lock.idle_secs(), 0);
    }
}
