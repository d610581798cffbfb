//! Engine clock.
//!
//! Deadlines are judged against server time. A manual clock can be
//! advanced over RPC for local testing of timeouts.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use auction_module::CallContext;

#[derive(Debug)]
pub enum Clock {
    System,
    Manual(RwLock<u64>),
}

impl Clock {
    pub fn manual(start: u64) -> Self {
        Clock::Manual(RwLock::new(start))
    }

    pub fn now(&self) -> u64 {
        match self {
            Clock::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            Clock::Manual(ts) => *ts.read(),
        }
    }

    pub fn context(&self) -> CallContext {
        CallContext::at(self.now())
    }

    /// Set the manual clock. Returns false on a system clock.
    pub fn set(&self, timestamp: u64) -> bool {
        match self {
            Clock::System => false,
            Clock::Manual(ts) => {
                *ts.write() = timestamp;
                true
            }
        }
    }

    /// Advance the manual clock, returning the new time.
    pub fn advance(&self, secs: u64) -> Option<u64> {
        match self {
            Clock::System => None,
            Clock::Manual(ts) => {
                let mut ts = ts.write();
                *ts = ts.saturating_add(secs);
                Some(*ts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = Clock::manual(1_000);
        assert_eq!(clock.now(), 1_000);
        assert_eq!(clock.advance(30), Some(1_030));
        assert!(clock.set(5));
        assert_eq!(clock.context().timestamp, 5);
    }

    #[test]
    fn test_system_clock_is_fixed() {
        let clock = Clock::System;
        assert!(!clock.set(5));
        assert_eq!(clock.advance(5), None);
        assert!(clock.now() > 1_600_000_000);
    }
}
