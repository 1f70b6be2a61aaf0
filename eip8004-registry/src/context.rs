//! Per-call execution context

use chrono::Utc;
use ethers::types::Address;

/// Authenticated caller and host clock of one registry call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub sender: Address,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(sender: Address, timestamp: u64) -> Self {
        Self { sender, timestamp }
    }

    /// Context stamped with the current wall-clock time
    pub fn now(sender: Address) -> Self {
        Self {
            sender,
            timestamp: Utc::now().timestamp().max(0) as u64,
        }
    }
}
