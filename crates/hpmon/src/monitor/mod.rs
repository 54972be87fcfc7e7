//! Polling monitors over the target's memory.
//!
//! Each monitor owns one background thread that samples on an interval,
//! publishes the latest value for non-blocking queries, and self-heals
//! from read faults by backing off and re-resolving.

mod position;
mod value;

pub use position::{PositionMonitor, PositionPair};
pub use value::ValueMonitor;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

use crate::config::defaults;

/// Which player a monitor or notification pertains to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromRepr,
)]
#[repr(u8)]
pub enum PlayerRole {
    #[strum(serialize = "1P")]
    P1 = 1,
    #[strum(serialize = "2P")]
    P2 = 2,
}

impl PlayerRole {
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::from_repr(value)
    }
}

/// Receives health transitions.
///
/// Invoked synchronously from the detecting monitor's thread, before that
/// monitor takes its next sample; both player monitors may call
/// concurrently. A slow sink delays only its caller's sampling.
pub trait ChangeSink: Send + Sync {
    fn on_health_changed(&self, role: PlayerRole, new_value: i32, old_value: i32);
}

/// Sampling cadence and fault backoff for one poller.
#[derive(Debug, Clone, Copy)]
pub struct PollTiming {
    /// Delay between successful samples.
    pub interval: Duration,
    /// Delay before the next attempt after a read or resolution fault.
    pub fault_backoff: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(defaults::HEALTH_POLL_INTERVAL_MS),
            fault_backoff: Duration::from_millis(defaults::FAULT_BACKOFF_MS),
        }
    }
}

/// Outcome of one poll iteration, deciding the next wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Polled,
    Faulted,
}
