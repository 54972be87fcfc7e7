//! Monitoring session configuration.
//!
//! Everything the controller needs to attach and poll: target process and
//! module names, per-player pointer chains, the two position addresses,
//! and timing. All addresses are module-relative; the controller rebases
//! them once the module load address is known.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Built-in layout for GUILTY GEAR -STRIVE-.
///
/// These are the offsets the monitor ships with; a config file overrides
/// them when the game updates.
pub mod defaults {
    pub const PROCESS_NAME: &str = "GGST-Win64-Shipping.exe";
    pub const MODULE_NAME: &str = "GGST-Win64-Shipping.exe";

    /// Module-relative anchor of the player array pointer.
    pub const HEALTH_BASE: u64 = 0x051B_4158;
    /// Chain from the anchor to player 1's health field.
    pub const P1_HEALTH_OFFSETS: [u64; 3] = [0x1C0, 0x28, 0x1220];
    /// Chain from the anchor to player 2's health field.
    pub const P2_HEALTH_OFFSETS: [u64; 3] = [0x1C0, 0x1A0, 0x1220];

    /// Module-relative address of the network-match side indicator.
    pub const NET_POSITION: u64 = 0x4D3_83F4;
    /// Module-relative address of the local-match side indicator.
    pub const LOCAL_POSITION: u64 = 0x454_1FCC;

    /// Interval between health samples (ms).
    pub const HEALTH_POLL_INTERVAL_MS: u64 = 100;
    /// Interval between position samples (ms).
    pub const POSITION_POLL_INTERVAL_MS: u64 = 500;
    /// Delay before retrying after a failed read or resolution (ms).
    pub const FAULT_BACKOFF_MS: u64 = 1000;
}

/// One player's pointer chain: a module-relative anchor plus the offsets
/// walked from it. Traversal order is the insertion order.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSpec {
    pub base_offset: u64,
    pub offsets: Vec<u64>,
}

/// Full configuration for one monitoring session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub process_name: String,
    pub module_name: String,
    pub player1: ChainSpec,
    pub player2: ChainSpec,
    /// Module-relative address of the network-match side indicator.
    pub net_position_offset: u64,
    /// Module-relative address of the local-match side indicator.
    pub local_position_offset: u64,
    pub health_poll_interval_ms: u64,
    pub position_poll_interval_ms: u64,
    pub fault_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            process_name: defaults::PROCESS_NAME.to_string(),
            module_name: defaults::MODULE_NAME.to_string(),
            player1: ChainSpec {
                base_offset: defaults::HEALTH_BASE,
                offsets: defaults::P1_HEALTH_OFFSETS.to_vec(),
            },
            player2: ChainSpec {
                base_offset: defaults::HEALTH_BASE,
                offsets: defaults::P2_HEALTH_OFFSETS.to_vec(),
            },
            net_position_offset: defaults::NET_POSITION,
            local_position_offset: defaults::LOCAL_POSITION,
            health_poll_interval_ms: defaults::HEALTH_POLL_INTERVAL_MS,
            position_poll_interval_ms: defaults::POSITION_POLL_INTERVAL_MS,
            fault_backoff_ms: defaults::FAULT_BACKOFF_MS,
        }
    }
}

impl MonitorConfig {
    /// Reject configurations that cannot possibly attach.
    pub fn validate(&self) -> Result<()> {
        if self.process_name.is_empty() {
            return Err(Error::ProcessNotFound("(empty process name)".to_string()));
        }
        if self.module_name.is_empty() {
            return Err(Error::ModuleNotFound("(empty module name)".to_string()));
        }
        Ok(())
    }
}
