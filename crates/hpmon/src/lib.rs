//! # hpmon
//!
//! Live health and position monitoring for GUILTY GEAR -STRIVE- by
//! reading the game process's memory from the outside.
//!
//! This crate provides:
//! - Remote process attachment and typed memory reads
//! - Pointer chain resolution from module-relative anchors
//! - Per-player polling monitors with change notification
//! - A controller and process-wide session tying the pollers together
//!
//! The monitors never treat a failed read as fatal: a loading screen or
//! match restart invalidates the resolved addresses, the affected monitor
//! publishes a neutral value, backs off, and re-resolves once the game's
//! structures exist again.

pub mod chain;
pub mod config;
pub mod controller;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod session;
pub mod shutdown;

pub use chain::PointerChain;
pub use config::{ChainSpec, MonitorConfig};
pub use controller::MonitorController;
pub use error::{Error, Result};
pub use memory::{AccessMode, MemoryReader, ProcessHandle, ReadMemory};
pub use monitor::{
    ChangeSink, PlayerRole, PollTiming, PositionMonitor, PositionPair, ValueMonitor,
};
pub use shutdown::StopSignal;
