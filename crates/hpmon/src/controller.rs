//! Aggregates the three pollers behind one lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::chain::PointerChain;
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::memory::{AccessMode, MemoryReader, ProcessHandle, ReadMemory};
use crate::monitor::{
    ChangeSink, PlayerRole, PollTiming, PositionMonitor, PositionPair, ValueMonitor,
};

/// Owns the process attachment and the three monitors.
///
/// Construction performs discovery once; each health monitor resolves its
/// own chain lazily on its poll thread. `start`/`stop` are idempotent and
/// `stop` joins every poller before returning, so no poller thread ever
/// outlives the controller.
pub struct MonitorController<R> {
    player1: ValueMonitor<R>,
    player2: ValueMonitor<R>,
    positions: PositionMonitor<R>,
    running: bool,
}

impl MonitorController<MemoryReader> {
    /// Find the target process, attach read-only, and build all monitors.
    ///
    /// A missing process or module is fatal here; nothing after
    /// construction is.
    pub fn connect(config: &MonitorConfig, sink: Option<Arc<dyn ChangeSink>>) -> Result<Self> {
        config.validate()?;
        let process = ProcessHandle::find_and_open(
            &config.process_name,
            &config.module_name,
            AccessMode::Read,
        )?;
        info!(
            pid = process.pid,
            "attached to {} at {:#x}",
            config.process_name, process.base_address
        );
        let module_base = process.base_address;
        let reader = Arc::new(MemoryReader::new(Arc::new(process)));
        Ok(Self::with_reader(reader, module_base, config, sink))
    }
}

impl<R: ReadMemory + Send + Sync + 'static> MonitorController<R> {
    /// Build the monitors over an existing reader. Tests drive this with
    /// the mock reader; `connect` uses it with the real one.
    pub fn with_reader(
        reader: Arc<R>,
        module_base: u64,
        config: &MonitorConfig,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> Self {
        let health_timing = PollTiming {
            interval: Duration::from_millis(config.health_poll_interval_ms),
            fault_backoff: Duration::from_millis(config.fault_backoff_ms),
        };
        let position_timing = PollTiming {
            interval: Duration::from_millis(config.position_poll_interval_ms),
            fault_backoff: Duration::from_millis(config.fault_backoff_ms),
        };

        let player1 = ValueMonitor::new(
            Arc::clone(&reader),
            PlayerRole::P1,
            PointerChain::new(module_base.wrapping_add(config.player1.base_offset))
                .offsets(&config.player1.offsets),
            health_timing,
            sink.clone(),
        );
        let player2 = ValueMonitor::new(
            Arc::clone(&reader),
            PlayerRole::P2,
            PointerChain::new(module_base.wrapping_add(config.player2.base_offset))
                .offsets(&config.player2.offsets),
            health_timing,
            sink,
        );
        let positions = PositionMonitor::new(
            reader,
            module_base.wrapping_add(config.net_position_offset),
            module_base.wrapping_add(config.local_position_offset),
            position_timing,
        );

        Self {
            player1,
            player2,
            positions,
            running: false,
        }
    }

    /// Launch all pollers. Repeated calls while running are no-ops.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.player1.start();
        self.player2.start();
        self.positions.start();
        info!("monitoring started");
    }

    /// Signal all pollers and join them. Idempotent.
    pub fn stop(&mut self) {
        let was_running = self.running;
        self.running = false;
        self.player1.stop();
        self.player2.stop();
        self.positions.stop();
        if was_running {
            info!("monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Latest health for one player; neutral default before the first
    /// successful sample and during fault windows.
    pub fn health(&self, role: PlayerRole) -> i32 {
        match role {
            PlayerRole::P1 => self.player1.current_value(),
            PlayerRole::P2 => self.player2.current_value(),
        }
    }

    /// Latest position snapshot.
    pub fn positions(&self) -> PositionPair {
        self.positions.positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainSpec;
    use crate::memory::{MockMemoryBuilder, MockMemoryReader};
    use crate::monitor::ChangeSink;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    const MODULE_BASE: u64 = 0x1_0000;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            player1: ChainSpec {
                base_offset: 0x100,
                offsets: vec![0x10],
            },
            player2: ChainSpec {
                base_offset: 0x200,
                offsets: vec![0x10],
            },
            net_position_offset: 0x300,
            local_position_offset: 0x304,
            health_poll_interval_ms: 1,
            position_poll_interval_ms: 1,
            fault_backoff_ms: 1,
            ..MonitorConfig::default()
        }
    }

    fn seeded_mock() -> MockMemoryReader {
        MockMemoryBuilder::new()
            // Player 1 chain: *(base + 0x100) + 0x10 -> 420
            .u64(MODULE_BASE + 0x100, 0x2000)
            .i32(0x2010, 420)
            // Player 2 chain: *(base + 0x200) + 0x10 -> 400
            .u64(MODULE_BASE + 0x200, 0x3000)
            .i32(0x3010, 400)
            // Positions
            .i32(MODULE_BASE + 0x300, 1)
            .i32(MODULE_BASE + 0x304, 2)
            .build()
    }

    fn wait_until(mut ready: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !ready() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(PlayerRole, i32, i32)>>,
    }

    impl ChangeSink for RecordingSink {
        fn on_health_changed(&self, role: PlayerRole, new_value: i32, old_value: i32) {
            self.events.lock().unwrap().push((role, new_value, old_value));
        }
    }

    #[test]
    fn test_queries_before_start_are_neutral() {
        let controller = MonitorController::with_reader(
            Arc::new(seeded_mock()),
            MODULE_BASE,
            &test_config(),
            None,
        );
        assert_eq!(controller.health(PlayerRole::P1), 0);
        assert_eq!(controller.health(PlayerRole::P2), 0);
        assert_eq!(controller.positions(), PositionPair::default());
        assert!(!controller.is_running());
    }

    #[test]
    fn test_start_polls_all_three_monitors() {
        let mut controller = MonitorController::with_reader(
            Arc::new(seeded_mock()),
            MODULE_BASE,
            &test_config(),
            None,
        );
        controller.start();
        assert!(controller.is_running());

        wait_until(|| {
            controller.health(PlayerRole::P1) == 420
                && controller.health(PlayerRole::P2) == 400
                && controller.positions() == PositionPair { net: 1, local: 2 }
        });
        assert_eq!(controller.health(PlayerRole::P1), 420);
        assert_eq!(controller.health(PlayerRole::P2), 400);
        assert_eq!(controller.positions(), PositionPair { net: 1, local: 2 });

        controller.stop();
        assert!(!controller.is_running());
    }

    #[test]
    fn test_start_twice_then_stop_joins_cleanly() {
        let mut controller = MonitorController::with_reader(
            Arc::new(seeded_mock()),
            MODULE_BASE,
            &test_config(),
            None,
        );
        controller.start();
        controller.start();
        wait_until(|| controller.health(PlayerRole::P1) == 420);

        controller.stop();
        controller.stop();

        // Published values survive the stop; no thread is left to change
        // them afterwards.
        let after = controller.health(PlayerRole::P1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(controller.health(PlayerRole::P1), after);
    }

    #[test]
    fn test_change_notifications_reach_the_sink() {
        let reader = Arc::new(seeded_mock());
        let sink = Arc::new(RecordingSink::default());
        let mut controller = MonitorController::with_reader(
            Arc::clone(&reader),
            MODULE_BASE,
            &test_config(),
            Some(sink.clone() as Arc<dyn ChangeSink>),
        );
        controller.start();
        wait_until(|| controller.health(PlayerRole::P1) == 420);

        reader.write_i32(0x2010, 390);
        wait_until(|| controller.health(PlayerRole::P1) == 390);
        controller.stop();

        let events = sink.events.lock().unwrap();
        assert!(events.contains(&(PlayerRole::P1, 390, 420)));
        // Player 2 never changed, so it never notified.
        assert!(events.iter().all(|(role, _, _)| *role == PlayerRole::P1));
    }

    #[test]
    fn test_health_self_heals_after_relocation() {
        let reader = Arc::new(seeded_mock());
        let mut controller = MonitorController::with_reader(
            Arc::clone(&reader),
            MODULE_BASE,
            &test_config(),
            None,
        );
        controller.start();
        wait_until(|| controller.health(PlayerRole::P1) == 420);

        // Simulate a match restart: the old player struct goes away and
        // the anchor points at a new allocation.
        reader.unmap(0x2010, 4);
        wait_until(|| controller.health(PlayerRole::P1) == 0);
        assert_eq!(controller.health(PlayerRole::P1), 0);

        reader.write_u64(MODULE_BASE + 0x100, 0x8000);
        reader.write_i32(0x8010, 420);
        wait_until(|| controller.health(PlayerRole::P1) == 420);
        assert_eq!(controller.health(PlayerRole::P1), 420);

        controller.stop();
    }
}
