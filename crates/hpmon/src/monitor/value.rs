//! Health monitor: one pointer chain, one polled i32, change detection.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::chain::PointerChain;
use crate::error::Result;
use crate::memory::ReadMemory;
use crate::monitor::{ChangeSink, PlayerRole, PollTiming, Tick};
use crate::shutdown::StopSignal;

/// Published value during fault windows and before the first bind.
const NEUTRAL_VALUE: i32 = 0;

/// Polls one player's health through a pointer chain.
///
/// Resolution is deferred to the poll thread rather than construction so
/// a match restart (which reallocates the player structures) only costs a
/// re-resolution, not the session.
pub struct ValueMonitor<R> {
    role: PlayerRole,
    timing: PollTiming,
    value: Arc<AtomicI32>,
    stop: Arc<StopSignal>,
    poller: Option<ValuePoller<R>>,
    thread: Option<JoinHandle<()>>,
}

impl<R: ReadMemory + Send + Sync + 'static> ValueMonitor<R> {
    pub fn new(
        reader: Arc<R>,
        role: PlayerRole,
        chain: PointerChain,
        timing: PollTiming,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> Self {
        let value = Arc::new(AtomicI32::new(NEUTRAL_VALUE));
        let poller = ValuePoller {
            reader,
            role,
            chain,
            sink,
            value: Arc::clone(&value),
            resolved: 0,
            last: NEUTRAL_VALUE,
        };
        Self {
            role,
            timing,
            value,
            stop: Arc::new(StopSignal::new()),
            poller: Some(poller),
            thread: None,
        }
    }

    /// Launch the poll thread. No-op while already running.
    pub fn start(&mut self) {
        if self.thread.is_some() {
            return;
        }
        let Some(mut poller) = self.poller.take() else {
            return;
        };
        let stop = Arc::clone(&self.stop);
        let timing = self.timing;
        let role = self.role;
        self.thread = Some(thread::spawn(move || {
            let mut delay = Duration::ZERO;
            while !stop.wait(delay) {
                delay = match poller.tick() {
                    Tick::Polled => timing.interval,
                    Tick::Faulted => timing.fault_backoff,
                };
            }
            debug!(%role, "health poller exited");
        }));
    }

    /// Signal the poll thread and join it. No-op when not running.
    pub fn stop(&mut self) {
        self.stop.raise();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    pub fn role(&self) -> PlayerRole {
        self.role
    }

    /// Latest published health; never blocks on a poll in progress.
    pub fn current_value(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }
}

impl<R> Drop for ValueMonitor<R> {
    fn drop(&mut self) {
        self.stop.raise();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The per-thread poll state machine: unresolved (`resolved == 0`) until
/// the chain binds, then sampling until a fault unbinds it again.
struct ValuePoller<R> {
    reader: Arc<R>,
    role: PlayerRole,
    chain: PointerChain,
    sink: Option<Arc<dyn ChangeSink>>,
    value: Arc<AtomicI32>,
    resolved: u64,
    last: i32,
}

impl<R: ReadMemory> ValuePoller<R> {
    fn tick(&mut self) -> Tick {
        if self.resolved == 0 {
            match self.rebind() {
                Ok(()) => Tick::Polled,
                Err(e) => {
                    debug!(role = %self.role, error = %e, "health address not resolvable yet");
                    self.invalidate();
                    Tick::Faulted
                }
            }
        } else {
            match self.reader.read_i32(self.resolved) {
                Ok(value) => {
                    self.observe(value);
                    Tick::Polled
                }
                Err(e) => {
                    warn!(role = %self.role, error = %e, "health read failed, rebinding");
                    self.invalidate();
                    Tick::Faulted
                }
            }
        }
    }

    /// Resolve the chain and seed the baseline. The seed read is not a
    /// change, so no notification fires for it.
    fn rebind(&mut self) -> Result<()> {
        let address = self.chain.resolve(self.reader.as_ref())?;
        let seed = self.reader.read_i32(address)?;
        self.resolved = address;
        self.last = seed;
        self.value.store(seed, Ordering::SeqCst);
        debug!(role = %self.role, seed, "health address bound at {address:#x}");
        Ok(())
    }

    fn observe(&mut self, value: i32) {
        if value != self.last {
            // Notify before publishing, in this thread.
            if let Some(sink) = &self.sink {
                sink.on_health_changed(self.role, value, self.last);
            }
            self.value.store(value, Ordering::SeqCst);
        }
        self.last = value;
    }

    /// Forget the resolved address and publish the neutral value so
    /// queriers see "not in session" until the next successful bind.
    fn invalidate(&mut self) {
        self.resolved = 0;
        self.last = NEUTRAL_VALUE;
        self.value.store(NEUTRAL_VALUE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MockMemoryBuilder, MockMemoryReader};
    use std::sync::Mutex;

    const ANCHOR: u64 = 0x1000;
    const HEALTH: u64 = 0x2000 + 0x40;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(PlayerRole, i32, i32)>>,
    }

    impl ChangeSink for RecordingSink {
        fn on_health_changed(&self, role: PlayerRole, new_value: i32, old_value: i32) {
            self.events.lock().unwrap().push((role, new_value, old_value));
        }
    }

    fn chained_mock(health: i32) -> MockMemoryReader {
        MockMemoryBuilder::new()
            .u64(ANCHOR, 0x2000)
            .i32(HEALTH, health)
            .build()
    }

    fn poller(
        reader: Arc<MockMemoryReader>,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> ValuePoller<MockMemoryReader> {
        ValuePoller {
            reader,
            role: PlayerRole::P1,
            chain: PointerChain::new(ANCHOR).offset(0x40),
            sink,
            value: Arc::new(AtomicI32::new(NEUTRAL_VALUE)),
            resolved: 0,
            last: NEUTRAL_VALUE,
        }
    }

    #[test]
    fn test_seed_is_not_a_change() {
        let reader = Arc::new(chained_mock(100));
        let sink = Arc::new(RecordingSink::default());
        let mut poller = poller(Arc::clone(&reader), Some(sink.clone() as Arc<dyn ChangeSink>));

        assert_eq!(poller.tick(), Tick::Polled);
        assert!(sink.events.lock().unwrap().is_empty());
        assert_eq!(poller.value.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_change_fault_recovery_sequence() {
        // Raw value sequence [100, 100, 80, 80, fault, 100]: exactly one
        // notification (100 -> 80) and a silent re-seed after recovery.
        let reader = Arc::new(chained_mock(100));
        let sink = Arc::new(RecordingSink::default());
        let mut poller = poller(Arc::clone(&reader), Some(sink.clone() as Arc<dyn ChangeSink>));

        assert_eq!(poller.tick(), Tick::Polled); // seed 100
        assert_eq!(poller.tick(), Tick::Polled); // 100, no change

        reader.write_i32(HEALTH, 80);
        assert_eq!(poller.tick(), Tick::Polled); // 100 -> 80 fires
        assert_eq!(poller.tick(), Tick::Polled); // 80, no change

        reader.set_offline(true);
        assert_eq!(poller.tick(), Tick::Faulted);
        // During the fault window the published value is neutral.
        assert_eq!(poller.value.load(Ordering::SeqCst), 0);

        reader.set_offline(false);
        reader.write_i32(HEALTH, 100);
        assert_eq!(poller.tick(), Tick::Polled); // re-resolve + silent seed
        assert_eq!(poller.value.load(Ordering::SeqCst), 100);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.as_slice(), &[(PlayerRole::P1, 80, 100)]);
    }

    #[test]
    fn test_fault_during_seed_stays_unresolved() {
        let reader = Arc::new(
            MockMemoryBuilder::new()
                .u64(ANCHOR, 0x2000)
                // Health address left unmapped: resolution succeeds, the
                // seed read does not.
                .build(),
        );
        let mut poller = poller(Arc::clone(&reader), None);

        assert_eq!(poller.tick(), Tick::Faulted);
        assert_eq!(poller.resolved, 0);

        reader.write_i32(HEALTH, 55);
        assert_eq!(poller.tick(), Tick::Polled);
        assert_eq!(poller.value.load(Ordering::SeqCst), 55);
    }

    #[test]
    fn test_null_chain_backs_off() {
        let reader = Arc::new(MockMemoryBuilder::new().u64(ANCHOR, 0).build());
        let mut poller = poller(Arc::clone(&reader), None);

        assert_eq!(poller.tick(), Tick::Faulted);
        assert_eq!(poller.value.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_monitor_start_is_idempotent_and_stop_joins() {
        let reader = Arc::new(chained_mock(100));
        let mut monitor = ValueMonitor::new(
            reader,
            PlayerRole::P2,
            PointerChain::new(ANCHOR).offset(0x40),
            PollTiming {
                interval: Duration::from_millis(1),
                fault_backoff: Duration::from_millis(1),
            },
            None,
        );

        monitor.start();
        monitor.start(); // second call must not spawn another thread
        assert!(monitor.thread.is_some());
        assert!(monitor.poller.is_none());

        // Let the poller seed the value.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while monitor.current_value() != 100 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(monitor.current_value(), 100);

        monitor.stop();
        assert!(monitor.thread.is_none());
        monitor.stop(); // idempotent
    }

    #[test]
    fn test_query_before_start_is_neutral() {
        let reader = Arc::new(chained_mock(100));
        let monitor = ValueMonitor::new(
            reader,
            PlayerRole::P1,
            PointerChain::new(ANCHOR).offset(0x40),
            PollTiming::default(),
            None,
        );
        assert_eq!(monitor.current_value(), 0);
    }
}
