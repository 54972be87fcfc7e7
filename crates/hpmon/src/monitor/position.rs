//! Position monitor: two fixed addresses sampled as one snapshot.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::memory::ReadMemory;
use crate::monitor::{PollTiming, Tick};
use crate::shutdown::StopSignal;

/// The two side indicators, published together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PositionPair {
    /// Side indicator for network matches.
    pub net: i32,
    /// Side indicator for local matches.
    pub local: i32,
}

/// Polls the two position addresses and publishes them as one pair.
///
/// Unlike the health monitors there is no pointer chain and no change
/// notification; the addresses are fixed for the module's lifetime and
/// consumers only ever want the latest snapshot. On a read fault the last
/// published pair is retained until a later sample replaces it.
pub struct PositionMonitor<R> {
    timing: PollTiming,
    pair: Arc<Mutex<PositionPair>>,
    stop: Arc<StopSignal>,
    poller: Option<PositionPoller<R>>,
    thread: Option<JoinHandle<()>>,
}

impl<R: ReadMemory + Send + Sync + 'static> PositionMonitor<R> {
    pub fn new(reader: Arc<R>, net_address: u64, local_address: u64, timing: PollTiming) -> Self {
        let pair = Arc::new(Mutex::new(PositionPair::default()));
        let poller = PositionPoller {
            reader,
            net_address,
            local_address,
            pair: Arc::clone(&pair),
        };
        Self {
            timing,
            pair,
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
        self.thread = Some(thread::spawn(move || {
            let mut delay = Duration::ZERO;
            while !stop.wait(delay) {
                delay = match poller.tick() {
                    Tick::Polled => timing.interval,
                    Tick::Faulted => timing.fault_backoff,
                };
            }
            debug!("position poller exited");
        }));
    }

    /// Signal the poll thread and join it. No-op when not running.
    pub fn stop(&mut self) {
        self.stop.raise();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// Latest published pair; both fields always come from the same tick.
    pub fn positions(&self) -> PositionPair {
        match self.pair.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<R> Drop for PositionMonitor<R> {
    fn drop(&mut self) {
        self.stop.raise();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct PositionPoller<R> {
    reader: Arc<R>,
    net_address: u64,
    local_address: u64,
    pair: Arc<Mutex<PositionPair>>,
}

impl<R: ReadMemory> PositionPoller<R> {
    fn tick(&mut self) -> Tick {
        let sample = self
            .reader
            .read_i32(self.net_address)
            .and_then(|net| Ok((net, self.reader.read_i32(self.local_address)?)));
        match sample {
            Ok((net, local)) => {
                let mut guard = match self.pair.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.net = net;
                guard.local = local;
                Tick::Polled
            }
            Err(e) => {
                warn!(error = %e, "position read failed");
                Tick::Faulted
            }
        }
    }
}
