use crate::{
    AggregationError,
    Collector,
    Status,
    TelemetryRecord,
};
use parking_lot::Mutex;
use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

/// Where the records go, usually the monitoring server.
pub trait TelemetrySink: Send + Sync + 'static {
    fn send<'a>(
        &'a self,
        record: &'a TelemetryRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransmitError>> + Send + 'a>>;
}

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("request to the monitoring server failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("monitoring server answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("monitoring server did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Created,
    Running,
    Stopped,
}

/// What happened in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Sent { status: Status, measurements: usize },
    AggregationFailed(String),
    TransmitFailed(String),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransmitterState {
    pub phase: Phase,
    pub cycles: u64,
    pub last_outcome: Option<CycleOutcome>,
}

/// Runs the cycles of one collector: every `frequency` it drains the buffer,
/// aggregates the batch and sends the record.
///
/// Cycles of one transmitter never overlap. A failing cycle is logged and the
/// schedule goes on.
#[derive(Debug)]
pub struct Transmitter<C> {
    collector: Arc<C>,
    sink: Arc<dyn TelemetrySink>,
    req_timeout: Duration,
    state: watch::Sender<TransmitterState>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    _cancel_on_drop: DropGuard,
}

impl std::fmt::Debug for dyn TelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TelemetrySink")
    }
}

impl<C: Collector> Transmitter<C> {
    pub fn new(collector: Arc<C>, sink: Arc<dyn TelemetrySink>, req_timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let (state, _) = watch::channel(TransmitterState::default());
        Self {
            collector,
            sink,
            req_timeout,
            state,
            _cancel_on_drop: token.clone().drop_guard(),
            token,
            task: Mutex::default(),
        }
    }

    pub fn collector(&self) -> &Arc<C> {
        &self.collector
    }

    pub fn state(&self) -> TransmitterState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransmitterState> {
        self.state.subscribe()
    }

    /// Spawns the schedule. The first cycle runs one period after the start.
    ///
    /// Does nothing for a disabled collector or when already started.
    pub fn start(&self) {
        if !self.collector.enabled() {
            debug!(collector = self.collector.name(), "Collector disabled, not starting the transmitter");
            return;
        }
        let mut task = self.task.lock();
        if self.state.borrow().phase != Phase::Created {
            debug!(collector = self.collector.name(), "Transmitter already started");
            return;
        }

        let period = self.collector.config().frequency;
        let collector = self.collector.clone();
        let sink = self.sink.clone();
        let req_timeout = self.req_timeout;
        let state = self.state.clone();
        let token = self.token.clone();

        state.send_modify(|state| state.phase = Phase::Running);
        info!(collector = collector.name(), ?period, "Starting transmitter");

        *task = Some(tokio::task::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                // a started cycle is never interrupted by cancellation
                let outcome = run_cycle(collector.as_ref(), sink.as_ref(), req_timeout).await;
                state.send_modify(|state| {
                    state.cycles += 1;
                    state.last_outcome = Some(outcome);
                });
            }
            debug!(collector = collector.name(), "Transmitter task canceled");
        }));
    }

    /// Stops the schedule, waiting for an in-flight cycle to finish.
    ///
    /// Measurements still buffered are not sent.
    pub async fn stop(&self) {
        self.token.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(collector = self.collector.name(), "Transmitter task failed: {err}");
            }
        }
        self.state.send_modify(|state| state.phase = Phase::Stopped);
        let left = self.collector.buffer().len();
        if left > 0 {
            debug!(collector = self.collector.name(), left, "Discarding buffered measurements");
        }
    }
}

/// One drain, aggregate and send.
pub async fn run_cycle<C: Collector + ?Sized>(
    collector: &C,
    sink: &dyn TelemetrySink,
    req_timeout: Duration,
) -> CycleOutcome {
    let name = collector.name();
    let drained = collector.buffer().drain();
    if drained.dropped > 0 {
        warn!(collector = name, dropped = drained.dropped, "Buffer overflowed since the last cycle");
    }
    let measurements = drained.measurements.len();

    let aggregated = std::panic::catch_unwind(AssertUnwindSafe(|| collector.aggregate(drained.measurements)))
        .unwrap_or_else(|panic| Err(AggregationError::Panicked(panic_message(panic))));
    let record = match aggregated {
        Ok(record) => record,
        Err(err) => {
            error!(collector = name, measurements, "Aggregation failed, skipping this cycle: {err}");
            return CycleOutcome::AggregationFailed(err.to_string());
        }
    };

    let sent = match tokio::time::timeout(req_timeout, sink.send(&record)).await {
        Ok(sent) => sent,
        Err(_) => Err(TransmitError::Timeout(req_timeout)),
    };
    match sent {
        Ok(()) => {
            debug!(collector = name, measurements, status = %record.status, "Telemetry sent");
            CycleOutcome::Sent {
                status: record.status,
                measurements,
            }
        }
        Err(err) => {
            error!(collector = name, measurements, "Sending telemetry failed: {err}");
            CycleOutcome::TransmitFailed(err.to_string())
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
