//! Tick driver: runs the controller at the cadence of an external trigger.
//!
//! The core never owns a scheduler. A [`TickTrigger`] yields timestamps;
//! the driver runs one synchronous tick per timestamp and publishes each
//! reading on a tokio broadcast channel. At most one tick is in flight:
//! the next trigger is only awaited after the previous tick returned.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use super::controller::{MeterReading, SessionController};
use crate::audio::SampleSource;
use crate::error::AudioError;

/// Readings buffered per subscriber before it lags
const READING_CHANNEL_CAPACITY: usize = 256;

/// Source of tick timestamps (milliseconds)
///
/// Returning `None` ends the driver loop.
pub trait TickTrigger {
    fn next_tick(&mut self) -> impl Future<Output = Option<u64>>;
}

/// Fixed-rate trigger on a tokio interval
///
/// A slow tick delays the next one; missed ticks are never queued.
pub struct IntervalTrigger {
    interval: Interval,
    started: Instant,
    remaining: Option<u64>,
}

impl IntervalTrigger {
    pub fn new(tick_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(tick_hz.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            started: Instant::now(),
            remaining: None,
        }
    }

    /// Stop after `ticks` triggers
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.remaining = Some(ticks);
        self
    }
}

impl TickTrigger for IntervalTrigger {
    async fn next_tick(&mut self) -> Option<u64> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        let at = self.interval.tick().await;
        Some(at.duration_since(self.started).as_millis() as u64)
    }
}

/// Trigger fed by hand through a channel
///
/// Dropping every [`ManualTicker`] ends the driver loop.
pub struct ManualTrigger {
    rx: mpsc::UnboundedReceiver<u64>,
}

#[derive(Debug, Clone)]
pub struct ManualTicker {
    tx: mpsc::UnboundedSender<u64>,
}

impl ManualTicker {
    /// Queue a tick at `now_ms`; returns false once the driver is gone
    pub fn tick(&self, now_ms: u64) -> bool {
        self.tx.send(now_ms).is_ok()
    }
}

impl ManualTrigger {
    pub fn new() -> (Self, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTicker { tx })
    }
}

impl TickTrigger for ManualTrigger {
    async fn next_tick(&mut self) -> Option<u64> {
        self.rx.recv().await
    }
}

/// Cloneable request to stop a running driver
///
/// Observed between ticks; a tick already in progress completes and its
/// reading is still published. A request ends exactly one run: it is
/// cleared when [`MeterDriver::run`] returns, so the driver can be run
/// again.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    fn clear(&self) {
        self.tx.send_replace(false);
    }
}

/// Why [`MeterDriver::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// The stop handle was triggered, or the controller left Recording
    Stopped,
    /// The trigger yielded `None`
    TriggerEnded,
    /// A finite source ran out of frames
    SourceExhausted,
}

pub struct MeterDriver {
    readings: broadcast::Sender<MeterReading>,
    stop: StopHandle,
}

impl MeterDriver {
    pub fn new() -> Self {
        let (readings, _) = broadcast::channel(READING_CHANNEL_CAPACITY);
        Self {
            readings,
            stop: StopHandle::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeterReading> {
        self.readings.subscribe()
    }

    /// Readings as a stream; lagged gaps are skipped
    pub fn reading_stream(&self) -> impl Stream<Item = MeterReading> + Send + 'static {
        BroadcastStream::new(self.readings.subscribe()).filter_map(|result| result.ok())
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Start the controller if needed and tick it until told to stop
    ///
    /// The controller is stopped (source released) on every exit path.
    ///
    /// # Errors
    /// Acquisition failures from `start`, and any tick error other than
    /// `AudioError::SourceExhausted`.
    pub async fn run<S, T>(
        &self,
        controller: &mut SessionController<S>,
        trigger: &mut T,
    ) -> Result<DriverExit, AudioError>
    where
        S: SampleSource,
        T: TickTrigger,
    {
        if !controller.is_recording() {
            controller.start()?;
        }

        let mut stop_rx = self.stop.subscribe();
        let outcome = loop {
            if *stop_rx.borrow_and_update() {
                break Ok(DriverExit::Stopped);
            }

            let next = tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break Ok(DriverExit::Stopped);
                    }
                    continue;
                }
                next = trigger.next_tick() => next,
            };
            let Some(now_ms) = next else {
                break Ok(DriverExit::TriggerEnded);
            };

            match controller.tick(now_ms) {
                Ok(Some(reading)) => {
                    // No subscribers is fine
                    let _ = self.readings.send(reading);
                }
                Ok(None) => break Ok(DriverExit::Stopped),
                Err(AudioError::SourceExhausted) => break Ok(DriverExit::SourceExhausted),
                Err(err) => break Err(err),
            }
        };

        controller.stop();
        self.stop.clear();
        tracing::info!(?outcome, "tick driver exited");
        outcome
    }
}

impl Default for MeterDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ScriptedSource;
    use crate::config::MeterConfig;
    use crate::storage::MemoryStore;

    fn controller(levels: &[f32]) -> SessionController<ScriptedSource> {
        SessionController::new(
            ScriptedSource::from_levels(levels, 32),
            Arc::new(MemoryStore::new()),
            &MeterConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_trigger_end_stops_controller() {
        let mut controller = controller(&[0.5, 0.5]);
        let driver = MeterDriver::new();
        let mut readings = driver.subscribe();
        let (mut trigger, ticker) = ManualTrigger::new();

        ticker.tick(10);
        ticker.tick(20);
        drop(ticker);

        let exit = driver.run(&mut controller, &mut trigger).await;
        assert_eq!(exit, Ok(DriverExit::TriggerEnded));
        assert_eq!(readings.recv().await.unwrap().timestamp_ms, 10);
        assert_eq!(readings.recv().await.unwrap().timestamp_ms, 20);
        assert!(!controller.is_recording());
        assert!(!controller.source().probe().is_acquired());
    }

    #[tokio::test]
    async fn test_exhausted_source_ends_run() {
        let mut controller = controller(&[0.5]);
        let driver = MeterDriver::new();
        let (mut trigger, ticker) = ManualTrigger::new();
        for t in 0..5 {
            ticker.tick(t);
        }

        let exit = driver.run(&mut controller, &mut trigger).await;
        assert_eq!(exit, Ok(DriverExit::SourceExhausted));
        assert_eq!(controller.source().probe().release_calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let mut controller = controller(&[0.5]);
        let driver = MeterDriver::new();
        driver.stop_handle().stop();
        let (mut trigger, _ticker) = ManualTrigger::new();

        let exit = driver.run(&mut controller, &mut trigger).await;
        assert_eq!(exit, Ok(DriverExit::Stopped));
        assert_eq!(controller.source().probe().reads(), 0);
        assert!(!controller.is_recording());
    }

    #[tokio::test]
    async fn test_driver_runs_again_after_stop() {
        let mut controller = controller(&[0.5, 0.5]);
        let driver = MeterDriver::new();
        let stop = driver.stop_handle();

        stop.stop();
        let (mut trigger, _ticker) = ManualTrigger::new();
        assert_eq!(
            driver.run(&mut controller, &mut trigger).await,
            Ok(DriverExit::Stopped)
        );
        assert!(!stop.is_stopped());

        let (mut trigger, ticker) = ManualTrigger::new();
        ticker.tick(10);
        ticker.tick(20);
        drop(ticker);
        assert_eq!(
            driver.run(&mut controller, &mut trigger).await,
            Ok(DriverExit::TriggerEnded)
        );
        assert_eq!(controller.source().probe().reads(), 2);
        assert_eq!(controller.source().probe().acquire_calls(), 2);
    }

    #[tokio::test]
    async fn test_refused_source_is_reported() {
        let source = ScriptedSource::new(Vec::new()).refusing(AudioError::PermissionDenied);
        let mut controller =
            SessionController::new(source, Arc::new(MemoryStore::new()), &MeterConfig::default());
        let driver = MeterDriver::new();
        let (mut trigger, _ticker) = ManualTrigger::new();

        let exit = driver.run(&mut controller, &mut trigger).await;
        assert_eq!(exit, Err(AudioError::PermissionDenied));
        assert!(!controller.is_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_trigger_limit() {
        let mut trigger = IntervalTrigger::new(60).with_limit(3);
        let mut stamps = Vec::new();
        while let Some(now_ms) = trigger.next_tick().await {
            stamps.push(now_ms);
        }
        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[0], 0);
        assert!(stamps.windows(2).all(|pair| pair[1] > pair[0]));
    }
}
