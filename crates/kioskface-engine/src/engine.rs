//! Throttled detection loop over one video source.
//!
//! Each [`DetectionLoop`] owns its own timers and counters, so several
//! kiosk lanes can run side by side in one process. Outcomes are pushed
//! through an unbounded channel in strict sample order.

use crate::events::LoopEvent;
use crate::sampler::SampleProcessor;
use kioskface_core::{ConfigError, FaceDetector, KioskConfig, StoreHandle, VideoSource};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("detection loop must be created inside a tokio runtime")]
    NoRuntime,
}

/// Handles for one running loop task.
struct RunningLoop {
    /// Cleared by `stop()`; checked before every dispatch.
    active: Arc<Mutex<bool>>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Idle/Running controller for continuous face sampling.
pub struct DetectionLoop<D: FaceDetector> {
    config: KioskConfig,
    detector: Arc<D>,
    store: StoreHandle,
    runtime: Handle,
    running: Option<RunningLoop>,
}

impl<D: FaceDetector> DetectionLoop<D> {
    /// Validate `config` and bind to the current tokio runtime.
    pub fn new(config: KioskConfig, detector: Arc<D>, store: StoreHandle) -> Result<Self, EngineError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self {
            config,
            detector,
            store,
            runtime,
            running: None,
        })
    }

    pub fn config(&self) -> &KioskConfig {
        &self.config
    }

    /// Handle to the roster this loop matches against. Reloading through it
    /// takes effect from the next sample.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Start sampling `source`. Returns the outcome stream, or `None` if the
    /// loop is already running.
    pub fn start<V: VideoSource>(&mut self, source: Arc<V>) -> Option<mpsc::UnboundedReceiver<LoopEvent>> {
        if self.is_running() {
            tracing::debug!("detection loop already running; start ignored");
            return None;
        }
        // A loop whose consumer went away has finished on its own.
        self.running = None;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let active = Arc::new(Mutex::new(true));

        let task = self.runtime.spawn(run_loop(
            self.config.clone(),
            Arc::clone(&self.detector),
            self.store.clone(),
            source,
            Arc::clone(&active),
            stop_rx,
            events_tx,
        ));

        tracing::info!(
            interval_ms = self.config.detection_interval_ms,
            no_face_samples = self.config.no_face_sample_threshold(),
            "detection loop started"
        );

        self.running = Some(RunningLoop {
            active,
            stop_tx,
            task,
        });
        Some(events_rx)
    }

    /// Stop sampling. Cancels the next scheduled sample and the no-face
    /// debounce; a detector call already in flight is left to finish and
    /// its result is dropped. Safe to call when idle.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        *running.active.lock() = false;
        let _ = running.stop_tx.send(());
        tracing::info!("detection loop stopped");
    }
}

impl<D: FaceDetector> Drop for DetectionLoop<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop<D: FaceDetector, V: VideoSource>(
    config: KioskConfig,
    detector: Arc<D>,
    store: StoreHandle,
    source: Arc<V>,
    active: Arc<Mutex<bool>>,
    mut stop_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<LoopEvent>,
) {
    let mut processor = SampleProcessor::new(&config);
    let mut ticker = tokio::time::interval(config.detection_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {}
        }

        let Some(frame) = source.current_frame() else {
            tracing::trace!("no frame available; sample skipped");
            continue;
        };
        sequence = sequence.wrapping_add(1);

        let detections = detector.detect(&frame).await;
        if let Err(e) = &detections {
            tracing::warn!(sequence, error = %e, "detector failed; continuing");
        }

        let snapshot = store.snapshot();
        let event = processor.process(sequence, frame.width, frame.height, detections, &snapshot);

        // Hold the gate across the send so nothing is dispatched once
        // `stop()` has returned.
        let keep_running = {
            let gate = active.lock();
            if !*gate {
                tracing::debug!(sequence, "loop stopped during detection; result discarded");
                false
            } else if let Some(event) = event {
                tracing::debug!(sequence, kind = event.kind(), "dispatching outcome");
                let sent = events.send(event).is_ok();
                if !sent {
                    tracing::debug!("outcome receiver dropped; loop exiting");
                }
                sent
            } else {
                true
            }
        };
        if !keep_running {
            break;
        }
    }
}
