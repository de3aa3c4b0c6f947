//! Face detector seam.
//!
//! The neural detector and descriptor extractor live outside this crate.
//! Anything that turns a [`Frame`] into face boxes, confidences and
//! (optionally) embeddings can drive the matching pipeline.

use crate::frame::Frame;
use crate::types::FaceCandidate;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model not available: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame rejected by detector: {0}")]
    InvalidFrame(String),
}

/// External detection capability.
///
/// Box coordinates must be in the frame's pixel space. Embeddings, when
/// present, must have a fixed length for a given model version.
pub trait FaceDetector: Send + Sync + 'static {
    fn detect(
        &self,
        frame: &Frame,
    ) -> impl Future<Output = Result<Vec<FaceCandidate>, DetectorError>> + Send;
}

/// Detector that replays pre-recorded results.
///
/// Each call pops the next scripted result; once the script is exhausted
/// every call returns the fallback detections. Used by the CLI to replay
/// captured sessions and by tests.
#[derive(Debug, Default)]
pub struct RecordedDetector {
    script: Mutex<VecDeque<Result<Vec<FaceCandidate>, DetectorError>>>,
    fallback: Vec<FaceCandidate>,
    calls: AtomicUsize,
}

impl RecordedDetector {
    /// Always report the same detections.
    pub fn fixed(faces: Vec<FaceCandidate>) -> Self {
        Self {
            fallback: faces,
            ..Self::default()
        }
    }

    /// Replay `results` in order, then report no faces.
    pub fn script(results: impl IntoIterator<Item = Result<Vec<FaceCandidate>, DetectorError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    fn next_result(&self) -> Result<Vec<FaceCandidate>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

impl FaceDetector for RecordedDetector {
    fn detect(
        &self,
        _frame: &Frame,
    ) -> impl Future<Output = Result<Vec<FaceCandidate>, DetectorError>> + Send {
        std::future::ready(self.next_result())
    }
}
