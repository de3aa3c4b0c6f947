//! kioskface-engine — Continuous detection loop for kiosk check-in.
//!
//! Samples a video source at a throttled rate, routes each frame through
//! the capture-zone filter and matcher from `kioskface-core`, and emits one
//! [`LoopEvent`] per decisive sample.

pub mod config;
pub mod engine;
pub mod events;
pub mod sampler;

pub use engine::{DetectionLoop, EngineError};
pub use events::{LoopEvent, MatchReport};
pub use sampler::{PresenceTracker, SampleProcessor};
