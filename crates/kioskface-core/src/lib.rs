//! kioskface-core — Face matching primitives for unattended kiosk check-in.
//!
//! Normalizes member embeddings into a swappable descriptor store, filters
//! detections to a centered capture zone, and resolves the chosen face to
//! a member with a confidence tier. The neural detector itself is an
//! external collaborator behind the [`FaceDetector`] trait.

pub mod capture_zone;
pub mod config;
pub mod detector;
pub mod embedding;
pub mod enrollment;
pub mod frame;
pub mod matcher;
pub mod store;
pub mod types;

pub use capture_zone::{CaptureZone, PositionHint, Selection, ZoneFilter, ZoneReport};
pub use config::{ConfigError, EnrollmentOptions, KioskConfig};
pub use detector::{DetectorError, FaceDetector, RecordedDetector};
pub use embedding::{normalize, NormalizedEmbedding};
pub use enrollment::{
    extract_descriptor, EnrollmentDescriptor, EnrollmentQuality, EnrollmentRejection,
};
pub use frame::{Frame, VideoSource};
pub use matcher::{ConfidenceTier, MatchOutcome, MatchThresholds, Matcher, RecencyWeightedMatcher};
pub use store::{DescriptorStore, MemberDescriptor, RosterEntry, StoreHandle};
pub use types::{BoundingBox, FaceCandidate};
