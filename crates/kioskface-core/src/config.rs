//! Tunable thresholds for matching, capture-zone filtering, the detection
//! loop and enrollment.
//!
//! Defaults are calibrated for unit-normalized 128/512-d descriptors where
//! same-person distances cluster well below 0.5 and different-person
//! distances approach the unit-sphere diameter.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HIGH_CONFIDENCE_THRESHOLD: f32 = 0.45;
const DEFAULT_LOW_CONFIDENCE_THRESHOLD: f32 = 0.60;
const DEFAULT_RECENCY_BONUS: f32 = 0.02;
const DEFAULT_DETECTION_INTERVAL_MS: u64 = 200;
const DEFAULT_NO_FACE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_CAPTURE_ZONE_FRACTION: f32 = 0.7;
const DEFAULT_MIN_FACE_SIZE_RATIO: f32 = 0.15;
const DEFAULT_MIN_FACE_AREA_PX: f32 = 2_500.0;
const DEFAULT_MAX_FACES_WARNING: usize = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Kiosk-wide tuning, injected into the matcher, filter and loop at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Adjusted distance strictly below this is a confident match.
    pub high_confidence_threshold: f32,
    /// Adjusted distance at or above this is rejected outright.
    pub low_confidence_threshold: f32,
    /// Distance discount per enrollment step (index 0 = oldest sample).
    pub recency_bonus: f32,
    pub detection_interval_ms: u64,
    /// Wall-clock time without an eligible face before `NoFace` fires.
    pub no_face_timeout_ms: u64,
    /// Capture-zone side as a fraction of frame height.
    pub capture_zone_fraction: f32,
    /// Minimum face width as a fraction of the capture-zone side.
    pub min_face_size_ratio: f32,
    /// Absolute floor on face box area, in square pixels.
    pub min_face_area_px: f32,
    /// Raw face count at which the "too many faces" warning is raised.
    pub max_faces_warning: usize,
    pub enrollment: EnrollmentOptions,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: DEFAULT_HIGH_CONFIDENCE_THRESHOLD,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            recency_bonus: DEFAULT_RECENCY_BONUS,
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            no_face_timeout_ms: DEFAULT_NO_FACE_TIMEOUT_MS,
            capture_zone_fraction: DEFAULT_CAPTURE_ZONE_FRACTION,
            min_face_size_ratio: DEFAULT_MIN_FACE_SIZE_RATIO,
            min_face_area_px: DEFAULT_MIN_FACE_AREA_PX,
            max_faces_warning: DEFAULT_MAX_FACES_WARNING,
            enrollment: EnrollmentOptions::default(),
        }
    }
}

impl KioskConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    /// Number of consecutive empty samples that spans `no_face_timeout_ms`.
    pub fn no_face_sample_threshold(&self) -> u32 {
        let interval = self.detection_interval_ms.max(1);
        let samples = self.no_face_timeout_ms.div_ceil(interval);
        samples.clamp(1, u32::MAX as u64) as u32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });

        if !(self.low_confidence_threshold > 0.0) {
            return invalid(
                "low_confidence_threshold",
                format!("must be positive, got {}", self.low_confidence_threshold),
            );
        }
        if !(self.high_confidence_threshold < self.low_confidence_threshold) {
            return invalid(
                "high_confidence_threshold",
                format!(
                    "must be below low_confidence_threshold ({}), got {}",
                    self.low_confidence_threshold, self.high_confidence_threshold
                ),
            );
        }
        if !(self.recency_bonus >= 0.0) {
            return invalid(
                "recency_bonus",
                format!("must be non-negative, got {}", self.recency_bonus),
            );
        }
        if self.detection_interval_ms == 0 {
            return invalid("detection_interval_ms", "must be non-zero".into());
        }
        if !(self.capture_zone_fraction > 0.0 && self.capture_zone_fraction <= 1.0) {
            return invalid(
                "capture_zone_fraction",
                format!("must be in (0, 1], got {}", self.capture_zone_fraction),
            );
        }
        if !(self.min_face_size_ratio >= 0.0) {
            return invalid(
                "min_face_size_ratio",
                format!("must be non-negative, got {}", self.min_face_size_ratio),
            );
        }
        if !(self.min_face_area_px >= 0.0) {
            return invalid(
                "min_face_area_px",
                format!("must be non-negative, got {}", self.min_face_area_px),
            );
        }
        if self.max_faces_warning == 0 {
            return invalid("max_faces_warning", "must be at least 1".into());
        }
        self.enrollment.validate()
    }
}

/// Quality gates for one-shot descriptor extraction from a still image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentOptions {
    pub min_width: u32,
    pub min_height: u32,
    pub min_confidence: f32,
    /// Minimum face box side, in pixels, checked on both axes.
    pub min_face_size: f32,
}

impl Default for EnrollmentOptions {
    fn default() -> Self {
        Self {
            min_width: 200,
            min_height: 200,
            min_confidence: 0.8,
            min_face_size: 80.0,
        }
    }
}

impl EnrollmentOptions {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid {
                field: "enrollment.min_confidence",
                reason: format!("must be in [0, 1], got {}", self.min_confidence),
            });
        }
        if !(self.min_face_size >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "enrollment.min_face_size",
                reason: format!("must be non-negative, got {}", self.min_face_size),
            });
        }
        Ok(())
    }
}
