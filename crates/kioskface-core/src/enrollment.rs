//! One-shot descriptor extraction from a still image, with quality gates.
//!
//! Used offline to turn a member's profile photo into an embedding for the
//! roster. Every rejection carries a specific reason so the operator can
//! tell the member what to fix before retaking the photo.

use crate::config::EnrollmentOptions;
use crate::detector::{DetectorError, FaceDetector};
use crate::embedding::NormalizedEmbedding;
use crate::frame::Frame;
use crate::types::BoundingBox;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollmentRejection {
    #[error("image is {width}x{height}, need at least {min_width}x{min_height}")]
    ImageTooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("no face detected")]
    NoFaceDetected,
    #[error("face confidence {confidence:.2} below minimum {min:.2}")]
    LowConfidence { confidence: f32, min: f32 },
    #[error("face is {width:.0}x{height:.0}px, need at least {min:.0}px on each side")]
    FaceTooSmall { width: f32, height: f32, min: f32 },
    #[error("detector returned no embedding for the face")]
    MissingEmbedding,
    #[error("face embedding is null and cannot be matched")]
    NullEmbedding,
    #[error("detector failed: {0}")]
    Detector(#[from] DetectorError),
}

impl EnrollmentRejection {
    /// Stable machine-readable code for the rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ImageTooSmall { .. } => "image_too_small",
            Self::NoFaceDetected => "no_face_detected",
            Self::LowConfidence { .. } => "low_confidence",
            Self::FaceTooSmall { .. } => "face_too_small",
            Self::MissingEmbedding => "missing_embedding",
            Self::NullEmbedding => "null_embedding",
            Self::Detector(_) => "detector_failed",
        }
    }
}

/// Audit data for an accepted enrollment photo.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentQuality {
    pub confidence: f32,
    /// Face box area over image area.
    pub face_area_ratio: f32,
    pub face_box: BoundingBox,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentDescriptor {
    pub embedding: NormalizedEmbedding,
    pub quality: EnrollmentQuality,
}

/// Extract the single best embedding from `image`.
///
/// Dimensions are checked before the detector runs. The detector is called
/// exactly once; the highest-confidence face is then gated on confidence
/// and box size. Holds no state, so concurrent calls on different images
/// are independent.
pub async fn extract_descriptor<D: FaceDetector>(
    detector: &D,
    image: &Frame,
    options: &EnrollmentOptions,
) -> Result<EnrollmentDescriptor, EnrollmentRejection> {
    if image.width < options.min_width || image.height < options.min_height {
        return Err(EnrollmentRejection::ImageTooSmall {
            width: image.width,
            height: image.height,
            min_width: options.min_width,
            min_height: options.min_height,
        });
    }

    let faces = detector.detect(image).await?;

    let face = faces
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .ok_or(EnrollmentRejection::NoFaceDetected)?;

    if face.confidence < options.min_confidence {
        return Err(EnrollmentRejection::LowConfidence {
            confidence: face.confidence,
            min: options.min_confidence,
        });
    }

    if face.bbox.width < options.min_face_size || face.bbox.height < options.min_face_size {
        return Err(EnrollmentRejection::FaceTooSmall {
            width: face.bbox.width,
            height: face.bbox.height,
            min: options.min_face_size,
        });
    }

    let embedding = face.embedding.ok_or(EnrollmentRejection::MissingEmbedding)?;
    if embedding.is_null() {
        return Err(EnrollmentRejection::NullEmbedding);
    }

    let image_area = image.pixel_count() as f32;
    let quality = EnrollmentQuality {
        confidence: face.confidence,
        face_area_ratio: if image_area > 0.0 {
            face.bbox.area() / image_area
        } else {
            0.0
        },
        face_box: face.bbox,
    };

    tracing::debug!(
        confidence = quality.confidence,
        area_ratio = quality.face_area_ratio,
        dim = embedding.dimension(),
        "enrollment descriptor extracted"
    );

    Ok(EnrollmentDescriptor { embedding, quality })
}
