use kioskface_core::{DetectorError, FaceCandidate, MatchOutcome, PositionHint};

/// The face that was matched and the verdict for it.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub sequence: u32,
    pub candidate: FaceCandidate,
    pub outcome: MatchOutcome,
    pub face_count: usize,
    pub too_many_faces: bool,
}

/// Outcome of one detection-loop sample. At most one is emitted per sample.
#[derive(Debug)]
pub enum LoopEvent {
    /// High-confidence match: check the member in.
    Match(MatchReport),
    /// Low-confidence match: ask the person to confirm.
    Uncertain(MatchReport),
    /// A face was selected but it matches no known member.
    UnknownFace(MatchReport),
    /// Faces are present but none is usable where it is.
    AdjustPosition {
        sequence: u32,
        hint: PositionHint,
        face_count: usize,
        too_many_faces: bool,
    },
    /// No face for the configured timeout. Fires once per absence.
    NoFace { sequence: u32 },
    /// The detector failed for this sample; the loop keeps running.
    Error { sequence: u32, error: DetectorError },
}

impl LoopEvent {
    pub fn sequence(&self) -> u32 {
        match self {
            Self::Match(r) | Self::Uncertain(r) | Self::UnknownFace(r) => r.sequence,
            Self::AdjustPosition { sequence, .. }
            | Self::NoFace { sequence }
            | Self::Error { sequence, .. } => *sequence,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::Uncertain(_) => "uncertain",
            Self::UnknownFace(_) => "unknown_face",
            Self::AdjustPosition { .. } => "adjust_position",
            Self::NoFace { .. } => "no_face",
            Self::Error { .. } => "error",
        }
    }

    /// The match verdict for face-bearing outcomes.
    pub fn report(&self) -> Option<&MatchReport> {
        match self {
            Self::Match(r) | Self::Uncertain(r) | Self::UnknownFace(r) => Some(r),
            _ => None,
        }
    }
}
