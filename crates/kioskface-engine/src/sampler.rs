//! Per-sample decision logic, independent of timers and tasks.
//!
//! [`SampleProcessor`] turns one detector result into at most one
//! [`LoopEvent`]. The async loop in [`crate::engine`] only adds throttling
//! and cancellation around it.

use crate::events::{LoopEvent, MatchReport};
use kioskface_core::{
    ConfidenceTier, DescriptorStore, DetectorError, FaceCandidate, KioskConfig, MatchOutcome,
    Matcher, RecencyWeightedMatcher, Selection, ZoneFilter,
};

/// Counts consecutive samples without any detected face and decides when
/// the "no face" signal fires. After firing it stays quiet until a face
/// is seen again.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    threshold: u32,
    misses: u32,
    no_face_fired: bool,
}

impl PresenceTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            misses: 0,
            no_face_fired: false,
        }
    }

    /// Any face, eligible or not, ends the absence.
    pub fn face_seen(&mut self) {
        self.misses = 0;
        self.no_face_fired = false;
    }

    /// Record an empty sample. Returns true exactly once per absence, on
    /// the sample that reaches the threshold.
    pub fn face_missing(&mut self) -> bool {
        self.misses = self.misses.saturating_add(1);
        if !self.no_face_fired && self.misses >= self.threshold {
            self.no_face_fired = true;
            return true;
        }
        false
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn no_face_fired(&self) -> bool {
        self.no_face_fired
    }
}

/// Filter, match and classify one detector result.
#[derive(Debug, Clone)]
pub struct SampleProcessor {
    filter: ZoneFilter,
    matcher: RecencyWeightedMatcher,
    presence: PresenceTracker,
}

impl SampleProcessor {
    pub fn new(config: &KioskConfig) -> Self {
        Self {
            filter: ZoneFilter::from(config),
            matcher: RecencyWeightedMatcher::new(config.into()),
            presence: PresenceTracker::new(config.no_face_sample_threshold()),
        }
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Detector errors leave the presence counters untouched.
    pub fn process(
        &mut self,
        sequence: u32,
        frame_width: u32,
        frame_height: u32,
        detections: Result<Vec<FaceCandidate>, DetectorError>,
        store: &DescriptorStore,
    ) -> Option<LoopEvent> {
        let faces = match detections {
            Ok(faces) => faces,
            Err(error) => return Some(LoopEvent::Error { sequence, error }),
        };

        let report = self.filter.select(&faces, frame_width, frame_height);

        match report.selection {
            Selection::NoFaces => self
                .presence
                .face_missing()
                .then_some(LoopEvent::NoFace { sequence }),
            Selection::FilteredOut { hint } => {
                self.presence.face_seen();
                Some(LoopEvent::AdjustPosition {
                    sequence,
                    hint,
                    face_count: report.face_count,
                    too_many_faces: report.too_many_faces,
                })
            }
            Selection::Selected { candidate, .. } => {
                self.presence.face_seen();
                let outcome = match &candidate.embedding {
                    Some(query) => self.matcher.find_best_match(query, store),
                    None => MatchOutcome::no_match(store.generation()),
                };
                let tier = outcome.tier;
                let match_report = MatchReport {
                    sequence,
                    candidate,
                    outcome,
                    face_count: report.face_count,
                    too_many_faces: report.too_many_faces,
                };
                Some(match tier {
                    ConfidenceTier::High => LoopEvent::Match(match_report),
                    ConfidenceTier::Low => LoopEvent::Uncertain(match_report),
                    ConfidenceTier::None => LoopEvent::UnknownFace(match_report),
                })
            }
        }
    }
}
