//! Capture-zone geometry and best-candidate selection.
//!
//! [`CaptureZone::for_frame`] is the single source of the zone geometry:
//! the same square drives candidate filtering here and the guide overlay
//! drawn by the kiosk UI.

use crate::config::KioskConfig;
use crate::types::FaceCandidate;
use serde::Serialize;

const AREA_WEIGHT: f32 = 0.4;
const CENTER_WEIGHT: f32 = 0.4;
const CONFIDENCE_WEIGHT: f32 = 0.2;

/// Square region of interest centered in the frame. Side length is a
/// fraction of frame height so the shape stays stable across aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptureZone {
    pub left: f32,
    pub top: f32,
    pub side: f32,
}

impl CaptureZone {
    pub fn for_frame(frame_width: u32, frame_height: u32, fraction: f32) -> Self {
        let side = fraction * frame_height as f32;
        Self {
            left: (frame_width as f32 - side) / 2.0,
            top: (frame_height as f32 - side) / 2.0,
            side,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.side
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.side
    }

    /// Inclusive point-in-square test.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }
}

/// Why a detected face was not eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionHint {
    /// Box center lies outside the capture zone ("center your face").
    OffCenter,
    /// Box is narrower than the size ratio or below the area floor ("move closer").
    TooSmall,
}

/// Result of filtering one frame's detections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    /// The detector found nothing at all.
    NoFaces,
    /// Faces exist but none is usable. The hint describes the largest face.
    FilteredOut { hint: PositionHint },
    Selected { candidate: FaceCandidate, score: f32 },
}

/// Selection plus advisory data about the raw detections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneReport {
    pub selection: Selection,
    pub zone: CaptureZone,
    pub face_count: usize,
    /// Raw face count reached the warning threshold, whichever face was picked.
    pub too_many_faces: bool,
}

/// Eligibility rules and ranking for detected faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneFilter {
    pub capture_zone_fraction: f32,
    pub min_face_size_ratio: f32,
    pub min_face_area_px: f32,
    pub max_faces_warning: usize,
}

impl From<&KioskConfig> for ZoneFilter {
    fn from(config: &KioskConfig) -> Self {
        Self {
            capture_zone_fraction: config.capture_zone_fraction,
            min_face_size_ratio: config.min_face_size_ratio,
            min_face_area_px: config.min_face_area_px,
            max_faces_warning: config.max_faces_warning,
        }
    }
}

impl Default for ZoneFilter {
    fn default() -> Self {
        Self::from(&KioskConfig::default())
    }
}

impl ZoneFilter {
    pub fn zone(&self, frame_width: u32, frame_height: u32) -> CaptureZone {
        CaptureZone::for_frame(frame_width, frame_height, self.capture_zone_fraction)
    }

    /// `None` when the face is eligible, otherwise the reason it is not.
    pub fn check(&self, face: &FaceCandidate, zone: &CaptureZone) -> Option<PositionHint> {
        let (cx, cy) = face.bbox.center();
        if !zone.contains(cx, cy) {
            return Some(PositionHint::OffCenter);
        }
        let wide_enough = face.bbox.width >= self.min_face_size_ratio * zone.side;
        let big_enough = face.bbox.area() >= self.min_face_area_px;
        if !(wide_enough && big_enough) {
            return Some(PositionHint::TooSmall);
        }
        None
    }

    /// Pick the best eligible face for matching.
    ///
    /// Eligible faces are ranked by
    /// `0.4 * relative_area + 0.4 * center_proximity + 0.2 * confidence`,
    /// so a face that is large, central and confidently detected beats a
    /// bystander that wins on only one of those. Equal scores keep the
    /// earlier detection.
    pub fn select(&self, faces: &[FaceCandidate], frame_width: u32, frame_height: u32) -> ZoneReport {
        let zone = self.zone(frame_width, frame_height);
        let face_count = faces.len();
        let too_many_faces = face_count >= self.max_faces_warning;

        let report = |selection| ZoneReport {
            selection,
            zone,
            face_count,
            too_many_faces,
        };

        if faces.is_empty() {
            return report(Selection::NoFaces);
        }

        let mut best: Option<(&FaceCandidate, f32)> = None;
        let mut largest_rejected: Option<(f32, PositionHint)> = None;

        for face in faces {
            if let Some(hint) = self.check(face, &zone) {
                let area = face.bbox.area();
                if largest_rejected.map_or(true, |(a, _)| area > a) {
                    largest_rejected = Some((area, hint));
                }
                continue;
            }
            let score = composite_score(face, frame_width, frame_height);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((face, score));
            }
        }

        match (best, largest_rejected) {
            (Some((face, score)), _) => report(Selection::Selected {
                candidate: face.clone(),
                score,
            }),
            (None, Some((_, hint))) => report(Selection::FilteredOut { hint }),
            (None, None) => report(Selection::NoFaces),
        }
    }
}

/// Ranking score in [0, 1] for an eligible face.
pub fn composite_score(face: &FaceCandidate, frame_width: u32, frame_height: u32) -> f32 {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let frame_area = fw * fh;
    let relative_area = if frame_area > 0.0 {
        (face.bbox.area() / frame_area).min(1.0)
    } else {
        0.0
    };

    let (cx, cy) = face.bbox.center();
    let max_dist = ((fw / 2.0).powi(2) + (fh / 2.0).powi(2)).sqrt();
    let dist = ((cx - fw / 2.0).powi(2) + (cy - fh / 2.0).powi(2)).sqrt();
    let center_proximity = if max_dist > 0.0 {
        (1.0 - dist / max_dist).max(0.0)
    } else {
        0.0
    };

    AREA_WEIGHT * relative_area
        + CENTER_WEIGHT * center_proximity
        + CONFIDENCE_WEIGHT * face.confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn face(cx: f32, cy: f32, w: f32, h: f32, conf: f32) -> FaceCandidate {
        FaceCandidate::new(BoundingBox::centered_at(cx, cy, w, h), conf)
    }

    fn filter() -> ZoneFilter {
        ZoneFilter {
            capture_zone_fraction: 0.7,
            min_face_size_ratio: 0.15,
            min_face_area_px: 2_500.0,
            max_faces_warning: 3,
        }
    }

    #[test]
    fn test_zone_geometry_640x480() {
        let zone = CaptureZone::for_frame(640, 480, 0.7);
        assert!((zone.side - 336.0).abs() < 1e-3);
        assert!((zone.left - 152.0).abs() < 1e-3);
        assert!((zone.right() - 488.0).abs() < 1e-3);
        assert!((zone.top - 72.0).abs() < 1e-3);
        assert!((zone.bottom() - 408.0).abs() < 1e-3);
    }

    #[test]
    fn test_zone_uses_height_for_portrait() {
        let zone = CaptureZone::for_frame(480, 640, 0.5);
        assert_eq!(zone.side, 320.0);
        assert_eq!(zone.left, 80.0);
        assert_eq!(zone.top, 160.0);
    }

    #[test]
    fn test_centered_face_is_eligible() {
        let zone = CaptureZone::for_frame(640, 480, 0.7);
        let f = face(320.0, 240.0, 200.0, 200.0, 0.9);
        assert_eq!(filter().check(&f, &zone), None);
    }

    #[test]
    fn test_corner_face_is_off_center() {
        let zone = CaptureZone::for_frame(640, 480, 0.7);
        let f = face(50.0, 50.0, 200.0, 200.0, 0.9);
        assert_eq!(filter().check(&f, &zone), Some(PositionHint::OffCenter));
    }

    #[test]
    fn test_zone_edge_is_inclusive() {
        // side 240, spanning x∈[200,440], y∈[120,360]
        let zone = CaptureZone::for_frame(640, 480, 0.5);
        let f = face(200.0, 120.0, 100.0, 100.0, 0.9);
        assert_eq!(filter().check(&f, &zone), None);
        let f = face(440.0, 360.0, 100.0, 100.0, 0.9);
        assert_eq!(filter().check(&f, &zone), None);
        let f = face(440.5, 360.0, 100.0, 100.0, 0.9);
        assert_eq!(filter().check(&f, &zone), Some(PositionHint::OffCenter));
        let f = face(200.0, 120.0, 100.0, 100.0, 0.9);
        assert_eq!(filter().check(&f, &zone), None);
    }

    #[test]
    fn test_narrow_face_too_small() {
        let zone = CaptureZone::for_frame(640, 480, 0.7);
        // 40 / 336 ≈ 0.119 < 0.15
        let f = face(320.0, 240.0, 40.0, 120.0, 0.9);
        assert_eq!(filter().check(&f, &zone), Some(PositionHint::TooSmall));
    }

    #[test]
    fn test_area_floor_applies_on_tiny_frames() {
        // 100x100 frame: zone side 70, ratio floor 10.5 px wide. A 20x20
        // face passes the ratio but not the 2500 px² floor.
        let zone = CaptureZone::for_frame(100, 100, 0.7);
        let f = face(50.0, 50.0, 20.0, 20.0, 0.9);
        assert_eq!(filter().check(&f, &zone), Some(PositionHint::TooSmall));
    }

    #[test]
    fn test_select_no_faces() {
        let report = filter().select(&[], 640, 480);
        assert_eq!(report.selection, Selection::NoFaces);
        assert_eq!(report.face_count, 0);
        assert!(!report.too_many_faces);
    }

    #[test]
    fn test_select_filtered_out_is_distinct() {
        let faces = vec![face(50.0, 50.0, 120.0, 120.0, 0.9)];
        let report = filter().select(&faces, 640, 480);
        assert_eq!(
            report.selection,
            Selection::FilteredOut { hint: PositionHint::OffCenter }
        );
        assert_eq!(report.face_count, 1);
    }

    #[test]
    fn test_filtered_out_hint_follows_largest_face() {
        let faces = vec![
            face(600.0, 50.0, 60.0, 60.0, 0.9),
            face(320.0, 240.0, 30.0, 30.0, 0.9),
            face(320.0, 240.0, 45.0, 200.0, 0.9),
        ];
        let report = filter().select(&faces, 640, 480);
        assert_eq!(
            report.selection,
            Selection::FilteredOut { hint: PositionHint::TooSmall }
        );
    }

    #[test]
    fn test_select_prefers_large_central_face() {
        let small = face(260.0, 200.0, 100.0, 100.0, 0.9);
        // Twice the area of `small`, and sitting on the frame center.
        let large = face(320.0, 240.0, 141.5, 141.5, 0.9);
        let report = filter().select(&[small, large.clone()], 640, 480);
        match report.selection {
            Selection::Selected { candidate, .. } => assert_eq!(candidate, large),
            other => panic!("expected selection, got {other:?}"),
        }
    }

    #[test]
    fn test_composite_beats_single_axis_winner() {
        // Highest confidence but small and off to the side of the zone.
        let bystander = face(200.0, 300.0, 60.0, 60.0, 1.0);
        let subject = face(330.0, 230.0, 180.0, 180.0, 0.7);
        let report = filter().select(&[bystander, subject.clone()], 640, 480);
        match report.selection {
            Selection::Selected { candidate, .. } => assert_eq!(candidate, subject),
            other => panic!("expected selection, got {other:?}"),
        }
    }

    #[test]
    fn test_equal_scores_keep_first() {
        let a = face(320.0, 240.0, 150.0, 150.0, 0.8).with_embedding(&[1.0, 0.0]);
        let b = face(320.0, 240.0, 150.0, 150.0, 0.8).with_embedding(&[0.0, 1.0]);
        let report = filter().select(&[a.clone(), b], 640, 480);
        match report.selection {
            Selection::Selected { candidate, .. } => assert_eq!(candidate, a),
            other => panic!("expected selection, got {other:?}"),
        }
    }

    #[test]
    fn test_too_many_faces_independent_of_selection() {
        let faces = vec![
            face(320.0, 240.0, 200.0, 200.0, 0.9),
            face(20.0, 20.0, 40.0, 40.0, 0.6),
            face(620.0, 460.0, 40.0, 40.0, 0.6),
        ];
        let report = filter().select(&faces, 640, 480);
        assert!(report.too_many_faces);
        assert!(matches!(report.selection, Selection::Selected { .. }));

        let report = filter().select(&faces[..2], 640, 480);
        assert!(!report.too_many_faces);
    }

    #[test]
    fn test_composite_score_components() {
        // Full-frame box on center with confidence 1 scores the maximum.
        let f = face(320.0, 240.0, 640.0, 480.0, 1.0);
        assert!((composite_score(&f, 640, 480) - 1.0).abs() < 1e-6);

        // Corner-centered zero-size box with zero confidence scores zero.
        let f = face(0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(composite_score(&f, 640, 480).abs() < 1e-6);
    }
}
