use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::faces::profile::FacialProfile;

/// `{x, y, scale}` placement of the face in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Planar {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

/// `{roll, pitch, yaw, dist}` head rotation in degrees plus normalized distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotational {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub dist: f64,
}

/// Head placement captured alongside a face sample.
///
/// Capture clients send either field set, and some send both. Each set is
/// present only when all of its fields are; the two sets are never compared
/// with each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PositionFields", into = "PositionFields")]
pub struct Position {
    pub planar: Option<Planar>,
    pub rotational: Option<Rotational>,
}

impl Position {
    pub fn planar(x: f64, y: f64, scale: f64) -> Self {
        Self {
            planar: Some(Planar { x, y, scale }),
            rotational: None,
        }
    }

    pub fn rotational(roll: f64, pitch: f64, yaw: f64, dist: f64) -> Self {
        Self {
            planar: None,
            rotational: Some(Rotational {
                roll,
                pitch,
                yaw,
                dist,
            }),
        }
    }

    pub fn with_rotational(mut self, roll: f64, pitch: f64, yaw: f64, dist: f64) -> Self {
        self.rotational = Position::rotational(roll, pitch, yaw, dist).rotational;
        self
    }

    /// True when neither field set is complete.
    pub fn is_empty(&self) -> bool {
        self.planar.is_none() && self.rotational.is_none()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PositionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    roll: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    yaw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dist: Option<f64>,
}

impl From<PositionFields> for Position {
    fn from(fields: PositionFields) -> Self {
        let planar = match (fields.x, fields.y, fields.scale) {
            (Some(x), Some(y), Some(scale)) => Some(Planar { x, y, scale }),
            _ => None,
        };
        let rotational = match (fields.roll, fields.pitch, fields.yaw, fields.dist) {
            (Some(roll), Some(pitch), Some(yaw), Some(dist)) => Some(Rotational {
                roll,
                pitch,
                yaw,
                dist,
            }),
            _ => None,
        };
        Self { planar, rotational }
    }
}

impl From<Position> for PositionFields {
    fn from(position: Position) -> Self {
        let mut fields = PositionFields::default();
        if let Some(Planar { x, y, scale }) = position.planar {
            fields.x = Some(x);
            fields.y = Some(y);
            fields.scale = Some(scale);
        }
        if let Some(Rotational {
            roll,
            pitch,
            yaw,
            dist,
        }) = position.rotational
        {
            fields.roll = Some(roll);
            fields.pitch = Some(pitch);
            fields.yaw = Some(yaw);
            fields.dist = Some(dist);
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTolerance {
    pub xy: f64,
    pub scale: f64,
    pub angle: f64,
    pub dist: f64,
}

impl PoseTolerance {
    /// Tolerances for one-off pairwise checks outside the per-user flow.
    pub const FIXED: PoseTolerance = PoseTolerance {
        xy: 0.12,
        scale: 0.20,
        angle: 15.0,
        dist: 0.25,
    };

    /// Tolerances for per-user checks. Each failed attempt tightens them down
    /// to a fixed floor.
    pub fn adaptive(failed_attempts: u32) -> Self {
        let attempts = f64::from(failed_attempts);
        Self {
            xy: (0.10 - attempts * 0.01).max(0.05),
            scale: (0.15 - attempts * 0.01).max(0.08),
            angle: (15.0 - attempts).max(8.0),
            dist: (0.22 - attempts * 0.02).max(0.12),
        }
    }
}

fn planar_agrees(stored: &Planar, live: &Planar, tolerance: &PoseTolerance) -> bool {
    (stored.x - live.x).abs() <= tolerance.xy
        && (stored.y - live.y).abs() <= tolerance.xy
        && (stored.scale - live.scale).abs() <= tolerance.scale
}

fn rotational_agrees(stored: &Rotational, live: &Rotational, tolerance: &PoseTolerance) -> bool {
    (stored.roll - live.roll).abs() <= tolerance.angle
        && (stored.pitch - live.pitch).abs() <= tolerance.angle
        && (stored.yaw - live.yaw).abs() <= tolerance.angle
        && (stored.dist - live.dist).abs() <= tolerance.dist
}

/// True when either field set is present on both sides and within `tolerance`.
/// The planar set is tried first, then the rotational one.
pub fn positions_agree(stored: &Position, live: &Position, tolerance: &PoseTolerance) -> bool {
    let planar = match (&stored.planar, &live.planar) {
        (Some(stored), Some(live)) => planar_agrees(stored, live, tolerance),
        _ => false,
    };
    planar
        || match (&stored.rotational, &live.rotational) {
            (Some(stored), Some(live)) => rotational_agrees(stored, live, tolerance),
            _ => false,
        }
}

/// Checks `live` against the user's stored positions with adaptive tolerances.
/// The first stored position that agrees wins.
pub fn validate_position_collection(profile: &FacialProfile, live: Option<&Position>) -> bool {
    let Some(live) = live else {
        debug!(target: "facelock::pose", "no live position supplied");
        return false;
    };

    let stored = profile.effective_positions();
    if stored.is_empty() {
        debug!(target: "facelock::pose", "user has no stored positions");
        return false;
    }

    let tolerance = PoseTolerance::adaptive(profile.failed_attempts);
    let hit = stored
        .iter()
        .position(|position| positions_agree(position, live, &tolerance));
    debug!(
        target: "facelock::pose",
        candidates = stored.len(),
        attempts = profile.failed_attempts,
        matched_index = ?hit,
        "position collection checked"
    );
    hit.is_some()
}

/// Single-pair check with fixed tolerances. When both sides carry the planar
/// set it alone decides; the rotational set is only consulted otherwise.
pub fn validate_position(stored: &Position, live: &Position) -> bool {
    let tolerance = PoseTolerance::FIXED;
    match (&stored.planar, &live.planar) {
        (Some(stored), Some(live)) => planar_agrees(stored, live, &tolerance),
        _ => match (&stored.rotational, &live.rotational) {
            (Some(stored), Some(live)) => rotational_agrees(stored, live, &tolerance),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar(x: f64, y: f64, scale: f64) -> Position {
        Position::planar(x, y, scale)
    }

    fn rotational(roll: f64, pitch: f64, yaw: f64, dist: f64) -> Position {
        Position::rotational(roll, pitch, yaw, dist)
    }

    fn profile_with(positions: Vec<Position>, attempts: u32) -> FacialProfile {
        FacialProfile {
            positions,
            failed_attempts: attempts,
            ..FacialProfile::default()
        }
    }

    #[test]
    fn adaptive_tolerances_never_drop_below_floor() {
        for attempts in 0..200 {
            let tol = PoseTolerance::adaptive(attempts);
            assert!(tol.xy >= 0.05);
            assert!(tol.scale >= 0.08);
            assert!(tol.angle >= 8.0);
            assert!(tol.dist >= 0.12);
        }
        let fresh = PoseTolerance::adaptive(0);
        assert!((fresh.xy - 0.10).abs() < 1e-12);
        assert!((fresh.scale - 0.15).abs() < 1e-12);
        assert_eq!(fresh.angle, 15.0);
        assert!((fresh.dist - 0.22).abs() < 1e-12);
    }

    #[test]
    fn planar_collection_match() {
        let profile = profile_with(
            vec![planar(0.5, 0.5, 1.0), rotational(0.0, 0.0, 0.0, 0.2)],
            0,
        );
        assert!(validate_position_collection(
            &profile,
            Some(&planar(0.52, 0.48, 1.04))
        ));
        assert!(!validate_position_collection(
            &profile,
            Some(&planar(0.9, 0.9, 1.5))
        ));
    }

    #[test]
    fn rotational_collection_match() {
        let profile = profile_with(
            vec![planar(0.5, 0.5, 1.0), rotational(0.0, 0.0, 0.0, 0.2)],
            0,
        );
        assert!(validate_position_collection(
            &profile,
            Some(&rotational(1.0, 1.0, 1.0, 0.25))
        ));
    }

    #[test]
    fn failed_attempts_tighten_tolerance() {
        let profile = profile_with(vec![planar(0.5, 0.5, 1.0)], 0);
        let live = planar(0.58, 0.5, 1.0);
        assert!(validate_position_collection(&profile, Some(&live)));

        let strict = profile_with(vec![planar(0.5, 0.5, 1.0)], 5);
        assert!(!validate_position_collection(&strict, Some(&live)));
    }

    #[test]
    fn legacy_position_used_when_collection_empty() {
        let profile = FacialProfile {
            legacy_position: Some(rotational(10.0, -5.0, 0.0, 0.3)),
            ..FacialProfile::default()
        };
        assert!(validate_position_collection(
            &profile,
            Some(&rotational(12.0, -4.0, 3.0, 0.35))
        ));
    }

    #[test]
    fn missing_live_or_stored_positions_fail() {
        let empty = FacialProfile::default();
        assert!(!validate_position_collection(
            &empty,
            Some(&planar(0.5, 0.5, 1.0))
        ));

        let profile = profile_with(vec![planar(0.5, 0.5, 1.0)], 0);
        assert!(!validate_position_collection(&profile, None));
    }

    #[test]
    fn schemas_are_never_cross_compared() {
        assert!(!validate_position(
            &planar(0.0, 0.0, 0.0),
            &rotational(0.0, 0.0, 0.0, 0.0)
        ));
    }

    #[test]
    fn single_pair_uses_fixed_tolerance() {
        let stored = planar(0.5, 0.5, 1.0);
        assert!(validate_position(&stored, &planar(0.55, 0.45, 1.1)));
        assert!(!validate_position(&stored, &planar(0.8, 0.2, 1.5)));

        let stored = rotational(0.0, 0.0, 0.0, 0.2);
        assert!(validate_position(&stored, &rotational(14.0, -14.0, 14.0, 0.4)));
        assert!(!validate_position(&stored, &rotational(16.0, 0.0, 0.0, 0.2)));
    }

    #[test]
    fn positions_parse_from_either_schema() {
        let planar: Position = serde_json::from_str(r#"{"x":0.5,"y":0.4,"scale":1.0}"#).unwrap();
        assert_eq!(planar, Position::planar(0.5, 0.4, 1.0));
        let rotational: Position =
            serde_json::from_str(r#"{"roll":1,"pitch":2,"yaw":3,"dist":0.2}"#).unwrap();
        assert_eq!(rotational, Position::rotational(1.0, 2.0, 3.0, 0.2));

        let partial: Position = serde_json::from_str(r#"{"x":0.5}"#).unwrap();
        assert!(partial.is_empty());
    }

    #[test]
    fn stored_position_with_both_field_sets_keeps_rotation() {
        let stored: Position = serde_json::from_str(
            r#"{"x":0.5,"y":0.5,"scale":1.0,"roll":0,"pitch":0,"yaw":0,"dist":0.2}"#,
        )
        .unwrap();
        assert_eq!(
            stored,
            Position::planar(0.5, 0.5, 1.0).with_rotational(0.0, 0.0, 0.0, 0.2)
        );

        let live: Position =
            serde_json::from_str(r#"{"roll":1,"pitch":1,"yaw":1,"dist":0.25}"#).unwrap();
        assert!(validate_position(&stored, &live));
        assert!(validate_position_collection(
            &profile_with(vec![stored], 0),
            Some(&live)
        ));

        let reparsed: Position =
            serde_json::from_str(&serde_json::to_string(&stored).unwrap()).unwrap();
        assert_eq!(reparsed, stored);
    }

    #[test]
    fn collection_falls_back_to_rotation_when_planar_disagrees() {
        let stored = Position::planar(0.5, 0.5, 1.0).with_rotational(0.0, 0.0, 0.0, 0.2);
        let live = Position::planar(0.9, 0.9, 1.5).with_rotational(2.0, 0.0, 0.0, 0.2);
        assert!(validate_position_collection(
            &profile_with(vec![stored], 0),
            Some(&live)
        ));
        // The fixed single-pair check lets the planar set decide.
        assert!(!validate_position(&stored, &live));
    }

    #[test]
    fn empty_positions_never_agree() {
        let stored = planar(0.5, 0.5, 1.0);
        assert!(!validate_position(&stored, &Position::default()));
        assert!(!validate_position_collection(
            &profile_with(vec![stored], 0),
            Some(&Position::default())
        ));
    }
}
