use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    motion::{FrameRange, MotionSource, StaticCamera, TrackedPoint, Vec3},
    EventSoundError, Result,
};

/// A single sampled pose of one point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: i64,
    pub position: [f64; 3],
}

/// Keyframed motion of one tracked point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTrack {
    pub id: String,
    pub keys: Vec<Keyframe>,
}

/// Camera as stored in a recording. The field of view is in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecordedCamera {
    pub position: [f64; 3],
    pub forward: [f64; 3],
    pub horizontal_fov_degrees: f64,
}

impl RecordedCamera {
    pub fn to_static(&self) -> StaticCamera {
        StaticCamera {
            position: self.position.into(),
            forward: self.forward.into(),
            horizontal_fov: self.horizontal_fov_degrees.to_radians(),
        }
    }
}

/// Motion exported from a scene: frame rate, playback range, keyframed
/// points and optionally the active camera.
///
/// Positions between keys are interpolated linearly; outside the first and
/// last key the nearest key is held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionRecording {
    pub fps: f64,
    pub frame_range: FrameRange,
    pub points: Vec<PointTrack>,
    #[serde(default)]
    pub camera: Option<RecordedCamera>,
    #[serde(skip)]
    current_frame: i64,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl MotionRecording {
    pub fn new(fps: f64, frame_range: FrameRange) -> Self {
        Self {
            fps,
            frame_range,
            points: Vec::new(),
            camera: None,
            current_frame: frame_range.start,
            index: HashMap::new(),
        }
    }

    /// Reads a recording from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut recording: MotionRecording = serde_json::from_str(text)?;
        if !(recording.fps > 0.0) {
            return Err(EventSoundError::invalid("recording fps must be positive"));
        }
        for track in &mut recording.points {
            track.keys.sort_by_key(|key| key.frame);
        }
        recording.current_frame = recording.frame_range.start;
        recording.rebuild_index();
        Ok(recording)
    }

    /// Adds a point, keeping its keys sorted by frame.
    pub fn push_point(&mut self, id: impl Into<String>, mut keys: Vec<Keyframe>) {
        keys.sort_by_key(|key| key.frame);
        self.points.push(PointTrack {
            id: id.into(),
            keys,
        });
        self.rebuild_index();
    }

    pub fn tracked_points(&self) -> Vec<TrackedPoint> {
        self.points
            .iter()
            .map(|track| TrackedPoint::new(track.id.clone()))
            .collect()
    }

    pub fn camera(&self) -> Option<StaticCamera> {
        self.camera.as_ref().map(RecordedCamera::to_static)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .points
            .iter()
            .enumerate()
            .map(|(i, track)| (track.id.clone(), i))
            .collect();
    }
}

impl MotionSource for MotionRecording {
    fn position_at(&mut self, point_id: &str, frame: i64) -> Result<Vec3> {
        let track = self
            .index
            .get(point_id)
            .and_then(|&i| self.points.get(i))
            .ok_or_else(|| EventSoundError::msg(format!("unknown tracked point `{point_id}`")))?;
        sample_keys(&track.keys, frame)
            .ok_or_else(|| EventSoundError::msg(format!("tracked point `{point_id}` has no keys")))
    }

    fn set_current_frame(&mut self, frame: i64) {
        self.current_frame = frame;
    }

    fn current_frame(&self) -> i64 {
        self.current_frame
    }
}

fn sample_keys(keys: &[Keyframe], frame: i64) -> Option<Vec3> {
    let first = keys.first()?;
    let last = keys.last()?;
    if frame <= first.frame {
        return Some(first.position.into());
    }
    if frame >= last.frame {
        return Some(last.position.into());
    }

    let next = keys.partition_point(|key| key.frame <= frame);
    let a = keys[next - 1];
    let b = keys[next];
    if a.frame == frame {
        return Some(a.position.into());
    }
    let t = (frame - a.frame) as f64 / (b.frame - a.frame) as f64;
    Some(Vec3::from(a.position).lerp(b.position.into(), t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(frame: i64, z: f64) -> Keyframe {
        Keyframe {
            frame,
            position: [0.0, 0.0, z],
        }
    }

    #[test]
    fn interpolates_between_keys_and_holds_ends() {
        let mut recording = MotionRecording::new(24.0, FrameRange::new(0, 20));
        recording.push_point("hand.L", vec![key(10, 2.0), key(0, 0.0)]);

        assert_eq!(recording.position_at("hand.L", -5).unwrap().z, 0.0);
        assert_eq!(recording.position_at("hand.L", 5).unwrap().z, 1.0);
        assert_eq!(recording.position_at("hand.L", 10).unwrap().z, 2.0);
        assert_eq!(recording.position_at("hand.L", 99).unwrap().z, 2.0);
    }

    #[test]
    fn unknown_point_is_an_error() {
        let mut recording = MotionRecording::new(24.0, FrameRange::new(0, 20));
        let err = recording.position_at("foot.R", 1).unwrap_err();
        assert!(format!("{err}").contains("foot.R"));
    }

    #[test]
    fn parses_json_document() {
        let json = r#"{
            "fps": 25.0,
            "frame_range": { "start": 1, "end": 50 },
            "points": [
                { "id": "toe", "keys": [ { "frame": 1, "position": [0, 0, 1] } ] }
            ],
            "camera": {
                "position": [0, -10, 1],
                "forward": [0, 1, 0],
                "horizontal_fov_degrees": 90
            }
        }"#;

        let recording = MotionRecording::from_json(json).unwrap();
        assert_eq!(recording.tracked_points(), vec![TrackedPoint::new("toe")]);
        assert_eq!(recording.current_frame(), 1);
        let camera = recording.camera().unwrap();
        assert!((camera.horizontal_fov - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_fps() {
        let json = r#"{ "fps": 0, "frame_range": { "start": 1, "end": 2 }, "points": [] }"#;
        assert!(matches!(
            MotionRecording::from_json(json),
            Err(EventSoundError::InvalidInput(_))
        ));
    }
}
