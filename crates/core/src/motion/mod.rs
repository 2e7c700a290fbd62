//! Sampling seam between the engine and whatever owns the animated scene.
//!
//! The engine never stores positions; it asks a [`MotionSource`] for one
//! point at one frame and keeps only the previous sample per point. Hosts
//! that evaluate animation through a global playback cursor get that cursor
//! moved for every scanned frame and restored by [`CursorGuard`].

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::{EventSoundError, Result};

/// World-space position or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        Vec3::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Component along `axis`.
    pub fn component(self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(value: [f64; 3]) -> Self {
        Vec3::new(value[0], value[1], value[2])
    }
}

/// World axis compared against the crossing threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

/// Inclusive frame range `[start, end]`. A range with `start > end` is
/// empty rather than reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: i64,
    pub end: i64,
}

impl FrameRange {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Builds a range, rejecting `start > end`.
    pub fn try_new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(EventSoundError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = i64> {
        self.start..=self.end
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self::new(1, 250)
    }
}

/// A point whose motion drives sound events, such as an armature bone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedPoint {
    pub id: String,
}

impl TrackedPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Position feed for tracked points.
pub trait MotionSource {
    /// World-space position of `point_id` at `frame`.
    fn position_at(&mut self, point_id: &str, frame: i64) -> Result<Vec3>;

    /// Moves the host playback cursor.
    fn set_current_frame(&mut self, frame: i64);

    fn current_frame(&self) -> i64;
}

impl<T: MotionSource + ?Sized> MotionSource for &mut T {
    fn position_at(&mut self, point_id: &str, frame: i64) -> Result<Vec3> {
        (**self).position_at(point_id, frame)
    }

    fn set_current_frame(&mut self, frame: i64) {
        (**self).set_current_frame(frame)
    }

    fn current_frame(&self) -> i64 {
        (**self).current_frame()
    }
}

/// Camera placement used for distance attenuation and stereo panning.
pub trait CameraGeometry {
    fn camera_position(&self) -> Vec3;

    /// Direction the camera looks along. Need not be normalised.
    fn camera_forward(&self) -> Vec3;

    /// Horizontal field of view in radians.
    fn horizontal_fov(&self) -> f64;
}

/// Fixed camera description, handy when the host camera is not animated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticCamera {
    pub position: Vec3,
    pub forward: Vec3,
    pub horizontal_fov: f64,
}

impl CameraGeometry for StaticCamera {
    fn camera_position(&self) -> Vec3 {
        self.position
    }

    fn camera_forward(&self) -> Vec3 {
        self.forward
    }

    fn horizontal_fov(&self) -> f64 {
        self.horizontal_fov
    }
}

/// Remembers the host cursor on creation and puts it back when dropped,
/// including on early returns through `?`.
pub struct CursorGuard<S: MotionSource> {
    source: S,
    original: i64,
}

impl<S: MotionSource> CursorGuard<S> {
    pub fn new(source: S) -> Self {
        let original = source.current_frame();
        Self { source, original }
    }
}

impl<S: MotionSource> Deref for CursorGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: MotionSource> DerefMut for CursorGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: MotionSource> Drop for CursorGuard<S> {
    fn drop(&mut self) {
        self.source.set_current_frame(self.original);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cursor {
        frame: i64,
    }

    impl MotionSource for Cursor {
        fn position_at(&mut self, point_id: &str, _frame: i64) -> Result<Vec3> {
            Err(EventSoundError::msg(format!("no point `{point_id}`")))
        }

        fn set_current_frame(&mut self, frame: i64) {
            self.frame = frame;
        }

        fn current_frame(&self) -> i64 {
            self.frame
        }
    }

    fn failing_scan(source: &mut Cursor) -> Result<()> {
        let mut guard = CursorGuard::new(&mut *source);
        guard.set_current_frame(40);
        guard.position_at("missing", 40)?;
        Ok(())
    }

    #[test]
    fn guard_restores_cursor_on_error() {
        let mut cursor = Cursor { frame: 7 };
        assert!(failing_scan(&mut cursor).is_err());
        assert_eq!(cursor.frame, 7);
    }

    #[test]
    fn reversed_range_is_empty() {
        let range = FrameRange::new(10, 3);
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert_eq!(range.frames().count(), 0);
        assert!(matches!(
            FrameRange::try_new(10, 3),
            Err(EventSoundError::InvalidRange { start: 10, end: 3 })
        ));
    }

    #[test]
    fn selects_axis_component() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.component(Axis::X), 1.0);
        assert_eq!(v.component(Axis::Z), 3.0);
        assert_eq!(v.lerp(Vec3::default(), 0.5), Vec3::new(0.5, 1.0, 1.5));
    }
}
