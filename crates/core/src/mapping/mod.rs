use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    detection::CrossingEvent,
    motion::{CameraGeometry, Vec3},
    EventSoundError, Result,
};

const MIN_HORIZONTAL_LENGTH: f64 = 1e-9;

/// Volume assigned to the slowest and fastest crossing of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeRange {
    pub at_min_speed: f64,
    pub at_max_speed: f64,
}

impl VolumeRange {
    pub fn validate(&self) -> Result<()> {
        unit_gain("volume at min speed", self.at_min_speed)?;
        unit_gain("volume at max speed", self.at_max_speed)
    }
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self {
            at_min_speed: 0.3,
            at_max_speed: 1.0,
        }
    }
}

/// Volume factor for the farthest and nearest event of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceVolume {
    pub at_near: f64,
    pub at_far: f64,
}

impl DistanceVolume {
    pub fn validate(&self) -> Result<()> {
        unit_gain("volume when near", self.at_near)?;
        unit_gain("volume when far", self.at_far)
    }
}

impl Default for DistanceVolume {
    fn default() -> Self {
        Self {
            at_near: 1.0,
            at_far: 0.2,
        }
    }
}

/// Camera geometry plus which camera-derived parameters to compute.
pub struct CameraContext<'a> {
    pub camera: &'a dyn CameraGeometry,
    pub distance: Option<DistanceVolume>,
    pub pan: bool,
}

/// Output of the mapper for one event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventParameters {
    /// Linear gain.
    pub volume: f64,
    /// -1.0 is hard left, 1.0 hard right.
    pub pan: f64,
}

/// Turns crossing speed and camera geometry into per-event volume and pan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterMapper {
    /// Scale volume by crossing speed. When off the speed factor is 1.0.
    pub speed_volume: bool,
    pub volume: VolumeRange,
    /// Fraction in [0, 1] by which each volume may be randomly lowered.
    pub randomness: f64,
}

impl Default for ParameterMapper {
    fn default() -> Self {
        Self {
            speed_volume: true,
            volume: VolumeRange::default(),
            randomness: 0.0,
        }
    }
}

impl ParameterMapper {
    pub fn new(volume: VolumeRange, randomness: f64) -> Self {
        Self {
            speed_volume: true,
            volume,
            randomness,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.randomness) {
            return Err(EventSoundError::invalid(format!(
                "randomness must lie in [0, 1], got {}",
                self.randomness
            )));
        }
        self.volume.validate()
    }

    /// Computes volume and pan for every event of one detection run.
    ///
    /// Speeds are normalised against the run's own minimum and maximum; a run
    /// without spread (one event, or identical speeds) maps every event to
    /// the fastest end of the range.
    pub fn map<R: Rng + ?Sized>(
        &self,
        events: &BTreeMap<i64, CrossingEvent>,
        camera: Option<&CameraContext<'_>>,
        rng: &mut R,
    ) -> Result<BTreeMap<i64, EventParameters>> {
        self.validate()?;
        if let Some(curve) = camera.and_then(|ctx| ctx.distance) {
            curve.validate()?;
        }

        let speeds = Spread::of(events.values().map(|event| event.speed));
        let distances = camera
            .filter(|ctx| ctx.distance.is_some())
            .map(|ctx| {
                let origin = ctx.camera.camera_position();
                Spread::of(events.values().map(|e| e.position.sub(origin).length()))
            });

        let mut mapped = BTreeMap::new();
        for (&frame, event) in events {
            let mut base = 1.0;

            if self.speed_volume {
                let normalized = speeds.normalize(event.speed);
                base *= lerp(self.volume.at_min_speed, self.volume.at_max_speed, normalized);
            }

            let mut pan = 0.0;
            if let Some(ctx) = camera {
                if let (Some(curve), Some(spread)) = (ctx.distance, distances.as_ref()) {
                    let distance = event.position.sub(ctx.camera.camera_position()).length();
                    let closeness = spread.normalize_inverted(distance);
                    base *= lerp(curve.at_far, curve.at_near, closeness);
                }
                if ctx.pan {
                    pan = pan_towards(ctx.camera, event.position);
                }
            }

            let volume = if self.randomness > 0.0 {
                let low = base * (1.0 - self.randomness);
                lerp(low, base, rng.gen::<f64>())
            } else {
                base
            };

            mapped.insert(frame, EventParameters { volume, pan });
        }

        tracing::debug!(
            events = mapped.len(),
            min_speed = speeds.min,
            max_speed = speeds.max,
            "mapped event parameters"
        );
        Ok(mapped)
    }
}

/// Free-function form of [`ParameterMapper::map`].
pub fn map_parameters<R: Rng + ?Sized>(
    events: &BTreeMap<i64, CrossingEvent>,
    volume: VolumeRange,
    randomness: f64,
    camera: Option<&CameraContext<'_>>,
    rng: &mut R,
) -> Result<BTreeMap<i64, EventParameters>> {
    ParameterMapper::new(volume, randomness).map(events, camera, rng)
}

/// Stereo pan for a sound at `target` heard through `camera`.
///
/// Uses the horizontal (XY) plane with Z up. The signed angle between the
/// camera's forward axis and the direction to the target is divided by half
/// the field of view; positive values lie to the camera's right.
pub fn pan_towards(camera: &dyn CameraGeometry, target: Vec3) -> f64 {
    let fov = camera.horizontal_fov();
    let forward = camera.camera_forward();
    let to_target = target.sub(camera.camera_position());

    if !(fov > 0.0) || !fov.is_finite() {
        return 0.0;
    }
    if forward.x.hypot(forward.y) < MIN_HORIZONTAL_LENGTH
        || to_target.x.hypot(to_target.y) < MIN_HORIZONTAL_LENGTH
    {
        return 0.0;
    }

    let cross = forward.x * to_target.y - forward.y * to_target.x;
    let dot = forward.x * to_target.x + forward.y * to_target.y;
    let angle = cross.atan2(dot);

    (-angle / (fov * 0.5)).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, Copy)]
struct Spread {
    min: f64,
    max: f64,
}

impl Spread {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Spread {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |acc, v| Spread {
                min: acc.min.min(v),
                max: acc.max.max(v),
            },
        )
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }

    /// 0.0 at the minimum, 1.0 at the maximum; 1.0 without spread.
    fn normalize(&self, value: f64) -> f64 {
        let range = self.range();
        if range > 0.0 && range.is_finite() {
            (value - self.min) / range
        } else {
            1.0
        }
    }

    /// 1.0 at the minimum, 0.0 at the maximum; 1.0 without spread.
    fn normalize_inverted(&self, value: f64) -> f64 {
        let range = self.range();
        if range > 0.0 && range.is_finite() {
            (self.max - value) / range
        } else {
            1.0
        }
    }
}

/// Gains are finite and within [0, 1], so every product of them is too.
fn unit_gain(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EventSoundError::invalid(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + t * (to - from)
}
