use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    motion::{Axis, CursorGuard, FrameRange, MotionSource, TrackedPoint, Vec3},
    Result,
};

/// Which threshold transitions count as a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Rising through the threshold.
    Up,
    /// Falling through the threshold.
    Down,
    #[default]
    Both,
}

impl Direction {
    /// Tests the transition `prev -> current` against `threshold`.
    pub fn crosses(self, prev: f64, current: f64, threshold: f64) -> bool {
        let up = prev < threshold && current >= threshold;
        let down = prev > threshold && current <= threshold;
        match self {
            Direction::Up => up,
            Direction::Down => down,
            Direction::Both => up || down,
        }
    }
}

/// The fastest threshold crossing recorded for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub frame: i64,
    pub source_id: String,
    pub speed: f64,
    /// World position of the source at `frame`.
    pub position: Vec3,
}

/// Crossing detection settings for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossingDetector {
    pub direction: Direction,
    pub threshold: f64,
    pub axis: Axis,
}

impl Default for CrossingDetector {
    fn default() -> Self {
        Self {
            direction: Direction::Both,
            threshold: 0.0,
            axis: Axis::Z,
        }
    }
}

impl CrossingDetector {
    pub fn new(direction: Direction, threshold: f64) -> Self {
        Self {
            direction,
            threshold,
            ..Default::default()
        }
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    /// Scans `range` frame by frame and keeps, for every frame, the crossing
    /// with the highest speed. Every point is sampled exactly once per frame
    /// and the host cursor is restored afterwards, also when sampling fails.
    pub fn detect<S: MotionSource>(
        &self,
        source: S,
        range: FrameRange,
        points: &[TrackedPoint],
    ) -> Result<BTreeMap<i64, CrossingEvent>> {
        let mut events = BTreeMap::new();

        if range.is_empty() {
            tracing::warn!(
                start = range.start,
                end = range.end,
                "frame range is empty, no crossings detected"
            );
            return Ok(events);
        }
        if points.is_empty() {
            tracing::debug!("no tracked points, skipping crossing scan");
            return Ok(events);
        }

        let mut source = CursorGuard::new(source);
        let mut previous: HashMap<&str, f64> = HashMap::with_capacity(points.len());

        for frame in range.frames() {
            source.set_current_frame(frame);

            for point in points {
                let position = source.position_at(&point.id, frame)?;
                let current = position.component(self.axis);

                if let Some(&prev) = previous.get(point.id.as_str()) {
                    if self.direction.crosses(prev, current, self.threshold) {
                        let speed = (current - prev).abs();
                        record_fastest(&mut events, frame, &point.id, speed, position);
                    }
                }

                previous.insert(point.id.as_str(), current);
            }
        }

        tracing::debug!(
            frames = range.len(),
            points = points.len(),
            events = events.len(),
            "crossing scan finished"
        );
        Ok(events)
    }
}

fn record_fastest(
    events: &mut BTreeMap<i64, CrossingEvent>,
    frame: i64,
    source_id: &str,
    speed: f64,
    position: Vec3,
) {
    let replace = events
        .get(&frame)
        .map(|existing| speed > existing.speed)
        .unwrap_or(true);

    if replace {
        events.insert(
            frame,
            CrossingEvent {
                frame,
                source_id: source_id.to_string(),
                speed,
                position,
            },
        );
    }
}

/// Free-function form of [`CrossingDetector::detect`] on the Z axis.
pub fn detect_crossings<S: MotionSource>(
    source: S,
    range: FrameRange,
    points: &[TrackedPoint],
    direction: Direction,
    threshold: f64,
) -> Result<BTreeMap<i64, CrossingEvent>> {
    CrossingDetector::new(direction, threshold).detect(source, range, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventSoundError;
    use proptest::prelude::*;

    /// Motion table indexed by `frame - first_frame`, counting every sample.
    struct Table {
        first_frame: i64,
        points: Vec<(String, Vec<f64>)>,
        cursor: i64,
        samples: usize,
    }

    impl Table {
        fn new(first_frame: i64, points: &[(&str, &[f64])]) -> Self {
            Self {
                first_frame,
                points: points
                    .iter()
                    .map(|(id, zs)| (id.to_string(), zs.to_vec()))
                    .collect(),
                cursor: -100,
                samples: 0,
            }
        }

        fn tracked(&self) -> Vec<TrackedPoint> {
            self.points
                .iter()
                .map(|(id, _)| TrackedPoint::new(id.clone()))
                .collect()
        }
    }

    impl MotionSource for Table {
        fn position_at(&mut self, point_id: &str, frame: i64) -> Result<Vec3> {
            assert_eq!(self.cursor, frame, "cursor must follow the scan");
            self.samples += 1;
            let (_, zs) = self
                .points
                .iter()
                .find(|(id, _)| id == point_id)
                .ok_or_else(|| EventSoundError::msg("unknown point"))?;
            let z = zs
                .get((frame - self.first_frame) as usize)
                .copied()
                .ok_or_else(|| EventSoundError::msg("frame out of table"))?;
            Ok(Vec3::new(0.0, 0.0, z))
        }

        fn set_current_frame(&mut self, frame: i64) {
            self.cursor = frame;
        }

        fn current_frame(&self) -> i64 {
            self.cursor
        }
    }

    #[test]
    fn detects_both_directions() {
        let mut table = Table::new(0, &[("P", &[-1.0, -0.5, 0.5, 1.0, -1.0, -0.5])]);
        let points = table.tracked();
        let events =
            detect_crossings(&mut table, FrameRange::new(0, 5), &points, Direction::Both, 0.0)
                .unwrap();

        assert_eq!(events.keys().copied().collect::<Vec<_>>(), vec![2, 4]);
        assert!((events[&2].speed - 1.0).abs() < 1e-12);
        assert!((events[&4].speed - 2.0).abs() < 1e-12);
        assert_eq!(events[&2].source_id, "P");
        assert_eq!(table.cursor, -100);
        assert_eq!(table.samples, 6);
    }

    #[test]
    fn filters_by_direction() {
        let zs: &[f64] = &[-1.0, -0.5, 0.5, 1.0, -1.0, -0.5];
        let mut table = Table::new(0, &[("P", zs)]);
        let points = table.tracked();

        let up = detect_crossings(&mut table, FrameRange::new(0, 5), &points, Direction::Up, 0.0)
            .unwrap();
        assert_eq!(up.keys().copied().collect::<Vec<_>>(), vec![2]);

        let down =
            detect_crossings(&mut table, FrameRange::new(0, 5), &points, Direction::Down, 0.0)
                .unwrap();
        assert_eq!(down.keys().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn landing_exactly_on_threshold_counts() {
        let mut table = Table::new(0, &[("P", &[1.0, 0.0, 0.0, -1.0])]);
        let points = table.tracked();
        let events =
            detect_crossings(&mut table, FrameRange::new(0, 3), &points, Direction::Both, 0.0)
                .unwrap();
        // 0.0 -> -1.0 starts at the threshold, so it is not a crossing.
        assert_eq!(events.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn keeps_fastest_point_per_frame() {
        let mut table = Table::new(
            10,
            &[
                ("slow", &[-0.1, 0.1]),
                ("fast", &[-2.0, 3.0]),
                ("tie", &[-4.0, 1.0]),
            ],
        );
        let points = table.tracked();
        let events =
            detect_crossings(&mut table, FrameRange::new(10, 11), &points, Direction::Up, 0.0)
                .unwrap();

        assert_eq!(events.len(), 1);
        // `fast` and `tie` both move 5.0; the first one seen stays.
        assert_eq!(events[&11].source_id, "fast");
        assert!((events[&11].speed - 5.0).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_yield_empty_results() {
        let mut table = Table::new(0, &[("P", &[-1.0, 1.0])]);
        let points = table.tracked();

        let reversed =
            detect_crossings(&mut table, FrameRange::new(5, 0), &points, Direction::Both, 0.0)
                .unwrap();
        assert!(reversed.is_empty());

        let none =
            detect_crossings(&mut table, FrameRange::new(0, 1), &[], Direction::Both, 0.0).unwrap();
        assert!(none.is_empty());
        assert_eq!(table.samples, 0);
    }

    #[test]
    fn single_frame_never_crosses() {
        let mut table = Table::new(3, &[("P", &[5.0])]);
        let points = table.tracked();
        let events =
            detect_crossings(&mut table, FrameRange::new(3, 3), &points, Direction::Both, 0.0)
                .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn restores_cursor_when_sampling_fails() {
        let mut table = Table::new(0, &[("P", &[-1.0, 1.0])]);
        let points = table.tracked();
        let result =
            detect_crossings(&mut table, FrameRange::new(0, 4), &points, Direction::Both, 0.0);

        assert!(result.is_err());
        assert_eq!(table.cursor, -100);
    }

    #[test]
    fn honours_configured_axis() {
        struct Sideways(i64);
        impl MotionSource for Sideways {
            fn position_at(&mut self, _point_id: &str, frame: i64) -> Result<Vec3> {
                Ok(Vec3::new(frame as f64 - 1.5, 0.0, 0.0))
            }
            fn set_current_frame(&mut self, frame: i64) {
                self.0 = frame;
            }
            fn current_frame(&self) -> i64 {
                self.0
            }
        }

        let points = vec![TrackedPoint::new("bone")];
        let detector = CrossingDetector::new(Direction::Up, 0.0);
        let on_z = detector
            .detect(Sideways(0), FrameRange::new(0, 3), &points)
            .unwrap();
        assert!(on_z.is_empty());

        let on_x = detector
            .with_axis(Axis::X)
            .detect(Sideways(0), FrameRange::new(0, 3), &points)
            .unwrap();
        assert_eq!(on_x.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    proptest! {
        #[test]
        fn first_sampled_frame_never_emits(
            start in -50i64..50,
            zs in proptest::collection::vec(-3.0f64..3.0, 1..40),
            threshold in -1.0f64..1.0,
        ) {
            let mut table = Table::new(start, &[("P", zs.as_slice())]);
            let points = table.tracked();
            let end = start + zs.len() as i64 - 1;
            let events = detect_crossings(
                &mut table,
                FrameRange::new(start, end),
                &points,
                Direction::Both,
                threshold,
            )
            .unwrap();

            prop_assert!(!events.contains_key(&start));
            for (frame, event) in &events {
                prop_assert_eq!(*frame, event.frame);
                prop_assert!(event.speed >= 0.0);
            }
        }
    }
}
