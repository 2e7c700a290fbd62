//! Track packing and the events that get packed.
//!
//! [`schedule_tracks`] knows nothing about frame rates or host channels: it
//! packs half-open `[start, start + duration)` intervals onto numbered lanes.
//! The local writer and the external exporter both feed it intervals in
//! their own frame coordinates.

use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};

pub mod local;
pub mod plans;

pub use local::{
    place_events, HostApi, HostCapabilities, LocalTimeline, MemoryTimeline, PlacedClip,
    PlacementFailure, PlacementReport,
};
pub use plans::{insert_sequential, plan_strip_duplicates, StripSpan};

/// Half-open frame interval `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub duration: i64,
}

impl Interval {
    pub const fn new(start: i64, duration: i64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> i64 {
        self.start + self.duration
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// Greedy lane assignment for a batch of intervals.
///
/// Items are visited in start order (stable for equal starts) and each goes
/// onto the lowest lane at or above `base_track` where it overlaps nothing
/// already placed. Lanes are unbounded. The returned lanes follow the input
/// order.
pub fn schedule_tracks(items: &[Interval], base_track: u32) -> Vec<u32> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&index| items[index].start);

    let mut lanes: HashMap<u32, Vec<Interval>> = HashMap::new();
    let mut assigned = vec![base_track; items.len()];

    for index in order {
        let item = items[index];
        let mut track = base_track;
        loop {
            let placed = lanes.entry(track).or_default();
            if !placed.iter().any(|other| other.overlaps(&item)) {
                placed.push(item);
                assigned[index] = track;
                break;
            }
            track += 1;
        }
    }

    assigned
}

/// A sound event that has not been given a track yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEvent {
    pub frame: i64,
    pub duration_frames: i64,
    pub source_id: String,
    pub asset_path: PathBuf,
    pub volume: f64,
    pub pan: f64,
}

impl PendingEvent {
    pub fn interval(&self) -> Interval {
        Interval::new(self.frame, self.duration_frames)
    }
}

/// A sound event with its track, ready for a timeline writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEvent {
    pub frame: i64,
    pub duration_frames: i64,
    pub source_id: String,
    pub asset_path: PathBuf,
    pub volume: f64,
    pub pan: f64,
    pub track: u32,
}

impl AudioEvent {
    pub fn interval(&self) -> Interval {
        Interval::new(self.frame, self.duration_frames)
    }
}

/// Assigns every pending event a track at or above `base_track`, keeping
/// the input order.
pub fn assign_tracks(events: Vec<PendingEvent>, base_track: u32) -> Vec<AudioEvent> {
    let intervals: Vec<Interval> = events.iter().map(PendingEvent::interval).collect();
    let tracks = schedule_tracks(&intervals, base_track);

    events
        .into_iter()
        .zip(tracks)
        .map(|(event, track)| AudioEvent {
            frame: event.frame,
            duration_frames: event.duration_frames,
            source_id: event.source_id,
            asset_path: event.asset_path,
            volume: event.volume,
            pan: event.pan,
            track,
        })
        .collect()
}
