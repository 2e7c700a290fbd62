use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{assets::AssetStore, timeline::AudioEvent, EventSoundError, Result};

/// Sequencer API generation exposed by the host.
///
/// Older hosts keep sound clips in a `sequences` collection, newer ones in
/// `strips`. The variant is chosen once, when the writer is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostApi {
    Sequences,
    Strips,
}

/// What the host reports it supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub strips: bool,
    pub sequences: bool,
}

impl HostApi {
    /// Prefers the newer API when both are present.
    pub fn detect(capabilities: HostCapabilities) -> Result<Self> {
        if capabilities.strips {
            Ok(HostApi::Strips)
        } else if capabilities.sequences {
            Ok(HostApi::Sequences)
        } else {
            Err(EventSoundError::msg("host exposes no API to add sound clips"))
        }
    }

    pub fn collection_name(self) -> &'static str {
        match self {
            HostApi::Sequences => "sequences",
            HostApi::Strips => "strips",
        }
    }
}

/// A sound clip as it sits on the local timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedClip {
    pub name: String,
    pub path: PathBuf,
    pub channel: u32,
    pub frame_start: i64,
    /// Exclusive end frame.
    pub frame_end: i64,
}

/// The host's sequencer as seen by the engine.
pub trait LocalTimeline {
    fn add_sound_clip(
        &mut self,
        name: &str,
        path: &Path,
        channel: u32,
        frame_start: i64,
    ) -> Result<PlacedClip>;

    fn list_clips(&self) -> Vec<PlacedClip>;

    fn current_frame(&self) -> i64;

    /// Length in frames that a clip of `path` will occupy once added.
    fn clip_length(&mut self, path: &Path) -> i64;

    /// One above the highest occupied channel, or 1 on an empty timeline.
    fn next_free_channel(&self) -> u32 {
        self.list_clips()
            .iter()
            .map(|clip| clip.channel)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }
}

/// In-process sequencer that sizes clips from asset durations.
#[derive(Debug)]
pub struct MemoryTimeline {
    api: HostApi,
    fps: f64,
    current_frame: i64,
    clips: Vec<PlacedClip>,
    assets: AssetStore,
}

impl MemoryTimeline {
    pub fn new(api: HostApi, fps: f64, current_frame: i64) -> Self {
        Self::with_assets(api, fps, current_frame, AssetStore::new())
    }

    pub fn with_assets(api: HostApi, fps: f64, current_frame: i64, assets: AssetStore) -> Self {
        Self {
            api,
            fps,
            current_frame,
            clips: Vec::new(),
            assets,
        }
    }

    pub fn set_current_frame(&mut self, frame: i64) {
        self.current_frame = frame;
    }

    pub fn clips(&self) -> &[PlacedClip] {
        &self.clips
    }

    /// Edit list keyed by the host API's collection name.
    pub fn to_json(&self) -> Result<Value> {
        let mut doc = json!({
            "api": self.api,
            "fps": self.fps,
        });
        doc[self.api.collection_name()] = serde_json::to_value(&self.clips)?;
        Ok(doc)
    }
}

impl LocalTimeline for MemoryTimeline {
    fn add_sound_clip(
        &mut self,
        name: &str,
        path: &Path,
        channel: u32,
        frame_start: i64,
    ) -> Result<PlacedClip> {
        if channel == 0 {
            return Err(EventSoundError::invalid("channels start at 1"));
        }
        let length = self.clip_length(path);
        let clip = PlacedClip {
            name: name.to_string(),
            path: path.to_path_buf(),
            channel,
            frame_start,
            frame_end: frame_start + length,
        };
        self.clips.push(clip.clone());
        Ok(clip)
    }

    fn list_clips(&self) -> Vec<PlacedClip> {
        self.clips.clone()
    }

    fn current_frame(&self) -> i64 {
        self.current_frame
    }

    fn clip_length(&mut self, path: &Path) -> i64 {
        self.assets.duration_frames(path, self.fps)
    }
}

/// A local placement that the host refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub frame: i64,
    pub track: u32,
    pub reason: String,
}

/// Outcome of writing scheduled events to a timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    pub placed: Vec<PlacedClip>,
    pub failures: Vec<PlacementFailure>,
}

impl PlacementReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes events onto their assigned channels. A clip the host rejects, or
/// one whose length differs from its scheduled duration, is logged and
/// recorded; the remaining events are still placed.
pub fn place_events(
    timeline: &mut dyn LocalTimeline,
    events: &[AudioEvent],
    name_prefix: &str,
) -> PlacementReport {
    let mut report = PlacementReport::default();

    for (index, event) in events.iter().enumerate() {
        let name = format!("{name_prefix}_{:03}", index + 1);
        match timeline.add_sound_clip(&name, &event.asset_path, event.track, event.frame) {
            Ok(clip) => {
                let length = clip.frame_end - clip.frame_start;
                if length != event.duration_frames {
                    tracing::warn!(
                        frame = event.frame,
                        track = event.track,
                        scheduled = event.duration_frames,
                        placed = length,
                        "sound clip length differs from its schedule"
                    );
                    report.failures.push(PlacementFailure {
                        frame: event.frame,
                        track: event.track,
                        reason: format!(
                            "clip spans {length} frames but {} were scheduled",
                            event.duration_frames
                        ),
                    });
                }
                report.placed.push(clip);
            }
            Err(err) => {
                tracing::warn!(
                    frame = event.frame,
                    track = event.track,
                    %err,
                    "failed to place sound clip"
                );
                report.failures.push(PlacementFailure {
                    frame: event.frame,
                    track: event.track,
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        placed = report.placed.len(),
        failed = report.failures.len(),
        "placed sound events on local timeline"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(frame: i64, track: u32) -> AudioEvent {
        AudioEvent {
            frame,
            duration_frames: 24,
            source_id: "hand.R".to_string(),
            asset_path: PathBuf::from("snap.ogg"),
            volume: 1.0,
            pan: 0.0,
            track,
        }
    }

    #[test]
    fn detects_api_generation() {
        let both = HostCapabilities {
            strips: true,
            sequences: true,
        };
        assert_eq!(HostApi::detect(both).unwrap(), HostApi::Strips);

        let legacy = HostCapabilities {
            strips: false,
            sequences: true,
        };
        assert_eq!(HostApi::detect(legacy).unwrap(), HostApi::Sequences);
        assert!(HostApi::detect(HostCapabilities::default()).is_err());
    }

    #[test]
    fn next_free_channel_is_above_highest() {
        let mut timeline = MemoryTimeline::new(HostApi::Strips, 24.0, 1);
        assert_eq!(timeline.next_free_channel(), 1);

        timeline
            .add_sound_clip("a", Path::new("a.ogg"), 4, 1)
            .unwrap();
        timeline
            .add_sound_clip("b", Path::new("b.ogg"), 2, 1)
            .unwrap();
        assert_eq!(timeline.next_free_channel(), 5);
    }

    #[test]
    fn places_events_and_reports_failures() {
        let mut timeline = MemoryTimeline::new(HostApi::Sequences, 24.0, 1);
        let events = [event(10, 1), event(20, 0), event(30, 2)];
        let report = place_events(&mut timeline, &events, "Event");

        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].frame, 20);
        assert!(!report.is_complete());
        assert_eq!(report.placed[0].name, "Event_001");
        assert_eq!(report.placed[1].name, "Event_003");
        // Unknown compressed duration falls back to one second.
        assert_eq!(report.placed[0].frame_end, 34);
    }

    #[test]
    fn length_mismatch_is_reported() {
        let mut timeline = MemoryTimeline::new(HostApi::Strips, 24.0, 1);
        let mut short = event(10, 1);
        short.duration_frames = 12;
        let report = place_events(&mut timeline, &[short, event(40, 1)], "Event");

        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].frame, 10);
        assert!(!report.is_complete());
    }

    #[test]
    fn edit_list_uses_api_collection_name() {
        let mut timeline = MemoryTimeline::new(HostApi::Sequences, 25.0, 1);
        timeline
            .add_sound_clip("a", Path::new("a.ogg"), 1, 5)
            .unwrap();

        let doc = timeline.to_json().unwrap();
        assert_eq!(doc["api"], "sequences");
        assert_eq!(doc["sequences"][0]["frame_start"], 5);
        assert!(doc.get("strips").is_none());
    }
}
