//! Re-expression of a scheduled event list on an external editor's
//! timeline, which has its own frame rate and start frame.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    assets::{seconds_to_frames, AssetStore},
    timeline::{schedule_tracks, AudioEvent, Interval},
    EventSoundError, Result,
};

pub mod identity;

pub use identity::{resolve_identity, CatalogEntry, MatchTier};

/// Maps frames between two timelines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMapping {
    pub source_fps: f64,
    pub source_start: i64,
    pub dest_fps: f64,
    pub dest_start: i64,
}

impl FrameMapping {
    pub fn new(source_fps: f64, source_start: i64, dest_fps: f64, dest_start: i64) -> Result<Self> {
        for (label, fps) in [("source", source_fps), ("destination", dest_fps)] {
            if !(fps > 0.0) || !fps.is_finite() {
                return Err(EventSoundError::invalid(format!(
                    "{label} frame rate must be positive, got {fps}"
                )));
            }
        }
        Ok(Self {
            source_fps,
            source_start,
            dest_fps,
            dest_start,
        })
    }

    pub fn convert(&self, source_frame: i64) -> i64 {
        convert_frame(
            source_frame,
            self.source_fps,
            self.source_start,
            self.dest_fps,
            self.dest_start,
        )
    }

    /// Destination length of an asset lasting `seconds`.
    pub fn duration_frames(&self, seconds: f64) -> i64 {
        seconds_to_frames(seconds, self.dest_fps)
    }
}

/// `dst_start + floor((frame - src_start) / src_fps * dst_fps)`.
pub fn convert_frame(
    source_frame: i64,
    source_fps: f64,
    source_start: i64,
    dest_fps: f64,
    dest_start: i64,
) -> i64 {
    let seconds = (source_frame - source_start) as f64 / source_fps;
    dest_start + (seconds * dest_fps).floor() as i64
}

/// The external editor as seen by the exporter.
pub trait DestinationTimeline {
    /// Whether the editor's scripting bridge answered.
    fn is_available(&self) -> bool;

    fn import_assets(&mut self, paths: &[PathBuf]) -> Result<Vec<CatalogEntry>>;

    fn list_catalog(&self) -> Result<Vec<CatalogEntry>>;

    fn append_clip(&mut self, entry: &CatalogEntry, frame: i64, track: u32) -> Result<()>;

    fn track_count(&self) -> u32;

    fn add_track(&mut self) -> Result<()>;

    fn frame_rate(&self) -> f64;

    fn start_frame(&self) -> i64;
}

/// A clip the exporter placed on the destination timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedClip {
    pub source_frame: i64,
    pub frame: i64,
    pub duration_frames: i64,
    pub track: u32,
    pub catalog_id: String,
    pub match_tier: MatchTier,
    pub volume: f64,
    pub pan: f64,
}

/// An event that did not make it onto the destination timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFailure {
    pub source_frame: i64,
    pub asset_path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    pub clips: Vec<ExportedClip>,
    pub failures: Vec<ExportFailure>,
    pub tracks_added: u32,
}

/// Exports scheduled events, re-running track packing in destination
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineExporter {
    pub source_fps: f64,
    pub source_start: i64,
    pub base_track: u32,
}

impl TimelineExporter {
    pub fn new(source_fps: f64, source_start: i64) -> Self {
        Self {
            source_fps,
            source_start,
            base_track: 1,
        }
    }

    /// Places `events` on `dest`.
    ///
    /// An unreachable destination, a failed import, or a failure to create
    /// tracks aborts the whole export. An asset that cannot be identified in
    /// the catalog, or a clip the destination refuses, is recorded in the
    /// report and the export carries on.
    pub fn export(
        &self,
        events: &[AudioEvent],
        dest: &mut dyn DestinationTimeline,
        assets: &mut AssetStore,
    ) -> Result<ExportReport> {
        if !dest.is_available() {
            return Err(EventSoundError::ExternalSystemUnavailable(
                "destination timeline did not respond".to_string(),
            ));
        }
        let mapping = FrameMapping::new(
            self.source_fps,
            self.source_start,
            dest.frame_rate(),
            dest.start_frame(),
        )?;

        let intervals: Vec<Interval> = events
            .iter()
            .map(|event| {
                let seconds = assets.duration_seconds(&event.asset_path);
                Interval::new(mapping.convert(event.frame), mapping.duration_frames(seconds))
            })
            .collect();
        let tracks = schedule_tracks(&intervals, self.base_track);

        let mut report = ExportReport::default();
        if events.is_empty() {
            return Ok(report);
        }

        let unique = unique_paths(events);
        dest.import_assets(&unique).map_err(|err| {
            EventSoundError::ExternalSystemUnavailable(format!("asset import failed: {err}"))
        })?;
        let catalog = dest.list_catalog()?;

        let mut identities: HashMap<&Path, std::result::Result<(CatalogEntry, MatchTier), String>> =
            HashMap::new();
        for path in &unique {
            let resolved = resolve_identity(path, &catalog)
                .map(|(entry, tier)| (entry.clone(), tier))
                .map_err(|err| err.to_string());
            if let Err(reason) = &resolved {
                tracing::warn!(
                    path = %path.display(),
                    %reason,
                    "asset not found in destination catalog"
                );
            }
            identities.insert(path.as_path(), resolved);
        }

        let needed = tracks.iter().copied().max().unwrap_or(self.base_track);
        while dest.track_count() < needed {
            dest.add_track()?;
            report.tracks_added += 1;
        }

        for ((event, interval), track) in events.iter().zip(&intervals).zip(&tracks) {
            let identity = identities
                .get(event.asset_path.as_path())
                .cloned()
                .unwrap_or_else(|| Err("asset was not imported".to_string()));

            let outcome = identity.and_then(|(entry, tier)| {
                dest.append_clip(&entry, interval.start, *track)
                    .map(|_| (entry, tier))
                    .map_err(|err| err.to_string())
            });

            match outcome {
                Ok((entry, match_tier)) => report.clips.push(ExportedClip {
                    source_frame: event.frame,
                    frame: interval.start,
                    duration_frames: interval.duration,
                    track: *track,
                    catalog_id: entry.id,
                    match_tier,
                    volume: event.volume,
                    pan: event.pan,
                }),
                Err(reason) => {
                    tracing::warn!(frame = event.frame, %reason, "could not export sound event");
                    report.failures.push(ExportFailure {
                        source_frame: event.frame,
                        asset_path: event.asset_path.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            exported = report.clips.len(),
            failed = report.failures.len(),
            tracks_added = report.tracks_added,
            "exported sound events"
        );
        Ok(report)
    }
}

fn unique_paths(events: &[AudioEvent]) -> Vec<PathBuf> {
    let mut seen = Vec::new();
    for event in events {
        if !seen.contains(&event.asset_path) {
            seen.push(event.asset_path.clone());
        }
    }
    seen
}

/// A clip sitting on a [`MemoryDestination`] track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationClip {
    pub catalog_id: String,
    pub frame: i64,
    pub track: u32,
}

/// In-process destination timeline, serialisable as an edit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryDestination {
    pub fps: f64,
    pub start_frame: i64,
    pub tracks: u32,
    pub catalog: Vec<CatalogEntry>,
    pub clips: Vec<DestinationClip>,
    #[serde(skip)]
    pub offline: bool,
}

impl MemoryDestination {
    pub fn new(fps: f64, start_frame: i64) -> Self {
        Self {
            fps,
            start_frame,
            tracks: 1,
            catalog: Vec::new(),
            clips: Vec::new(),
            offline: false,
        }
    }
}

impl DestinationTimeline for MemoryDestination {
    fn is_available(&self) -> bool {
        !self.offline
    }

    fn import_assets(&mut self, paths: &[PathBuf]) -> Result<Vec<CatalogEntry>> {
        let mut imported = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            let existing = self
                .catalog
                .iter()
                .find(|entry| entry.path.as_ref() == Some(&resolved));
            if let Some(existing) = existing {
                imported.push(existing.clone());
                continue;
            }
            let entry = CatalogEntry {
                id: format!("media-{}", self.catalog.len() + 1),
                name: resolved
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: Some(resolved),
            };
            self.catalog.push(entry.clone());
            imported.push(entry);
        }
        Ok(imported)
    }

    fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.catalog.clone())
    }

    fn append_clip(&mut self, entry: &CatalogEntry, frame: i64, track: u32) -> Result<()> {
        if track == 0 || track > self.tracks {
            return Err(EventSoundError::msg(format!("track {track} does not exist")));
        }
        if !self.catalog.iter().any(|e| e.id == entry.id) {
            return Err(EventSoundError::msg(format!("unknown media `{}`", entry.id)));
        }
        self.clips.push(DestinationClip {
            catalog_id: entry.id.clone(),
            frame,
            track,
        });
        Ok(())
    }

    fn track_count(&self) -> u32 {
        self.tracks
    }

    fn add_track(&mut self) -> Result<()> {
        self.tracks += 1;
        Ok(())
    }

    fn frame_rate(&self) -> f64 {
        self.fps
    }

    fn start_frame(&self) -> i64 {
        self.start_frame
    }
}
