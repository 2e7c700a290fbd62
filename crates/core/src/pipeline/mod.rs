use std::path::Path;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    assets::AssetStore,
    config::EventSoundsConfig,
    mapping::CameraContext,
    motion::{CameraGeometry, FrameRange, MotionSource, TrackedPoint},
    selection::verify_assets,
    timeline::{
        assign_tracks, place_events, AudioEvent, LocalTimeline, PendingEvent, PlacementReport,
    },
    EventSoundError, Result,
};

/// Scene facts the engine needs besides the motion itself.
#[derive(Clone, Copy)]
pub struct SceneContext<'a> {
    pub fps: f64,
    /// Playback range, used unless the configuration overrides it.
    pub frame_range: FrameRange,
    /// Every point the source can sample.
    pub available_points: &'a [TrackedPoint],
    pub camera: Option<&'a dyn CameraGeometry>,
}

/// Runs detection, parameter mapping, sound selection and track packing
/// with one configuration and one random source.
#[derive(Debug)]
pub struct EventSoundEngine {
    config: EventSoundsConfig,
    rng: StdRng,
}

impl EventSoundEngine {
    pub fn new(config: EventSoundsConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &EventSoundsConfig {
        &self.config
    }

    /// Asset registry preloaded with the configured durations.
    pub fn asset_store(&self) -> AssetStore {
        let mut store = AssetStore::new();
        for (path, seconds) in &self.config.schedule.declared_durations {
            store.declare_duration(path.clone(), *seconds);
        }
        store
    }

    /// Produces scheduled sound events, tracks starting at `base_track`.
    /// Clip lengths come from `assets` at the scene frame rate.
    pub fn run<S: MotionSource>(
        &mut self,
        source: S,
        scene: SceneContext<'_>,
        base_track: u32,
        assets: &mut AssetStore,
    ) -> Result<Vec<AudioEvent>> {
        let fps = scene.fps;
        self.schedule(source, scene, base_track, &mut |path: &Path| {
            assets.duration_frames(path, fps)
        })
    }

    /// Runs against a local timeline and writes the result onto it. Tracks
    /// start at the configured base, or above every existing clip. Clip
    /// lengths are the ones the timeline itself will give each clip.
    pub fn run_on_timeline<S: MotionSource>(
        &mut self,
        source: S,
        scene: SceneContext<'_>,
        timeline: &mut dyn LocalTimeline,
    ) -> Result<(Vec<AudioEvent>, PlacementReport)> {
        let base_track = self
            .config
            .schedule
            .base_track
            .unwrap_or_else(|| timeline.next_free_channel());
        let events = self.schedule(source, scene, base_track, &mut |path: &Path| {
            timeline.clip_length(path)
        })?;
        let report = place_events(timeline, &events, &self.config.schedule.clip_prefix);
        Ok((events, report))
    }

    fn schedule<S: MotionSource>(
        &mut self,
        source: S,
        scene: SceneContext<'_>,
        base_track: u32,
        clip_length: &mut dyn FnMut(&Path) -> i64,
    ) -> Result<Vec<AudioEvent>> {
        if !(scene.fps > 0.0) {
            return Err(EventSoundError::invalid("scene frame rate must be positive"));
        }
        if base_track == 0 {
            return Err(EventSoundError::invalid("base track must be at least 1"));
        }

        verify_assets(self.config.selection.assets())?;
        let points = self.resolve_points(scene.available_points)?;
        let range = self.config.detection.frame_range.unwrap_or(scene.frame_range);
        let crossings = self.config.detection.detector.detect(source, range, &points)?;
        if crossings.is_empty() {
            tracing::info!(start = range.start, end = range.end, "no crossings detected");
        }

        let camera = scene.camera.map(|camera| CameraContext {
            camera,
            distance: self.config.mapping.distance,
            pan: self.config.mapping.pan,
        });
        let parameters = self
            .config
            .mapping
            .mapper
            .map(&crossings, camera.as_ref(), &mut self.rng)?;
        let picks = self
            .config
            .selection
            .select(crossings.keys().copied(), &mut self.rng)?;

        let mut pending = Vec::with_capacity(crossings.len());
        for (frame, crossing) in &crossings {
            let (Some(params), Some(asset)) = (parameters.get(frame), picks.get(frame)) else {
                tracing::warn!(frame, "crossing without parameters or sound, skipped");
                continue;
            };
            pending.push(PendingEvent {
                frame: *frame,
                duration_frames: clip_length(asset),
                source_id: crossing.source_id.clone(),
                asset_path: asset.clone(),
                volume: params.volume,
                pan: params.pan,
            });
        }

        let events = assign_tracks(pending, base_track);
        let tracks_used = events.iter().map(|e| e.track).max().map(|top| top - base_track + 1);
        tracing::info!(
            events = events.len(),
            tracks = tracks_used.unwrap_or(0),
            base_track,
            "scheduled sound events"
        );
        Ok(events)
    }

    fn resolve_points(&self, available: &[TrackedPoint]) -> Result<Vec<TrackedPoint>> {
        let wanted = &self.config.detection.points;
        if wanted.is_empty() {
            return Ok(available.to_vec());
        }
        if available.is_empty() {
            return Ok(wanted.iter().map(TrackedPoint::new).collect());
        }

        let mut points = Vec::with_capacity(wanted.len());
        for id in wanted {
            if available.iter().any(|point| &point.id == id) {
                points.push(TrackedPoint::new(id.clone()));
            } else {
                tracing::warn!(point = %id, "configured point not found, ignoring it");
            }
        }
        if points.is_empty() {
            return Err(EventSoundError::invalid(
                "none of the configured tracked points exist",
            ));
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection::Direction,
        motion::StaticCamera,
        record::{Keyframe, MotionRecording},
        selection::SoundSource,
        timeline::{HostApi, MemoryTimeline, PlacedClip},
        Vec3,
    };
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn key(frame: i64, z: f64) -> Keyframe {
        Keyframe {
            frame,
            position: [1.0, 5.0, z],
        }
    }

    /// Two feet stepping through the floor plane.
    fn walk() -> MotionRecording {
        let mut recording = MotionRecording::new(24.0, FrameRange::new(1, 40));
        recording.push_point(
            "foot.L",
            vec![key(1, 1.0), key(5, -1.0), key(15, 1.0), key(19, -1.0)],
        );
        recording.push_point("foot.R", vec![key(1, 1.0), key(8, 1.0), key(10, -3.0)]);
        recording
    }

    fn scene(points: &[TrackedPoint]) -> SceneContext<'_> {
        SceneContext {
            fps: 24.0,
            frame_range: FrameRange::new(1, 40),
            available_points: points,
            camera: None,
        }
    }

    /// Two step sounds on disk, each declared half a second long.
    fn steps() -> (TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = ["step_a.mp3", "step_b.mp3"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, b"ID3").unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    fn config(paths: &[PathBuf]) -> EventSoundsConfig {
        let mut config = EventSoundsConfig::default();
        config.detection.detector.direction = Direction::Down;
        config.selection = SoundSource::random(paths.iter().cloned());
        for path in paths {
            config.schedule.declared_durations.insert(path.clone(), 0.5);
        }
        config.seed = Some(1234);
        config
    }

    fn assert_no_channel_overlap(clips: &[PlacedClip]) {
        for (i, a) in clips.iter().enumerate() {
            for b in &clips[i + 1..] {
                if a.channel == b.channel {
                    assert!(
                        a.frame_end <= b.frame_start || b.frame_end <= a.frame_start,
                        "{a:?} overlaps {b:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn produces_scheduled_events_and_restores_cursor() {
        let (_dir, paths) = steps();
        let mut recording = walk();
        recording.set_current_frame(17);
        let points = recording.tracked_points();

        let mut engine = EventSoundEngine::new(config(&paths)).unwrap();
        let mut assets = engine.asset_store();
        let events = engine
            .run(&mut recording, scene(&points), 3, &mut assets)
            .unwrap();

        // foot.L falls through 0 at frame 3 and 17, foot.R at frame 9.
        let frames: Vec<_> = events.iter().map(|e| e.frame).collect();
        assert_eq!(frames, vec![3, 9, 17]);
        assert_eq!(events[1].source_id, "foot.R");
        assert!(events.iter().all(|e| e.duration_frames == 12));
        let tracks: Vec<_> = events.iter().map(|e| e.track).collect();
        // [3, 15) and [9, 21) overlap; [17, 29) fits back after the first.
        assert_eq!(tracks, vec![3, 4, 3]);
        assert_eq!(recording.current_frame(), 17);
    }

    #[test]
    fn same_seed_same_events() {
        let (_dir, paths) = steps();
        let run = || {
            let mut recording = walk();
            let points = recording.tracked_points();
            let mut cfg = config(&paths);
            cfg.mapping.mapper.randomness = 0.5;
            let mut engine = EventSoundEngine::new(cfg).unwrap();
            let mut assets = engine.asset_store();
            engine
                .run(&mut recording, scene(&points), 1, &mut assets)
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn empty_sound_source_aborts_the_run() {
        let (_dir, paths) = steps();
        let mut recording = walk();
        let points = recording.tracked_points();
        let mut cfg = config(&paths);
        cfg.selection = SoundSource::random(Vec::<PathBuf>::new());
        let mut engine = EventSoundEngine::new(cfg).unwrap();
        let err = engine
            .run(&mut recording, scene(&points), 1, &mut AssetStore::new())
            .unwrap_err();
        assert!(matches!(err, EventSoundError::NoAssetsAvailable));
    }

    #[test]
    fn missing_sound_file_aborts_the_run() {
        let (dir, mut paths) = steps();
        let gone = dir.path().join("deleted.wav");
        paths.push(gone.clone());
        let mut recording = walk();
        recording.set_current_frame(12);
        let points = recording.tracked_points();

        let mut engine = EventSoundEngine::new(config(&paths)).unwrap();
        let err = engine
            .run(&mut recording, scene(&points), 1, &mut AssetStore::new())
            .unwrap_err();
        assert!(matches!(err, EventSoundError::AssetNotFound(path) if path == gone));
        assert_eq!(recording.current_frame(), 12);
    }

    #[test]
    fn unknown_configured_points_are_rejected() {
        let (_dir, paths) = steps();
        let mut recording = walk();
        let points = recording.tracked_points();
        let mut cfg = config(&paths);
        cfg.detection.points = vec!["tail".to_string()];
        let mut engine = EventSoundEngine::new(cfg).unwrap();
        assert!(engine
            .run(&mut recording, scene(&points), 1, &mut AssetStore::new())
            .is_err());
    }

    #[test]
    fn writes_onto_fresh_channels_of_local_timeline() {
        let (_dir, paths) = steps();
        let mut recording = walk();
        let points = recording.tracked_points();
        let camera = StaticCamera {
            position: Vec3::new(0.0, -10.0, 0.0),
            forward: Vec3::new(0.0, 1.0, 0.0),
            horizontal_fov: std::f64::consts::FRAC_PI_2,
        };
        let scene = SceneContext {
            camera: Some(&camera),
            ..scene(&points)
        };

        let mut cfg = config(&paths);
        cfg.mapping.pan = true;
        let mut engine = EventSoundEngine::new(cfg).unwrap();
        let mut timeline =
            MemoryTimeline::with_assets(HostApi::Strips, 24.0, 1, engine.asset_store());
        timeline
            .add_sound_clip("music", std::path::Path::new("music.mp3"), 2, 1)
            .unwrap();

        let (events, report) = engine
            .run_on_timeline(&mut recording, scene, &mut timeline)
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.placed.len(), events.len());
        assert_eq!(events.iter().map(|e| e.track).min(), Some(3));
        assert!(events.iter().all(|e| e.pan > 0.0 && e.pan <= 1.0));
        assert!(events.iter().all(|e| e.duration_frames == 12));
        assert_eq!(timeline.clips().len(), 1 + events.len());
        assert_no_channel_overlap(timeline.clips());
    }

    #[test]
    fn timeline_durations_decide_clip_lengths() {
        let (_dir, paths) = steps();
        let mut recording = walk();
        let points = recording.tracked_points();

        // The timeline knows none of the declared durations and falls back
        // to one second per clip.
        let mut timeline = MemoryTimeline::new(HostApi::Strips, 24.0, 1);
        let mut engine = EventSoundEngine::new(config(&paths)).unwrap();
        let (events, report) = engine
            .run_on_timeline(&mut recording, scene(&points), &mut timeline)
            .unwrap();

        assert!(report.is_complete());
        assert!(events.iter().all(|e| e.duration_frames == 24));
        assert!(timeline
            .clips()
            .iter()
            .all(|clip| clip.frame_end - clip.frame_start == 24));
        assert_no_channel_overlap(timeline.clips());
    }
}
