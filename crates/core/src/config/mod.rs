use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    detection::CrossingDetector,
    mapping::{DistanceVolume, ParameterMapper},
    motion::FrameRange,
    selection::SoundSource,
    timeline::plans::MAX_DUPLICATES,
    EventSoundError, Result,
};

/// Top-level configuration for a motion-to-sound run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSoundsConfig {
    pub detection: DetectionConfig,
    pub mapping: MappingConfig,
    pub selection: SoundSource,
    pub schedule: ScheduleConfig,
    pub insertion: InsertionConfig,
    pub duplication: DuplicationConfig,
    /// Seed for random volume jitter and random sound selection. Unseeded
    /// runs draw from OS entropy.
    pub seed: Option<u64>,
}

impl EventSoundsConfig {
    /// Reads a JSON configuration file. Missing sections take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: EventSoundsConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.detection.frame_range {
            FrameRange::try_new(range.start, range.end)?;
        }
        if self.detection.points.iter().any(|id| id.trim().is_empty()) {
            return Err(EventSoundError::invalid("tracked point ids must not be empty"));
        }
        self.mapping.mapper.validate()?;
        if let Some(curve) = &self.mapping.distance {
            curve.validate()?;
        }
        if self.schedule.base_track == Some(0) {
            return Err(EventSoundError::invalid("base track must be at least 1"));
        }
        if self
            .schedule
            .declared_durations
            .values()
            .any(|seconds| !(*seconds > 0.0))
        {
            return Err(EventSoundError::invalid("declared durations must be positive"));
        }
        if self.insertion.count == 0 {
            return Err(EventSoundError::invalid("insertion count must be at least 1"));
        }
        if !(1..=MAX_DUPLICATES).contains(&self.duplication.count) || self.duplication.offset < 1 {
            return Err(EventSoundError::invalid(format!(
                "duplication needs a count in 1..={MAX_DUPLICATES} and an offset of at least 1"
            )));
        }
        Ok(())
    }
}

/// Which points to watch and how to detect crossings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    #[serde(flatten)]
    pub detector: CrossingDetector,
    /// Point ids to track. Empty means every point the source offers.
    pub points: Vec<String>,
    /// Overrides the scene's playback range.
    pub frame_range: Option<FrameRange>,
}

/// Volume and pan derivation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    #[serde(flatten)]
    pub mapper: ParameterMapper,
    /// Attenuate by camera distance when a camera is available.
    pub distance: Option<DistanceVolume>,
    /// Pan by camera angle when a camera is available.
    pub pan: bool,
}

/// Track packing on the local timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// First track to use. Defaults to the channel above every existing
    /// clip.
    pub base_track: Option<u32>,
    /// Durations in seconds for assets whose length cannot be read.
    pub declared_durations: BTreeMap<PathBuf, f64>,
    /// Prefix for generated clip names.
    pub clip_prefix: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            base_track: None,
            declared_durations: BTreeMap::new(),
            clip_prefix: "MotionSound".to_string(),
        }
    }
}

/// Repeated insertion of one event sound at the playhead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertionConfig {
    pub count: usize,
    pub clip_prefix: String,
}

impl Default for InsertionConfig {
    fn default() -> Self {
        Self {
            count: 5,
            clip_prefix: "EventSound".to_string(),
        }
    }
}

/// Linked duplication of a speaker's animation strip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicationConfig {
    pub count: u32,
    pub offset: i64,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            count: 50,
            offset: 24,
        }
    }
}
