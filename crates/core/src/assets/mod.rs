use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::Result;

/// Length assumed for an asset whose duration cannot be determined.
pub const DEFAULT_ASSET_SECONDS: f64 = 1.0;

const DISPLAY_PATH_LIMIT: usize = 40;

/// Duration registry for the sound files referenced by events.
///
/// Uncompressed WAV files are measured from their header. Compressed formats
/// need a declared duration; anything else falls back to
/// [`DEFAULT_ASSET_SECONDS`].
#[derive(Debug, Default)]
pub struct AssetStore {
    declared: HashMap<PathBuf, f64>,
    probed: HashMap<PathBuf, Option<f64>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self {
            declared: HashMap::new(),
            probed: HashMap::new(),
        }
    }

    /// Registers a known duration, taking precedence over probing.
    pub fn declare_duration(&mut self, path: impl Into<PathBuf>, seconds: f64) {
        self.declared.insert(path.into(), seconds);
    }

    /// Duration in seconds if it can be determined.
    pub fn known_duration(&mut self, path: &Path) -> Option<f64> {
        if let Some(&seconds) = self.declared.get(path) {
            return Some(seconds);
        }
        if let Some(&cached) = self.probed.get(path) {
            return cached;
        }

        let probed = if is_wav(path) {
            match probe_wav_duration(path) {
                Ok(seconds) => Some(seconds),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "could not read WAV header");
                    None
                }
            }
        } else {
            None
        };
        self.probed.insert(path.to_path_buf(), probed);
        probed
    }

    /// Duration in seconds, falling back to [`DEFAULT_ASSET_SECONDS`].
    pub fn duration_seconds(&mut self, path: &Path) -> f64 {
        self.known_duration(path).unwrap_or_else(|| {
            tracing::warn!(
                path = %path.display(),
                fallback = DEFAULT_ASSET_SECONDS,
                "asset duration unknown, using fallback"
            );
            DEFAULT_ASSET_SECONDS
        })
    }

    /// Duration in frames at `fps`, never shorter than one frame.
    pub fn duration_frames(&mut self, path: &Path, fps: f64) -> i64 {
        seconds_to_frames(self.duration_seconds(path), fps)
    }
}

/// `max(1, floor(seconds * fps))`.
pub fn seconds_to_frames(seconds: f64, fps: f64) -> i64 {
    let frames = (seconds * fps).floor();
    if frames.is_finite() && frames >= 1.0 {
        frames as i64
    } else {
        1
    }
}

/// Reads sample count and rate from a WAV header.
pub fn probe_wav_duration(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path)?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Ok(0.0);
    }
    Ok(f64::from(reader.duration()) / f64::from(rate))
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Shortens long paths for display, keeping the tail.
pub fn display_path(path: &str) -> String {
    let count = path.chars().count();
    if count <= DISPLAY_PATH_LIMIT {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (DISPLAY_PATH_LIMIT - 3)).collect();
    format!("...{tail}")
}
