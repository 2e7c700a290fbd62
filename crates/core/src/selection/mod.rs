use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{EventSoundError, Result};

/// File extensions accepted as sound assets.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "aiff", "aif"];

/// Where each event's sound comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode")]
pub enum SoundSource {
    /// Every event plays the same file.
    Single { asset: Option<PathBuf> },
    /// Every event independently draws one candidate, with replacement.
    Random { candidates: Vec<PathBuf> },
}

impl Default for SoundSource {
    fn default() -> Self {
        SoundSource::Single { asset: None }
    }
}

impl SoundSource {
    pub fn single(asset: impl Into<PathBuf>) -> Self {
        SoundSource::Single {
            asset: Some(asset.into()),
        }
    }

    pub fn random<I, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        SoundSource::Random {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// Every path this source can hand out.
    pub fn assets(&self) -> Vec<&Path> {
        match self {
            SoundSource::Single { asset } => asset.iter().map(PathBuf::as_path).collect(),
            SoundSource::Random { candidates } => {
                candidates.iter().map(PathBuf::as_path).collect()
            }
        }
    }

    /// Picks one asset per frame.
    pub fn select<R, I>(&self, frames: I, rng: &mut R) -> Result<BTreeMap<i64, PathBuf>>
    where
        R: Rng + ?Sized,
        I: IntoIterator<Item = i64>,
    {
        match self {
            SoundSource::Single { asset: Some(asset) } => {
                Ok(frames.into_iter().map(|f| (f, asset.clone())).collect())
            }
            SoundSource::Single { asset: None } => Err(EventSoundError::NoAssetsAvailable),
            SoundSource::Random { candidates } if candidates.is_empty() => {
                Err(EventSoundError::NoAssetsAvailable)
            }
            SoundSource::Random { candidates } => {
                let mut picks = BTreeMap::new();
                for frame in frames {
                    if let Some(choice) = candidates.choose(rng) {
                        picks.insert(frame, choice.clone());
                    }
                }
                Ok(picks)
            }
        }
    }
}

/// Free-function form of [`SoundSource::select`].
pub fn select_assets<R, I>(
    frames: I,
    source: &SoundSource,
    rng: &mut R,
) -> Result<BTreeMap<i64, PathBuf>>
where
    R: Rng + ?Sized,
    I: IntoIterator<Item = i64>,
{
    source.select(frames, rng)
}

/// True when the extension names a supported audio format.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Lists the audio files directly inside `dir`, sorted by path so that a
/// seeded random selection is reproducible.
pub fn collect_candidates(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && is_audio_file(&path) {
            found.push(path);
        }
    }
    found.sort();

    if found.is_empty() {
        tracing::warn!(dir = %dir.as_ref().display(), "no audio files found");
    }
    Ok(found)
}

/// Fails with [`EventSoundError::AssetNotFound`] for the first path that is
/// not a readable file.
pub fn verify_assets<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<()> {
    for path in paths {
        if fs::File::open(path).is_err() || !path.is_file() {
            return Err(EventSoundError::AssetNotFound(path.to_path_buf()));
        }
    }
    Ok(())
}
