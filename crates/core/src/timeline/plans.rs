use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    timeline::local::{LocalTimeline, PlacedClip},
    EventSoundError, Result,
};

/// Advance used when the host reports a clip that ends where it starts.
pub const FALLBACK_CLIP_FRAMES: i64 = 48;

pub const MAX_DUPLICATES: u32 = 1000;

/// Inserts `count` copies of `asset` back to back from the playhead on a
/// fresh channel above every existing clip. Each copy starts where the
/// previous one ended. Any failure aborts the insertion.
pub fn insert_sequential(
    timeline: &mut dyn LocalTimeline,
    asset: &Path,
    count: usize,
    name_prefix: &str,
) -> Result<Vec<PlacedClip>> {
    if !asset.is_file() {
        return Err(EventSoundError::AssetNotFound(asset.to_path_buf()));
    }

    let channel = timeline.next_free_channel();
    let start = timeline.current_frame();
    let mut offset = start;
    let mut inserted = Vec::with_capacity(count);

    for n in 1..=count {
        let name = format!("{name_prefix}_{n}");
        let clip = timeline.add_sound_clip(&name, asset, channel, offset)?;
        offset = if clip.frame_end > clip.frame_start {
            clip.frame_end
        } else {
            offset + FALLBACK_CLIP_FRAMES
        };
        inserted.push(clip);
    }

    tracing::info!(
        count = inserted.len(),
        channel,
        start,
        "inserted sequential event sounds"
    );
    Ok(inserted)
}

/// Frame span of one animation strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StripSpan {
    pub frame_start: f64,
    pub frame_end: f64,
}

/// Positions of `count` linked duplicates of a strip, each shifted `offset`
/// frames further than the one before it.
pub fn plan_strip_duplicates(
    source: StripSpan,
    count: u32,
    offset: i64,
) -> Result<Vec<StripSpan>> {
    if !(1..=MAX_DUPLICATES).contains(&count) {
        return Err(EventSoundError::invalid(format!(
            "duplicate count must be between 1 and {MAX_DUPLICATES}, got {count}"
        )));
    }
    if offset < 1 {
        return Err(EventSoundError::invalid(format!(
            "frame offset must be at least 1, got {offset}"
        )));
    }

    let shift = offset as f64;
    Ok((1..=count)
        .map(|k| StripSpan {
            frame_start: source.frame_start + shift * f64::from(k),
            frame_end: source.frame_end + shift * f64::from(k),
        })
        .collect())
}
