//! Core library for the Event Sounds engine.
//!
//! Turns the motion of tracked points (typically armature bones) into sound
//! events on a timeline. Each module owns one stage: sampling motion,
//! detecting threshold crossings, deriving volume and pan, choosing sounds,
//! packing events onto tracks, and exporting the packed result to an
//! external editor running at another frame rate.

pub mod assets;
pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod mapping;
pub mod motion;
pub mod pipeline;
pub mod record;
pub mod selection;
pub mod timeline;

pub use assets::{display_path, AssetStore, DEFAULT_ASSET_SECONDS};
pub use config::{
    DetectionConfig, DuplicationConfig, EventSoundsConfig, InsertionConfig, MappingConfig,
    ScheduleConfig,
};
pub use detection::{detect_crossings, CrossingDetector, CrossingEvent, Direction};
pub use error::{EventSoundError, Result};
pub use export::{
    convert_frame, CatalogEntry, DestinationTimeline, ExportReport, FrameMapping,
    MemoryDestination, TimelineExporter,
};
pub use mapping::{map_parameters, CameraContext, EventParameters, ParameterMapper, VolumeRange};
pub use motion::{
    Axis, CameraGeometry, CursorGuard, FrameRange, MotionSource, StaticCamera, TrackedPoint, Vec3,
};
pub use pipeline::{EventSoundEngine, SceneContext};
pub use record::MotionRecording;
pub use selection::{select_assets, SoundSource};
pub use timeline::{
    assign_tracks, schedule_tracks, AudioEvent, HostApi, Interval, LocalTimeline, MemoryTimeline,
    PendingEvent, PlacementReport,
};
