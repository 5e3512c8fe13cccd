//! Turn-quantized audio event scheduler and playback coordinator.
//!
//! Game logic raises logical sound events ("ship launched", "vinyl
//! delivered", "shield hit") many times per simulation turn. This crate
//! deduplicates them within a turn, resolves each to a playable asset and a
//! playback policy, schedules it against the turn clock (serializing
//! queue-mode effects so they never overlap), and drives a bounded set of
//! playback channels plus a shuffled background playlist, all without
//! blocking the simulation loop.
//!
//! ## Architecture
//!
//! ```text
//! AudioSystem
//!   ├── Catalog            logical event -> descriptor (asset + behavior)
//!   ├── RequestBuffer      per-turn coalescing of raised events
//!   ├── Scheduler          delay offsets, queue-mode serialization
//!   ├── PlaybackCoordinator  channel lifecycle, asset cache, dispatch
//!   ├── Playlist           shuffled background-track order
//!   └── PlaybackSink       rodio output or no-op logger
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use observer_audio::{AudioSystem, AudioSystemOptions, EffectRequest};
//!
//! let mut audio = AudioSystem::with_default_sink(AudioSystemOptions {
//!     config_path: Some("sound/sounds.json".into()),
//!     ..Default::default()
//! })?;
//!
//! // Per simulation turn:
//! audio.begin_subtick();
//! audio.queue_effect(EffectRequest::new("team1.launch.default"));
//! audio.end_subtick();
//! audio.flush_pending(turn);
//! ```

pub mod audio_system;
pub mod catalog;
pub mod config;
pub mod error;
pub mod playlist;
pub mod request;
pub mod scheduler;
pub mod sink;
pub mod system;

pub use audio_system::{ChannelState, PlaybackCoordinator};
pub use catalog::{Catalog, EffectBehavior, EffectDescriptor, PlaybackMode, ScaleRule};
pub use config::SoundConfig;
pub use error::{AppResult, AudioError, ConfigError};
pub use playlist::Playlist;
pub use request::{EffectRequest, RequestBuffer, GLOBAL_ORIGIN};
pub use scheduler::{ScheduledEffect, Scheduler};
pub use sink::{AssetId, ChannelHandle, NullSink, PlaybackSink, RodioSink};
pub use system::{AudioSystem, AudioSystemOptions};

use std::sync::Arc;

use parking_lot::Mutex;

/// Shared handle for callers driving the audio system from more than one
/// thread (e.g. a render thread toggling mutes while the simulation loop
/// flushes turns). The core itself is single-threaded; one coarse lock
/// around the whole system suffices because components only interact
/// through method calls.
pub type SharedAudioSystem = Arc<Mutex<AudioSystem>>;

/// Wrap an [`AudioSystem`] in a [`SharedAudioSystem`] handle.
pub fn into_shared(system: AudioSystem) -> SharedAudioSystem {
    Arc::new(Mutex::new(system))
}
