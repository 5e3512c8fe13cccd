/// Playback coordination module
///
/// Owns the live half of the audio pipeline: active voice/channel state,
/// aging against the turn clock, and dispatch of due scheduled effects
/// through the playback sink. Channel state and the asset-handle cache are
/// owned exclusively here; no other component mutates them.
pub mod channel;
pub mod coordinator;

pub use channel::ChannelState;
pub use coordinator::PlaybackCoordinator;
