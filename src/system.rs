use std::path::PathBuf;

use crate::audio_system::PlaybackCoordinator;
use crate::catalog::{Catalog, PlaybackMode};
use crate::error::AudioError;
use crate::playlist::{Playlist, DEFAULT_PLAYLIST_SEED};
use crate::request::{EffectRequest, RequestBuffer};
use crate::scheduler::Scheduler;
use crate::sink::{PlaybackSink, RodioSink};

/// Construction options for an [`AudioSystem`].
#[derive(Debug, Clone, Default)]
pub struct AudioSystemOptions {
    /// Sound configuration file. `None` (or a bad file) uses built-in
    /// defaults.
    pub config_path: Option<PathBuf>,
    /// Directory probed first when resolving relative asset paths.
    pub asset_root: Option<PathBuf>,
    /// Playlist shuffle seed override.
    pub playlist_seed: Option<u64>,
}

/// Turn-quantized audio coordinator.
///
/// Explicitly constructed and passed by handle; "one per process" is a
/// caller convention, not a singleton. Per turn the simulation layer calls
/// `begin_subtick` / `queue_effect`* / `end_subtick`, then `flush_pending`
/// exactly once with a monotonically increasing turn number. Nothing here
/// blocks; the sink only receives non-blocking commands.
pub struct AudioSystem {
    catalog: Catalog,
    buffer: RequestBuffer,
    scheduler: Scheduler,
    coordinator: PlaybackCoordinator,
    playlist: Playlist,
    sink: Box<dyn PlaybackSink>,
    music_muted: bool,
    effects_muted: bool,
    effects_paused: bool,
    last_flush_turn: Option<u64>,
}

impl AudioSystem {
    /// Build a system over an explicit sink (real mixer or no-op logger).
    pub fn new(options: AudioSystemOptions, mut sink: Box<dyn PlaybackSink>) -> Self {
        let mut catalog = Catalog::new();
        catalog.set_asset_root_override(options.asset_root);
        if let Some(config_path) = &options.config_path {
            catalog.load(config_path);
        }

        sink.set_music_volume(f32::from(catalog.soundtrack_volume_percent()) / 100.0);
        sink.set_effects_volume(f32::from(catalog.effects_volume_percent()) / 100.0);

        let mut playlist =
            Playlist::with_seed(options.playlist_seed.unwrap_or(DEFAULT_PLAYLIST_SEED));
        playlist.refresh(&catalog);

        let mut system = Self {
            catalog,
            buffer: RequestBuffer::new(),
            scheduler: Scheduler::new(),
            coordinator: PlaybackCoordinator::new(),
            playlist,
            sink,
            music_muted: false,
            effects_muted: false,
            effects_paused: false,
            last_flush_turn: None,
        };
        system.ensure_music_playing();
        tracing::info!(
            effects = system.catalog.effect_count(),
            "Audio system initialized"
        );
        system
    }

    /// Build a system over the default rodio output device. Sink
    /// initialization is the only hard failure the audio stack surfaces.
    pub fn with_default_sink(options: AudioSystemOptions) -> Result<Self, AudioError> {
        let sink = RodioSink::new()?;
        Ok(Self::new(options, Box::new(sink)))
    }

    /// Stop all playback and reset internal state.
    pub fn shutdown(&mut self) {
        self.buffer.clear_all();
        self.scheduler.clear();
        self.coordinator.halt_all(self.sink.as_mut());
        self.coordinator.clear_cache();
        self.sink.halt_music();
        self.playlist.clear_active();
        self.last_flush_turn = None;
        tracing::info!("Audio system shutdown complete");
    }

    /// Open the per-turn aggregation window. Idempotent.
    pub fn begin_subtick(&mut self) {
        if self.effects_paused {
            return;
        }
        self.buffer.begin_subtick();
    }

    /// Raise a logical sound event for this turn. The request is enriched
    /// against its descriptor (default delay, queue-mode duplicate
    /// preservation) and coalesced into the open subtick; unresolvable
    /// events are dropped here with a diagnostic.
    pub fn queue_effect(&mut self, request: EffectRequest) {
        if self.effects_paused {
            return;
        }

        let Some(descriptor) = self.catalog.resolve(&request.logical_event) else {
            tracing::warn!("Missing asset for logical event {}", request.logical_event);
            return;
        };

        let mut enriched = request;
        if enriched.requested_delay_ticks == 0 {
            enriched.requested_delay_ticks = descriptor.behavior.delay_ticks;
        }
        if descriptor.behavior.mode == PlaybackMode::Queue {
            enriched.preserve_duplicates = true;
        }

        self.buffer.queue_effect(enriched);
    }

    /// Close the aggregation window, finalizing this turn's request set.
    pub fn end_subtick(&mut self) {
        self.buffer.seal_subtick();
    }

    /// Once-per-turn driver: ages active channels, schedules the finalized
    /// request set, and dispatches everything due. The trailing sweep runs
    /// immediately after scheduling so zero-delay effects start in the same
    /// call instead of one turn late. Calling again with the same turn is
    /// safe (all per-turn work is drain-based); a lower turn is rejected.
    pub fn flush_pending(&mut self, current_turn: u64) {
        if let Some(last) = self.last_flush_turn {
            if current_turn < last {
                tracing::warn!(
                    turn = current_turn,
                    last_turn = last,
                    "Non-monotonic flush ignored"
                );
                return;
            }
        }

        self.coordinator
            .service_active_channels(current_turn, self.sink.as_mut());
        self.process_pending_effects(current_turn);

        for request in self.buffer.consume_pending() {
            let Some(descriptor) = self.catalog.resolve(&request.logical_event).cloned() else {
                tracing::warn!("Missing asset for logical event {}", request.logical_event);
                continue;
            };
            self.scheduler.schedule(request, descriptor, current_turn);
        }

        self.process_pending_effects(current_turn);
        self.last_flush_turn = Some(current_turn);
    }

    fn process_pending_effects(&mut self, current_turn: u64) {
        self.ensure_music_playing();
        for effect in self.scheduler.take_due(current_turn) {
            self.coordinator
                .dispatch(&effect, self.sink.as_mut(), self.effects_muted);
        }
    }

    fn ensure_music_playing(&mut self) {
        if self.music_muted {
            if self.sink.music_playing() {
                self.sink.halt_music();
            }
            return;
        }
        if self.sink.music_playing() {
            return;
        }

        // Prefer restarting the active track (covers deferred starts after
        // unmute); fall back to advancing the playlist.
        if let Some(active) = self.playlist.active_track().map(str::to_string) {
            if self
                .playlist
                .start_track(&active, &self.catalog, self.sink.as_mut(), false)
            {
                return;
            }
        }
        self.playlist
            .advance(false, &self.catalog, self.sink.as_mut(), false);
    }

    /// Halt and discard all active channels and stop accepting requests
    /// until resumed.
    pub fn pause_effects(&mut self) {
        self.effects_paused = true;
        self.coordinator.halt_all(self.sink.as_mut());
    }

    pub fn resume_effects(&mut self) {
        self.effects_paused = false;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.set_music_muted(muted);
        self.set_effects_muted(muted);
    }

    pub fn set_music_muted(&mut self, muted: bool) {
        self.music_muted = muted;
        if muted {
            self.sink.halt_music();
        } else {
            self.ensure_music_playing();
        }
    }

    /// Muting effects halts current output but preserves scheduled work;
    /// effects that come due while muted are consumed silently and do not
    /// replay on unmute.
    pub fn set_effects_muted(&mut self, muted: bool) {
        self.effects_muted = muted;
        if muted {
            self.coordinator.halt_all(self.sink.as_mut());
        }
    }

    pub fn is_muted(&self) -> bool {
        self.music_muted && self.effects_muted
    }

    pub fn music_muted(&self) -> bool {
        self.music_muted
    }

    pub fn effects_muted(&self) -> bool {
        self.effects_muted
    }

    pub fn effects_paused(&self) -> bool {
        self.effects_paused
    }

    /// Manual track skip.
    pub fn next_track(&mut self, from_manual: bool) {
        self.playlist
            .advance(from_manual, &self.catalog, self.sink.as_mut(), self.music_muted);
    }

    /// Sink-driven completion callback: the current track ended naturally.
    pub fn on_track_finished(&mut self) {
        if self.music_muted {
            return;
        }
        self.playlist.clear_active();
        self.playlist
            .advance(false, &self.catalog, self.sink.as_mut(), false);
    }

    pub fn active_track_id(&self) -> Option<&str> {
        self.playlist.active_track()
    }

    pub fn playlist_snapshot(&self) -> Vec<String> {
        self.playlist.snapshot()
    }

    pub fn set_playlist_seed(&mut self, seed: u64) {
        self.playlist.set_seed(seed);
    }

    pub fn playlist_seed(&self) -> u64 {
        self.playlist.seed()
    }

    pub fn refresh_playlist(&mut self) {
        self.playlist.refresh(&self.catalog);
    }

    pub fn active_channel_count(&self) -> usize {
        self.coordinator.active_channel_count()
    }

    pub fn pending_effect_count(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    fn system_with_null_sink() -> (AudioSystem, NullSink) {
        let sink = NullSink::new();
        let system = AudioSystem::new(AudioSystemOptions::default(), Box::new(sink.clone()));
        (system, sink)
    }

    fn launch_request(origin: i32) -> EffectRequest {
        EffectRequest {
            origin_index: origin,
            ..EffectRequest::new("team.launch.default")
        }
    }

    #[test]
    fn test_music_starts_at_construction() {
        let (system, sink) = system_with_null_sink();
        assert!(sink.music_playing());
        assert!(system.active_track_id().is_some());
    }

    #[test]
    fn test_end_to_end_dedup_and_same_turn_dispatch() {
        let (mut system, sink) = system_with_null_sink();

        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.queue_effect(launch_request(0));
        system.end_subtick();
        system.flush_pending(10);

        // The two requests merged and dispatched in the same flush.
        assert_eq!(system.active_channel_count(), 1);
        assert_eq!(sink.effect_log().len(), 1);
        assert_eq!(system.pending_effect_count(), 0);
    }

    #[test]
    fn test_unknown_event_dropped_at_queue_time() {
        let (mut system, sink) = system_with_null_sink();

        system.begin_subtick();
        system.queue_effect(EffectRequest::new("nocategory"));
        system.end_subtick();
        system.flush_pending(1);

        assert_eq!(system.active_channel_count(), 0);
        assert!(sink.effect_log().is_empty());
    }

    #[test]
    fn test_team_namespace_falls_back_to_generic() {
        let (mut system, sink) = system_with_null_sink();

        system.begin_subtick();
        system.queue_effect(EffectRequest::new("team7.launch.default"));
        system.end_subtick();
        system.flush_pending(1);

        assert_eq!(system.active_channel_count(), 1);
        assert_eq!(sink.effect_log().len(), 1);
    }

    #[test]
    fn test_effects_mute_consumes_without_replay() {
        let (mut system, sink) = system_with_null_sink();
        system.set_effects_muted(true);

        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.end_subtick();
        system.flush_pending(5);

        assert_eq!(system.active_channel_count(), 0);
        assert!(sink.effect_log().is_empty());
        assert_eq!(system.pending_effect_count(), 0);

        // Unmuting does not replay the consumed effect.
        system.set_effects_muted(false);
        system.flush_pending(6);
        assert!(sink.effect_log().is_empty());
    }

    #[test]
    fn test_pause_discards_channels_and_blocks_requests() {
        let (mut system, sink) = system_with_null_sink();

        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.end_subtick();
        system.flush_pending(1);
        assert_eq!(system.active_channel_count(), 1);

        system.pause_effects();
        assert_eq!(system.active_channel_count(), 0);
        assert_eq!(sink.playing_channel_count(), 0);

        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.end_subtick();
        system.flush_pending(2);
        assert_eq!(system.active_channel_count(), 0);

        system.resume_effects();
        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.end_subtick();
        system.flush_pending(3);
        assert_eq!(system.active_channel_count(), 1);
    }

    #[test]
    fn test_music_mute_halts_and_unmute_resumes() {
        let (mut system, sink) = system_with_null_sink();
        assert!(sink.music_playing());

        system.set_music_muted(true);
        assert!(!sink.music_playing());

        system.set_music_muted(false);
        assert!(sink.music_playing());
    }

    #[test]
    fn test_set_muted_covers_both() {
        let (mut system, _sink) = system_with_null_sink();
        system.set_muted(true);
        assert!(system.is_muted());
        assert!(system.music_muted());
        assert!(system.effects_muted());

        system.set_muted(false);
        assert!(!system.is_muted());
    }

    #[test]
    fn test_track_finished_advances_playlist() {
        let (mut system, sink) = system_with_null_sink();
        let starts_before = sink.music_start_count();

        sink.finish_music();
        system.on_track_finished();

        assert!(sink.music_playing());
        assert_eq!(sink.music_start_count(), starts_before + 1);
    }

    #[test]
    fn test_track_finished_while_muted_does_not_advance() {
        let (mut system, sink) = system_with_null_sink();
        system.set_music_muted(true);
        let starts_before = sink.music_start_count();

        system.on_track_finished();
        assert_eq!(sink.music_start_count(), starts_before);
    }

    #[test]
    fn test_non_monotonic_flush_rejected() {
        let (mut system, sink) = system_with_null_sink();

        system.flush_pending(10);

        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.end_subtick();
        // Going backwards is ignored: nothing is drained or dispatched.
        system.flush_pending(9);
        assert!(sink.effect_log().is_empty());

        // The same turn is fine.
        system.flush_pending(10);
        assert_eq!(sink.effect_log().len(), 1);
    }

    #[test]
    fn test_delayed_effect_waits_for_its_turn() {
        let (mut system, sink) = system_with_null_sink();

        let mut request = launch_request(0);
        request.requested_delay_ticks = 2;
        system.begin_subtick();
        system.queue_effect(request);
        system.end_subtick();

        system.flush_pending(10);
        assert!(sink.effect_log().is_empty());
        assert_eq!(system.pending_effect_count(), 1);

        system.flush_pending(11);
        assert!(sink.effect_log().is_empty());

        system.flush_pending(12);
        assert_eq!(sink.effect_log().len(), 1);
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let (mut system, sink) = system_with_null_sink();

        system.begin_subtick();
        system.queue_effect(launch_request(0));
        system.end_subtick();
        system.flush_pending(1);

        system.shutdown();
        assert_eq!(system.active_channel_count(), 0);
        assert!(!sink.music_playing());
        assert_eq!(system.pending_effect_count(), 0);
    }

    #[test]
    fn test_playlist_seed_control() {
        let (mut system, _sink) = system_with_null_sink();
        system.set_playlist_seed(1234);
        assert_eq!(system.playlist_seed(), 1234);
        assert!(!system.playlist_snapshot().is_empty());
    }
}
