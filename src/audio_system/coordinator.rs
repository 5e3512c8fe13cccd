use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalog::PlaybackMode;
use crate::scheduler::ScheduledEffect;
use crate::sink::{AssetId, PlaybackSink};

use super::channel::ChannelState;

/// Dispatches due scheduled effects to the playback sink and tracks the
/// resulting voices until completion or policy-driven expiry.
///
/// The asset-handle cache is populated lazily, keyed by asset path, and is
/// never evicted during a session.
#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    channels: Vec<ChannelState>,
    asset_cache: HashMap<PathBuf, AssetId>,
    last_service_turn: u64,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Age active channels by the turns elapsed since the last service and
    /// reclaim everything that finished or expired. Monotonic and idempotent
    /// within a turn: a repeated call for the same turn is a no-op.
    pub fn service_active_channels(&mut self, current_turn: u64, sink: &mut dyn PlaybackSink) {
        if current_turn <= self.last_service_turn {
            return;
        }
        let delta = (current_turn - self.last_service_turn) as i64;

        self.channels.retain_mut(|channel| {
            if channel.enforce_duration {
                channel.duration_ticks -= delta;
            }
            let playing = sink.is_channel_playing(channel.handle);
            if channel.expired() || !playing {
                sink.halt_channel(channel.handle);
                tracing::debug!(
                    "Reclaimed channel event={} expired={} playing={playing}",
                    channel.logical_id,
                    channel.expired()
                );
                return false;
            }
            true
        });

        self.last_service_turn = current_turn;
    }

    /// Start one due scheduled effect on the sink. When effects are muted the
    /// effect is consumed without creating a channel; it does not replay
    /// later. Sink failures abandon just this effect.
    pub fn dispatch(
        &mut self,
        effect: &ScheduledEffect,
        sink: &mut dyn PlaybackSink,
        effects_muted: bool,
    ) {
        if effects_muted {
            tracing::debug!(
                "Effects muted, consuming event={} without playback",
                effect.request.logical_event
            );
            return;
        }

        if effect.descriptor.behavior.mode == PlaybackMode::Truncate {
            self.halt_channels_for(&effect.descriptor.logical_id, sink);
        }

        let Some(asset) = self.asset_for(&effect.descriptor.asset_path, sink) else {
            return;
        };

        let loops = effect.loops.max(1);
        let handle = match sink.play_effect(asset, loops) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(
                    "Failed to start effect {}: {err}",
                    effect.request.logical_event
                );
                return;
            }
        };

        self.channels.push(ChannelState {
            logical_id: effect.descriptor.logical_id.clone(),
            loops_remaining: loops,
            duration_ticks: i64::from(effect.duration_ticks),
            enforce_duration: effect.descriptor.behavior.duration_ticks > 0,
            handle,
        });

        tracing::info!(
            event = %effect.request.logical_event,
            loops,
            channels = self.channels.len(),
            "Effect playing"
        );
    }

    /// Halt and discard every active channel. Used by pause and effect-mute.
    pub fn halt_all(&mut self, sink: &mut dyn PlaybackSink) {
        for channel in self.channels.drain(..) {
            sink.halt_channel(channel.handle);
        }
    }

    pub fn active_channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Drop the asset-handle cache. Used on shutdown only; the cache is
    /// never evicted mid-session.
    pub fn clear_cache(&mut self) {
        self.asset_cache.clear();
    }

    fn asset_for(&mut self, path: &PathBuf, sink: &mut dyn PlaybackSink) -> Option<AssetId> {
        if let Some(asset) = self.asset_cache.get(path) {
            return Some(*asset);
        }
        match sink.load_asset(path) {
            Ok(asset) => {
                self.asset_cache.insert(path.clone(), asset);
                Some(asset)
            }
            Err(err) => {
                tracing::warn!("Failed to load asset {}: {err}", path.display());
                None
            }
        }
    }

    fn halt_channels_for(&mut self, logical_id: &str, sink: &mut dyn PlaybackSink) {
        self.channels.retain(|channel| {
            if channel.logical_id == logical_id {
                sink.halt_channel(channel.handle);
                tracing::debug!("Truncated channel event={logical_id}");
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EffectBehavior, EffectDescriptor};
    use crate::request::EffectRequest;
    use crate::sink::NullSink;

    fn scheduled(id: &str, mode: PlaybackMode, duration_ticks: u32, loops: u32) -> ScheduledEffect {
        let descriptor = EffectDescriptor {
            logical_id: id.to_string(),
            asset_path: PathBuf::from(format!("{id}.wav")),
            behavior: EffectBehavior {
                mode,
                duration_ticks,
                ..EffectBehavior::default()
            },
        };
        ScheduledEffect {
            request: EffectRequest::new(id),
            descriptor,
            scheduled_tick: 0,
            loops,
            duration_ticks: duration_ticks.max(1) * loops.max(1),
        }
    }

    #[test]
    fn test_dispatch_creates_channel() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 2, 3),
            boxed.as_mut(),
            false,
        );

        assert_eq!(coordinator.active_channel_count(), 1);
        assert_eq!(sink.effect_log().len(), 1);
        assert_eq!(sink.effect_log()[0].loops, 3);
    }

    #[test]
    fn test_muted_dispatch_consumes_without_channel() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 2, 1),
            boxed.as_mut(),
            true,
        );

        assert_eq!(coordinator.active_channel_count(), 0);
        assert!(sink.effect_log().is_empty());
    }

    #[test]
    fn test_asset_cache_loads_once_per_path() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        let effect = scheduled("a.b", PlaybackMode::Simultaneous, 1, 1);
        coordinator.dispatch(&effect, boxed.as_mut(), false);
        coordinator.dispatch(&effect, boxed.as_mut(), false);

        assert_eq!(sink.loaded_asset_count(), 1);
        assert_eq!(sink.effect_log().len(), 2);
    }

    #[test]
    fn test_service_decrements_and_reclaims_expired() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 2, 1),
            boxed.as_mut(),
            false,
        );
        assert_eq!(coordinator.active_channel_count(), 1);

        coordinator.service_active_channels(1, boxed.as_mut());
        assert_eq!(coordinator.active_channel_count(), 1);

        coordinator.service_active_channels(2, boxed.as_mut());
        assert_eq!(coordinator.active_channel_count(), 0);
        assert_eq!(sink.playing_channel_count(), 0);
    }

    #[test]
    fn test_service_idempotent_within_turn() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 3, 1),
            boxed.as_mut(),
            false,
        );

        coordinator.service_active_channels(1, boxed.as_mut());
        coordinator.service_active_channels(1, boxed.as_mut());
        coordinator.service_active_channels(1, boxed.as_mut());

        // One decrement, not three: the channel survives.
        assert_eq!(coordinator.active_channel_count(), 1);
    }

    #[test]
    fn test_unbounded_channel_outlives_countdown() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        // duration_ticks 0 = unbounded, sink-determined.
        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 0, 1),
            boxed.as_mut(),
            false,
        );

        coordinator.service_active_channels(100, boxed.as_mut());
        assert_eq!(coordinator.active_channel_count(), 1);
    }

    #[test]
    fn test_finished_channel_reclaimed() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 0, 1),
            boxed.as_mut(),
            false,
        );

        // Natural completion reported by the sink.
        let handles = sink.playing_handles();
        assert_eq!(handles.len(), 1);
        sink.finish_channel(handles[0]);

        coordinator.service_active_channels(1, boxed.as_mut());
        assert_eq!(coordinator.active_channel_count(), 0);
    }

    #[test]
    fn test_truncate_halts_same_logical_id() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        let effect = scheduled("cut.off", PlaybackMode::Truncate, 0, 1);
        let other = scheduled("other.id", PlaybackMode::Simultaneous, 0, 1);
        coordinator.dispatch(&effect, boxed.as_mut(), false);
        coordinator.dispatch(&other, boxed.as_mut(), false);
        assert_eq!(coordinator.active_channel_count(), 2);

        coordinator.dispatch(&effect, boxed.as_mut(), false);

        // Old cut.off channel replaced; other.id untouched.
        assert_eq!(coordinator.active_channel_count(), 2);
        assert_eq!(sink.playing_channel_count(), 2);
        assert_eq!(sink.effect_log().len(), 3);
    }

    #[test]
    fn test_halt_all_discards_channels() {
        let sink = NullSink::new();
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 0, 1),
            boxed.as_mut(),
            false,
        );
        coordinator.dispatch(
            &scheduled("c.d", PlaybackMode::Simultaneous, 0, 1),
            boxed.as_mut(),
            false,
        );

        coordinator.halt_all(boxed.as_mut());
        assert_eq!(coordinator.active_channel_count(), 0);
        assert_eq!(sink.playing_channel_count(), 0);
    }

    #[test]
    fn test_failed_asset_load_abandons_effect() {
        let sink = NullSink::new();
        sink.set_reject_playback(true);
        let mut boxed: Box<dyn PlaybackSink> = Box::new(sink.clone());
        let mut coordinator = PlaybackCoordinator::new();

        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 1, 1),
            boxed.as_mut(),
            false,
        );

        assert_eq!(coordinator.active_channel_count(), 0);

        // A later attempt succeeds once the sink recovers; the failed load
        // was not cached.
        sink.set_reject_playback(false);
        coordinator.dispatch(
            &scheduled("a.b", PlaybackMode::Simultaneous, 1, 1),
            boxed.as_mut(),
            false,
        );
        assert_eq!(coordinator.active_channel_count(), 1);
    }
}
