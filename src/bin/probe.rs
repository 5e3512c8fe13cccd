//! Headless audio probe.
//!
//! Initializes the audio system over the no-op sink, replays a few synthetic
//! world events, and exercises playlist advancement and mute gating. Used by
//! automation to validate catalog wiring in environments without an audio
//! device.

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use observer_audio::{
    AppResult, AudioSystem, AudioSystemOptions, EffectRequest, NullSink, GLOBAL_ORIGIN,
};

fn locate_sound_config() -> Option<PathBuf> {
    let candidates = [
        "sound/sounds.json",
        "../sound/sounds.json",
        "../../sound/sounds.json",
    ];
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

fn synthetic_events() -> Vec<EffectRequest> {
    vec![
        // Launch event in the generic namespace.
        EffectRequest {
            origin_index: 0,
            requested_loops: 2,
            metadata: "probe_launch".to_string(),
            ..EffectRequest::new("team.launch.default")
        },
        // Dock event resolved through the per-team fallback.
        EffectRequest {
            origin_index: 1,
            metadata: "probe_dock".to_string(),
            ..EffectRequest::new("team2.dock.default")
        },
        // Delivery with a quantity payload to exercise loop scaling.
        EffectRequest {
            origin_index: 0,
            quantity: 48.0,
            count: 3,
            metadata: "probe_deliver".to_string(),
            ..EffectRequest::new("team.deliver_vinyl.default")
        },
        // Global event with no team attribution.
        EffectRequest {
            origin_index: GLOBAL_ORIGIN,
            metadata: "probe_global".to_string(),
            ..EffectRequest::new("team.damage.shield")
        },
    ]
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let config_path = locate_sound_config();
    if let Some(path) = &config_path {
        tracing::info!("Using sound config {}", path.display());
    } else {
        tracing::info!("No sound config found, using built-in defaults");
    }
    let asset_root = config_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    let sink = NullSink::new();
    let mut audio = AudioSystem::new(
        AudioSystemOptions {
            config_path,
            asset_root,
            playlist_seed: None,
        },
        Box::new(sink.clone()),
    );

    let events = synthetic_events();
    let event_count = events.len();

    audio.begin_subtick();
    for event in events {
        audio.queue_effect(event);
    }
    audio.end_subtick();
    audio.flush_pending(0);

    // Exercise manual track advancement and the auto-advance callback.
    audio.next_track(true);
    sink.finish_music();
    audio.on_track_finished();

    // Toggle mute state to ensure gating plays nicely with the active track.
    audio.set_music_muted(true);
    audio.set_music_muted(false);

    // Advance one more turn to service the channels we started.
    audio.flush_pending(1);

    tracing::info!(
        events = event_count,
        channels = audio.active_channel_count(),
        effects_played = sink.effect_log().len(),
        track = audio.active_track_id().unwrap_or("<none>"),
        "Probe complete"
    );

    audio.shutdown();
    Ok(())
}
