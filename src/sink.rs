use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::error::AudioError;

/// Opaque handle to an asset the sink has loaded and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(u64);

/// Opaque handle to one playing voice/channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(u64);

/// Narrow capability set the audio core needs from a playback backend:
/// load an asset, play it for a loop count, query/halt a channel, and drive
/// one background music slot. Implementations must not block; completion is
/// observed by polling `is_channel_playing` / `music_playing`.
///
/// Two implementations exist: [`RodioSink`] for real output and [`NullSink`]
/// for headless runs and tests. Selection happens at construction time.
pub trait PlaybackSink {
    /// Load and validate an asset, returning a reusable handle.
    fn load_asset(&mut self, path: &Path) -> Result<AssetId, AudioError>;

    /// Start a loaded asset on a fresh channel, repeating `loops` times.
    fn play_effect(&mut self, asset: AssetId, loops: u32) -> Result<ChannelHandle, AudioError>;

    fn is_channel_playing(&self, handle: ChannelHandle) -> bool;

    /// Stop and release a channel. Safe to call on finished channels.
    fn halt_channel(&mut self, handle: ChannelHandle);

    /// Start the background music slot, replacing whatever was playing.
    fn play_music(&mut self, path: &Path, looped: bool) -> Result<(), AudioError>;

    fn music_playing(&self) -> bool;

    fn halt_music(&mut self);

    /// Volume applied to subsequently started effect channels (0.0-1.0).
    fn set_effects_volume(&mut self, volume: f32);

    /// Volume applied to the music slot (0.0-1.0).
    fn set_music_volume(&mut self, volume: f32);
}

/// Real playback backend on top of rodio.
///
/// Each effect channel is its own rodio `Sink`; loop counts are realized by
/// appending the decoder once per repetition so the sink drains them in
/// sequence. Asset bytes are kept in memory so repeat playback never touches
/// the filesystem again.
pub struct RodioSink {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    assets: HashMap<AssetId, Arc<Vec<u8>>>,
    channels: HashMap<ChannelHandle, Sink>,
    music: Option<Sink>,
    next_asset: u64,
    next_channel: u64,
    effects_volume: f32,
    music_volume: f32,
}

impl RodioSink {
    /// Open the default output device. This is the only hard failure in the
    /// audio stack: without an output stream nothing downstream can work.
    pub fn new() -> Result<Self, AudioError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| AudioError::SinkInitFailed(Box::new(e)))?;

        tracing::info!("Audio output stream opened");
        Ok(Self {
            _stream: stream,
            stream_handle,
            assets: HashMap::new(),
            channels: HashMap::new(),
            music: None,
            next_asset: 0,
            next_channel: 0,
            effects_volume: 1.0,
            music_volume: 1.0,
        })
    }

    fn decoder_for(&self, data: &Arc<Vec<u8>>, path_hint: &str) -> Result<Decoder<std::io::Cursor<Vec<u8>>>, AudioError> {
        // rodio's Decoder requires owned data with a 'static lifetime.
        let cursor = std::io::Cursor::new((**data).clone());
        Decoder::new(cursor).map_err(|e| AudioError::DecodeFailed {
            path: path_hint.to_string(),
            source: Box::new(e),
        })
    }

    /// Drop sinks whose queues have drained.
    fn prune_finished_channels(&mut self) {
        self.channels.retain(|_, sink| !sink.empty());
    }
}

impl PlaybackSink for RodioSink {
    fn load_asset(&mut self, path: &Path) -> Result<AssetId, AudioError> {
        let data = std::fs::read(path).map_err(|e| AudioError::AssetLoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let data = Arc::new(data);

        // Validate up front so playback-time failures are limited to device
        // issues.
        let decoder = self.decoder_for(&data, &path.display().to_string())?;
        drop(decoder);

        let id = AssetId(self.next_asset);
        self.next_asset += 1;
        self.assets.insert(id, Arc::clone(&data));
        tracing::debug!("Loaded asset {} ({} bytes)", path.display(), data.len());
        Ok(id)
    }

    fn play_effect(&mut self, asset: AssetId, loops: u32) -> Result<ChannelHandle, AudioError> {
        self.prune_finished_channels();

        let data = self
            .assets
            .get(&asset)
            .cloned()
            .ok_or(AudioError::UnknownAsset)?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| AudioError::PlaybackFailed(Box::new(e)))?;
        sink.set_volume(self.effects_volume);

        for _ in 0..loops.max(1) {
            let decoder = self.decoder_for(&data, "effect asset")?;
            sink.append(decoder);
        }
        sink.play();

        let handle = ChannelHandle(self.next_channel);
        self.next_channel += 1;
        self.channels.insert(handle, sink);
        Ok(handle)
    }

    fn is_channel_playing(&self, handle: ChannelHandle) -> bool {
        self.channels
            .get(&handle)
            .map(|sink| !sink.empty())
            .unwrap_or(false)
    }

    fn halt_channel(&mut self, handle: ChannelHandle) {
        if let Some(sink) = self.channels.remove(&handle) {
            sink.stop();
        }
    }

    fn play_music(&mut self, path: &Path, looped: bool) -> Result<(), AudioError> {
        let data = std::fs::read(path).map_err(|e| AudioError::AssetLoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let data = Arc::new(data);
        let decoder = self.decoder_for(&data, &path.display().to_string())?;

        self.halt_music();

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| AudioError::PlaybackFailed(Box::new(e)))?;
        sink.set_volume(self.music_volume);
        if looped {
            sink.append(decoder.repeat_infinite());
        } else {
            sink.append(decoder);
        }
        sink.play();
        self.music = Some(sink);

        tracing::debug!("Music started: {}", path.display());
        Ok(())
    }

    fn music_playing(&self) -> bool {
        self.music.as_ref().map(|sink| !sink.empty()).unwrap_or(false)
    }

    fn halt_music(&mut self) {
        if let Some(sink) = self.music.take() {
            sink.stop();
        }
    }

    fn set_effects_volume(&mut self, volume: f32) {
        self.effects_volume = volume.clamp(0.0, 1.0);
        for sink in self.channels.values() {
            sink.set_volume(self.effects_volume);
        }
    }

    fn set_music_volume(&mut self, volume: f32) {
        self.music_volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.music {
            sink.set_volume(self.music_volume);
        }
    }
}

/// One effect playback recorded by the [`NullSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectPlayback {
    pub asset: AssetId,
    pub loops: u32,
}

#[derive(Debug, Default)]
struct NullSinkState {
    next_asset: u64,
    next_channel: u64,
    loaded: HashMap<AssetId, PathBuf>,
    playing: HashMap<ChannelHandle, bool>,
    effect_log: Vec<EffectPlayback>,
    music_track: Option<PathBuf>,
    music_active: bool,
    music_starts: usize,
    reject_assets: bool,
    reject_playback: bool,
    effects_volume: f32,
    music_volume: f32,
}

/// No-op logging sink for headless runs and tests.
///
/// Channels stay "playing" until explicitly halted or finished through the
/// test knobs. State lives behind a shared handle so a test can keep a clone
/// while the audio system owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct NullSink {
    inner: Arc<Mutex<NullSinkState>>,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent loads and playback attempts fail.
    pub fn set_reject_playback(&self, reject: bool) {
        let mut state = self.inner.lock();
        state.reject_assets = reject;
        state.reject_playback = reject;
    }

    /// Simulate a channel reaching natural completion.
    pub fn finish_channel(&self, handle: ChannelHandle) {
        if let Some(playing) = self.inner.lock().playing.get_mut(&handle) {
            *playing = false;
        }
    }

    /// Simulate the music track reaching natural completion.
    pub fn finish_music(&self) {
        self.inner.lock().music_active = false;
    }

    pub fn effect_log(&self) -> Vec<EffectPlayback> {
        self.inner.lock().effect_log.clone()
    }

    pub fn playing_channel_count(&self) -> usize {
        self.inner.lock().playing.values().filter(|p| **p).count()
    }

    /// Handles of channels currently reported as playing.
    pub fn playing_handles(&self) -> Vec<ChannelHandle> {
        self.inner
            .lock()
            .playing
            .iter()
            .filter(|(_, playing)| **playing)
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn music_start_count(&self) -> usize {
        self.inner.lock().music_starts
    }

    pub fn current_music_track(&self) -> Option<PathBuf> {
        self.inner.lock().music_track.clone()
    }

    pub fn loaded_asset_count(&self) -> usize {
        self.inner.lock().loaded.len()
    }

    pub fn effects_volume(&self) -> f32 {
        self.inner.lock().effects_volume
    }

    pub fn music_volume(&self) -> f32 {
        self.inner.lock().music_volume
    }
}

impl PlaybackSink for NullSink {
    fn load_asset(&mut self, path: &Path) -> Result<AssetId, AudioError> {
        let mut state = self.inner.lock();
        if state.reject_assets {
            return Err(AudioError::PlaybackRejected);
        }
        let id = AssetId(state.next_asset);
        state.next_asset += 1;
        state.loaded.insert(id, path.to_path_buf());
        tracing::debug!("(null sink) loaded asset {}", path.display());
        Ok(id)
    }

    fn play_effect(&mut self, asset: AssetId, loops: u32) -> Result<ChannelHandle, AudioError> {
        let mut state = self.inner.lock();
        if state.reject_playback {
            return Err(AudioError::PlaybackRejected);
        }
        if !state.loaded.contains_key(&asset) {
            return Err(AudioError::UnknownAsset);
        }
        let handle = ChannelHandle(state.next_channel);
        state.next_channel += 1;
        state.playing.insert(handle, true);
        state.effect_log.push(EffectPlayback { asset, loops });
        tracing::debug!("(null sink) effect playing asset={asset:?} loops={loops}");
        Ok(handle)
    }

    fn is_channel_playing(&self, handle: ChannelHandle) -> bool {
        self.inner
            .lock()
            .playing
            .get(&handle)
            .copied()
            .unwrap_or(false)
    }

    fn halt_channel(&mut self, handle: ChannelHandle) {
        self.inner.lock().playing.remove(&handle);
    }

    fn play_music(&mut self, path: &Path, looped: bool) -> Result<(), AudioError> {
        let mut state = self.inner.lock();
        if state.reject_playback {
            return Err(AudioError::PlaybackRejected);
        }
        state.music_track = Some(path.to_path_buf());
        state.music_active = true;
        state.music_starts += 1;
        tracing::debug!("(null sink) music start {} looped={looped}", path.display());
        Ok(())
    }

    fn music_playing(&self) -> bool {
        self.inner.lock().music_active
    }

    fn halt_music(&mut self) {
        let mut state = self.inner.lock();
        state.music_active = false;
        state.music_track = None;
    }

    fn set_effects_volume(&mut self, volume: f32) {
        self.inner.lock().effects_volume = volume.clamp(0.0, 1.0);
    }

    fn set_music_volume(&mut self, volume: f32) {
        self.inner.lock().music_volume = volume.clamp(0.0, 1.0);
    }
}
