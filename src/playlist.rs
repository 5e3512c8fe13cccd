use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::catalog::{Catalog, DEFAULT_TRACK_ID};
use crate::sink::PlaybackSink;

/// Stable default shuffle seed so observer runs are reproducible unless a
/// caller overrides it.
pub const DEFAULT_PLAYLIST_SEED: u64 = 0x534F_554E;

/// Shuffled ordering of background tracks with a cursor.
///
/// The order is reshuffled whenever the cursor runs off the end or the base
/// listing is refreshed from the catalog, so the cursor is always in bounds
/// after any mutation. A catalog with zero tracks seeds a single default
/// fallback id so playback never stalls.
#[derive(Debug)]
pub struct Playlist {
    base: Vec<String>,
    order: Vec<String>,
    cursor: usize,
    rng: StdRng,
    seed: u64,
    active_track: Option<String>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::with_seed(DEFAULT_PLAYLIST_SEED)
    }
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            base: Vec::new(),
            order: Vec::new(),
            cursor: 0,
            rng: StdRng::seed_from_u64(seed),
            seed,
            active_track: None,
        }
    }

    /// Re-seed the shuffle RNG and reshuffle the current order.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        if !self.base.is_empty() {
            self.reshuffle();
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Rebuild the base listing from the catalog's known tracks.
    pub fn refresh(&mut self, catalog: &Catalog) {
        let default_id = catalog
            .default_soundtrack_id()
            .unwrap_or(DEFAULT_TRACK_ID)
            .to_string();
        self.rebuild(catalog.soundtrack_ids(), default_id);
    }

    pub(crate) fn rebuild(&mut self, ids: Vec<String>, default_id: String) {
        self.base = if ids.is_empty() { vec![default_id] } else { ids };
        self.reshuffle();
        tracing::debug!(tracks = self.base.len(), "Playlist rebuilt");
    }

    fn reshuffle(&mut self) {
        self.order = self.base.clone();
        self.order.shuffle(&mut self.rng);
        self.cursor = 0;
    }

    /// Advance to the next track that starts successfully, trying at most
    /// one full pass through the order. Wrapping off the end reshuffles and
    /// resets the cursor. Returns false when every candidate fails.
    pub fn advance(
        &mut self,
        manual: bool,
        catalog: &Catalog,
        sink: &mut dyn PlaybackSink,
        music_muted: bool,
    ) -> bool {
        if self.order.is_empty() {
            self.refresh(catalog);
        }
        if self.order.is_empty() {
            return false;
        }

        let attempts = self.order.len();
        for _ in 0..attempts {
            if self.cursor >= self.order.len() {
                self.reshuffle();
            }
            let candidate = self.order[self.cursor].clone();
            self.cursor += 1;

            if self.start_track(&candidate, catalog, sink, music_muted) {
                tracing::info!(track = %candidate, manual, "Playlist advanced");
                return true;
            }
        }

        tracing::warn!("No playable track in playlist, music stays stopped");
        false
    }

    /// Release the current track and start `track_id` through the sink.
    /// While music is muted the track is only marked active; playback is
    /// deferred to the next unmute.
    pub fn start_track(
        &mut self,
        track_id: &str,
        catalog: &Catalog,
        sink: &mut dyn PlaybackSink,
        music_muted: bool,
    ) -> bool {
        sink.halt_music();

        let Some(asset) = catalog.resolve_music_asset(track_id) else {
            tracing::warn!("Missing music asset for track {track_id}");
            return false;
        };

        if music_muted {
            self.active_track = Some(track_id.to_string());
            tracing::debug!("Music muted, deferring start of track {track_id}");
            return true;
        }

        match sink.play_music(asset, true) {
            Ok(()) => {
                self.active_track = Some(track_id.to_string());
                true
            }
            Err(err) => {
                tracing::warn!("Failed to start track {track_id}: {err}");
                self.active_track = None;
                false
            }
        }
    }

    pub fn active_track(&self) -> Option<&str> {
        self.active_track.as_deref()
    }

    pub fn clear_active(&mut self) {
        self.active_track = None;
    }

    /// Current shuffled order, for diagnostics.
    pub fn snapshot(&self) -> Vec<String> {
        self.order.clone()
    }
}
