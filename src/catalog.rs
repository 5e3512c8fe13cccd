use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::config::{BehaviorEntry, EffectEntry, SoundConfig};

/// Logical id used when the catalog has no soundtrack entries at all. The
/// fallback set always maps this id to an asset so music can never stall.
pub const DEFAULT_TRACK_ID: &str = "soundtrack.default";

/// Conventional asset subdirectory probed under the asset-root override.
const ASSET_SUBDIR: &str = "sound";

/// How concurrent playback of the same logical effect behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// New instances layer on top of anything already playing.
    #[default]
    Simultaneous,
    /// Same-id effects are serialized: ordered, never overlapping.
    Queue,
    /// A new instance halts any already-playing instance of the same id.
    Truncate,
}

impl PlaybackMode {
    fn parse(value: &str) -> Self {
        match value {
            "queue" => PlaybackMode::Queue,
            "truncate" | "cutoff" => PlaybackMode::Truncate,
            _ => PlaybackMode::Simultaneous,
        }
    }
}

/// Derives a loop count from a request's quantity payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRule {
    pub per_quantity: f64,
    pub min_loops: u32,
    pub max_loops: u32,
}

impl Default for ScaleRule {
    fn default() -> Self {
        Self {
            per_quantity: 0.0,
            min_loops: 1,
            max_loops: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectBehavior {
    pub mode: PlaybackMode,
    /// Nominal one-loop duration in turns. 0 = unbounded, sink-determined.
    pub duration_ticks: u32,
    /// Default start delay in turns applied when a request specifies none.
    pub delay_ticks: u32,
    pub scale: Option<ScaleRule>,
}

/// The catalog's resolution of a logical event: an asset plus its playback
/// behavior.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectDescriptor {
    pub logical_id: String,
    pub asset_path: PathBuf,
    pub behavior: EffectBehavior,
}

/// Resolves logical event identifiers to playable descriptors.
///
/// Loading merges hard-coded fallback descriptors with entries materialized
/// from a [`SoundConfig`]; later entries override earlier ones field-by-field
/// and may `inherit` another entry's full descriptor first. Loading never
/// fails destructively: a missing or malformed config leaves the fallback set
/// in place, so the system always has a playable default soundtrack id and a
/// handful of default effects. Immutable after `load`.
#[derive(Debug, Clone)]
pub struct Catalog {
    effects: HashMap<String, EffectDescriptor>,
    music: HashMap<String, PathBuf>,
    default_soundtrack_id: Option<String>,
    base_dir: Option<PathBuf>,
    asset_root_override: Option<PathBuf>,
    soundtrack_volume_percent: u8,
    effects_volume_percent: u8,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut catalog = Self {
            effects: HashMap::new(),
            music: HashMap::new(),
            default_soundtrack_id: None,
            base_dir: None,
            asset_root_override: None,
            soundtrack_volume_percent: 100,
            effects_volume_percent: 100,
        };
        catalog.register_default_fallbacks();
        catalog
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the directory probed first when resolving relative asset paths.
    pub fn set_asset_root_override(&mut self, asset_root: Option<PathBuf>) {
        self.asset_root_override = asset_root.filter(|p| !p.as_os_str().is_empty());
    }

    /// Load catalog entries from a configuration file, merged over the
    /// built-in fallbacks. Degrades to the fallback set on any failure.
    pub fn load(&mut self, config_path: &Path) {
        let override_backup = self.asset_root_override.take();
        *self = Self::default();
        self.asset_root_override = override_backup;

        if config_path.is_dir() {
            self.base_dir = Some(config_path.to_path_buf());
            tracing::warn!(
                "Sound config path is a directory, keeping fallback catalog: {}",
                config_path.display()
            );
            return;
        }
        if !config_path.exists() {
            tracing::warn!(
                "Sound config not found, keeping fallback catalog: {}",
                config_path.display()
            );
            return;
        }
        self.base_dir = config_path.parent().map(Path::to_path_buf);

        let config = match SoundConfig::load(config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Unable to load sound config, keeping fallback catalog: {err}");
                return;
            }
        };

        self.apply_config(config);
        tracing::info!(
            effects = self.effects.len(),
            tracks = self.music.len(),
            "Sound catalog loaded from {}",
            config_path.display()
        );
    }

    fn apply_config(&mut self, config: SoundConfig) {
        self.soundtrack_volume_percent = config.volume.soundtrack.min(100);
        self.effects_volume_percent = config.volume.effects.min(100);

        if let Some(first) = config.soundtrack.songs.iter().find(|s| !s.is_empty()) {
            self.default_soundtrack_id = Some(first.clone());
        }
        for (track_id, file) in &config.soundtrack.files {
            if track_id.is_empty() || file.is_empty() {
                continue;
            }
            let resolved = self.resolve_asset_path(file);
            self.music.insert(track_id.clone(), resolved);
        }
        // Songs listed without an explicit file mapping resolve the id itself
        // as a relative path.
        for song in &config.soundtrack.songs {
            if song.is_empty() || self.music.contains_key(song) {
                continue;
            }
            let resolved = self.resolve_asset_path(song);
            self.music.insert(song.clone(), resolved);
        }

        self.materialize_effects(config.effects);
    }

    /// Typed materialization pass: turns raw entries into descriptors,
    /// resolving `inherit` references iteratively. An entry becomes ready
    /// once its inherit target is final (or missing); if a pass makes no
    /// progress the remaining entries form a cycle, which is reported and
    /// broken by applying those entries without their inherit step.
    fn materialize_effects(&mut self, mut pending: BTreeMap<String, EffectEntry>) {
        while !pending.is_empty() {
            let ready: Vec<String> = pending
                .iter()
                .filter(|(_, entry)| match entry.inherit.as_deref() {
                    Some(target) => !pending.contains_key(target),
                    None => true,
                })
                .map(|(id, _)| id.clone())
                .collect();

            if ready.is_empty() {
                for (id, entry) in std::mem::take(&mut pending) {
                    tracing::warn!(
                        "Cyclic inherit chain at {id} -> {:?}, applying without inherit",
                        entry.inherit
                    );
                    self.materialize_entry(&id, &entry, false);
                }
                break;
            }

            for id in ready {
                let entry = pending.remove(&id).expect("ready id came from pending");
                self.materialize_entry(&id, &entry, true);
            }
        }
    }

    fn materialize_entry(&mut self, logical_id: &str, entry: &EffectEntry, allow_inherit: bool) {
        let mut descriptor = match self.effects.get(logical_id) {
            Some(existing) => existing.clone(),
            None => EffectDescriptor {
                logical_id: logical_id.to_string(),
                ..EffectDescriptor::default()
            },
        };

        if allow_inherit {
            if let Some(target) = entry.inherit.as_deref() {
                match self.effects.get(target) {
                    Some(base) => {
                        descriptor = base.clone();
                        descriptor.logical_id = logical_id.to_string();
                    }
                    None => {
                        tracing::warn!("Inherit target not found for {logical_id} -> {target}");
                    }
                }
            }
        }

        if let Some(file) = entry.file.as_deref() {
            if !file.is_empty() {
                descriptor.asset_path = self.resolve_asset_path(file);
            }
        }

        if let Some(behavior) = &entry.behavior {
            apply_behavior_overrides(&mut descriptor.behavior, behavior);
        }

        if let Some(scale) = &mut descriptor.behavior.scale {
            if scale.max_loops < scale.min_loops {
                scale.max_loops = scale.min_loops;
            }
        }

        if descriptor.asset_path.as_os_str().is_empty() {
            tracing::warn!("Effect entry {logical_id} has no asset file, skipping");
            return;
        }
        self.effects.insert(logical_id.to_string(), descriptor);
    }

    /// Search order for a relative asset reference: absolute paths pass
    /// through; then the override root, the override root's conventional
    /// subdirectory, the directory adjacent to the config file, and finally
    /// the config file's own directory.
    fn resolve_asset_path(&self, relative: &str) -> PathBuf {
        let rel = Path::new(relative);
        if rel.is_absolute() {
            return rel.to_path_buf();
        }

        if let Some(root) = &self.asset_root_override {
            let candidate = root.join(rel);
            if candidate.exists() {
                return candidate;
            }
            let candidate = root.join(ASSET_SUBDIR).join(rel);
            if candidate.exists() {
                return candidate;
            }
        }

        if let Some(base) = &self.base_dir {
            if let Some(parent) = base.parent() {
                let adjacent = parent.join(rel);
                if adjacent.exists() {
                    return adjacent;
                }
            }
            return base.join(rel);
        }

        rel.to_path_buf()
    }

    /// Resolve a logical event to a descriptor: exact match first, then the
    /// generic team fallback formed by replacing the prefix before the first
    /// separator (`team2.dock.default` -> `team.dock.default`).
    pub fn resolve(&self, logical_event: &str) -> Option<&EffectDescriptor> {
        if let Some(descriptor) = self.effects.get(logical_event) {
            return Some(descriptor);
        }

        if let Some(dot) = logical_event.find('.') {
            let fallback = format!("team{}", &logical_event[dot..]);
            return self.effects.get(&fallback);
        }

        None
    }

    pub fn resolve_music_asset(&self, track_id: &str) -> Option<&Path> {
        self.music.get(track_id).map(PathBuf::as_path)
    }

    pub fn default_soundtrack_id(&self) -> Option<&str> {
        if let Some(id) = self.default_soundtrack_id.as_deref() {
            return Some(id);
        }
        if self.music.contains_key(DEFAULT_TRACK_ID) {
            return Some(DEFAULT_TRACK_ID);
        }
        None
    }

    /// All known track ids, sorted for deterministic playlist seeding.
    pub fn soundtrack_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.music.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn soundtrack_volume_percent(&self) -> u8 {
        self.soundtrack_volume_percent
    }

    pub fn effects_volume_percent(&self) -> u8 {
        self.effects_volume_percent
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Baseline entries that keep the observer functional without any user
    /// configuration. Parsed config values override these.
    fn register_default_fallbacks(&mut self) {
        let mut register = |id: &str, path: &str| {
            self.effects.insert(
                id.to_string(),
                EffectDescriptor {
                    logical_id: id.to_string(),
                    asset_path: PathBuf::from(path),
                    behavior: EffectBehavior::default(),
                },
            );
        };

        register("team.launch.default", "sound/launch_default.wav");
        register("team.dock.default", "sound/dock_default.wav");
        register("team.damage.shield", "sound/shield_hit.wav");
        register("team.deliver_vinyl.default", "sound/vinyl_delivered.wav");
        register("team.ship.destroyed", "sound/ship_destroyed.wav");

        self.music.insert(
            DEFAULT_TRACK_ID.to_string(),
            PathBuf::from("sound/soundtrack_loop.mp3"),
        );
    }
}

fn apply_behavior_overrides(behavior: &mut EffectBehavior, entry: &BehaviorEntry) {
    if let Some(mode) = entry.mode.as_deref() {
        behavior.mode = PlaybackMode::parse(mode);
    }
    if let Some(duration) = entry.duration_ticks {
        behavior.duration_ticks = duration;
    }
    if let Some(delay) = entry.delay_ticks {
        behavior.delay_ticks = delay;
    }
    if let Some(scale) = &entry.scale {
        let rule = behavior.scale.get_or_insert_with(ScaleRule::default);
        if let Some(per_quantity) = scale.per_quantity {
            rule.per_quantity = per_quantity.max(0.0);
        }
        if let Some(min_loops) = scale.min_loops {
            rule.min_loops = min_loops.max(1);
        }
        if let Some(max_loops) = scale.max_loops {
            rule.max_loops = max_loops.max(1);
        }
    }
}
