use std::collections::HashMap;

/// Origin index for requests not attributed to any actor/team.
pub const GLOBAL_ORIGIN: i32 = -1;

/// Separator used when merged requests concatenate their metadata.
const METADATA_SEPARATOR: &str = "; ";

/// One instance of "play this logical sound because X happened".
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRequest {
    /// Stable identifier, e.g. "team1.dock.default" (catalog key).
    pub logical_event: String,
    /// Scalar payload (damage, vinyl delivered, ...) used for loop scaling.
    pub quantity: f64,
    /// Number of raw occurrences collapsed into this request.
    pub count: u32,
    /// Originating actor/team slot, or [`GLOBAL_ORIGIN`].
    pub origin_index: i32,
    /// Free-form diagnostic context, concatenated on merge.
    pub metadata: String,
    /// Turns to wait before starting; filled from the descriptor if zero.
    pub requested_delay_ticks: u32,
    /// Caller-suggested repeat count; scaling rules may override it.
    pub requested_loops: u32,
    /// Bypass dedupe and queue verbatim in submission order.
    pub preserve_duplicates: bool,
}

impl Default for EffectRequest {
    fn default() -> Self {
        Self {
            logical_event: String::new(),
            quantity: 0.0,
            count: 1,
            origin_index: GLOBAL_ORIGIN,
            metadata: String::new(),
            requested_delay_ticks: 0,
            requested_loops: 1,
            preserve_duplicates: false,
        }
    }
}

impl EffectRequest {
    pub fn new(logical_event: impl Into<String>) -> Self {
        Self {
            logical_event: logical_event.into(),
            ..Self::default()
        }
    }

    /// Fold another occurrence of the same `(logical_event, origin_index)`
    /// into this request: counts and quantities sum, loops take the max,
    /// non-empty metadata concatenates.
    fn merge(&mut self, other: &EffectRequest) {
        self.count += other.count;
        self.quantity += other.quantity;
        self.requested_loops = self.requested_loops.max(other.requested_loops);
        if !other.metadata.is_empty() {
            if !self.metadata.is_empty() {
                self.metadata.push_str(METADATA_SEPARATOR);
            }
            self.metadata.push_str(&other.metadata);
        }
    }
}

/// Accumulates effect requests raised during one turn and coalesces
/// duplicates.
///
/// Exactly one subtick (aggregation window) is open at a time. Requests
/// marked `preserve_duplicates` skip the merge table and keep their
/// submission order; everything else merges by `(logical_event,
/// origin_index)`. Sealing moves the verbatim list first, then the merged
/// entries, into the pending-flush list. No I/O happens here.
#[derive(Debug, Default)]
pub struct RequestBuffer {
    merged: HashMap<(String, i32), EffectRequest>,
    verbatim: Vec<EffectRequest>,
    pending_flush: Vec<EffectRequest>,
    subtick_open: bool,
}

impl RequestBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the per-turn aggregation window. Idempotent: a second call while
    /// a subtick is open does not clear anything.
    pub fn begin_subtick(&mut self) {
        if self.subtick_open {
            return;
        }
        self.merged.clear();
        self.verbatim.clear();
        self.subtick_open = true;
    }

    pub fn queue_effect(&mut self, request: EffectRequest) {
        if !self.subtick_open {
            self.begin_subtick();
        }

        if request.preserve_duplicates {
            self.verbatim.push(request);
            return;
        }

        let key = (request.logical_event.clone(), request.origin_index);
        match self.merged.get_mut(&key) {
            Some(existing) => existing.merge(&request),
            None => {
                self.merged.insert(key, request);
            }
        }
    }

    /// Close the subtick, moving verbatim entries (in submission order) and
    /// then merged entries into the pending-flush list.
    pub fn seal_subtick(&mut self) {
        if !self.subtick_open {
            return;
        }

        self.pending_flush.append(&mut self.verbatim);
        self.pending_flush.extend(self.merged.drain().map(|(_, v)| v));
        self.subtick_open = false;
    }

    /// Drain and return everything sealed since the last call.
    pub fn consume_pending(&mut self) -> Vec<EffectRequest> {
        std::mem::take(&mut self.pending_flush)
    }

    /// Reset all internal state. Used on shutdown.
    pub fn clear_all(&mut self) {
        self.merged.clear();
        self.verbatim.clear();
        self.pending_flush.clear();
        self.subtick_open = false;
    }

    pub fn subtick_open(&self) -> bool {
        self.subtick_open
    }
}
