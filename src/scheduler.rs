use std::collections::HashMap;

use crate::catalog::{EffectDescriptor, PlaybackMode};
use crate::request::EffectRequest;

/// A request bound to its descriptor and a computed absolute start turn.
/// One-shot: created at flush time, removed on dispatch.
#[derive(Debug, Clone)]
pub struct ScheduledEffect {
    pub request: EffectRequest,
    pub descriptor: EffectDescriptor,
    pub scheduled_tick: u64,
    /// Loop count after applying the descriptor's scale rule.
    pub loops: u32,
    /// Total nominal duration in turns for all loops.
    pub duration_ticks: u32,
}

/// Converts finalized requests into time-stamped scheduled effects.
///
/// Queue-mode effects for one logical id are serialized through a per-id
/// tail tick: a new effect never starts before the previous one's computed
/// end, so they play in submission order and never overlap. The tail map is
/// owned exclusively here.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue_tails: HashMap<String, u64>,
    pending: Vec<ScheduledEffect>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule one resolved request at turn `current_turn`, appending it to
    /// the pending list. No dispatch happens here.
    pub fn schedule(
        &mut self,
        request: EffectRequest,
        descriptor: EffectDescriptor,
        current_turn: u64,
    ) {
        let loops = compute_loops(&request, &descriptor);
        let duration_ticks = compute_duration_ticks(loops, &descriptor);

        let mut start_tick = current_turn + u64::from(request.requested_delay_ticks);
        if descriptor.behavior.mode == PlaybackMode::Queue {
            let tail = self
                .queue_tails
                .get(&descriptor.logical_id)
                .copied()
                .unwrap_or(0);
            if tail > start_tick {
                start_tick = tail;
            }
            self.queue_tails.insert(
                descriptor.logical_id.clone(),
                start_tick + u64::from(duration_ticks),
            );
        }

        tracing::info!(
            turn = current_turn,
            event = %request.logical_event,
            start_tick,
            loops,
            metadata = %request.metadata,
            "Scheduled effect"
        );

        self.pending.push(ScheduledEffect {
            request,
            descriptor,
            scheduled_tick: start_tick,
            loops,
            duration_ticks,
        });
    }

    /// Remove and return every scheduled effect whose start turn has
    /// arrived, preserving scheduling order.
    pub fn take_due(&mut self, current_turn: u64) -> Vec<ScheduledEffect> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].scheduled_tick <= current_turn {
                due.push(self.pending.remove(index));
            } else {
                index += 1;
            }
        }
        due
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop all pending effects and queue tails. Used on shutdown.
    pub fn clear(&mut self) {
        self.queue_tails.clear();
        self.pending.clear();
    }
}

/// Loop count for a request against its descriptor. Without a scale rule the
/// caller's suggestion wins (at least one loop). With a rule, a non-positive
/// `per_quantity` clamps the caller's suggestion into the rule's range;
/// otherwise loops derive from the quantity payload.
fn compute_loops(request: &EffectRequest, descriptor: &EffectDescriptor) -> u32 {
    let Some(scale) = descriptor.behavior.scale else {
        return request.requested_loops.max(1);
    };

    if scale.per_quantity <= 0.0 {
        return request
            .requested_loops
            .max(scale.min_loops)
            .clamp(scale.min_loops, scale.max_loops);
    }

    let quantity = request.quantity.max(0.0);
    let mut computed = (quantity / scale.per_quantity).ceil() as u32;
    if computed == 0 {
        computed = scale.min_loops;
    }
    computed.clamp(scale.min_loops, scale.max_loops)
}

/// Total duration in turns: one loop counts for at least one turn.
fn compute_duration_ticks(loops: u32, descriptor: &EffectDescriptor) -> u32 {
    descriptor.behavior.duration_ticks.max(1) * loops.max(1)
}
