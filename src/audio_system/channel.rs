use crate::sink::ChannelHandle;

/// One currently-playing voice: a dispatched effect bound to a sink channel.
///
/// Created on dispatch; removed when the sink stops reporting it as playing,
/// or when `enforce_duration` is set and the countdown reaches zero (the
/// sink is told to halt first).
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub logical_id: String,
    pub loops_remaining: u32,
    /// Countdown in turns. Signed so over-aging past zero stays visible.
    pub duration_ticks: i64,
    /// Whether the countdown is enforced. Unbounded effects (descriptor
    /// duration 0) run until the sink reports completion.
    pub enforce_duration: bool,
    pub handle: ChannelHandle,
}

impl ChannelState {
    pub fn expired(&self) -> bool {
        self.enforce_duration && self.duration_ticks <= 0
    }
}
