//! Network-to-simulation input handoff.

use parking_lot::Mutex;
use shared::ClientInput;

/// A decoded input plus the absolute simulation tick it must be applied at.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledInput {
    pub target_tick: u64,
    pub input: ClientInput,
}

/// Append-only batch buffer between the network role (producer) and the
/// simulation role (consumer).
///
/// Pushes always succeed; there is no backpressure because inputs are small
/// and bounded by the network rate, not by producer speed. The drain hands
/// the whole batch over by swapping the backing vector, keeping the lock
/// held for O(1) on the latency-sensitive simulation tick.
///
/// The queue promises no ordering across the batch; items are re-bucketed
/// by target tick in the scheduling ring.
#[derive(Debug, Default)]
pub struct InputHandoffQueue {
    pending: Mutex<Vec<ScheduledInput>>,
}

impl InputHandoffQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: ScheduledInput) {
        self.pending.lock().push(item);
    }

    /// Detaches and returns everything pushed since the previous drain.
    pub fn drain_all(&self) -> Vec<ScheduledInput> {
        std::mem::take(&mut *self.pending.lock())
    }
}
