//! Per-client acknowledgement counters.

use std::sync::atomic::{AtomicU32, Ordering};

/// Point-in-time view of one client's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckSnapshot {
    pub last_received: u32,
    pub last_applied: u32,
}

/// Fixed-capacity table of per-client sequence counters.
///
/// `last_received` is written by the network role, `last_applied` by the
/// simulation role, and the network tick reads both. Every field is a
/// relaxed atomic so neither role ever blocks the other. Entries for
/// clients never seen (or since reset) read as zero; there is no separate
/// "unknown" state.
///
/// The table does not enforce sequence monotonicity: a reordered lower
/// sequence overwrites a higher one. Callers wanting monotonic-only acks
/// compare against [`AckTable::snapshot`] before recording.
#[derive(Debug)]
pub struct AckTable {
    entries: Box<[AckEntry]>,
}

#[derive(Debug)]
struct AckEntry {
    last_received: AtomicU32,
    last_applied: AtomicU32,
}

impl AckEntry {
    fn zeroed() -> Self {
        Self {
            last_received: AtomicU32::new(0),
            last_applied: AtomicU32::new(0),
        }
    }
}

impl AckTable {
    /// Table with `capacity` client slots, all zeroed. Never resized.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: (0..capacity).map(|_| AckEntry::zeroed()).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Records the newest sequence received from `client_id`. Returns false
    /// without touching anything when the id cannot index the table; wire
    /// identities are never trusted as indices.
    pub fn record_received(&self, client_id: u32, seq: u32) -> bool {
        match self.entries.get(client_id as usize) {
            Some(entry) => {
                entry.last_received.store(seq, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Records the newest sequence the simulation applied for `client_id`.
    pub fn record_applied(&self, client_id: u32, seq: u32) -> bool {
        match self.entries.get(client_id as usize) {
            Some(entry) => {
                entry.last_applied.store(seq, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, client_id: u32) -> Option<AckSnapshot> {
        self.entries.get(client_id as usize).map(|entry| AckSnapshot {
            last_received: entry.last_received.load(Ordering::Relaxed),
            last_applied: entry.last_applied.load(Ordering::Relaxed),
        })
    }

    /// Zeroes one client's counters, for when its peer slot is reclaimed by
    /// a new connection.
    pub fn reset_client(&self, client_id: u32) {
        if let Some(entry) = self.entries.get(client_id as usize) {
            entry.last_received.store(0, Ordering::Relaxed);
            entry.last_applied.store(0, Ordering::Relaxed);
        }
    }

    /// Zeroes every entry, for engine shutdown.
    pub fn reset(&self) {
        for entry in self.entries.iter() {
            entry.last_received.store(0, Ordering::Relaxed);
            entry.last_applied.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_clients_read_as_zero() {
        let table = AckTable::new(4);
        assert_eq!(
            table.snapshot(2),
            Some(AckSnapshot {
                last_received: 0,
                last_applied: 0
            })
        );
    }

    #[test]
    fn record_and_snapshot_roundtrip() {
        let table = AckTable::new(4);
        assert!(table.record_received(1, 10));
        assert!(table.record_applied(1, 9));

        let snapshot = table.snapshot(1).unwrap();
        assert_eq!(snapshot.last_received, 10);
        assert_eq!(snapshot.last_applied, 9);
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let table = AckTable::new(4);
        assert!(!table.record_received(4, 1));
        assert!(!table.record_applied(100, 1));
        assert_eq!(table.snapshot(4), None);
    }

    #[test]
    fn applied_is_last_write_wins() {
        let table = AckTable::new(2);
        table.record_applied(0, 5);
        table.record_applied(0, 3);
        assert_eq!(table.snapshot(0).unwrap().last_applied, 3);
    }

    #[test]
    fn reset_client_zeroes_one_entry() {
        let table = AckTable::new(2);
        table.record_received(0, 7);
        table.record_received(1, 8);

        table.reset_client(0);

        assert_eq!(table.snapshot(0).unwrap().last_received, 0);
        assert_eq!(table.snapshot(1).unwrap().last_received, 8);
    }

    #[test]
    fn reset_zeroes_everything() {
        let table = AckTable::new(3);
        for id in 0..3 {
            table.record_received(id, 42);
            table.record_applied(id, 41);
        }

        table.reset();

        for id in 0..3 {
            let snapshot = table.snapshot(id).unwrap();
            assert_eq!(snapshot.last_received, 0);
            assert_eq!(snapshot.last_applied, 0);
        }
    }
}
