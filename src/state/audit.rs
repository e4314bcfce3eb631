//! Bounded in-memory audit trail of operator actions.

use std::collections::VecDeque;

use super::pad::PadId;

/// Entries retained before the oldest is evicted.
pub const AUDIT_CAPACITY: usize = 800;

/// One recorded action, applied or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Monotonic entry id, unique for the life of the process.
    pub id: u64,
    /// Wall-clock instant the action was recorded, epoch ms.
    pub ts: i64,
    /// Pad the action targeted, when pad-scoped.
    pub pad_id: Option<PadId>,
    /// Short action tag, stable across releases.
    pub action: String,
    /// Human-readable outcome detail.
    pub detail: String,
}

/// Ring buffer of [`AuditEntry`] values, newest last.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    next_id: u64,
}

impl AuditLog {
    /// Append an entry, evicting the oldest past [`AUDIT_CAPACITY`].
    pub fn record(
        &mut self,
        ts: i64,
        pad_id: Option<PadId>,
        action: &str,
        detail: impl Into<String>,
    ) {
        self.next_id += 1;
        self.entries.push_back(AuditEntry {
            id: self.next_id,
            ts,
            pad_id,
            action: action.to_owned(),
            detail: detail.into(),
        });
        while self.entries.len() > AUDIT_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Entries currently retained, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_arrival_order_and_unique_ids() {
        let mut log = AuditLog::default();
        log.record(1, Some(3), "insert", "team a to now");
        log.record(2, None, "global-break", "15 min");

        let entries: Vec<_> = log.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "insert");
        assert_eq!(entries[0].pad_id, Some(3));
        assert_eq!(entries[1].pad_id, None);
        assert!(entries[0].id < entries[1].id);
    }

    #[test]
    fn capacity_evicts_the_oldest_entries() {
        let mut log = AuditLog::default();
        for n in 0..AUDIT_CAPACITY as i64 + 25 {
            log.record(n, None, "tick", n.to_string());
        }

        assert_eq!(log.len(), AUDIT_CAPACITY);
        let first = log.entries().next().unwrap();
        assert_eq!(first.ts, 25);
        // Ids never restart even after eviction.
        assert_eq!(first.id, 26);
    }

    #[test]
    fn empty_log_reports_empty() {
        let log = AuditLog::default();
        assert!(log.is_empty());
        assert_eq!(log.entries().count(), 0);
    }
}
