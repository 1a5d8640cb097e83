//! Audit trails for capability and fault handling
//!
//! The kernel's observability surface for tests: deterministic, queryable
//! event logs recorded as operations execute.
//!
//! ## Philosophy
//!
//! - Test-only: this is NOT production logging, it's for test verification
//! - Deterministic: events carry the kernel's monotonic event sequence
//! - Queryable: tests assert on the trail to verify revocation and fault
//!   properties

use kernel_types::{CapabilityEvent, Capid, Mapping, ThreadId};
use serde::{Deserialize, Serialize};

/// A single capability audit event with its sequence stamp
#[derive(Debug, Clone)]
pub struct CapabilityAuditEvent {
    /// Kernel event sequence number when the event occurred
    pub seq: u64,
    /// The capability event that occurred
    pub event: CapabilityEvent,
}

/// Audit log for capability operations
///
/// Maintains a chronological record of grant, invalidation, deletion, and
/// lookup-miss events.
#[derive(Debug, Default)]
pub struct CapabilityAuditLog {
    events: Vec<CapabilityAuditEvent>,
}

impl CapabilityAuditLog {
    /// Creates a new empty audit log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Records a capability event at the given sequence stamp
    pub fn record(&mut self, seq: u64, event: CapabilityEvent) {
        self.events.push(CapabilityAuditEvent { seq, event });
    }

    /// Returns all recorded events
    pub fn events(&self) -> &[CapabilityAuditEvent] {
        &self.events
    }

    /// Returns events for a specific capability id
    pub fn events_for_cap(&self, cap: Capid) -> Vec<&CapabilityAuditEvent> {
        self.events.iter().filter(|e| e.event.cap() == cap).collect()
    }

    /// Counts events matching the predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapabilityEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(&e.event)).count()
    }

    /// Checks if any event matches the predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&CapabilityEvent) -> bool,
    {
        self.events.iter().any(|e| predicate(&e.event))
    }

    /// Clears all events (useful for test reset)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns the number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Checks if the audit log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Page-fault handling event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultEvent {
    /// A pager policy translated the fault into a mapping
    Resolved {
        thread: ThreadId,
        addr: u64,
        mapping: Mapping,
    },
    /// The fault could not be resolved and was reflected upward
    Unresolved { thread: ThreadId, addr: u64 },
}

/// A single fault audit event with its sequence stamp
#[derive(Debug, Clone)]
pub struct FaultAuditEvent {
    pub seq: u64,
    pub event: FaultEvent,
}

/// Audit log for page-fault handling
#[derive(Debug, Default)]
pub struct FaultAuditLog {
    events: Vec<FaultAuditEvent>,
}

impl FaultAuditLog {
    /// Creates a new empty audit log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Records a fault event at the given sequence stamp
    pub fn record(&mut self, seq: u64, event: FaultEvent) {
        self.events.push(FaultAuditEvent { seq, event });
    }

    /// Returns all recorded events
    pub fn events(&self) -> &[FaultAuditEvent] {
        &self.events
    }

    /// Counts events matching the predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&FaultEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(&e.event)).count()
    }

    /// Checks if any event matches the predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&FaultEvent) -> bool,
    {
        self.events.iter().any(|e| predicate(&e.event))
    }

    /// Clears all events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns the number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Checks if the audit log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
