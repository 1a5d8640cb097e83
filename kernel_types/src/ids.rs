//! Unique identifiers for kernel entities
//!
//! Every kernel entity (thread, protection domain, signal receiver, signal
//! context, user IRQ, pager object) is keyed by its own id type so that
//! entities of different kinds cannot be confused.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a thread
///
/// Threads are the units of execution. A thread starts inside exactly one
/// protection domain and keeps that binding for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(Uuid);

impl ThreadId {
    /// Creates a new random thread ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a thread ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.0)
    }
}

/// Unique identifier for a protection domain
///
/// A protection domain owns a capability tree. All capability lookups are
/// relative to one domain; the same kernel object may be reachable under
/// different capability ids from different domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PdId(Uuid);

impl PdId {
    /// Creates a new random protection-domain ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a protection-domain ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PdId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pd({})", self.0)
    }
}

/// Unique identifier for a signal receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiverId(Uuid);

impl ReceiverId {
    /// Creates a new random receiver ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a receiver ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReceiverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Receiver({})", self.0)
    }
}

/// Unique identifier for a signal context
///
/// A signal context belongs to exactly one receiver and carries an opaque
/// imprint chosen by its creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalContextId(Uuid);

impl SignalContextId {
    /// Creates a new random signal-context ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a signal-context ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SignalContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignalContext({})", self.0)
    }
}

/// Unique identifier for a user IRQ object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IrqId(Uuid);

impl IrqId {
    /// Creates a new random IRQ ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an IRQ ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for IrqId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IrqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Irq({})", self.0)
    }
}

/// Unique identifier for a pager object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagerId(Uuid);

impl PagerId {
    /// Creates a new random pager ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a pager ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PagerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pager({})", self.0)
    }
}
