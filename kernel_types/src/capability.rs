//! Capability ids, object type tags, and capability audit events
//!
//! A capability is a domain-local name for a kernel object. The kernel
//! resolves a [`Capid`] against the calling domain's capability tree; the
//! resolved object carries an [`ObjectType`] tag that is checked against the
//! requested operation. Both steps can fail, and both failures are routine
//! typed errors, never kernel faults.
//!
//! ## Design Principles
//!
//! 1. **Unforgeable**: capability ids are allocated by the kernel per domain
//! 2. **Domain-local**: the same object has unrelated ids in different domains
//! 3. **Revocable**: invalidating an object removes every id that named it
//! 4. **Testable**: every lifecycle step emits a [`CapabilityEvent`]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ids::PdId;

/// A domain-local capability id
///
/// Capids are small integers allocated per protection domain. Capid 0 is
/// reserved as the invalid id and is never handed out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Capid(u64);

impl Capid {
    /// The reserved invalid capability id
    pub const INVALID: Capid = Capid(0);

    /// Creates a capability id from its raw value
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Returns true for the reserved invalid id
    pub fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Capid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cap:{}", self.0)
    }
}

/// Kind tag of a kernel object
///
/// Every object identity carries its kind; typed lookups compare this tag
/// and fail with [`CapabilityError::WrongType`] on mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Thread,
    ProtectionDomain,
    SignalReceiver,
    SignalContext,
    Irq,
    Pager,
    /// Reserved for virtual-CPU backends; no entity of this kind exists yet
    Vcpu,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Thread => write!(f, "thread"),
            ObjectType::ProtectionDomain => write!(f, "protection domain"),
            ObjectType::SignalReceiver => write!(f, "signal receiver"),
            ObjectType::SignalContext => write!(f, "signal context"),
            ObjectType::Irq => write!(f, "irq"),
            ObjectType::Pager => write!(f, "pager"),
            ObjectType::Vcpu => write!(f, "vcpu"),
        }
    }
}

/// Errors related to capability operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityError {
    /// The id does not name an object in the calling domain
    #[error("no capability {cap} in domain {domain}")]
    NotFound { domain: PdId, cap: Capid },

    /// The id names an object of a different kind
    #[error("capability {cap} does not refer to a {expected}")]
    WrongType { cap: Capid, expected: ObjectType },

    /// Deletion refused while fast-path copies of the id remain cached
    #[error("capability {cap} still has {cached} cached copies")]
    StillCached { cap: Capid, cached: u32 },
}

/// Capability lifecycle event, recorded in the capability audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityEvent {
    /// A new reference to an object was linked into a domain's tree
    Granted {
        cap: Capid,
        domain: PdId,
        object_type: ObjectType,
    },
    /// A reference was unlinked because its object identity was invalidated
    Invalidated { cap: Capid, domain: PdId },
    /// A reference was deleted by its owning domain
    Deleted { cap: Capid, domain: PdId },
    /// A lookup named an id with no current binding
    LookupMiss { cap: Capid, domain: PdId },
}

impl CapabilityEvent {
    /// Returns the capability id the event concerns
    pub fn cap(&self) -> Capid {
        match self {
            CapabilityEvent::Granted { cap, .. }
            | CapabilityEvent::Invalidated { cap, .. }
            | CapabilityEvent::Deleted { cap, .. }
            | CapabilityEvent::LookupMiss { cap, .. } => *cap,
        }
    }
}
