//! Kernel object identities
//!
//! Every kernel entity is owned by exactly one [`ObjectIdentity`]: a facade
//! that ties the entity's existence to the list of capability references
//! that name it. Identities live in a generational arena; handles into the
//! arena carry the slot generation, so a handle kept across the identity's
//! invalidation simply stops resolving. A miss is a routine `None`, never
//! stale data.
//!
//! Invalidation happens exactly once, at entity destruction. It walks every
//! outstanding reference and unlinks it from its domain's capability tree
//! (the other side of the two-sided link kept by [`crate::pd`]).

use std::fmt;

use kernel_types::{
    Capid, IrqId, ObjectType, PagerId, PdId, ReceiverId, SignalContextId, ThreadId,
};
use kernel_types::CapabilityEvent;
use serde::{Deserialize, Serialize};

use crate::Kernel;

/// Generation-checked handle to an object identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId {
    index: u32,
    generation: u32,
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "identity:{}.{}", self.index, self.generation)
    }
}

/// The entity wrapped by an object identity
///
/// A closed enum over entity keys. Typed accessors return `None` on a kind
/// mismatch; a wrong-typed lookup is never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelObject {
    Thread(ThreadId),
    ProtectionDomain(PdId),
    SignalReceiver(ReceiverId),
    SignalContext(SignalContextId),
    Irq(IrqId),
    Pager(PagerId),
}

impl KernelObject {
    /// Returns the kind tag of the wrapped entity
    pub fn object_type(&self) -> ObjectType {
        match self {
            KernelObject::Thread(_) => ObjectType::Thread,
            KernelObject::ProtectionDomain(_) => ObjectType::ProtectionDomain,
            KernelObject::SignalReceiver(_) => ObjectType::SignalReceiver,
            KernelObject::SignalContext(_) => ObjectType::SignalContext,
            KernelObject::Irq(_) => ObjectType::Irq,
            KernelObject::Pager(_) => ObjectType::Pager,
        }
    }

    pub fn as_thread(&self) -> Option<ThreadId> {
        match self {
            KernelObject::Thread(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_domain(&self) -> Option<PdId> {
        match self {
            KernelObject::ProtectionDomain(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_receiver(&self) -> Option<ReceiverId> {
        match self {
            KernelObject::SignalReceiver(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<SignalContextId> {
        match self {
            KernelObject::SignalContext(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_irq(&self) -> Option<IrqId> {
        match self {
            KernelObject::Irq(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_pager(&self) -> Option<PagerId> {
        match self {
            KernelObject::Pager(id) => Some(*id),
            _ => None,
        }
    }
}

/// One outstanding capability reference to an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapSlot {
    pub domain: PdId,
    pub cap: Capid,
}

/// Identity of one kernel object
///
/// Owns the entity key and the list of capability references that currently
/// name the object. The list is maintained by grant/delete on the domain
/// side and consumed wholesale on invalidation.
#[derive(Debug)]
pub struct ObjectIdentity {
    object: KernelObject,
    refs: Vec<CapSlot>,
}

impl ObjectIdentity {
    fn new(object: KernelObject) -> Self {
        Self {
            object,
            refs: Vec::new(),
        }
    }

    /// Returns the wrapped entity key
    pub fn object(&self) -> KernelObject {
        self.object
    }

    /// Returns the outstanding references
    pub fn refs(&self) -> &[CapSlot] {
        &self.refs
    }

    pub(crate) fn add_ref(&mut self, slot: CapSlot) {
        self.refs.push(slot);
    }

    pub(crate) fn remove_ref(&mut self, slot: CapSlot) {
        self.refs.retain(|&existing| existing != slot);
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<ObjectIdentity>,
}

/// Generational arena of object identities
///
/// Slots are reused; each reuse bumps the slot generation so handles into
/// the previous occupancy fail their generation check.
#[derive(Debug, Default)]
pub struct IdentityTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an identity for the given entity key
    pub fn create(&mut self, object: KernelObject) -> IdentityId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.entry = Some(ObjectIdentity::new(object));
            IdentityId {
                index: index as u32,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                entry: Some(ObjectIdentity::new(object)),
            });
            IdentityId {
                index: index as u32,
                generation: 0,
            }
        }
    }

    /// Resolves a handle; a stale generation yields `None`
    pub fn get(&self, id: IdentityId) -> Option<&ObjectIdentity> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: IdentityId) -> Option<&mut ObjectIdentity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Retires an identity and returns it for teardown
    ///
    /// Bumps the slot generation so the handle (and any copy of it) goes
    /// stale. Retiring an already-stale handle returns `None`.
    pub(crate) fn retire(&mut self, id: IdentityId) -> Option<ObjectIdentity> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index as usize);
        Some(entry)
    }

    /// Returns the number of live identities
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Kernel {
    /// Invalidates an object identity, revoking every reference to it
    ///
    /// Walks the outstanding references and unlinks each from its domain's
    /// capability tree, recording an `Invalidated` audit event per
    /// reference. Happens at most once per identity; a stale handle makes
    /// this a no-op.
    pub(crate) fn invalidate_identity(&mut self, id: IdentityId) {
        let Some(identity) = self.identities.retire(id) else {
            return;
        };
        for slot in identity.refs() {
            if let Some(domain) = self.domains.get_mut(&slot.domain) {
                domain.tree.remove(&slot.cap);
            }
            self.record_cap_event(CapabilityEvent::Invalidated {
                cap: slot.cap,
                domain: slot.domain,
            });
        }
    }

    /// Resolves an identity handle to its entity key
    pub fn identity_object(&self, id: IdentityId) -> Option<KernelObject> {
        self.identities.get(id).map(|identity| identity.object())
    }
}
