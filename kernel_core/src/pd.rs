//! Protection domains and their capability trees
//!
//! A protection domain owns an ordered tree of capability references keyed
//! by domain-local [`Capid`]s. Each reference holds a generation-checked
//! handle to an object identity plus a count of cached fast-path copies.
//! The identity keeps the back link; grant and delete maintain both sides,
//! identity invalidation consumes the tree side wholesale.
//!
//! Deleting a reference while copies of its id are still cached is refused;
//! the cache-count protocol (`cache_cap` / `ack_cap`) keeps the tree and
//! the fast path consistent.

use std::collections::BTreeMap;

use kernel_types::{CapabilityError, CapabilityEvent, Capid, PdId};

use crate::error::KernelError;
use crate::object::{CapSlot, IdentityId, KernelObject};
use crate::Kernel;

/// One capability reference in a domain's tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectIdentityReference {
    pub(crate) identity: IdentityId,
    pub(crate) cached: u32,
}

impl ObjectIdentityReference {
    /// Returns the referenced identity handle
    pub fn identity(&self) -> IdentityId {
        self.identity
    }

    /// Returns the number of cached fast-path copies
    pub fn cached(&self) -> u32 {
        self.cached
    }
}

/// A protection domain
#[derive(Debug)]
pub struct ProtectionDomain {
    pub(crate) id: PdId,
    pub(crate) label: String,
    pub(crate) identity: IdentityId,
    pub(crate) tree: BTreeMap<Capid, ObjectIdentityReference>,
    pub(crate) next_capid: u64,
}

impl ProtectionDomain {
    /// Returns the domain id
    pub fn id(&self) -> PdId {
        self.id
    }

    /// Returns the domain label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the number of capability references in the tree
    pub fn cap_count(&self) -> usize {
        self.tree.len()
    }

    /// Returns the capability ids in the tree, in id order
    pub fn caps(&self) -> impl Iterator<Item = Capid> + '_ {
        self.tree.keys().copied()
    }

    /// Looks up a reference without touching the audit trail
    pub fn find_ref(&self, cap: Capid) -> Option<&ObjectIdentityReference> {
        self.tree.get(&cap)
    }

    fn alloc_capid(&mut self) -> Capid {
        let cap = Capid::from_raw(self.next_capid);
        self.next_capid += 1;
        cap
    }
}

impl Kernel {
    /// Creates a protection domain
    pub fn create_domain(&mut self, label: &str) -> PdId {
        let id = PdId::new();
        let identity = self.identities.create(KernelObject::ProtectionDomain(id));
        self.domains.insert(
            id,
            ProtectionDomain {
                id,
                label: label.to_string(),
                identity,
                tree: BTreeMap::new(),
                // Capid 0 is reserved as invalid.
                next_capid: 1,
            },
        );
        id
    }

    /// Destroys a protection domain
    ///
    /// Unlinks every reference in the tree from its identity (the reverse
    /// direction of revocation) and invalidates the domain's own identity,
    /// which revokes capabilities naming this domain from other trees.
    /// Threads running in the domain must be destroyed first.
    pub fn destroy_domain(&mut self, pd: PdId) -> Result<(), KernelError> {
        let domain = self
            .domains
            .remove(&pd)
            .ok_or(KernelError::DomainNotFound(pd))?;
        for (cap, reference) in &domain.tree {
            if let Some(identity) = self.identities.get_mut(reference.identity) {
                identity.remove_ref(CapSlot { domain: pd, cap: *cap });
            }
        }
        self.invalidate_identity(domain.identity);
        Ok(())
    }

    /// Returns a domain for inspection
    pub fn domain(&self, pd: PdId) -> Option<&ProtectionDomain> {
        self.domains.get(&pd)
    }

    /// Links a new capability reference to an identity into a domain's tree
    ///
    /// Allocates a fresh domain-local id and maintains both sides of the
    /// link. Granting against a stale identity handle is a routine error.
    pub fn grant_cap(&mut self, pd: PdId, identity: IdentityId) -> Result<Capid, KernelError> {
        let object_type = self
            .identities
            .get(identity)
            .map(|entry| entry.object().object_type())
            .ok_or(KernelError::StaleIdentity)?;
        let cap = {
            let domain = self
                .domains
                .get_mut(&pd)
                .ok_or(KernelError::DomainNotFound(pd))?;
            let cap = domain.alloc_capid();
            domain
                .tree
                .insert(cap, ObjectIdentityReference { identity, cached: 0 });
            cap
        };
        if let Some(entry) = self.identities.get_mut(identity) {
            entry.add_ref(CapSlot { domain: pd, cap });
        }
        self.record_cap_event(CapabilityEvent::Granted {
            cap,
            domain: pd,
            object_type,
        });
        Ok(cap)
    }

    /// Resolves a capability id to its identity handle and entity key
    ///
    /// A miss (unknown id, or id whose identity has been invalidated) is
    /// recorded in the capability audit log and returned as a routine
    /// error.
    pub(crate) fn resolve_ref(
        &mut self,
        pd: PdId,
        cap: Capid,
    ) -> Result<(IdentityId, KernelObject), KernelError> {
        let reference = match self.domains.get(&pd) {
            Some(domain) => domain.tree.get(&cap).copied(),
            None => return Err(KernelError::DomainNotFound(pd)),
        };
        let resolved = reference.and_then(|r| {
            self.identities
                .get(r.identity)
                .map(|identity| (r.identity, identity.object()))
        });
        match resolved {
            Some(found) => Ok(found),
            None => {
                self.record_cap_event(CapabilityEvent::LookupMiss { cap, domain: pd });
                Err(CapabilityError::NotFound { domain: pd, cap }.into())
            }
        }
    }

    /// Resolves a capability id to its entity key
    pub fn lookup_object(&mut self, pd: PdId, cap: Capid) -> Result<KernelObject, KernelError> {
        self.resolve_ref(pd, cap).map(|(_, object)| object)
    }

    /// Records one more cached fast-path copy of a capability id
    pub fn cache_cap(&mut self, pd: PdId, cap: Capid) -> Result<(), KernelError> {
        let found = {
            let domain = self
                .domains
                .get_mut(&pd)
                .ok_or(KernelError::DomainNotFound(pd))?;
            match domain.tree.get_mut(&cap) {
                Some(reference) => {
                    reference.cached = reference.cached.saturating_add(1);
                    true
                }
                None => false,
            }
        };
        if found {
            Ok(())
        } else {
            self.record_cap_event(CapabilityEvent::LookupMiss { cap, domain: pd });
            Err(CapabilityError::NotFound { domain: pd, cap }.into())
        }
    }

    /// Releases one cached fast-path copy of a capability id
    pub fn ack_cap(&mut self, pd: PdId, cap: Capid) -> Result<(), KernelError> {
        let found = {
            let domain = self
                .domains
                .get_mut(&pd)
                .ok_or(KernelError::DomainNotFound(pd))?;
            match domain.tree.get_mut(&cap) {
                Some(reference) => {
                    reference.cached = reference.cached.saturating_sub(1);
                    true
                }
                None => false,
            }
        };
        if found {
            Ok(())
        } else {
            self.record_cap_event(CapabilityEvent::LookupMiss { cap, domain: pd });
            Err(CapabilityError::NotFound { domain: pd, cap }.into())
        }
    }

    /// Deletes a capability reference from its owning domain
    ///
    /// Refused while cached copies remain; unlinks both sides otherwise.
    pub fn delete_cap(&mut self, pd: PdId, cap: Capid) -> Result<(), KernelError> {
        let reference = match self.domains.get(&pd) {
            Some(domain) => domain.tree.get(&cap).copied(),
            None => return Err(KernelError::DomainNotFound(pd)),
        };
        let Some(reference) = reference else {
            self.record_cap_event(CapabilityEvent::LookupMiss { cap, domain: pd });
            return Err(CapabilityError::NotFound { domain: pd, cap }.into());
        };
        if reference.cached > 0 {
            return Err(CapabilityError::StillCached {
                cap,
                cached: reference.cached,
            }
            .into());
        }
        if let Some(domain) = self.domains.get_mut(&pd) {
            domain.tree.remove(&cap);
        }
        if let Some(identity) = self.identities.get_mut(reference.identity) {
            identity.remove_ref(CapSlot { domain: pd, cap });
        }
        self.record_cap_event(CapabilityEvent::Deleted { cap, domain: pd });
        Ok(())
    }
}
