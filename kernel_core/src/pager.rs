//! Page-fault resolution
//!
//! A faulting thread's pager decides what happens: either the fault
//! translates into a mapping and the thread keeps running, or it does not
//! and the thread blocks while the fault is reflected upward as a signal.
//!
//! Pager policies form a closed set. `Fixed` serves exactly one
//! pre-configured mapping, `DirectMapped` identity-maps any page with the
//! configured permissions, `Deny` resolves nothing. A thread holds its
//! pager by identity handle, so a destroyed pager degrades into the
//! unresolved path instead of dangling.

use kernel_types::{FaultInfo, Mapping, PagerId, ThreadId, PAGE_SIZE};
use kernel_types::memory::{page_base, CacheAttribute, MemoryPerms};
use serde::{Deserialize, Serialize};

use crate::audit::FaultEvent;
use crate::error::KernelError;
use crate::object::{IdentityId, KernelObject};
use crate::thread::ThreadState;
use crate::Kernel;

/// What a pager does with a fault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagerPolicy {
    /// Serves faults inside one pre-configured mapping
    Fixed(Mapping),
    /// Identity-maps the faulting page
    DirectMapped {
        permissions: MemoryPerms,
        attribute: CacheAttribute,
    },
    /// Resolves nothing
    Deny,
}

/// Outcome of asking a pager about a fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerDecision {
    Resolved(Mapping),
    Stop,
}

/// A pager kernel object
#[derive(Debug)]
pub struct PagerObject {
    pub(crate) id: PagerId,
    pub(crate) identity: IdentityId,
    pub(crate) policy: PagerPolicy,
}

impl PagerObject {
    pub fn id(&self) -> PagerId {
        self.id
    }

    pub fn policy(&self) -> &PagerPolicy {
        &self.policy
    }

    /// Applies the policy to a fault
    pub fn decide(&self, fault: &FaultInfo) -> PagerDecision {
        match &self.policy {
            PagerPolicy::Fixed(mapping) => {
                if mapping.contains(fault.addr) && mapping.permissions.allows(fault.access) {
                    PagerDecision::Resolved(mapping.clone())
                } else {
                    PagerDecision::Stop
                }
            }
            PagerPolicy::DirectMapped {
                permissions,
                attribute,
            } => {
                if permissions.allows(fault.access) {
                    let base = page_base(fault.addr);
                    PagerDecision::Resolved(Mapping::new(
                        base,
                        base,
                        PAGE_SIZE,
                        *permissions,
                        *attribute,
                    ))
                } else {
                    PagerDecision::Stop
                }
            }
            PagerPolicy::Deny => PagerDecision::Stop,
        }
    }
}

/// How the kernel disposed of a page fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultResolution {
    /// The pager produced a mapping; the thread keeps running
    Resolved(Mapping),
    /// The thread is blocked and the fault was reflected upward
    Unresolved,
}

impl Kernel {
    /// Creates a pager object with the given policy
    pub fn create_pager(&mut self, policy: PagerPolicy) -> PagerId {
        let id = PagerId::new();
        let identity = self.identities.create(KernelObject::Pager(id));
        self.pagers.insert(
            id,
            PagerObject {
                id,
                identity,
                policy,
            },
        );
        id
    }

    /// Destroys a pager object
    ///
    /// Threads still registered to it keep a now-stale identity handle and
    /// fall into the unresolved path on their next fault.
    pub fn destroy_pager(&mut self, id: PagerId) -> Result<(), KernelError> {
        let pager = self
            .pagers
            .remove(&id)
            .ok_or(KernelError::PagerNotFound(id))?;
        self.invalidate_identity(pager.identity);
        Ok(())
    }

    /// Returns the identity handle of a pager
    pub fn pager_identity(&self, id: PagerId) -> Option<IdentityId> {
        self.pagers.get(&id).map(|p| p.identity)
    }

    /// Registers a pager for a thread
    pub fn register_pager(
        &mut self,
        thread: ThreadId,
        pager: PagerId,
    ) -> Result<(), KernelError> {
        let identity = self
            .pagers
            .get(&pager)
            .map(|p| p.identity)
            .ok_or(KernelError::PagerNotFound(pager))?;
        let t = self
            .threads
            .get_mut(&thread)
            .ok_or(KernelError::ThreadNotFound(thread))?;
        t.pager = Some(identity);
        Ok(())
    }

    /// Handles a page fault raised by a thread
    ///
    /// The fault snapshot is stored on the thread either way. If the
    /// thread's pager resolves the fault, the mapping is returned and the
    /// thread stays runnable. Otherwise the thread blocks in
    /// `AwaitsResume`, the fault is submitted to the thread's fault
    /// context if one is routed, and exactly one unresolved event is
    /// recorded.
    pub fn handle_page_fault(
        &mut self,
        thread: ThreadId,
        fault: FaultInfo,
    ) -> Result<FaultResolution, KernelError> {
        let pager_identity = {
            let t = self
                .threads
                .get_mut(&thread)
                .ok_or(KernelError::ThreadNotFound(thread))?;
            t.fault = Some(fault);
            t.pager
        };

        let decision = pager_identity
            .and_then(|identity| self.identities.get(identity))
            .and_then(|identity| identity.object().as_pager())
            .and_then(|pager_id| self.pagers.get(&pager_id))
            .map(|pager| pager.decide(&fault));

        if let Some(PagerDecision::Resolved(mapping)) = decision {
            self.record_fault_event(FaultEvent::Resolved {
                thread,
                addr: fault.addr,
                mapping: mapping.clone(),
            });
            return Ok(FaultResolution::Resolved(mapping));
        }

        // No pager, stale pager, or an explicit stop: same path.
        self.deactivate(thread, ThreadState::AwaitsResume);
        let fault_context = self
            .threads
            .get(&thread)
            .and_then(|t| t.fault_context)
            .filter(|ctx| self.contexts.contains_key(ctx));
        if let Some(ctx) = fault_context {
            self.submit_signal(ctx, 1)?;
        }
        self.record_fault_event(FaultEvent::Unresolved {
            thread,
            addr: fault.addr,
        });
        Ok(FaultResolution::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Priority;
    use kernel_types::MemoryAccessType;

    fn kernel_with_thread() -> (Kernel, ThreadId) {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let thread = kernel.create_thread("faulter", Priority::new(1));
        kernel.start_thread(thread, pd).unwrap();
        (kernel, thread)
    }

    fn read_fault(addr: u64) -> FaultInfo {
        FaultInfo {
            addr,
            ip: 0x1000,
            access: MemoryAccessType::Read,
        }
    }

    #[test]
    fn test_fixed_policy_resolves_inside_mapping() {
        let (mut kernel, thread) = kernel_with_thread();
        let mapping = Mapping::new(
            0x10_0000,
            0x80_0000,
            4 * PAGE_SIZE,
            MemoryPerms::read_write(),
            CacheAttribute::Cached,
        );
        let pager = kernel.create_pager(PagerPolicy::Fixed(mapping.clone()));
        kernel.register_pager(thread, pager).unwrap();

        let resolution = kernel
            .handle_page_fault(thread, read_fault(0x10_1000))
            .unwrap();
        assert_eq!(resolution, FaultResolution::Resolved(mapping));
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::Active));
        assert!(kernel
            .fault_audit()
            .has_event(|e| matches!(e, FaultEvent::Resolved { .. })));
    }

    #[test]
    fn test_fixed_policy_stops_outside_mapping() {
        let (mut kernel, thread) = kernel_with_thread();
        let mapping = Mapping::new(
            0x10_0000,
            0x80_0000,
            PAGE_SIZE,
            MemoryPerms::read_write(),
            CacheAttribute::Cached,
        );
        let pager = kernel.create_pager(PagerPolicy::Fixed(mapping));
        kernel.register_pager(thread, pager).unwrap();

        let resolution = kernel
            .handle_page_fault(thread, read_fault(0x20_0000))
            .unwrap();
        assert_eq!(resolution, FaultResolution::Unresolved);
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::AwaitsResume));
    }

    #[test]
    fn test_fixed_policy_checks_permissions() {
        let (mut kernel, thread) = kernel_with_thread();
        let mapping = Mapping::new(
            0x10_0000,
            0x80_0000,
            PAGE_SIZE,
            MemoryPerms::read_only(),
            CacheAttribute::Cached,
        );
        let pager = kernel.create_pager(PagerPolicy::Fixed(mapping));
        kernel.register_pager(thread, pager).unwrap();

        let fault = FaultInfo {
            addr: 0x10_0008,
            ip: 0x1000,
            access: MemoryAccessType::Write,
        };
        let resolution = kernel.handle_page_fault(thread, fault).unwrap();
        assert_eq!(resolution, FaultResolution::Unresolved);
    }

    #[test]
    fn test_direct_mapped_identity_maps_the_page() {
        let (mut kernel, thread) = kernel_with_thread();
        let pager = kernel.create_pager(PagerPolicy::DirectMapped {
            permissions: MemoryPerms::read_write(),
            attribute: CacheAttribute::Uncached,
        });
        kernel.register_pager(thread, pager).unwrap();

        let resolution = kernel
            .handle_page_fault(thread, read_fault(0x3_2a50))
            .unwrap();
        match resolution {
            FaultResolution::Resolved(mapping) => {
                assert_eq!(mapping.virt_base, 0x3_2000);
                assert_eq!(mapping.phys_base, 0x3_2000);
                assert_eq!(mapping.size_bytes, PAGE_SIZE);
                assert_eq!(mapping.attribute, CacheAttribute::Uncached);
            }
            FaultResolution::Unresolved => panic!("expected a mapping"),
        }
    }

    #[test]
    fn test_unresolved_fault_blocks_and_signals_once() {
        let (mut kernel, thread) = kernel_with_thread();
        let pager = kernel.create_pager(PagerPolicy::Deny);
        kernel.register_pager(thread, pager).unwrap();

        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0xfa17).unwrap();
        kernel.route_fault_event(thread, ctx).unwrap();

        let resolution = kernel
            .handle_page_fault(thread, read_fault(0x5000))
            .unwrap();
        assert_eq!(resolution, FaultResolution::Unresolved);
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::AwaitsResume));
        assert_eq!(kernel.receiver_pending_count(receiver), Some(1));
        assert_eq!(
            kernel
                .fault_audit()
                .count_events(|e| matches!(e, FaultEvent::Unresolved { .. })),
            1
        );
        assert_eq!(kernel.thread_fault(thread).unwrap().addr, 0x5000);

        // Resume re-runs the thread so the fault can be retried.
        assert!(kernel.resume_thread(thread).unwrap());
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::Active));
    }

    #[test]
    fn test_fault_without_pager_is_unresolved() {
        let (mut kernel, thread) = kernel_with_thread();
        let resolution = kernel
            .handle_page_fault(thread, read_fault(0x9000))
            .unwrap();
        assert_eq!(resolution, FaultResolution::Unresolved);
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::AwaitsResume));
    }

    #[test]
    fn test_destroyed_pager_degrades_to_unresolved() {
        let (mut kernel, thread) = kernel_with_thread();
        let pager = kernel.create_pager(PagerPolicy::DirectMapped {
            permissions: MemoryPerms::all(),
            attribute: CacheAttribute::Cached,
        });
        kernel.register_pager(thread, pager).unwrap();
        kernel.destroy_pager(pager).unwrap();

        let resolution = kernel
            .handle_page_fault(thread, read_fault(0x4000))
            .unwrap();
        assert_eq!(resolution, FaultResolution::Unresolved);
    }
}
