//! Deterministic microkernel core
//!
//! The scheduling, capability, signal, fault, and interrupt semantics of a
//! small kernel, modeled as plain state transitions over in-memory tables.
//! Nothing here touches hardware: traps, timer ticks, and interrupt lines
//! arrive as method calls, and decisions (who runs, which mapping to
//! install, which handler to wake) come back as values.
//!
//! ## Philosophy
//!
//! - Deterministic: identical call sequences produce identical decisions,
//!   so every kernel property is testable on the host
//! - Single-threaded by construction: all entries serialize through one
//!   global lock ([`lock::LockedKernel`]); no finer locking exists
//! - Identity-centered: every kernel object is owned by one identity, and
//!   destroying the object revokes all capabilities naming it
//! - Routine errors are values: a stale handle, an unknown capability, or
//!   a wrong-typed lookup is an `Err` or `None`, never a panic; only
//!   kernel-internal misuse (scheduler protocol violations) panics
//!
//! ## Structure
//!
//! - [`scheduler`]: static-priority round-robin ready queues
//! - [`object`]: object identities and capability revocation
//! - [`pd`]: protection domains and their capability trees
//! - [`thread`]: thread lifecycle and wait states
//! - [`signal`]: asynchronous signal delivery and context kill
//! - [`pager`]: page-fault resolution policies
//! - [`irq`]: user-level interrupt objects
//! - [`call`]: the capability-addressed invocation gate
//! - [`audit`]: event trails for test verification

pub mod audit;
pub mod call;
pub mod error;
pub mod irq;
pub mod lock;
pub mod object;
pub mod pager;
pub mod pd;
pub mod scheduler;
pub mod signal;
pub mod thread;

use std::collections::HashMap;

use kernel_types::{
    CapabilityEvent, IrqId, PagerId, PdId, ReceiverId, SignalContextId, ThreadId,
};

use audit::{CapabilityAuditLog, FaultAuditLog, FaultEvent};
use irq::{IrqController, UserIrq};
use object::IdentityTable;
use pager::PagerObject;
use pd::ProtectionDomain;
use scheduler::{Priority, Scheduler};
use signal::{SignalContext, SignalReceiver};
use thread::{Thread, ThreadState};

pub use call::{Invocation, InvokeReply};
pub use error::KernelError;
pub use lock::LockedKernel;

/// The kernel state
///
/// One instance owns every table. All mutation goes through the operation
/// methods spread over the submodules; fields stay private to this crate.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) threads: HashMap<ThreadId, Thread>,
    pub(crate) domains: HashMap<PdId, ProtectionDomain>,
    pub(crate) identities: IdentityTable,
    pub(crate) receivers: HashMap<ReceiverId, SignalReceiver>,
    pub(crate) contexts: HashMap<SignalContextId, SignalContext>,
    pub(crate) irqs: HashMap<IrqId, UserIrq>,
    pub(crate) irq_lines: HashMap<u32, IrqId>,
    pub(crate) pagers: HashMap<PagerId, PagerObject>,
    /// One scheduler per cpu; index is the cpu number
    pub(crate) schedulers: Vec<Scheduler>,
    /// Idle thread of each cpu
    idle: Vec<ThreadId>,
    cap_audit: CapabilityAuditLog,
    fault_audit: FaultAuditLog,
    pub(crate) irq_controller: Option<Box<dyn IrqController>>,
    seq: u64,
}

impl Kernel {
    /// Creates a single-cpu kernel with an empty ready queue
    ///
    /// Each cpu's idle thread exists from the start. It is a real thread
    /// entry so scheduling decisions always name a thread, but it is never
    /// bound to the ready queues; it runs exactly when nothing else can.
    pub fn new() -> Self {
        let mut kernel = Self {
            threads: HashMap::new(),
            domains: HashMap::new(),
            identities: IdentityTable::new(),
            receivers: HashMap::new(),
            contexts: HashMap::new(),
            irqs: HashMap::new(),
            irq_lines: HashMap::new(),
            pagers: HashMap::new(),
            schedulers: Vec::new(),
            idle: Vec::new(),
            cap_audit: CapabilityAuditLog::new(),
            fault_audit: FaultAuditLog::new(),
            irq_controller: None,
            seq: 0,
        };
        kernel.add_cpu();
        kernel
    }

    /// Attaches an interrupt controller for line mask/unmask operations
    pub fn with_irq_controller(mut self, controller: Box<dyn IrqController>) -> Self {
        self.irq_controller = Some(controller);
        self
    }

    /// Configures the number of cpus
    ///
    /// Grows the per-cpu scheduler set; each added cpu brings its own idle
    /// thread. Meant for construction time, before threads start; the
    /// count never shrinks.
    pub fn with_cpu_count(mut self, count: usize) -> Self {
        while self.schedulers.len() < count {
            self.add_cpu();
        }
        self
    }

    fn add_cpu(&mut self) {
        let cpu = self.schedulers.len();
        let idle = ThreadId::new();
        let identity = self.identities.create(object::KernelObject::Thread(idle));
        self.threads.insert(
            idle,
            Thread {
                id: idle,
                label: format!("idle-{cpu}"),
                priority: Priority::MIN,
                state: ThreadState::Active,
                cpu,
                pd: None,
                identity,
                waiting_receiver: None,
                killing_context: None,
                delivered_signal: None,
                kill_outcome: None,
                fault: None,
                fault_context: None,
                pager: None,
            },
        );
        self.schedulers.push(Scheduler::new(idle));
        self.idle.push(idle);
    }

    /// Returns the number of configured cpus
    pub fn cpu_count(&self) -> usize {
        self.schedulers.len()
    }

    /// Returns cpu 0's idle thread
    pub fn idle_thread(&self) -> ThreadId {
        self.idle[0]
    }

    /// Returns the idle thread of a cpu
    pub fn idle_thread_on(&self, cpu: usize) -> Option<ThreadId> {
        self.idle.get(cpu).copied()
    }

    /// Picks the thread to run next on cpu 0 and makes it current
    pub fn schedule(&mut self) -> ThreadId {
        self.schedule_on(0)
    }

    /// Picks the thread to run next on a cpu and makes it current
    ///
    /// The highest-priority ready thread wins; within a priority, the
    /// queue order stands until a yield rotates it. With nothing ready,
    /// the cpu's idle thread runs and no ready-queue entry is current.
    /// Panics on a cpu that does not exist; dispatch is kernel-internal.
    pub fn schedule_on(&mut self, cpu: usize) -> ThreadId {
        let scheduler = &mut self.schedulers[cpu];
        let head = scheduler.head();
        if head == scheduler.idle() {
            scheduler.set_current(None);
        } else {
            scheduler.set_current(Some(head));
        }
        head
    }

    /// Rotates cpu 0's current thread to the tail of its priority queue
    pub fn yield_current(&mut self) {
        self.yield_current_on(0);
    }

    /// Rotates a cpu's current thread to the tail of its priority queue
    pub fn yield_current_on(&mut self, cpu: usize) {
        self.schedulers[cpu].yield_current();
    }

    /// Returns the thread chosen by the last [`Kernel::schedule`] on cpu 0
    pub fn current_thread(&self) -> ThreadId {
        self.schedulers[0].current().unwrap_or(self.idle[0])
    }

    /// Read access to cpu 0's scheduler for inspection
    pub fn scheduler(&self) -> &Scheduler {
        &self.schedulers[0]
    }

    /// Read access to a cpu's scheduler for inspection
    pub fn scheduler_on(&self, cpu: usize) -> Option<&Scheduler> {
        self.schedulers.get(cpu)
    }

    /// The capability audit trail
    pub fn cap_audit(&self) -> &CapabilityAuditLog {
        &self.cap_audit
    }

    /// The page-fault audit trail
    pub fn fault_audit(&self) -> &FaultAuditLog {
        &self.fault_audit
    }

    /// Makes a thread ready on its cpu
    ///
    /// Enqueues it when it is bound to scheduling and not already queued;
    /// unbound threads (not yet started) just become `Active`.
    pub(crate) fn activate(&mut self, id: ThreadId) {
        let Some(cpu) = self.threads.get(&id).map(|t| t.cpu) else {
            return;
        };
        let scheduler = &mut self.schedulers[cpu];
        if scheduler.is_bound(id) && !scheduler.is_enqueued(id) {
            scheduler.insert(id);
        }
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.state = ThreadState::Active;
        }
    }

    /// Blocks a thread into the given wait state
    pub(crate) fn deactivate(&mut self, id: ThreadId, state: ThreadState) {
        let Some((cpu, was_active)) = self
            .threads
            .get(&id)
            .map(|t| (t.cpu, t.state == ThreadState::Active))
        else {
            return;
        };
        if was_active && self.schedulers[cpu].is_enqueued(id) {
            self.schedulers[cpu].remove(id);
        }
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.state = state;
        }
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn record_cap_event(&mut self, event: CapabilityEvent) {
        let seq = self.next_seq();
        self.cap_audit.record(seq, event);
    }

    pub(crate) fn record_fault_event(&mut self, event: FaultEvent) {
        let seq = self.next_seq();
        self.fault_audit.record(seq, event);
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_kernel_runs_idle() {
        let mut kernel = Kernel::new();
        let idle = kernel.idle_thread();
        assert_eq!(kernel.schedule(), idle);
        assert_eq!(kernel.current_thread(), idle);
        assert_eq!(kernel.thread_state(idle), Some(ThreadState::Active));
    }

    #[test]
    fn test_priority_preemption_across_domains() {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let low = kernel.create_thread("low", Priority::new(0));
        let high = kernel.create_thread("high", Priority::new(3));
        kernel.start_thread(low, pd).unwrap();
        assert_eq!(kernel.schedule(), low);

        kernel.start_thread(high, pd).unwrap();
        assert_eq!(kernel.schedule(), high);

        kernel.pause_thread(high).unwrap();
        assert_eq!(kernel.schedule(), low);
    }

    #[test]
    fn test_yield_rotates_equal_priority() {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let a = kernel.create_thread("a", Priority::new(1));
        let b = kernel.create_thread("b", Priority::new(1));
        kernel.start_thread(a, pd).unwrap();
        kernel.start_thread(b, pd).unwrap();

        assert_eq!(kernel.schedule(), a);
        kernel.yield_current();
        assert_eq!(kernel.schedule(), b);
        kernel.yield_current();
        assert_eq!(kernel.schedule(), a);
    }

    #[test]
    fn test_blocking_falls_back_to_idle() {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let thread = kernel.create_thread("only", Priority::new(1));
        kernel.start_thread(thread, pd).unwrap();
        assert_eq!(kernel.schedule(), thread);

        let receiver = kernel.create_receiver();
        kernel.await_signal(thread, receiver).unwrap();
        assert_eq!(kernel.schedule(), kernel.idle_thread());
    }

    #[test]
    fn test_per_cpu_schedulers_are_independent() {
        let mut kernel = Kernel::new().with_cpu_count(2);
        assert_eq!(kernel.cpu_count(), 2);
        let pd = kernel.create_domain("init");
        let first = kernel.create_thread("first", Priority::new(1));
        let second = kernel.create_thread_on("second", Priority::new(3), 1).unwrap();
        kernel.start_thread(first, pd).unwrap();
        kernel.start_thread(second, pd).unwrap();

        // The stronger thread on cpu 1 never displaces cpu 0's head.
        assert_eq!(kernel.schedule(), first);
        assert_eq!(kernel.schedule_on(1), second);
        assert_eq!(kernel.thread(second).unwrap().cpu(), 1);

        kernel.pause_thread(second).unwrap();
        assert_eq!(kernel.schedule_on(1), kernel.idle_thread_on(1).unwrap());
        assert_eq!(kernel.schedule(), first);

        // Each cpu has its own idle thread.
        assert_ne!(kernel.idle_thread(), kernel.idle_thread_on(1).unwrap());
    }

    #[test]
    fn test_cpu_out_of_range_is_routine_error() {
        let mut kernel = Kernel::new();
        assert_eq!(
            kernel.create_thread_on("lost", Priority::MIN, 3),
            Err(KernelError::CpuNotFound(3))
        );
        assert!(kernel.scheduler_on(3).is_none());
    }

    #[test]
    fn test_event_sequence_is_monotonic() {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let receiver = kernel.create_receiver();
        let identity = kernel.receiver_identity(receiver).unwrap();
        let cap = kernel.grant_cap(pd, identity).unwrap();
        kernel.destroy_receiver(receiver).unwrap();
        let _ = cap;

        let stamps: Vec<u64> = kernel.cap_audit().events().iter().map(|e| e.seq).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert!(!stamps.is_empty());
    }
}
