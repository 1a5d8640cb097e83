//! Thread entities and their lifecycle
//!
//! Threads are the execution contexts the scheduler, signal subsystem, and
//! fault path act on. Waiting is purely a state transition: a blocked
//! thread is absent from the ready buckets and carries a record of what it
//! waits for, so the wait can be cancelled synchronously from teardown and
//! resume paths.

use kernel_types::{FaultInfo, PdId, ReceiverId, SignalContextId, ThreadId};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::object::{IdentityId, KernelObject};
use crate::scheduler::Priority;
use crate::Kernel;

/// Lifecycle state of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    /// Created but not yet started
    New,
    /// Ready; present in the scheduler's buckets
    Active,
    /// Blocked as a registered signal handler
    AwaitsSignal,
    /// Blocked waiting for a signal-context kill to complete
    AwaitsSignalContextKill,
    /// Blocked until explicitly resumed (pause, unresolved fault)
    AwaitsResume,
    /// Stopped; will not run again until destroyed
    Stopped,
}

/// Signal payload delivered to a handler thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDelivery {
    /// Imprint of the delivering context
    pub imprint: u64,
    /// Number of submits folded into this delivery
    pub count: u32,
}

/// Outcome of a blocked kill request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// The kill completed on an ack
    Done,
    /// The context was destroyed while the kill was pending
    Failed,
}

/// A thread
#[derive(Debug)]
pub struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) label: String,
    pub(crate) priority: Priority,
    pub(crate) state: ThreadState,
    /// Cpu whose scheduler this thread belongs to
    pub(crate) cpu: usize,
    pub(crate) pd: Option<PdId>,
    pub(crate) identity: IdentityId,
    /// Receiver this thread is registered with while in `AwaitsSignal`
    pub(crate) waiting_receiver: Option<ReceiverId>,
    /// Context this thread is killing while in `AwaitsSignalContextKill`
    pub(crate) killing_context: Option<SignalContextId>,
    pub(crate) delivered_signal: Option<SignalDelivery>,
    pub(crate) kill_outcome: Option<KillOutcome>,
    /// Snapshot of the last page fault
    pub(crate) fault: Option<FaultInfo>,
    /// Signal context the thread's fault event is routed to
    pub(crate) fault_context: Option<SignalContextId>,
    /// Weak link to the registered pager object's identity
    pub(crate) pager: Option<IdentityId>,
}

impl Thread {
    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn domain(&self) -> Option<PdId> {
        self.pd
    }

    pub fn cpu(&self) -> usize {
        self.cpu
    }
}

impl Kernel {
    /// Creates a thread in the `New` state on cpu 0
    pub fn create_thread(&mut self, label: &str, priority: Priority) -> ThreadId {
        let id = ThreadId::new();
        let identity = self.identities.create(KernelObject::Thread(id));
        self.threads.insert(
            id,
            Thread {
                id,
                label: label.to_string(),
                priority,
                state: ThreadState::New,
                cpu: 0,
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
        id
    }

    /// Creates a thread in the `New` state with an explicit cpu affinity
    pub fn create_thread_on(
        &mut self,
        label: &str,
        priority: Priority,
        cpu: usize,
    ) -> Result<ThreadId, KernelError> {
        if cpu >= self.schedulers.len() {
            return Err(KernelError::CpuNotFound(cpu));
        }
        let id = self.create_thread(label, priority);
        if let Some(thread) = self.threads.get_mut(&id) {
            thread.cpu = cpu;
        }
        Ok(id)
    }

    /// Starts a thread inside a protection domain
    ///
    /// Binds the thread to its cpu's scheduler at its fixed priority and
    /// makes it ready. Only a `New` thread can be started.
    pub fn start_thread(&mut self, id: ThreadId, pd: PdId) -> Result<(), KernelError> {
        if !self.domains.contains_key(&pd) {
            return Err(KernelError::DomainNotFound(pd));
        }
        let (priority, cpu) = {
            let thread = self
                .threads
                .get_mut(&id)
                .ok_or(KernelError::ThreadNotFound(id))?;
            if thread.state != ThreadState::New {
                return Err(KernelError::ThreadNotStartable(id));
            }
            thread.pd = Some(pd);
            (thread.priority, thread.cpu)
        };
        self.schedulers[cpu].bind(id, priority);
        self.activate(id);
        Ok(())
    }

    /// Pauses an active thread
    ///
    /// Returns whether the thread's state changed. Blocked threads keep
    /// their wait; pausing them is a no-op.
    pub fn pause_thread(&mut self, id: ThreadId) -> Result<bool, KernelError> {
        let state = self
            .threads
            .get(&id)
            .map(|t| t.state)
            .ok_or(KernelError::ThreadNotFound(id))?;
        match state {
            ThreadState::Active => {
                self.deactivate(id, ThreadState::AwaitsResume);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Resumes a blocked thread
    ///
    /// State-directed: a paused thread simply becomes ready again; a thread
    /// blocked as a signal handler or as a pending killer has its
    /// registration cancelled first. Returns whether the state changed.
    pub fn resume_thread(&mut self, id: ThreadId) -> Result<bool, KernelError> {
        let state = self
            .threads
            .get(&id)
            .map(|t| t.state)
            .ok_or(KernelError::ThreadNotFound(id))?;
        match state {
            ThreadState::AwaitsResume => {
                self.activate(id);
                Ok(true)
            }
            ThreadState::AwaitsSignal => {
                self.cancel_signal_wait(id);
                self.activate(id);
                Ok(true)
            }
            ThreadState::AwaitsSignalContextKill => {
                self.cancel_kill_wait(id);
                self.activate(id);
                Ok(true)
            }
            ThreadState::Active | ThreadState::New | ThreadState::Stopped => Ok(false),
        }
    }

    /// Stops an active thread
    pub fn stop_thread(&mut self, id: ThreadId) -> Result<bool, KernelError> {
        let state = self
            .threads
            .get(&id)
            .map(|t| t.state)
            .ok_or(KernelError::ThreadNotFound(id))?;
        match state {
            ThreadState::Active => {
                self.deactivate(id, ThreadState::Stopped);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Destroys a thread
    ///
    /// Cancels any outstanding wait registration, tears down the scheduling
    /// membership, and invalidates the thread's identity, which revokes all
    /// capabilities naming it.
    pub fn destroy_thread(&mut self, id: ThreadId) -> Result<(), KernelError> {
        let cpu = self
            .threads
            .get(&id)
            .map(|t| t.cpu)
            .ok_or(KernelError::ThreadNotFound(id))?;
        self.cancel_signal_wait(id);
        self.cancel_kill_wait(id);
        self.schedulers[cpu].unbind(id);
        if let Some(thread) = self.threads.remove(&id) {
            self.invalidate_identity(thread.identity);
        }
        Ok(())
    }

    /// Routes the thread's fault event to a signal context
    pub fn route_fault_event(
        &mut self,
        id: ThreadId,
        context: SignalContextId,
    ) -> Result<(), KernelError> {
        if !self.contexts.contains_key(&context) {
            return Err(KernelError::ContextNotFound(context));
        }
        let thread = self
            .threads
            .get_mut(&id)
            .ok_or(KernelError::ThreadNotFound(id))?;
        thread.fault_context = Some(context);
        Ok(())
    }

    /// Returns a thread for inspection
    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    /// Returns a thread's lifecycle state
    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        self.threads.get(&id).map(|t| t.state)
    }

    /// Returns the identity handle of a thread
    pub fn thread_identity(&self, id: ThreadId) -> Option<IdentityId> {
        self.threads.get(&id).map(|t| t.identity)
    }

    /// Returns the fault snapshot of a thread
    pub fn thread_fault(&self, id: ThreadId) -> Option<FaultInfo> {
        self.threads.get(&id).and_then(|t| t.fault)
    }

    /// Takes the last signal payload delivered to a thread
    ///
    /// `None` after a wakeup means the wait ended without a delivery (for
    /// example because the receiver was destroyed).
    pub fn take_delivered_signal(&mut self, id: ThreadId) -> Option<SignalDelivery> {
        self.threads.get_mut(&id).and_then(|t| t.delivered_signal.take())
    }

    /// Takes the outcome of the thread's last blocked kill request
    pub fn take_kill_outcome(&mut self, id: ThreadId) -> Option<KillOutcome> {
        self.threads.get_mut(&id).and_then(|t| t.kill_outcome.take())
    }

    /// Cancels a handler registration; synchronous and idempotent
    pub(crate) fn cancel_signal_wait(&mut self, id: ThreadId) {
        let receiver = self
            .threads
            .get_mut(&id)
            .and_then(|t| t.waiting_receiver.take());
        if let Some(rid) = receiver {
            if let Some(receiver) = self.receivers.get_mut(&rid) {
                receiver.handlers.retain(|&h| h != id);
            }
        }
    }

    /// Cancels a pending killer registration; synchronous and idempotent
    ///
    /// The context stays killed; only the completion notification is
    /// dropped.
    pub(crate) fn cancel_kill_wait(&mut self, id: ThreadId) {
        let context = self
            .threads
            .get_mut(&id)
            .and_then(|t| t.killing_context.take());
        if let Some(ctx_id) = context {
            if let Some(ctx) = self.contexts.get_mut(&ctx_id) {
                if ctx.killer == Some(id) {
                    ctx.killer = None;
                }
            }
        }
    }
}
