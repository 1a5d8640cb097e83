//! Capability-addressed kernel invocations
//!
//! The single user-facing entry: a caller names a kernel object by a
//! capability local to its own protection domain and asks for an operation
//! on it. The gate resolves the capability, checks the object kind against
//! the operation, and dispatches. A capability that does not resolve, or
//! resolves to the wrong kind of object, is a routine error to the caller.
//!
//! `AckCap` and `DeleteCap` operate on the capability slot itself rather
//! than the object behind it, so they dispatch before resolution.

use kernel_types::{CapabilityError, Capid, ObjectType, ThreadId};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::object::KernelObject;
use crate::signal::KillCompletion;
use crate::Kernel;

/// An operation requested on a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Invocation {
    /// Pause the named thread
    PauseThread,
    /// Resume the named thread
    ResumeThread,
    /// Register a pager (second capability) for the named thread
    RegisterPager { pager: Capid },
    /// Route the named thread's fault event to a signal context
    RouteFault { context: Capid },
    /// Submit signals on the named context
    SubmitSignal { count: u32 },
    /// Acknowledge the last delivery on the named context
    AckSignal,
    /// Kill the named context; the caller may block
    KillSignalContext,
    /// Block the caller as a handler on the named receiver
    AwaitSignal,
    /// Re-arm the named interrupt object
    AckIrq,
    /// Release one cached use of the capability slot
    AckCap,
    /// Delete the capability slot
    DeleteCap,
}

impl Invocation {
    /// The object kind this invocation targets
    ///
    /// `None` for the slot operations, which never resolve the capability.
    pub fn target_type(&self) -> Option<ObjectType> {
        match self {
            Invocation::PauseThread
            | Invocation::ResumeThread
            | Invocation::RegisterPager { .. }
            | Invocation::RouteFault { .. } => Some(ObjectType::Thread),
            Invocation::SubmitSignal { .. }
            | Invocation::AckSignal
            | Invocation::KillSignalContext => Some(ObjectType::SignalContext),
            Invocation::AwaitSignal => Some(ObjectType::SignalReceiver),
            Invocation::AckIrq => Some(ObjectType::Irq),
            Invocation::AckCap | Invocation::DeleteCap => None,
        }
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeReply {
    Done,
    /// Whether the pause changed the thread's state
    ThreadPaused(bool),
    /// Whether the resume changed the thread's state
    ThreadResumed(bool),
    /// Whether the kill left the caller blocked
    KillPending(bool),
}

impl Kernel {
    /// Invokes an operation on a capability of the caller's domain
    pub fn invoke(
        &mut self,
        caller: ThreadId,
        cap: Capid,
        invocation: Invocation,
    ) -> Result<InvokeReply, KernelError> {
        let pd = self
            .threads
            .get(&caller)
            .ok_or(KernelError::ThreadNotFound(caller))?
            .pd
            .ok_or(KernelError::ThreadNotStarted(caller))?;

        match invocation {
            Invocation::AckCap => {
                self.ack_cap(pd, cap)?;
                return Ok(InvokeReply::Done);
            }
            Invocation::DeleteCap => {
                self.delete_cap(pd, cap)?;
                return Ok(InvokeReply::Done);
            }
            _ => {}
        }

        let (_, object) = self.resolve_ref(pd, cap)?;

        match (object, invocation) {
            (KernelObject::Thread(thread), Invocation::PauseThread) => {
                Ok(InvokeReply::ThreadPaused(self.pause_thread(thread)?))
            }
            (KernelObject::Thread(thread), Invocation::ResumeThread) => {
                Ok(InvokeReply::ThreadResumed(self.resume_thread(thread)?))
            }
            (KernelObject::Thread(thread), Invocation::RegisterPager { pager }) => {
                let (_, pager_object) = self.resolve_ref(pd, pager)?;
                let pager_id = pager_object.as_pager().ok_or(KernelError::Capability(
                    CapabilityError::WrongType {
                        cap: pager,
                        expected: ObjectType::Pager,
                    },
                ))?;
                self.register_pager(thread, pager_id)?;
                Ok(InvokeReply::Done)
            }
            (KernelObject::Thread(thread), Invocation::RouteFault { context }) => {
                let (_, ctx_object) = self.resolve_ref(pd, context)?;
                let ctx = ctx_object.as_context().ok_or(KernelError::Capability(
                    CapabilityError::WrongType {
                        cap: context,
                        expected: ObjectType::SignalContext,
                    },
                ))?;
                self.route_fault_event(thread, ctx)?;
                Ok(InvokeReply::Done)
            }
            (KernelObject::SignalContext(ctx), Invocation::SubmitSignal { count }) => {
                self.submit_signal(ctx, count)?;
                Ok(InvokeReply::Done)
            }
            (KernelObject::SignalContext(ctx), Invocation::AckSignal) => {
                self.ack_signal(ctx)?;
                Ok(InvokeReply::Done)
            }
            (KernelObject::SignalContext(ctx), Invocation::KillSignalContext) => {
                let completion = self.kill_context(ctx, caller)?;
                Ok(InvokeReply::KillPending(
                    completion == KillCompletion::Deferred,
                ))
            }
            (KernelObject::SignalReceiver(receiver), Invocation::AwaitSignal) => {
                self.await_signal(caller, receiver)?;
                Ok(InvokeReply::Done)
            }
            (KernelObject::Irq(irq), Invocation::AckIrq) => {
                self.ack_irq(irq)?;
                Ok(InvokeReply::Done)
            }
            (_, invocation) => match invocation.target_type() {
                Some(expected) => Err(KernelError::Capability(CapabilityError::WrongType {
                    cap,
                    expected,
                })),
                // Slot operations returned above.
                None => Err(KernelError::Capability(CapabilityError::NotFound {
                    domain: pd,
                    cap,
                })),
            },
        }
    }
}
