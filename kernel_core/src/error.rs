//! Kernel error types

use kernel_types::{CapabilityError, IrqId, PagerId, PdId, ReceiverId, SignalContextId, ThreadId};
use thiserror::Error;

/// Errors that can occur when interacting with the kernel
///
/// Every variant is a routine outcome of acting on untrusted or stale input.
/// Kernel-internal invariant violations are assertions, not errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Thread not found
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    /// Protection domain not found
    #[error("protection domain not found: {0}")]
    DomainNotFound(PdId),

    /// Signal receiver not found
    #[error("signal receiver not found: {0}")]
    ReceiverNotFound(ReceiverId),

    /// Signal context not found
    #[error("signal context not found: {0}")]
    ContextNotFound(SignalContextId),

    /// User IRQ object not found
    #[error("irq not found: {0}")]
    IrqNotFound(IrqId),

    /// Pager object not found
    #[error("pager not found: {0}")]
    PagerNotFound(PagerId),

    /// The interrupt line is already bound to another IRQ object
    #[error("irq line {0} is already bound")]
    IrqLineBound(u32),

    /// The cpu index names no configured cpu
    #[error("cpu {0} does not exist")]
    CpuNotFound(usize),

    /// The identity handle no longer refers to a live object
    #[error("object identity is no longer valid")]
    StaleIdentity,

    /// Thread start was requested on a thread that already ran
    #[error("thread is not startable: {0}")]
    ThreadNotStartable(ThreadId),

    /// The calling thread has not been started into a domain
    #[error("thread has no protection domain: {0}")]
    ThreadNotStarted(ThreadId),

    /// A second kill was requested on an already-killed context
    #[error("signal context already killed: {0}")]
    AlreadyKilled(SignalContextId),

    /// Capability lookup or bookkeeping failure
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
