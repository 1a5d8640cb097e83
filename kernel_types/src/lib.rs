//! # Kernel Types
//!
//! This crate defines the fundamental types shared across the Nucleus kernel.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: object references are typed tags checked at
//!   lookup time, never raw pointers.
//! - **Lookup misses are routine**: a dangling reference resolves to nothing,
//!   it never resolves to stale state.
//! - **Deterministic behavior preserved in testing**: every type here is
//!   plain data that can be asserted on.
//!
//! ## Key Types
//!
//! - [`Capid`]: a domain-local capability id
//! - [`ObjectType`]: the kind tag of a kernel object
//! - [`ThreadId`], [`PdId`], [`ReceiverId`], [`SignalContextId`]: entity ids
//! - [`MemoryPerms`], [`Mapping`], [`FaultInfo`]: page-fault plumbing

pub mod capability;
pub mod ids;
pub mod memory;

pub use capability::{Capid, CapabilityError, CapabilityEvent, ObjectType};
pub use ids::{IrqId, PagerId, PdId, ReceiverId, SignalContextId, ThreadId};
pub use memory::{
    page_base, CacheAttribute, FaultInfo, Mapping, MemoryAccessType, MemoryPerms, PAGE_SIZE,
};
