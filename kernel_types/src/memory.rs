//! Memory permissions, mappings, and page-fault snapshots
//!
//! These are the data shapes exchanged between the fault path and pager
//! objects. The kernel never touches page tables itself; a resolved
//! [`Mapping`] is handed back to the trap path, which installs it through
//! the architecture layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page size used for page-granularity fault resolution
pub const PAGE_SIZE: u64 = 4096;

/// Returns the page base address containing `addr`
pub fn page_base(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

/// Memory permission flags
///
/// Permissions follow the principle of least privilege; by default nothing
/// is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryPerms {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl MemoryPerms {
    /// No permissions
    pub fn none() -> Self {
        Self {
            read: false,
            write: false,
            execute: false,
        }
    }

    /// Read-only permission
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            execute: false,
        }
    }

    /// Read and write permissions
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            execute: false,
        }
    }

    /// Read and execute permissions (typical for code)
    pub fn read_execute() -> Self {
        Self {
            read: true,
            write: false,
            execute: true,
        }
    }

    /// All permissions (use sparingly)
    pub fn all() -> Self {
        Self {
            read: true,
            write: true,
            execute: true,
        }
    }

    /// Checks whether the given access kind is permitted
    pub fn allows(&self, access: MemoryAccessType) -> bool {
        match access {
            MemoryAccessType::Read => self.read,
            MemoryAccessType::Write => self.write,
            MemoryAccessType::Execute => self.execute,
        }
    }

    /// Check if this has no permissions
    pub fn is_none(&self) -> bool {
        !self.read && !self.write && !self.execute
    }
}

impl fmt::Display for MemoryPerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { "R" } else { "-" },
            if self.write { "W" } else { "-" },
            if self.execute { "X" } else { "-" }
        )
    }
}

/// Memory access kind, as reported by the fault path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryAccessType {
    Read,
    Write,
    Execute,
}

impl fmt::Display for MemoryAccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryAccessType::Read => write!(f, "Read"),
            MemoryAccessType::Write => write!(f, "Write"),
            MemoryAccessType::Execute => write!(f, "Execute"),
        }
    }
}

/// Cacheability attribute of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheAttribute {
    /// Normal cached memory
    Cached,
    /// Normal uncached memory
    Uncached,
    /// Device memory (memory-mapped I/O)
    Device,
}

impl fmt::Display for CacheAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheAttribute::Cached => write!(f, "Cached"),
            CacheAttribute::Uncached => write!(f, "Uncached"),
            CacheAttribute::Device => write!(f, "Device"),
        }
    }
}

/// A resolved virtual-to-physical mapping
///
/// Produced by a pager policy in answer to a page fault. The trap path
/// installs it; the kernel core only constructs and transports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Virtual base address
    pub virt_base: u64,
    /// Physical base address
    pub phys_base: u64,
    /// Size in bytes
    pub size_bytes: u64,
    /// Access permissions
    pub permissions: MemoryPerms,
    /// Cacheability
    pub attribute: CacheAttribute,
}

impl Mapping {
    /// Creates a new mapping
    pub fn new(
        virt_base: u64,
        phys_base: u64,
        size_bytes: u64,
        permissions: MemoryPerms,
        attribute: CacheAttribute,
    ) -> Self {
        Self {
            virt_base,
            phys_base,
            size_bytes,
            permissions,
            attribute,
        }
    }

    /// Checks whether a virtual address lies inside this mapping
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.virt_base && addr - self.virt_base < self.size_bytes
    }
}

/// Snapshot of a page fault, captured at trap time
///
/// The snapshot is stored on the faulting thread so the pager protocol can
/// inspect it after the thread has been blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInfo {
    /// Faulting virtual address
    pub addr: u64,
    /// Instruction pointer at the time of the fault
    pub ip: u64,
    /// Kind of access that faulted
    pub access: MemoryAccessType,
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fault at {:#x} (ip {:#x})",
            self.access, self.addr, self.ip
        )
    }
}
