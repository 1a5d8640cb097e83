//! Kernel Scenario Test Utilities
//!
//! Shared helpers for the cross-module scenario tests.
//!
//! ## Test Philosophy
//!
//! - **Whole flows**: exercise kernel operations the way a running system
//!   chains them (fault to signal to handler wakeup), not in isolation
//! - **Deterministic**: a scenario replays identically on every run
//! - **Invariants over internals**: assert on scheduling decisions, thread
//!   states, and audit trails rather than table contents

use kernel_core::scheduler::Priority;
use kernel_core::Kernel;
use kernel_types::{PdId, ThreadId};

/// Bootstrap helper for tests
///
/// Creates a kernel with one protection domain, the way a minimal system
/// boots with its init domain.
pub fn test_bootstrap() -> (Kernel, PdId) {
    let mut kernel = Kernel::new();
    let pd = kernel.create_domain("init");
    (kernel, pd)
}

/// Creates and starts a thread inside the given domain
pub fn spawn_thread(kernel: &mut Kernel, pd: PdId, label: &str, priority: u8) -> ThreadId {
    let thread = kernel.create_thread(label, Priority::new(priority));
    kernel
        .start_thread(thread, pd)
        .unwrap_or_else(|e| panic!("failed to start {label}: {e}"));
    thread
}
