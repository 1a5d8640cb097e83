//! Static-priority round-robin scheduler
//!
//! ## Philosophy
//!
//! - **Mechanism, not policy**: fixed priorities, FIFO within a priority,
//!   nothing dynamic. Starvation of low priorities under sustained
//!   higher-priority load is intended behavior.
//! - **Determinism first**: same insert/remove/yield sequence, same heads.
//! - **Misuse is fatal**: every caller of [`Scheduler::insert`] and
//!   [`Scheduler::remove`] is a kernel-internal state transition, so a
//!   double insert or a removal of an absent context is a kernel bug and
//!   panics immediately.
//!
//! ## Design
//!
//! One FIFO bucket per priority level. The head is the front of the highest
//! non-empty bucket, or the distinguished idle context when all buckets are
//! empty. The idle context is never enqueued. Blocked threads are simply
//! absent from the buckets; waiting is not a scheduler concept.

use std::collections::{HashMap, VecDeque};

use kernel_types::ThreadId;
use serde::{Deserialize, Serialize};

/// Number of static priority levels
pub const PRIORITY_LEVELS: usize = 4;

/// Static scheduling priority
///
/// Higher level means stronger priority. Values beyond the maximum are
/// clamped at construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(u8);

impl Priority {
    /// The weakest priority
    pub const MIN: Priority = Priority(0);

    /// The strongest priority
    pub const MAX: Priority = Priority((PRIORITY_LEVELS - 1) as u8);

    /// Creates a priority, clamping out-of-range levels to the maximum
    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX.0))
    }

    /// Returns the bucket index of this priority
    pub fn level(&self) -> usize {
        self.0 as usize
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MIN
    }
}

/// Scheduling membership record for one execution context
#[derive(Debug)]
struct Member {
    priority: Priority,
    enqueued: bool,
}

/// Static-priority round-robin scheduler
///
/// Contexts are bound with a fixed priority for their scheduling lifetime
/// and enqueued whenever they are ready. Head selection scans the buckets
/// from the strongest priority down, which is O(priority levels).
#[derive(Debug)]
pub struct Scheduler {
    buckets: Vec<VecDeque<ThreadId>>,
    members: HashMap<ThreadId, Member>,
    idle: ThreadId,
    /// Set by the dispatch path; consulted only by yield
    current: Option<ThreadId>,
}

impl Scheduler {
    /// Creates a scheduler with the given idle context
    pub fn new(idle: ThreadId) -> Self {
        Self {
            buckets: (0..PRIORITY_LEVELS).map(|_| VecDeque::new()).collect(),
            members: HashMap::new(),
            idle,
            current: None,
        }
    }

    /// Returns the idle context
    pub fn idle(&self) -> ThreadId {
        self.idle
    }

    /// Binds a context to scheduling at a fixed priority
    ///
    /// The context starts out not enqueued. Panics if the context is the
    /// idle context or already bound.
    pub fn bind(&mut self, id: ThreadId, priority: Priority) {
        assert!(id != self.idle, "the idle context is not schedulable");
        let previous = self.members.insert(
            id,
            Member {
                priority,
                enqueued: false,
            },
        );
        assert!(previous.is_none(), "context {id} is already bound");
    }

    /// Tears down a context's scheduling membership
    ///
    /// Auto-removes the context from its bucket if it is still enqueued.
    /// Unbinding an unknown context is a no-op so teardown paths need not
    /// track whether a thread ever started.
    pub fn unbind(&mut self, id: ThreadId) {
        let Some(member) = self.members.remove(&id) else {
            return;
        };
        if member.enqueued {
            self.buckets[member.priority.level()].retain(|&queued| queued != id);
        }
        if self.current == Some(id) {
            self.current = None;
        }
    }

    /// Returns true if the context is bound
    pub fn is_bound(&self, id: ThreadId) -> bool {
        self.members.contains_key(&id)
    }

    /// Returns true if the context is currently enqueued
    pub fn is_enqueued(&self, id: ThreadId) -> bool {
        self.members.get(&id).map_or(false, |m| m.enqueued)
    }

    /// Returns the bound priority of a context
    pub fn priority_of(&self, id: ThreadId) -> Option<Priority> {
        self.members.get(&id).map(|m| m.priority)
    }

    /// Enqueues a ready context at the tail of its bucket
    ///
    /// Panics on the idle context, an unbound context, or a context that is
    /// already enqueued.
    pub fn insert(&mut self, id: ThreadId) {
        assert!(id != self.idle, "the idle context cannot be enqueued");
        let member = match self.members.get_mut(&id) {
            Some(member) => member,
            None => panic!("insert of unbound context {id}"),
        };
        assert!(!member.enqueued, "context {id} is already enqueued");
        member.enqueued = true;
        let level = member.priority.level();
        self.buckets[level].push_back(id);
    }

    /// Dequeues a context that stops being ready
    ///
    /// Panics on an unbound context or a context that is not enqueued.
    pub fn remove(&mut self, id: ThreadId) {
        let member = match self.members.get_mut(&id) {
            Some(member) => member,
            None => panic!("remove of unbound context {id}"),
        };
        assert!(member.enqueued, "context {id} is not enqueued");
        member.enqueued = false;
        let level = member.priority.level();
        self.buckets[level].retain(|&queued| queued != id);
        if self.current == Some(id) {
            self.current = None;
        }
    }

    /// Returns the context that should run
    ///
    /// The front of the highest non-empty bucket, or the idle context when
    /// every bucket is empty.
    pub fn head(&self) -> ThreadId {
        for bucket in self.buckets.iter().rev() {
            if let Some(&front) = bucket.front() {
                return front;
            }
        }
        self.idle
    }

    /// Records which context the dispatch path is about to run
    ///
    /// Panics if the context is not ready; the idle context is represented
    /// as `None`.
    pub fn set_current(&mut self, current: Option<ThreadId>) {
        if let Some(id) = current {
            assert!(self.is_enqueued(id), "current context {id} is not ready");
        }
        self.current = current;
    }

    /// Returns the context recorded by the dispatch path
    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    /// Rotates the current context's bucket head-to-tail
    ///
    /// No-op when no current context is recorded.
    pub fn yield_current(&mut self) {
        let Some(id) = self.current else {
            return;
        };
        let Some(member) = self.members.get(&id) else {
            return;
        };
        let bucket = &mut self.buckets[member.priority.level()];
        if let Some(front) = bucket.pop_front() {
            bucket.push_back(front);
        }
    }

    /// Returns the number of ready contexts across all buckets
    pub fn ready_count(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }
}
