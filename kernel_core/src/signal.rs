//! Asynchronous signal subsystem
//!
//! Receivers collect submitted signals from their contexts and hand them to
//! waiting handler threads. A context folds any number of submits into one
//! pending delivery: the counter saturates, and a new delivery is attempted
//! only once the previous one has been acknowledged.
//!
//! Delivery pairs the head of the deliverable-context queue with the head
//! of the waiting-handler queue, current heads only; there is no global
//! FIFO across history. A context found killed at the queue head is
//! skipped without consuming a handler.
//!
//! Killing a context that is idle (acknowledged, nothing queued) completes
//! immediately. Otherwise the killer blocks and the kill completes on the
//! next acknowledgement, which takes precedence over further delivery.

use std::collections::VecDeque;

use kernel_types::{ReceiverId, SignalContextId, ThreadId};

use crate::error::KernelError;
use crate::object::{IdentityId, KernelObject};
use crate::thread::{KillOutcome, SignalDelivery, ThreadState};
use crate::Kernel;

/// A signal context
///
/// Belongs to exactly one receiver and carries an opaque imprint that is
/// handed to the handler on delivery.
#[derive(Debug)]
pub struct SignalContext {
    pub(crate) id: SignalContextId,
    pub(crate) receiver: ReceiverId,
    pub(crate) imprint: u64,
    pub(crate) identity: IdentityId,
    /// Submits folded into the next delivery; saturates
    pub(crate) submits: u32,
    /// True when the last delivery has been acknowledged. A fresh context
    /// starts acknowledged so its first submit delivers immediately.
    pub(crate) acked: bool,
    pub(crate) killed: bool,
    /// Thread blocked on this context's kill completion
    pub(crate) killer: Option<ThreadId>,
    /// True while queued in the receiver's deliverable queue
    pub(crate) enqueued: bool,
}

/// A signal receiver
#[derive(Debug)]
pub struct SignalReceiver {
    pub(crate) id: ReceiverId,
    pub(crate) identity: IdentityId,
    /// Contexts owned by this receiver
    pub(crate) contexts: Vec<SignalContextId>,
    /// Contexts with a pending delivery, in submission order
    pub(crate) deliverable: VecDeque<SignalContextId>,
    /// Threads waiting for a delivery, in registration order
    pub(crate) handlers: VecDeque<ThreadId>,
}

impl SignalReceiver {
    pub fn id(&self) -> ReceiverId {
        self.id
    }
}

/// How a kill request completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillCompletion {
    /// The context was idle; the kill completed synchronously
    Immediate,
    /// The killer blocks until the next acknowledgement
    Deferred,
}

impl Kernel {
    /// Creates a signal receiver
    pub fn create_receiver(&mut self) -> ReceiverId {
        let id = ReceiverId::new();
        let identity = self.identities.create(KernelObject::SignalReceiver(id));
        self.receivers.insert(
            id,
            SignalReceiver {
                id,
                identity,
                contexts: Vec::new(),
                deliverable: VecDeque::new(),
                handlers: VecDeque::new(),
            },
        );
        id
    }

    /// Creates a signal context bound to a receiver
    pub fn create_context(
        &mut self,
        receiver: ReceiverId,
        imprint: u64,
    ) -> Result<SignalContextId, KernelError> {
        if !self.receivers.contains_key(&receiver) {
            return Err(KernelError::ReceiverNotFound(receiver));
        }
        let id = SignalContextId::new();
        let identity = self.identities.create(KernelObject::SignalContext(id));
        self.contexts.insert(
            id,
            SignalContext {
                id,
                receiver,
                imprint,
                identity,
                submits: 0,
                acked: true,
                killed: false,
                killer: None,
                enqueued: false,
            },
        );
        if let Some(receiver) = self.receivers.get_mut(&receiver) {
            receiver.contexts.push(id);
        }
        Ok(id)
    }

    /// Submits `count` signals on a context
    ///
    /// The submit counter saturates. If the context is acknowledged, a
    /// delivery is attempted immediately. Submits on a killed context are
    /// dropped silently; asynchronous submitters cannot distinguish this
    /// from a racing context destruction.
    pub fn submit_signal(
        &mut self,
        ctx_id: SignalContextId,
        count: u32,
    ) -> Result<(), KernelError> {
        let (receiver, deliver) = {
            let ctx = self
                .contexts
                .get_mut(&ctx_id)
                .ok_or(KernelError::ContextNotFound(ctx_id))?;
            if ctx.killed {
                return Ok(());
            }
            ctx.submits = ctx.submits.saturating_add(count);
            if ctx.acked && !ctx.enqueued {
                ctx.enqueued = true;
                (ctx.receiver, true)
            } else {
                (ctx.receiver, false)
            }
        };
        if deliver {
            if let Some(r) = self.receivers.get_mut(&receiver) {
                r.deliverable.push_back(ctx_id);
            }
            self.deliver_pending(receiver);
        }
        Ok(())
    }

    /// Registers a thread as a waiting handler on a receiver
    ///
    /// The thread blocks in `AwaitsSignal`; if a delivery is already
    /// pending, it completes immediately. A thread can wait on at most one
    /// thing: any previous handler or killer registration is cancelled
    /// first, so a re-issued wait never leaves a duplicate queue entry
    /// behind.
    pub fn await_signal(
        &mut self,
        thread: ThreadId,
        receiver: ReceiverId,
    ) -> Result<(), KernelError> {
        if !self.receivers.contains_key(&receiver) {
            return Err(KernelError::ReceiverNotFound(receiver));
        }
        if !self.threads.contains_key(&thread) {
            return Err(KernelError::ThreadNotFound(thread));
        }
        self.cancel_signal_wait(thread);
        self.cancel_kill_wait(thread);
        self.deactivate(thread, ThreadState::AwaitsSignal);
        if let Some(t) = self.threads.get_mut(&thread) {
            t.waiting_receiver = Some(receiver);
        }
        if let Some(r) = self.receivers.get_mut(&receiver) {
            r.handlers.push_back(thread);
        }
        self.deliver_pending(receiver);
        Ok(())
    }

    /// Acknowledges the last delivery on a context
    ///
    /// A pending kill takes precedence over further delivery: the ack
    /// completes it and reactivates the killer. Otherwise the context
    /// becomes ready for its next delivery, which is attempted at once if
    /// submits accumulated in the meantime.
    pub fn ack_signal(&mut self, ctx_id: SignalContextId) -> Result<(), KernelError> {
        let killed = {
            let ctx = self
                .contexts
                .get(&ctx_id)
                .ok_or(KernelError::ContextNotFound(ctx_id))?;
            ctx.killed
        };
        if killed {
            let killer = self.contexts.get_mut(&ctx_id).and_then(|c| c.killer.take());
            if let Some(killer) = killer {
                self.finish_kill(killer, KillOutcome::Done);
            }
            return Ok(());
        }
        let (receiver, deliver) = {
            let ctx = self
                .contexts
                .get_mut(&ctx_id)
                .ok_or(KernelError::ContextNotFound(ctx_id))?;
            ctx.acked = true;
            if ctx.submits > 0 && !ctx.enqueued {
                ctx.enqueued = true;
                (ctx.receiver, true)
            } else {
                (ctx.receiver, false)
            }
        };
        if deliver {
            if let Some(r) = self.receivers.get_mut(&receiver) {
                r.deliverable.push_back(ctx_id);
            }
            self.deliver_pending(receiver);
        }
        Ok(())
    }

    /// Requests destruction of a context's delivery state
    ///
    /// Completes immediately when the context is idle. Otherwise the
    /// calling thread blocks in `AwaitsSignalContextKill` and completes on
    /// the next acknowledgement. A second kill is a routine error.
    pub fn kill_context(
        &mut self,
        ctx_id: SignalContextId,
        killer: ThreadId,
    ) -> Result<KillCompletion, KernelError> {
        if !self.threads.contains_key(&killer) {
            return Err(KernelError::ThreadNotFound(killer));
        }
        let immediate = {
            let ctx = self
                .contexts
                .get_mut(&ctx_id)
                .ok_or(KernelError::ContextNotFound(ctx_id))?;
            if ctx.killed {
                return Err(KernelError::AlreadyKilled(ctx_id));
            }
            ctx.killed = true;
            if ctx.acked && !ctx.enqueued {
                true
            } else {
                ctx.killer = Some(killer);
                false
            }
        };
        if immediate {
            return Ok(KillCompletion::Immediate);
        }
        // The killer can wait on at most one thing; drop any registration
        // it still holds before blocking it here.
        self.cancel_signal_wait(killer);
        self.cancel_kill_wait(killer);
        self.deactivate(killer, ThreadState::AwaitsSignalContextKill);
        if let Some(t) = self.threads.get_mut(&killer) {
            t.killing_context = Some(ctx_id);
        }
        Ok(KillCompletion::Deferred)
    }

    /// Destroys a signal context
    ///
    /// A killer still blocked on this context is notified of failure, not
    /// success.
    pub fn destroy_context(&mut self, ctx_id: SignalContextId) -> Result<(), KernelError> {
        let ctx = self
            .contexts
            .remove(&ctx_id)
            .ok_or(KernelError::ContextNotFound(ctx_id))?;
        if let Some(receiver) = self.receivers.get_mut(&ctx.receiver) {
            receiver.contexts.retain(|&c| c != ctx_id);
            receiver.deliverable.retain(|&c| c != ctx_id);
        }
        if let Some(killer) = ctx.killer {
            self.finish_kill(killer, KillOutcome::Failed);
        }
        self.invalidate_identity(ctx.identity);
        Ok(())
    }

    /// Destroys a signal receiver
    ///
    /// Destructs all owned contexts and reactivates every waiting handler
    /// without a delivery. Both queues end up empty.
    pub fn destroy_receiver(&mut self, rid: ReceiverId) -> Result<(), KernelError> {
        let receiver = self
            .receivers
            .remove(&rid)
            .ok_or(KernelError::ReceiverNotFound(rid))?;
        for ctx_id in receiver.contexts {
            if let Some(ctx) = self.contexts.remove(&ctx_id) {
                if let Some(killer) = ctx.killer {
                    self.finish_kill(killer, KillOutcome::Failed);
                }
                self.invalidate_identity(ctx.identity);
            }
        }
        for handler in receiver.handlers {
            if let Some(t) = self.threads.get_mut(&handler) {
                t.waiting_receiver = None;
            }
            self.activate(handler);
        }
        self.invalidate_identity(receiver.identity);
        Ok(())
    }

    /// Returns a receiver for inspection
    pub fn receiver(&self, rid: ReceiverId) -> Option<&SignalReceiver> {
        self.receivers.get(&rid)
    }

    /// Returns the identity handle of a receiver
    pub fn receiver_identity(&self, rid: ReceiverId) -> Option<IdentityId> {
        self.receivers.get(&rid).map(|r| r.identity)
    }

    /// Returns the identity handle of a context
    pub fn context_identity(&self, ctx: SignalContextId) -> Option<IdentityId> {
        self.contexts.get(&ctx).map(|c| c.identity)
    }

    /// Returns the number of contexts with a pending delivery
    pub fn receiver_pending_count(&self, rid: ReceiverId) -> Option<usize> {
        self.receivers.get(&rid).map(|r| r.deliverable.len())
    }

    /// Returns the number of waiting handler threads
    pub fn receiver_handler_count(&self, rid: ReceiverId) -> Option<usize> {
        self.receivers.get(&rid).map(|r| r.handlers.len())
    }

    /// Returns the number of contexts owned by a receiver
    pub fn receiver_context_count(&self, rid: ReceiverId) -> Option<usize> {
        self.receivers.get(&rid).map(|r| r.contexts.len())
    }

    /// Returns the accumulated submit count of a context
    pub fn context_submits(&self, ctx: SignalContextId) -> Option<u32> {
        self.contexts.get(&ctx).map(|c| c.submits)
    }

    /// Returns whether a context has been killed
    pub fn context_killed(&self, ctx: SignalContextId) -> Option<bool> {
        self.contexts.get(&ctx).map(|c| c.killed)
    }

    /// Completes a blocked kill request and reactivates the killer
    pub(crate) fn finish_kill(&mut self, killer: ThreadId, outcome: KillOutcome) {
        if let Some(t) = self.threads.get_mut(&killer) {
            t.killing_context = None;
            t.kill_outcome = Some(outcome);
        }
        self.activate(killer);
    }

    /// Pairs deliverable contexts with waiting handlers, heads only
    fn deliver_pending(&mut self, rid: ReceiverId) {
        loop {
            let has_handler = match self.receivers.get(&rid) {
                Some(r) => !r.handlers.is_empty(),
                None => return,
            };
            if !has_handler {
                return;
            }
            // Drop killed or vanished contexts from the queue head without
            // consuming a handler.
            let ctx_id = loop {
                let head = match self.receivers.get(&rid) {
                    Some(r) => r.deliverable.front().copied(),
                    None => return,
                };
                let Some(head) = head else {
                    return;
                };
                let alive = self.contexts.get(&head).map_or(false, |c| !c.killed);
                if alive {
                    break head;
                }
                if let Some(r) = self.receivers.get_mut(&rid) {
                    r.deliverable.pop_front();
                }
                if let Some(c) = self.contexts.get_mut(&head) {
                    c.enqueued = false;
                }
            };
            let handler = match self.receivers.get_mut(&rid) {
                Some(r) => {
                    r.deliverable.pop_front();
                    match r.handlers.pop_front() {
                        Some(h) => h,
                        None => return,
                    }
                }
                None => return,
            };
            let payload = match self.contexts.get_mut(&ctx_id) {
                Some(ctx) => {
                    let payload = SignalDelivery {
                        imprint: ctx.imprint,
                        count: ctx.submits,
                    };
                    ctx.submits = 0;
                    ctx.acked = false;
                    ctx.enqueued = false;
                    payload
                }
                None => {
                    if let Some(r) = self.receivers.get_mut(&rid) {
                        r.handlers.push_front(handler);
                    }
                    continue;
                }
            };
            if let Some(t) = self.threads.get_mut(&handler) {
                t.waiting_receiver = None;
                t.delivered_signal = Some(payload);
            }
            self.activate(handler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Priority;

    fn kernel_with_thread() -> (Kernel, ThreadId) {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let thread = kernel.create_thread("handler", Priority::new(1));
        kernel.start_thread(thread, pd).unwrap();
        (kernel, thread)
    }

    #[test]
    fn test_submit_then_await_delivers() {
        let (mut kernel, thread) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0xbeef).unwrap();

        kernel.submit_signal(ctx, 1).unwrap();
        assert_eq!(kernel.receiver_pending_count(receiver), Some(1));

        kernel.await_signal(thread, receiver).unwrap();
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::Active));
        let delivery = kernel.take_delivered_signal(thread).unwrap();
        assert_eq!(delivery.imprint, 0xbeef);
        assert_eq!(delivery.count, 1);
        assert_eq!(kernel.receiver_pending_count(receiver), Some(0));
        assert_eq!(kernel.context_submits(ctx), Some(0));
    }

    #[test]
    fn test_await_then_submit_delivers() {
        let (mut kernel, thread) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 1).unwrap();

        kernel.await_signal(thread, receiver).unwrap();
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::AwaitsSignal));

        kernel.submit_signal(ctx, 1).unwrap();
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::Active));
        assert_eq!(kernel.take_delivered_signal(thread).unwrap().count, 1);
    }

    #[test]
    fn test_submits_accumulate_into_one_delivery() {
        let (mut kernel, thread) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 2).unwrap();

        // submit(n1) then submit(n2) is indistinguishable from
        // submit(n1 + n2).
        kernel.submit_signal(ctx, 3).unwrap();
        kernel.submit_signal(ctx, 4).unwrap();
        assert_eq!(kernel.receiver_pending_count(receiver), Some(1));

        kernel.await_signal(thread, receiver).unwrap();
        assert_eq!(kernel.take_delivered_signal(thread).unwrap().count, 7);
    }

    #[test]
    fn test_submit_counter_saturates() {
        let (mut kernel, _) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0).unwrap();
        kernel.submit_signal(ctx, u32::MAX).unwrap();
        kernel.submit_signal(ctx, 10).unwrap();
        assert_eq!(kernel.context_submits(ctx), Some(u32::MAX));
    }

    #[test]
    fn test_no_redelivery_before_ack() {
        let (mut kernel, thread) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 5).unwrap();

        kernel.submit_signal(ctx, 1).unwrap();
        kernel.await_signal(thread, receiver).unwrap();
        kernel.take_delivered_signal(thread).unwrap();

        // Unacknowledged: new submits accumulate but do not deliver.
        kernel.submit_signal(ctx, 2).unwrap();
        kernel.await_signal(thread, receiver).unwrap();
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::AwaitsSignal));
        assert_eq!(kernel.context_submits(ctx), Some(2));

        kernel.ack_signal(ctx).unwrap();
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::Active));
        assert_eq!(kernel.take_delivered_signal(thread).unwrap().count, 2);
    }

    #[test]
    fn test_kill_idle_context_is_immediate() {
        let (mut kernel, thread) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0).unwrap();

        let completion = kernel.kill_context(ctx, thread).unwrap();
        assert_eq!(completion, KillCompletion::Immediate);
        assert_eq!(kernel.thread_state(thread), Some(ThreadState::Active));
        assert_eq!(kernel.context_killed(ctx), Some(true));
    }

    #[test]
    fn test_kill_completes_on_next_ack() {
        let (mut kernel, handler) = kernel_with_thread();
        let pd = kernel.thread(handler).unwrap().domain().unwrap();
        let killer = kernel.create_thread("killer", Priority::new(1));
        kernel.start_thread(killer, pd).unwrap();

        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0).unwrap();

        // Delivery outstanding: handler got the signal, no ack yet.
        kernel.submit_signal(ctx, 1).unwrap();
        kernel.await_signal(handler, receiver).unwrap();
        assert!(kernel.take_delivered_signal(handler).is_some());

        let completion = kernel.kill_context(ctx, killer).unwrap();
        assert_eq!(completion, KillCompletion::Deferred);
        assert_eq!(
            kernel.thread_state(killer),
            Some(ThreadState::AwaitsSignalContextKill)
        );

        kernel.ack_signal(ctx).unwrap();
        assert_eq!(kernel.thread_state(killer), Some(ThreadState::Active));
        assert_eq!(kernel.take_kill_outcome(killer), Some(KillOutcome::Done));
    }

    #[test]
    fn test_submit_after_kill_request_is_dropped() {
        let (mut kernel, handler) = kernel_with_thread();
        let pd = kernel.thread(handler).unwrap().domain().unwrap();
        let killer = kernel.create_thread("killer", Priority::new(1));
        kernel.start_thread(killer, pd).unwrap();

        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 9).unwrap();
        kernel.submit_signal(ctx, 1).unwrap();
        kernel.await_signal(handler, receiver).unwrap();
        kernel.kill_context(ctx, killer).unwrap();

        // Submit between the kill request and the ack: dropped, and the
        // kill still completes.
        kernel.submit_signal(ctx, 5).unwrap();
        assert_eq!(kernel.context_submits(ctx), Some(0));
        kernel.ack_signal(ctx).unwrap();
        assert_eq!(kernel.take_kill_outcome(killer), Some(KillOutcome::Done));

        // No further delivery happens on the killed context.
        kernel.await_signal(handler, receiver).unwrap();
        assert_eq!(kernel.thread_state(handler), Some(ThreadState::AwaitsSignal));
    }

    #[test]
    fn test_double_kill_is_routine_error() {
        let (mut kernel, thread) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0).unwrap();
        kernel.submit_signal(ctx, 1).unwrap();
        kernel.kill_context(ctx, thread).unwrap();
        assert_eq!(
            kernel.kill_context(ctx, thread),
            Err(KernelError::AlreadyKilled(ctx))
        );
    }

    #[test]
    fn test_killed_context_skipped_without_consuming_handler() {
        let (mut kernel, handler) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let doomed = kernel.create_context(receiver, 1).unwrap();
        let live = kernel.create_context(receiver, 2).unwrap();

        kernel.submit_signal(doomed, 1).unwrap();
        kernel.submit_signal(live, 1).unwrap();
        // Kill the queued head; its killer defers to the next ack, but the
        // queue entry must not eat the handler.
        let killer = {
            let pd = kernel.thread(handler).unwrap().domain().unwrap();
            let killer = kernel.create_thread("killer", Priority::new(1));
            kernel.start_thread(killer, pd).unwrap();
            killer
        };
        kernel.kill_context(doomed, killer).unwrap();

        kernel.await_signal(handler, receiver).unwrap();
        let delivery = kernel.take_delivered_signal(handler).unwrap();
        assert_eq!(delivery.imprint, 2);
        assert_eq!(kernel.receiver_pending_count(receiver), Some(0));
    }

    #[test]
    fn test_destroy_context_fails_pending_killer() {
        let (mut kernel, killer) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx = kernel.create_context(receiver, 0).unwrap();
        kernel.submit_signal(ctx, 1).unwrap();
        kernel.kill_context(ctx, killer).unwrap();

        kernel.destroy_context(ctx).unwrap();
        assert_eq!(kernel.thread_state(killer), Some(ThreadState::Active));
        assert_eq!(kernel.take_kill_outcome(killer), Some(KillOutcome::Failed));
        assert_eq!(kernel.receiver_context_count(receiver), Some(0));
    }

    #[test]
    fn test_destroy_receiver_clears_queues_and_fails_handlers() {
        let (mut kernel, handler) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx_a = kernel.create_context(receiver, 1).unwrap();
        let _ctx_b = kernel.create_context(receiver, 2).unwrap();
        kernel.submit_signal(ctx_a, 1).unwrap();
        kernel.await_signal(handler, receiver).unwrap();
        // The single pending context was delivered; block the handler on a
        // second wait so receiver destruction finds it queued.
        kernel.take_delivered_signal(handler).unwrap();
        kernel.await_signal(handler, receiver).unwrap();
        assert_eq!(kernel.thread_state(handler), Some(ThreadState::AwaitsSignal));

        kernel.destroy_receiver(receiver).unwrap();
        assert!(kernel.receiver_pending_count(receiver).is_none());
        assert_eq!(kernel.thread_state(handler), Some(ThreadState::Active));
        // Woken without a delivery: the wait failed.
        assert!(kernel.take_delivered_signal(handler).is_none());
        assert_eq!(kernel.context_submits(ctx_a), None);
    }

    #[test]
    fn test_reawait_replaces_handler_registration() {
        let (mut kernel, handler) = kernel_with_thread();
        let receiver = kernel.create_receiver();
        let ctx_a = kernel.create_context(receiver, 0xa).unwrap();
        let ctx_b = kernel.create_context(receiver, 0xb).unwrap();

        // Waiting again while already registered replaces the old entry;
        // the handler queue never holds the thread twice.
        kernel.await_signal(handler, receiver).unwrap();
        kernel.await_signal(handler, receiver).unwrap();
        assert_eq!(kernel.receiver_handler_count(receiver), Some(1));

        kernel.submit_signal(ctx_a, 1).unwrap();
        kernel.submit_signal(ctx_b, 1).unwrap();

        // Exactly one delivery pairs with the single registration; the
        // second context stays pending instead of overwriting the payload.
        assert_eq!(kernel.take_delivered_signal(handler).unwrap().imprint, 0xa);
        assert_eq!(kernel.receiver_pending_count(receiver), Some(1));
        kernel.await_signal(handler, receiver).unwrap();
        assert_eq!(kernel.take_delivered_signal(handler).unwrap().imprint, 0xb);
    }

    #[test]
    fn test_kill_from_waiting_handler_cancels_wait() {
        let (mut kernel, thread) = kernel_with_thread();
        let quiet = kernel.create_receiver();
        let busy_recv = kernel.create_receiver();
        let ctx = kernel.create_context(busy_recv, 5).unwrap();
        kernel.submit_signal(ctx, 1).unwrap();

        kernel.await_signal(thread, quiet).unwrap();
        assert_eq!(kernel.receiver_handler_count(quiet), Some(1));

        let completion = kernel.kill_context(ctx, thread).unwrap();
        assert_eq!(completion, KillCompletion::Deferred);
        assert_eq!(
            kernel.thread_state(thread),
            Some(ThreadState::AwaitsSignalContextKill)
        );
        // The stale handler registration was dropped along with the wait.
        assert_eq!(kernel.receiver_handler_count(quiet), Some(0));

        kernel.ack_signal(ctx).unwrap();
        assert_eq!(kernel.take_kill_outcome(thread), Some(KillOutcome::Done));
        assert!(kernel.take_delivered_signal(thread).is_none());
    }

    #[test]
    fn test_receiver_inspection() {
        let (mut kernel, _) = kernel_with_thread();
        let rid = kernel.create_receiver();
        assert_eq!(kernel.receiver(rid).unwrap().id(), rid);
        assert_eq!(kernel.receiver_context_count(rid), Some(0));
    }

    #[test]
    fn test_fifo_pairing_across_contexts_and_handlers() {
        let mut kernel = Kernel::new();
        let pd = kernel.create_domain("init");
        let h1 = kernel.create_thread("h1", Priority::new(1));
        let h2 = kernel.create_thread("h2", Priority::new(1));
        kernel.start_thread(h1, pd).unwrap();
        kernel.start_thread(h2, pd).unwrap();

        let receiver = kernel.create_receiver();
        let ctx_a = kernel.create_context(receiver, 10).unwrap();
        let ctx_b = kernel.create_context(receiver, 20).unwrap();

        kernel.await_signal(h1, receiver).unwrap();
        kernel.await_signal(h2, receiver).unwrap();
        kernel.submit_signal(ctx_a, 1).unwrap();
        kernel.submit_signal(ctx_b, 1).unwrap();

        assert_eq!(kernel.take_delivered_signal(h1).unwrap().imprint, 10);
        assert_eq!(kernel.take_delivered_signal(h2).unwrap().imprint, 20);
    }
}
