//! Correlation table for in-flight device commands
//!
//! Device replies arrive pushed, out-of-band, and possibly out of order
//! — sometimes before the issuing task has even started waiting. The
//! CorrelationTable resolves that race: each id owns a slot holding at
//! most one suspended waiter and at most one buffered reply, and every
//! operation on a slot happens under a single lock so that register,
//! deliver, and expire always produce exactly one winner. A reply is
//! never delivered twice and a waiter is never left stuck.
//!
//! Waiters are resumed through oneshot channels. Replies are always
//! buffered on delivery, even when a waiter is resumed, so that the
//! batch's final `drain` can read the full ordered result set without
//! the executor keeping per-step state of its own.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use protocol::{ReplyPayload, RequestId};

/// What a suspended waiter eventually receives.
#[derive(Debug)]
pub enum WaitResult {
    /// The correlated reply arrived
    Reply(ReplyPayload),
    /// The per-step timer fired before any reply
    TimedOut,
}

/// Result of registering a waiter for an id.
pub enum Registration {
    /// A reply was already buffered; no waiting needed
    Fulfilled(ReplyPayload),
    /// No reply yet; await the receiver
    Awaiting(oneshot::Receiver<WaitResult>),
}

/// Result of delivering a reply for an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A waiter was suspended on this id and has been resumed
    ResumedWaiter,
    /// The id had already timed out; the reply is buffered inert
    BufferedAfterTimeout,
    /// No waiter yet; the reply is buffered for a future registration
    BufferedAwaitingWaiter,
}

/// Result of expiring an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The active waiter was failed with a timeout
    ResumedWithTimeout,
    /// No waiter was active (reply already delivered, or never awaited)
    AlreadyResolved,
}

/// Per-id slot state.
#[derive(Default)]
struct Slot {
    /// At most one suspended caller at a time
    waiter: Option<oneshot::Sender<WaitResult>>,

    /// Reply buffered before a waiter registered, or retained for drain
    buffered: Option<ReplyPayload>,

    /// Set once the per-step timer has fired for this id
    timed_out: bool,
}

/// Table mapping in-flight request ids to waiters and buffered replies.
///
/// Safe under concurrent access from the coordinating task (register,
/// expire, drain, clear) and the transport's delivery callback
/// (deliver). Clone is cheap; clones share the same table.
#[derive(Clone, Default)]
pub struct CorrelationTable {
    slots: Arc<Mutex<HashMap<RequestId, Slot>>>,
}

impl CorrelationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the caller as the waiter for `id`.
    ///
    /// If a reply is already buffered it is handed back synchronously;
    /// otherwise the returned receiver resolves when `deliver` or
    /// `expire` runs for this id. A second registration for the same id
    /// replaces the first (the invariant is at most one *active*
    /// waiter; the executor never does this for a live step).
    pub async fn register(&self, id: &RequestId) -> Registration {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(id.clone()).or_default();

        if let Some(payload) = slot.buffered.clone() {
            debug!(%id, "reply was buffered before waiter registered");
            return Registration::Fulfilled(payload);
        }

        let (tx, rx) = oneshot::channel();
        slot.waiter = Some(tx);
        Registration::Awaiting(rx)
    }

    /// Deliver the correlated reply for `id`.
    ///
    /// The payload is always buffered. If a waiter is suspended it is
    /// resumed and the waiter slot cleared.
    pub async fn deliver(&self, id: &RequestId, payload: ReplyPayload) -> Delivery {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(id.clone()).or_default();
        slot.buffered = Some(payload.clone());

        if let Some(waiter) = slot.waiter.take() {
            // Receiver may have been dropped; the buffer still holds the
            // payload for drain either way.
            let _ = waiter.send(WaitResult::Reply(payload));
            return Delivery::ResumedWaiter;
        }

        if slot.timed_out {
            Delivery::BufferedAfterTimeout
        } else {
            Delivery::BufferedAwaitingWaiter
        }
    }

    /// Expire `id`: fail its waiter with a timeout if one is still
    /// suspended, otherwise just mark the slot timed-out for
    /// bookkeeping.
    pub async fn expire(&self, id: &RequestId) -> Expiry {
        let mut slots = self.slots.lock().await;
        let slot = slots.entry(id.clone()).or_default();
        slot.timed_out = true;

        match slot.waiter.take() {
            Some(waiter) => {
                let _ = waiter.send(WaitResult::TimedOut);
                Expiry::ResumedWithTimeout
            }
            None => Expiry::AlreadyResolved,
        }
    }

    /// Collect buffered payloads for `ids`, in the order given,
    /// omitting ids with nothing buffered. Non-destructive; pair with
    /// `clear` to release the slots.
    pub async fn drain(&self, ids: &[RequestId]) -> Vec<ReplyPayload> {
        let slots = self.slots.lock().await;
        ids.iter()
            .filter_map(|id| slots.get(id).and_then(|slot| slot.buffered.clone()))
            .collect()
    }

    /// Forget all state for `ids`. Idempotent; unknown ids are ignored.
    pub async fn clear(&self, ids: &[RequestId]) {
        let mut slots = self.slots.lock().await;
        for id in ids {
            slots.remove(id);
        }
    }

    /// Number of live slots (tests and diagnostics).
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// True if no slots are live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Candidate;

    fn payload(name: &str) -> ReplyPayload {
        ReplyPayload::new(vec![Candidate::new(name, format!("SNES/{name}.sfc"))])
    }

    #[tokio::test]
    async fn test_deliver_before_register_fulfills_immediately() {
        let table = CorrelationTable::new();
        let id = RequestId::generate();

        let delivery = table.deliver(&id, payload("smw")).await;
        assert_eq!(delivery, Delivery::BufferedAwaitingWaiter);

        match table.register(&id).await {
            Registration::Fulfilled(p) => assert_eq!(p, payload("smw")),
            Registration::Awaiting(_) => panic!("expected buffered fulfillment"),
        }
    }

    #[tokio::test]
    async fn test_register_then_deliver_resumes_waiter() {
        let table = CorrelationTable::new();
        let id = RequestId::generate();

        let rx = match table.register(&id).await {
            Registration::Awaiting(rx) => rx,
            Registration::Fulfilled(_) => panic!("nothing buffered yet"),
        };

        assert_eq!(table.deliver(&id, payload("smw")).await, Delivery::ResumedWaiter);

        match rx.await.unwrap() {
            WaitResult::Reply(p) => assert_eq!(p, payload("smw")),
            WaitResult::TimedOut => panic!("expected reply"),
        }
    }

    #[tokio::test]
    async fn test_expire_fails_waiter_and_later_reply_is_inert() {
        let table = CorrelationTable::new();
        let id = RequestId::generate();

        let rx = match table.register(&id).await {
            Registration::Awaiting(rx) => rx,
            Registration::Fulfilled(_) => panic!("nothing buffered yet"),
        };

        assert_eq!(table.expire(&id).await, Expiry::ResumedWithTimeout);
        assert!(matches!(rx.await.unwrap(), WaitResult::TimedOut));

        // Late reply is buffered but resumes no one.
        assert_eq!(
            table.deliver(&id, payload("late")).await,
            Delivery::BufferedAfterTimeout
        );

        // The buffered late reply is still drainable for bookkeeping.
        let drained = table.drain(std::slice::from_ref(&id)).await;
        assert_eq!(drained, vec![payload("late")]);
    }

    #[tokio::test]
    async fn test_expire_after_delivery_reports_already_resolved() {
        let table = CorrelationTable::new();
        let id = RequestId::generate();

        table.deliver(&id, payload("smw")).await;
        assert_eq!(table.expire(&id).await, Expiry::AlreadyResolved);
    }

    #[tokio::test]
    async fn test_drain_preserves_requested_order_and_skips_missing() {
        let table = CorrelationTable::new();
        let ids: Vec<RequestId> = (0..3).map(|_| RequestId::generate()).collect();

        // Deliver out of order, skip the middle id entirely.
        table.deliver(&ids[2], payload("sonic")).await;
        table.deliver(&ids[0], payload("mario")).await;

        let drained = table.drain(&ids).await;
        assert_eq!(drained, vec![payload("mario"), payload("sonic")]);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let table = CorrelationTable::new();
        let ids: Vec<RequestId> = (0..2).map(|_| RequestId::generate()).collect();

        table.deliver(&ids[0], payload("a")).await;
        table.clear(&ids).await;
        assert!(table.is_empty().await);
        // Second clear on the same set is a no-op.
        table.clear(&ids).await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_deliver_and_register_single_winner() {
        let table = CorrelationTable::new();
        let id = RequestId::generate();

        let t = table.clone();
        let deliver_id = id.clone();
        let deliver = tokio::spawn(async move { t.deliver(&deliver_id, payload("smw")).await });

        let got = match table.register(&id).await {
            Registration::Fulfilled(p) => p,
            Registration::Awaiting(rx) => match rx.await.unwrap() {
                WaitResult::Reply(p) => p,
                WaitResult::TimedOut => panic!("no timeout issued"),
            },
        };

        deliver.await.unwrap();
        assert_eq!(got, payload("smw"));
    }
}
