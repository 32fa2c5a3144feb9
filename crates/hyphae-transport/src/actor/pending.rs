//! Outstanding `ask` requests, keyed by correlation id.

use dashmap::DashMap;
use hyphae_protocol::CorrelationId;
use std::any::Any;
use tokio::sync::oneshot;

/// Type-erased reply value; the asker downcasts it to the type it expects
pub(crate) type Reply = Box<dyn Any + Send>;

/// Where a reply is delivered
pub(crate) enum ReplySlot {
    /// Thread blocked in `ask`
    Blocking(crossbeam_channel::Sender<Reply>),
    /// Task awaiting `ask_async`
    Async(oneshot::Sender<Reply>),
}

impl ReplySlot {
    fn fulfil(self, value: Reply) -> bool {
        match self {
            ReplySlot::Blocking(tx) => tx.try_send(value).is_ok(),
            ReplySlot::Async(tx) => tx.send(value).is_ok(),
        }
    }
}

/// Concurrent map of pending requests.
///
/// An entry is removed exactly once: by the first reply, by a timeout, or
/// by `clear` when the actor stops. Dropping a slot disconnects the waiting
/// asker, which reports the actor as no longer running.
#[derive(Default)]
pub(crate) struct PendingRequests {
    slots: DashMap<CorrelationId, ReplySlot>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, id: CorrelationId, slot: ReplySlot) {
        self.slots.insert(id, slot);
    }

    /// Deliver a reply. Unknown or already-completed ids are a no-op.
    pub(crate) fn fulfil(&self, id: CorrelationId, value: Reply) -> bool {
        match self.slots.remove(&id) {
            Some((_, slot)) => slot.fulfil(value),
            None => false,
        }
    }

    pub(crate) fn cancel(&self, id: CorrelationId) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Drop every pending request. Returns how many were outstanding.
    pub(crate) fn clear(&self) -> usize {
        let outstanding = self.slots.len();
        self.slots.clear();
        outstanding
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
