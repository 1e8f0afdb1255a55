//! In-process typed event broadcasting between UI surfaces.
//!
//! Surfaces showing the same project (board, calendar, review panel)
//! subscribe here to learn about accepted task changes instead of each
//! re-deriving them from the document feed. Delivery is synchronous, in
//! registration order, and process-local; nothing survives a reload.

use crate::task::domain::{Task, TaskId, TaskStatus};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// Where an accepted change originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A mutation made through this client.
    Local,
    /// A change observed on the shared document feed.
    Remote,
}

/// An accepted task change, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A task was created and confirmed by the store.
    Created {
        /// The task as stored.
        task: Task,
    },
    /// Task fields changed and were confirmed by the store.
    Updated {
        /// The task as stored.
        task: Task,
    },
    /// A status change was accepted.
    StatusUpdated {
        /// Which task changed.
        task_id: TaskId,
        /// The status it moved to.
        new_status: TaskStatus,
        /// The task as stored after the change.
        task: Task,
        /// Whether the change was made here or observed remotely.
        origin: ChangeOrigin,
    },
}

type Handler = Arc<dyn Fn(&TaskEvent) + Send + Sync>;
type SubscriberList = Mutex<Vec<(u64, Handler)>>;

/// Synchronous in-process publish/subscribe hub for [`TaskEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: Arc<SubscriberList>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for all subsequent events.
    ///
    /// Handlers run synchronously on the publishing thread, in
    /// registration order. The returned [`Subscription`] removes the
    /// handler when dropped or explicitly unsubscribed.
    #[must_use]
    pub fn subscribe(&self, handler: impl Fn(&TaskEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Delivers an event to every current subscriber.
    ///
    /// Handlers registered during delivery see later events only.
    pub fn publish(&self, event: &TaskEvent) {
        // Snapshot the handler list so handlers may subscribe or publish
        // without deadlocking on the subscriber lock.
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle keeping one [`EventBus`] subscription alive.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl Subscription {
    /// Removes the handler from the bus.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}
