//! Named publish/subscribe channels.
//!
//! Channels are retrieved by name from a process-wide (thread-local)
//! registry: asking for the same name twice returns a channel wired to the
//! same listener set, so dispatch/listen are effectively global per name.
//! The `"default"` channel carries the application-wide events.
//!
//! Dispatch is synchronous and single-threaded. Listeners run in
//! registration order, and a listener may itself dispatch further events:
//! nested dispatches are queued and drained by the outermost `dispatch`
//! call, so every event is delivered before the outermost dispatch returns
//! and no listener is ever re-entered mid-delivery.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::content::NodeContent;
use crate::path::NodePath;

/// Channel name for application-wide events.
pub const DEFAULT_CHANNEL: &str = "default";

/// A node became the global selection. Carries the node's content.
pub const NODE_SELECTED: &str = "node-selected";
/// A node stopped being selected. Carries only the path.
pub const NODE_DESELECTED: &str = "node-deselected";
/// A node's content changed after its initial load.
pub const NODE_DATA_UPDATED: &str = "node-data-updated";
/// A recoverable failure with a human-readable message.
pub const EVENT_ERROR: &str = "error";
/// A non-fatal notice with a human-readable message.
pub const EVENT_WARNING: &str = "warning";

// ── Envelope ─────────────────────────────────────────────────────────

/// The payload of one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetail {
    /// A path plus the node content behind it.
    Node { path: NodePath, content: NodeContent },
    /// Just a path.
    Path { path: NodePath },
    /// A human-readable message.
    Message { message: String },
}

/// The message handed to listeners: the event name plus its detail.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub name: String,
    pub detail: Rc<EventDetail>,
}

// ── Listeners ────────────────────────────────────────────────────────

type Callback = Rc<RefCell<dyn FnMut(&Envelope)>>;

struct ListenerEntry {
    id: u64,
    event: String,
    callback: Callback,
}

/// Opaque proof of registration. Consumed by `remove_listener`; it is only
/// valid on the channel that issued it.
#[derive(Debug)]
pub struct ListenerHandle {
    channel: u64,
    listener: u64,
}

// ── EventChannel ─────────────────────────────────────────────────────

pub struct EventChannel {
    id: u64,
    name: String,
    next_listener: Cell<u64>,
    listeners: RefCell<Vec<ListenerEntry>>,
    queue: RefCell<VecDeque<Envelope>>,
    dispatching: Cell<bool>,
}

thread_local! {
    static REGISTRY: RefCell<HashMap<String, Rc<EventChannel>>> = RefCell::new(HashMap::new());
}

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(0);

impl EventChannel {
    fn new(name: &str) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            next_listener: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    /// Look up (or create) the channel with the given name.
    pub fn named(name: &str) -> Rc<EventChannel> {
        REGISTRY.with(|registry| {
            registry
                .borrow_mut()
                .entry(name.to_string())
                .or_insert_with(|| Rc::new(EventChannel::new(name)))
                .clone()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a listener for one event name. Listeners for the same event
    /// are invoked in registration order.
    pub fn add_listener(
        &self,
        event: &str,
        callback: impl FnMut(&Envelope) + 'static,
    ) -> ListenerHandle {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);
        self.listeners.borrow_mut().push(ListenerEntry {
            id,
            event: event.to_string(),
            callback: Rc::new(RefCell::new(callback)),
        });
        ListenerHandle {
            channel: self.id,
            listener: id,
        }
    }

    /// Unregister a listener.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different channel instance:
    /// that is a logic bug in the caller, not a recoverable condition.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        assert_eq!(
            handle.channel, self.id,
            "listener handle does not belong to channel '{}'",
            self.name
        );
        self.listeners
            .borrow_mut()
            .retain(|entry| entry.id != handle.listener);
    }

    /// Dispatch an event to every listener currently registered for it.
    ///
    /// All queued events (including ones dispatched from inside listeners)
    /// are delivered before the outermost `dispatch` returns.
    pub fn dispatch(&self, event: &str, detail: EventDetail) {
        self.queue.borrow_mut().push_back(Envelope {
            name: event.to_string(),
            detail: Rc::new(detail),
        });
        if self.dispatching.get() {
            // A dispatch further up the stack is draining the queue.
            return;
        }

        self.dispatching.set(true);
        loop {
            let envelope = self.queue.borrow_mut().pop_front();
            let Some(envelope) = envelope else { break };

            // Snapshot the matching listeners so callbacks may freely
            // register or unregister while we deliver.
            let targets: Vec<(u64, Callback)> = self
                .listeners
                .borrow()
                .iter()
                .filter(|entry| entry.event == envelope.name)
                .map(|entry| (entry.id, entry.callback.clone()))
                .collect();

            for (id, callback) in targets {
                let still_registered =
                    self.listeners.borrow().iter().any(|entry| entry.id == id);
                if still_registered {
                    (callback.borrow_mut())(&envelope);
                }
            }
        }
        self.dispatching.set(false);
    }

    /// Dispatch a message-detail event (`error`, `warning`).
    pub fn dispatch_message(&self, event: &str, message: impl Into<String>) {
        self.dispatch(
            event,
            EventDetail::Message {
                message: message.into(),
            },
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────────
