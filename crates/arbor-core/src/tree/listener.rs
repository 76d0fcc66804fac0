//! Change listeners for [`ValueTree`](super::ValueTree) entities.
//!
//! A listener is registered on one entity with a [`ListenerScope`], an
//! optional [`PropertyFilter`], and a [`DeliveryMode`]. Registration returns a
//! [`ListenerHandle`]; dropping the handle unregisters the listener, so the
//! owner of the handle controls its lifetime.
//!
//! Synchronous listeners run inside the mutating call, before it returns.
//! Asynchronous listeners queue owned events on a channel and run when the
//! handle owner calls [`ListenerHandle::deliver_pending`].

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};

use super::{Entity, ValueTree};

/// Callback invoked with each delivered [`TreeEvent`].
pub type TreeCallback = Box<dyn Fn(&TreeEvent) + Send + Sync>;

/// A single mutation notification.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// A property was set, changed, or removed on `tree`.
    PropertyChanged {
        /// The entity whose property changed.
        tree: ValueTree,
        /// Name of the property.
        property: String,
    },
    /// `child` was inserted into `parent` at `index`.
    ChildAdded {
        /// The entity that received the child.
        parent: ValueTree,
        /// The inserted child.
        child: ValueTree,
        /// Insertion index.
        index: usize,
    },
    /// `child` was removed from `parent`; it used to live at `index`.
    ChildRemoved {
        /// The entity that lost the child.
        parent: ValueTree,
        /// The removed child.
        child: ValueTree,
        /// Former index of the child.
        index: usize,
    },
}

impl TreeEvent {
    /// Returns the child and an added/removed flag for child-list events.
    pub fn child_change(&self) -> Option<(&ValueTree, bool)> {
        match self {
            TreeEvent::ChildAdded { child, .. } => Some((child, true)),
            TreeEvent::ChildRemoved { child, .. } => Some((child, false)),
            TreeEvent::PropertyChanged { .. } => None,
        }
    }

    /// Returns the mutated entity and property name for property events.
    pub fn property_change(&self) -> Option<(&ValueTree, &str)> {
        match self {
            TreeEvent::PropertyChanged { tree, property } => Some((tree, property.as_str())),
            _ => None,
        }
    }
}

/// Which mutations relative to the registration entity reach a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerScope {
    /// Property changes on the entity itself.
    Properties,
    /// Children added to or removed from the entity itself.
    Children,
    /// Property changes on the entity or any descendant.
    RecursiveProperties,
    /// Every mutation on the entity or any descendant.
    Subtree,
}

/// How events reach the listener's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Inside the mutating call, before it returns.
    #[default]
    Synchronous,
    /// Queued until [`ListenerHandle::deliver_pending`] is called.
    Asynchronous,
}

/// Restricts property events to a set of property names.
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter(Option<Vec<String>>);

impl PropertyFilter {
    /// Accepts every property.
    pub fn any() -> Self {
        Self(None)
    }

    /// Accepts only the named properties.
    pub fn only(names: &[&str]) -> Self {
        Self(Some(names.iter().map(|n| (*n).to_string()).collect()))
    }

    /// Returns true if `property` passes the filter.
    pub fn matches(&self, property: &str) -> bool {
        self.0
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == property))
    }
}

enum Sink {
    Sync(TreeCallback),
    Async(Sender<TreeEvent>),
}

/// Registered listener entry, shared between its entity and dispatch snapshots.
pub(crate) struct Listener {
    pub(crate) id: u64,
    scope: ListenerScope,
    filter: PropertyFilter,
    sink: Sink,
    alive: AtomicBool,
}

impl Listener {
    /// Whether this listener wants `event`, seen `depth` levels above the
    /// entity where it happened (0 = the entity itself).
    pub(crate) fn wants(&self, event: &TreeEvent, depth: usize) -> bool {
        match (self.scope, event) {
            (ListenerScope::Properties, TreeEvent::PropertyChanged { property, .. }) => {
                depth == 0 && self.filter.matches(property)
            }
            (
                ListenerScope::RecursiveProperties | ListenerScope::Subtree,
                TreeEvent::PropertyChanged { property, .. },
            ) => self.filter.matches(property),
            (ListenerScope::Children, TreeEvent::PropertyChanged { .. }) => false,
            (ListenerScope::Children, _) => depth == 0,
            (ListenerScope::Subtree, _) => true,
            (ListenerScope::Properties | ListenerScope::RecursiveProperties, _) => false,
        }
    }

    pub(crate) fn deliver(&self, event: &TreeEvent) {
        if !self.alive.load(Ordering::Acquire) {
            return;
        }
        match &self.sink {
            Sink::Sync(callback) => callback(event),
            // The receiver lives in the handle; a send only fails after the
            // handle is gone, and then there is nobody left to notify.
            Sink::Async(tx) => {
                let _ = tx.send(event.clone());
            }
        }
    }
}

/// Owner token for a registered listener. Dropping it unregisters.
#[must_use = "the listener is removed as soon as the handle is dropped"]
pub struct ListenerHandle {
    entity: Weak<Entity>,
    listener: std::sync::Arc<Listener>,
    pending: Option<(Receiver<TreeEvent>, TreeCallback)>,
}

impl ListenerHandle {
    pub(crate) fn register(
        tree: &ValueTree,
        scope: ListenerScope,
        filter: PropertyFilter,
        mode: DeliveryMode,
        callback: TreeCallback,
    ) -> Self {
        let id = tree.inner.next_listener_id();
        let (sink, pending) = match mode {
            DeliveryMode::Synchronous => (Sink::Sync(callback), None),
            DeliveryMode::Asynchronous => {
                let (tx, rx) = crossbeam_channel::unbounded();
                (Sink::Async(tx), Some((rx, callback)))
            }
        };
        let listener = std::sync::Arc::new(Listener {
            id,
            scope,
            filter,
            sink,
            alive: AtomicBool::new(true),
        });
        tree.inner.listeners.write().push(listener.clone());
        Self {
            entity: std::sync::Arc::downgrade(&tree.inner),
            listener,
            pending,
        }
    }

    /// Runs the callback for every queued event of an asynchronous listener.
    ///
    /// Returns the number of delivered events; always 0 for synchronous ones.
    pub fn deliver_pending(&self) -> usize {
        let Some((rx, callback)) = &self.pending else {
            return 0;
        };
        let mut delivered = 0;
        while let Ok(event) = rx.try_recv() {
            callback(&event);
            delivered += 1;
        }
        delivered
    }

    /// Returns true while the entity this listener watches is alive.
    pub fn is_attached(&self) -> bool {
        self.entity.strong_count() > 0
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.listener.alive.store(false, Ordering::Release);
        if let Some(entity) = self.entity.upgrade() {
            let id = self.listener.id;
            entity.listeners.write().retain(|l| l.id != id);
        }
    }
}

impl core::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.listener.id)
            .field("scope", &self.listener.scope)
            .field("attached", &self.is_attached())
            .finish()
    }
}
