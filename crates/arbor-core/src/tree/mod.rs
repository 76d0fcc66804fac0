//! Observable tree of typed entities with ordered properties and children.
//!
//! The [`ValueTree`] is the substrate every node, container, and parameter
//! reacts to. Each entity has a type name, an ordered list of named
//! [`Value`] properties, and an ordered list of child entities. Handles are
//! cheap to clone and compare by identity.
//!
//! # Notifications
//!
//! [`add_child`](ValueTree::add_child), [`remove_child`](ValueTree::remove_child)
//! and [`set_property`](ValueTree::set_property) notify listeners before they
//! return. Listeners of the mutated entity run first, then those of each
//! ancestor outwards; within one entity they run in registration order.
//! Listener lists and the ancestor chain are snapshotted before delivery, so a
//! callback may register, drop, or mutate freely.
//!
//! No internal lock is held while callbacks run.

mod listener;
mod value;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::TreeError;

pub use listener::{
    DeliveryMode, ListenerHandle, ListenerScope, PropertyFilter, TreeCallback, TreeEvent,
};
pub use value::Value;

use listener::Listener;

pub(crate) struct Entity {
    type_name: String,
    properties: RwLock<Vec<(String, Value)>>,
    children: RwLock<Vec<ValueTree>>,
    parent: RwLock<Weak<Entity>>,
    listeners: RwLock<Vec<Arc<Listener>>>,
    listener_ids: AtomicU64,
}

impl Entity {
    fn next_listener_id(&self) -> u64 {
        self.listener_ids.fetch_add(1, Ordering::Relaxed)
    }
}

/// Shared handle to one tree entity.
#[derive(Clone)]
pub struct ValueTree {
    inner: Arc<Entity>,
}

/// Non-owning handle to a tree entity.
#[derive(Clone, Default)]
pub struct WeakTree(Weak<Entity>);

impl WeakTree {
    /// Returns the entity if it is still alive.
    pub fn upgrade(&self) -> Option<ValueTree> {
        self.0.upgrade().map(|inner| ValueTree { inner })
    }

    /// Returns true if this handle refers to `tree`.
    pub fn refers_to(&self, tree: &ValueTree) -> bool {
        core::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&tree.inner))
    }
}

impl ValueTree {
    /// Creates a detached entity of the given type with no properties.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Entity {
                type_name: type_name.into(),
                properties: RwLock::new(Vec::new()),
                children: RwLock::new(Vec::new()),
                parent: RwLock::new(Weak::new()),
                listeners: RwLock::new(Vec::new()),
                listener_ids: AtomicU64::new(0),
            }),
        }
    }

    /// Builder-style property setter for detached construction.
    ///
    /// Fires notifications like [`set_property`](Self::set_property).
    pub fn with_property(self, name: &str, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Builder-style child append for detached construction.
    ///
    /// A child that already has a parent is left where it is.
    pub fn with_child(self, child: ValueTree) -> Self {
        // Detached children cannot fail to attach to a fresh parent.
        let _ = self.add_child(child, None);
        self
    }

    /// Returns the entity's type name.
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// Returns true if the entity's type name equals `name`.
    pub fn has_type(&self, name: &str) -> bool {
        self.inner.type_name == name
    }

    /// Returns a non-owning handle.
    pub fn downgrade(&self) -> WeakTree {
        WeakTree(Arc::downgrade(&self.inner))
    }

    // --- Properties ---

    /// Returns a copy of the named property.
    pub fn property(&self, name: &str) -> Option<Value> {
        self.inner
            .properties
            .read()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    /// Returns the named property as a float, or `default`.
    pub fn property_f64(&self, name: &str, default: f64) -> f64 {
        self.property(name)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    /// Returns the named property as a boolean, or `false`.
    pub fn property_bool(&self, name: &str) -> bool {
        self.property(name).is_some_and(|v| v.as_bool())
    }

    /// Returns the named property rendered as text, or an empty string.
    pub fn property_string(&self, name: &str) -> String {
        self.property(name).map(|v| v.to_string()).unwrap_or_default()
    }

    /// Returns true if the property is present.
    pub fn has_property(&self, name: &str) -> bool {
        self.inner.properties.read().iter().any(|(k, _)| k == name)
    }

    /// Returns the property names in insertion order.
    pub fn property_names(&self) -> Vec<String> {
        self.inner
            .properties
            .read()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Sets a property and notifies listeners if the stored value changed.
    ///
    /// Returns true if a notification was sent.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        {
            let mut props = self.inner.properties.write();
            match props.iter_mut().find(|(k, _)| k == name) {
                Some((_, existing)) if *existing == value => return false,
                Some((_, existing)) => *existing = value,
                None => props.push((name.to_string(), value)),
            }
        }
        self.dispatch(TreeEvent::PropertyChanged {
            tree: self.clone(),
            property: name.to_string(),
        });
        true
    }

    /// Sets a property only if it is not present yet. Never notifies.
    pub fn set_default(&self, name: &str, value: impl Into<Value>) {
        let mut props = self.inner.properties.write();
        if !props.iter().any(|(k, _)| k == name) {
            props.push((name.to_string(), value.into()));
        }
    }

    /// Removes a property, notifying listeners if it existed.
    pub fn remove_property(&self, name: &str) -> bool {
        let removed = {
            let mut props = self.inner.properties.write();
            let before = props.len();
            props.retain(|(k, _)| k != name);
            props.len() != before
        };
        if removed {
            self.dispatch(TreeEvent::PropertyChanged {
                tree: self.clone(),
                property: name.to_string(),
            });
        }
        removed
    }

    // --- Children ---

    /// Inserts `child` at `index` (appends when `None` or out of range).
    ///
    /// # Errors
    ///
    /// [`TreeError::AlreadyHasParent`] if `child` is attached elsewhere,
    /// [`TreeError::WouldCreateCycle`] if `child` is this entity or one of its
    /// ancestors.
    pub fn add_child(&self, child: ValueTree, index: Option<usize>) -> Result<(), TreeError> {
        if child.parent().is_some() {
            return Err(TreeError::AlreadyHasParent(child.type_name().to_string()));
        }
        if self.is_equal_or_descendant_of(&child) {
            return Err(TreeError::WouldCreateCycle(child.type_name().to_string()));
        }

        let index = {
            let mut children = self.inner.children.write();
            let index = index.map_or(children.len(), |i| i.min(children.len()));
            children.insert(index, child.clone());
            index
        };
        *child.inner.parent.write() = Arc::downgrade(&self.inner);

        self.dispatch(TreeEvent::ChildAdded {
            parent: self.clone(),
            child,
            index,
        });
        Ok(())
    }

    /// Removes `child` if it is a direct child. Returns true if it was.
    pub fn remove_child(&self, child: &ValueTree) -> bool {
        match self.index_of(child) {
            Some(index) => self.remove_child_at(index).is_some(),
            None => false,
        }
    }

    /// Removes and returns the child at `index`.
    pub fn remove_child_at(&self, index: usize) -> Option<ValueTree> {
        let child = {
            let mut children = self.inner.children.write();
            if index >= children.len() {
                return None;
            }
            children.remove(index)
        };
        *child.inner.parent.write() = Weak::new();

        self.dispatch(TreeEvent::ChildRemoved {
            parent: self.clone(),
            child: child.clone(),
            index,
        });
        Some(child)
    }

    /// Returns a snapshot of the children.
    pub fn children(&self) -> Vec<ValueTree> {
        self.inner.children.read().clone()
    }

    /// Returns the number of children.
    pub fn num_children(&self) -> usize {
        self.inner.children.read().len()
    }

    /// Returns the child at `index`.
    pub fn child(&self, index: usize) -> Option<ValueTree> {
        self.inner.children.read().get(index).cloned()
    }

    /// Returns the position of `child` among the direct children.
    pub fn index_of(&self, child: &ValueTree) -> Option<usize> {
        self.inner.children.read().iter().position(|c| c == child)
    }

    /// Returns the first direct child with the given type name.
    pub fn child_with_name(&self, type_name: &str) -> Option<ValueTree> {
        self.inner
            .children
            .read()
            .iter()
            .find(|c| c.has_type(type_name))
            .cloned()
    }

    /// Returns the first direct child with the given type name, creating and
    /// appending an empty one if none exists.
    pub fn get_or_create_child_with_name(&self, type_name: &str) -> ValueTree {
        if let Some(existing) = self.child_with_name(type_name) {
            return existing;
        }
        let created = ValueTree::new(type_name);
        // A fresh entity has no parent and cannot be an ancestor.
        let _ = self.add_child(created.clone(), None);
        created
    }

    /// Returns the parent entity, if attached.
    pub fn parent(&self) -> Option<ValueTree> {
        self.inner
            .parent
            .read()
            .upgrade()
            .map(|inner| ValueTree { inner })
    }

    /// Returns true if `self` is `other` or lives somewhere below it.
    pub fn is_equal_or_descendant_of(&self, other: &ValueTree) -> bool {
        let mut current = Some(self.clone());
        while let Some(tree) = current {
            if &tree == other {
                return true;
            }
            current = tree.parent();
        }
        false
    }

    /// Depth-first search for the first entity (including `self`) matching
    /// `predicate`.
    pub fn find(&self, predicate: &dyn Fn(&ValueTree) -> bool) -> Option<ValueTree> {
        if predicate(self) {
            return Some(self.clone());
        }
        self.children().iter().find_map(|c| c.find(predicate))
    }

    /// Deep copy of properties and children. Listeners are not copied.
    pub fn create_copy(&self) -> ValueTree {
        let copy = ValueTree::new(self.type_name());
        *copy.inner.properties.write() = self.inner.properties.read().clone();
        for child in self.children() {
            let child_copy = child.create_copy();
            *child_copy.inner.parent.write() = Arc::downgrade(&copy.inner);
            copy.inner.children.write().push(child_copy);
        }
        copy
    }

    // --- Listeners ---

    /// Registers a change listener on this entity.
    ///
    /// The returned handle keeps the registration alive.
    pub fn add_listener(
        &self,
        scope: ListenerScope,
        filter: PropertyFilter,
        mode: DeliveryMode,
        callback: impl Fn(&TreeEvent) + Send + Sync + 'static,
    ) -> ListenerHandle {
        ListenerHandle::register(self, scope, filter, mode, Box::new(callback))
    }

    /// Number of listeners currently registered on this entity.
    pub fn num_listeners(&self) -> usize {
        self.inner.listeners.read().len()
    }

    fn dispatch(&self, event: TreeEvent) {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(tree) = current {
            current = tree.parent();
            chain.push(tree);
        }

        for (depth, tree) in chain.iter().enumerate() {
            let snapshot: Vec<Arc<Listener>> = tree
                .inner
                .listeners
                .read()
                .iter()
                .filter(|l| l.wants(&event, depth))
                .cloned()
                .collect();
            for listener in snapshot {
                listener.deliver(&event);
            }
        }
    }
}

impl PartialEq for ValueTree {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ValueTree {}

impl core::fmt::Debug for ValueTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let props = self.inner.properties.read();
        let mut s = f.debug_struct(&self.inner.type_name);
        for (k, v) in props.iter() {
            s.field(k, v);
        }
        s.field("children", &self.num_children()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn set_property_notifies_only_on_change() {
        let tree = ValueTree::new("Node");
        let hits = counter();
        let h = hits.clone();
        let _l = tree.add_listener(
            ListenerScope::Properties,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(tree.set_property("Gain", 0.5));
        assert!(!tree.set_property("Gain", 0.5));
        assert!(tree.set_property("Gain", 0.25));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(tree.property_f64("Gain", 0.0), 0.25);
    }

    #[test]
    fn property_filter_restricts_delivery() {
        let tree = ValueTree::new("Node");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _l = tree.add_listener(
            ListenerScope::Properties,
            PropertyFilter::only(&["NumChannels"]),
            DeliveryMode::Synchronous,
            move |e| {
                if let Some((_, p)) = e.property_change() {
                    s.lock().push(p.to_string());
                }
            },
        );
        tree.set_property("Bypassed", true);
        tree.set_property("NumChannels", 2);
        assert_eq!(*seen.lock(), vec!["NumChannels".to_string()]);
    }

    #[test]
    fn children_scope_sees_direct_children_only() {
        let root = ValueTree::new("Root");
        let mid = ValueTree::new("Mid");
        root.add_child(mid.clone(), None).unwrap();

        let hits = counter();
        let h = hits.clone();
        let _l = root.add_listener(
            ListenerScope::Children,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );

        mid.add_child(ValueTree::new("Leaf"), None).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        root.add_child(ValueTree::new("Other"), Some(0)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(root.child(0).unwrap().type_name(), "Other");
    }

    #[test]
    fn recursive_properties_bubble_up_after_local_listeners() {
        let root = ValueTree::new("Root");
        let child = ValueTree::new("Child");
        root.add_child(child.clone(), None).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let _outer = root.add_listener(
            ListenerScope::RecursiveProperties,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |_| o1.lock().push("root"),
        );
        let o2 = order.clone();
        let _inner = child.add_listener(
            ListenerScope::Properties,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |_| o2.lock().push("child"),
        );

        child.set_property("X", 1);
        assert_eq!(*order.lock(), vec!["child", "root"]);
    }

    #[test]
    fn dropping_handle_unregisters() {
        let tree = ValueTree::new("Node");
        let hits = counter();
        let h = hits.clone();
        let handle = tree.add_listener(
            ListenerScope::Subtree,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(tree.num_listeners(), 1);
        drop(handle);
        assert_eq!(tree.num_listeners(), 0);
        tree.set_property("A", 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mutation_inside_callback_is_safe() {
        let root = ValueTree::new("Root");
        let r = root.clone();
        let _l = root.add_listener(
            ListenerScope::Children,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |e| {
                if let Some((child, true)) = e.child_change() {
                    if child.has_type("Temp") {
                        r.remove_child(child);
                    }
                }
            },
        );
        root.add_child(ValueTree::new("Temp"), None).unwrap();
        root.add_child(ValueTree::new("Keep"), None).unwrap();
        assert_eq!(root.num_children(), 1);
        assert!(root.child_with_name("Keep").is_some());
    }

    #[test]
    fn asynchronous_listener_waits_for_delivery() {
        let tree = ValueTree::new("Node");
        let hits = counter();
        let h = hits.clone();
        let handle = tree.add_listener(
            ListenerScope::Properties,
            PropertyFilter::any(),
            DeliveryMode::Asynchronous,
            move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );
        tree.set_property("A", 1);
        tree.set_property("B", 2);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(handle.deliver_pending(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(handle.deliver_pending(), 0);
    }

    #[test]
    fn add_child_rejects_reparenting_and_cycles() {
        let a = ValueTree::new("A");
        let b = ValueTree::new("B");
        a.add_child(b.clone(), None).unwrap();

        let other = ValueTree::new("Other");
        assert!(matches!(
            other.add_child(b.clone(), None),
            Err(TreeError::AlreadyHasParent(_))
        ));
        assert!(matches!(
            b.add_child(a.clone(), None),
            Err(TreeError::WouldCreateCycle(_))
        ));
    }

    #[test]
    fn remove_child_clears_parent_and_reports_index() {
        let root = ValueTree::new("Root");
        let first = ValueTree::new("First");
        let second = ValueTree::new("Second");
        root.add_child(first.clone(), None).unwrap();
        root.add_child(second.clone(), None).unwrap();

        let removed_at = Arc::new(AtomicUsize::new(usize::MAX));
        let r = removed_at.clone();
        let _l = root.add_listener(
            ListenerScope::Children,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            move |e| {
                if let TreeEvent::ChildRemoved { index, .. } = e {
                    r.store(*index, Ordering::SeqCst);
                }
            },
        );

        assert!(root.remove_child(&second));
        assert_eq!(removed_at.load(Ordering::SeqCst), 1);
        assert!(second.parent().is_none());
        assert!(!root.remove_child(&second));
    }

    #[test]
    fn create_copy_is_deep_and_detached() {
        let root = ValueTree::new("Root").with_property("ID", "r");
        let child = ValueTree::new("Child").with_property("X", 3);
        root.add_child(child, None).unwrap();

        let copy = root.create_copy();
        assert_ne!(copy, root);
        assert_eq!(copy.property_string("ID"), "r");
        let copied_child = copy.child(0).unwrap();
        assert_eq!(copied_child.parent().unwrap(), copy);
        copied_child.set_property("X", 4);
        assert_eq!(root.child(0).unwrap().property_f64("X", 0.0), 3.0);
    }
}
