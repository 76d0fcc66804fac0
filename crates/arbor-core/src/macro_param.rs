//! Macro parameters: one exposed control fanned out to many connections.
//!
//! The fan-out callback is a pure function of the connection list and the
//! ranges involved. It is rebuilt from scratch whenever a connection is added,
//! removed, or edited, and never patched in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::connection::Connection;
use crate::ids::{props, types};
use crate::network::NetworkHandle;
use crate::parameter::{Parameter, ParameterCallback};
use crate::range::ParameterRange;
use crate::tree::{DeliveryMode, ListenerHandle, ListenerScope, PropertyFilter, TreeEvent, ValueTree};

const RANGE_IDS: [&str; 4] = [
    props::MIN_VALUE,
    props::MAX_VALUE,
    props::STEP_SIZE,
    props::SKEW_FACTOR,
];

const CONNECTION_IDS: [&str; 9] = [
    props::MIN_VALUE,
    props::MAX_VALUE,
    props::STEP_SIZE,
    props::SKEW_FACTOR,
    props::INVERTED,
    props::NODE_ID,
    props::PARAMETER_ID,
    props::CONVERTER,
    props::OP_TYPE,
];

/// Sets a flag for the lifetime of the guard.
pub(crate) struct ScopedFlag<'a>(&'a AtomicBool);

impl<'a> ScopedFlag<'a> {
    /// Sets `flag`, or returns `None` if it is already set.
    pub(crate) fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(Self(flag))
    }
}

impl Drop for ScopedFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A [`Parameter`] whose callback drives the connections in a tree.
pub struct MacroParameter {
    parameter: Arc<Parameter>,
    connection_tree: ValueTree,
    network: NetworkHandle,
    connections: Mutex<Vec<Connection>>,
    swapping: AtomicBool,
    listeners: Mutex<Vec<ListenerHandle>>,
}

impl MacroParameter {
    /// Binds to the `Connections` child of the parameter's tree.
    pub fn new(parameter: Arc<Parameter>, network: NetworkHandle) -> Arc<Self> {
        let connection_tree = parameter
            .tree()
            .get_or_create_child_with_name(types::CONNECTIONS);
        Self::with_connection_tree(parameter, connection_tree, network)
    }

    /// Binds to an arbitrary tree whose children are `Connection` entities.
    pub fn with_connection_tree(
        parameter: Arc<Parameter>,
        connection_tree: ValueTree,
        network: NetworkHandle,
    ) -> Arc<Self> {
        let m = Arc::new(Self {
            parameter,
            connection_tree,
            network,
            connections: Mutex::new(Vec::new()),
            swapping: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&m);
        let on_children = m.connection_tree.add_listener(
            ListenerScope::Children,
            PropertyFilter::any(),
            DeliveryMode::Synchronous,
            with_macro(&weak, |m, _| m.rebuild()),
        );
        let on_connection_edit = m.connection_tree.add_listener(
            ListenerScope::RecursiveProperties,
            PropertyFilter::only(&CONNECTION_IDS),
            DeliveryMode::Synchronous,
            with_macro(&weak, MacroParameter::connection_edited),
        );
        let on_range_edit = m.parameter.tree().add_listener(
            ListenerScope::Properties,
            PropertyFilter::only(&RANGE_IDS),
            DeliveryMode::Synchronous,
            with_macro(&weak, |m, _| m.rebuild()),
        );
        m.listeners
            .lock()
            .extend([on_children, on_connection_edit, on_range_edit]);

        m.rebuild();
        m
    }

    /// The exposed parameter.
    pub fn parameter(&self) -> &Arc<Parameter> {
        &self.parameter
    }

    /// Parameter id.
    pub fn id(&self) -> &str {
        self.parameter.id()
    }

    /// The parameter's tree entity.
    pub fn tree(&self) -> &ValueTree {
        self.parameter.tree()
    }

    /// The tree holding the `Connection` entities.
    pub fn connection_tree(&self) -> &ValueTree {
        &self.connection_tree
    }

    /// Snapshot of the connections resolved by the last rebuild.
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.lock().clone()
    }

    /// Appends a connection entity and returns it.
    pub fn add_connection(&self, node_id: &str, parameter_id: &str, range: ParameterRange) -> ValueTree {
        let tree = Connection::create_tree(node_id, parameter_id, range);
        // A fresh entity always attaches.
        let _ = self.connection_tree.add_child(tree.clone(), None);
        tree
    }

    /// Re-resolves every connection and installs a new fan-out callback.
    pub fn rebuild(&self) {
        let input_range = self.parameter.range();
        let connections: Vec<Connection> = self
            .connection_tree
            .children()
            .iter()
            .filter_map(|c| Connection::from_tree(c, &self.network, input_range))
            .collect();

        #[cfg(feature = "tracing")]
        tracing::trace!(
            parameter = self.parameter.id(),
            connections = connections.len(),
            "macro callback rebuilt"
        );

        if connections.is_empty() {
            self.parameter.clear_callback();
        } else {
            let callbacks: Vec<ParameterCallback> =
                connections.iter().map(Connection::create_callback).collect();
            if input_range.is_identity() {
                self.parameter.set_callback(move |value| {
                    for callback in &callbacks {
                        callback(value);
                    }
                });
            } else {
                self.parameter.set_callback(move |value| {
                    let normalised = input_range.to_normalised(value);
                    for callback in &callbacks {
                        callback(normalised);
                    }
                });
            }
        }
        *self.connections.lock() = connections;
    }

    fn connection_edited(&self, event: &TreeEvent) {
        if self.swapping.load(Ordering::Acquire) {
            return;
        }
        if let Some((tree, property)) = event.property_change()
            && RANGE_IDS.contains(&property)
        {
            self.check_inversion(tree);
        }
        self.rebuild();
    }

    // A connection range with min > max is stored swapped with `Inverted`
    // toggled instead.
    fn check_inversion(&self, tree: &ValueTree) {
        let range = ParameterRange::from_tree(tree);
        if !range.is_inverted() {
            return;
        }
        let Some(_guard) = ScopedFlag::try_set(&self.swapping) else {
            return;
        };
        tree.set_property(props::MIN_VALUE, range.max);
        tree.set_property(props::MAX_VALUE, range.min);
        tree.set_property(props::INVERTED, !tree.property_bool(props::INVERTED));
    }
}

impl core::fmt::Debug for MacroParameter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MacroParameter")
            .field("id", &self.id())
            .field("connections", &self.connections.lock().len())
            .finish()
    }
}

fn with_macro(
    weak: &Weak<MacroParameter>,
    f: impl Fn(&MacroParameter, &TreeEvent) + Send + Sync + 'static,
) -> impl Fn(&TreeEvent) + Send + Sync + 'static {
    let weak = weak.clone();
    move |event| {
        if let Some(m) = weak.upgrade() {
            f(&m, event);
        }
    }
}
