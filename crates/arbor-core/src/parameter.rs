//! Exposed node parameters.
//!
//! A [`Parameter`] is bound to one `Parameter` tree entity. Its effective
//! value is `(value + add) * mul`: `value` is the base value (stored in the
//! tree), `add` and `mul` are modulation terms written by connections with the
//! `Add` and `Multiply` operators. Every change invokes the parameter's
//! callback with the new effective value.
//!
//! The callback slot is an [`ArcSwapOption`], so the audio context reads the
//! active callback without locking while the control context replaces it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::ids::props;
use crate::range::ParameterRange;
use crate::tree::{DeliveryMode, ListenerHandle, ListenerScope, PropertyFilter, ValueTree};

/// Receives a parameter's effective value.
pub type ParameterCallback = Box<dyn Fn(f64) + Send + Sync>;

/// Lock-free `f64` cell.
#[derive(Debug)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// A named control on a node.
pub struct Parameter {
    id: String,
    tree: ValueTree,
    value: AtomicF64,
    add: AtomicF64,
    mul: AtomicF64,
    callback: ArcSwapOption<ParameterCallback>,
    pending: AtomicBool,
    value_listener: Mutex<Option<ListenerHandle>>,
}

impl Parameter {
    /// Binds a parameter to `tree`, reading its `ID` and `Value`.
    ///
    /// Later edits of the `Value` property drive the parameter.
    pub fn new(tree: ValueTree) -> Arc<Self> {
        let parameter = Arc::new(Self {
            id: tree.property_string(props::ID),
            value: AtomicF64::new(tree.property_f64(props::VALUE, 0.0)),
            tree,
            add: AtomicF64::new(0.0),
            mul: AtomicF64::new(1.0),
            callback: ArcSwapOption::empty(),
            pending: AtomicBool::new(false),
            value_listener: Mutex::new(None),
        });

        let weak: Weak<Parameter> = Arc::downgrade(&parameter);
        let handle = parameter.tree.add_listener(
            ListenerScope::Properties,
            PropertyFilter::only(&[props::VALUE]),
            DeliveryMode::Synchronous,
            move |event| {
                let (Some(p), Some((tree, _))) = (weak.upgrade(), event.property_change()) else {
                    return;
                };
                let v = tree.property_f64(props::VALUE, p.value());
                if v != p.value() {
                    p.apply_value(v);
                }
            },
        );
        *parameter.value_listener.lock() = Some(handle);
        parameter
    }

    /// Creates the tree entity for a new parameter.
    pub fn create_tree(id: &str, range: ParameterRange, default_value: f64) -> ValueTree {
        let tree = ValueTree::new(crate::ids::types::PARAMETER)
            .with_property(props::ID, id)
            .with_property(props::VALUE, default_value);
        range.store(&tree);
        tree
    }

    /// Parameter id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The backing tree entity.
    pub fn tree(&self) -> &ValueTree {
        &self.tree
    }

    /// Range stored in the tree.
    pub fn range(&self) -> ParameterRange {
        ParameterRange::from_tree(&self.tree)
    }

    /// Base value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value.load()
    }

    /// Effective value: `(value + add) * mul`.
    #[inline]
    pub fn modulated_value(&self) -> f64 {
        (self.value.load() + self.add.load()) * self.mul.load()
    }

    /// Sets the base value and writes it to the tree. Control context only.
    pub fn set_value(&self, value: f64) {
        self.pending.store(false, Ordering::Release);
        self.apply_value(value);
        self.tree.set_property(props::VALUE, value);
    }

    /// Sets the base value and defers the tree write until
    /// [`flush_pending`](Self::flush_pending). Safe from the audio context.
    pub fn set_value_and_store_async(&self, value: f64) {
        self.apply_value(value);
        self.pending.store(true, Ordering::Release);
    }

    /// Sets the base value and invokes the callback without touching the
    /// tree. Used for values that are not persisted, like modulation output.
    pub fn set_value_without_store(&self, value: f64) {
        self.apply_value(value);
    }

    /// Sets the additive modulation term.
    pub fn add_modulation_value(&self, value: f64) {
        self.add.store(value);
        self.invoke();
    }

    /// Sets the multiplicative modulation term.
    pub fn multiply_modulation_value(&self, value: f64) {
        self.mul.store(value);
        self.invoke();
    }

    /// Replaces the callback. The new callback is not invoked.
    pub fn set_callback(&self, callback: impl Fn(f64) + Send + Sync + 'static) {
        let callback: ParameterCallback = Box::new(callback);
        self.callback.store(Some(Arc::new(callback)));
    }

    /// Removes the callback; value changes become inert.
    pub fn clear_callback(&self) {
        self.callback.store(None);
    }

    /// True if a callback is installed.
    pub fn has_callback(&self) -> bool {
        self.callback.load().is_some()
    }

    /// Invokes the callback with the current effective value.
    pub fn refresh(&self) {
        self.invoke();
    }

    /// Writes a deferred value to the tree. Returns true if one was pending.
    pub fn flush_pending(&self) -> bool {
        if !self.pending.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.tree.set_property(props::VALUE, self.value());
        true
    }

    fn apply_value(&self, value: f64) {
        self.value.store(value);
        self.invoke();
    }

    #[inline]
    fn invoke(&self) {
        if let Some(callback) = &*self.callback.load() {
            let callback: &ParameterCallback = callback;
            callback(self.modulated_value());
        }
    }
}

impl core::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Parameter")
            .field("id", &self.id)
            .field("value", &self.value())
            .field("modulated", &self.modulated_value())
            .finish()
    }
}
