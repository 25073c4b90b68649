#![forbid(unsafe_code)]

//! Weakly-owned control references with their capability closures.
//!
//! A [`BindableHandle<V>`] is the shared core of both bindable flavours. It
//! holds a `Weak` reference to the control and closures that were written
//! against the control's concrete type. Each closure captures its own `Weak<C>`
//! and upgrades it on every call, so:
//!
//! - a closure can only ever run against the control it was built for, and
//! - once the control is dropped every capability silently does nothing.
//!
//! The handle never holds a strong reference, so it does not extend the
//! control's lifetime.

use std::rc::{Rc, Weak};

use duplex_core::{ActionStates, Control, EventStream, Lifetime};

type SetEnabled = Rc<dyn Fn(bool)>;
type Values<V> = Rc<dyn Fn() -> EventStream<V>>;
type DidBind = Rc<dyn Fn(&dyn ActionStates)>;

/// Weak control reference plus enable, stream, and post-bind capabilities.
pub struct BindableHandle<V> {
    control: Option<Weak<dyn Control>>,
    set_enabled: SetEnabled,
    values: Values<V>,
    did_bind: Option<DidBind>,
}

impl<V> Clone for BindableHandle<V> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            set_enabled: Rc::clone(&self.set_enabled),
            values: Rc::clone(&self.values),
            did_bind: self.did_bind.clone(),
        }
    }
}

impl<V> std::fmt::Debug for BindableHandle<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindableHandle")
            .field("attached", &self.is_attached())
            .field("did_bind", &self.did_bind.is_some())
            .finish()
    }
}

impl<V> BindableHandle<V> {
    /// Whether the control is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.control
            .as_ref()
            .is_some_and(|control| control.strong_count() > 0)
    }

    /// The control's lifetime, or an ended lifetime if the control is gone.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.control
            .as_ref()
            .and_then(Weak::upgrade)
            .map_or_else(Lifetime::ended, |control| control.lifetime())
    }

    /// Enable or disable the control, directly and on the calling thread.
    ///
    /// Binding code routes later changes through the UI scheduler; see
    /// [`bind_action`](crate::bind_action).
    pub fn set_enabled(&self, enabled: bool) {
        (self.set_enabled)(enabled);
    }

    /// The control's interaction events. Empty once the control is gone.
    #[must_use]
    pub fn values(&self) -> EventStream<V> {
        (self.values)()
    }

    #[must_use]
    pub fn has_did_bind(&self) -> bool {
        self.did_bind.is_some()
    }

    /// Run the post-bind hook, if any.
    pub fn did_bind(&self, states: &dyn ActionStates) {
        if let Some(hook) = &self.did_bind {
            hook(states);
        }
    }

    pub(crate) fn enabled_setter(&self) -> SetEnabled {
        Rc::clone(&self.set_enabled)
    }
}

impl<V: 'static> BindableHandle<V> {
    /// Capture `control` weakly together with its enable and stream capabilities.
    pub fn new<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
    ) -> Self {
        Self::capture(control, set_enabled, values, None)
    }

    /// Like [`new`](Self::new), with a hook that runs when a command is bound.
    pub fn with_did_bind<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
        did_bind: impl Fn(&C, &dyn ActionStates) + 'static,
    ) -> Self {
        let weak = Rc::downgrade(control);
        let hook: DidBind = Rc::new(move |states: &dyn ActionStates| {
            if let Some(control) = weak.upgrade() {
                did_bind(control.as_ref(), states);
            }
        });
        Self::capture(control, set_enabled, values, Some(hook))
    }

    /// A handle with no control. Every capability is a no-op.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            control: None,
            set_enabled: Rc::new(|_| {}),
            values: Rc::new(EventStream::empty),
            did_bind: None,
        }
    }

    fn capture<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
        did_bind: Option<DidBind>,
    ) -> Self {
        let enable_ref = Rc::downgrade(control);
        let values_ref = Rc::downgrade(control);
        let typed: Weak<C> = Rc::downgrade(control);
        let erased: Weak<dyn Control> = typed;
        Self {
            control: Some(erased),
            set_enabled: Rc::new(move |enabled| {
                if let Some(control) = enable_ref.upgrade() {
                    set_enabled(control.as_ref(), enabled);
                }
            }),
            values: Rc::new(move || match values_ref.upgrade() {
                Some(control) => values(control.as_ref()),
                None => EventStream::empty(),
            }),
            did_bind,
        }
    }

    /// Same control, enablement, and hook; stream rewritten by `transform`.
    ///
    /// Only the stream closure is captured, never the handle itself.
    pub(crate) fn lift<U: 'static>(
        &self,
        transform: impl Fn(EventStream<V>) -> EventStream<U> + 'static,
    ) -> BindableHandle<U> {
        let values = Rc::clone(&self.values);
        BindableHandle {
            control: self.control.clone(),
            set_enabled: Rc::clone(&self.set_enabled),
            values: Rc::new(move || transform(values())),
            did_bind: self.did_bind.clone(),
        }
    }
}
