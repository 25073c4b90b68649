#![forbid(unsafe_code)]

//! Controls that fire actions.

use std::rc::Rc;

use duplex_core::{ActionStates, Control, EventStream};

use crate::handle::BindableHandle;

/// Anything that can present itself as an [`ActionBindable`].
pub trait ActionBindableProvider {
    type Value: 'static;

    fn action_bindable(&self) -> ActionBindable<Self::Value>;
}

/// Enable/disable plus an interaction-event stream, for command wiring.
pub struct ActionBindable<V> {
    handle: BindableHandle<V>,
}

impl<V> Clone for ActionBindable<V> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
        }
    }
}

impl<V> std::fmt::Debug for ActionBindable<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ActionBindable").field(&self.handle).finish()
    }
}

impl<V: 'static> ActionBindable<V> {
    pub fn new<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
    ) -> Self {
        Self::from_handle(BindableHandle::new(control, set_enabled, values))
    }

    /// Like [`new`](Self::new), with a hook run whenever a command is bound.
    pub fn with_did_bind<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
        did_bind: impl Fn(&C, &dyn ActionStates) + 'static,
    ) -> Self {
        Self::from_handle(BindableHandle::with_did_bind(
            control,
            set_enabled,
            values,
            did_bind,
        ))
    }

    #[must_use]
    pub fn detached() -> Self {
        Self::from_handle(BindableHandle::detached())
    }

    pub(crate) fn from_handle(handle: BindableHandle<V>) -> Self {
        Self { handle }
    }

    #[must_use]
    pub fn handle(&self) -> &BindableHandle<V> {
        &self.handle
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.handle.is_attached()
    }

    #[must_use]
    pub fn values(&self) -> EventStream<V> {
        self.handle.values()
    }
}

impl<V: 'static> ActionBindableProvider for ActionBindable<V> {
    type Value = V;

    fn action_bindable(&self) -> ActionBindable<V> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_core::{Lifetime, LifetimeToken, Property, pipe};
    use std::cell::{Cell, RefCell};

    struct Button {
        token: LifetimeToken,
        enabled: Cell<bool>,
        clicks: EventStream<()>,
        hooked: RefCell<Vec<bool>>,
    }

    impl Control for Button {
        fn lifetime(&self) -> Lifetime {
            self.token.lifetime()
        }
    }

    struct States;

    impl ActionStates for States {
        fn is_enabled(&self) -> Property<bool> {
            Property::constant(false)
        }

        fn is_executing(&self) -> Property<bool> {
            Property::constant(true)
        }
    }

    fn button() -> Rc<Button> {
        let (_, token) = Lifetime::make();
        let (clicks, _sink) = pipe();
        Rc::new(Button {
            token,
            enabled: Cell::new(true),
            clicks,
            hooked: RefCell::new(Vec::new()),
        })
    }

    #[test]
    fn provider_is_identity() {
        let control = button();
        let bindable = ActionBindable::new(&control, |b, on| b.enabled.set(on), |b| b.clicks.clone());
        let provided = bindable.action_bindable();
        provided.handle().set_enabled(false);
        assert!(!control.enabled.get());
    }

    #[test]
    fn did_bind_hook_sees_states() {
        let control = button();
        let bindable = ActionBindable::with_did_bind(
            &control,
            |b, on| b.enabled.set(on),
            |b| b.clicks.clone(),
            |b, states| b.hooked.borrow_mut().push(states.is_executing().get()),
        );
        bindable.handle().did_bind(&States);
        assert_eq!(*control.hooked.borrow(), vec![true]);
    }

    #[test]
    fn detached_provider_stays_detached() {
        let bindable = ActionBindable::<u8>::detached().action_bindable();
        assert!(!bindable.is_attached());
        assert!(!bindable.handle().has_did_bind());
    }
}
