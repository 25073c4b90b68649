#![forbid(unsafe_code)]

//! Controls that display and edit a value.
//!
//! A [`ValueBindable<V>`] adds a write capability to the shared
//! [`BindableHandle`]. Writes never reach the control directly: they go
//! through a [`BindingTarget`] that hops onto the UI scheduler and stops the
//! moment the control's lifetime ends.

use std::rc::{Rc, Weak};

use duplex_core::{ActionStates, Control, EventStream, UiScheduler};

use crate::action::{ActionBindable, ActionBindableProvider};
use crate::handle::BindableHandle;
use crate::target::BindingTarget;

type SetValue<V> = Rc<dyn Fn(V)>;

/// Capability wrapper for two-way value sync.
pub struct ValueBindable<V> {
    handle: BindableHandle<V>,
    set_value: SetValue<V>,
}

impl<V> Clone for ValueBindable<V> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            set_value: Rc::clone(&self.set_value),
        }
    }
}

impl<V> std::fmt::Debug for ValueBindable<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueBindable").field(&self.handle).finish()
    }
}

impl<V: 'static> ValueBindable<V> {
    /// Capture `control` weakly together with all of its capabilities.
    pub fn new<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        set_value: impl Fn(&C, V) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
    ) -> Self {
        Self {
            handle: BindableHandle::new(control, set_enabled, values),
            set_value: capture_setter(control, set_value),
        }
    }

    /// Like [`new`](Self::new), with a hook run whenever a command is bound.
    pub fn with_did_bind<C: Control>(
        control: &Rc<C>,
        set_enabled: impl Fn(&C, bool) + 'static,
        set_value: impl Fn(&C, V) + 'static,
        values: impl Fn(&C) -> EventStream<V> + 'static,
        did_bind: impl Fn(&C, &dyn ActionStates) + 'static,
    ) -> Self {
        Self {
            handle: BindableHandle::with_did_bind(control, set_enabled, values, did_bind),
            set_value: capture_setter(control, set_value),
        }
    }

    #[must_use]
    pub fn detached() -> Self {
        Self {
            handle: BindableHandle::detached(),
            set_value: Rc::new(|_| {}),
        }
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

    /// A write sink scoped to the control's lifetime, writing on the current
    /// thread's [`UiScheduler`].
    #[must_use]
    pub fn binding_target(&self) -> BindingTarget<V> {
        self.binding_target_on(UiScheduler::current())
    }

    /// Like [`binding_target`](Self::binding_target), on an explicit scheduler.
    #[must_use]
    pub fn binding_target_on(&self, scheduler: UiScheduler) -> BindingTarget<V> {
        let set_value = Rc::clone(&self.set_value);
        BindingTarget::new(self.handle.lifetime(), scheduler, move |value| set_value(value))
    }

    /// The same control without the write capability.
    #[must_use]
    pub fn action_bindable(&self) -> ActionBindable<V> {
        ActionBindable::from_handle(self.handle.clone())
    }
}

impl<V: 'static> ActionBindableProvider for ValueBindable<V> {
    type Value = V;

    fn action_bindable(&self) -> ActionBindable<V> {
        ValueBindable::action_bindable(self)
    }
}

fn capture_setter<C: Control, V: 'static>(
    control: &Rc<C>,
    set_value: impl Fn(&C, V) + 'static,
) -> SetValue<V> {
    let weak: Weak<C> = Rc::downgrade(control);
    Rc::new(move |value| {
        if let Some(control) = weak.upgrade() {
            set_value(control.as_ref(), value);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_core::{Lifetime, LifetimeToken, Observable, SchedulerConfig};
    use std::cell::RefCell;

    struct Field {
        token: LifetimeToken,
        text: RefCell<String>,
        edits: Observable<String>,
    }

    impl Control for Field {
        fn lifetime(&self) -> Lifetime {
            self.token.lifetime()
        }
    }

    fn field() -> Rc<Field> {
        let (_, token) = Lifetime::make();
        Rc::new(Field {
            token,
            text: RefCell::new(String::new()),
            edits: Observable::new(String::new()),
        })
    }

    fn bindable(control: &Rc<Field>) -> ValueBindable<String> {
        ValueBindable::new(
            control,
            |_, _| {},
            |f, text| *f.text.borrow_mut() = text,
            |f| f.edits.changes(),
        )
    }

    #[test]
    fn target_writes_reach_control() {
        let control = field();
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let target = bindable(&control).binding_target_on(scheduler);
        target.send("hello".to_string());
        assert_eq!(*control.text.borrow(), "hello");
    }

    #[test]
    fn target_outlives_control_silently() {
        let control = field();
        let target = bindable(&control).binding_target();
        drop(control);
        assert!(!target.is_active());
        target.send("ignored".to_string());
    }

    #[test]
    fn target_of_dead_control_starts_inactive() {
        let control = field();
        let bindable = bindable(&control);
        drop(control);
        assert!(!bindable.binding_target().is_active());
    }

    #[test]
    fn action_bindable_shares_the_stream() {
        let control = field();
        let action = bindable(&control).action_bindable();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = action.values().observe_values(move |v| s.borrow_mut().push(v));
        control.edits.set("typed".to_string());
        assert_eq!(*seen.borrow(), vec!["typed".to_string()]);
    }

    #[test]
    fn detached_degrades_to_detached() {
        let value = ValueBindable::<String>::detached();
        assert!(!value.action_bindable().is_attached());
        assert!(!value.binding_target().is_active());
    }
}
