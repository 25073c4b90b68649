#![forbid(unsafe_code)]

//! Grouping bindings that should end together.

use duplex_core::{Lifetime, Subscription};

use crate::dispatch::Binding;

/// Collects bindings and subscriptions for a logical scope (a screen, a form).
///
/// Everything collected ends when the scope is dropped or
/// [`clear`](Self::clear)ed, even while the controls are still alive.
/// Bindings are disposed newest first.
///
/// ```ignore
/// let mut scope = BindingScope::new();
/// scope.bind(bind_value(&name, &name_field.value_bindable()));
/// scope.bind(bind_trigger(&save, &save_button.action_bindable()));
/// drop(scope); // both wirings are gone
/// ```
#[derive(Default)]
pub struct BindingScope {
    bindings: Vec<Binding>,
    subscriptions: Vec<Subscription>,
}

impl BindingScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `binding` until this scope ends. Inert bindings are not kept.
    pub fn bind(&mut self, binding: Binding) -> &mut Self {
        if !binding.is_inert() {
            self.bindings.push(binding);
        }
        self
    }

    /// Hold an arbitrary subscription until this scope ends.
    pub fn hold(&mut self, subscription: Subscription) -> &mut Self {
        self.subscriptions.push(subscription);
        self
    }

    /// End this scope when `lifetime` ends.
    ///
    /// The scope stays usable, but bindings added afterwards are only released
    /// by `clear` or drop.
    pub fn end_with(&mut self, lifetime: &Lifetime) -> &mut Self {
        for binding in &self.bindings {
            if let Some(disposable) = binding.disposable() {
                lifetime.attach(disposable);
            }
        }
        self
    }

    /// Bindings still wired.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.iter().filter(|b| !b.is_disposed()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.binding_count() == 0 && self.subscriptions.is_empty()
    }

    /// Dispose every binding and release every subscription. The scope can be
    /// reused afterwards.
    pub fn clear(&mut self) {
        let bindings = std::mem::take(&mut self.bindings);
        tracing::trace!(bindings = bindings.len(), "binding scope cleared");
        for binding in bindings.iter().rev() {
            binding.dispose();
        }
        self.subscriptions.clear();
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.binding_count())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::bind_value;
    use crate::value::ValueBindable;
    use duplex_core::{Control, LifetimeToken, Observable};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counter {
        token: LifetimeToken,
        shown: Cell<i32>,
        edits: Observable<i32>,
    }

    impl Control for Counter {
        fn lifetime(&self) -> Lifetime {
            self.token.lifetime()
        }
    }

    fn counter() -> (Rc<Counter>, ValueBindable<i32>) {
        let (_, token) = Lifetime::make();
        let control = Rc::new(Counter {
            token,
            shown: Cell::new(0),
            edits: Observable::new(0),
        });
        let bindable = ValueBindable::new(
            &control,
            |_, _| {},
            |c, v| c.shown.set(v),
            |c| c.edits.changes(),
        );
        (control, bindable)
    }

    #[test]
    fn dropping_scope_unbinds() {
        let cell = Observable::new(5);
        let (control, bindable) = counter();
        {
            let mut scope = BindingScope::new();
            scope.bind(bind_value(&cell, &bindable));
            assert_eq!(scope.binding_count(), 1);
            assert_eq!(control.shown.get(), 5);
        }
        cell.set(6);
        assert_eq!(control.shown.get(), 5);
    }

    #[test]
    fn clear_is_reusable() {
        let cell = Observable::new(1);
        let (control, bindable) = counter();
        let mut scope = BindingScope::new();
        scope.bind(bind_value(&cell, &bindable));
        scope.clear();
        assert!(scope.is_empty());

        scope.bind(bind_value(&cell, &bindable));
        cell.set(2);
        assert_eq!(control.shown.get(), 2);
    }

    #[test]
    fn inert_bindings_are_not_counted() {
        let cell = Observable::new(1);
        let mut scope = BindingScope::new();
        scope.bind(bind_value(&cell, &ValueBindable::detached()));
        assert!(scope.is_empty());
    }

    #[test]
    fn end_with_follows_lifetime() {
        let cell = Observable::new(1);
        let (_control, bindable) = counter();
        let (screen, token) = Lifetime::make();
        let mut scope = BindingScope::new();
        scope.bind(bind_value(&cell, &bindable)).end_with(&screen);
        drop(token);
        assert_eq!(scope.binding_count(), 0);
    }
}
