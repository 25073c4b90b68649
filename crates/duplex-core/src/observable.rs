#![forbid(unsafe_code)]

//! Observable cells with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value of type `T` in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). When the value changes (determined by
//! `PartialEq`), all live subscribers are notified in registration order.
//! [`Property<T>`] is the read-only face of the same storage, handed out where
//! callers may watch a value but must not write it (command enablement, for
//! instance).
//!
//! Both expose their changes as an [`EventStream`], so binding code can treat
//! a cell like any other lazy, multi-subscriber source.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: If `Subscription` guards are stored indefinitely
//!   without being dropped, callbacks accumulate. Dead weak references are
//!   cleaned lazily during `notify()`.
//! - **Re-entrant set**: Setting the cell from inside one of its own
//!   subscribers is allowed; the nested notification runs before the outer
//!   one finishes. Bindings that write back into their source guard against
//!   this themselves.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::stream::{Event, EventStream, Observer};

/// A subscriber callback stored as a strong `Rc` internally, handed out
/// as `Weak` to the observable.
type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    /// Subscribers stored as weak references. Dead entries are pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked mutable cell with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing mutation.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. Dead subscribers (dropped [`Subscription`] guards) are pruned lazily.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a new cell with the given initial value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Set a new value, notifying subscribers if it differs from the current one.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Modify the value in place. Subscribers are notified only when the
    /// result differs from the previous value.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value != old {
                inner.version += 1;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Subscribe to value changes.
    ///
    /// The callback does not see the current value, only later changes.
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        Subscription::new(strong)
    }

    /// A stream of future changes. Each observer gets its own subscription.
    #[must_use]
    pub fn changes(&self) -> EventStream<T> {
        let source = self.clone();
        EventStream::new(move |observer: Observer<T>| {
            source.subscribe(move |value| observer(Event::Value(value.clone())))
        })
    }

    /// A stream that starts with the current value, followed by every change.
    #[must_use]
    pub fn values(&self) -> EventStream<T> {
        let source = self.clone();
        EventStream::new(move |observer: Observer<T>| {
            observer(Event::Value(source.get()));
            source.subscribe(move |value| observer(Event::Value(value.clone())))
        })
    }

    /// Read-only view over the same storage.
    #[must_use]
    pub fn read_only(&self) -> Property<T> {
        Property {
            source: self.clone(),
        }
    }

    /// Current version number.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        // Collect live callbacks first so no borrow is held while they run.
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .collect()
        };

        let value = self.inner.borrow().value.clone();
        for cb in &callbacks {
            cb(&value);
        }
    }
}

/// Read-only view of an [`Observable`].
pub struct Property<T> {
    source: Observable<T>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Property").field(&self.source).finish()
    }
}

impl<T: Clone + PartialEq + 'static> Property<T> {
    /// A property that never changes.
    #[must_use]
    pub fn constant(value: T) -> Self {
        Observable::new(value).read_only()
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.source.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.source.with(f)
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.source.subscribe(callback)
    }

    #[must_use]
    pub fn changes(&self) -> EventStream<T> {
        self.source.changes()
    }

    #[must_use]
    pub fn values(&self) -> EventStream<T> {
        self.source.values()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.source.version()
    }
}

impl<T: Clone + PartialEq + 'static> From<Observable<T>> for Property<T> {
    fn from(source: Observable<T>) -> Self {
        Self { source }
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the `Subscription` releases the strong reference to the callback,
/// so the weak entry held by the source fails to upgrade on the next
/// notification cycle.
pub struct Subscription {
    /// Type-erased strong reference keeping the callback alive.
    _guard: Box<dyn Any>,
}

impl Subscription {
    /// Wrap anything whose drop ends the subscription.
    pub fn new(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }

    /// A subscription with nothing to release.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_set_basic() {
        let obs = Observable::new(42);
        assert_eq!(obs.get(), 42);
        assert_eq!(obs.version(), 0);

        obs.set(99);
        assert_eq!(obs.get(), 99);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn no_change_no_version_bump() {
        let obs = Observable::new(42);
        obs.set(42);
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn update_no_change_no_bump() {
        let obs = Observable::new(10);
        obs.update(|v| *v = 10);
        assert_eq!(obs.version(), 0);
        obs.update(|v| *v += 1);
        assert_eq!(obs.get(), 11);
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let obs = Observable::new(0);
        let count = Rc::new(Cell::new(0u32));
        let c = Rc::clone(&count);

        let sub = obs.subscribe(move |_| c.set(c.get() + 1));
        obs.set(1);
        assert_eq!(count.get(), 1);

        drop(sub);
        obs.set(2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_| l1.borrow_mut().push('A'));
        let l2 = Rc::clone(&log);
        let _s2 = obs.subscribe(move |_| l2.borrow_mut().push('B'));

        obs.set(1);
        assert_eq!(*log.borrow(), vec!['A', 'B']);
    }

    #[test]
    fn dead_subscribers_pruned_on_notify() {
        let obs = Observable::new(0);
        let _s1 = obs.subscribe(|_| {});
        let s2 = obs.subscribe(|_| {});
        drop(s2);
        assert_eq!(obs.subscriber_count(), 1);
        assert_eq!(obs.inner.borrow().subscribers.len(), 2);
        obs.set(1);
        assert_eq!(obs.inner.borrow().subscribers.len(), 1);
    }

    #[test]
    fn changes_stream_skips_current_value() {
        let obs = Observable::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = obs.changes().observe_values(move |v| s.borrow_mut().push(v));

        obs.set(2);
        obs.set(3);
        assert_eq!(*seen.borrow(), vec![2, 3]);
    }

    #[test]
    fn values_stream_starts_with_current_value() {
        let obs = Observable::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = obs.values().observe_values(move |v| s.borrow_mut().push(v));

        obs.set(5);
        assert_eq!(*seen.borrow(), vec![1, 5]);
    }

    #[test]
    fn property_tracks_source() {
        let obs = Observable::new(false);
        let prop = obs.read_only();
        assert!(!prop.get());
        obs.set(true);
        assert!(prop.get());
        assert_eq!(prop.version(), 1);
    }

    #[test]
    fn constant_property_never_notifies() {
        let prop = Property::constant(7);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = prop.subscribe(move |_| h.set(h.get() + 1));
        assert_eq!(prop.get(), 7);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn reentrant_set_from_subscriber() {
        let obs = Observable::new(0);
        let inner = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v == 1 {
                inner.set(2);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn debug_format() {
        let obs = Observable::new(42);
        let dbg = format!("{obs:?}");
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
    }
}
