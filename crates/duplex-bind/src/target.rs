#![forbid(unsafe_code)]

//! Write sinks scoped to a control's lifetime.
//!
//! A [`BindingTarget<V>`] is the write path of a
//! [`ValueBindable`](crate::ValueBindable). Writes are handed to the
//! [`UiScheduler`]; only the value established at bind time is applied
//! directly ([`BindingTarget::send_now`]). Either way a write is dropped without
//! complaint once the control's lifetime has ended or the target has been
//! cancelled.
//!
//! Producer threads cannot touch `Rc`-based targets, so they get a
//! [`RemoteBindingTarget<V>`] instead: a `Send` handle carrying only a
//! generation-checked key into a registry owned by the UI thread. The value
//! travels through the scheduler's remote queue and is applied on the UI
//! thread during [`UiScheduler::run_pending`]. When the target goes away its
//! registry slot is released, so stale keys resolve to nothing.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use duplex_core::{Disposable, Lifetime, RemoteScheduler, UiScheduler};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Registry key of a target reachable from other threads.
    pub struct RemoteTargetKey;
}

thread_local! {
    static REMOTE_TARGETS: RefCell<SlotMap<RemoteTargetKey, Box<dyn Any>>> =
        RefCell::new(SlotMap::with_key());
}

/// Scheduled, lifetime-scoped write sink.
pub struct BindingTarget<V> {
    lifetime: Lifetime,
    scheduler: UiScheduler,
    action: Rc<dyn Fn(V)>,
    revoked: Disposable,
}

impl<V> Clone for BindingTarget<V> {
    fn clone(&self) -> Self {
        Self {
            lifetime: self.lifetime.clone(),
            scheduler: self.scheduler.clone(),
            action: Rc::clone(&self.action),
            revoked: self.revoked.clone(),
        }
    }
}

impl<V> std::fmt::Debug for BindingTarget<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingTarget")
            .field("lifetime_ended", &self.lifetime.has_ended())
            .field("cancelled", &self.revoked.is_disposed())
            .finish()
    }
}

impl<V: 'static> BindingTarget<V> {
    /// A target running `action` on `scheduler` until `lifetime` ends.
    pub fn new(lifetime: Lifetime, scheduler: UiScheduler, action: impl Fn(V) + 'static) -> Self {
        let revoked = Disposable::new();
        lifetime.attach(&revoked);
        Self {
            lifetime,
            scheduler,
            action: Rc::new(action),
            revoked,
        }
    }

    /// Queue a write. Silently ignored once the target is inactive.
    pub fn send(&self, value: V) {
        if !self.is_active() {
            tracing::trace!("write to inactive binding target dropped");
            return;
        }
        let target = self.clone();
        self.scheduler.schedule(move || target.deliver(value));
    }

    /// Write on the calling thread without queueing behind running jobs.
    ///
    /// Only for the value a binding establishes at bind time, which must land
    /// before any control event can be observed. Must run on the UI thread.
    pub fn send_now(&self, value: V) {
        self.deliver(value);
    }

    /// Whether writes still reach the control.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.lifetime.has_ended() && !self.revoked.is_disposed()
    }

    /// Stop this target (and all its clones) independently of the control.
    pub fn cancel(&self) {
        self.revoked.dispose();
    }

    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    fn deliver(&self, value: V) {
        if self.is_active() {
            (self.action)(value);
        }
    }
}

impl<V: Send + 'static> BindingTarget<V> {
    /// A handle that other threads can write through.
    ///
    /// Returns a handle whose writes are dropped when the target is already
    /// inactive.
    #[must_use]
    pub fn remote(&self) -> RemoteBindingTarget<V> {
        let key = REMOTE_TARGETS.with(|targets| {
            targets
                .borrow_mut()
                .insert(Box::new(self.clone()) as Box<dyn Any>)
        });
        self.revoked.on_dispose(move || {
            let _ = REMOTE_TARGETS.try_with(|targets| {
                let released = targets.borrow_mut().remove(key);
                drop(released);
            });
        });
        RemoteBindingTarget {
            key,
            scheduler: self.scheduler.remote(),
            _value: PhantomData,
        }
    }
}

/// `Send` write handle for a [`BindingTarget`] living on the UI thread.
pub struct RemoteBindingTarget<V> {
    key: RemoteTargetKey,
    scheduler: RemoteScheduler,
    _value: PhantomData<fn(V)>,
}

impl<V> Clone for RemoteBindingTarget<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            scheduler: self.scheduler.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> std::fmt::Debug for RemoteBindingTarget<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBindingTarget")
            .field("key", &self.key)
            .finish()
    }
}

impl<V: Send + 'static> RemoteBindingTarget<V> {
    /// Post a write to the UI thread. Best-effort: dropped if the UI thread or
    /// the target is gone.
    pub fn send(&self, value: V) {
        let key = self.key;
        let posted = self.scheduler.schedule(move || {
            let target = REMOTE_TARGETS.with(|targets| {
                targets
                    .borrow()
                    .get(key)
                    .and_then(|entry| entry.downcast_ref::<BindingTarget<V>>())
                    .cloned()
            });
            match target {
                Some(target) => target.deliver(value),
                None => tracing::trace!("remote write to released target dropped"),
            }
        });
        if let Err(err) = posted {
            tracing::trace!(%err, "remote write dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_core::SchedulerConfig;
    use std::cell::RefCell;
    use std::thread;

    fn recording_target(
        lifetime: Lifetime,
        scheduler: &UiScheduler,
    ) -> (BindingTarget<i32>, Rc<RefCell<Vec<i32>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let target = BindingTarget::new(lifetime, scheduler.clone(), move |v| sink.borrow_mut().push(v));
        (target, log)
    }

    #[test]
    fn writes_go_through_scheduler() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, _token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);
        target.send(1);
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(scheduler.executed_count(), 1);
    }

    #[test]
    fn ended_lifetime_drops_writes() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);
        drop(token);
        target.send(1);
        assert!(log.borrow().is_empty());
        assert!(!target.is_active());
    }

    #[test]
    fn cancel_is_independent_of_lifetime() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, _token) = Lifetime::make();
        let (target, log) = recording_target(lifetime.clone(), &scheduler);
        target.cancel();
        target.send(1);
        assert!(log.borrow().is_empty());
        assert!(!lifetime.has_ended());
    }

    #[test]
    fn cancel_skips_already_queued_writes() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, _token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);

        let inner = target.clone();
        scheduler.schedule(move || {
            inner.send(7);
            inner.cancel();
        });
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn send_now_skips_the_queue() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, _token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);

        let inner = target.clone();
        let seen = Rc::clone(&log);
        scheduler.schedule(move || {
            inner.send(1);
            inner.send_now(2);
            assert_eq!(*seen.borrow(), vec![2]);
        });
        assert_eq!(*log.borrow(), vec![2, 1]);
    }

    #[test]
    fn send_now_respects_cancellation() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, _token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);
        target.cancel();
        target.send_now(3);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remote_writes_apply_on_run_pending() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, _token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);
        let remote = target.remote();

        thread::spawn(move || {
            remote.send(10);
            remote.send(11);
        })
        .join()
        .unwrap();

        assert!(log.borrow().is_empty());
        scheduler.run_pending();
        assert_eq!(*log.borrow(), vec![10, 11]);
    }

    #[test]
    fn remote_writes_after_release_are_dropped() {
        let scheduler = UiScheduler::new(SchedulerConfig::default());
        let (lifetime, token) = Lifetime::make();
        let (target, log) = recording_target(lifetime, &scheduler);
        let remote = target.remote();

        remote.send(1);
        drop(token);
        scheduler.run_pending();
        assert!(log.borrow().is_empty());
    }
}
