#![forbid(unsafe_code)]

//! Lazy, multi-subscriber event streams.
//!
//! An [`EventStream<T>`] is a recipe: nothing happens until something calls
//! [`observe`](EventStream::observe), and every observer gets its own
//! [`Subscription`]. Streams carry [`Event::Value`]s until an optional
//! [`Event::Completed`], after which nothing else is delivered.
//!
//! Hot sources are built with [`pipe`], which returns the stream together
//! with the [`EventSink`] used to push into it. Controls use a pipe to publish
//! their user-driven interaction events.
//!
//! # Invariants
//!
//! 1. Observers of a pipe are notified in registration order.
//! 2. `Completed` is delivered at most once per observer and nothing follows it.
//! 3. Observing an already-completed pipe delivers `Completed` immediately.
//! 4. Combinators (`map`, `filter`, `filter_map`, `skip_none`) forward
//!    `Completed` unchanged.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::observable::Subscription;

/// A single delivery on an [`EventStream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<T> {
    Value(T),
    Completed,
}

impl<T> Event<T> {
    /// Transform the payload, leaving `Completed` untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U> {
        match self {
            Self::Value(value) => Event::Value(f(value)),
            Self::Completed => Event::Completed,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Callback receiving stream events.
pub type Observer<T> = Rc<dyn Fn(Event<T>)>;

type Produce<T> = Rc<dyn Fn(Observer<T>) -> Subscription>;

/// A lazy stream of values.
pub struct EventStream<T> {
    produce: Produce<T>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            produce: Rc::clone(&self.produce),
        }
    }
}

impl<T> std::fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

impl<T: 'static> EventStream<T> {
    /// Build a stream from a producer. The producer runs once per observer and
    /// returns the subscription that keeps that observer attached.
    pub fn new(produce: impl Fn(Observer<T>) -> Subscription + 'static) -> Self {
        Self {
            produce: Rc::new(produce),
        }
    }

    /// A stream that completes immediately without emitting.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|observer| {
            observer(Event::Completed);
            Subscription::empty()
        })
    }

    /// A stream that never emits and never completes.
    #[must_use]
    pub fn never() -> Self {
        Self::new(|_| Subscription::empty())
    }

    /// Start observing. Dropping the returned guard detaches the observer.
    pub fn observe(&self, callback: impl Fn(Event<T>) + 'static) -> Subscription {
        (self.produce)(Rc::new(callback))
    }

    /// Observe values only, ignoring completion.
    pub fn observe_values(&self, callback: impl Fn(T) + 'static) -> Subscription {
        self.observe(move |event| {
            if let Event::Value(value) = event {
                callback(value);
            }
        })
    }

    /// Project every value through `f`.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> EventStream<U> {
        let source = self.clone();
        let f = Rc::new(f);
        EventStream::new(move |observer: Observer<U>| {
            let f = Rc::clone(&f);
            source.observe(move |event| observer(event.map(|value| f(value))))
        })
    }

    /// Keep only the values matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        let source = self.clone();
        let predicate = Rc::new(predicate);
        Self::new(move |observer: Observer<T>| {
            let predicate = Rc::clone(&predicate);
            source.observe(move |event| match event {
                Event::Value(value) if !predicate(&value) => {}
                other => observer(other),
            })
        })
    }

    /// Project and drop in one step: `None` results are skipped.
    pub fn filter_map<U: 'static>(&self, f: impl Fn(T) -> Option<U> + 'static) -> EventStream<U> {
        let source = self.clone();
        let f = Rc::new(f);
        EventStream::new(move |observer: Observer<U>| {
            let f = Rc::clone(&f);
            source.observe(move |event| match event {
                Event::Value(value) => {
                    if let Some(mapped) = f(value) {
                        observer(Event::Value(mapped));
                    }
                }
                Event::Completed => observer(Event::Completed),
            })
        })
    }
}

impl<T: Clone + 'static> EventStream<T> {
    /// Emit `value` once per observer, then complete.
    pub fn once(value: T) -> Self {
        Self::new(move |observer| {
            observer(Event::Value(value.clone()));
            observer(Event::Completed);
            Subscription::empty()
        })
    }
}

impl<T: 'static> EventStream<Option<T>> {
    /// Unwrap present values and drop absent ones.
    #[must_use]
    pub fn skip_none(&self) -> EventStream<T> {
        self.filter_map(|value| value)
    }
}

struct PipeState<T> {
    observers: Vec<Weak<dyn Fn(Event<T>)>>,
    completed: bool,
}

/// The sending half of a [`pipe`].
pub struct EventSink<T> {
    state: Rc<RefCell<PipeState<T>>>,
}

impl<T> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for EventSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventSink")
            .field("observers", &state.observers.len())
            .field("completed", &state.completed)
            .finish()
    }
}

/// Create a hot stream and the sink that feeds it.
#[must_use]
pub fn pipe<T: Clone + 'static>() -> (EventStream<T>, EventSink<T>) {
    let state = Rc::new(RefCell::new(PipeState {
        observers: Vec::new(),
        completed: false,
    }));
    let source = Rc::clone(&state);
    let stream = EventStream::new(move |observer: Observer<T>| {
        let completed = source.borrow().completed;
        if completed {
            observer(Event::Completed);
            return Subscription::empty();
        }
        source.borrow_mut().observers.push(Rc::downgrade(&observer));
        Subscription::new(observer)
    });
    (stream, EventSink { state })
}

impl<T: Clone + 'static> EventSink<T> {
    /// Deliver a value to every live observer. Ignored after completion.
    pub fn send(&self, value: T) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.completed {
                return;
            }
            state.observers.retain(|w| w.strong_count() > 0);
            state
                .observers
                .iter()
                .filter_map(Weak::upgrade)
                .collect::<Vec<_>>()
        };
        for observer in &observers {
            observer(Event::Value(value.clone()));
        }
    }

    /// Complete the stream. Current observers receive `Completed` and are released.
    pub fn complete(&self) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.completed {
                return;
            }
            state.completed = true;
            std::mem::take(&mut state.observers)
        };
        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer(Event::Completed);
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.borrow().completed
    }

    /// Number of observers still attached.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state
            .borrow()
            .observers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn collect<T: Clone + 'static>(stream: &EventStream<T>) -> (Rc<RefCell<Vec<Event<T>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = stream.observe(move |event| sink.borrow_mut().push(event));
        (log, sub)
    }

    #[test]
    fn pipe_delivers_in_order() {
        let (stream, sink) = pipe::<i32>();
        let (log, _sub) = collect(&stream);
        sink.send(1);
        sink.send(2);
        assert_eq!(*log.borrow(), vec![Event::Value(1), Event::Value(2)]);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let (stream, sink) = pipe::<i32>();
        let (log, sub) = collect(&stream);
        sink.send(1);
        drop(sub);
        sink.send(2);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(sink.observer_count(), 0);
    }

    #[test]
    fn complete_is_terminal() {
        let (stream, sink) = pipe::<i32>();
        let (log, _sub) = collect(&stream);
        sink.complete();
        sink.send(3);
        sink.complete();
        assert_eq!(*log.borrow(), vec![Event::Completed]);

        let (late, _late_sub) = collect(&stream);
        assert_eq!(*late.borrow(), vec![Event::Completed]);
    }

    #[test]
    fn empty_completes_immediately() {
        let (log, _sub) = collect(&EventStream::<u8>::empty());
        assert_eq!(*log.borrow(), vec![Event::Completed]);
    }

    #[test]
    fn never_stays_silent() {
        let (log, _sub) = collect(&EventStream::<u8>::never());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn once_emits_then_completes() {
        let (log, _sub) = collect(&EventStream::once("x"));
        assert_eq!(*log.borrow(), vec![Event::Value("x"), Event::Completed]);
    }

    #[test]
    fn map_filter_filter_map_compose() {
        let (stream, sink) = pipe::<i32>();
        let derived = stream
            .filter(|v| v % 2 == 0)
            .map(|v| v * 10)
            .filter_map(|v| (v > 20).then_some(v.to_string()));
        let (log, _sub) = collect(&derived);
        for v in 1..=6 {
            sink.send(v);
        }
        sink.complete();
        assert_eq!(
            *log.borrow(),
            vec![
                Event::Value("40".to_string()),
                Event::Value("60".to_string()),
                Event::Completed
            ]
        );
    }

    #[test]
    fn skip_none_unwraps() {
        let (stream, sink) = pipe::<Option<u8>>();
        let (log, _sub) = collect(&stream.skip_none());
        sink.send(Some(1));
        sink.send(None);
        sink.send(Some(2));
        assert_eq!(*log.borrow(), vec![Event::Value(1), Event::Value(2)]);
    }

    #[test]
    fn each_observer_runs_the_producer() {
        let runs = Rc::new(Cell::new(0));
        let r = Rc::clone(&runs);
        let stream = EventStream::<()>::new(move |_| {
            r.set(r.get() + 1);
            Subscription::empty()
        });
        let _a = stream.observe(|_| {});
        let _b = stream.observe(|_| {});
        assert_eq!(runs.get(), 2);
    }

    proptest::proptest! {
        #[test]
        fn combinators_agree_with_iterators(values in proptest::collection::vec(-50i32..50, 0..40)) {
            let (stream, sink) = pipe::<i32>();
            let derived = stream.filter(|v| *v >= 0).map(|v| v * 3);
            let (log, _sub) = collect(&derived);
            for v in &values {
                sink.send(*v);
            }
            let expected: Vec<_> = values
                .iter()
                .filter(|v| **v >= 0)
                .map(|v| Event::Value(v * 3))
                .collect();
            proptest::prop_assert_eq!(&*log.borrow(), &expected);
        }
    }
}
