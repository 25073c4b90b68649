#![forbid(unsafe_code)]

//! Commands: invocable units of work with observable enablement.
//!
//! A [`Command<I, O, E>`] wraps an `execute` function producing an
//! [`EventStream`] of results for each input. It exposes two read-only
//! properties through [`ActionStates`]:
//!
//! - `is_executing`: `true` while an execution is in flight.
//! - `is_enabled`: the caller-supplied condition AND not executing.
//!
//! Applying a command while it is disabled yields a single
//! [`CommandError::Disabled`] and never runs `execute`. Successful outputs and
//! failures of every execution are also republished on the command-wide
//! [`values`](Command::values) and [`errors`](Command::errors) streams.
//!
//! # Lifecycle
//!
//! [`Command::invoke`] is fire-and-forget: the execution's subscription is
//! parked in a generation-checked slot map owned by the command and released
//! when the execution completes, or when the command itself is dropped.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

use crate::error::CommandError;
use crate::observable::{Observable, Property, Subscription};
use crate::stream::{Event, EventSink, EventStream, Observer, pipe};

new_key_type! {
    /// Key of an in-flight fire-and-forget execution.
    struct ExecutionKey;
}

/// Read-only view of a command's state, handed to controls when a command is
/// bound to them.
pub trait ActionStates {
    fn is_enabled(&self) -> Property<bool>;
    fn is_executing(&self) -> Property<bool>;
}

type Execute<I, O, E> = Rc<dyn Fn(I) -> EventStream<Result<O, E>>>;
type InFlight = RefCell<SlotMap<ExecutionKey, Subscription>>;

struct CommandInner<I, O, E> {
    execute: Execute<I, O, E>,
    is_enabled: Observable<bool>,
    is_executing: Observable<bool>,
    values: (EventStream<O>, EventSink<O>),
    errors: (EventStream<E>, EventSink<E>),
    in_flight: Rc<InFlight>,
    _gates: [Subscription; 2],
}

/// An invocable unit exposing enabled/executing state.
pub struct Command<I, O = (), E = Infallible> {
    inner: Rc<CommandInner<I, O, E>>,
}

impl<I, O, E> Clone for Command<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<I, O, E> std::fmt::Debug for Command<I, O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("is_enabled", &self.inner.is_enabled.with(|v| *v))
            .field("is_executing", &self.inner.is_executing.with(|v| *v))
            .field("in_flight", &self.inner.in_flight.borrow().len())
            .finish()
    }
}

impl<I, O, E> Command<I, O, E>
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    /// A command that is enabled whenever it is not executing.
    pub fn new(execute: impl Fn(I) -> EventStream<Result<O, E>> + 'static) -> Self {
        Self::enabled_if(Property::constant(true), execute)
    }

    /// A command that is enabled when `condition` holds and it is not executing.
    pub fn enabled_if(
        condition: Property<bool>,
        execute: impl Fn(I) -> EventStream<Result<O, E>> + 'static,
    ) -> Self {
        let is_executing = Observable::new(false);
        let is_enabled = Observable::new(condition.get());

        let recompute = {
            let condition = condition.clone();
            let is_executing = is_executing.clone();
            let is_enabled = is_enabled.clone();
            Rc::new(move || is_enabled.set(condition.get() && !is_executing.get()))
        };
        let on_condition = {
            let recompute = Rc::clone(&recompute);
            condition.subscribe(move |_| recompute())
        };
        let on_executing = is_executing.subscribe(move |_| recompute());

        Self {
            inner: Rc::new(CommandInner {
                execute: Rc::new(execute),
                is_enabled,
                is_executing,
                values: pipe(),
                errors: pipe(),
                in_flight: Rc::new(RefCell::new(SlotMap::with_key())),
                _gates: [on_condition, on_executing],
            }),
        }
    }

    /// A command running a synchronous function.
    pub fn from_fn(f: impl Fn(I) -> Result<O, E> + 'static) -> Self {
        Self::new(move |input| EventStream::once(f(input)))
    }

    /// The results of executing with `input`.
    ///
    /// Lazy: nothing runs until the stream is observed. Each observation is a
    /// separate execution attempt.
    pub fn apply(&self, input: I) -> EventStream<Result<O, CommandError<E>>> {
        let inner = Rc::clone(&self.inner);
        EventStream::new(move |observer: Observer<Result<O, CommandError<E>>>| {
            if !inner.is_enabled.get() {
                tracing::trace!("command applied while disabled");
                observer(Event::Value(Err(CommandError::Disabled)));
                observer(Event::Completed);
                return Subscription::empty();
            }

            let execution = Execution {
                is_executing: inner.is_executing.clone(),
                active: Rc::new(Cell::new(true)),
            };
            inner.is_executing.set(true);

            let finish = execution.handle();
            let values = inner.values.1.clone();
            let errors = inner.errors.1.clone();
            let work = (inner.execute)(input.clone());
            let upstream = work.observe(move |event| match event {
                Event::Value(Ok(output)) => {
                    values.send(output.clone());
                    observer(Event::Value(Ok(output)));
                }
                Event::Value(Err(error)) => {
                    errors.send(error.clone());
                    observer(Event::Value(Err(CommandError::Failed(error))));
                }
                Event::Completed => {
                    finish.finish();
                    observer(Event::Completed);
                }
            });
            Subscription::new((upstream, execution))
        })
    }

    /// Apply and keep the execution alive until it completes.
    pub fn invoke(&self, input: I) {
        let key: Rc<Cell<Option<ExecutionKey>>> = Rc::new(Cell::new(None));
        let done = Rc::new(Cell::new(false));
        let registry: Weak<InFlight> = Rc::downgrade(&self.inner.in_flight);

        let subscription = {
            let key = Rc::clone(&key);
            let done = Rc::clone(&done);
            self.apply(input).observe(move |event| {
                if !event.is_completed() {
                    return;
                }
                done.set(true);
                if let (Some(key), Some(registry)) = (key.get(), registry.upgrade()) {
                    let finished = registry.borrow_mut().remove(key);
                    drop(finished);
                }
            })
        };

        if !done.get() {
            let slot = self.inner.in_flight.borrow_mut().insert(subscription);
            key.set(Some(slot));
        }
    }

    /// Outputs of every successful execution.
    #[must_use]
    pub fn values(&self) -> EventStream<O> {
        self.inner.values.0.clone()
    }

    /// Failures of every execution.
    #[must_use]
    pub fn errors(&self) -> EventStream<E> {
        self.inner.errors.0.clone()
    }

    /// Executions started through [`invoke`](Self::invoke) that have not completed.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }
}

impl<I, O, E> ActionStates for Command<I, O, E> {
    fn is_enabled(&self) -> Property<bool> {
        Property::from(self.inner.is_enabled.clone())
    }

    fn is_executing(&self) -> Property<bool> {
        Property::from(self.inner.is_executing.clone())
    }
}

/// Resets `is_executing` exactly once, on completion or when dropped early.
struct Execution {
    is_executing: Observable<bool>,
    active: Rc<Cell<bool>>,
}

impl Execution {
    fn handle(&self) -> ExecutionHandle {
        ExecutionHandle {
            is_executing: self.is_executing.clone(),
            active: Rc::clone(&self.active),
        }
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        self.handle().finish();
    }
}

struct ExecutionHandle {
    is_executing: Observable<bool>,
    active: Rc<Cell<bool>>,
}

impl ExecutionHandle {
    fn finish(&self) {
        if self.active.replace(false) {
            self.is_executing.set(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoke_runs_and_reports_values() {
        let command: Command<i32, i32> = Command::from_fn(|x| Ok(x * 2));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = command.values().observe_values(move |v| s.borrow_mut().push(v));

        command.invoke(2);
        command.invoke(5);
        assert_eq!(*seen.borrow(), vec![4, 10]);
        assert_eq!(command.in_flight_count(), 0);
        assert!(!command.is_executing().get());
    }

    #[test]
    fn disabled_command_reports_disabled() {
        let gate = Observable::new(false);
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        let command: Command<(), (), String> = Command::enabled_if(gate.read_only(), move |()| {
            r.set(true);
            EventStream::once(Ok(()))
        });

        let results = Rc::new(RefCell::new(Vec::new()));
        let res = Rc::clone(&results);
        let _sub = command
            .apply(())
            .observe_values(move |result| res.borrow_mut().push(result));

        assert!(!ran.get());
        assert_eq!(*results.borrow(), vec![Err(CommandError::Disabled)]);

        gate.set(true);
        assert!(command.is_enabled().get());
    }

    #[test]
    fn executing_disables_until_completion() {
        let (work, sink) = pipe::<Result<u8, Infallible>>();
        let command: Command<(), u8> = Command::new(move |()| work.clone());
        let enabled_log = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&enabled_log);
        let _sub = command.is_enabled().subscribe(move |v| log.borrow_mut().push(*v));

        command.invoke(());
        assert!(command.is_executing().get());
        assert_eq!(command.in_flight_count(), 1);

        command.invoke(());
        assert_eq!(command.in_flight_count(), 1, "second invoke is refused");

        sink.send(Ok(1));
        sink.complete();
        assert!(!command.is_executing().get());
        assert_eq!(command.in_flight_count(), 0);
        assert_eq!(*enabled_log.borrow(), vec![false, true]);
    }

    #[test]
    fn failures_are_republished() {
        let command: Command<u8, u8, String> =
            Command::from_fn(|x| if x > 3 { Err(format!("too big: {x}")) } else { Ok(x) });
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&errors);
        let _sub = command.errors().observe_values(move |err| e.borrow_mut().push(err));

        command.invoke(1);
        command.invoke(9);
        assert_eq!(*errors.borrow(), vec!["too big: 9".to_string()]);
    }

    #[test]
    fn dropping_apply_subscription_resets_executing() {
        let command: Command<(), ()> = Command::new(|()| EventStream::never());
        let sub = command.apply(()).observe(|_| {});
        assert!(command.is_executing().get());
        drop(sub);
        assert!(!command.is_executing().get());
        assert!(command.is_enabled().get());
    }

    #[test]
    fn condition_changes_propagate() {
        let gate = Observable::new(true);
        let command: Command<()> = Command::enabled_if(gate.read_only(), |()| EventStream::once(Ok(())));
        assert!(command.is_enabled().get());
        gate.set(false);
        assert!(!command.is_enabled().get());
    }
}
