#![forbid(unsafe_code)]

//! Mock controls and command fixtures for exercising duplex bindings.
//!
//! [`MockControl<V>`] stands in for a real widget. It records every write it
//! receives, remembers its enabled state, and lets a test play the user by
//! [`emit`](MockControl::emit)ting interaction events. Its bindables are built
//! exactly the way a real control would build them.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use duplex_bind::{ActionBindable, ValueBindable};
use duplex_core::{
    ActionStates, Command, Control, EventSink, EventStream, Lifetime, LifetimeToken, Observable, pipe,
};

/// Install a test-writer `tracing` subscriber once per process.
pub fn init_tracing() {
    // Tests share one process, so every call after the first finds a subscriber installed.
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// Command state observed by a control's post-bind hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundStates {
    pub is_enabled: bool,
    pub is_executing: bool,
}

/// Recording stand-in for a UI control.
pub struct MockControl<V> {
    token: LifetimeToken,
    enabled: Cell<bool>,
    enable_history: RefCell<Vec<bool>>,
    writes: RefCell<Vec<V>>,
    displayed: RefCell<Option<V>>,
    events: EventStream<V>,
    sink: EventSink<V>,
    echo_writes: Cell<bool>,
    bound: RefCell<Vec<BoundStates>>,
    executing_seen: Rc<RefCell<Vec<bool>>>,
    hook_guards: RefCell<Vec<duplex_core::Subscription>>,
}

impl<V: Clone + 'static> MockControl<V> {
    #[must_use]
    pub fn new() -> Rc<Self> {
        let (_, token) = Lifetime::make();
        let (events, sink) = pipe();
        Rc::new(Self {
            token,
            enabled: Cell::new(true),
            enable_history: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
            displayed: RefCell::new(None),
            events,
            sink,
            echo_writes: Cell::new(false),
            bound: RefCell::new(Vec::new()),
            executing_seen: Rc::new(RefCell::new(Vec::new())),
            hook_guards: RefCell::new(Vec::new()),
        })
    }

    /// A control that re-emits programmatic writes as interaction events, the
    /// way some toolkits report every change.
    #[must_use]
    pub fn echoing() -> Rc<Self> {
        let control = Self::new();
        control.echo_writes.set(true);
        control
    }

    /// Play the user: edit what the control shows and deliver the event.
    pub fn emit(&self, value: V) {
        *self.displayed.borrow_mut() = Some(value.clone());
        self.sink.send(value);
    }

    /// End the interaction stream.
    pub fn complete(&self) {
        self.sink.complete();
    }

    #[must_use]
    pub fn last_value(&self) -> Option<V> {
        self.writes.borrow().last().cloned()
    }

    /// What the control currently shows, from the user's last edit or the
    /// last programmatic write, whichever came later.
    #[must_use]
    pub fn displayed(&self) -> Option<V> {
        self.displayed.borrow().clone()
    }

    /// Every value written into the control, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<V> {
        self.writes.borrow().clone()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Every `set_enabled` call, oldest first.
    #[must_use]
    pub fn enable_history(&self) -> Vec<bool> {
        self.enable_history.borrow().clone()
    }

    /// Command state seen by the post-bind hook, one entry per bind.
    #[must_use]
    pub fn bound(&self) -> Vec<BoundStates> {
        self.bound.borrow().clone()
    }

    /// `is_executing` values the post-bind hook has tracked since binding.
    #[must_use]
    pub fn executing_seen(&self) -> Vec<bool> {
        self.executing_seen.borrow().clone()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.sink.observer_count()
    }

    /// The control as a two-way value endpoint.
    #[must_use]
    pub fn value_bindable(self: &Rc<Self>) -> ValueBindable<V> {
        ValueBindable::with_did_bind(
            self,
            Self::apply_enabled,
            Self::apply_write,
            |control| control.events.clone(),
            Self::record_bind,
        )
    }

    /// The control as an action source.
    #[must_use]
    pub fn action_bindable(self: &Rc<Self>) -> ActionBindable<V> {
        ActionBindable::with_did_bind(
            self,
            Self::apply_enabled,
            |control| control.events.clone(),
            Self::record_bind,
        )
    }

    fn apply_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
        self.enable_history.borrow_mut().push(enabled);
    }

    fn apply_write(&self, value: V) {
        self.writes.borrow_mut().push(value.clone());
        *self.displayed.borrow_mut() = Some(value.clone());
        if self.echo_writes.get() {
            self.sink.send(value);
        }
    }

    fn record_bind(&self, states: &dyn ActionStates) {
        let executing = states.is_executing();
        self.bound.borrow_mut().push(BoundStates {
            is_enabled: states.is_enabled().get(),
            is_executing: executing.get(),
        });
        let seen = Rc::clone(&self.executing_seen);
        let guard = executing.subscribe(move |value| seen.borrow_mut().push(*value));
        self.hook_guards.borrow_mut().push(guard);
    }
}

impl<V: 'static> Control for MockControl<V> {
    fn lifetime(&self) -> Lifetime {
        self.token.lifetime()
    }
}

impl<V> std::fmt::Debug for MockControl<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockControl")
            .field("enabled", &self.enabled.get())
            .field("writes", &self.writes.borrow().len())
            .finish_non_exhaustive()
    }
}

/// A control whose events carry no payload.
pub type MockButton = MockControl<()>;

impl MockControl<()> {
    pub fn click(&self) {
        self.emit(());
    }
}

/// A command that records every input it runs with.
#[must_use]
pub fn recording_command<I: Clone + 'static>() -> (Command<I>, Rc<RefCell<Vec<I>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let command = Command::from_fn(move |input: I| {
        sink.borrow_mut().push(input);
        Ok::<(), Infallible>(())
    });
    (command, log)
}

/// Like [`recording_command`], enabled only while `gate` holds.
#[must_use]
pub fn gated_command<I: Clone + 'static>(gate: &Observable<bool>) -> (Command<I>, Rc<RefCell<Vec<I>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let command = Command::enabled_if(gate.read_only(), move |input: I| {
        sink.borrow_mut().push(input);
        EventStream::once(Ok(()))
    });
    (command, log)
}

/// A zero-input command whose executions stay in flight until the returned
/// sink completes.
#[must_use]
pub fn pending_command() -> (Command<()>, EventSink<Result<(), Infallible>>) {
    let (work, sink) = pipe();
    let command = Command::new(move |()| work.clone());
    (command, sink)
}
