#![forbid(unsafe_code)]

//! Connecting reactive endpoints to bindables.
//!
//! Four connection shapes exist, each with its own [`Strategy`]:
//!
//! | Reactive side      | Bindable side                    | Strategy                 |
//! |--------------------|----------------------------------|--------------------------|
//! | `Observable<V>`    | `ValueBindable<V>`               | [`Strategy::ValueSync`]  |
//! | `Command<V, ..>`   | provider of `V`                  | [`Strategy::Action`]     |
//! | `Command<(), ..>`  | provider of anything             | [`Strategy::Trigger`]    |
//! | `Command<(), ..>`  | provider of `()`                 | [`Strategy::UnitAction`] |
//!
//! [`bind_value`], [`bind_action`] and [`bind_trigger`] name the shapes
//! explicitly. [`BindWith`] offers every shape in either operand order; the
//! trigger shape takes its command wrapped in [`Trigger`]. When more than one
//! shape fits, the most specific wins: `UnitAction` before `Action` before
//! `Trigger`.
//!
//! # Lifecycle
//!
//! Every wiring is owned by a [`Disposable`] attached to the control's
//! lifetime. It ends when either the returned [`Binding`] is disposed or the
//! control is dropped, whichever comes first. Dropping the [`Binding`] handle
//! alone does not unbind.
//!
//! # Scheduling
//!
//! Writes into the control (`set_value`, `set_enabled`) run on the current
//! thread's [`UiScheduler`]. The initial write is applied directly, so it
//! lands before the bind call returns even inside a running scheduler job.
//! Control events are delivered on the thread that emits them and are not
//! rescheduled.

use std::any::TypeId;
use std::cell::Cell;
use std::rc::Rc;

use duplex_core::{ActionStates, Command, Disposable, Observable, UiScheduler};

use crate::action::{ActionBindable, ActionBindableProvider};
use crate::transform::OutputTransform;
use crate::value::ValueBindable;

/// How a reactive endpoint is wired to a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Cell and control kept equal in both directions.
    ValueSync,
    /// Each control event invokes the command with the event's payload.
    Action,
    /// Each control event invokes a zero-input command; payloads are discarded.
    Trigger,
    /// Zero-input command on a control whose events carry no payload.
    UnitAction,
}

impl Strategy {
    /// The strategy for a `Command<I, ..>` on a provider of `V`, or `None` when
    /// the two cannot be connected.
    #[must_use]
    pub fn for_command<I: 'static, V: 'static>() -> Option<Self> {
        let unit = TypeId::of::<()>();
        let input = TypeId::of::<I>();
        let value = TypeId::of::<V>();
        if input == unit && value == unit {
            Some(Self::UnitAction)
        } else if input == value {
            Some(Self::Action)
        } else if input == unit {
            Some(Self::Trigger)
        } else {
            None
        }
    }
}

/// Handle to one installed wiring.
#[must_use = "a binding lives as long as its control; keep the handle to end it sooner"]
#[derive(Clone)]
pub struct Binding {
    strategy: Strategy,
    disposable: Option<Disposable>,
}

impl Binding {
    fn inert(strategy: Strategy) -> Self {
        tracing::debug!(?strategy, "bindable is detached; nothing wired");
        Self {
            strategy,
            disposable: None,
        }
    }

    fn live(strategy: Strategy, disposable: Disposable) -> Self {
        Self {
            strategy,
            disposable: Some(disposable),
        }
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Whether binding found no control and installed nothing.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.disposable.is_none()
    }

    /// Whether the wiring is gone, by [`dispose`](Self::dispose), by the
    /// control's lifetime ending, or because it never existed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposable.as_ref().is_none_or(Disposable::is_disposed)
    }

    /// Tear the wiring down in both directions. Idempotent.
    pub fn dispose(&self) {
        if let Some(disposable) = &self.disposable {
            disposable.dispose();
        }
    }

    /// The underlying token, for attaching to other lifetimes.
    #[must_use]
    pub fn disposable(&self) -> Option<&Disposable> {
        self.disposable.as_ref()
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("strategy", &self.strategy)
            .field("inert", &self.is_inert())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Keep `cell` and the control equal in both directions.
///
/// The cell's current value is written into the control before this returns,
/// even when called from inside a scheduler job. Afterwards, cell changes are
/// written to the control and control edits are written to the cell; a write
/// caused by the other direction is not echoed back. If the cell settles on a
/// different value than the one the control sent (a subscriber clamped it, for
/// instance), the settled value is written back to the control.
pub fn bind_value<V: Clone + PartialEq + 'static>(
    cell: &Observable<V>,
    bindable: &ValueBindable<V>,
) -> Binding {
    let strategy = Strategy::ValueSync;
    let _span = tracing::debug_span!("duplex.bind", ?strategy).entered();
    if !bindable.is_attached() {
        return Binding::inert(strategy);
    }

    let target = bindable.binding_target();
    let disposable = Disposable::new();
    disposable.on_dispose({
        let target = target.clone();
        move || target.cancel()
    });

    target.send_now(cell.get());

    let syncing = Rc::new(Cell::new(false));

    let guard_out = Rc::clone(&syncing);
    let to_control = target.clone();
    disposable.hold(cell.subscribe(move |value| {
        if !guard_out.get() {
            guard_out.set(true);
            to_control.send(value.clone());
            guard_out.set(false);
        }
    }));

    let guard_in = syncing;
    let to_cell = cell.clone();
    let correct = target.clone();
    disposable.hold(bindable.values().observe_values(move |value: V| {
        if !guard_in.get() {
            guard_in.set(true);
            to_cell.set(value.clone());
            guard_in.set(false);
            let settled = to_cell.get();
            if settled != value {
                tracing::trace!("cell settled on a different value; correcting control");
                correct.send(settled);
            }
        }
    }));

    target.lifetime().attach(&disposable);
    tracing::debug!("value sync installed");
    Binding::live(strategy, disposable)
}

/// Drive `command` from the control's events.
///
/// The control's enablement follows `command.is_enabled()` from now on, with
/// the current state applied before this returns. Every control event invokes
/// the command with its payload, and the control's post-bind hook (if any)
/// receives the command's state.
pub fn bind_action<I, O, E, P>(command: &Command<I, O, E>, provider: &P) -> Binding
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
    P: ActionBindableProvider<Value = I> + ?Sized,
{
    let strategy = Strategy::for_command::<I, I>().unwrap_or(Strategy::Action);
    wire(command, &provider.action_bindable(), strategy)
}

/// Drive a zero-input `command` from a control of any payload type.
///
/// Payloads are discarded: every event is exactly one invocation.
pub fn bind_trigger<O, E, P>(command: &Command<(), O, E>, provider: &P) -> Binding
where
    O: Clone + 'static,
    E: Clone + 'static,
    P: ActionBindableProvider + ?Sized,
{
    let strategy = Strategy::for_command::<(), P::Value>().unwrap_or(Strategy::Trigger);
    wire(command, &provider.map_output(|_| ()), strategy)
}

fn wire<I, O, E>(command: &Command<I, O, E>, bindable: &ActionBindable<I>, strategy: Strategy) -> Binding
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    let _span = tracing::debug_span!("duplex.bind", ?strategy).entered();
    let handle = bindable.handle();
    if !handle.is_attached() {
        return Binding::inert(strategy);
    }

    let scheduler = UiScheduler::current();
    let disposable = Disposable::new();
    let live = Rc::new(Cell::new(true));
    disposable.on_dispose({
        let live = Rc::clone(&live);
        move || {
            live.set(false);
            tracing::trace!("action wiring disposed");
        }
    });

    let set_enabled = handle.enabled_setter();
    let is_enabled = command.is_enabled();
    set_enabled(is_enabled.get());
    let reflect = Rc::new(move |enabled: bool| {
        let set_enabled = Rc::clone(&set_enabled);
        let live = Rc::clone(&live);
        scheduler.schedule(move || {
            if live.get() {
                set_enabled(enabled);
            }
        });
    });
    disposable.hold(is_enabled.subscribe({
        let reflect = Rc::clone(&reflect);
        move |enabled| reflect(*enabled)
    }));

    let invoked = command.clone();
    disposable.hold(
        handle
            .values()
            .observe_values(move |input| invoked.invoke(input)),
    );

    handle.did_bind(command as &dyn ActionStates);

    handle.lifetime().attach(&disposable);
    tracing::debug!("action wiring installed");
    Binding::live(strategy, disposable)
}

/// Operand-order-independent binding.
///
/// A blanket trigger impl on `Command<(), ..>` would overlap the matching-input
/// impl at `V = ()`, so the trigger shape goes through the [`Trigger`] marker.
pub trait BindWith<Rhs: ?Sized> {
    fn bind_with(&self, rhs: &Rhs) -> Binding;
}

/// A zero-input command bound as a trigger: see [`bind_trigger`].
///
/// ```ignore
/// let _ = Trigger(&save).bind_with(&name_field.value_bindable());
/// ```
pub struct Trigger<'a, O, E>(pub &'a Command<(), O, E>);

impl<O, E> std::fmt::Debug for Trigger<'_, O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger").finish_non_exhaustive()
    }
}

impl<O, E, P> BindWith<P> for Trigger<'_, O, E>
where
    O: Clone + 'static,
    E: Clone + 'static,
    P: ActionBindableProvider + ?Sized,
{
    fn bind_with(&self, rhs: &P) -> Binding {
        bind_trigger(self.0, rhs)
    }
}

impl<V, O, E> BindWith<Trigger<'_, O, E>> for ActionBindable<V>
where
    V: 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    fn bind_with(&self, rhs: &Trigger<'_, O, E>) -> Binding {
        rhs.bind_with(self)
    }
}

impl<V, O, E> BindWith<Trigger<'_, O, E>> for ValueBindable<V>
where
    V: 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    fn bind_with(&self, rhs: &Trigger<'_, O, E>) -> Binding {
        rhs.bind_with(self)
    }
}

impl<V: Clone + PartialEq + 'static> BindWith<ValueBindable<V>> for Observable<V> {
    fn bind_with(&self, rhs: &ValueBindable<V>) -> Binding {
        bind_value(self, rhs)
    }
}

impl<V: Clone + PartialEq + 'static> BindWith<Observable<V>> for ValueBindable<V> {
    fn bind_with(&self, rhs: &Observable<V>) -> Binding {
        rhs.bind_with(self)
    }
}

impl<I, O, E> BindWith<ActionBindable<I>> for Command<I, O, E>
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    fn bind_with(&self, rhs: &ActionBindable<I>) -> Binding {
        bind_action(self, rhs)
    }
}

impl<I, O, E> BindWith<Command<I, O, E>> for ActionBindable<I>
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    fn bind_with(&self, rhs: &Command<I, O, E>) -> Binding {
        rhs.bind_with(self)
    }
}

impl<I, O, E> BindWith<ValueBindable<I>> for Command<I, O, E>
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    fn bind_with(&self, rhs: &ValueBindable<I>) -> Binding {
        bind_action(self, rhs)
    }
}

impl<I, O, E> BindWith<Command<I, O, E>> for ValueBindable<I>
where
    I: Clone + 'static,
    O: Clone + 'static,
    E: Clone + 'static,
{
    fn bind_with(&self, rhs: &Command<I, O, E>) -> Binding {
        rhs.bind_with(self)
    }
}
