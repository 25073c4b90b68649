#![forbid(unsafe_code)]

//! Deterministic end-of-life notification for controls.
//!
//! A control owns a [`LifetimeToken`]; everybody else holds [`Lifetime`]
//! handles. Dropping the token ends the lifetime: every attached
//! [`Disposable`] is disposed and every `observe_ended` callback runs, in
//! registration order. Holding a `Lifetime` never keeps the control alive.

use std::cell::RefCell;
use std::rc::Rc;

use crate::disposable::Disposable;

#[derive(Default)]
struct LifetimeState {
    ended: bool,
    attached: Vec<Disposable>,
    observers: Vec<Box<dyn FnOnce()>>,
}

/// Observer handle for the lifetime of some object.
#[derive(Clone)]
pub struct Lifetime {
    state: Rc<RefCell<LifetimeState>>,
}

impl Lifetime {
    /// Create a lifetime and the token that ends it.
    #[must_use]
    pub fn make() -> (Self, LifetimeToken) {
        let state = Rc::new(RefCell::new(LifetimeState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            LifetimeToken { state },
        )
    }

    /// A lifetime that has already ended.
    #[must_use]
    pub fn ended() -> Self {
        Self {
            state: Rc::new(RefCell::new(LifetimeState {
                ended: true,
                ..LifetimeState::default()
            })),
        }
    }

    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.state.borrow().ended
    }

    /// Dispose `disposable` when this lifetime ends, or right away if it
    /// already has.
    pub fn attach(&self, disposable: &Disposable) {
        {
            let mut state = self.state.borrow_mut();
            if !state.ended {
                state.attached.retain(|d| !d.is_disposed());
                state.attached.push(disposable.clone());
                return;
            }
        }
        disposable.dispose();
    }

    /// Run `callback` when this lifetime ends, or right away if it already has.
    pub fn observe_ended(&self, callback: impl FnOnce() + 'static) {
        let ended = self.state.borrow().ended;
        if ended {
            callback();
            return;
        }
        self.state.borrow_mut().observers.push(Box::new(callback));
    }

    /// Number of attached disposables that are still live.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.state
            .borrow()
            .attached
            .iter()
            .filter(|d| !d.is_disposed())
            .count()
    }
}

impl std::fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifetime")
            .field("ended", &self.has_ended())
            .field("attached", &self.attached_count())
            .finish()
    }
}

/// Owning end of a [`Lifetime`]. Ends the lifetime when dropped.
pub struct LifetimeToken {
    state: Rc<RefCell<LifetimeState>>,
}

impl LifetimeToken {
    /// A new observer handle for this token's lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        Lifetime {
            state: Rc::clone(&self.state),
        }
    }

    /// End the lifetime now.
    pub fn end(self) {
        drop(self);
    }
}

impl Drop for LifetimeToken {
    fn drop(&mut self) {
        let (attached, observers) = {
            let mut state = self.state.borrow_mut();
            if state.ended {
                return;
            }
            state.ended = true;
            (
                std::mem::take(&mut state.attached),
                std::mem::take(&mut state.observers),
            )
        };
        tracing::trace!(attached = attached.len(), "lifetime ended");
        for disposable in attached {
            disposable.dispose();
        }
        for observer in observers {
            observer();
        }
    }
}

impl std::fmt::Debug for LifetimeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeToken").finish_non_exhaustive()
    }
}

/// Anything whose destruction can be observed through a [`Lifetime`].
///
/// UI controls implement this by owning a [`LifetimeToken`] and handing out
/// its lifetime.
pub trait Control: 'static {
    fn lifetime(&self) -> Lifetime;
}
