#![forbid(unsafe_code)]

//! Shared cancellation tokens.
//!
//! A [`Disposable`] owns the [`Subscription`] guards and teardown actions that
//! make up one logical piece of wiring. Clones share state, so the same token
//! can be handed to a caller and attached to a control's
//! [`Lifetime`](crate::Lifetime) at once: whichever side disposes first wins,
//! and the other becomes a no-op.
//!
//! # Invariants
//!
//! 1. `dispose()` is idempotent.
//! 2. Guards and teardowns added after disposal are released immediately.
//! 3. Teardowns run in registration order, after every guard has been dropped.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::observable::Subscription;

type Teardown = Box<dyn FnOnce()>;

#[derive(Default)]
struct DisposableState {
    disposed: bool,
    guards: SmallVec<[Subscription; 4]>,
    teardowns: Vec<Teardown>,
}

/// Shared, idempotent cancellation token.
#[derive(Clone, Default)]
pub struct Disposable {
    state: Rc<RefCell<DisposableState>>,
}

impl Disposable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until this token is disposed.
    pub fn hold(&self, subscription: Subscription) {
        let mut state = self.state.borrow_mut();
        if state.disposed {
            drop(state);
            drop(subscription);
            return;
        }
        state.guards.push(subscription);
    }

    /// Run `teardown` when this token is disposed.
    pub fn on_dispose(&self, teardown: impl FnOnce() + 'static) {
        let disposed = self.state.borrow().disposed;
        if disposed {
            teardown();
            return;
        }
        self.state.borrow_mut().teardowns.push(Box::new(teardown));
    }

    /// Release every guard and run every teardown. Later calls do nothing.
    pub fn dispose(&self) {
        let (guards, teardowns) = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            (
                std::mem::take(&mut state.guards),
                std::mem::take(&mut state.teardowns),
            )
        };
        drop(guards);
        for teardown in teardowns {
            teardown();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// Number of subscription guards currently held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.state.borrow().guards.len()
    }

}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Disposable")
            .field("disposed", &state.disposed)
            .field("guards", &state.guards.len())
            .field("teardowns", &state.teardowns.len())
            .finish()
    }
}
