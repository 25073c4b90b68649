#![forbid(unsafe_code)]

//! Output transformation for bindables.
//!
//! [`OutputTransform`] rewrites the value stream a control produces while
//! keeping everything else about the control: the same weak reference, the same
//! enable capability, the same post-bind hook. The result is always an
//! [`ActionBindable`]; write capability does not survive a transformation.
//!
//! Transforms are lazy. The closure runs when the derived stream is observed,
//! and a detached source yields a detached result without ever running it.
//! The derived bindable keeps only the source's stream closure, never the
//! source bindable itself.

use std::rc::Rc;

use duplex_core::EventStream;

use crate::action::{ActionBindable, ActionBindableProvider};

/// Stream combinators on anything that can act as an [`ActionBindable`].
pub trait OutputTransform: ActionBindableProvider {
    /// Rewrite the whole output stream.
    fn lift_output<U: 'static>(
        &self,
        transform: impl Fn(EventStream<Self::Value>) -> EventStream<U> + 'static,
    ) -> ActionBindable<U> {
        let source = self.action_bindable();
        if !source.is_attached() {
            tracing::trace!("output transform on detached bindable");
            return ActionBindable::detached();
        }
        ActionBindable::from_handle(source.handle().lift(transform))
    }

    fn map_output<U: 'static>(&self, f: impl Fn(Self::Value) -> U + 'static) -> ActionBindable<U> {
        let f = Rc::new(f);
        self.lift_output(move |stream| {
            let f = Rc::clone(&f);
            stream.map(move |value| f(value))
        })
    }

    fn filter_output(
        &self,
        predicate: impl Fn(&Self::Value) -> bool + 'static,
    ) -> ActionBindable<Self::Value> {
        let predicate = Rc::new(predicate);
        self.lift_output(move |stream| {
            let predicate = Rc::clone(&predicate);
            stream.filter(move |value| predicate(value))
        })
    }

    fn filter_map_output<U: 'static>(
        &self,
        f: impl Fn(Self::Value) -> Option<U> + 'static,
    ) -> ActionBindable<U> {
        let f = Rc::new(f);
        self.lift_output(move |stream| {
            let f = Rc::clone(&f);
            stream.filter_map(move |value| f(value))
        })
    }

    /// Unwrap present values and drop absent ones.
    fn skip_none_output<W: 'static>(&self) -> ActionBindable<W>
    where
        Self: ActionBindableProvider<Value = Option<W>>,
    {
        self.lift_output(|stream| stream.skip_none())
    }
}

impl<P: ActionBindableProvider + ?Sized> OutputTransform for P {}
