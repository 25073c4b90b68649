#![forbid(unsafe_code)]

//! Reactive collaborators for the duplex binding protocol.
//!
//! This crate provides the single-threaded reactive substrate that control
//! bindings are layered on:
//!
//! - [`Observable`] / [`Property`]: version-tracked cells with change
//!   notification, and their read-only view.
//! - [`EventStream`] / [`pipe`]: lazy, multi-subscriber event streams with
//!   `map`/`filter`/`filter_map`/`skip_none` and completion.
//! - [`Subscription`] and [`Disposable`]: RAII guards and shared cancellation
//!   tokens.
//! - [`Lifetime`] / [`LifetimeToken`] / [`Control`]: deterministic
//!   end-of-life notification for controls.
//! - [`UiScheduler`] / [`RemoteScheduler`]: FIFO serialization of control
//!   mutations on the UI thread, with a cross-thread entrance.
//! - [`Command`] / [`ActionStates`]: invocable work with observable
//!   enablement.
//!
//! # Architecture
//!
//! Everything here uses `Rc<RefCell<..>>` for shared ownership and lives on
//! the UI thread. Sources keep `Weak` references to their subscribers and
//! prune dead entries lazily, so dropping a [`Subscription`] is all it takes
//! to disconnect. The only `Send` type is [`RemoteScheduler`], which posts
//! jobs back to the UI thread.

pub mod command;
pub mod config;
pub mod disposable;
pub mod error;
pub mod lifetime;
pub mod observable;
pub mod scheduler;
pub mod stream;

pub use command::{ActionStates, Command};
pub use config::SchedulerConfig;
pub use disposable::Disposable;
pub use error::{CommandError, ConfigError, SchedulerError};
pub use lifetime::{Control, Lifetime, LifetimeToken};
pub use observable::{Observable, Property, Subscription};
pub use scheduler::{RemoteScheduler, UiScheduler};
pub use stream::{Event, EventSink, EventStream, Observer, pipe};
