#![forbid(unsafe_code)]

//! Two-way binding between reactive state and UI controls.
//!
//! A control exposes itself through a bindable:
//!
//! - [`ValueBindable<V>`] for controls that show and edit a value (text
//!   fields, sliders, toggles);
//! - [`ActionBindable<V>`] for controls that fire actions (buttons, menu
//!   items).
//!
//! Bindables hold the control weakly. Once the control is dropped they go
//! inert, and every binding made through them is torn down by the control's
//! [`Lifetime`](duplex_core::Lifetime).
//!
//! Reactive state is connected with [`bind_value`], [`bind_action`],
//! [`bind_trigger`], or the operand-order-independent [`BindWith`]:
//!
//! ```ignore
//! let name = Observable::new(String::new());
//! let save: Command<()> = Command::from_fn(|()| Ok(()));
//!
//! let _ = bind_value(&name, &name_field.value_bindable());
//! let _ = bind_trigger(&save, &save_button.action_bindable());
//! ```
//!
//! [`OutputTransform`] reshapes a control's event stream before binding,
//! keeping the control identity and enablement.

pub mod action;
pub mod dispatch;
pub mod handle;
pub mod scope;
pub mod target;
pub mod transform;
pub mod value;

pub use action::{ActionBindable, ActionBindableProvider};
pub use dispatch::{BindWith, Binding, Strategy, Trigger, bind_action, bind_trigger, bind_value};
pub use handle::BindableHandle;
pub use scope::BindingScope;
pub use target::{BindingTarget, RemoteBindingTarget, RemoteTargetKey};
pub use transform::OutputTransform;
pub use value::ValueBindable;
