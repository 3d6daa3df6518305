//! Handler binding and argument coercion.
//!
//! - [`descriptor`]: what kind of value each parameter type expects
//! - [`coerce`]: how a decoded JSON value is converted toward that type
//! - [`handler`]: the [`Handler`] trait over plain functions
//! - [`binding`]: [`Caller`], a validated, reusable binding

pub mod binding;
pub mod coerce;
pub mod descriptor;
pub mod handler;

pub use binding::Caller;
pub use coerce::Strategy;
pub use descriptor::{ArgKind, EventArg, NumericKind, Record, TypeDescriptor};
pub use handler::{Handler, IntoResults, ParamSpec, Signature};
