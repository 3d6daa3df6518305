//! The [`Handler`] trait and its implementations for plain functions.
//!
//! A handler is any `Fn(&Channel, T1, .., Tn) -> R` where every `Ti` is an
//! [`EventArg`] and `R` is `()`, one [`EventArg`], or a tuple of them (the
//! last being rejected at bind time). The `Args` type parameter only
//! disambiguates the implementations.

use std::any::type_name;

use serde_json::Value;

use super::coerce::Strategy;
use super::descriptor::{EventArg, TypeDescriptor};
use crate::channel::Channel;
use crate::errors::DispatchError;

/// One declared input: its descriptor, coercion strategy and placeholder.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    /// Declared type.
    pub descriptor: TypeDescriptor,
    /// Coercion applied before deserialization.
    pub strategy: Strategy,
    /// Serialized `Default` value used when a frame carries no arguments.
    pub zero: Value,
}

impl ParamSpec {
    /// The leading channel parameter.
    pub fn context() -> Self {
        Self {
            descriptor: TypeDescriptor::context(),
            strategy: Strategy::PassThrough,
            zero: Value::Null,
        }
    }

    /// A payload parameter of type `T`.
    pub fn of<T: EventArg>() -> Self {
        let strategy = Strategy::for_type::<T>();
        let zero = serde_json::to_value(T::default()).unwrap_or(Value::Null);
        Self {
            descriptor: TypeDescriptor::of::<T>(),
            strategy,
            zero,
        }
    }
}

/// Declared shape of a handler.
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    /// All declared inputs, including the leading channel parameter.
    pub inputs: Vec<ParamSpec>,
    /// Number of declared return values.
    pub outputs: usize,
}

/// Something that can be bound to an event name.
pub trait Handler<Args>: Send + Sync + 'static {
    /// Declared inputs and outputs.
    fn signature() -> Signature;

    /// Invoke with already-coerced payload arguments (one per declared
    /// payload parameter).
    fn call(&self, channel: &Channel, args: Vec<Value>) -> Result<Option<Value>, DispatchError>;
}

/// Handler return types.
pub trait IntoResults {
    /// Number of declared return values.
    const COUNT: usize;

    /// Convert into the dispatch result.
    fn into_results(self) -> Result<Option<Value>, DispatchError>;
}

impl IntoResults for () {
    const COUNT: usize = 0;

    fn into_results(self) -> Result<Option<Value>, DispatchError> {
        Ok(None)
    }
}

impl<T: EventArg> IntoResults for T {
    const COUNT: usize = 1;

    fn into_results(self) -> Result<Option<Value>, DispatchError> {
        Ok(Some(serde_json::to_value(self)?))
    }
}

impl<A: EventArg, B: EventArg> IntoResults for (A, B) {
    const COUNT: usize = 2;

    fn into_results(self) -> Result<Option<Value>, DispatchError> {
        Ok(Some(serde_json::to_value(self)?))
    }
}

impl<A: EventArg, B: EventArg, C: EventArg> IntoResults for (A, B, C) {
    const COUNT: usize = 3;

    fn into_results(self) -> Result<Option<Value>, DispatchError> {
        Ok(Some(serde_json::to_value(self)?))
    }
}

/// Deserialize the next payload argument, naming its index on failure.
fn take_arg<T: EventArg>(
    args: &mut impl Iterator<Item = Value>,
    index: &mut usize,
) -> Result<T, DispatchError> {
    let position = *index;
    *index += 1;
    let value = args.next().unwrap_or_default();
    serde_json::from_value(value).map_err(|e| DispatchError::Coercion {
        index: position,
        target: type_name::<T>(),
        reason: e.to_string(),
    })
}

impl<F, R> Handler<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoResults,
{
    fn signature() -> Signature {
        Signature {
            inputs: Vec::new(),
            outputs: R::COUNT,
        }
    }

    fn call(&self, _channel: &Channel, _args: Vec<Value>) -> Result<Option<Value>, DispatchError> {
        self().into_results()
    }
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($ty,)*> Handler<(Channel, $($ty,)*)> for F
        where
            F: Fn(&Channel, $($ty,)*) -> R + Send + Sync + 'static,
            R: IntoResults,
            $($ty: EventArg,)*
        {
            fn signature() -> Signature {
                Signature {
                    inputs: vec![ParamSpec::context(), $(ParamSpec::of::<$ty>(),)*],
                    outputs: R::COUNT,
                }
            }

            fn call(
                &self,
                channel: &Channel,
                args: Vec<Value>,
            ) -> Result<Option<Value>, DispatchError> {
                let mut args = args.into_iter();
                let mut index = 0;
                $(let $ty = take_arg::<$ty>(&mut args, &mut index)?;)*
                self(channel, $($ty,)*).into_results()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::caller::descriptor::ArgKind;

    fn signature_of<Args, H: Handler<Args>>(_h: &H) -> Signature {
        H::signature()
    }

    fn greet(_ch: &Channel, name: String, times: u8) -> String {
        name.repeat(usize::from(times))
    }

    #[test]
    fn signature_lists_context_then_payload() {
        let sig = signature_of(&greet);
        assert_eq!(sig.inputs.len(), 3);
        assert_eq!(sig.inputs[0].descriptor.kind, ArgKind::Context);
        assert_eq!(sig.inputs[1].descriptor.name, "alloc::string::String");
        assert_eq!(sig.inputs[2].zero, json!(0));
        assert_eq!(sig.outputs, 1);
    }

    #[test]
    fn call_deserializes_in_order() {
        let (ch, _rx) = Channel::new("t", 4);
        let out = Handler::<(Channel, String, u8)>::call(&greet, &ch, vec![json!("ab"), json!(2)])
            .unwrap();
        assert_eq!(out, Some(json!("abab")));
    }

    #[test]
    fn call_reports_failing_index() {
        let (ch, _rx) = Channel::new("t", 4);
        let err =
            Handler::<(Channel, String, u8)>::call(&greet, &ch, vec![json!("ab"), json!("x")])
                .unwrap_err();
        assert_matches!(err, DispatchError::Coercion { index: 1, target: "u8", .. });
    }

    #[test]
    fn unit_return_has_no_outputs() {
        let sig = signature_of(&|_ch: &Channel| {});
        assert_eq!(sig.outputs, 0);
        assert_eq!(sig.inputs.len(), 1);
    }

    #[test]
    fn tuple_return_counts_outputs() {
        let sig = signature_of(&|_ch: &Channel| (1u8, 2u8));
        assert_eq!(sig.outputs, 2);
    }

    #[test]
    fn no_parameter_handler_has_no_inputs() {
        let sig = signature_of(&|| 5u32);
        assert!(sig.inputs.is_empty());
    }
}
