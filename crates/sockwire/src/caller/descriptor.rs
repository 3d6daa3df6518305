//! Type descriptors for handler parameters.
//!
//! Every payload parameter type implements [`EventArg`], which names the
//! coercion family the type belongs to. The family is read once when a
//! handler is bound.

use std::any::type_name;
use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channel::Channel;

/// Width and signedness of a numeric parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericKind {
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `isize`
    Isize,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

impl NumericKind {
    /// Inclusive integer range, or `None` for floating-point kinds.
    pub fn bounds(self) -> Option<(i128, i128)> {
        let range = match self {
            Self::I8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::I16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::I64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::Isize => (isize::MIN as i128, isize::MAX as i128),
            Self::U8 => (0, i128::from(u8::MAX)),
            Self::U16 => (0, i128::from(u16::MAX)),
            Self::U32 => (0, i128::from(u32::MAX)),
            Self::U64 => (0, i128::from(u64::MAX)),
            Self::Usize => (0, usize::MAX as i128),
            Self::F32 | Self::F64 => return None,
        };
        Some(range)
    }
}

/// Coercion family of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// The leading `&Channel` parameter.
    Context,
    /// Integer or floating-point number.
    Numeric(NumericKind),
    /// Structured record populated field by field from a JSON object.
    Record,
    /// Optional structured record (`None` for a JSON `null`).
    RecordRef,
    /// Any other type; the decoded value is handed to serde unchanged.
    PassThrough,
}

/// Name and coercion family of one declared parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Rust type name, used in error messages.
    pub name: &'static str,
    /// Coercion family.
    pub kind: ArgKind,
}

impl TypeDescriptor {
    /// Descriptor of the leading channel parameter.
    pub fn context() -> Self {
        Self {
            name: type_name::<Channel>(),
            kind: ArgKind::Context,
        }
    }

    /// Descriptor of a payload parameter type.
    pub fn of<T: EventArg>() -> Self {
        Self {
            name: type_name::<T>(),
            kind: T::KIND,
        }
    }
}

/// A type that can appear as a handler payload parameter or return value.
///
/// `Default` supplies the placeholder passed when a frame carries no
/// arguments. Implement this for your own structs with
/// `const KIND: ArgKind = ArgKind::Record;` to get field-wise population,
/// or wrap them in [`Record`].
pub trait EventArg: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Coercion family of this type.
    const KIND: ArgKind = ArgKind::PassThrough;

    /// Field template for record kinds: the serialized default value.
    fn record_template() -> Option<Map<String, Value>> {
        if !matches!(Self::KIND, ArgKind::Record) {
            return None;
        }
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

macro_rules! numeric_arg {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl EventArg for $ty {
                const KIND: ArgKind = ArgKind::Numeric(NumericKind::$kind);
            }
        )*
    };
}

numeric_arg! {
    i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize,
    f32 => F32, f64 => F64,
}

impl EventArg for bool {}
impl EventArg for String {}
impl EventArg for Value {}
impl EventArg for Map<String, Value> {}
impl<T: EventArg> EventArg for Vec<T> {}
impl<T: EventArg> EventArg for HashMap<String, T> {}
impl<T: EventArg> EventArg for BTreeMap<String, T> {}

const fn optional_kind(kind: ArgKind) -> ArgKind {
    match kind {
        ArgKind::Record | ArgKind::RecordRef => ArgKind::RecordRef,
        other => other,
    }
}

impl<T: EventArg> EventArg for Option<T> {
    const KIND: ArgKind = optional_kind(T::KIND);

    fn record_template() -> Option<Map<String, Value>> {
        T::record_template()
    }
}

/// Marks a struct parameter for field-wise population.
///
/// Fields present in the decoded object replace the defaults, unknown
/// fields are ignored and missing ones keep `T::default()`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record<T>(pub T);

impl<T> Record<T> {
    /// Unwrap the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> EventArg for Record<T>
where
    T: Serialize + DeserializeOwned + Default + Send + 'static,
{
    const KIND: ArgKind = ArgKind::Record;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn numeric_kinds() {
        assert_eq!(u8::KIND, ArgKind::Numeric(NumericKind::U8));
        assert_eq!(f64::KIND, ArgKind::Numeric(NumericKind::F64));
        assert_eq!(NumericKind::U8.bounds(), Some((0, 255)));
        assert_eq!(NumericKind::I8.bounds(), Some((-128, 127)));
        assert_eq!(NumericKind::F32.bounds(), None);
    }

    #[test]
    fn pass_through_kinds() {
        assert_eq!(bool::KIND, ArgKind::PassThrough);
        assert_eq!(String::KIND, ArgKind::PassThrough);
        assert_eq!(Value::KIND, ArgKind::PassThrough);
        assert_eq!(<Vec<u8>>::KIND, ArgKind::PassThrough);
    }

    #[test]
    fn record_kinds_and_template() {
        assert_eq!(<Record<Point>>::KIND, ArgKind::Record);
        assert_eq!(<Option<Record<Point>>>::KIND, ArgKind::RecordRef);
        assert_eq!(<Option<u8>>::KIND, ArgKind::Numeric(NumericKind::U8));

        let template = <Option<Record<Point>>>::record_template().unwrap();
        assert_eq!(template.get("x"), Some(&Value::from(0)));
        assert_eq!(template.len(), 2);
        assert!(String::record_template().is_none());
    }

    #[test]
    fn descriptor_names_type() {
        let desc = TypeDescriptor::of::<u16>();
        assert_eq!(desc.name, "u16");
        assert_eq!(TypeDescriptor::context().kind, ArgKind::Context);
        assert!(TypeDescriptor::context().name.ends_with("Channel"));
    }

    #[test]
    fn record_derefs() {
        let mut rec = Record(Point { x: 1, y: 2 });
        rec.x = 5;
        assert_eq!(rec.into_inner(), Point { x: 5, y: 2 });
    }
}
