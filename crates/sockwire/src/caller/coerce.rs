//! Argument coercion strategies.
//!
//! JSON has a single number type, so a decoded `3.0` must be narrowed
//! before serde will accept it as a `u8`. Records are rebuilt from their
//! default field set so unknown keys drop out and missing keys keep their
//! default. Everything else is handed to serde as decoded; a shape
//! mismatch then surfaces as a deserialization error at dispatch.

use serde_json::{Map, Number, Value};

use super::descriptor::{ArgKind, EventArg, NumericKind};

/// Coercion applied to one parameter, chosen once at bind time.
#[derive(Clone, Debug, PartialEq)]
pub enum Strategy {
    /// Narrow or widen a JSON number to the target width.
    Numeric(NumericKind),
    /// Populate a record from an object, field by field.
    Record {
        /// Serialized default value of the record.
        template: Option<Map<String, Value>>,
        /// `null` stays `null` instead of becoming the default record.
        optional: bool,
    },
    /// Leave the value as decoded.
    PassThrough,
}

impl Strategy {
    /// Strategy for parameter type `T`.
    pub fn for_type<T: EventArg>() -> Self {
        match T::KIND {
            ArgKind::Numeric(kind) => Self::Numeric(kind),
            ArgKind::Record => Self::Record {
                template: T::record_template(),
                optional: false,
            },
            ArgKind::RecordRef => Self::Record {
                template: T::record_template(),
                optional: true,
            },
            ArgKind::Context | ArgKind::PassThrough => Self::PassThrough,
        }
    }

    /// Convert one decoded value toward the parameter's type.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (Self::Numeric(kind), Value::Number(n)) => narrow(&n, *kind),
            (
                Self::Record {
                    template: Some(template),
                    ..
                },
                Value::Object(fields),
            ) => Value::Object(overlay(template, fields)),
            (
                Self::Record {
                    template: Some(template),
                    optional: false,
                },
                Value::Null,
            ) => Value::Object(template.clone()),
            (_, value) => value,
        }
    }
}

/// Convert a JSON number to the target kind.
///
/// Integer targets truncate toward zero and saturate at the target's range.
fn narrow(n: &Number, kind: NumericKind) -> Value {
    match kind.bounds() {
        Some((min, max)) => {
            let whole = if let Some(i) = n.as_i64() {
                i128::from(i)
            } else if let Some(u) = n.as_u64() {
                i128::from(u)
            } else {
                n.as_f64().map_or(0, |f| f.trunc() as i128)
            };
            let clamped = whole.clamp(min, max);
            if clamped < 0 {
                Value::from(clamped as i64)
            } else {
                Value::from(clamped as u64)
            }
        }
        None => {
            let f = n.as_f64().unwrap_or_default();
            if kind == NumericKind::F32 {
                Value::from(f as f32)
            } else {
                Value::from(f)
            }
        }
    }
}

/// Copy the template, replacing each field the decoded object also has.
///
/// A float decoded for a field whose default is an integer is truncated
/// toward zero; range checks are left to the field's own type.
fn overlay(template: &Map<String, Value>, mut fields: Map<String, Value>) -> Map<String, Value> {
    template
        .iter()
        .map(|(key, default)| {
            let value = match fields.remove(key) {
                Some(Value::Number(n)) if is_integer(default) => truncate(&n),
                Some(value) => value,
                None => default.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn is_integer(value: &Value) -> bool {
    matches!(value, Value::Number(n) if !n.is_f64())
}

fn truncate(n: &Number) -> Value {
    match n.as_f64() {
        Some(f) if n.is_f64() && f < 0.0 => Value::from(f.trunc() as i64),
        Some(f) if n.is_f64() => Value::from(f.trunc() as u64),
        _ => Value::Number(n.clone()),
    }
}
