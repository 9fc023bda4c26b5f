//! Parameter and return kinds of bridged members.

use std::fmt;

use crate::TypeHash;
use crate::runtime::Dynamic;

/// The declared kind of a parameter, return value or property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    /// A handle to a wrapped native object of the named type.
    Object { hash: TypeHash, name: &'static str },
}

/// Coarse grouping used to detect ambiguous overload sets.
///
/// Two overloads whose parameters fall in the same class at every position
/// cannot be told apart by a script call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    Void,
    Bool,
    Number,
    String,
    Object(TypeHash),
}

impl ValueKind {
    /// Build an object kind for a bridged type name.
    pub fn object(name: &'static str) -> Self {
        ValueKind::Object {
            hash: TypeHash::from_name(name),
            name,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Void => "void",
            ValueKind::Bool => "bool",
            ValueKind::Int8 => "int8",
            ValueKind::Int16 => "int16",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Uint8 => "uint8",
            ValueKind::Uint16 => "uint16",
            ValueKind::Uint32 => "uint32",
            ValueKind::Uint64 => "uint64",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Object { name, .. } => name,
        }
    }

    pub const fn class(self) -> KindClass {
        match self {
            ValueKind::Void => KindClass::Void,
            ValueKind::Bool => KindClass::Bool,
            ValueKind::String => KindClass::String,
            ValueKind::Object { hash, .. } => KindClass::Object(hash),
            _ => KindClass::Number,
        }
    }

    /// Inclusive range of an integer kind.
    pub const fn int_bounds(self) -> Option<(i128, i128)> {
        match self {
            ValueKind::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            ValueKind::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            ValueKind::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            ValueKind::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            ValueKind::Uint8 => Some((0, u8::MAX as i128)),
            ValueKind::Uint16 => Some((0, u16::MAX as i128)),
            ValueKind::Uint32 => Some((0, u32::MAX as i128)),
            ValueKind::Uint64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Whether `value` can be converted to this kind.
    ///
    /// With `coerce` set, numbers and booleans are accepted for string
    /// parameters. Integers accept finite numbers whose truncated value fits.
    pub fn accepts(self, value: &Dynamic, coerce: bool) -> bool {
        match (self, value) {
            (ValueKind::Bool, Dynamic::Bool(_)) => true,
            (ValueKind::String, Dynamic::String(_)) => true,
            (ValueKind::String, Dynamic::Int(_) | Dynamic::Float(_) | Dynamic::Bool(_)) => coerce,
            (ValueKind::Double, Dynamic::Int(_) | Dynamic::Float(_)) => true,
            (ValueKind::Float, Dynamic::Int(_)) => true,
            (ValueKind::Float, Dynamic::Float(f)) => fits_f32(*f),
            (ValueKind::Object { hash, .. }, Dynamic::Object(handle)) => handle.type_hash == hash,
            (kind, Dynamic::Int(_) | Dynamic::Float(_)) => match kind.int_bounds() {
                Some((min, max)) => {
                    truncated(value).is_some_and(|v| (min..=max).contains(&v))
                }
                None => false,
            },
            _ => false,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Truncate a numeric value toward zero. `None` for NaN, infinities and
/// non-numbers.
pub(crate) fn truncated(value: &Dynamic) -> Option<i128> {
    match value {
        Dynamic::Int(v) => Some(i128::from(*v)),
        Dynamic::Float(f) if f.is_finite() => Some(f.trunc() as i128),
        _ => None,
    }
}

pub(crate) fn fits_f32(value: f64) -> bool {
    !value.is_finite() || value.abs() <= f64::from(f32::MAX)
}
