//! Conversion between [`Dynamic`] values and typed Rust values.
//!
//! [`FromDynamic`] and [`IntoDynamic`] cover values that stand alone
//! (primitives and strings). [`FromArg`] and [`NativeReturn`] are what typed
//! invokers use: they additionally see the [`CallContext`], so object
//! parameters can be borrowed from the heap and object returns can be
//! adopted into it.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{ConversionError, NativeError};
use crate::runtime::{CallContext, Dynamic, ObjectHandle};
use crate::value_kind::{ValueKind, fits_f32, truncated};
use crate::TypeHash;

/// A native type that can be bridged to script.
///
/// Implemented with the [`native_type!`](crate::native_type) macro, which
/// fixes the script-visible name.
pub trait NativeType: Send + Sync + 'static {
    const NAME: &'static str;

    fn type_hash() -> TypeHash {
        TypeHash::from_name(Self::NAME)
    }
}

/// Declare a Rust type as bridgeable, optionally under a different script name.
///
/// ```
/// struct TestClass { x: i32 }
/// jsbridge_core::native_type!(TestClass);
///
/// struct Inner;
/// jsbridge_core::native_type!(Inner, "Outer.Inner");
///
/// use jsbridge_core::NativeType;
/// assert_eq!(TestClass::NAME, "TestClass");
/// assert_eq!(Inner::NAME, "Outer.Inner");
/// ```
#[macro_export]
macro_rules! native_type {
    ($ty:ty) => {
        $crate::native_type!($ty, stringify!($ty));
    };
    ($ty:ty, $name:expr) => {
        impl $crate::NativeType for $ty {
            const NAME: &'static str = $name;
        }
    };
}

/// Types with a declared [`ValueKind`].
pub trait ValueType {
    fn value_kind() -> ValueKind;
}

/// Convert a [`Dynamic`] to a Rust value.
pub trait FromDynamic: ValueType + Sized {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a Rust value to a [`Dynamic`].
pub trait IntoDynamic: ValueType {
    fn into_dynamic(self) -> Dynamic;
}

/// A parameter of a typed invoker.
pub trait FromArg: ValueType + Sized {
    fn from_arg(ctx: &CallContext<'_>, index: usize) -> Result<Self, NativeError>;
}

/// The return value of a typed invoker.
pub trait NativeReturn: ValueType {
    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError>;
}

fn integral(value: &Dynamic, kind: ValueKind) -> Result<i128, ConversionError> {
    match value {
        Dynamic::Int(_) | Dynamic::Float(_) => truncated(value).ok_or(
            ConversionError::FloatConversion {
                value: value.as_number().unwrap_or(f64::NAN),
                target_type: kind.name(),
            },
        ),
        other => Err(ConversionError::TypeMismatch {
            expected: kind.name(),
            actual: other.type_name(),
        }),
    }
}

fn number(value: &Dynamic, kind: ValueKind) -> Result<f64, ConversionError> {
    value.as_number().ok_or(ConversionError::TypeMismatch {
        expected: kind.name(),
        actual: value.type_name(),
    })
}

/// Implements the four value traits plus `Result<T, NativeError>` returns
/// for a standalone value type.
macro_rules! impl_bridged_value {
    ($($ty:ty),* $(,)?) => {
        $(
        impl FromArg for $ty {
            fn from_arg(ctx: &CallContext<'_>, index: usize) -> Result<Self, NativeError> {
                ctx.arg(index)
            }
        }

        impl NativeReturn for $ty {
            fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
                Ok(self.into_dynamic())
            }
        }

        impl ValueType for Result<$ty, NativeError> {
            fn value_kind() -> ValueKind {
                <$ty as ValueType>::value_kind()
            }
        }

        impl NativeReturn for Result<$ty, NativeError> {
            fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
                self.map(IntoDynamic::into_dynamic)
            }
        }
        )*
    };
}

macro_rules! impl_integer {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
        impl ValueType for $ty {
            fn value_kind() -> ValueKind {
                ValueKind::$kind
            }
        }

        impl FromDynamic for $ty {
            fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
                let whole = integral(value, ValueKind::$kind)?;
                <$ty>::try_from(whole).map_err(|_| ConversionError::IntegerOverflow {
                    value: value.to_string(),
                    target_type: ValueKind::$kind.name(),
                })
            }
        }

        impl IntoDynamic for $ty {
            fn into_dynamic(self) -> Dynamic {
                match i64::try_from(self) {
                    Ok(v) => Dynamic::Int(v),
                    Err(_) => Dynamic::Float(self as f64),
                }
            }
        }

        impl_bridged_value!($ty);
        )*
    };
}

impl_integer!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
);

impl ValueType for f64 {
    fn value_kind() -> ValueKind {
        ValueKind::Double
    }
}

impl FromDynamic for f64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        number(value, ValueKind::Double)
    }
}

impl IntoDynamic for f64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self)
    }
}

impl ValueType for f32 {
    fn value_kind() -> ValueKind {
        ValueKind::Float
    }
}

impl FromDynamic for f32 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        let v = number(value, ValueKind::Float)?;
        if fits_f32(v) {
            Ok(v as f32)
        } else {
            Err(ConversionError::FloatConversion {
                value: v,
                target_type: "float",
            })
        }
    }
}

impl IntoDynamic for f32 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(f64::from(self))
    }
}

impl ValueType for bool {
    fn value_kind() -> ValueKind {
        ValueKind::Bool
    }
}

impl FromDynamic for bool {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Bool(v) => Ok(*v),
            other => Err(ConversionError::TypeMismatch {
                expected: "bool",
                actual: other.type_name(),
            }),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl ValueType for String {
    fn value_kind() -> ValueKind {
        ValueKind::String
    }
}

/// Strings accept numbers and booleans, formatted the way script does.
impl FromDynamic for String {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            Dynamic::Int(_) | Dynamic::Float(_) | Dynamic::Bool(_) => Ok(value.to_string()),
            other => Err(ConversionError::TypeMismatch {
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

impl_bridged_value!(f32, f64, bool, String);

impl ValueType for &'static str {
    fn value_kind() -> ValueKind {
        ValueKind::String
    }
}

impl IntoDynamic for &'static str {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_owned())
    }
}

impl NativeReturn for &'static str {
    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(self.into_dynamic())
    }
}

impl ValueType for () {
    fn value_kind() -> ValueKind {
        ValueKind::Void
    }
}

impl IntoDynamic for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Void
    }
}

impl NativeReturn for () {
    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Void)
    }
}

impl ValueType for Result<(), NativeError> {
    fn value_kind() -> ValueKind {
        ValueKind::Void
    }
}

impl NativeReturn for Result<(), NativeError> {
    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        self.map(|()| Dynamic::Void)
    }
}

/// A typed handle to a wrapped native object.
///
/// As a parameter it accepts only objects of type `T`; as a return value it
/// hands an existing wrapper back to script without copying the instance.
pub struct Handle<T> {
    raw: ObjectHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NativeType> Handle<T> {
    /// Check that `raw` refers to a `T` and wrap it.
    pub fn from_raw(raw: ObjectHandle) -> Result<Self, ConversionError> {
        if raw.type_id == TypeId::of::<T>() {
            Ok(Self::from_handle(raw))
        } else {
            Err(ConversionError::ObjectTypeMismatch {
                expected: T::NAME,
                actual: raw.type_hash.to_string(),
            })
        }
    }

    pub(crate) fn from_handle(raw: ObjectHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn raw(&self) -> ObjectHandle {
        self.raw
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T: NativeType> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &T::NAME)
            .field("index", &self.raw.index)
            .field("generation", &self.raw.generation)
            .finish()
    }
}

impl<T: NativeType> ValueType for Handle<T> {
    fn value_kind() -> ValueKind {
        ValueKind::object(T::NAME)
    }
}

impl<T: NativeType> FromDynamic for Handle<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Object(raw) => Self::from_raw(*raw),
            other => Err(ConversionError::TypeMismatch {
                expected: T::NAME,
                actual: other.type_name(),
            }),
        }
    }
}

impl<T: NativeType> IntoDynamic for Handle<T> {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Object(self.raw)
    }
}

impl<T: NativeType> FromArg for Handle<T> {
    fn from_arg(ctx: &CallContext<'_>, index: usize) -> Result<Self, NativeError> {
        ctx.arg(index)
    }
}

impl<T: NativeType> NativeReturn for Handle<T> {
    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(self.into_dynamic())
    }
}

/// Parameter that receives a clone of a native object argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Cloned<T>(pub T);

impl<T: NativeType + Clone> ValueType for Cloned<T> {
    fn value_kind() -> ValueKind {
        ValueKind::object(T::NAME)
    }
}

impl<T: NativeType + Clone> FromArg for Cloned<T> {
    fn from_arg(ctx: &CallContext<'_>, index: usize) -> Result<Self, NativeError> {
        let handle: Handle<T> = ctx.arg(index)?;
        ctx.with_object(handle, T::clone).map(Cloned)
    }
}

/// Return value that moves a new native instance into script ownership.
#[derive(Debug, Clone, PartialEq)]
pub struct Owned<T>(pub T);

impl<T: NativeType> ValueType for Owned<T> {
    fn value_kind() -> ValueKind {
        ValueKind::object(T::NAME)
    }
}

impl<T: NativeType> NativeReturn for Owned<T> {
    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        ctx.adopt(self.0).map(IntoDynamic::into_dynamic)
    }
}

impl<T: NativeType> ValueType for Result<Owned<T>, NativeError> {
    fn value_kind() -> ValueKind {
        ValueKind::object(T::NAME)
    }
}

impl<T: NativeType> NativeReturn for Result<Owned<T>, NativeError> {
    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        self?.into_return(ctx)
    }
}
