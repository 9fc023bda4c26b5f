//! Typed adapters turning Rust closures into overloads.
//!
//! Each trait is implemented for closures and function items of up to six
//! bridged parameters. The `Marker` parameter only exists so the impls for
//! different arities and receiver kinds do not overlap; callers never name it.

use jsbridge_core::{
    CallContext, FromArg, NativeError, NativeFn, NativeReturn, NativeType, Overload, ValueKind,
    ValueType,
};

/// A static function: `Fn(A1..An) -> R`.
pub trait IntoFunction<Marker>: Send + Sync + 'static {
    fn into_overload(self) -> Overload;
}

/// An instance method: `Fn(&T, A1..An) -> R` or `Fn(&mut T, A1..An) -> R`.
pub trait IntoMethod<T, Marker>: Send + Sync + 'static {
    fn into_overload(self) -> Overload;
}

/// A constructor: `Fn(A1..An) -> T`.
pub trait IntoConstructor<T, Marker>: Send + Sync + 'static {
    fn into_overload(self) -> Overload;
}

#[doc(hidden)]
pub struct ByRef;

#[doc(hidden)]
pub struct ByMut;

fn finish<R: NativeReturn>(ctx: &mut CallContext<'_>, value: R) -> Result<(), NativeError> {
    let value = value.into_return(ctx)?;
    ctx.set_return_slot(value);
    Ok(())
}

macro_rules! impl_adapters {
    ($($arg:ident $val:ident $idx:tt),*) => {
        impl<F, R, $($arg,)*> IntoFunction<(R, $($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: NativeReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn into_overload(self) -> Overload {
                let params = vec![$(<$arg as ValueType>::value_kind()),*];
                let invoker = NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $val = $arg::from_arg(ctx, $idx)?;)*
                    finish(ctx, (self)($($val),*))
                });
                Overload::new(params, R::value_kind(), invoker)
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethod<T, (ByRef, R, $($arg,)*)> for F
        where
            T: NativeType,
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            R: NativeReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn into_overload(self) -> Overload {
                let params = vec![$(<$arg as ValueType>::value_kind()),*];
                let invoker = NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $val = $arg::from_arg(ctx, $idx)?;)*
                    let result = ctx.with_this::<T, _>(|this| (self)(this, $($val),*))?;
                    finish(ctx, result)
                });
                Overload::new(params, R::value_kind(), invoker)
            }
        }

        impl<T, F, R, $($arg,)*> IntoMethod<T, (ByMut, R, $($arg,)*)> for F
        where
            T: NativeType,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: NativeReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn into_overload(self) -> Overload {
                let params = vec![$(<$arg as ValueType>::value_kind()),*];
                let invoker = NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $val = $arg::from_arg(ctx, $idx)?;)*
                    let result = ctx.with_this_mut::<T, _>(|this| (self)(this, $($val),*))?;
                    finish(ctx, result)
                });
                Overload::new(params, R::value_kind(), invoker)
            }
        }

        impl<T, F, $($arg,)*> IntoConstructor<T, ($($arg,)*)> for F
        where
            T: NativeType,
            F: Fn($($arg),*) -> T + Send + Sync + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn into_overload(self) -> Overload {
                let params = vec![$(<$arg as ValueType>::value_kind()),*];
                let invoker = NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $val = $arg::from_arg(ctx, $idx)?;)*
                    let handle = ctx.adopt((self)($($val),*))?;
                    ctx.set_return(handle);
                    Ok(())
                });
                Overload::new(params, ValueKind::object(T::NAME), invoker)
            }
        }
    };
}

impl_adapters!();
impl_adapters!(A0 a0 0);
impl_adapters!(A0 a0 0, A1 a1 1);
impl_adapters!(A0 a0 0, A1 a1 1, A2 a2 2);
impl_adapters!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3);
impl_adapters!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4);
impl_adapters!(A0 a0 0, A1 a1 1, A2 a2 2, A3 a3 3, A4 a4 4, A5 a5 5);
