//! ClassBuilder for declaring the script surface of a native type.
//!
//! # Example
//!
//! ```
//! use jsbridge_registry::{TypeRegistry, define_class};
//!
//! struct TestClass {
//!     x: i32,
//! }
//! jsbridge_core::native_type!(TestClass);
//!
//! impl TestClass {
//!     fn new(x: i32) -> Self {
//!         Self { x }
//!     }
//!
//!     fn add(&self, a: i32, b: i32) -> i32 {
//!         a + b
//!     }
//! }
//!
//! let registry = TypeRegistry::new();
//! define_class::<TestClass>()
//!     .constructor(TestClass::new)
//!     .function("Print", |msg: String| println!("{msg}"))
//!     .property("X", |t: &TestClass| t.x, |t: &mut TestClass, x: i32| t.x = x)
//!     .method("Add", TestClass::add)
//!     .register_into(&registry)
//!     .unwrap();
//!
//! assert!(registry.lookup_type::<TestClass>().is_some());
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use jsbridge_core::{
    CallContext, Destructor, FromArg, NativeError, NativeFn, NativeReturn, NativeType, Overload,
    PropertyDescriptor, RegistrationError, TypeDescriptor, ValueKind, ValueType,
};

use crate::TypeRegistry;
use crate::adapters::{IntoConstructor, IntoFunction, IntoMethod};

/// Builder for the script-visible members of `T`.
///
/// Members accumulate in declaration order, which is also the order overload
/// resolution tries them. [`register`](Self::register) consumes the builder,
/// so nothing can be added to a published type.
pub struct ClassBuilder<T: NativeType> {
    /// Members declared so far
    descriptor: TypeDescriptor,
    /// Problems found while declaring, reported by `build`
    errors: Vec<RegistrationError>,
    _marker: PhantomData<fn() -> T>,
}

/// Start declaring `T`. Shorthand for [`ClassBuilder::new`].
pub fn define_class<T: NativeType>() -> ClassBuilder<T> {
    ClassBuilder::new()
}

impl<T: NativeType> ClassBuilder<T> {
    /// An empty builder for `T`.
    pub fn new() -> Self {
        Self {
            descriptor: TypeDescriptor::new::<T>(),
            errors: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn accept_name(&mut self, name: &str, what: &'static str) -> bool {
        if name.is_empty() {
            self.errors.push(RegistrationError::EmptyName {
                type_name: T::NAME.to_owned(),
                what,
            });
            return false;
        }
        true
    }

    /// Add a constructor overload.
    pub fn constructor<M, F>(mut self, f: F) -> Self
    where
        F: IntoConstructor<T, M>,
    {
        self.descriptor.add_constructor(f.into_overload());
        self
    }

    /// Add a constructor working directly on the call context.
    ///
    /// The invoker must [`adopt`](CallContext::adopt) the new instance and
    /// set the resulting handle as its return value.
    pub fn constructor_raw<F>(mut self, params: &[ValueKind], f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        let overload = Overload::new(params.to_vec(), ValueKind::object(T::NAME), NativeFn::new(f));
        self.descriptor.add_constructor(overload);
        self
    }

    /// Add a static function overload, reachable as `Class.name(...)`.
    pub fn function<M, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoFunction<M>,
    {
        if self.accept_name(name, "function") {
            self.descriptor.add_function(name, f.into_overload());
        }
        self
    }

    /// Add a static function working directly on the call context.
    pub fn function_raw<F>(mut self, name: &str, params: &[ValueKind], ret: ValueKind, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        if self.accept_name(name, "function") {
            let overload = Overload::new(params.to_vec(), ret, NativeFn::new(f));
            self.descriptor.add_function(name, overload);
        }
        self
    }

    /// Add an instance method overload taking `&T` or `&mut T`.
    pub fn method<M, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoMethod<T, M>,
    {
        if self.accept_name(name, "method") {
            self.descriptor.add_method(name, f.into_overload());
        }
        self
    }

    /// Add an instance method working directly on the call context. The
    /// receiver is reached through [`CallContext::with_this`].
    pub fn method_raw<F>(mut self, name: &str, params: &[ValueKind], ret: ValueKind, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        if self.accept_name(name, "method") {
            let overload = Overload::new(params.to_vec(), ret, NativeFn::new(f));
            self.descriptor.add_method(name, overload);
        }
        self
    }

    /// Add a read-write property backed by a getter and a setter.
    pub fn property<V, G, S>(self, name: &str, getter: G, setter: S) -> Self
    where
        V: FromArg + NativeReturn + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let setter = NativeFn::new(move |ctx: &mut CallContext<'_>| {
            let value = V::from_arg(ctx, 0)?;
            ctx.with_this_mut::<T, _>(|this| setter(this, value))
        });
        self.add_property::<V, G>(name, getter, Some(setter))
    }

    /// Add a property scripts can read but not assign.
    pub fn property_readonly<V, G>(self, name: &str, getter: G) -> Self
    where
        V: NativeReturn + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.add_property::<V, G>(name, getter, None)
    }

    fn add_property<V, G>(mut self, name: &str, getter: G, setter: Option<NativeFn>) -> Self
    where
        V: NativeReturn + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        if !self.accept_name(name, "property") {
            return self;
        }
        let getter = NativeFn::new(move |ctx: &mut CallContext<'_>| {
            let value = ctx.with_this::<T, _>(|this| getter(this))?;
            let value = value.into_return(ctx)?;
            ctx.set_return_slot(value);
            Ok(())
        });
        let property = PropertyDescriptor {
            kind: <V as ValueType>::value_kind(),
            getter,
            setter,
        };
        if self.descriptor.add_property(name, property).is_some() {
            self.errors.push(RegistrationError::Conflict {
                type_name: T::NAME.to_owned(),
                member: name.to_owned(),
                detail: "property declared twice".to_owned(),
            });
        }
        self
    }

    /// Run `f` on an owned instance right before the bridge drops it.
    pub fn destructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let hook: Destructor = Arc::new(move |instance: &mut (dyn Any + Send + Sync)| {
            if let Some(value) = instance.downcast_mut::<T>() {
                f(value);
            }
        });
        self.descriptor.set_destructor(hook);
        self
    }

    /// Validate and return the descriptor without publishing it.
    pub fn build(self) -> Result<TypeDescriptor, RegistrationError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        self.descriptor.validate()?;
        Ok(self.descriptor)
    }

    /// Validate and publish into the process-wide registry.
    pub fn register(self) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        self.register_into(TypeRegistry::global())
    }

    /// Validate and publish into `registry`.
    pub fn register_into(
        self,
        registry: &TypeRegistry,
    ) -> Result<Arc<TypeDescriptor>, RegistrationError> {
        let descriptor = self.build()?;
        Ok(registry.register(descriptor))
    }
}

impl<T: NativeType> Default for ClassBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
