//! Bridge registered native Rust types into QuickJS script contexts.
//!
//! Native classes are declared once with [`define_class`] and published to a
//! [`TypeRegistry`]. An [`ObjectMapper`] bound to a context then lets script
//! load them by name, construct instances, read and write properties and
//! call methods, while the mapper tracks every native object script can
//! reach and releases it when the script object is collected or the mapper
//! is torn down.
//!
//! ```no_run
//! use jsbridge::prelude::*;
//! use rquickjs::{Context, Runtime};
//!
//! struct Counter {
//!     value: i32,
//! }
//! native_type!(Counter);
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! define_class::<Counter>()
//!     .constructor(|value: i32| Counter { value })
//!     .property("value", |c: &Counter| c.value, |c: &mut Counter, v: i32| c.value = v)
//!     .method("bump", |c: &mut Counter, by: i32| {
//!         c.value += by;
//!         c.value
//!     })
//!     .register()?;
//!
//! let runtime = Runtime::new()?;
//! let context = Context::full(&runtime)?;
//! let mapper = ObjectMapper::new();
//! context.with(|ctx| -> jsbridge::Result<()> {
//!     mapper.initialize(&ctx)?;
//!     let total: i32 = ctx.eval(
//!         "const Counter = loadCppType('Counter'); new Counter(1).bump(41)",
//!     )?;
//!     assert_eq!(total, 42);
//!     Ok(())
//! })?;
//! mapper.uninitialize();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod mapper;

pub use config::{DEFAULT_HIDDEN_KEY, DEFAULT_LOADER_NAME, MapperConfig, RegistrySource};
pub use dispatch::ObjectTable;
pub use error::{MapperError, Result};
pub use mapper::{MapperPhase, ObjectMapper};

pub use jsbridge_core::native_type;
pub use jsbridge_core::{
    BridgeError, Cloned, Dynamic, ErrorCode, Handle, NativeError, NativeType, Owned,
    RegistrationError, TypeDescriptor, ValueKind,
};
pub use jsbridge_registry::{ClassBuilder, TypeRegistry, define_class};

pub mod prelude {
    pub use crate::{MapperConfig, MapperError, MapperPhase, ObjectMapper};
    pub use jsbridge_core::native_type;
    pub use jsbridge_core::{
        CallContext, Cloned, Dynamic, Handle, NativeError, NativeType, Owned, ValueKind,
    };
    pub use jsbridge_registry::{ClassBuilder, TypeRegistry, define_class};
}
