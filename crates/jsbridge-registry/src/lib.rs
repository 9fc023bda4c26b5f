//! Type descriptor registry and class binder for jsbridge.
//!
//! - [`TypeRegistry`]: process-wide (or private) table of published
//!   [`TypeDescriptor`](jsbridge_core::TypeDescriptor)s
//! - [`ClassBuilder`]: fluent declaration of a native type's constructors,
//!   methods, static functions and properties
//! - [`adapters`]: the traits turning typed closures into overloads

pub mod adapters;
mod class_builder;
mod registry;

pub use adapters::{IntoConstructor, IntoFunction, IntoMethod};
pub use class_builder::{ClassBuilder, define_class};
pub use registry::TypeRegistry;
