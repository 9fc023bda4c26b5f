//! Published bridging metadata for one native type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::error::RegistrationError;
use crate::runtime::{Dynamic, NativeFn};
use crate::value_kind::ValueKind;
use crate::{NativeType, TypeHash};

/// Hook run on an owned instance right before it is dropped.
pub type Destructor = Arc<dyn Fn(&mut (dyn Any + Send + Sync)) + Send + Sync>;

/// One callable signature of a constructor, method or static function.
#[derive(Debug, Clone)]
pub struct Overload {
    /// Declared parameter kinds, in call order
    pub params: Vec<ValueKind>,
    /// Declared return kind
    pub ret: ValueKind,
    /// Native code run when this overload is selected
    pub invoker: NativeFn,
}

impl Overload {
    pub fn new(params: Vec<ValueKind>, ret: ValueKind, invoker: NativeFn) -> Self {
        Self {
            params,
            ret,
            invoker,
        }
    }

    /// Number of declared parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Whether every argument converts to its parameter.
    pub fn accepts(&self, args: &[Dynamic], coerce: bool) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(kind, arg)| kind.accepts(arg, coerce))
    }

    /// First argument that does not convert, with its position.
    pub fn first_mismatch<'a>(&self, args: &'a [Dynamic]) -> Option<(usize, ValueKind, &'a Dynamic)> {
        self.params
            .iter()
            .zip(args)
            .enumerate()
            .find(|(_, (kind, arg))| !kind.accepts(arg, true))
            .map(|(index, (kind, arg))| (index, *kind, arg))
    }

    /// Parameter list as `(int32, string)`.
    pub fn signature(&self) -> String {
        signature(self.params.iter().map(|kind| kind.name()))
    }

    fn is_ambiguous_with(&self, other: &Overload) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.class() == b.class())
    }
}

/// Format a list of kind or value names as a parenthesized signature.
pub fn signature<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.into_iter().collect();
    format!("({})", names.join(", "))
}

/// Outcome of overload resolution against one call site.
#[derive(Debug)]
pub enum Resolution<'o> {
    /// This overload accepts the call.
    Found(&'o Overload),
    /// The only overload with the call's arity rejected an argument.
    Mismatch(&'o Overload),
    /// No overload has the call's arity, or several do and none accepts.
    NoMatch,
}

/// Pick an overload for `args`.
///
/// Two passes in declaration order: the first requires every argument to
/// match exactly, the second lets numbers and booleans coerce to strings.
pub fn resolve_overload<'o>(overloads: &'o [Overload], args: &[Dynamic]) -> Resolution<'o> {
    for coerce in [false, true] {
        if let Some(found) = overloads.iter().find(|o| o.accepts(args, coerce)) {
            return Resolution::Found(found);
        }
    }
    let mut same_arity = overloads.iter().filter(|o| o.arity() == args.len());
    match (same_arity.next(), same_arity.next()) {
        (Some(only), None) => Resolution::Mismatch(only),
        _ => Resolution::NoMatch,
    }
}

bitflags! {
    /// Access allowed to a bridged property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyAccess: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// An accessor pair exposed as a script property.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Kind of the property's value
    pub kind: ValueKind,
    /// Reads the value from the receiver
    pub getter: NativeFn,
    /// Writes the value, absent for read-only properties
    pub setter: Option<NativeFn>,
}

impl PropertyDescriptor {
    /// Read-only unless a setter is present.
    pub fn access(&self) -> PropertyAccess {
        if self.setter.is_some() {
            PropertyAccess::READ_WRITE
        } else {
            PropertyAccess::READ
        }
    }
}

/// Source of descriptors for natives that create new wrapped objects.
pub trait DescriptorSource {
    /// The descriptor published for the Rust type `type_id`.
    fn descriptor_for(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>>;
}

impl DescriptorSource for () {
    fn descriptor_for(&self, _type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        None
    }
}

impl DescriptorSource for Vec<Arc<TypeDescriptor>> {
    fn descriptor_for(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.iter().find(|d| d.type_id == type_id).cloned()
    }
}

/// Bridging metadata for one native type.
///
/// Built mutably by a class binder, then frozen behind an `Arc` when it is
/// published.
pub struct TypeDescriptor {
    /// Script-visible type name
    name: String,
    /// Hash of `name`, matched against object parameter kinds
    hash: TypeHash,
    /// Rust TypeId of the described type
    type_id: TypeId,
    /// `std::any::type_name` of the described type, for diagnostics
    rust_name: &'static str,
    /// Constructor overloads in declaration order
    constructors: Vec<Overload>,
    /// Instance methods by name
    methods: FxHashMap<String, Vec<Overload>>,
    /// Static functions by name
    functions: FxHashMap<String, Vec<Overload>>,
    /// Accessor pairs by name
    properties: FxHashMap<String, PropertyDescriptor>,
    /// Hook run on owned instances before they are dropped
    destructor: Option<Destructor>,
}

impl TypeDescriptor {
    /// An empty descriptor for `T` under its script name.
    pub fn new<T: NativeType>() -> Self {
        Self {
            name: T::NAME.to_owned(),
            hash: T::type_hash(),
            type_id: TypeId::of::<T>(),
            rust_name: std::any::type_name::<T>(),
            constructors: Vec::new(),
            methods: FxHashMap::default(),
            functions: FxHashMap::default(),
            properties: FxHashMap::default(),
            destructor: None,
        }
    }

    /// Script-visible type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the script name.
    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust path of the described type.
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Constructor overloads, empty for static-only types.
    pub fn constructors(&self) -> &[Overload] {
        &self.constructors
    }

    /// Overloads of instance method `name`.
    pub fn method(&self, name: &str) -> Option<&[Overload]> {
        self.methods.get(name).map(Vec::as_slice)
    }

    /// Overloads of static function `name`.
    pub fn function(&self, name: &str) -> Option<&[Overload]> {
        self.functions.get(name).map(Vec::as_slice)
    }

    /// Property `name`, if declared.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn destructor(&self) -> Option<&Destructor> {
        self.destructor.as_ref()
    }

    /// Sorted instance method names.
    pub fn method_names(&self) -> Vec<&str> {
        sorted_keys(&self.methods)
    }

    /// Sorted static function names.
    pub fn function_names(&self) -> Vec<&str> {
        sorted_keys(&self.functions)
    }

    /// Sorted property names.
    pub fn property_names(&self) -> Vec<&str> {
        sorted_keys(&self.properties)
    }

    pub fn add_constructor(&mut self, overload: Overload) {
        self.constructors.push(overload);
    }

    pub fn add_method(&mut self, name: impl Into<String>, overload: Overload) {
        self.methods.entry(name.into()).or_default().push(overload);
    }

    pub fn add_function(&mut self, name: impl Into<String>, overload: Overload) {
        self.functions.entry(name.into()).or_default().push(overload);
    }

    /// Insert a property, returning the one it replaced.
    pub fn add_property(
        &mut self,
        name: impl Into<String>,
        property: PropertyDescriptor,
    ) -> Option<PropertyDescriptor> {
        self.properties.insert(name.into(), property)
    }

    pub fn set_destructor(&mut self, destructor: Destructor) {
        self.destructor = Some(destructor);
    }

    /// Check that script call sites can tell every member apart and that no
    /// member would replace a built-in of the script class.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.name.is_empty() {
            return Err(RegistrationError::EmptyName {
                type_name: self.rust_name.to_owned(),
                what: "type",
            });
        }
        let mut statics = self.function_names().into_iter();
        if let Some(name) = statics.find(|name| RESERVED_STATICS.contains(name)) {
            return Err(self.conflict(name, "reserved for the script class".into()));
        }
        let mut instance = self.method_names().into_iter().chain(self.property_names());
        if let Some(name) = instance.find(|name| RESERVED_INSTANCE.contains(name)) {
            return Err(self.conflict(name, "reserved on script instances".into()));
        }
        self.check_overloads("constructor", &self.constructors)?;
        for (name, overloads) in self.methods.iter().chain(&self.functions) {
            self.check_overloads(name, overloads)?;
        }
        let mut properties = self.property_names();
        properties.retain(|name| self.methods.contains_key(*name));
        if let Some(name) = properties.first() {
            return Err(self.conflict(name, "name is used by both a method and a property".into()));
        }
        Ok(())
    }

    fn check_overloads(&self, member: &str, overloads: &[Overload]) -> Result<(), RegistrationError> {
        for (i, first) in overloads.iter().enumerate() {
            for second in &overloads[i + 1..] {
                if first.is_ambiguous_with(second) {
                    return Err(self.conflict(
                        member,
                        format!(
                            "overloads {} and {} cannot be told apart",
                            first.signature(),
                            second.signature()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn conflict(&self, member: &str, detail: String) -> RegistrationError {
        RegistrationError::Conflict {
            type_name: self.name.clone(),
            member: member.to_owned(),
            detail,
        }
    }
}

/// Static names a script class cannot redefine.
const RESERVED_STATICS: &[&str] = &["prototype", "__proto__"];

/// Prototype names that would shadow the class link of every instance.
const RESERVED_INSTANCE: &[&str] = &["constructor", "__proto__"];

fn sorted_keys<V>(map: &FxHashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .field("rust_name", &self.rust_name)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.method_names())
            .field("functions", &self.function_names())
            .field("properties", &self.property_names())
            .field("destructor", &self.destructor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CallContext;

    struct Sample;
    crate::native_type!(Sample);

    fn noop() -> NativeFn {
        NativeFn::new(|_ctx: &mut CallContext<'_>| Ok(()))
    }

    fn overload(params: &[ValueKind]) -> Overload {
        Overload::new(params.to_vec(), ValueKind::Void, noop())
    }

    #[test]
    fn resolution_prefers_exact_match() {
        let overloads = [
            overload(&[ValueKind::String]),
            overload(&[ValueKind::Int32]),
        ];
        let args = [Dynamic::Int(1)];
        match resolve_overload(&overloads, &args) {
            Resolution::Found(o) => assert_eq!(o.params, vec![ValueKind::Int32]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolution_falls_back_to_coercion() {
        let overloads = [overload(&[ValueKind::String])];
        let args = [Dynamic::Float(2.5)];
        assert!(matches!(resolve_overload(&overloads, &args), Resolution::Found(_)));
    }

    #[test]
    fn resolution_by_arity() {
        let overloads = [
            overload(&[ValueKind::Int32]),
            overload(&[ValueKind::Int32, ValueKind::Int32]),
        ];
        let args = [Dynamic::Int(1), Dynamic::Int(2)];
        match resolve_overload(&overloads, &args) {
            Resolution::Found(o) => assert_eq!(o.arity(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn single_arity_candidate_is_mismatch() {
        let overloads = [
            overload(&[ValueKind::Int32, ValueKind::Int32]),
            overload(&[ValueKind::Int32]),
        ];
        let args = [Dynamic::from("a"), Dynamic::from("b")];
        let Resolution::Mismatch(o) = resolve_overload(&overloads, &args) else {
            panic!("expected mismatch");
        };
        let (index, kind, arg) = o.first_mismatch(&args).unwrap();
        assert_eq!((index, kind, arg), (0, ValueKind::Int32, &Dynamic::from("a")));
    }

    #[test]
    fn no_candidate_is_no_match() {
        let overloads = [overload(&[ValueKind::Int32])];
        assert!(matches!(resolve_overload(&overloads, &[]), Resolution::NoMatch));
    }

    #[test]
    fn ambiguous_overloads_conflict() {
        let mut descriptor = TypeDescriptor::new::<Sample>();
        descriptor.add_method("f", overload(&[ValueKind::Int32]));
        descriptor.add_method("f", overload(&[ValueKind::Double]));
        assert!(matches!(
            descriptor.validate(),
            Err(RegistrationError::Conflict { member, .. }) if member == "f"
        ));
    }

    #[test]
    fn distinct_classes_are_fine() {
        let mut descriptor = TypeDescriptor::new::<Sample>();
        descriptor.add_function("f", overload(&[ValueKind::Int32]));
        descriptor.add_function("f", overload(&[ValueKind::String]));
        descriptor.add_function("f", overload(&[ValueKind::Int32, ValueKind::Int32]));
        assert_eq!(descriptor.validate(), Ok(()));
    }

    #[test]
    fn method_and_property_share_name() {
        let mut descriptor = TypeDescriptor::new::<Sample>();
        descriptor.add_method("X", overload(&[]));
        descriptor.add_property(
            "X",
            PropertyDescriptor {
                kind: ValueKind::Int32,
                getter: noop(),
                setter: None,
            },
        );
        assert!(matches!(descriptor.validate(), Err(RegistrationError::Conflict { .. })));
    }

    #[test]
    fn reserved_names_conflict() {
        let mut statics = TypeDescriptor::new::<Sample>();
        statics.add_function("prototype", overload(&[]));
        assert!(matches!(
            statics.validate(),
            Err(RegistrationError::Conflict { member, .. }) if member == "prototype"
        ));

        let mut methods = TypeDescriptor::new::<Sample>();
        methods.add_method("constructor", overload(&[]));
        assert!(matches!(methods.validate(), Err(RegistrationError::Conflict { .. })));

        let mut properties = TypeDescriptor::new::<Sample>();
        properties.add_property(
            "__proto__",
            PropertyDescriptor {
                kind: ValueKind::Int32,
                getter: noop(),
                setter: None,
            },
        );
        assert!(matches!(properties.validate(), Err(RegistrationError::Conflict { .. })));

        let mut allowed = TypeDescriptor::new::<Sample>();
        allowed.add_function("constructor", overload(&[]));
        allowed.add_method("prototype", overload(&[]));
        assert_eq!(allowed.validate(), Ok(()));
    }

    #[test]
    fn names_are_sorted() {
        let mut descriptor = TypeDescriptor::new::<Sample>();
        descriptor.add_method("b", overload(&[]));
        descriptor.add_method("a", overload(&[]));
        assert_eq!(descriptor.method_names(), vec!["a", "b"]);
        assert_eq!(descriptor.name(), "Sample");
        assert_eq!(descriptor.type_id(), TypeId::of::<Sample>());
    }

    #[test]
    fn property_access_flags() {
        let property = PropertyDescriptor {
            kind: ValueKind::Int32,
            getter: noop(),
            setter: Some(noop()),
        };
        assert!(property.access().contains(PropertyAccess::WRITE));
        let readonly = PropertyDescriptor {
            setter: None,
            ..property
        };
        assert_eq!(readonly.access(), PropertyAccess::READ);
    }
}
