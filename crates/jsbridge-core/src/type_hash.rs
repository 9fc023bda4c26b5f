//! Deterministic hash-based type identity.
//!
//! A [`TypeHash`] is computed from the script-visible name of a native type,
//! so the same name always produces the same identity. Object-typed parameter
//! kinds can therefore be declared before the type they reference is
//! registered.
//!
//! # Examples
//!
//! ```
//! use jsbridge_core::TypeHash;
//!
//! let a = TypeHash::from_name("TestClass");
//! let b = TypeHash::from_name("TestClass");
//! assert_eq!(a, b);
//! assert_ne!(a, TypeHash::from_name("OtherClass"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for member (method, function, property) hashes
    pub const MEMBER: u64 = 0x7d3c8b4a92e15f6d;

    /// Separator between an owner hash and a member name
    pub const SEP: u64 = 0x4bc94d6bd06053ad;
}

/// A 64-bit identity derived from a registered name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Hash of a script-visible type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash of a member of `owner`, recorded on dispatch traces.
    #[inline]
    pub fn from_member(owner: TypeHash, name: &str) -> Self {
        let member = xxh64(name.as_bytes(), hash_constants::SEP);
        TypeHash(hash_constants::MEMBER ^ owner.0.rotate_left(17) ^ member)
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash(0x{:016x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for TypeHash {
    fn from(value: u64) -> Self {
        TypeHash(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_deterministic() {
        assert_eq!(TypeHash::from_name("TestClass"), TypeHash::from_name("TestClass"));
    }

    #[test]
    fn different_names_differ() {
        assert_ne!(TypeHash::from_name("TestClass"), TypeHash::from_name("testclass"));
    }

    #[test]
    fn member_hash_depends_on_owner() {
        let a = TypeHash::from_name("A");
        let b = TypeHash::from_name("B");
        assert_ne!(TypeHash::from_member(a, "X"), TypeHash::from_member(b, "X"));
        assert_ne!(TypeHash::from_member(a, "X"), TypeHash::from_member(a, "Y"));
    }

    #[test]
    fn debug_and_display_are_hex() {
        let hash = TypeHash(0xff);
        assert_eq!(format!("{hash:?}"), "TypeHash(0x00000000000000ff)");
        assert_eq!(hash.to_string(), "00000000000000ff");
    }
}
