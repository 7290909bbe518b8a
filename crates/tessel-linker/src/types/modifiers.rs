//! Type and member modifier sets

use bitflags::bitflags;

bitflags! {
    /// Modifiers of a type descriptor
    ///
    /// `HAS_CTOR`, `HAS_CLINIT`, `HAS_MAIN` and `EAGER_REIFICATION` are
    /// computed during completion; values supplied by a definition are
    /// discarded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeModifiers: u32 {
        /// Visible outside its package
        const PUBLIC = 1 << 0;
        /// Cannot be instantiated
        const ABSTRACT = 1 << 1;
        /// Cannot be extended
        const FINAL = 1 << 2;
        /// Interface type
        const INTERFACE = 1 << 3;
        /// Array type
        const ARRAY = 1 << 4;
        /// Primitive type
        const PRIMITIVE = 1 << 5;
        /// Generated by the toolchain
        const SYNTHETIC = 1 << 6;
        /// Declares a default constructor
        const HAS_CTOR = 1 << 7;
        /// Declares a static initializer
        const HAS_CLINIT = 1 << 8;
        /// Declares an entry point
        const HAS_MAIN = 1 << 9;
        /// Constants are written into static storage at initialization
        const EAGER_REIFICATION = 1 << 10;
        /// Word-sized value wrapper (address, offset); never filled with error stubs
        const PRIMITIVE_WRAPPER = 1 << 11;
        /// Statics are shared by every execution context
        const GLOBAL_STATICS = 1 << 12;
        /// Part of the immutable system image
        const SYSTEM_IMAGE = 1 << 13;
    }
}

impl TypeModifiers {
    /// Bits derived during completion
    pub const COMPUTED: TypeModifiers = TypeModifiers::HAS_CTOR
        .union(TypeModifiers::HAS_CLINIT)
        .union(TypeModifiers::HAS_MAIN)
        .union(TypeModifiers::EAGER_REIFICATION);
}

bitflags! {
    /// Modifiers of a field or method
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemberModifiers: u32 {
        /// Accessible everywhere
        const PUBLIC = 1 << 0;
        /// Accessible to subtypes and the package
        const PROTECTED = 1 << 1;
        /// Accessible only to the declaring type
        const PRIVATE = 1 << 2;
        /// Cannot be overridden (methods) or reassigned (fields)
        const FINAL = 1 << 3;
        /// Implemented outside the interpreter
        const NATIVE = 1 << 4;
        /// Has no body
        const ABSTRACT = 1 << 5;
        /// Exists only on the build host; never callable on the device
        const HOSTED = 1 << 6;
        /// Generated by the toolchain
        const SYNTHETIC = 1 << 7;
    }
}

/// Member visibility derived from its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// `PUBLIC`
    Public,
    /// `PROTECTED`
    Protected,
    /// No access modifier
    Package,
    /// `PRIVATE`
    Private,
}

impl MemberModifiers {
    /// Visibility of the member
    pub fn visibility(self) -> Visibility {
        if self.contains(MemberModifiers::PUBLIC) {
            Visibility::Public
        } else if self.contains(MemberModifiers::PROTECTED) {
            Visibility::Protected
        } else if self.contains(MemberModifiers::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }
}

/// Package part of a dotted type name (empty for the default package)
pub fn package_of(type_name: &str) -> &str {
    type_name.rfind('.').map(|i| &type_name[..i]).unwrap_or("")
}
