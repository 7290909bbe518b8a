//! Type definitions, descriptors and the type registry

pub mod descriptor;
pub mod id;
pub mod member;
pub mod metadata;
pub mod modifiers;
pub mod registry;

pub use descriptor::{Linkage, ResolvedConstant, TypeDescriptor, TypeState};
pub use id::TypeId;
pub use member::{
    ConstantValue, FieldDef, FieldType, MethodBody, MethodDef, PoolEntry, Signature, TypeDefinition,
};
pub use metadata::{MemberCategory, MemberId, MemberSymbol, MemberTable, MemberType, SymbolicMetadata};
pub use modifiers::{MemberModifiers, TypeModifiers, Visibility};
pub use registry::{well_known, Namespace, TypeRegistry};
