//! Tessel type linker
//!
//! This crate turns parsed type definitions into linked runtime types for
//! an embedded virtual machine:
//! - Type registry with namespaces and reserved bootstrap ids
//! - Instance and static field layout with GC reference and data bitmaps
//! - Virtual and static dispatch tables with override checking
//! - Interface slot maps
//! - Lazy, thread-safe type initialization per execution context

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![allow(clippy::derivable_impls)]

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod layout;
pub mod link;
pub mod types;

pub use config::{LinkerOptions, WordSize};
pub use context::{
    ClassState, ClassStateTable, ContextId, ContextRegistry, ExecutionContext, InitState,
    Interpreter, ObjectRef,
};
pub use dispatch::{DispatchEntry, DispatchTable, InterfaceSlot, InterfaceSlotMap, MethodImpl, StaticTable};
pub use error::{LinkError, LinkResult, Throwable};
pub use layout::{DataMap, GlobalStatics, GlobalTableKind, InstanceLayout, OopMap, StaticLayout};
pub use link::{BodyTranslator, DefinitionSource, Linker, ResolvedMember};
pub use types::{
    well_known, ConstantValue, FieldDef, FieldType, MemberCategory, MemberId, MemberModifiers,
    MethodBody, MethodDef, Namespace, PoolEntry, Signature, SymbolicMetadata, TypeDefinition,
    TypeDescriptor, TypeId, TypeModifiers, TypeRegistry, TypeState,
};
