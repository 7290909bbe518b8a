//! Symbolic member metadata
//!
//! The engine asks an opaque per-type decoder for member names, signatures
//! and modifiers. A decoder answers for its own type only; walking
//! supertypes and interfaces is the linker's job.

use crate::error::{LinkError, LinkResult};
use crate::types::member::{FieldType, Signature, TypeDefinition};
use crate::types::modifiers::MemberModifiers;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Member table being searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberCategory {
    /// Instance fields
    InstanceField,
    /// Static fields
    StaticField,
    /// Virtual methods
    VirtualMethod,
    /// Static methods and constructors
    StaticMethod,
}

impl MemberCategory {
    /// True for the two method categories
    pub fn is_method(self) -> bool {
        matches!(self, MemberCategory::VirtualMethod | MemberCategory::StaticMethod)
    }

    fn index(self) -> usize {
        match self {
            MemberCategory::InstanceField => 0,
            MemberCategory::StaticField => 1,
            MemberCategory::VirtualMethod => 2,
            MemberCategory::StaticMethod => 3,
        }
    }

    fn label(self) -> &'static str {
        match self {
            MemberCategory::InstanceField => "instance fields",
            MemberCategory::StaticField => "static fields",
            MemberCategory::VirtualMethod => "virtual methods",
            MemberCategory::StaticMethod => "static methods",
        }
    }
}

/// Most members a type may declare in one category
pub const MAX_MEMBERS: usize = u16::MAX as usize + 1;

/// Reject a category whose declaration indices would not fit a [`MemberId`]
pub(crate) fn check_member_count(type_name: &str, category: MemberCategory, count: usize) -> LinkResult<()> {
    if count > MAX_MEMBERS {
        return Err(LinkError::class_format(
            type_name,
            format!("too many {} ({})", category.label(), count),
        ));
    }
    Ok(())
}

/// Index of a member within its category, in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u16);

impl MemberId {
    /// Create a member id
    pub fn new(index: u16) -> Self {
        MemberId(index)
    }

    /// Declaration index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Type part of a member symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberType {
    /// Field of the given type
    Field(FieldType),
    /// Method with the given signature
    Method(Signature),
}

/// Decoded description of one member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSymbol {
    /// Member name
    pub name: Arc<str>,
    /// Field type or method signature
    pub ty: MemberType,
    /// Modifiers
    pub modifiers: MemberModifiers,
}

impl MemberSymbol {
    fn matches(&self, name: &str, params: &[FieldType], ret: Option<&FieldType>) -> bool {
        if &*self.name != name {
            return false;
        }
        match &self.ty {
            MemberType::Field(ty) => params.is_empty() && ret == Some(ty),
            MemberType::Method(sig) => sig.params.as_slice() == params && sig.ret.as_ref() == ret,
        }
    }
}

/// Per-type symbol decoder
pub trait SymbolicMetadata: Send + Sync + fmt::Debug {
    /// Find a member by name and type
    ///
    /// For fields `params` is empty and `ret` is the field type; for methods
    /// `ret` is the return type (`None` for void).
    fn lookup(
        &self,
        category: MemberCategory,
        name: &str,
        params: &[FieldType],
        ret: Option<&FieldType>,
    ) -> Option<MemberId>;

    /// Number of members in a category
    fn member_count(&self, category: MemberCategory) -> usize;

    /// Member at a declaration index
    fn member_at(&self, category: MemberCategory, index: usize) -> Option<MemberSymbol>;
}

/// In-memory decoder built from a parsed definition
#[derive(Debug, Default)]
pub struct MemberTable {
    members: [Vec<MemberSymbol>; 4],
    by_name: FxHashMap<(MemberCategory, Arc<str>), Vec<MemberId>>,
}

impl MemberTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table listing every member of a definition
    ///
    /// Members past [`MAX_MEMBERS`] in a category are not listed; the linker
    /// rejects such definitions before building their tables.
    pub fn from_definition(def: &TypeDefinition) -> Self {
        let mut table = Self::new();
        for f in &def.instance_fields {
            table.push(MemberCategory::InstanceField, &f.name, MemberType::Field(f.ty.clone()), f.modifiers);
        }
        for f in &def.static_fields {
            table.push(MemberCategory::StaticField, &f.name, MemberType::Field(f.ty.clone()), f.modifiers);
        }
        for m in &def.virtual_methods {
            table.push(
                MemberCategory::VirtualMethod,
                &m.name,
                MemberType::Method(m.signature.clone()),
                m.modifiers,
            );
        }
        for m in &def.static_methods {
            table.push(
                MemberCategory::StaticMethod,
                &m.name,
                MemberType::Method(m.signature.clone()),
                m.modifiers,
            );
        }
        table
    }

    /// Append a member and return its id; `None` once the category is full
    pub fn push(
        &mut self,
        category: MemberCategory,
        name: &Arc<str>,
        ty: MemberType,
        modifiers: MemberModifiers,
    ) -> Option<MemberId> {
        let list = &mut self.members[category.index()];
        let id = MemberId::new(u16::try_from(list.len()).ok()?);
        list.push(MemberSymbol {
            name: name.clone(),
            ty,
            modifiers,
        });
        self.by_name
            .entry((category, name.clone()))
            .or_default()
            .push(id);
        Some(id)
    }
}

impl SymbolicMetadata for MemberTable {
    fn lookup(
        &self,
        category: MemberCategory,
        name: &str,
        params: &[FieldType],
        ret: Option<&FieldType>,
    ) -> Option<MemberId> {
        let candidates = self.by_name.get(&(category, Arc::from(name)))?;
        let list = &self.members[category.index()];
        candidates
            .iter()
            .copied()
            .find(|id| list[id.index()].matches(name, params, ret))
    }

    fn member_count(&self, category: MemberCategory) -> usize {
        self.members[category.index()].len()
    }

    fn member_at(&self, category: MemberCategory, index: usize) -> Option<MemberSymbol> {
        self.members[category.index()].get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::member::{FieldDef, MethodDef};

    fn sample() -> MemberTable {
        let def = TypeDefinition::class("app.Counter")
            .field(FieldDef::new("count", FieldType::Int))
            .static_field(FieldDef::new("INSTANCE", FieldType::reference("app.Counter")))
            .method(MethodDef::new("add", Signature::new(vec![FieldType::Int], None)))
            .method(MethodDef::new("add", Signature::new(vec![FieldType::Long], None)))
            .static_method(MethodDef::new("<init>", Signature::void()));
        MemberTable::from_definition(&def)
    }

    #[test]
    fn test_member_counts() {
        let table = sample();
        assert_eq!(table.member_count(MemberCategory::InstanceField), 1);
        assert_eq!(table.member_count(MemberCategory::StaticField), 1);
        assert_eq!(table.member_count(MemberCategory::VirtualMethod), 2);
        assert_eq!(table.member_count(MemberCategory::StaticMethod), 1);
    }

    #[test]
    fn test_lookup_overloads() {
        let table = sample();
        let by_int = table.lookup(MemberCategory::VirtualMethod, "add", &[FieldType::Int], None);
        let by_long = table.lookup(MemberCategory::VirtualMethod, "add", &[FieldType::Long], None);
        assert_eq!(by_int, Some(MemberId::new(0)));
        assert_eq!(by_long, Some(MemberId::new(1)));
        assert_eq!(
            table.lookup(MemberCategory::VirtualMethod, "add", &[FieldType::Short], None),
            None
        );
    }

    #[test]
    fn test_lookup_field() {
        let table = sample();
        assert_eq!(
            table.lookup(MemberCategory::InstanceField, "count", &[], Some(&FieldType::Int)),
            Some(MemberId::new(0))
        );
        assert_eq!(
            table.lookup(MemberCategory::InstanceField, "count", &[], Some(&FieldType::Long)),
            None
        );
        assert_eq!(
            table.lookup(MemberCategory::StaticField, "count", &[], Some(&FieldType::Int)),
            None
        );
    }

    #[test]
    fn test_member_at() {
        let table = sample();
        let symbol = table.member_at(MemberCategory::StaticMethod, 0).unwrap();
        assert_eq!(&*symbol.name, "<init>");
        assert_eq!(symbol.ty, MemberType::Method(Signature::void()));
        assert!(table.member_at(MemberCategory::StaticMethod, 1).is_none());
    }

    #[test]
    fn test_push_stops_at_member_limit() {
        let mut table = MemberTable::new();
        let name: Arc<str> = Arc::from("x");
        for i in 0..MAX_MEMBERS {
            let id = table.push(
                MemberCategory::StaticField,
                &name,
                MemberType::Field(FieldType::Int),
                MemberModifiers::empty(),
            );
            assert_eq!(id, Some(MemberId::new(i as u16)));
        }
        let overflow = table.push(
            MemberCategory::StaticField,
            &name,
            MemberType::Field(FieldType::Int),
            MemberModifiers::empty(),
        );
        assert_eq!(overflow, None);
        assert_eq!(table.member_count(MemberCategory::StaticField), MAX_MEMBERS);
    }

    #[test]
    fn test_member_count_limit() {
        assert!(check_member_count("app.A", MemberCategory::VirtualMethod, MAX_MEMBERS).is_ok());
        let err = check_member_count("app.A", MemberCategory::VirtualMethod, MAX_MEMBERS + 1).unwrap_err();
        assert!(matches!(err, LinkError::ClassFormat { ref reason, .. } if reason.starts_with("too many virtual methods")));
    }
}
