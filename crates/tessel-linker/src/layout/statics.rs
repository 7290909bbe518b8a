//! Static field layout
//!
//! Static storage is a run of word slots ordered `[references][primitives]
//! [constants]`. The reference section comes first so a collector only has
//! to scan the leading `ref_prefix` slots.

use crate::config::WordSize;
use crate::error::{LinkError, LinkResult};
use crate::layout::globals::{GlobalStatics, GlobalTableKind};
use crate::types::member::{ConstantValue, FieldDef, FieldType};
use crate::types::metadata::{check_member_count, MemberCategory, MemberId};
use crate::types::modifiers::MemberModifiers;
use std::sync::Arc;

/// Section of static storage a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticSection {
    /// Reference slots
    Reference,
    /// Non-constant primitive slots
    Primitive,
    /// Compile-time constants
    Constant,
}

/// Where a static field's value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticStorage {
    /// Slot index in the per-context class state
    Slot(u16),
    /// Index in a process-wide global table
    Global(GlobalTableKind, u32),
    /// No storage; reads are resolved by inlining the constant
    Inlined,
}

/// A laid-out static field
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFieldInfo {
    /// Declaration index
    pub id: MemberId,
    /// Field name
    pub name: Arc<str>,
    /// Declared type
    pub ty: FieldType,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Compile-time value
    pub constant: Option<ConstantValue>,
    /// Section the field was assigned to
    pub section: StaticSection,
    /// Storage location
    pub storage: StaticStorage,
}

/// Static storage layout of a type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticLayout {
    /// Fields in declaration order
    pub fields: Vec<StaticFieldInfo>,
    /// Total slots
    pub size: u16,
    /// Leading slots holding references
    pub ref_prefix: u16,
    /// True if constants were given slots
    pub constant_storage: bool,
}

impl StaticLayout {
    /// Static field by name
    pub fn field(&self, name: &str) -> Option<&StaticFieldInfo> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    /// Fields whose constants must be written into storage
    pub fn stored_constants(&self) -> impl Iterator<Item = (u16, ConstantValue)> + '_ {
        self.fields.iter().filter_map(|f| match (f.storage, f.constant) {
            (StaticStorage::Slot(slot), Some(value)) if f.section == StaticSection::Constant => {
                Some((slot, value))
            }
            _ => None,
        })
    }
}

/// Section of a field, rejecting constants that do not match their type
pub(crate) fn section_of(type_name: &str, field: &FieldDef) -> LinkResult<StaticSection> {
    match &field.constant {
        Some(value) if value.fits(&field.ty) => Ok(StaticSection::Constant),
        Some(_) => Err(LinkError::class_format(
            type_name,
            format!("constant value of {} does not match type {}", field.name, field.ty),
        )),
        None if field.ty.is_reference() => Ok(StaticSection::Reference),
        None => Ok(StaticSection::Primitive),
    }
}

/// Slots a value of type `ty` occupies
pub fn slots_for(ty: &FieldType, word: WordSize) -> usize {
    if ty.is_wide() && word == WordSize::W32 {
        2
    } else {
        1
    }
}

/// Assign slots to `fields` in per-context storage
///
/// Offsets are assigned section by section in declaration order, then the
/// primitive and constant sections are shifted past the sections before
/// them. Constants get slots only when `constant_storage` is set.
pub fn compute_static_layout(
    type_name: &str,
    fields: &[FieldDef],
    word: WordSize,
    constant_storage: bool,
) -> LinkResult<StaticLayout> {
    check_member_count(type_name, MemberCategory::StaticField, fields.len())?;
    let mut sections = Vec::with_capacity(fields.len());
    let mut relative = Vec::with_capacity(fields.len());
    let mut sizes = [0usize; 3];

    for f in fields {
        let section = section_of(type_name, f)?;
        let idx = match section {
            StaticSection::Reference => 0,
            StaticSection::Primitive => 1,
            StaticSection::Constant => 2,
        };
        if section == StaticSection::Constant && !constant_storage {
            relative.push(None);
        } else {
            relative.push(Some(sizes[idx]));
            sizes[idx] += slots_for(&f.ty, word);
        }
        sections.push(section);
    }

    let total = sizes.iter().sum::<usize>();
    if total > u16::MAX as usize {
        return Err(LinkError::StaticsOverflow(type_name.to_string()));
    }
    let shift = [0, sizes[0], sizes[0] + sizes[1]];

    let infos = fields
        .iter()
        .zip(sections)
        .zip(relative)
        .enumerate()
        .map(|(i, ((f, section), rel))| {
            let base = match section {
                StaticSection::Reference => shift[0],
                StaticSection::Primitive => shift[1],
                StaticSection::Constant => shift[2],
            };
            let storage = match rel {
                Some(rel) => StaticStorage::Slot((base + rel) as u16),
                None => StaticStorage::Inlined,
            };
            StaticFieldInfo {
                id: MemberId::new(i as u16),
                name: f.name.clone(),
                ty: f.ty.clone(),
                modifiers: f.modifiers,
                constant: f.constant,
                section,
                storage,
            }
        })
        .collect();

    Ok(StaticLayout {
        fields: infos,
        size: total as u16,
        ref_prefix: sizes[0] as u16,
        constant_storage: constant_storage && sizes[2] > 0,
    })
}

/// Register every static of a global-statics type in the global tables
///
/// Fields are keyed `"type.field"`; constants start out holding their value.
pub fn register_global_statics(
    type_name: &str,
    fields: &[FieldDef],
    globals: &GlobalStatics,
) -> LinkResult<StaticLayout> {
    check_member_count(type_name, MemberCategory::StaticField, fields.len())?;
    let mut infos = Vec::with_capacity(fields.len());
    for (i, f) in fields.iter().enumerate() {
        let section = section_of(type_name, f)?;
        let kind = match &f.ty {
            FieldType::Reference(_) => GlobalTableKind::Object,
            FieldType::Address => GlobalTableKind::Address,
            _ => GlobalTableKind::Int,
        };
        let key = format!("{}.{}", type_name, f.name);
        let initial = f.constant.map(|c| c.bits()).unwrap_or(0);
        let index = globals.register(kind, &key, initial);
        tracing::trace!(key = %key, ?kind, index, "global static");
        infos.push(StaticFieldInfo {
            id: MemberId::new(i as u16),
            name: f.name.clone(),
            ty: f.ty.clone(),
            modifiers: f.modifiers,
            constant: f.constant,
            section,
            storage: StaticStorage::Global(kind, index),
        });
    }
    Ok(StaticLayout {
        fields: infos,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<FieldDef> {
        vec![
            FieldDef::new("count", FieldType::Int),
            FieldDef::new("MAX", FieldType::Int).with_constant(ConstantValue::Int(10)),
            FieldDef::new("head", FieldType::reference("Object")),
            FieldDef::new("total", FieldType::Long),
            FieldDef::new("tail", FieldType::reference("Object")),
        ]
    }

    fn slot(layout: &StaticLayout, name: &str) -> StaticStorage {
        layout.field(name).unwrap().storage
    }

    #[test]
    fn test_sections_ordered() {
        let layout = compute_static_layout("A", &sample_fields(), WordSize::W64, true).unwrap();

        assert_eq!(slot(&layout, "head"), StaticStorage::Slot(0));
        assert_eq!(slot(&layout, "tail"), StaticStorage::Slot(1));
        assert_eq!(slot(&layout, "count"), StaticStorage::Slot(2));
        assert_eq!(slot(&layout, "total"), StaticStorage::Slot(3));
        assert_eq!(slot(&layout, "MAX"), StaticStorage::Slot(4));
        assert_eq!(layout.size, 5);
        assert_eq!(layout.ref_prefix, 2);
        assert!(layout.constant_storage);
        assert_eq!(layout.stored_constants().collect::<Vec<_>>(), vec![(4, ConstantValue::Int(10))]);
    }

    #[test]
    fn test_wide_values_on_32_bit() {
        let layout = compute_static_layout("A", &sample_fields(), WordSize::W32, true).unwrap();

        assert_eq!(slot(&layout, "count"), StaticStorage::Slot(2));
        assert_eq!(slot(&layout, "total"), StaticStorage::Slot(3));
        assert_eq!(slot(&layout, "MAX"), StaticStorage::Slot(5));
        assert_eq!(layout.size, 6);
    }

    #[test]
    fn test_constants_without_storage() {
        let layout = compute_static_layout("A", &sample_fields(), WordSize::W64, false).unwrap();

        assert_eq!(slot(&layout, "MAX"), StaticStorage::Inlined);
        assert_eq!(layout.size, 4);
        assert!(!layout.constant_storage);
        assert_eq!(layout.stored_constants().count(), 0);
    }

    #[test]
    fn test_mismatched_constant_rejected() {
        let fields = [FieldDef::new("PI", FieldType::Int).with_constant(ConstantValue::Double(2.5))];
        let err = compute_static_layout("A", &fields, WordSize::W64, true).unwrap_err();
        assert!(matches!(err, LinkError::ClassFormat { .. }));
    }

    #[test]
    fn test_statics_overflow() {
        let fields: Vec<FieldDef> = (0..40000)
            .map(|i| FieldDef::new(&format!("s{}", i), FieldType::Long))
            .collect();
        let err = compute_static_layout("Big", &fields, WordSize::W32, true).unwrap_err();
        assert_eq!(err, LinkError::StaticsOverflow("Big".to_string()));
    }

    #[test]
    fn test_too_many_inlined_constants() {
        let fields: Vec<FieldDef> = (0..=u16::MAX as usize + 1)
            .map(|i| FieldDef::new(&format!("K{}", i), FieldType::Int).with_constant(ConstantValue::Int(1)))
            .collect();
        let err = compute_static_layout("Consts", &fields, WordSize::W64, false).unwrap_err();
        assert!(matches!(err, LinkError::ClassFormat { ref reason, .. } if reason.starts_with("too many static fields")));

        let globals = GlobalStatics::new();
        assert!(register_global_statics("Consts", &fields, &globals).is_err());
        assert_eq!(globals.len(GlobalTableKind::Int), 0);
    }

    #[test]
    fn test_global_statics_registration() {
        let globals = GlobalStatics::new();
        let fields = [
            FieldDef::new("collections", FieldType::Int),
            FieldDef::new("heapStart", FieldType::Address),
            FieldDef::new("roots", FieldType::reference("Object")),
            FieldDef::new("LIMIT", FieldType::Int).with_constant(ConstantValue::Int(64)),
        ];
        let layout = register_global_statics("vm.GC", &fields, &globals).unwrap();

        assert_eq!(layout.size, 0);
        assert_eq!(slot(&layout, "collections"), StaticStorage::Global(GlobalTableKind::Int, 0));
        assert_eq!(slot(&layout, "heapStart"), StaticStorage::Global(GlobalTableKind::Address, 0));
        assert_eq!(slot(&layout, "roots"), StaticStorage::Global(GlobalTableKind::Object, 0));
        assert_eq!(slot(&layout, "LIMIT"), StaticStorage::Global(GlobalTableKind::Int, 1));
        assert_eq!(globals.get(GlobalTableKind::Int, 1), Some(64));
        assert_eq!(globals.index_of(GlobalTableKind::Address, "vm.GC.heapStart"), Some(0));
    }
}
