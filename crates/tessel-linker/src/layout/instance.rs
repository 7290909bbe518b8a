//! Instance field layout

use crate::config::WordSize;
use crate::error::{LinkError, LinkResult};
use crate::layout::data_map::DataMap;
use crate::layout::oop_map::OopMap;
use crate::types::member::{FieldDef, FieldType};
use crate::types::metadata::{check_member_count, MemberCategory, MemberId};
use crate::types::modifiers::MemberModifiers;
use std::sync::Arc;

/// A laid-out instance field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Declaration index
    pub id: MemberId,
    /// Field name
    pub name: Arc<str>,
    /// Declared type
    pub ty: FieldType,
    /// Modifiers
    pub modifiers: MemberModifiers,
    /// Byte offset from the start of the instance
    pub offset: u16,
}

/// Byte layout of a type's instances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceLayout {
    /// Instance size in bytes, inherited fields included
    pub size: u16,
    /// Fields declared by this type (inherited ones live in the supertype's layout)
    pub fields: Vec<FieldInfo>,
    /// Words holding references
    pub oop_map: OopMap,
    /// Unit sizes covering the instance
    pub data_map: DataMap,
}

impl InstanceLayout {
    /// Layout with no fields
    pub fn empty() -> Self {
        Self::default()
    }

    /// Declared field by name
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| &*f.name == name)
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Lay out `fields` after the supertype's instance data
///
/// Fields are placed in declaration order at their natural alignment. The
/// supertype's oop map and data map are copied and extended, so both stay
/// prefix-compatible with the supertype.
pub fn compute_instance_layout(
    type_name: &str,
    fields: &[FieldDef],
    supertype: Option<&InstanceLayout>,
    word: WordSize,
) -> LinkResult<InstanceLayout> {
    check_member_count(type_name, MemberCategory::InstanceField, fields.len())?;
    let (base, mut oops, mut data) = match supertype {
        Some(s) => (s.size as usize, s.oop_map.to_builder(), s.data_map.clone()),
        None => (0, OopMap::none().to_builder(), DataMap::new()),
    };

    let mut offset = base;
    let mut infos = Vec::with_capacity(fields.len());
    for (i, f) in fields.iter().enumerate() {
        let size = f.ty.size(word);
        let aligned = align_up(offset, size);
        for _ in offset..aligned {
            data.push(0);
        }
        if aligned + size > u16::MAX as usize {
            return Err(LinkError::FieldsOverflow(type_name.to_string()));
        }
        if f.ty.is_reference() {
            oops.set(aligned / word.bytes());
        }
        data.push(f.ty.log2_size(word));
        tracing::trace!(ty = type_name, field = %f.name, offset = aligned, "instance field");
        infos.push(FieldInfo {
            id: MemberId::new(i as u16),
            name: f.name.clone(),
            ty: f.ty.clone(),
            modifiers: f.modifiers,
            offset: aligned as u16,
        });
        offset = aligned + size;
    }

    Ok(InstanceLayout {
        size: offset as u16,
        fields: infos,
        oop_map: oops.build(),
        data_map: data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(name: &str) -> FieldDef {
        FieldDef::new(name, FieldType::Int)
    }

    fn reference(name: &str) -> FieldDef {
        FieldDef::new(name, FieldType::reference("Object"))
    }

    #[test]
    fn test_empty_layout() {
        let layout = compute_instance_layout("A", &[], None, WordSize::W32).unwrap();
        assert_eq!(layout.size, 0);
        assert!(!layout.oop_map.has_references());
        assert!(layout.data_map.is_empty());
    }

    #[test]
    fn test_natural_alignment() {
        let fields = [
            FieldDef::new("b", FieldType::Byte),
            FieldDef::new("s", FieldType::Short),
            FieldDef::new("l", FieldType::Long),
        ];
        let layout = compute_instance_layout("A", &fields, None, WordSize::W32).unwrap();

        assert_eq!(layout.field("b").unwrap().offset, 0);
        assert_eq!(layout.field("s").unwrap().offset, 2);
        assert_eq!(layout.field("l").unwrap().offset, 8);
        assert_eq!(layout.size, 16);
        assert_eq!(layout.data_map.byte_len(), 16);
    }

    #[test]
    fn test_subtype_after_unaligned_supertype() {
        let word = WordSize::W64;
        let parent = compute_instance_layout("P", &[int("a")], None, word).unwrap();
        assert_eq!(parent.size, 4);

        let child =
            compute_instance_layout("C", &[reference("r"), int("b")], Some(&parent), word).unwrap();

        assert_eq!(child.field("r").unwrap().offset, 8);
        assert_eq!(child.field("b").unwrap().offset, 16);
        assert_eq!(child.size as usize, word.round_up(4) + word.bytes() + 4);
        assert_eq!(child.oop_map.indices().collect::<Vec<_>>(), vec![1]);

        // four padding bytes between the inherited int and the reference
        assert_eq!(child.data_map.len(), 1 + 4 + 1 + 1);
        assert_eq!(child.data_map.byte_len(), child.size as usize);
        assert!(parent.data_map.is_prefix_of(&child.data_map));
    }

    #[test]
    fn test_oop_map_inherited() {
        let word = WordSize::W32;
        let parent = compute_instance_layout("P", &[reference("head")], None, word).unwrap();
        let child = compute_instance_layout("C", &[int("n"), reference("tail")], Some(&parent), word)
            .unwrap();

        assert!(parent.oop_map.is_subset_of(&child.oop_map));
        assert_eq!(child.oop_map.indices().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_fields_overflow() {
        let fields: Vec<FieldDef> = (0..9000).map(|i| FieldDef::new(&format!("f{}", i), FieldType::Long)).collect();
        let err = compute_instance_layout("Huge", &fields, None, WordSize::W32).unwrap_err();
        assert_eq!(err, LinkError::FieldsOverflow("Huge".to_string()));
    }
}
