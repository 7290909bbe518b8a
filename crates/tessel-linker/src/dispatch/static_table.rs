//! Static method tables

use crate::dispatch::method::MethodImpl;
use crate::error::{LinkError, LinkResult};
use crate::types::descriptor::TypeDescriptor;
use crate::types::member::{MethodDef, Signature};
use crate::types::metadata::MemberId;
use crate::types::modifiers::{MemberModifiers, TypeModifiers};
use std::sync::Arc;

/// Immutable table of callable static methods
///
/// The default constructor, the static initializer and the entry point come
/// first, in that order and only when present.
#[derive(Debug, Clone)]
pub struct StaticTable(Arc<[Arc<MethodImpl>]>);

impl StaticTable {
    /// A table with no slots
    pub fn empty() -> Self {
        StaticTable(Arc::from(Vec::new()))
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the table has no slots
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Method at `slot`
    pub fn get(&self, slot: usize) -> Option<&Arc<MethodImpl>> {
        self.0.get(slot)
    }

    /// Methods in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<MethodImpl>> {
        self.0.iter()
    }
}

pub(crate) struct StaticTableBuild {
    pub methods: Vec<Arc<MethodImpl>>,
    pub table: StaticTable,
    pub flags: TypeModifiers,
}

pub(crate) fn build_static_table(ty: &TypeDescriptor, defs: &[MethodDef]) -> LinkResult<StaticTableBuild> {
    let callable = |d: &MethodDef| !d.modifiers.contains(MemberModifiers::HOSTED);

    if let Some(bad) = defs
        .iter()
        .find(|d| d.is_initializer() && d.signature != Signature::void())
    {
        return Err(LinkError::class_format(
            ty.name(),
            format!("static initializer has signature {}", bad.signature),
        ));
    }

    let ctor = defs.iter().position(|d| callable(d) && d.is_default_constructor());
    let clinit = defs.iter().position(|d| callable(d) && d.is_initializer());
    let main = defs.iter().position(|d| callable(d) && d.is_main());

    let mut flags = TypeModifiers::empty();
    flags.set(TypeModifiers::HAS_CTOR, ctor.is_some());
    flags.set(TypeModifiers::HAS_CLINIT, clinit.is_some());
    flags.set(TypeModifiers::HAS_MAIN, main.is_some());

    let special: Vec<usize> = [ctor, clinit, main].into_iter().flatten().collect();
    let order: Vec<usize> = special
        .iter()
        .copied()
        .chain((0..defs.len()).filter(|i| callable(&defs[*i]) && !special.contains(i)))
        .collect();
    if order.len() > u16::MAX as usize {
        return Err(LinkError::class_format(ty.name(), "too many static methods"));
    }

    let mut slots = vec![None; defs.len()];
    for (slot, &i) in order.iter().enumerate() {
        slots[i] = Some(slot as u16);
    }

    let methods: Vec<Arc<MethodImpl>> = defs
        .iter()
        .enumerate()
        .map(|(i, d)| {
            Arc::new(MethodImpl::new(
                ty.id(),
                ty.name_arc().clone(),
                MemberId::new(i as u16),
                d,
                slots[i],
            ))
        })
        .collect();
    let table: Vec<Arc<MethodImpl>> = order.iter().map(|&i| methods[i].clone()).collect();

    Ok(StaticTableBuild {
        methods,
        table: StaticTable(table.into()),
        flags,
    })
}
