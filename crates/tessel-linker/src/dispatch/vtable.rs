//! Virtual dispatch tables
//!
//! Slots are stable across the hierarchy: an override reuses the slot of
//! the method it overrides and new methods are appended after the
//! supertype's table. Tables are immutable once built and may be shared
//! between a type and its supertype.

use crate::dispatch::method::MethodImpl;
use crate::error::{LinkError, LinkResult};
use crate::types::descriptor::TypeDescriptor;
use crate::types::member::MethodDef;
use crate::types::metadata::MemberId;
use crate::types::modifiers::{package_of, MemberModifiers, TypeModifiers, Visibility};
use std::sync::Arc;

/// One slot of a dispatch table
#[derive(Debug, Clone)]
pub enum DispatchEntry {
    /// Callable method
    Method(Arc<MethodImpl>),
    /// Raises an abstract-method error when called
    AbstractMethodError,
    /// Unimplemented slot of an abstract type
    Vacant,
}

impl DispatchEntry {
    /// The method, if the slot is callable
    pub fn method(&self) -> Option<&Arc<MethodImpl>> {
        match self {
            DispatchEntry::Method(m) => Some(m),
            _ => None,
        }
    }

    /// True for the abstract-method error stub
    pub fn is_abstract_error(&self) -> bool {
        matches!(self, DispatchEntry::AbstractMethodError)
    }
}

/// Immutable, shareable virtual method table
#[derive(Debug, Clone)]
pub struct DispatchTable(Arc<[DispatchEntry]>);

impl DispatchTable {
    /// A table with no slots
    pub fn empty() -> Self {
        DispatchTable(Arc::from(Vec::new()))
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the table has no slots
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry at `slot`
    pub fn get(&self, slot: usize) -> Option<&DispatchEntry> {
        self.0.get(slot)
    }

    /// Entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.0.iter()
    }

    /// True if both tables are the same allocation
    pub fn ptr_eq(&self, other: &DispatchTable) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// True if any slot is still unimplemented
    pub fn has_vacant(&self) -> bool {
        self.0.iter().any(|e| matches!(e, DispatchEntry::Vacant))
    }
}

impl From<Vec<DispatchEntry>> for DispatchTable {
    fn from(entries: Vec<DispatchEntry>) -> Self {
        DispatchTable(Arc::from(entries))
    }
}

/// Declared virtual methods with slots, plus the resulting table
pub(crate) struct VirtualTableBuild {
    pub methods: Vec<Arc<MethodImpl>>,
    pub table: DispatchTable,
}

fn next_slot(ty: &TypeDescriptor, next: &mut usize) -> LinkResult<u16> {
    if *next > u16::MAX as usize {
        return Err(LinkError::class_format(ty.name(), "too many virtual methods"));
    }
    let slot = *next as u16;
    *next += 1;
    Ok(slot)
}

fn entry_for(method: &Arc<MethodImpl>) -> DispatchEntry {
    if method.is_abstract() {
        DispatchEntry::Vacant
    } else {
        DispatchEntry::Method(method.clone())
    }
}

/// Abstract and value-wrapper types keep vacant slots; every other type
/// turns them into error stubs.
fn finish(entries: Vec<Option<DispatchEntry>>, modifiers: TypeModifiers) -> DispatchTable {
    let fill = !modifiers.intersects(TypeModifiers::ABSTRACT | TypeModifiers::PRIMITIVE_WRAPPER);
    entries
        .into_iter()
        .map(|e| match e {
            Some(DispatchEntry::Vacant) | None if fill => DispatchEntry::AbstractMethodError,
            Some(e) => e,
            None => DispatchEntry::Vacant,
        })
        .collect::<Vec<_>>()
        .into()
}

fn accessible_from(method: &MethodImpl, type_name: &str) -> bool {
    match method.visibility() {
        Visibility::Public | Visibility::Protected => true,
        Visibility::Private => false,
        Visibility::Package => package_of(method.declaring_name()) == package_of(type_name),
    }
}

/// Closest inherited method `def` would override
fn find_overridden(
    type_name: &str,
    supertype: &Arc<TypeDescriptor>,
    def: &MethodDef,
) -> Option<Arc<MethodImpl>> {
    let mut current = Some(supertype);
    while let Some(s) = current {
        let linkage = s.linkage()?;
        if let Some(m) = linkage.virtual_methods.iter().find(|m| {
            m.slot().is_some() && m.matches(&def.name, &def.signature) && accessible_from(m, type_name)
        }) {
            return Some(m.clone());
        }
        current = linkage.supertype.as_ref();
    }
    None
}

/// Root type and interfaces: every declared method gets the next slot
fn build_fresh(
    ty: &TypeDescriptor,
    modifiers: TypeModifiers,
    defs: &[MethodDef],
) -> LinkResult<VirtualTableBuild> {
    let is_interface = modifiers.contains(TypeModifiers::INTERFACE);
    let mut next = 0;
    let mut methods = Vec::with_capacity(defs.len());
    let mut entries = Vec::with_capacity(defs.len());

    for (i, def) in defs.iter().enumerate() {
        let slot = if def.modifiers.contains(MemberModifiers::HOSTED) {
            None
        } else {
            Some(next_slot(ty, &mut next)?)
        };
        let method = Arc::new(MethodImpl::new(
            ty.id(),
            ty.name_arc().clone(),
            MemberId::new(i as u16),
            def,
            slot,
        ));
        if slot.is_some() && !is_interface {
            entries.push(Some(entry_for(&method)));
        }
        methods.push(method);
    }

    let table = if is_interface {
        DispatchTable::empty()
    } else {
        finish(entries, modifiers)
    };
    Ok(VirtualTableBuild { methods, table })
}

/// Build the virtual table of `ty` from its declared methods
///
/// Interfaces end up with an empty table: their slots are interface method
/// indices, used only by interface slot maps.
pub(crate) fn build_virtual_table(
    ty: &TypeDescriptor,
    modifiers: TypeModifiers,
    supertype: Option<&Arc<TypeDescriptor>>,
    defs: &[MethodDef],
) -> LinkResult<VirtualTableBuild> {
    let supertype = match supertype {
        Some(s) if !modifiers.contains(TypeModifiers::INTERFACE) => s,
        _ => return build_fresh(ty, modifiers, defs),
    };
    let super_table = supertype.linked()?.vtable.clone();

    let declares_virtuals = defs
        .iter()
        .any(|d| !d.modifiers.contains(MemberModifiers::HOSTED));
    let keeps_vacant = modifiers.intersects(TypeModifiers::ABSTRACT | TypeModifiers::PRIMITIVE_WRAPPER);
    if !declares_virtuals && (keeps_vacant || !super_table.has_vacant()) {
        let methods = defs
            .iter()
            .enumerate()
            .map(|(i, d)| {
                Arc::new(MethodImpl::new(ty.id(), ty.name_arc().clone(), MemberId::new(i as u16), d, None))
            })
            .collect();
        tracing::trace!(ty = ty.name(), "sharing supertype dispatch table");
        return Ok(VirtualTableBuild {
            methods,
            table: super_table,
        });
    }

    let super_len = super_table.len();
    let mut entries: Vec<Option<DispatchEntry>> = vec![None; super_len];
    let mut next = super_len;
    let mut methods = Vec::with_capacity(defs.len());

    for (i, def) in defs.iter().enumerate() {
        let slot = if def.modifiers.contains(MemberModifiers::HOSTED) {
            None
        } else {
            match find_overridden(ty.name(), supertype, def) {
                Some(overridden) => {
                    if overridden.is_final_or_native() {
                        return Err(LinkError::IllegalOverride {
                            ty: ty.name().to_string(),
                            method: format!("{}{}", def.name, def.signature),
                        });
                    }
                    overridden.slot()
                }
                None => Some(next_slot(ty, &mut next)?),
            }
        };
        let method = Arc::new(MethodImpl::new(
            ty.id(),
            ty.name_arc().clone(),
            MemberId::new(i as u16),
            def,
            slot,
        ));
        if let Some(slot) = slot {
            let slot = slot as usize;
            if entries.len() <= slot {
                entries.resize(slot + 1, None);
            }
            tracing::trace!(ty = ty.name(), method = %method, slot, "virtual slot");
            entries[slot] = Some(entry_for(&method));
        }
        methods.push(method);
    }

    for (slot, entry) in entries.iter_mut().enumerate().take(super_len) {
        if entry.is_none() {
            *entry = super_table.get(slot).cloned();
        }
    }

    Ok(VirtualTableBuild {
        methods,
        table: finish(entries, modifiers),
    })
}
