//! Interface slot maps
//!
//! A concrete type carries one slot map per interface it newly introduces:
//! interfaces already implemented by its nearest concrete ancestor are
//! served by that ancestor's maps.

use crate::dispatch::vtable::DispatchTable;
use crate::error::LinkResult;
use crate::types::descriptor::TypeDescriptor;
use crate::types::modifiers::{TypeModifiers, Visibility};
use std::sync::Arc;

/// Where an interface method lands in an implementing type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceSlot {
    /// Virtual slot of the implementation
    Slot(u16),
    /// No public implementation exists
    AbstractMethodError,
}

/// Interface method index to virtual slot, for one interface
#[derive(Debug, Clone)]
pub struct InterfaceSlotMap {
    interface: Arc<TypeDescriptor>,
    slots: Arc<[InterfaceSlot]>,
}

impl InterfaceSlotMap {
    /// The interface this map serves
    pub fn interface(&self) -> &Arc<TypeDescriptor> {
        &self.interface
    }

    /// Number of interface methods
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the interface declares no methods
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot for interface method `index`
    pub fn get(&self, index: usize) -> Option<InterfaceSlot> {
        self.slots.get(index).copied()
    }

    /// All slots in interface method order
    pub fn slots(&self) -> &[InterfaceSlot] {
        &self.slots
    }
}

fn add_with_supers(acc: &mut Vec<Arc<TypeDescriptor>>, iface: &Arc<TypeDescriptor>) {
    if acc.iter().any(|i| i.id() == iface.id()) {
        return;
    }
    acc.push(iface.clone());
    if let Some(linkage) = iface.linkage() {
        for sup in &linkage.declared_interfaces {
            add_with_supers(acc, sup);
        }
    }
}

/// `declared` plus every interface they extend, without duplicates
pub fn interface_closure(declared: &[Arc<TypeDescriptor>]) -> Vec<Arc<TypeDescriptor>> {
    let mut acc = Vec::new();
    for iface in declared {
        add_with_supers(&mut acc, iface);
    }
    acc
}

/// Every interface a type and its ancestors implement
fn implemented_by(ty: &Arc<TypeDescriptor>) -> Vec<Arc<TypeDescriptor>> {
    let mut acc = Vec::new();
    let mut current = Some(ty.clone());
    while let Some(t) = current {
        let Some(linkage) = t.linkage() else { break };
        for iface in &linkage.declared_interfaces {
            add_with_supers(&mut acc, iface);
        }
        current = linkage.supertype.clone();
    }
    acc
}

fn slot_map(iface: &Arc<TypeDescriptor>, vtable: &DispatchTable) -> LinkResult<InterfaceSlotMap> {
    let linkage = iface.linked()?;
    let len = linkage
        .virtual_methods
        .iter()
        .filter_map(|m| m.slot())
        .map(|s| s as usize + 1)
        .max()
        .unwrap_or(0);
    let mut slots = vec![InterfaceSlot::AbstractMethodError; len];

    for method in &linkage.virtual_methods {
        let Some(index) = method.slot() else { continue };
        let implementation = vtable.iter().filter_map(|e| e.method()).find(|c| {
            c.matches(method.name(), method.signature())
                && c.visibility() == Visibility::Public
                && !c.is_abstract()
        });
        if let Some(slot) = implementation.and_then(|c| c.slot()) {
            slots[index as usize] = InterfaceSlot::Slot(slot);
        }
    }

    Ok(InterfaceSlotMap {
        interface: iface.clone(),
        slots: slots.into(),
    })
}

pub(crate) struct InterfaceTableBuild {
    pub interfaces: Vec<Arc<TypeDescriptor>>,
    pub slot_maps: Vec<InterfaceSlotMap>,
}

/// Compute the interface set and slot maps of a type
///
/// Abstract types and interfaces keep their declared list and get no maps;
/// their obligations are resolved by the first concrete descendant.
pub(crate) fn build_interface_tables(
    modifiers: TypeModifiers,
    supertype: Option<&Arc<TypeDescriptor>>,
    declared: &[Arc<TypeDescriptor>],
    vtable: &DispatchTable,
) -> LinkResult<InterfaceTableBuild> {
    if modifiers.intersects(TypeModifiers::ABSTRACT | TypeModifiers::INTERFACE) {
        return Ok(InterfaceTableBuild {
            interfaces: declared.to_vec(),
            slot_maps: Vec::new(),
        });
    }

    let mut working = interface_closure(declared);
    let mut current = supertype.cloned();
    while let Some(ancestor) = current {
        let linkage = ancestor.linked()?;
        if !linkage.modifiers.contains(TypeModifiers::ABSTRACT) {
            let covered = implemented_by(&ancestor);
            working.retain(|i| !covered.iter().any(|c| c.id() == i.id()));
            break;
        }
        for iface in &linkage.declared_interfaces {
            add_with_supers(&mut working, iface);
        }
        current = linkage.supertype.clone();
    }

    let slot_maps = working
        .iter()
        .map(|iface| slot_map(iface, vtable))
        .collect::<LinkResult<Vec<_>>>()?;
    Ok(InterfaceTableBuild {
        interfaces: working,
        slot_maps,
    })
}
