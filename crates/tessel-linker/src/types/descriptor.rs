//! Type descriptors
//!
//! A descriptor is created by name before its definition is known and is
//! completed in place: the linked data is published once through a
//! `OnceCell`, the lifecycle state moves forward monotonically, and a
//! linking error is recorded once and reported on every later request.

use crate::dispatch::itable::{InterfaceSlot, InterfaceSlotMap};
use crate::dispatch::method::MethodImpl;
use crate::dispatch::static_table::StaticTable;
use crate::dispatch::vtable::{DispatchEntry, DispatchTable};
use crate::error::{LinkError, LinkResult};
use crate::layout::instance::InstanceLayout;
use crate::layout::statics::StaticLayout;
use crate::types::id::TypeId;
use crate::types::member::Signature;
use crate::types::metadata::{MemberTable, SymbolicMetadata};
use crate::types::modifiers::TypeModifiers;
use crossbeam::atomic::AtomicCell;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Lifecycle of a type, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TypeState {
    /// Name known, definition not yet supplied
    Defined,
    /// Definition is being loaded
    Loading,
    /// Layouts and tables are computed
    Loaded,
    /// Method bodies are being translated
    Converting,
    /// Every method body is available
    Converted,
    /// Linking failed; terminal
    Error,
}

/// Constant pool entry after linking
#[derive(Debug, Clone)]
pub enum ResolvedConstant {
    /// String literal
    String(Arc<str>),
    /// Linked type
    Type(Arc<TypeDescriptor>),
}

/// Everything computed when a type is completed
#[derive(Debug)]
pub struct Linkage {
    /// Declared modifiers plus computed flags
    pub modifiers: TypeModifiers,
    /// Direct supertype (`None` only for the root type and primitives)
    pub supertype: Option<Arc<TypeDescriptor>>,
    /// Interfaces as declared
    pub declared_interfaces: Vec<Arc<TypeDescriptor>>,
    /// Interfaces this type is responsible for (newly introduced ones for
    /// concrete types, the declared list otherwise)
    pub interfaces: Vec<Arc<TypeDescriptor>>,
    /// One map per entry of `interfaces`, concrete types only
    pub interface_slot_maps: Vec<InterfaceSlotMap>,
    /// Declared virtual methods
    pub virtual_methods: Vec<Arc<MethodImpl>>,
    /// Declared static methods
    pub static_methods: Vec<Arc<MethodImpl>>,
    /// Virtual dispatch table
    pub vtable: DispatchTable,
    /// Static method table
    pub static_table: StaticTable,
    /// Instance layout
    pub instance: InstanceLayout,
    /// Static layout
    pub statics: StaticLayout,
    /// Resolved constant pool
    pub constant_pool: Vec<ResolvedConstant>,
    /// Member symbol decoder
    pub metadata: Arc<dyn SymbolicMetadata>,
}

impl Linkage {
    /// Linkage of a type with no members of its own
    pub(crate) fn synthetic(
        modifiers: TypeModifiers,
        supertype: Option<Arc<TypeDescriptor>>,
        vtable: DispatchTable,
        instance: InstanceLayout,
    ) -> Self {
        Self {
            modifiers,
            supertype,
            declared_interfaces: Vec::new(),
            interfaces: Vec::new(),
            interface_slot_maps: Vec::new(),
            virtual_methods: Vec::new(),
            static_methods: Vec::new(),
            vtable,
            static_table: StaticTable::empty(),
            instance,
            statics: StaticLayout::default(),
            constant_pool: Vec::new(),
            metadata: Arc::new(MemberTable::new()),
        }
    }
}

/// Runtime descriptor of a type
pub struct TypeDescriptor {
    id: TypeId,
    name: Arc<str>,
    component: Option<Arc<TypeDescriptor>>,
    kind: TypeModifiers,
    state: AtomicCell<TypeState>,
    linkage: OnceCell<Linkage>,
    error: OnceCell<LinkError>,
    init_monitor: Mutex<()>,
    init_cond: Condvar,
}

impl TypeDescriptor {
    pub(crate) fn new(
        id: TypeId,
        name: Arc<str>,
        component: Option<Arc<TypeDescriptor>>,
        kind: TypeModifiers,
    ) -> Self {
        Self {
            id,
            name,
            component,
            kind,
            state: AtomicCell::new(TypeState::Defined),
            linkage: OnceCell::new(),
            error: OnceCell::new(),
            init_monitor: Mutex::new(()),
            init_cond: Condvar::new(),
        }
    }

    /// Type id
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Canonical name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Element type, for arrays
    pub fn component(&self) -> Option<&Arc<TypeDescriptor>> {
        self.component.as_ref()
    }

    /// True for array types
    pub fn is_array(&self) -> bool {
        self.kind.contains(TypeModifiers::ARRAY)
    }

    /// True for primitive types
    pub fn is_primitive(&self) -> bool {
        self.kind.contains(TypeModifiers::PRIMITIVE)
    }

    /// Current lifecycle state
    pub fn state(&self) -> TypeState {
        self.state.load()
    }

    /// Move the state forward to `to`
    ///
    /// Returns false when the type is already at or past `to`, or failed.
    pub(crate) fn advance(&self, to: TypeState) -> bool {
        let mut current = self.state.load();
        loop {
            if current == TypeState::Error || to <= current {
                return false;
            }
            match self.state.compare_exchange(current, to) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Record a linking failure
    ///
    /// The first error wins; the recorded error is returned.
    pub(crate) fn fail(&self, error: LinkError) -> LinkError {
        let recorded = self.error.get_or_init(|| error).clone();
        self.state.store(TypeState::Error);
        tracing::warn!(ty = %self.name, error = %recorded, "type failed to link");
        recorded
    }

    /// The recorded linking error
    pub fn error(&self) -> Option<&LinkError> {
        self.error.get()
    }

    pub(crate) fn install(&self, linkage: Linkage) -> bool {
        self.linkage.set(linkage).is_ok()
    }

    /// Linked data, if the type has been completed
    pub fn linkage(&self) -> Option<&Linkage> {
        self.linkage.get()
    }

    /// Linked data, or the reason it is unavailable
    pub fn linked(&self) -> LinkResult<&Linkage> {
        if let Some(err) = self.error.get() {
            return Err(err.clone());
        }
        self.linkage
            .get()
            .ok_or_else(|| LinkError::NoDefinitionFound(self.name.to_string()))
    }

    /// Modifiers, or the creation-time kind before linking
    pub fn modifiers(&self) -> TypeModifiers {
        self.linkage.get().map(|l| l.modifiers).unwrap_or(self.kind)
    }

    /// True for interfaces
    pub fn is_interface(&self) -> bool {
        self.modifiers().contains(TypeModifiers::INTERFACE)
    }

    /// True for abstract types
    pub fn is_abstract(&self) -> bool {
        self.modifiers().contains(TypeModifiers::ABSTRACT)
    }

    /// Direct supertype
    pub fn supertype(&self) -> Option<&Arc<TypeDescriptor>> {
        self.linkage.get().and_then(|l| l.supertype.as_ref())
    }

    /// Virtual dispatch table
    pub fn vtable(&self) -> Option<&DispatchTable> {
        self.linkage.get().map(|l| &l.vtable)
    }

    /// Instance size in bytes, zero before linking
    pub fn instance_size(&self) -> u16 {
        self.linkage.get().map(|l| l.instance.size).unwrap_or(0)
    }

    /// True if the type has a static initializer or static storage
    pub fn needs_initialization(&self) -> bool {
        self.linkage.get().is_some_and(|l| {
            l.modifiers.contains(TypeModifiers::HAS_CLINIT) || l.statics.size > 0
        })
    }

    /// Declared virtual method by name and signature
    pub fn virtual_method(&self, name: &str, signature: &Signature) -> Option<&Arc<MethodImpl>> {
        self.linkage
            .get()?
            .virtual_methods
            .iter()
            .find(|m| m.matches(name, signature))
    }

    /// Declared static method by name and signature
    pub fn static_method(&self, name: &str, signature: &Signature) -> Option<&Arc<MethodImpl>> {
        self.linkage
            .get()?
            .static_methods
            .iter()
            .find(|m| m.matches(name, signature))
    }

    /// Slot map this type itself carries for `iface`
    pub fn interface_slot_map(&self, iface: &TypeDescriptor) -> Option<&InterfaceSlotMap> {
        self.linkage
            .get()?
            .interface_slot_maps
            .iter()
            .find(|m| m.interface().id() == iface.id())
    }

    fn extends_interface(iface: &TypeDescriptor, target: &TypeDescriptor) -> bool {
        if iface.id == target.id {
            return true;
        }
        iface.linkage.get().is_some_and(|l| {
            l.declared_interfaces
                .iter()
                .any(|i| Self::extends_interface(i, target))
        })
    }

    /// True if a value of this type can be used where `other` is expected
    pub fn is_subtype_of(&self, other: &TypeDescriptor) -> bool {
        if self.id == other.id {
            return true;
        }
        if let (Some(mine), Some(theirs)) = (&self.component, &other.component) {
            return !mine.is_primitive() && !theirs.is_primitive() && mine.is_subtype_of(theirs);
        }
        let mut current = Some(self);
        while let Some(t) = current {
            if t.id == other.id {
                return true;
            }
            let Some(linkage) = t.linkage.get() else {
                return false;
            };
            if linkage
                .declared_interfaces
                .iter()
                .any(|i| Self::extends_interface(i, other))
            {
                return true;
            }
            current = linkage.supertype.as_deref();
        }
        false
    }

    /// Dispatch entry invoked by interface method `index` of `iface`
    ///
    /// The slot map is looked up on this type and then on its ancestors,
    /// and the slot is read from this type's own table.
    pub fn resolve_interface_call(
        &self,
        iface: &TypeDescriptor,
        index: usize,
    ) -> LinkResult<DispatchEntry> {
        let vtable = &self.linked()?.vtable;
        let mut current = Some(self);
        while let Some(t) = current {
            let linkage = t.linked()?;
            if let Some(map) = t.interface_slot_map(iface) {
                return match map.get(index) {
                    Some(InterfaceSlot::Slot(slot)) => vtable.get(slot as usize).cloned().ok_or_else(|| {
                        LinkError::incompatible(self.name(), format!("no virtual slot {}", slot))
                    }),
                    Some(InterfaceSlot::AbstractMethodError) => Ok(DispatchEntry::AbstractMethodError),
                    None => Err(LinkError::incompatible(
                        self.name(),
                        format!("{} has no method {}", iface.name(), index),
                    )),
                };
            }
            current = linkage.supertype.as_deref();
        }
        Err(LinkError::incompatible(
            self.name(),
            format!("does not implement {}", iface.name()),
        ))
    }

    pub(crate) fn init_monitor(&self) -> &Mutex<()> {
        &self.init_monitor
    }

    pub(crate) fn init_cond(&self) -> &Condvar {
        &self.init_cond
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state.load())
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
