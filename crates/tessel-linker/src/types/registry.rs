//! Type registry
//!
//! The registry interns type descriptors by name and assigns their ids.
//! Names are resolved through a namespace chain: each execution context
//! gets a child namespace of the bootstrap namespace, searched child first.

use crate::dispatch::vtable::DispatchTable;
use crate::error::{LinkError, LinkResult};
use crate::layout::instance::InstanceLayout;
use crate::types::descriptor::{Linkage, TypeDescriptor, TypeState};
use crate::types::id::TypeId;
use crate::types::modifiers::TypeModifiers;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Reserved ids and names of the bootstrap types
pub mod well_known {
    use crate::types::id::TypeId;

    /// `void`
    pub const VOID: TypeId = TypeId::reserved(0);
    /// `boolean`
    pub const BOOLEAN: TypeId = TypeId::reserved(1);
    /// `byte`
    pub const BYTE: TypeId = TypeId::reserved(2);
    /// `char`
    pub const CHAR: TypeId = TypeId::reserved(3);
    /// `short`
    pub const SHORT: TypeId = TypeId::reserved(4);
    /// `int`
    pub const INT: TypeId = TypeId::reserved(5);
    /// `float`
    pub const FLOAT: TypeId = TypeId::reserved(6);
    /// `long`
    pub const LONG: TypeId = TypeId::reserved(7);
    /// `double`
    pub const DOUBLE: TypeId = TypeId::reserved(8);
    /// Root of the class hierarchy
    pub const OBJECT: TypeId = TypeId::reserved(9);
    /// Text backed by a char array
    pub const STRING: TypeId = TypeId::reserved(10);
    /// Text backed by a byte array
    pub const BYTE_STRING: TypeId = TypeId::reserved(11);
    /// First reserved id not used by the bootstrap types
    pub const FIRST_FREE: u16 = 12;

    /// Name of the root type
    pub const OBJECT_NAME: &str = "Object";
    /// Name of the char-array text type
    pub const STRING_NAME: &str = "String";
    /// Name of the byte-array text type
    pub const BYTE_STRING_NAME: &str = "ByteString";

    /// Primitive names (their descriptor characters) and ids
    pub const PRIMITIVES: [(&str, TypeId); 9] = [
        ("V", VOID),
        ("Z", BOOLEAN),
        ("B", BYTE),
        ("C", CHAR),
        ("S", SHORT),
        ("I", INT),
        ("F", FLOAT),
        ("J", LONG),
        ("D", DOUBLE),
    ];
}

/// A scope of type names
pub struct Namespace {
    name: Arc<str>,
    parent: Option<Arc<Namespace>>,
    types: RwLock<FxHashMap<Arc<str>, Arc<TypeDescriptor>>>,
}

impl Namespace {
    fn new(name: &str, parent: Option<Arc<Namespace>>) -> Arc<Self> {
        Arc::new(Self {
            name: Arc::from(name),
            parent,
            types: RwLock::new(FxHashMap::default()),
        })
    }

    /// Namespace name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enclosing namespace
    pub fn parent(&self) -> Option<&Arc<Namespace>> {
        self.parent.as_ref()
    }

    /// Type installed directly in this namespace
    pub fn find_local(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.read().get(name).cloned()
    }

    /// Type visible from this namespace, searching parents
    pub fn find(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        let mut current = Some(self);
        while let Some(ns) = current {
            if let Some(ty) = ns.find_local(name) {
                return Some(ty);
            }
            current = ns.parent.as_deref();
        }
        None
    }

    /// Number of types installed directly here
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Check if no types are installed here
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Types installed directly here
    pub fn types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.types.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("types", &self.len())
            .finish()
    }
}

/// Interns type descriptors and hands out ids
pub struct TypeRegistry {
    bootstrap: Arc<Namespace>,
    by_id: RwLock<FxHashMap<TypeId, Arc<TypeDescriptor>>>,
    next_local: AtomicU32,
    sealed: AtomicBool,
    allow_dynamic: bool,
}

impl TypeRegistry {
    /// Create a registry holding the primitive types, already linked, and
    /// the root and text types awaiting their definitions
    pub fn new(allow_dynamic: bool) -> Self {
        let registry = Self {
            bootstrap: Namespace::new("bootstrap", None),
            by_id: RwLock::new(FxHashMap::default()),
            next_local: AtomicU32::new(0),
            sealed: AtomicBool::new(false),
            allow_dynamic,
        };
        for (name, id) in well_known::PRIMITIVES {
            let ty = registry.install(
                &registry.bootstrap,
                name,
                None,
                TypeModifiers::PUBLIC | TypeModifiers::FINAL | TypeModifiers::PRIMITIVE,
                Some(id),
            );
            ty.install(Linkage::synthetic(
                TypeModifiers::PUBLIC | TypeModifiers::FINAL | TypeModifiers::PRIMITIVE,
                None,
                DispatchTable::empty(),
                InstanceLayout::empty(),
            ));
            ty.advance(TypeState::Converted);
        }
        for (name, id) in [
            (well_known::OBJECT_NAME, well_known::OBJECT),
            (well_known::STRING_NAME, well_known::STRING),
            (well_known::BYTE_STRING_NAME, well_known::BYTE_STRING),
        ] {
            registry.install(&registry.bootstrap, name, None, TypeModifiers::empty(), Some(id));
        }
        registry
    }

    /// The bootstrap namespace
    pub fn bootstrap_namespace(&self) -> &Arc<Namespace> {
        &self.bootstrap
    }

    /// Create a namespace whose parent is the bootstrap namespace
    pub fn create_namespace(&self, name: &str) -> Arc<Namespace> {
        Namespace::new(name, Some(self.bootstrap.clone()))
    }

    /// Descriptor by id
    pub fn get(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.by_id.read().get(&id).cloned()
    }

    /// Number of descriptors created so far
    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    /// Check if the registry holds no descriptors
    pub fn is_empty(&self) -> bool {
        self.by_id.read().is_empty()
    }

    /// True once bootstrap registration is closed
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Close bootstrap registration
    pub fn seal_bootstrap(&self) {
        self.sealed.store(true, Ordering::Release);
        tracing::debug!(types = self.len(), "bootstrap registry sealed");
    }

    fn install(
        &self,
        ns: &Arc<Namespace>,
        name: &str,
        component: Option<Arc<TypeDescriptor>>,
        kind: TypeModifiers,
        reserved: Option<TypeId>,
    ) -> Arc<TypeDescriptor> {
        let mut types = ns.types.write();
        if let Some(existing) = types.get(name) {
            return existing.clone();
        }
        let id = reserved.unwrap_or_else(|| TypeId::local(self.next_local.fetch_add(1, Ordering::Relaxed)));
        let ty = Arc::new(TypeDescriptor::new(id, Arc::from(name), component, kind));
        types.insert(ty.name_arc().clone(), ty.clone());
        self.by_id.write().insert(id, ty.clone());
        tracing::trace!(ty = name, %id, namespace = ns.name(), "type created");
        ty
    }

    /// Namespace in the chain from `ns` that directly holds `ty`
    fn home_of(ns: &Arc<Namespace>, ty: &TypeDescriptor) -> Arc<Namespace> {
        let mut current = ns;
        loop {
            if current.find_local(ty.name()).is_some_and(|t| t.id() == ty.id()) {
                return current.clone();
            }
            match &current.parent {
                Some(parent) => current = parent,
                None => return ns.clone(),
            }
        }
    }

    /// Look up `name` from `ns`, creating a descriptor if it is unknown
    ///
    /// Array names (`[` followed by the component name) create the
    /// component first and live in the component's namespace.
    pub fn get_or_create(&self, ns: &Arc<Namespace>, name: &str) -> LinkResult<Arc<TypeDescriptor>> {
        self.lookup_or_install(ns, name, self.allow_dynamic)
    }

    /// Descriptor for a type whose definition is being supplied
    ///
    /// Unlike [`TypeRegistry::get_or_create`] this ignores the dynamic
    /// creation policy: a definition always gets a descriptor.
    pub(crate) fn get_or_define(&self, ns: &Arc<Namespace>, name: &str) -> LinkResult<Arc<TypeDescriptor>> {
        self.lookup_or_install(ns, name, true)
    }

    fn lookup_or_install(
        &self,
        ns: &Arc<Namespace>,
        name: &str,
        create: bool,
    ) -> LinkResult<Arc<TypeDescriptor>> {
        if let Some(ty) = ns.find(name) {
            return Ok(ty);
        }
        if let Some(component_name) = name.strip_prefix('[') {
            if component_name.is_empty() || component_name == "V" {
                return Err(LinkError::TypeNotFound(name.to_string()));
            }
            let component = self.lookup_or_install(ns, component_name, create)?;
            let home = Self::home_of(ns, &component);
            return Ok(self.install(
                &home,
                name,
                Some(component),
                TypeModifiers::PUBLIC | TypeModifiers::FINAL | TypeModifiers::ARRAY,
                None,
            ));
        }
        if !create {
            return Err(LinkError::TypeNotFound(name.to_string()));
        }
        Ok(self.install(ns, name, None, TypeModifiers::empty(), None))
    }

    /// Create a bootstrap type with a reserved id
    ///
    /// Repeating a registration with the same name and id is idempotent.
    pub fn intern_system_type(&self, name: &str, reserved: u16) -> LinkResult<Arc<TypeDescriptor>> {
        let id = TypeId::reserved(reserved);
        let unavailable = || LinkError::ReservedId {
            id: id.as_i32(),
            name: name.to_string(),
        };
        if let Some(existing) = self.bootstrap.find_local(name) {
            return if existing.id() == id {
                Ok(existing)
            } else {
                Err(unavailable())
            };
        }
        if self.is_sealed() || self.by_id.read().contains_key(&id) {
            return Err(unavailable());
        }
        let (component, kind) = match name.strip_prefix('[') {
            Some(component_name) => (
                Some(self.get_or_create(&self.bootstrap, component_name)?),
                TypeModifiers::PUBLIC | TypeModifiers::FINAL | TypeModifiers::ARRAY,
            ),
            None => (None, TypeModifiers::empty()),
        };
        Ok(self.install(&self.bootstrap, name, component, kind, Some(id)))
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
