//! Type completion
//!
//! The [`Linker`] owns the type registry and the global statics tables and
//! turns parsed [`TypeDefinition`]s into linked descriptors. Completion
//! happens once per type, single-threaded, before the descriptor is
//! usable: a supertype and every declared interface must be completed
//! first. [`Linker::load`] pulls definitions from a [`DefinitionSource`] and
//! completes dependencies recursively.

use crate::config::LinkerOptions;
use crate::dispatch::itable::build_interface_tables;
use crate::dispatch::method::MethodImpl;
use crate::dispatch::static_table::build_static_table;
use crate::dispatch::vtable::build_virtual_table;
use crate::error::{LinkError, LinkResult};
use crate::layout::globals::GlobalStatics;
use crate::layout::instance::{compute_instance_layout, InstanceLayout};
use crate::layout::statics::{compute_static_layout, register_global_statics};
use crate::types::descriptor::{Linkage, ResolvedConstant, TypeDescriptor, TypeState};
use crate::types::member::{FieldType, MethodBody, PoolEntry, Signature, TypeDefinition};
use crate::types::metadata::{check_member_count, MemberCategory, MemberId, MemberTable, SymbolicMetadata};
use crate::types::modifiers::TypeModifiers;
use crate::types::registry::{well_known, Namespace, TypeRegistry};
use crate::types::TypeId;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Supplies definitions by name (the class loader)
pub trait DefinitionSource: Send + Sync {
    /// Definition of `name`, if this source has one
    fn find_definition(&self, name: &str) -> Option<TypeDefinition>;
}

impl DefinitionSource for FxHashMap<String, TypeDefinition> {
    fn find_definition(&self, name: &str) -> Option<TypeDefinition> {
        self.get(name).cloned()
    }
}

/// Supplies executable bodies for placeholder methods during conversion
pub trait BodyTranslator {
    /// Translate the body of `method`, declared by `ty`
    fn translate(&self, ty: &TypeDescriptor, method: &MethodImpl) -> LinkResult<MethodBody>;
}

impl<F> BodyTranslator for F
where
    F: Fn(&TypeDescriptor, &MethodImpl) -> LinkResult<MethodBody>,
{
    fn translate(&self, ty: &TypeDescriptor, method: &MethodImpl) -> LinkResult<MethodBody> {
        self(ty, method)
    }
}

/// A member found by symbolic lookup
#[derive(Debug, Clone)]
pub struct ResolvedMember {
    /// Type declaring the member
    pub owner: Arc<TypeDescriptor>,
    /// Member category
    pub category: MemberCategory,
    /// Declaration index within the owner
    pub id: MemberId,
}

/// Links types and owns the registries they are published in
pub struct Linker {
    options: LinkerOptions,
    registry: TypeRegistry,
    globals: GlobalStatics,
}

impl Linker {
    /// Create a linker; the root and text types still need definitions
    pub fn new(options: LinkerOptions) -> Self {
        let registry = TypeRegistry::new(options.allow_dynamic_types);
        Self {
            options,
            registry,
            globals: GlobalStatics::new(),
        }
    }

    /// Create a linker with a minimal root type and text types completed
    /// and the bootstrap registry sealed
    pub fn bootstrap(options: LinkerOptions) -> LinkResult<Arc<Self>> {
        let linker = Self::new(options);
        let ns = linker.registry.bootstrap_namespace().clone();
        linker.complete_definition(&ns, TypeDefinition::class(well_known::OBJECT_NAME))?;
        for name in [well_known::STRING_NAME, well_known::BYTE_STRING_NAME] {
            linker.complete_definition(
                &ns,
                TypeDefinition::class(name)
                    .extends(well_known::OBJECT_NAME)
                    .with_modifiers(TypeModifiers::PUBLIC | TypeModifiers::FINAL),
            )?;
        }
        linker.registry.seal_bootstrap();
        Ok(Arc::new(linker))
    }

    /// Linker options
    pub fn options(&self) -> &LinkerOptions {
        &self.options
    }

    /// The type registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Process-wide global statics tables
    pub fn globals(&self) -> &GlobalStatics {
        &self.globals
    }

    /// Create a namespace below the bootstrap namespace
    pub fn create_namespace(&self, name: &str) -> Arc<Namespace> {
        self.registry.create_namespace(name)
    }

    /// The root type
    pub fn root(&self) -> LinkResult<Arc<TypeDescriptor>> {
        self.registry
            .get(well_known::OBJECT)
            .ok_or_else(|| LinkError::TypeNotFound(well_known::OBJECT_NAME.to_string()))
    }

    /// Look up a type by name, linking array types on first use
    pub fn resolve_type(&self, ns: &Arc<Namespace>, name: &str) -> LinkResult<Arc<TypeDescriptor>> {
        let ty = self.registry.get_or_create(ns, name)?;
        if ty.is_array() && ty.linkage().is_none() {
            self.link_array(&ty)?;
        }
        Ok(ty)
    }

    fn link_array(&self, ty: &Arc<TypeDescriptor>) -> LinkResult<()> {
        let root = self.root()?;
        let vtable = root.linked()?.vtable.clone();
        let modifiers = TypeModifiers::PUBLIC | TypeModifiers::FINAL | TypeModifiers::ARRAY;
        let root_converted = root.state() == TypeState::Converted;
        if ty.install(Linkage::synthetic(modifiers, Some(root), vtable, InstanceLayout::empty())) {
            ty.advance(TypeState::Loaded);
            // No methods of its own; converted together with the root.
            if root_converted {
                ty.advance(TypeState::Converted);
            }
            tracing::trace!(ty = ty.name(), "array type linked");
        }
        Ok(())
    }

    /// Complete a type from its definition
    ///
    /// Any failure leaves the descriptor in the error state; the same error
    /// is then returned for every later use of the type.
    pub fn complete_definition(
        &self,
        ns: &Arc<Namespace>,
        def: TypeDefinition,
    ) -> LinkResult<Arc<TypeDescriptor>> {
        let ty = self.registry.get_or_define(ns, &def.name)?;
        if let Some(err) = ty.error() {
            return Err(err.clone());
        }
        if ty.linkage().is_some() {
            return Err(LinkError::class_format(&def.name, "duplicate definition"));
        }
        ty.advance(TypeState::Loading);

        match self.link(ns, &ty, &def) {
            Ok(linkage) => {
                let size = linkage.instance.size;
                let slots = linkage.vtable.len();
                if !ty.install(linkage) {
                    return Err(LinkError::class_format(&def.name, "duplicate definition"));
                }
                ty.advance(TypeState::Loaded);
                tracing::debug!(ty = ty.name(), id = %ty.id(), size, slots, "type completed");
                Ok(ty)
            }
            Err(err) => Err(ty.fail(err)),
        }
    }

    fn link(
        &self,
        ns: &Arc<Namespace>,
        ty: &Arc<TypeDescriptor>,
        def: &TypeDefinition,
    ) -> LinkResult<Linkage> {
        let name = def.name.as_str();
        let is_root = ty.id() == well_known::OBJECT;
        let is_interface = def.modifiers.contains(TypeModifiers::INTERFACE);

        if def.modifiers.intersects(TypeModifiers::ARRAY | TypeModifiers::PRIMITIVE) {
            return Err(LinkError::class_format(name, "array and primitive types are synthesized"));
        }
        for (category, count) in [
            (MemberCategory::InstanceField, def.instance_fields.len()),
            (MemberCategory::StaticField, def.static_fields.len()),
            (MemberCategory::VirtualMethod, def.virtual_methods.len()),
            (MemberCategory::StaticMethod, def.static_methods.len()),
        ] {
            check_member_count(name, category, count)?;
        }
        let mut modifiers = def.modifiers.difference(TypeModifiers::COMPUTED);
        if is_interface {
            modifiers |= TypeModifiers::ABSTRACT;
        }

        let supertype = match def.supertype.as_deref() {
            Some(_) if is_root => {
                return Err(LinkError::class_format(name, "the root type has no supertype"))
            }
            Some(s) if s == name => return Err(LinkError::ClassCircularity(name.to_string())),
            Some(s) => Some(self.resolve_type(ns, s)?),
            None if is_root => None,
            None if is_interface => Some(self.root()?),
            None => return Err(LinkError::class_format(name, "missing supertype")),
        };
        let super_linkage = supertype.as_ref().map(|s| s.linked()).transpose()?;
        if let (Some(s), Some(l)) = (&supertype, super_linkage) {
            if l.modifiers.contains(TypeModifiers::INTERFACE) {
                return Err(LinkError::incompatible(name, format!("supertype {} is an interface", s)));
            }
            if l.modifiers.contains(TypeModifiers::FINAL) {
                return Err(LinkError::incompatible(name, format!("cannot extend final type {}", s)));
            }
            if is_interface && s.id() != well_known::OBJECT {
                return Err(LinkError::incompatible(name, "an interface can only extend the root type"));
            }
        }

        let mut declared = Vec::with_capacity(def.interfaces.len());
        for iface_name in &def.interfaces {
            if iface_name == name {
                return Err(LinkError::ClassCircularity(name.to_string()));
            }
            let iface = self.resolve_type(ns, iface_name)?;
            if !iface.linked()?.modifiers.contains(TypeModifiers::INTERFACE) {
                return Err(LinkError::incompatible(name, format!("{} is not an interface", iface)));
            }
            declared.push(iface);
        }

        let virtuals = build_virtual_table(ty, modifiers, supertype.as_ref(), &def.virtual_methods)?;
        let statics_table = build_static_table(ty, &def.static_methods)?;
        modifiers |= statics_table.flags;
        let itables = build_interface_tables(modifiers, supertype.as_ref(), &declared, &virtuals.table)?;

        let word = self.options.word_size;
        let instance = if is_interface && !def.instance_fields.is_empty() {
            return Err(LinkError::class_format(name, "interfaces cannot declare instance fields"));
        } else if is_root || is_interface {
            InstanceLayout::empty()
        } else if ty.id() == well_known::STRING || ty.id() == well_known::BYTE_STRING {
            super_linkage.map(|l| l.instance.clone()).unwrap_or_default()
        } else {
            compute_instance_layout(name, &def.instance_fields, super_linkage.map(|l| &l.instance), word)?
        };

        let global = modifiers.contains(TypeModifiers::GLOBAL_STATICS);
        if global && modifiers.contains(TypeModifiers::HAS_CLINIT) {
            return Err(LinkError::GlobalStaticsInitializer(name.to_string()));
        }
        let constant_storage = self.options.retain_constants
            && !modifiers.contains(TypeModifiers::SYSTEM_IMAGE)
            && def.static_fields.iter().any(|f| f.constant.is_some());
        let statics = if global {
            register_global_statics(name, &def.static_fields, &self.globals)?
        } else {
            compute_static_layout(name, &def.static_fields, word, constant_storage)?
        };
        if statics.constant_storage {
            modifiers |= TypeModifiers::EAGER_REIFICATION;
        }

        let constant_pool = def
            .constant_pool
            .iter()
            .map(|entry| match entry {
                PoolEntry::String(s) => Ok(ResolvedConstant::String(s.clone())),
                PoolEntry::Type(t) => self.resolve_type(ns, t).map(ResolvedConstant::Type),
            })
            .collect::<LinkResult<Vec<_>>>()?;

        let metadata: Arc<dyn SymbolicMetadata> = match &def.metadata {
            Some(m) => m.clone(),
            None => Arc::new(MemberTable::from_definition(def)),
        };

        Ok(Linkage {
            modifiers,
            supertype,
            declared_interfaces: declared,
            interfaces: itables.interfaces,
            interface_slot_maps: itables.slot_maps,
            virtual_methods: virtuals.methods,
            static_methods: statics_table.methods,
            vtable: virtuals.table,
            static_table: statics_table.table,
            instance,
            statics,
            constant_pool,
            metadata,
        })
    }

    /// Load `name` and everything it depends on from `source`
    pub fn load(
        &self,
        ns: &Arc<Namespace>,
        name: &str,
        source: &dyn DefinitionSource,
    ) -> LinkResult<Arc<TypeDescriptor>> {
        let mut loading = Vec::new();
        self.load_with(ns, name, source, &mut loading)
    }

    fn load_with(
        &self,
        ns: &Arc<Namespace>,
        name: &str,
        source: &dyn DefinitionSource,
        loading: &mut Vec<TypeId>,
    ) -> LinkResult<Arc<TypeDescriptor>> {
        let ty = self.registry.get_or_define(ns, name)?;
        if ty.is_array() && ty.linkage().is_none() {
            self.link_array(&ty)?;
        }
        if let Some(err) = ty.error() {
            return Err(err.clone());
        }
        if ty.linkage().is_some() {
            return Ok(ty);
        }
        if loading.contains(&ty.id()) {
            return Err(ty.fail(LinkError::ClassCircularity(name.to_string())));
        }
        if !ty.advance(TypeState::Loading) {
            return Err(LinkError::NoDefinitionFound(name.to_string()));
        }
        let Some(def) = source.find_definition(name) else {
            return Err(ty.fail(LinkError::NoDefinitionFound(name.to_string())));
        };

        tracing::trace!(ty = name, depth = loading.len(), "loading");
        loading.push(ty.id());
        let dependencies: Vec<String> = def
            .supertype
            .iter()
            .chain(def.interfaces.iter())
            .cloned()
            .collect();
        for dependency in &dependencies {
            if let Err(err) = self.load_with(ns, dependency, source, loading) {
                loading.pop();
                return Err(ty.fail(err));
            }
        }
        loading.pop();
        self.complete_definition(ns, def)
    }

    /// Supply bodies for every placeholder method of `ty`
    ///
    /// The supertype is converted first, so a type never reaches
    /// [`TypeState::Converted`] before its supertype.
    pub fn convert(&self, ty: &Arc<TypeDescriptor>, translator: &dyn BodyTranslator) -> LinkResult<()> {
        if let Some(err) = ty.error() {
            return Err(err.clone());
        }
        let linkage = ty.linked()?;
        if ty.state() >= TypeState::Converting {
            return Ok(());
        }
        if let Some(supertype) = &linkage.supertype {
            if let Err(err) = self.convert(supertype, translator) {
                return Err(ty.fail(err));
            }
        }
        ty.advance(TypeState::Converting);

        let mut translated = 0usize;
        for method in linkage.virtual_methods.iter().chain(linkage.static_methods.iter()) {
            if !method.is_placeholder() {
                continue;
            }
            match translator.translate(ty, method) {
                Ok(body) => {
                    method.resolve_body(body);
                    translated += 1;
                }
                Err(err) => return Err(ty.fail(err)),
            }
        }
        ty.advance(TypeState::Converted);
        tracing::debug!(ty = ty.name(), translated, "type converted");
        Ok(())
    }

    /// Resolve a method by name and signature, searching supertypes and
    /// then interfaces
    pub fn lookup_method(
        &self,
        ty: &Arc<TypeDescriptor>,
        name: &str,
        signature: &Signature,
        is_static: bool,
    ) -> LinkResult<ResolvedMember> {
        let category = if is_static {
            MemberCategory::StaticMethod
        } else {
            MemberCategory::VirtualMethod
        };
        ty.linked()?;
        lookup_member(ty, category, name, &signature.params, signature.ret.as_ref())
            .ok_or_else(|| LinkError::NoDefinitionFound(format!("{}.{}{}", ty, name, signature)))
    }

    /// Resolve a field by name and type, searching supertypes (and
    /// interfaces for statics)
    pub fn lookup_field(
        &self,
        ty: &Arc<TypeDescriptor>,
        name: &str,
        field_type: &FieldType,
        is_static: bool,
    ) -> LinkResult<ResolvedMember> {
        let category = if is_static {
            MemberCategory::StaticField
        } else {
            MemberCategory::InstanceField
        };
        ty.linked()?;
        lookup_member(ty, category, name, &[], Some(field_type))
            .ok_or_else(|| LinkError::NoDefinitionFound(format!("{}.{}:{}", ty, name, field_type)))
    }
}

impl std::fmt::Debug for Linker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linker")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .finish()
    }
}

fn lookup_member(
    ty: &Arc<TypeDescriptor>,
    category: MemberCategory,
    name: &str,
    params: &[FieldType],
    ret: Option<&FieldType>,
) -> Option<ResolvedMember> {
    let linkage = ty.linkage()?;
    if let Some(id) = linkage.metadata.lookup(category, name, params, ret) {
        return Some(ResolvedMember {
            owner: ty.clone(),
            category,
            id,
        });
    }
    if let Some(found) = linkage
        .supertype
        .as_ref()
        .and_then(|s| lookup_member(s, category, name, params, ret))
    {
        return Some(found);
    }
    if matches!(category, MemberCategory::VirtualMethod | MemberCategory::StaticField) {
        return linkage
            .declared_interfaces
            .iter()
            .find_map(|i| lookup_member(i, category, name, params, ret));
    }
    None
}
