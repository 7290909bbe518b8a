//! Execution contexts
//!
//! Each context sees the bootstrap namespace through its own child
//! namespace and owns the static storage of the types it initializes.

use crate::context::class_state::{ClassState, ClassStateTable};
use crate::context::init::InitTicket;
use crate::error::{LinkError, LinkResult, Throwable};
use crate::link::{DefinitionSource, Linker};
use crate::types::descriptor::TypeDescriptor;
use crate::types::id::TypeId;
use crate::types::member::TypeDefinition;
use crate::types::modifiers::TypeModifiers;
use crate::types::registry::Namespace;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Create a new unique context ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Runs code on behalf of the linker
///
/// Exceptions thrown by the executed code are returned as [`Throwable`]s.
pub trait Interpreter: Send + Sync {
    /// Run the static initializer of `ty`, writing into `statics`
    fn run_static_initializer(
        &self,
        ctx: &ExecutionContext,
        ty: &Arc<TypeDescriptor>,
        statics: &Arc<ClassState>,
    ) -> Result<(), Throwable>;

    /// Run the entry point of `ty`
    fn run_main(
        &self,
        ctx: &ExecutionContext,
        ty: &Arc<TypeDescriptor>,
        args: &[String],
    ) -> Result<(), Throwable>;
}

/// An isolated execution environment
pub struct ExecutionContext {
    id: ContextId,
    linker: Arc<Linker>,
    namespace: Arc<Namespace>,
    interpreter: Arc<dyn Interpreter>,
    pub(crate) class_states: ClassStateTable,
    pub(crate) tickets: Mutex<FxHashMap<TypeId, InitTicket>>,
}

impl ExecutionContext {
    /// Create a context with a fresh namespace
    pub fn new(linker: Arc<Linker>, interpreter: Arc<dyn Interpreter>) -> Self {
        let id = ContextId::new();
        let namespace = linker.create_namespace(&id.to_string());
        tracing::debug!(context = %id, "execution context created");
        Self {
            id,
            linker,
            namespace,
            interpreter,
            class_states: ClassStateTable::new(),
            tickets: Mutex::new(FxHashMap::default()),
        }
    }

    /// Context id
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The linker this context resolves types with
    pub fn linker(&self) -> &Arc<Linker> {
        &self.linker
    }

    /// The context's namespace
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    pub(crate) fn interpreter(&self) -> &Arc<dyn Interpreter> {
        &self.interpreter
    }

    /// Published static storage of this context
    pub fn class_states(&self) -> &ClassStateTable {
        &self.class_states
    }

    /// Look up a type from this context's namespace
    pub fn resolve_type(&self, name: &str) -> LinkResult<Arc<TypeDescriptor>> {
        self.linker.resolve_type(&self.namespace, name)
    }

    /// Complete a type in this context's namespace
    pub fn complete_definition(&self, def: TypeDefinition) -> LinkResult<Arc<TypeDescriptor>> {
        self.linker.complete_definition(&self.namespace, def)
    }

    /// Load a type and its dependencies into this context's namespace
    pub fn load(&self, name: &str, source: &dyn DefinitionSource) -> LinkResult<Arc<TypeDescriptor>> {
        self.linker.load(&self.namespace, name, source)
    }

    /// Published static storage of `ty`
    pub fn class_state(&self, ty: &TypeDescriptor) -> Option<Arc<ClassState>> {
        self.class_states.get(ty.id())
    }

    /// Initialize `ty` and run its entry point with `args`
    pub fn run_main(&self, ty: &Arc<TypeDescriptor>, args: &[String]) -> LinkResult<()> {
        let linkage = ty.linked()?;
        if !linkage.modifiers.contains(TypeModifiers::HAS_MAIN) {
            return Err(LinkError::NoDefinitionFound(format!("{}.main", ty)));
        }
        self.ensure_initialized(ty)?;
        tracing::debug!(context = %self.id, ty = ty.name(), "running entry point");
        self.interpreter
            .run_main(self, ty, args)
            .map_err(LinkError::Uncaught)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("namespace", &self.namespace.name())
            .field("class_states", &self.class_states.len())
            .finish()
    }
}

/// Registry of live execution contexts
pub struct ContextRegistry {
    contexts: DashMap<ContextId, Arc<ExecutionContext>>,
}

impl ContextRegistry {
    /// Create a new empty context registry
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
        }
    }

    /// Create a context and register it
    pub fn create(&self, linker: Arc<Linker>, interpreter: Arc<dyn Interpreter>) -> Arc<ExecutionContext> {
        let ctx = Arc::new(ExecutionContext::new(linker, interpreter));
        self.contexts.insert(ctx.id(), ctx.clone());
        ctx
    }

    /// Get a context by ID
    pub fn get(&self, id: ContextId) -> Option<Arc<ExecutionContext>> {
        self.contexts.get(&id).map(|entry| entry.clone())
    }

    /// Tear down a context, dropping its static storage
    pub fn remove(&self, id: ContextId) -> Option<Arc<ExecutionContext>> {
        let (_, ctx) = self.contexts.remove(&id)?;
        ctx.class_states.clear();
        ctx.tickets.lock().clear();
        tracing::debug!(context = %id, "execution context torn down");
        Some(ctx)
    }

    /// Number of live contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Check if no context is live
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Ids of every live context
    pub fn ids(&self) -> Vec<ContextId> {
        self.contexts.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkerOptions;

    struct Idle;

    impl Interpreter for Idle {
        fn run_static_initializer(
            &self,
            _: &ExecutionContext,
            _: &Arc<TypeDescriptor>,
            _: &Arc<ClassState>,
        ) -> Result<(), Throwable> {
            Ok(())
        }

        fn run_main(&self, _: &ExecutionContext, _: &Arc<TypeDescriptor>, _: &[String]) -> Result<(), Throwable> {
            Ok(())
        }
    }

    #[test]
    fn test_context_ids_are_unique() {
        assert_ne!(ContextId::new(), ContextId::new());
    }

    #[test]
    fn test_registry_lifecycle() {
        let linker = Linker::bootstrap(LinkerOptions::default()).unwrap();
        let registry = ContextRegistry::new();
        let a = registry.create(linker.clone(), Arc::new(Idle));
        let b = registry.create(linker, Arc::new(Idle));
        assert_eq!(registry.len(), 2);
        assert!(Arc::ptr_eq(&registry.get(a.id()).unwrap(), &a));
        assert_ne!(a.namespace().name(), b.namespace().name());

        assert!(registry.remove(a.id()).is_some());
        assert!(registry.get(a.id()).is_none());
        assert!(registry.remove(a.id()).is_none());
        assert_eq!(registry.ids(), vec![b.id()]);
    }

    #[test]
    fn test_run_main_requires_entry_point() {
        let linker = Linker::bootstrap(LinkerOptions::default()).unwrap();
        let ctx = ExecutionContext::new(linker, Arc::new(Idle));
        let ty = ctx
            .complete_definition(TypeDefinition::class("app.Tool").extends("Object"))
            .unwrap();
        assert_eq!(
            ctx.run_main(&ty, &[]).unwrap_err(),
            LinkError::NoDefinitionFound("app.Tool.main".into())
        );
    }
}
