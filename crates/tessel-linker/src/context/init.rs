//! Lazy type initialization
//!
//! Initialization runs at most once per (context, type). The type's
//! monitor serializes the state checks; the supertype and the static
//! initializer run outside it, so unrelated types initialize in parallel
//! and an initializer may trigger further initializations. A thread that
//! finds another thread initializing the same type waits on the type's
//! condition variable.

use crate::context::class_state::ClassState;
use crate::context::context::ExecutionContext;
use crate::error::{LinkError, LinkResult};
use crate::types::descriptor::{Linkage, TypeDescriptor, TypeState};
use crate::types::id::TypeId;
use crate::types::modifiers::TypeModifiers;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Initialization state of a type within one context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    /// No attempt yet
    NotInitialized,
    /// A thread is running the initializer
    Initializing,
    /// Storage is published
    Initialized,
    /// Initialization failed; never retried
    Failed,
}

/// Pending or failed initialization
///
/// `owner` is the initializing thread; a ticket without an owner marks the
/// type as failed.
#[derive(Debug, Clone)]
pub(crate) struct InitTicket {
    pub owner: Option<ThreadId>,
    pub storage: Arc<ClassState>,
}

impl ExecutionContext {
    fn ticket(&self, id: TypeId) -> Option<InitTicket> {
        self.tickets.lock().get(&id).cloned()
    }

    /// Initialization state of `ty` in this context
    pub fn init_state(&self, ty: &TypeDescriptor) -> InitState {
        if self.class_states.get(ty.id()).is_some() {
            return InitState::Initialized;
        }
        match self.ticket(ty.id()) {
            Some(InitTicket { owner: Some(_), .. }) => InitState::Initializing,
            Some(InitTicket { owner: None, .. }) => InitState::Failed,
            None => InitState::NotInitialized,
        }
    }

    /// Initialize `ty` in this context if it has not been initialized
    ///
    /// Returns the type's static storage, or `None` for types without a
    /// static initializer or static fields. A call made by the thread that
    /// is already initializing `ty` returns the storage being filled.
    pub fn ensure_initialized(&self, ty: &Arc<TypeDescriptor>) -> LinkResult<Option<Arc<ClassState>>> {
        let not_found = || LinkError::NoDefinitionFound(ty.name().to_string());
        let linkage = ty.linked().map_err(|_| not_found())?;

        if !ty.needs_initialization() {
            if let Some(supertype) = &linkage.supertype {
                if !ty.is_interface() {
                    self.ensure_initialized(supertype)?;
                }
            }
            return Ok(None);
        }

        let me = thread::current().id();
        let storage = {
            let mut guard = ty.init_monitor().lock();
            loop {
                if ty.state() == TypeState::Error {
                    return Err(not_found());
                }
                if let Some(state) = self.class_states.get(ty.id()) {
                    return Ok(Some(state));
                }
                match self.ticket(ty.id()) {
                    Some(InitTicket {
                        owner: Some(owner),
                        storage,
                    }) if owner == me => return Ok(Some(storage)),
                    Some(InitTicket { owner: Some(_), .. }) => {
                        tracing::trace!(context = %self.id(), ty = ty.name(), "waiting for initializer");
                        ty.init_cond().wait(&mut guard);
                    }
                    Some(InitTicket { owner: None, .. }) => return Err(not_found()),
                    None => {
                        let storage = Arc::new(ClassState::new(
                            ty.clone(),
                            &linkage.statics,
                            self.linker().options().word_size,
                        ));
                        self.tickets.lock().insert(
                            ty.id(),
                            InitTicket {
                                owner: Some(me),
                                storage: storage.clone(),
                            },
                        );
                        break storage;
                    }
                }
            }
        };

        let result = self.run_initialization(ty, linkage, &storage);

        let _guard = ty.init_monitor().lock();
        match result {
            Ok(()) => {
                self.class_states.insert(storage.clone());
                self.tickets.lock().remove(&ty.id());
                ty.init_cond().notify_all();
                tracing::debug!(context = %self.id(), ty = ty.name(), "type initialized");
                Ok(Some(storage))
            }
            Err(err) => {
                if let Some(ticket) = self.tickets.lock().get_mut(&ty.id()) {
                    ticket.owner = None;
                }
                ty.init_cond().notify_all();
                tracing::warn!(context = %self.id(), ty = ty.name(), error = %err, "initialization failed");
                Err(err)
            }
        }
    }

    fn run_initialization(
        &self,
        ty: &Arc<TypeDescriptor>,
        linkage: &Linkage,
        storage: &Arc<ClassState>,
    ) -> LinkResult<()> {
        if !ty.is_interface() {
            if let Some(supertype) = &linkage.supertype {
                self.ensure_initialized(supertype)?;
            }
        }

        if linkage.modifiers.contains(TypeModifiers::EAGER_REIFICATION) {
            for (slot, value) in linkage.statics.stored_constants() {
                storage.write_constant(slot, value);
            }
        }

        if linkage.modifiers.contains(TypeModifiers::HAS_CLINIT) {
            tracing::trace!(context = %self.id(), ty = ty.name(), "running static initializer");
            self.interpreter()
                .run_static_initializer(self, ty, storage)
                .map_err(|cause| LinkError::InitializerFailed {
                    ty: ty.name().to_string(),
                    cause,
                })?;
        }
        Ok(())
    }
}
