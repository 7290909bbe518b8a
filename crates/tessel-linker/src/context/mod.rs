//! Execution contexts, per-context static storage and lazy initialization

pub mod class_state;
#[allow(clippy::module_inception)]
pub mod context;
pub mod init;

pub use class_state::{ClassState, ClassStateTable, ObjectRef};
pub use context::{ContextId, ContextRegistry, ExecutionContext, Interpreter};
pub use init::InitState;
