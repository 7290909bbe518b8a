//! Method tables: linked methods, virtual and static dispatch tables, and
//! interface slot maps

pub mod itable;
pub mod method;
pub mod static_table;
pub mod vtable;

pub use itable::{interface_closure, InterfaceSlot, InterfaceSlotMap};
pub use method::MethodImpl;
pub use static_table::StaticTable;
pub use vtable::{DispatchEntry, DispatchTable};
