//! Field layout: instance offsets, GC bitmaps and static storage

pub mod data_map;
pub mod globals;
pub mod instance;
pub mod oop_map;
pub mod statics;

pub use data_map::DataMap;
pub use globals::{GlobalStatics, GlobalTableKind};
pub use instance::{compute_instance_layout, FieldInfo, InstanceLayout};
pub use oop_map::OopMap;
pub use statics::{
    compute_static_layout, register_global_statics, slots_for, StaticFieldInfo, StaticLayout,
    StaticSection, StaticStorage,
};
