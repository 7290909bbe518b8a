//! Per-context static storage
//!
//! Each execution context owns one [`ClassState`] per initialized type. The
//! [`ClassStateTable`] keeps them in most-recently-used order behind a lock
//! that collector root scans take as well.

use crate::config::WordSize;
use crate::layout::statics::StaticLayout;
use crate::types::descriptor::TypeDescriptor;
use crate::types::id::TypeId;
use crate::types::member::ConstantValue;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Non-null object reference as stored in a reference slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(NonZeroU64);

impl ObjectRef {
    /// Reference from a raw address; `None` for null
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(ObjectRef)
    }

    /// Raw address
    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Static field values of one type in one context
///
/// Storage is a run of word slots; the first `ref_prefix` slots hold
/// references. On 32-bit words a long or double spans two slots, low
/// half first.
pub struct ClassState {
    ty: Arc<TypeDescriptor>,
    word: WordSize,
    ref_prefix: u16,
    slots: Box<[AtomicU64]>,
}

impl ClassState {
    pub(crate) fn new(ty: Arc<TypeDescriptor>, statics: &StaticLayout, word: WordSize) -> Self {
        let slots = (0..statics.size).map(|_| AtomicU64::new(0)).collect();
        Self {
            ty,
            word,
            ref_prefix: statics.ref_prefix,
            slots,
        }
    }

    /// Owning type
    pub fn type_descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the type has no static storage
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Leading slots holding references
    pub fn ref_prefix(&self) -> u16 {
        self.ref_prefix
    }

    fn mask(&self) -> u64 {
        match self.word {
            WordSize::W32 => u32::MAX as u64,
            WordSize::W64 => u64::MAX,
        }
    }

    /// Raw slot value
    pub fn get_raw(&self, slot: u16) -> Option<u64> {
        self.slots.get(slot as usize).map(|s| s.load(Ordering::Acquire))
    }

    /// Store a raw slot value, truncated to the word size
    pub fn set_raw(&self, slot: u16, value: u64) -> bool {
        match self.slots.get(slot as usize) {
            Some(s) => {
                s.store(value & self.mask(), Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Read an int (or narrower) static
    pub fn get_int(&self, slot: u16) -> Option<i32> {
        self.get_raw(slot).map(|v| v as u32 as i32)
    }

    /// Write an int (or narrower) static
    pub fn set_int(&self, slot: u16, value: i32) -> bool {
        self.set_raw(slot, value as u32 as u64)
    }

    /// Read a float static
    pub fn get_float(&self, slot: u16) -> Option<f32> {
        self.get_raw(slot).map(|v| f32::from_bits(v as u32))
    }

    /// Write a float static
    pub fn set_float(&self, slot: u16, value: f32) -> bool {
        self.set_raw(slot, value.to_bits() as u64)
    }

    /// Read a long static
    pub fn get_long(&self, slot: u16) -> Option<i64> {
        match self.word {
            WordSize::W64 => self.get_raw(slot).map(|v| v as i64),
            WordSize::W32 => {
                let low = self.get_raw(slot)?;
                let high = self.get_raw(slot.checked_add(1)?)?;
                Some(((high << 32) | low) as i64)
            }
        }
    }

    /// Write a long static
    pub fn set_long(&self, slot: u16, value: i64) -> bool {
        let bits = value as u64;
        match self.word {
            WordSize::W64 => self.set_raw(slot, bits),
            WordSize::W32 => match slot.checked_add(1) {
                Some(high) if (high as usize) < self.slots.len() => {
                    self.set_raw(slot, bits & u32::MAX as u64) && self.set_raw(high, bits >> 32)
                }
                _ => false,
            },
        }
    }

    /// Read a double static
    pub fn get_double(&self, slot: u16) -> Option<f64> {
        self.get_long(slot).map(|v| f64::from_bits(v as u64))
    }

    /// Write a double static
    pub fn set_double(&self, slot: u16, value: f64) -> bool {
        self.set_long(slot, value.to_bits() as i64)
    }

    /// Read an address static
    pub fn get_address(&self, slot: u16) -> Option<u64> {
        self.get_raw(slot)
    }

    /// Write an address static
    pub fn set_address(&self, slot: u16, value: u64) -> bool {
        self.set_raw(slot, value)
    }

    /// Read a reference static; `None` for null or a non-reference slot
    pub fn get_ref(&self, slot: u16) -> Option<ObjectRef> {
        if slot >= self.ref_prefix {
            return None;
        }
        self.get_raw(slot).and_then(ObjectRef::new)
    }

    /// Write a reference static; fails outside the reference section
    pub fn set_ref(&self, slot: u16, value: Option<ObjectRef>) -> bool {
        slot < self.ref_prefix && self.set_raw(slot, value.map(ObjectRef::raw).unwrap_or(0))
    }

    pub(crate) fn write_constant(&self, slot: u16, value: ConstantValue) -> bool {
        match value {
            ConstantValue::Long(_) | ConstantValue::Double(_) => self.set_long(slot, value.bits() as i64),
            ConstantValue::Int(_) | ConstantValue::Float(_) => self.set_raw(slot, value.bits()),
        }
    }

    /// Visit every non-null reference slot
    pub fn for_each_reference<F>(&self, mut f: F)
    where
        F: FnMut(u16, ObjectRef),
    {
        for slot in 0..self.ref_prefix {
            if let Some(r) = self.get_ref(slot) {
                f(slot, r);
            }
        }
    }
}

impl fmt::Debug for ClassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassState")
            .field("ty", &self.ty.name())
            .field("slots", &self.slots.len())
            .field("ref_prefix", &self.ref_prefix)
            .finish()
    }
}

/// Class states of one context, most recently used first
#[derive(Default)]
pub struct ClassStateTable {
    states: Mutex<VecDeque<Arc<ClassState>>>,
}

impl ClassStateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `id`, moved to the front on a hit
    pub fn get(&self, id: TypeId) -> Option<Arc<ClassState>> {
        let mut states = self.states.lock();
        let pos = states.iter().position(|s| s.ty.id() == id)?;
        if pos > 0 {
            let state = states.remove(pos)?;
            states.push_front(state);
        }
        states.front().cloned()
    }

    /// Publish a state, replacing any previous state of the same type
    pub fn insert(&self, state: Arc<ClassState>) {
        let mut states = self.states.lock();
        states.retain(|s| s.ty.id() != state.ty.id());
        states.push_front(state);
    }

    /// Remove the state of `id`
    pub fn remove(&self, id: TypeId) -> Option<Arc<ClassState>> {
        let mut states = self.states.lock();
        let pos = states.iter().position(|s| s.ty.id() == id)?;
        states.remove(pos)
    }

    /// Drop every state
    pub fn clear(&self) {
        self.states.lock().clear();
    }

    /// Number of published states
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    /// Check if no state is published
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    /// Types in most-recently-used order
    pub fn type_ids(&self) -> Vec<TypeId> {
        self.states.lock().iter().map(|s| s.ty.id()).collect()
    }

    /// Visit every reference held in static storage, holding the table lock
    pub fn for_each_root<F>(&self, mut f: F)
    where
        F: FnMut(&ClassState, u16, ObjectRef),
    {
        let states = self.states.lock();
        for state in states.iter() {
            state.for_each_reference(|slot, r| f(state, slot, r));
        }
    }
}

impl fmt::Debug for ClassStateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassStateTable").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::statics::compute_static_layout;
    use crate::types::member::{FieldDef, FieldType};
    use crate::types::modifiers::TypeModifiers;

    fn state(name: &str, seq: u32, word: WordSize) -> Arc<ClassState> {
        let fields = [
            FieldDef::new("next", FieldType::reference("app.A")),
            FieldDef::new("count", FieldType::Int),
            FieldDef::new("total", FieldType::Long),
        ];
        let layout = compute_static_layout(name, &fields, word, false).unwrap();
        let ty = Arc::new(TypeDescriptor::new(
            TypeId::local(seq),
            Arc::from(name),
            None,
            TypeModifiers::PUBLIC,
        ));
        Arc::new(ClassState::new(ty, &layout, word))
    }

    #[test]
    fn test_typed_slots_on_32_bit_words() {
        let s = state("app.A", 0, WordSize::W32);
        assert_eq!(s.len(), 4);
        assert_eq!(s.ref_prefix(), 1);
        assert!(s.set_int(1, -7));
        assert_eq!(s.get_int(1), Some(-7));
        assert!(s.set_long(2, -1_234_567_890_123));
        assert_eq!(s.get_long(2), Some(-1_234_567_890_123));
        assert!(!s.set_long(3, 1));
        assert!(s.set_double(2, 0.5));
        assert_eq!(s.get_double(2), Some(0.5));
    }

    #[test]
    fn test_reference_slots() {
        let s = state("app.A", 0, WordSize::W64);
        assert_eq!(s.get_ref(0), None);
        let r = ObjectRef::new(0x1000).unwrap();
        assert!(s.set_ref(0, Some(r)));
        assert!(!s.set_ref(1, Some(r)));
        let mut seen = Vec::new();
        s.for_each_reference(|slot, r| seen.push((slot, r.raw())));
        assert_eq!(seen, vec![(0, 0x1000)]);
    }

    #[test]
    fn test_table_moves_hits_to_front() {
        let table = ClassStateTable::new();
        let a = state("app.A", 0, WordSize::W64);
        let b = state("app.B", 1, WordSize::W64);
        table.insert(a.clone());
        table.insert(b.clone());
        assert_eq!(table.type_ids(), vec![TypeId::local(1), TypeId::local(0)]);
        assert!(Arc::ptr_eq(&table.get(TypeId::local(0)).unwrap(), &a));
        assert_eq!(table.type_ids(), vec![TypeId::local(0), TypeId::local(1)]);
        assert!(table.get(TypeId::local(5)).is_none());
    }

    #[test]
    fn test_roots_cover_every_state() {
        let table = ClassStateTable::new();
        let a = state("app.A", 0, WordSize::W64);
        let b = state("app.B", 1, WordSize::W64);
        a.set_ref(0, ObjectRef::new(8));
        b.set_ref(0, ObjectRef::new(16));
        table.insert(a);
        table.insert(b);
        let mut roots = Vec::new();
        table.for_each_root(|state, _, r| roots.push((state.type_descriptor().name().to_string(), r.raw())));
        roots.sort();
        assert_eq!(roots, vec![("app.A".to_string(), 8), ("app.B".to_string(), 16)]);
    }
}
