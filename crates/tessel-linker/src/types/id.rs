//! Numeric type identifiers

use std::fmt;

/// Identifier of a type descriptor
///
/// Non-negative ids are reserved for bootstrap (system) types. Ids handed
/// out on demand are encoded negative: local sequence number `n` becomes
/// `-(n + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(i32);

impl TypeId {
    /// A reserved (system) id
    pub const fn reserved(id: u16) -> Self {
        TypeId(id as i32)
    }

    /// A local id for the given sequence number
    pub fn local(seq: u32) -> Self {
        TypeId(-(seq as i32) - 1)
    }

    /// True for ids reserved at bootstrap
    pub fn is_system(self) -> bool {
        self.0 >= 0
    }

    /// Sequence number of a local id
    pub fn local_index(self) -> Option<u32> {
        if self.0 < 0 {
            Some((-(self.0 + 1)) as u32)
        } else {
            None
        }
    }

    /// Raw encoded value
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_index() {
            Some(seq) => write!(f, "local#{}", seq),
            None => write!(f, "#{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids() {
        let id = TypeId::reserved(9);
        assert!(id.is_system());
        assert_eq!(id.as_i32(), 9);
        assert_eq!(id.local_index(), None);
    }

    #[test]
    fn test_local_id_encoding() {
        let first = TypeId::local(0);
        assert_eq!(first.as_i32(), -1);
        assert!(!first.is_system());
        assert_eq!(first.local_index(), Some(0));

        let later = TypeId::local(41);
        assert_eq!(later.as_i32(), -42);
        assert_eq!(later.local_index(), Some(41));
        assert_ne!(first, later);
    }
}
