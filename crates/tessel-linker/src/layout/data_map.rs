//! Data-size bitmaps for endian-aware serialization
//!
//! A data map is a sequence of 2-bit entries, each holding log2 of a unit
//! size in bytes. Walking the entries in order covers the instance byte for
//! byte: fields contribute one entry, alignment padding contributes one
//! single-byte entry per padding byte. A serializer swaps each unit
//! according to its size.

use std::fmt;

const ENTRIES_PER_WORD: usize = 32;

/// Packed sequence of 2-bit log2-size entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataMap {
    len: usize,
    words: Vec<u64>,
}

impl DataMap {
    /// An empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an entry; `log2_size` must be below 4
    pub fn push(&mut self, log2_size: u8) {
        debug_assert!(log2_size < 4);
        let w = self.len / ENTRIES_PER_WORD;
        if self.words.len() <= w {
            self.words.push(0);
        }
        let shift = (self.len % ENTRIES_PER_WORD) * 2;
        self.words[w] |= ((log2_size & 0b11) as u64) << shift;
        self.len += 1;
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<u8> {
        if index >= self.len {
            return None;
        }
        let shift = (index % ENTRIES_PER_WORD) * 2;
        Some(((self.words[index / ENTRIES_PER_WORD] >> shift) & 0b11) as u8)
    }

    /// All entries in order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Bytes covered by the entries
    pub fn byte_len(&self) -> usize {
        self.iter().map(|e| 1usize << e).sum()
    }

    /// True if `self` is a prefix of `other`
    pub fn is_prefix_of(&self, other: &DataMap) -> bool {
        self.len <= other.len && (0..self.len).all(|i| self.get(i) == other.get(i))
    }

    /// Packed words (entry 0 in the low bits of word 0)
    pub fn words(&self) -> &[u64] {
        &self.words
    }
}

impl fmt::Display for DataMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataMap[")?;
        for e in self.iter() {
            write!(f, "{}", 1 << e)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut map = DataMap::new();
        map.push(2);
        map.push(0);
        map.push(3);

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(0), Some(2));
        assert_eq!(map.get(1), Some(0));
        assert_eq!(map.get(2), Some(3));
        assert_eq!(map.get(3), None);
        assert_eq!(map.byte_len(), 4 + 1 + 8);
    }

    #[test]
    fn test_spans_words() {
        let mut map = DataMap::new();
        for i in 0..40 {
            map.push((i % 4) as u8);
        }
        assert_eq!(map.words().len(), 2);
        assert_eq!(map.get(33), Some(1));
        assert_eq!(map.get(39), Some(3));
    }

    #[test]
    fn test_prefix() {
        let mut parent = DataMap::new();
        parent.push(2);
        let mut child = parent.clone();
        child.push(1);

        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
        assert!(DataMap::new().is_prefix_of(&parent));
    }

    #[test]
    fn test_display() {
        let mut map = DataMap::new();
        map.push(2);
        map.push(0);
        assert_eq!(map.to_string(), "DataMap[41]");
    }
}
