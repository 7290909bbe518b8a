//! Reference bitmaps for precise garbage collection
//!
//! An oop map marks which words of an instance hold object references, so
//! the collector can trace exactly those words without conservative
//! scanning. Bit `i` describes the word at byte offset `i * word_size`.

use crate::config::WordSize;
use std::fmt;
use std::sync::Arc;

const BITS: usize = u64::BITS as usize;

/// Reference bitmap of an instance layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OopMap {
    /// Instances of up to 64 words
    Word(u64),
    /// Larger instances
    Words(Arc<[u64]>),
}

impl OopMap {
    /// A map with no references
    pub fn none() -> Self {
        OopMap::Word(0)
    }

    /// Build a map from raw bitmap words
    pub fn from_words(mut words: Vec<u64>) -> Self {
        while words.len() > 1 && words.last() == Some(&0) {
            words.pop();
        }
        match words.len() {
            0 => OopMap::Word(0),
            1 => OopMap::Word(words[0]),
            _ => OopMap::Words(words.into()),
        }
    }

    /// Raw bitmap words
    pub fn words(&self) -> &[u64] {
        match self {
            OopMap::Word(w) => std::slice::from_ref(w),
            OopMap::Words(ws) => &ws[..],
        }
    }

    /// True if the word at `index` holds a reference
    pub fn is_set(&self, index: usize) -> bool {
        self.words()
            .get(index / BITS)
            .map(|w| w & (1 << (index % BITS)) != 0)
            .unwrap_or(false)
    }

    /// Check if this map contains any references
    pub fn has_references(&self) -> bool {
        self.words().iter().any(|w| *w != 0)
    }

    /// Number of reference words
    pub fn reference_count(&self) -> usize {
        self.words().iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Word indices holding references, ascending
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.words().iter().enumerate().flat_map(|(i, &w)| {
            (0..BITS).filter(move |b| w & (1 << b) != 0).map(move |b| i * BITS + b)
        })
    }

    /// Calls `f` for each byte offset that contains a reference
    pub fn for_each_reference_offset<F>(&self, word: WordSize, base_offset: usize, mut f: F)
    where
        F: FnMut(usize),
    {
        for index in self.indices() {
            f(base_offset + index * word.bytes());
        }
    }

    /// True if every bit of `self` is also set in `other`
    pub fn is_subset_of(&self, other: &OopMap) -> bool {
        self.words()
            .iter()
            .enumerate()
            .all(|(i, w)| w & !other.words().get(i).copied().unwrap_or(0) == 0)
    }

    /// Mutable copy for extension
    pub(crate) fn to_builder(&self) -> OopMapBuilder {
        OopMapBuilder {
            words: self.words().to_vec(),
        }
    }
}

impl Default for OopMap {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Display for OopMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices: Vec<usize> = self.indices().collect();
        write!(f, "OopMap{:?}", indices)
    }
}

/// Growable bitmap used while a layout is computed
#[derive(Debug, Default)]
pub(crate) struct OopMapBuilder {
    words: Vec<u64>,
}

impl OopMapBuilder {
    pub(crate) fn set(&mut self, index: usize) {
        let w = index / BITS;
        if self.words.len() <= w {
            self.words.resize(w + 1, 0);
        }
        self.words[w] |= 1 << (index % BITS);
    }

    pub(crate) fn build(self) -> OopMap {
        OopMap::from_words(self.words)
    }
}
