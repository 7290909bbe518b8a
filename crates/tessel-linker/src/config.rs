//! Linker configuration

use serde::{Deserialize, Serialize};

/// Machine word size of the target device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordSize {
    /// 4-byte words
    #[serde(rename = "32")]
    W32,
    /// 8-byte words
    #[serde(rename = "64")]
    W64,
}

impl WordSize {
    /// Word size in bytes
    pub fn bytes(self) -> usize {
        match self {
            WordSize::W32 => 4,
            WordSize::W64 => 8,
        }
    }

    /// log2 of the word size in bytes
    pub fn log2(self) -> u8 {
        match self {
            WordSize::W32 => 2,
            WordSize::W64 => 3,
        }
    }

    /// Round `bytes` up to the next word boundary
    pub fn round_up(self, bytes: usize) -> usize {
        let w = self.bytes();
        (bytes + w - 1) & !(w - 1)
    }
}

impl Default for WordSize {
    fn default() -> Self {
        WordSize::W64
    }
}

/// Options controlling how types are created and laid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerOptions {
    /// Target word size used for references, addresses and alignment
    pub word_size: WordSize,

    /// Allow creating descriptors for names that were never interned
    pub allow_dynamic_types: bool,

    /// Give static constants persistent storage outside the system image
    pub retain_constants: bool,
}

impl Default for LinkerOptions {
    fn default() -> Self {
        Self {
            word_size: WordSize::default(),
            allow_dynamic_types: true,
            retain_constants: true,
        }
    }
}

impl LinkerOptions {
    /// Options for a target with the given word size
    pub fn with_word_size(word_size: WordSize) -> Self {
        Self {
            word_size,
            ..Default::default()
        }
    }

    /// Options for a closed world: unknown names are rejected
    pub fn closed() -> Self {
        Self {
            allow_dynamic_types: false,
            ..Default::default()
        }
    }

    /// Parse options from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_size_round_up() {
        assert_eq!(WordSize::W32.round_up(5), 8);
        assert_eq!(WordSize::W32.round_up(8), 8);
        assert_eq!(WordSize::W64.round_up(4), 8);
        assert_eq!(WordSize::W64.round_up(0), 0);
    }

    #[test]
    fn test_options_default() {
        let options = LinkerOptions::default();
        assert_eq!(options.word_size, WordSize::W64);
        assert!(options.allow_dynamic_types);
        assert!(options.retain_constants);
    }

    #[test]
    fn test_options_from_json() {
        let options = LinkerOptions::from_json(r#"{ "word_size": "32", "retain_constants": false }"#)
            .unwrap();
        assert_eq!(options.word_size, WordSize::W32);
        assert!(options.allow_dynamic_types);
        assert!(!options.retain_constants);
    }

    #[test]
    fn test_options_closed() {
        assert!(!LinkerOptions::closed().allow_dynamic_types);
    }
}
