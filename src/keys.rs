//! Short key allocation
//!
//! Keys come from one of two sources: a random alphanumeric string of the
//! requested length, or a caller-supplied custom key passed through as is.
//! Uniqueness is not checked here; the store rejects colliding keys.

use rand::{distr::Alphanumeric, Rng};

/// Produces short keys for new mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyAllocator;

impl KeyAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Generates a random key of exactly `length` characters from `[A-Za-z0-9]`.
    ///
    /// Uses the thread-local CSPRNG, so keys are not predictable from
    /// previously issued ones.
    pub fn generate(&self, length: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }

    /// Returns the caller-supplied key unchanged.
    pub fn accept(&self, custom_key: String) -> String {
        custom_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generate_has_requested_length() {
        let allocator = KeyAllocator::new();
        for length in [1, 5, 6, 12, 64] {
            assert_eq!(allocator.generate(length).chars().count(), length);
        }
    }

    #[test]
    fn generate_uses_alphanumeric_alphabet() {
        let key = KeyAllocator::new().generate(512);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generate_produces_distinct_keys() {
        let allocator = KeyAllocator::new();
        let keys: HashSet<String> = (0..1000).map(|_| allocator.generate(12)).collect();
        assert_eq!(keys.len(), 1000);
    }

    #[test]
    fn accept_passes_custom_key_through() {
        let allocator = KeyAllocator::new();
        assert_eq!(allocator.accept("promo".to_string()), "promo");
        assert_eq!(allocator.accept("with space/!".to_string()), "with space/!");
    }
}
