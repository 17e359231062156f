//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use std::sync::atomic::{AtomicU32, Ordering};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0000", "A0001", etc. The
/// counter wraps; a tag is only ever compared with the one in flight.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", self.prefix, n)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next(), "A0000");
        assert_eq!(generator.next(), "A0001");
        assert_eq!(generator.next(), "A0002");
    }

    #[test]
    fn test_custom_prefix() {
        let generator = TagGenerator::new('T');
        assert_eq!(generator.next(), "T0000");
    }

    #[test]
    fn test_padding_grows() {
        let generator = TagGenerator::new('X');
        for _ in 0..10_000 {
            let _ = generator.next();
        }
        assert_eq!(generator.next(), "X10000");
    }

    #[test]
    fn test_wraps_instead_of_panicking() {
        let generator = TagGenerator::default();
        generator.counter.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(generator.next(), format!("A{}", u32::MAX));
        assert_eq!(generator.next(), "A0000");
    }
}
