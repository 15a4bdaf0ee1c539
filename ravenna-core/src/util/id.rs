use std::sync::atomic::{AtomicU64, Ordering};

use derive_more::Display;

/// A generated identifier. Zero is the invalid id.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct Id(pub u64);

impl Id {
    pub const INVALID: Id = Id(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// Hands out monotonically increasing non-zero ids.
///
/// Generators are plain values so they can be injected; [`Id::generate`]
/// uses the process-wide one.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub const fn new() -> IdGenerator {
        IdGenerator { next: AtomicU64::new(1) }
    }

    pub fn next(&self) -> Id {
        Id(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        IdGenerator::new()
    }
}

static PROCESS_GENERATOR: IdGenerator = IdGenerator::new();

impl Id {
    /// Draws from the process-wide generator.
    pub fn generate() -> Id {
        PROCESS_GENERATOR.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_valid() {
        let generator = IdGenerator::new();
        let a = generator.next();
        let b = generator.next();
        assert!(a.is_valid());
        assert!(b > a);
    }

    #[test]
    fn zero_is_invalid() {
        assert!(!Id::INVALID.is_valid());
        assert!(Id::generate().is_valid());
    }
}
