use std::sync::atomic::{AtomicU64, Ordering};

/// Cheap per-invocation ids: a random 128-bit seed XOR a counter.
pub(crate) struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        let seed_hi = u128::from(fastrand::u64(..));
        let seed_lo = u128::from(fastrand::u64(..));
        Self {
            seed: (seed_hi << 64) | seed_lo,
            counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    #[must_use]
    pub(crate) fn request_uuid(&self, request_seq: u64) -> uuid::Uuid {
        uuid::Uuid::from_u128(self.seed ^ u128::from(request_seq))
    }

    /// Allocate the next id.
    #[must_use]
    pub(crate) fn next_uuid(&self) -> uuid::Uuid {
        self.request_uuid(self.next_seq())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct() {
        let ids = RequestIdGenerator::new();
        let first = ids.next_uuid();
        let second = ids.next_uuid();
        assert_ne!(first, second);
        assert_eq!(ids.request_uuid(1), first);
    }
}
