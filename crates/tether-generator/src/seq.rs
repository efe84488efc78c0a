use crate::Generator;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sequential id generator.
///
/// Produces `prefix` followed by a zero-padded counter, e.g. `seq000000`,
/// `seq000001`. Ids are unique within one instance; give each process its
/// own prefix or offset when several share a store.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting from `offset`.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self::with_offset(self.prefix.clone(), self.counter.load(Ordering::SeqCst))
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> String {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}{:06}", self.prefix, count)
    }
}
