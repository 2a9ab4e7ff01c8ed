//! Report cycle identifiers.
//!
//! Every aggregation cycle gets an id that is attached to its tracing span,
//! so the three check log lines of one cycle can be grouped together.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for short cycle ids.
static CYCLE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identifier of one report cycle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CycleId(String);

impl CycleId {
    /// Process-local id: `cycle-{counter}` with the counter as 16 hex digits.
    pub fn short() -> Self {
        let count = CYCLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("cycle-{:016x}", count))
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_short_cycle_ids_are_unique() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = CycleId::short();
            assert!(id.to_string().starts_with("cycle-"));
            assert!(ids.insert(id), "duplicate cycle id generated");
        }
    }

    #[test]
    fn test_display() {
        let id = CycleId::short();
        assert_eq!(id.to_string().len(), "cycle-".len() + 16);
    }
}
