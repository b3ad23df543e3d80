use std::collections::BTreeMap;
use std::sync::Mutex;

/// Counters for one entity kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Reads answered by the cache, including cached absences.
    pub hits: usize,
    /// Reads that fell through to the store.
    pub misses: usize,
    /// Conditional writes lost to a concurrent writer.
    pub conflicts: usize,
    /// Cache failures the store fallback covered.
    pub errors: usize,
}

impl KindStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Per-kind cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    kinds: Mutex<BTreeMap<String, KindStats>>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, kind: &str, f: impl FnOnce(&mut KindStats)) {
        let mut kinds = self.kinds.lock().expect("lock poisoned");
        f(kinds.entry(kind.to_string()).or_default());
    }

    pub fn record_hit(&self, kind: &str) {
        self.update(kind, |s| s.hits += 1);
    }

    pub fn record_miss(&self, kind: &str) {
        self.update(kind, |s| s.misses += 1);
    }

    pub fn record_conflict(&self, kind: &str) {
        self.update(kind, |s| s.conflicts += 1);
    }

    pub fn record_error(&self, kind: &str) {
        self.update(kind, |s| s.errors += 1);
    }

    pub fn kind(&self, kind: &str) -> KindStats {
        self.kinds
            .lock()
            .expect("lock poisoned")
            .get(kind)
            .copied()
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, KindStats> {
        self.kinds.lock().expect("lock poisoned").clone()
    }

    /// Sum over every kind.
    pub fn totals(&self) -> KindStats {
        self.kinds
            .lock()
            .expect("lock poisoned")
            .values()
            .fold(KindStats::default(), |acc, s| KindStats {
                hits: acc.hits + s.hits,
                misses: acc.misses + s.misses,
                conflicts: acc.conflicts + s.conflicts,
                errors: acc.errors + s.errors,
            })
    }
}
