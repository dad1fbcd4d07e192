use dashmap::DashSet;

/// Set of previously seen strings.
///
/// The first [`duplicate`](StringFilter::duplicate) call for a value returns
/// `false` and marks it seen; every later call returns `true`. The
/// insert-or-report step is a single atomic operation on the shard that owns
/// the value, so two concurrent callers can never both observe "not seen".
///
/// Values are compared verbatim; callers lowercase names before using them as keys.
#[derive(Debug, Default)]
pub struct StringFilter {
    seen: DashSet<String>,
}

impl StringFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether `value` was seen before, marking it seen.
    pub fn duplicate(&self, value: &str) -> bool {
        if self.seen.contains(value) {
            return true;
        }
        !self.seen.insert(value.to_owned())
    }

    /// Number of distinct values seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn first_call_wins() {
        let filter = StringFilter::new();
        assert!(!filter.duplicate("www.example.com"));
        assert!(filter.duplicate("www.example.com"));
        assert!(filter.duplicate("www.example.com"));
        assert!(!filter.duplicate(""));
        assert!(filter.duplicate(""));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn exactly_one_concurrent_caller_observes_not_seen() {
        let filter = Arc::new(StringFilter::new());
        let fresh = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|s| {
            for _ in 0..16 {
                let filter = filter.clone();
                let fresh = fresh.clone();
                s.spawn(move || {
                    for i in 0..100 {
                        if !filter.duplicate(&format!("n{i}.example.com")) {
                            fresh.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(fresh.load(Ordering::SeqCst), 100);
        assert_eq!(filter.len(), 100);
    }
}
