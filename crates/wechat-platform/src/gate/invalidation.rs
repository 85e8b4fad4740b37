//! Runtime-mutable set of error classifiers that mark a session as invalid.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::ApiError;

type CodePredicate = Arc<dyn Fn(i64) -> bool + Send + Sync>;

#[derive(Clone)]
enum Classifier {
    Code(i64),
    Predicate(CodePredicate),
}

impl Classifier {
    fn matches(&self, code: i64) -> bool {
        match self {
            Classifier::Code(c) => *c == code,
            Classifier::Predicate(f) => f(code),
        }
    }
}

#[derive(Default)]
struct Entries {
    next_key: u64,
    items: Vec<(u64, Classifier)>,
}

impl Entries {
    fn push(&mut self, classifier: Classifier) -> u64 {
        self.next_key += 1;
        let key = self.next_key;
        self.items.push((key, classifier));
        key
    }
}

/// Classifiers deciding whether an [`ApiError`] means "session no longer valid".
///
/// Cloning yields another handle to the same set.
#[derive(Clone, Default)]
pub struct InvalidationSet {
    entries: Arc<Mutex<Entries>>,
}

impl InvalidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes(codes: impl IntoIterator<Item = i64>) -> Self {
        let set = Self::new();
        {
            let mut entries = set.entries.lock();
            for code in codes {
                entries.push(Classifier::Code(code));
            }
        }
        set
    }

    /// Register a literal code. Registering a code twice returns a handle to
    /// the existing registration.
    pub fn add_code(&self, code: i64) -> Deregistration {
        let mut entries = self.entries.lock();
        let existing = entries
            .items
            .iter()
            .find(|(_, c)| matches!(c, Classifier::Code(v) if *v == code))
            .map(|(key, _)| *key);
        let key = existing.unwrap_or_else(|| entries.push(Classifier::Code(code)));
        Deregistration {
            entries: Arc::downgrade(&self.entries),
            key,
        }
    }

    /// Register a predicate over error codes.
    pub fn add_predicate<F>(&self, predicate: F) -> Deregistration
    where
        F: Fn(i64) -> bool + Send + Sync + 'static,
    {
        let key = self
            .entries
            .lock()
            .push(Classifier::Predicate(Arc::new(predicate)));
        Deregistration {
            entries: Arc::downgrade(&self.entries),
            key,
        }
    }

    /// Remove every literal registration of `code`. Returns whether any was removed.
    pub fn remove_code(&self, code: i64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.items.len();
        entries
            .items
            .retain(|(_, c)| !matches!(c, Classifier::Code(v) if *v == code));
        entries.items.len() != before
    }

    pub fn contains_code(&self, code: i64) -> bool {
        self.entries
            .lock()
            .items
            .iter()
            .any(|(_, c)| matches!(c, Classifier::Code(v) if *v == code))
    }

    /// Whether `code` is matched by any classifier. Code `0` never matches.
    pub fn matches_code(&self, code: i64) -> bool {
        if code == 0 {
            return false;
        }
        // Snapshot so user predicates run without the lock held.
        let snapshot: Vec<Classifier> = self
            .entries
            .lock()
            .items
            .iter()
            .map(|(_, c)| c.clone())
            .collect();
        snapshot.iter().any(|c| c.matches(code))
    }

    pub fn matches(&self, error: &ApiError) -> bool {
        self.matches_code(error.code)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for InvalidationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        let mut list = f.debug_list();
        for (_, c) in &entries.items {
            match c {
                Classifier::Code(code) => list.entry(code),
                Classifier::Predicate(_) => list.entry(&"<predicate>"),
            };
        }
        list.finish()
    }
}

/// Handle returned by registrations; call [`Deregistration::deregister`] to undo.
///
/// Dropping the handle keeps the registration in place.
#[derive(Debug, Clone)]
#[must_use = "dropping the handle keeps the classifier registered"]
pub struct Deregistration {
    entries: Weak<Mutex<Entries>>,
    key: u64,
}

impl Deregistration {
    /// Remove the registration. Returns whether it was still present.
    pub fn deregister(self) -> bool {
        let Some(entries) = self.entries.upgrade() else {
            return false;
        };
        let mut entries = entries.lock();
        let before = entries.items.len();
        entries.items.retain(|(key, _)| *key != self.key);
        entries.items.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codes_match() {
        let set = InvalidationSet::with_codes([300334, 300330]);
        assert!(set.matches(&ApiError::new(300330, None)));
        assert!(!set.matches(&ApiError::new(300333, None)));
        assert!(!set.matches_code(0));
    }

    #[test]
    fn test_add_and_deregister_code() {
        let set = InvalidationSet::with_codes([-330]);
        let handle = set.add_code(-331);
        assert!(set.matches_code(-331));
        assert!(handle.deregister());
        assert!(!set.matches_code(-331));
        assert!(set.matches_code(-330));
    }

    #[test]
    fn test_duplicate_code_shares_registration() {
        let set = InvalidationSet::with_codes([-330]);
        let handle = set.add_code(-330);
        assert_eq!(set.len(), 1);
        assert!(handle.deregister());
        assert!(set.is_empty());
    }

    #[test]
    fn test_predicate_registration() {
        let set = InvalidationSet::new();
        let handle = set.add_predicate(|code| (-399..=-300).contains(&code));
        assert!(set.matches_code(-350));
        assert!(!set.matches_code(-400));
        assert!(handle.deregister());
        assert!(!set.matches_code(-350));
    }

    #[test]
    fn test_remove_code_and_stale_handle() {
        let set = InvalidationSet::with_codes([1, 2]);
        let handle = set.add_code(3);
        assert!(set.remove_code(3));
        assert!(!set.remove_code(3));
        assert!(!handle.deregister());
        assert!(set.contains_code(1));
    }
}
