//! Guards against submitting the same action twice while it is pending

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A single in-flight flag, e.g. for a confirm button.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl InFlight {
    /// Marks the action as started. `None` if it already is.
    pub fn try_begin(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, including when the pending future is.
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// One flag per key, e.g. per cancel button.
#[derive(Debug)]
pub struct InFlightSet<K> {
    keys: Arc<Mutex<HashSet<K>>>,
}

impl<K> Clone for InFlightSet<K> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<K> Default for InFlightSet<K> {
    fn default() -> Self {
        Self {
            keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K: Eq + Hash + Clone> InFlightSet<K> {
    pub fn try_begin(&self, key: K) -> Option<KeyGuard<K>> {
        let inserted = self
            .keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.clone());
        inserted.then(|| KeyGuard {
            keys: self.keys.clone(),
            key,
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(key)
    }
}

#[derive(Debug)]
pub struct KeyGuard<K: Eq + Hash> {
    keys: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_exclusive_until_dropped() {
        let flag = InFlight::default();
        let guard = flag.try_begin().unwrap();
        assert!(flag.is_busy());
        assert!(flag.clone().try_begin().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_begin().is_some());
    }

    #[test]
    fn keys_are_independent() {
        let set = InFlightSet::default();
        let a = set.try_begin("a").unwrap();
        assert!(set.try_begin("a").is_none());
        let _b = set.try_begin("b").unwrap();
        drop(a);
        assert!(!set.contains(&"a"));
        assert!(set.contains(&"b"));
    }
}
