//! Process-wide cache of the last observed state per session name.

use crate::session::Session;
use parking_lot::Mutex;
use std::collections::HashMap;

struct Entry {
    session: Session,
    /// Monotonic update stamp for least-recently-updated eviction.
    touched: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    clock: u64,
}

/// In-memory session cache. Never the source of truth: a fresh engine poll
/// always overwrites what is stored here.
///
/// All reads and writes for a name run under one short critical section
/// that never spans an engine call.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    capacity: Option<usize>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: None,
        }
    }

    /// Registry holding at most `capacity` sessions; the least recently
    /// updated entry is evicted first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Session> {
        self.inner
            .lock()
            .entries
            .get(name)
            .map(|e| e.session.clone())
    }

    pub fn put(&self, name: &str, session: Session) {
        self.modify(name, |slot| *slot = Some(session));
    }

    pub fn remove(&self, name: &str) -> Option<Session> {
        self.inner.lock().entries.remove(name).map(|e| e.session)
    }

    /// Atomic read-modify-write of one entry. Setting the slot to `None`
    /// removes it.
    pub fn modify<R>(&self, name: &str, f: impl FnOnce(&mut Option<Session>) -> R) -> R {
        let mut inner = self.inner.lock();
        let mut slot = inner.entries.remove(name).map(|e| e.session);
        let out = f(&mut slot);
        if let Some(session) = slot {
            inner.clock += 1;
            let touched = inner.clock;
            inner
                .entries
                .insert(name.to_string(), Entry { session, touched });
            if let Some(cap) = self.capacity {
                evict(&mut inner.entries, cap);
            }
        }
        out
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn evict(entries: &mut HashMap<String, Entry>, capacity: usize) {
    while entries.len() > capacity {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.touched)
            .map(|(k, _)| k.clone());
        match oldest {
            Some(name) => {
                tracing::debug!(session = %name, "registry full, evicting");
                entries.remove(&name);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    #[test]
    fn put_get_remove() {
        let reg = SessionRegistry::new();
        assert!(reg.get("a").is_none());
        reg.put("a", Session::new("a", SessionState::Starting));
        assert_eq!(reg.get("a").unwrap().state, SessionState::Starting);
        reg.put("a", Session::new("a", SessionState::Working));
        assert_eq!(reg.get("a").unwrap().state, SessionState::Working);
        assert!(reg.remove("a").is_some());
        assert!(reg.get("a").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn modify_can_clear_entry() {
        let reg = SessionRegistry::new();
        reg.put("a", Session::new("a", SessionState::Failed));
        let prior = reg.modify("a", |slot| slot.take().map(|s| s.state));
        assert_eq!(prior, Some(SessionState::Failed));
        assert!(reg.get("a").is_none());
    }

    #[test]
    fn evicts_least_recently_updated() {
        let reg = SessionRegistry::with_capacity(2);
        reg.put("a", Session::new("a", SessionState::Working));
        reg.put("b", Session::new("b", SessionState::Working));
        // refresh "a" so "b" becomes the oldest
        reg.put("a", Session::new("a", SessionState::Working));
        reg.put("c", Session::new("c", SessionState::Starting));
        assert_eq!(reg.len(), 2);
        assert!(reg.get("a").is_some());
        assert!(reg.get("b").is_none());
        assert!(reg.get("c").is_some());
    }

    #[test]
    fn reads_do_not_refresh_eviction_order() {
        let reg = SessionRegistry::with_capacity(1);
        reg.put("a", Session::new("a", SessionState::Working));
        let _ = reg.get("a");
        reg.put("b", Session::new("b", SessionState::Working));
        assert!(reg.get("a").is_none());
        assert_eq!(reg.names(), vec!["b".to_string()]);
    }
}
