use std::sync::Arc;

use log::trace;

use crate::bag::{path, Access, Bag, Value};
use crate::{Error, Result};

/// Callback invoked with the old and new merged value of an observed path.
pub type ObserverFn = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

struct Observer {
    id: String,
    path: String,
    callback: ObserverFn,
}

/// Observer registrations, kept in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    entries: Vec<Observer>,
}

impl Observers {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, id: String, path: &str, callback: ObserverFn) -> Result<()> {
        let path = path::canonical(path);
        if self.contains(&id, &path) {
            return Err(Error::DuplicateConfigObserver { id, path });
        }
        self.entries.push(Observer { id, path, callback });
        Ok(())
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.retain(|observer| observer.id != id);
    }

    pub fn contains(&self, id: &str, path: &str) -> bool {
        let path = path::canonical(path);
        self.entries
            .iter()
            .any(|observer| observer.id == id && observer.path == path)
    }

    /// Collects the notifications owed for moving from `before` to `after`.
    pub fn changes(&self, before: &Bag, after: &Bag) -> Vec<Notification> {
        self.entries
            .iter()
            .filter_map(|observer| {
                let old = before.get(&observer.path);
                let new = after.get(&observer.path);
                (old != new).then(|| Notification {
                    id: observer.id.clone(),
                    path: observer.path.clone(),
                    callback: Arc::clone(&observer.callback),
                    old,
                    new,
                })
            })
            .collect()
    }
}

/// A pending observer call, fired once the config lock is released.
pub(crate) struct Notification {
    id: String,
    path: String,
    callback: ObserverFn,
    old: Value,
    new: Value,
}

impl Notification {
    pub fn fire(self) {
        trace!("notifying observer '{}' of a change on '{}'", self.id, self.path);
        (self.callback)(&self.old, &self.new);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn noop() -> ObserverFn {
        Arc::new(|_: &Value, _: &Value| {})
    }

    #[test]
    fn test_duplicate_registration_uses_canonical_path() {
        let mut observers = Observers::default();
        observers.add("a".into(), "x.y", noop()).unwrap();

        assert!(matches!(
            observers.add("a".into(), ".x..y", noop()),
            Err(Error::DuplicateConfigObserver { ref path, .. }) if path == "x.y"
        ));
        assert!(observers.contains("a", "x..y"));
        observers.add("b".into(), "x.y", noop()).unwrap();
        observers.add("a".into(), "x", noop()).unwrap();
    }

    #[test]
    fn test_remove_drops_all_paths_of_id() {
        let mut observers = Observers::default();
        observers.add("a".into(), "x", noop()).unwrap();
        observers.add("a".into(), "y", noop()).unwrap();
        observers.add("b".into(), "x", noop()).unwrap();

        observers.remove("a");
        observers.remove("missing");

        assert!(!observers.contains("a", "x"));
        assert!(!observers.contains("a", "y"));
        assert!(observers.contains("b", "x"));
    }

    #[test]
    fn test_changes_only_for_changed_paths() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut observers = Observers::default();
        observers
            .add(
                "a".into(),
                "x",
                Arc::new(move |old: &Value, new: &Value| {
                    assert_eq!(*old, Value::Int(1));
                    assert_eq!(*new, Value::Int(2));
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        observers.add("b".into(), "y", noop()).unwrap();

        let before = Bag::from_iter([("x", 1), ("y", 5)]);
        let after = Bag::from_iter([("x", 2), ("y", 5)]);
        let notifications = observers.changes(&before, &after);
        assert_eq!(notifications.len(), 1);

        notifications.into_iter().for_each(Notification::fire);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
