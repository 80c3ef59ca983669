//! Mapping from task-id to its record, guarded by a single lock.

use super::record::TaskRecord;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

/// Keys usable as task-ids.
pub trait TaskKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> TaskKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

#[derive(Debug)]
pub(crate) struct TaskRegistry<K> {
    inner: Mutex<HashMap<K, Arc<TaskRecord>>>,
}

impl<K: TaskKey> Default for TaskRegistry<K> {
    fn default() -> Self {
        TaskRegistry {
            inner: Mutex::new(HashMap::with_capacity(16)),
        }
    }
}

impl<K: TaskKey> TaskRegistry<K> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<TaskRecord>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look a record up without creating it.
    pub(crate) fn get<Q>(&self, task_id: &Q) -> Option<Arc<TaskRecord>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().get(task_id).cloned()
    }

    /// Look a record up, inserting a fresh one when absent.
    pub(crate) fn get_or_create(&self, task_id: K) -> Arc<TaskRecord> {
        self.lock().entry(task_id).or_default().clone()
    }

    /// Erase the entry, but only if it still is `record`.
    pub(crate) fn remove<Q>(&self, task_id: &Q, record: &Arc<TaskRecord>) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.lock();
        match inner.get(task_id) {
            Some(current) if Arc::ptr_eq(current, record) => {
                inner.remove(task_id);
                true
            }
            _ => false,
        }
    }

    /// Walk every entry under the lock, keeping those for which `f` returns `true`.
    pub(crate) fn retain<F>(&self, mut f: F)
    where
        F: FnMut(&K, &Arc<TaskRecord>) -> bool,
    {
        self.lock().retain(|task_id, record| f(task_id, record));
    }

    /// Empty the registry, handing every record to the caller.
    pub(crate) fn drain(&self) -> Vec<(K, Arc<TaskRecord>)> {
        self.lock().drain().collect()
    }

    /// The owned key a borrowed id resolves to.
    #[cfg(feature = "status-report")]
    pub(crate) fn key<Q>(&self, task_id: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock()
            .get_key_value(task_id)
            .map(|(task_id, _)| task_id.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn ids(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_does_not_create() {
        let registry: TaskRegistry<String> = TaskRegistry::default();

        assert!(registry.get("job").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let registry: TaskRegistry<String> = TaskRegistry::default();

        let first = registry.get_or_create("job".to_string());
        let second = registry.get_or_create("job".to_string());
        let looked_up = registry.get("job").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &looked_up));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_only_matching_record() {
        let registry: TaskRegistry<String> = TaskRegistry::default();
        let stale = Arc::new(TaskRecord::default());
        let current = registry.get_or_create("job".to_string());

        assert!(!registry.remove("job", &stale));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("job", &current));
        assert!(registry.get("job").is_none());
    }

    #[test]
    fn test_retain_and_drain() {
        let registry: TaskRegistry<u32> = TaskRegistry::default();
        for task_id in 0..6 {
            registry.get_or_create(task_id);
        }

        registry.retain(|task_id, _| task_id % 2 == 0);
        let mut ids = registry.ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 2, 4]);

        assert_eq!(registry.drain().len(), 3);
        assert_eq!(registry.len(), 0);
    }
}
