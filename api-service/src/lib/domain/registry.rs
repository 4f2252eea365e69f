use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

/// Name-keyed registry of entity definitions.
///
/// `register` is insert-or-get: the first definition stored under a name wins
/// and later registrations return it unchanged, so initialization code can
/// run any number of times without producing duplicate definitions.
pub struct EntityRegistry<D> {
    entries: RwLock<HashMap<String, Arc<D>>>,
}

impl<D> EntityRegistry<D> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register `definition` under `name` unless the name is taken.
    ///
    /// # Returns
    /// The definition stored under `name` after the call
    pub fn register(&self, name: impl Into<String>, definition: D) -> Arc<D> {
        let name = name.into();

        if let Some(existing) = self.get(&name) {
            tracing::debug!(entity = %name, "Entity already registered");
            return existing;
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Another thread may have registered between the read and write locks.
        Arc::clone(entries.entry(name).or_insert_with_key(|name| {
            tracing::debug!(entity = %name, "Entity registered");
            Arc::new(definition)
        }))
    }

    pub fn get(&self, name: &str) -> Option<Arc<D>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Snapshot of all definitions, ordered by name.
    pub fn definitions(&self) -> Vec<Arc<D>> {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut pairs: Vec<(&String, &Arc<D>)> = entries.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs.into_iter().map(|(_, d)| Arc::clone(d)).collect()
    }
}

impl<D> Default for EntityRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = EntityRegistry::new();

        let first = registry.register("User", "definition A");
        let second = registry.register("User", "definition A");

        assert_eq!(*first, "definition A");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_first_definition_wins() {
        let registry = EntityRegistry::new();

        registry.register("User", "definition A");
        let returned = registry.register("User", "definition B");

        assert_eq!(*returned, "definition A");
        assert_eq!(registry.get("User").as_deref(), Some(&"definition A"));
    }

    #[test]
    fn test_names_and_lookup() {
        let registry = EntityRegistry::new();
        assert!(registry.is_empty());

        registry.register("Translation", 2);
        registry.register("User", 1);

        assert_eq!(registry.names(), vec!["Translation", "User"]);
        assert!(registry.contains("User"));
        assert!(!registry.contains("Transcription"));
        assert!(registry.get("Transcription").is_none());
        assert_eq!(
            registry.definitions().iter().map(|d| **d).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[test]
    fn test_concurrent_registration_keeps_one_definition() {
        let registry = Arc::new(EntityRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register("User", i))
            })
            .collect();

        let winners: Vec<Arc<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(registry.len(), 1);
        let stored = registry.get("User").unwrap();
        assert!(winners.iter().all(|w| Arc::ptr_eq(w, &stored)));
    }
}
