//! Named directory of stores for administrative actions.

use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Maintenance actions an administrative surface may run on a store
/// without knowing its concrete type.
pub trait StoreActioner: Send + Sync {
    /// Regenerates the store's indexes from its data.
    fn rebuild(&self) -> StoreResult<()>;
}

/// A thread-safe map from store name to [`StoreActioner`].
///
/// Usually shared as `Arc<Registrar>` between the component that opens
/// stores and the one that exposes maintenance actions.
#[derive(Default)]
pub struct Registrar {
    stores: RwLock<BTreeMap<String, Arc<dyn StoreActioner>>>,
}

impl fmt::Debug for Registrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("stores", &self.list())
            .finish()
    }
}

impl Registrar {
    /// Creates an empty registrar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` under `name`, returning the store it replaced.
    pub fn register(
        &self,
        name: impl Into<String>,
        store: Arc<dyn StoreActioner>,
    ) -> Option<Arc<dyn StoreActioner>> {
        let name = name.into();
        debug!(store = %name, "registered store");
        self.stores.write().insert(name, store)
    }

    /// Returns the store registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn StoreActioner>> {
        self.stores.read().get(name).cloned()
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }

    /// Returns the number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl StoreActioner for Counting {
        fn rebuild(&self) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl StoreActioner for Failing {
        fn rebuild(&self) -> StoreResult<()> {
            Err(StoreError::codec("broken"))
        }
    }

    #[test]
    fn registrar_register_get_list() {
        let registrar = Registrar::new();
        assert!(registrar.is_empty());

        let tasks = Arc::new(Counting::default());
        registrar.register("tasks", tasks.clone());
        registrar.register("alerts", Arc::new(Failing));

        assert_eq!(registrar.list(), vec!["alerts", "tasks"]);
        assert_eq!(registrar.len(), 2);
        assert!(registrar.get("missing").is_none());

        registrar.get("tasks").unwrap().rebuild().unwrap();
        assert_eq!(tasks.calls.load(Ordering::SeqCst), 1);
        assert!(registrar.get("alerts").unwrap().rebuild().is_err());
    }

    #[test]
    fn registrar_replaces_existing() {
        let registrar = Registrar::new();
        assert!(registrar.register("tasks", Arc::new(Failing)).is_none());
        assert!(registrar
            .register("tasks", Arc::new(Counting::default()))
            .is_some());
        assert!(registrar.get("tasks").unwrap().rebuild().is_ok());
        assert_eq!(registrar.len(), 1);
    }

    #[test]
    fn registrar_concurrent_register() {
        let registrar = Arc::new(Registrar::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registrar = Arc::clone(&registrar);
                std::thread::spawn(move || {
                    registrar.register(format!("store-{i}"), Arc::new(Counting::default()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registrar.len(), 8);
    }
}
