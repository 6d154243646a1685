//! Index definitions and store configuration.

use crate::error::{StoreError, StoreResult};
use crate::object::BinaryObject;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Name of the index every store gets by default; derives the object ID.
pub const ID_INDEX: &str = "id";

/// Default name of the data section.
pub const DEFAULT_DATA_PREFIX: &str = "data";

/// Default name of the index section.
pub const DEFAULT_INDEXES_PREFIX: &str = "indexes";

/// Derives an index value from an object.
pub type ValueFn<O> = Arc<dyn Fn(&O) -> StoreResult<String> + Send + Sync>;

/// A named mapping from a derived value to an object ID.
///
/// For a unique index the index key is the derived value itself. For a
/// non-unique index the object ID is appended (`value/id`), so objects
/// sharing a value each get their own entry and sort by ID within it.
///
/// Entries sort by the raw key, not by value then ID. When one value is a
/// prefix of another and the next character sorts below `/`, the longer
/// value comes first: `a-b/2` lists before `a/1`.
pub struct Index<O> {
    name: String,
    unique: bool,
    value_fn: ValueFn<O>,
}

impl<O> Clone for Index<O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            unique: self.unique,
            value_fn: Arc::clone(&self.value_fn),
        }
    }
}

impl<O> fmt::Debug for Index<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .finish_non_exhaustive()
    }
}

impl<O: BinaryObject> Index<O> {
    /// Creates a non-unique index.
    pub fn new<F>(name: impl Into<String>, value_fn: F) -> Self
    where
        F: Fn(&O) -> StoreResult<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            unique: false,
            value_fn: Arc::new(value_fn),
        }
    }

    /// The index over object IDs.
    #[must_use]
    pub fn id() -> Self {
        Self::new(ID_INDEX, |o: &O| Ok(o.object_id().to_string())).unique()
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the index enforces uniqueness.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the derived value for `object`.
    ///
    /// # Errors
    ///
    /// Returns whatever the value function returns.
    pub fn value(&self, object: &O) -> StoreResult<String> {
        (self.value_fn)(object)
    }

    /// Returns the index key component for `object`: the derived value,
    /// plus `/id` for a non-unique index.
    ///
    /// # Errors
    ///
    /// Returns whatever the value function returns.
    pub fn value_of(&self, object: &O) -> StoreResult<String> {
        let value = self.value(object)?;
        if self.unique {
            Ok(value)
        } else {
            Ok(format!("{value}/{}", object.object_id()))
        }
    }
}

/// Configuration of an [`crate::IndexedStore`].
///
/// Keys are laid out as:
///
/// ```text
/// /<prefix>/<data_prefix>/<id>                          -> object bytes
/// /<prefix>/<indexes_prefix>/<index>/<value>[/<id>]     -> id
/// ```
#[derive(Debug, Clone)]
pub struct IndexedStoreConfig<O> {
    /// Top-level key prefix of the store.
    pub prefix: String,
    /// Name of the data section.
    pub data_prefix: String,
    /// Name of the index section.
    pub indexes_prefix: String,
    /// Configured indexes.
    pub indexes: Vec<Index<O>>,
}

impl<O: BinaryObject> IndexedStoreConfig<O> {
    /// Creates the default configuration: `data` and `indexes` sections and
    /// the unique [`ID_INDEX`].
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            data_prefix: DEFAULT_DATA_PREFIX.to_string(),
            indexes_prefix: DEFAULT_INDEXES_PREFIX.to_string(),
            indexes: vec![Index::id()],
        }
    }

    /// Adds an index.
    #[must_use]
    pub fn with_index(mut self, index: Index<O>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Sets the name of the data section.
    #[must_use]
    pub fn data_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.data_prefix = prefix.into();
        self
    }

    /// Sets the name of the index section.
    #[must_use]
    pub fn indexes_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.indexes_prefix = prefix.into();
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if a prefix is empty or
    /// contains `/`, the two sections share a name, or an index name is
    /// empty, contains `/` or is used twice.
    pub fn validate(&self) -> StoreResult<()> {
        for (what, value) in [
            ("prefix", &self.prefix),
            ("data prefix", &self.data_prefix),
            ("indexes prefix", &self.indexes_prefix),
        ] {
            check_component(what, value)?;
        }
        if self.data_prefix == self.indexes_prefix {
            return Err(StoreError::invalid_config(format!(
                "data prefix and indexes prefix are both {:?}",
                self.data_prefix
            )));
        }

        let mut seen = HashSet::new();
        for index in &self.indexes {
            check_component("index name", &index.name)?;
            if !seen.insert(index.name.as_str()) {
                return Err(StoreError::invalid_config(format!(
                    "duplicate index {:?}",
                    index.name
                )));
            }
        }
        Ok(())
    }
}

fn check_component(what: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::invalid_config(format!("{what} is empty")));
    }
    if value.contains('/') {
        return Err(StoreError::invalid_config(format!(
            "{what} {value:?} contains '/'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        id: String,
        group: String,
    }

    impl BinaryObject for Item {
        fn object_id(&self) -> &str {
            &self.id
        }

        fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
            Ok(self.group.clone().into_bytes())
        }

        fn unmarshal_binary(_data: &[u8]) -> StoreResult<Self> {
            Err(StoreError::codec("unused"))
        }
    }

    fn item(id: &str, group: &str) -> Item {
        Item {
            id: id.into(),
            group: group.into(),
        }
    }

    fn by_group() -> Index<Item> {
        Index::new("group", |i: &Item| Ok(i.group.clone()))
    }

    #[test]
    fn index_value_of_unique_and_non_unique() {
        let it = item("7", "red");
        assert_eq!(Index::<Item>::id().value_of(&it).unwrap(), "7");
        assert_eq!(by_group().value_of(&it).unwrap(), "red/7");
        assert_eq!(by_group().unique().value_of(&it).unwrap(), "red");
        assert_eq!(by_group().value(&it).unwrap(), "red");
    }

    #[test]
    fn index_value_fn_error_propagates() {
        let failing = Index::new("f", |_: &Item| Err(StoreError::codec("no value")));
        assert!(failing.value_of(&item("1", "x")).is_err());
    }

    #[test]
    fn config_default_has_id_index() {
        let config = IndexedStoreConfig::<Item>::new("items");
        assert_eq!(config.data_prefix, "data");
        assert_eq!(config.indexes_prefix, "indexes");
        assert_eq!(config.indexes.len(), 1);
        assert_eq!(config.indexes[0].name(), ID_INDEX);
        assert!(config.indexes[0].is_unique());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_bad_prefixes() {
        let bad = [
            IndexedStoreConfig::<Item>::new(""),
            IndexedStoreConfig::new("a/b"),
            IndexedStoreConfig::new("items").data_prefix("d/x"),
            IndexedStoreConfig::new("items").indexes_prefix(""),
            IndexedStoreConfig::new("items").data_prefix("same").indexes_prefix("same"),
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(matches!(err, StoreError::InvalidConfig { .. }), "{err}");
        }
    }

    #[test]
    fn config_rejects_bad_index_names() {
        let slash = IndexedStoreConfig::new("items")
            .with_index(Index::new("a/b", |i: &Item| Ok(i.group.clone())));
        assert!(slash.validate().is_err());

        let dup = IndexedStoreConfig::new("items")
            .with_index(by_group())
            .with_index(by_group());
        assert!(dup.validate().is_err());

        let dup_id = IndexedStoreConfig::<Item>::new("items").with_index(Index::id());
        assert!(dup_id.validate().is_err());
    }
}
