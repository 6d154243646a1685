//! An example domain DAO built on [`IndexedStore`].
//!
//! Shows the intended layering: the DAO owns an indexed store, exposes
//! domain types, and translates the store's sentinel errors into its own.

use metastore_core::{
    version_json_decode, version_json_encode, BinaryObject, Index, IndexedStore,
    IndexedStoreConfig, StoreError, StoreResult,
};
use metastore_storage::Interface;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key prefix of the user store.
pub const USERS_PREFIX: &str = "users";

/// Unique index over user email addresses.
pub const EMAIL_INDEX: &str = "email";

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User name; the object ID.
    pub name: String,
    /// Email address, unique across users.
    pub email: String,
}

impl User {
    /// Creates a user.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl BinaryObject for User {
    fn object_id(&self) -> &str {
        &self.name
    }

    fn marshal_binary(&self) -> StoreResult<Vec<u8>> {
        version_json_encode(1, self)
    }

    fn unmarshal_binary(data: &[u8]) -> StoreResult<Self> {
        version_json_decode(data, |version, value| match version {
            1 => Ok(serde_json::from_value(value)?),
            other => Err(StoreError::codec(format!("unsupported user version {other}"))),
        })
    }
}

/// Errors returned by [`UserDao`].
#[derive(Debug, Error)]
pub enum UserError {
    /// A user with this name already exists.
    #[error("user {name:?} already exists")]
    UserExists {
        /// User name.
        name: String,
    },

    /// No user with this name exists.
    #[error("user {name:?} does not exist")]
    NoUserExists {
        /// User name.
        name: String,
    },

    /// Another user already has this email address.
    #[error("email {email:?} is already in use")]
    EmailInUse {
        /// Email address.
        email: String,
    },

    /// Any other store failure.
    #[error("user store error: {0}")]
    Store(StoreError),
}

impl UserError {
    fn translate(name: &str, err: StoreError) -> Self {
        if err.is_object_exists() {
            return Self::UserExists { name: name.into() };
        }
        if err.is_not_found() {
            return Self::NoUserExists { name: name.into() };
        }
        match err {
            StoreError::IndexConflict { index, value, .. } if index == EMAIL_INDEX => {
                Self::EmailInUse { email: value }
            }
            other => Self::Store(other),
        }
    }
}

/// Result type for [`UserDao`].
pub type UserResult<T> = Result<T, UserError>;

/// Stores [`User`]s by name with a unique email index.
pub struct UserDao<S: Interface> {
    store: IndexedStore<S, User>,
}

impl<S: Interface> UserDao<S> {
    /// Opens the DAO over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if the store configuration is invalid.
    pub fn new(store: S) -> UserResult<Self> {
        let config = IndexedStoreConfig::new(USERS_PREFIX)
            .with_index(Index::new(EMAIL_INDEX, |u: &User| Ok(u.email.clone())).unique());
        let store = IndexedStore::new(store, config).map_err(UserError::Store)?;
        Ok(Self { store })
    }

    /// Adds a new user.
    pub fn add(&self, user: &User) -> UserResult<()> {
        self.store
            .create(user)
            .map_err(|err| UserError::translate(&user.name, err))
    }

    /// Updates an existing user.
    pub fn update(&self, user: &User) -> UserResult<()> {
        self.store
            .replace(user)
            .map_err(|err| UserError::translate(&user.name, err))
    }

    /// Returns the user called `name`.
    pub fn get(&self, name: &str) -> UserResult<User> {
        self.store
            .get(name)
            .map_err(|err| UserError::translate(name, err))
    }

    /// Removes the user called `name`, failing if there is none.
    pub fn remove(&self, name: &str) -> UserResult<()> {
        self.get(name)?;
        self.store
            .delete(name)
            .map_err(|err| UserError::translate(name, err))
    }

    /// Finds a user by email address.
    pub fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let mut found = self
            .store
            .list(EMAIL_INDEX, email, 0, Some(1))
            .map_err(|err| UserError::translate(email, err))?;
        Ok(found.pop())
    }

    /// Lists all users in name order.
    pub fn list(&self) -> UserResult<Vec<User>> {
        self.store
            .list(metastore_core::ID_INDEX, "", 0, None)
            .map_err(UserError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastore_storage::{MemStore, StorageError};

    fn dao() -> UserDao<MemStore> {
        UserDao::new(MemStore::new("users").unwrap()).unwrap()
    }

    #[test]
    fn dao_add_get_update_remove() {
        let dao = dao();
        dao.add(&User::new("ann", "ann@example.com")).unwrap();
        assert_eq!(dao.get("ann").unwrap().email, "ann@example.com");

        dao.update(&User::new("ann", "ann@example.org")).unwrap();
        assert_eq!(
            dao.find_by_email("ann@example.org").unwrap(),
            Some(User::new("ann", "ann@example.org"))
        );
        assert_eq!(dao.find_by_email("ann@example.com").unwrap(), None);

        dao.remove("ann").unwrap();
        assert!(dao.list().unwrap().is_empty());
    }

    #[test]
    fn dao_translates_every_sentinel() {
        let dao = dao();
        dao.add(&User::new("ann", "ann@example.com")).unwrap();

        assert!(matches!(
            dao.add(&User::new("ann", "other@example.com")),
            Err(UserError::UserExists { name }) if name == "ann"
        ));
        assert!(matches!(
            dao.update(&User::new("bob", "bob@example.com")),
            Err(UserError::NoUserExists { name }) if name == "bob"
        ));
        assert!(matches!(dao.get("bob"), Err(UserError::NoUserExists { .. })));
        assert!(matches!(dao.remove("bob"), Err(UserError::NoUserExists { .. })));
        assert!(matches!(
            dao.add(&User::new("bob", "ann@example.com")),
            Err(UserError::EmailInUse { email }) if email == "ann@example.com"
        ));
    }

    #[test]
    fn dao_store_sentinels_never_leak() {
        let sentinels = [
            StoreError::object_exists("x"),
            StoreError::no_object_exists("x"),
            StoreError::Storage(StorageError::no_key("x")),
        ];
        for err in sentinels {
            assert!(!matches!(
                UserError::translate("x", err),
                UserError::Store(_)
            ));
        }
    }

    #[test]
    fn dao_other_errors_pass_through() {
        let err = UserError::translate("x", StoreError::codec("bad"));
        assert!(matches!(err, UserError::Store(StoreError::Codec { .. })));

        let dao = dao();
        assert!(matches!(
            dao.add(&User::new("a/b", "x@example.com")),
            Err(UserError::Store(StoreError::InvalidObjectId { .. }))
        ));
    }
}
