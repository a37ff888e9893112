use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::db::{Store, StoreError};
use crate::users::password::hash_password;
use crate::users::repo_types::{User, UserChanges};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The username or email is already taken by another record.
    #[error("username or email already exists")]
    DuplicateIdentity,

    /// Any persistence fault other than a uniqueness violation.
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),

    /// Argon2 failed or the blocking hash task died. Callers treat it
    /// exactly like `StorageFailure`: an unexpected failure, not bad input.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl DirectoryError {
    /// True for the failures a caller cannot fix by changing its request.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            DirectoryError::StorageFailure(_) | DirectoryError::Hashing(_)
        )
    }
}

impl From<StoreError> for DirectoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { .. } => DirectoryError::DuplicateIdentity,
            other => DirectoryError::StorageFailure(other),
        }
    }
}

/// Requested changes to a user. Empty strings count as "not supplied".
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Updated {
    pub id: i64,
    pub changes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub id: i64,
    pub deleted: u64,
}

/// User lifecycle operations over the store.
///
/// Every lookup and mutation that matches no row resolves to `Ok(None)`;
/// `Err` is reserved for bad input, identity conflicts and unexpected faults.
#[derive(Clone, Debug)]
pub struct UserDirectory {
    store: Store,
}

impl UserDirectory {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    #[instrument(skip(self, password))]
    pub async fn add(&self, username: &str, email: &str, password: &str) -> Result<User, DirectoryError> {
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(DirectoryError::InvalidArgument(
                "username, email, and password are required",
            ));
        }

        let hash = hash_off_thread(password.to_owned()).await?;
        let user = self.store.insert_user(username, email, &hash).await?;
        info!(user_id = user.id, "user added");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, DirectoryError> {
        let user = self.store.find_user_by_id(id).await?;
        debug!(found = user.is_some(), "lookup by id");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        let user = self.store.find_user_by_username(username).await?;
        debug!(found = user.is_some(), "lookup by username");
        Ok(user)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: i64, update: UserUpdate) -> Result<Option<Updated>, DirectoryError> {
        let email = update.email.filter(|e| !e.is_empty());
        let password = update.password.filter(|p| !p.is_empty());
        if email.is_none() && password.is_none() {
            return Err(DirectoryError::InvalidArgument(
                "no fields to update (email or password required)",
            ));
        }

        let password_hash = match password {
            Some(plain) => Some(hash_off_thread(plain).await?),
            None => None,
        };
        let changes = UserChanges {
            email,
            password_hash,
        };

        let n = self.store.update_user_by_id(id, changes).await?;
        if n == 0 {
            debug!("update matched no user");
            return Ok(None);
        }
        info!(user_id = id, changes = n, "user updated");
        Ok(Some(Updated { id, changes: n }))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<Option<Deleted>, DirectoryError> {
        let n = self.store.delete_user_by_id(id).await?;
        if n == 0 {
            debug!("delete matched no user");
            return Ok(None);
        }
        info!(user_id = id, "user deleted");
        Ok(Some(Deleted { id, deleted: n }))
    }
}

async fn hash_off_thread(plain: String) -> Result<String, DirectoryError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| DirectoryError::Hashing(e.to_string()))?
        .map_err(|e| DirectoryError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::password::verify_password;

    async fn directory() -> UserDirectory {
        UserDirectory::new(Store::in_memory().await.expect("in-memory store"))
    }

    #[tokio::test]
    async fn add_then_get_by_id() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");

        let fetched = dir.get_by_id(created.id).await.expect("get").expect("present");
        assert_eq!(fetched, created);

        let json = serde_json::to_value(&fetched).expect("serialize");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "a@x.com");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn stored_hash_is_not_plaintext() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");
        let hash = dir
            .store()
            .password_hash_of(created.id)
            .await
            .expect("hash query")
            .expect("row");
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash).expect("verify"));
    }

    #[tokio::test]
    async fn add_rejects_empty_fields() {
        let dir = directory().await;
        for (u, e, p) in [("", "a@x.com", "pw"), ("alice", "", "pw"), ("alice", "a@x.com", "")] {
            let err = dir.add(u, e, p).await.unwrap_err();
            assert!(matches!(err, DirectoryError::InvalidArgument(_)), "got {err:?}");
        }
        assert_eq!(dir.store().count_users().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn duplicate_username_or_email_creates_nothing() {
        let dir = directory().await;
        dir.add("alice", "a@x.com", "secret1").await.expect("add");

        let err = dir.add("alice", "b@y.com", "secret2").await.unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateIdentity), "got {err:?}");

        let err = dir.add("bob", "a@x.com", "secret2").await.unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateIdentity), "got {err:?}");

        assert_eq!(dir.store().count_users().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let dir = directory().await;
        assert!(dir.get_by_id(99).await.expect("get").is_none());
        assert!(dir.get_by_username("nobody").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn get_by_username_matches_get_by_id() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");
        let by_name = dir
            .get_by_username("alice")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(by_name, created);
    }

    #[tokio::test]
    async fn password_update_rotates_hash_and_keeps_email() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");

        let update = UserUpdate {
            email: None,
            password: Some("newpass".into()),
        };
        let outcome = dir.update(created.id, update).await.expect("update");
        assert_eq!(outcome, Some(Updated { id: created.id, changes: 1 }));

        let hash = dir
            .store()
            .password_hash_of(created.id)
            .await
            .expect("hash query")
            .expect("row");
        assert!(!verify_password("secret1", &hash).expect("verify old"));
        assert!(verify_password("newpass", &hash).expect("verify new"));

        let fetched = dir.get_by_id(created.id).await.expect("get").expect("present");
        assert_eq!(fetched.email, "a@x.com");
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn email_and_password_update_in_one_statement() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");

        let update = UserUpdate {
            email: Some("a2@x.com".into()),
            password: Some("newpass".into()),
        };
        let outcome = dir.update(created.id, update).await.expect("update");
        assert_eq!(outcome, Some(Updated { id: created.id, changes: 1 }));

        let fetched = dir.get_by_id(created.id).await.expect("get").expect("present");
        assert_eq!(fetched.email, "a2@x.com");
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.created_at, created.created_at);

        let hash = dir
            .store()
            .password_hash_of(created.id)
            .await
            .expect("hash query")
            .expect("row");
        assert!(verify_password("newpass", &hash).expect("verify new"));
        assert!(!verify_password("secret1", &hash).expect("verify old"));
    }

    #[test]
    fn only_storage_and_hashing_faults_are_unexpected() {
        assert!(DirectoryError::Hashing("boom".into()).is_unexpected());
        assert!(!DirectoryError::DuplicateIdentity.is_unexpected());
        assert!(!DirectoryError::InvalidArgument("missing").is_unexpected());
    }

    #[tokio::test]
    async fn update_requires_a_field() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");

        let err = dir.update(created.id, UserUpdate::default()).await.unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidArgument(_)), "got {err:?}");

        let blanks = UserUpdate {
            email: Some(String::new()),
            password: Some(String::new()),
        };
        let err = dir.update(created.id, blanks).await.unwrap_err();
        assert!(matches!(err, DirectoryError::InvalidArgument(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn update_missing_id_is_none_and_changes_nothing() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");

        let update = UserUpdate {
            email: Some("z@x.com".into()),
            password: None,
        };
        assert_eq!(dir.update(created.id + 1, update).await.expect("update"), None);

        let fetched = dir.get_by_id(created.id).await.expect("get").expect("present");
        assert_eq!(fetched, created);
        assert_eq!(dir.store().count_users().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn update_to_taken_email_is_duplicate() {
        let dir = directory().await;
        dir.add("alice", "a@x.com", "secret1").await.expect("add");
        let bob = dir.add("bob", "b@x.com", "secret2").await.expect("add");

        let update = UserUpdate {
            email: Some("a@x.com".into()),
            password: None,
        };
        let err = dir.update(bob.id, update).await.unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateIdentity), "got {err:?}");

        let fetched = dir.get_by_id(bob.id).await.expect("get").expect("present");
        assert_eq!(fetched.email, "b@x.com");
    }

    #[tokio::test]
    async fn rewriting_same_email_counts_as_a_change() {
        let dir = directory().await;
        let created = dir.add("alice", "a@x.com", "secret1").await.expect("add");
        let update = UserUpdate {
            email: Some("a@x.com".into()),
            password: None,
        };
        let outcome = dir.update(created.id, update).await.expect("update");
        assert_eq!(outcome, Some(Updated { id: created.id, changes: 1 }));
    }

    #[tokio::test]
    async fn delete_twice_second_is_none() {
        let dir = directory().await;
        let alice = dir.add("alice", "a@x.com", "secret1").await.expect("add");
        dir.add("bob", "b@x.com", "secret2").await.expect("add");

        let first = dir.delete(alice.id).await.expect("delete");
        assert_eq!(first, Some(Deleted { id: alice.id, deleted: 1 }));
        let after_first = dir.store().count_users().await.expect("count");

        assert_eq!(dir.delete(alice.id).await.expect("delete again"), None);
        assert_eq!(dir.store().count_users().await.expect("count"), after_first);
        assert_eq!(after_first, 1);
    }

    #[tokio::test]
    async fn deleted_username_can_be_reused() {
        let dir = directory().await;
        let alice = dir.add("alice", "a@x.com", "secret1").await.expect("add");
        dir.delete(alice.id).await.expect("delete");

        let again = dir.add("alice", "a@x.com", "secret1").await.expect("re-add");
        assert_ne!(again.id, alice.id);
    }

    #[tokio::test]
    async fn full_lifecycle_scenario() {
        let dir = directory().await;

        let alice = dir.add("alice", "a@x.com", "secret1").await.expect("add");
        assert_eq!(alice.id, 1);

        let err = dir.add("alice", "b@y.com", "secret2").await.unwrap_err();
        assert!(matches!(err, DirectoryError::DuplicateIdentity));

        let fetched = dir.get_by_id(1).await.expect("get").expect("present");
        assert_eq!((fetched.id, fetched.username.as_str(), fetched.email.as_str()), (1, "alice", "a@x.com"));

        let update = UserUpdate {
            email: Some("a2@x.com".into()),
            password: None,
        };
        assert_eq!(dir.update(1, update).await.expect("update"), Some(Updated { id: 1, changes: 1 }));
        assert_eq!(dir.delete(1).await.expect("delete"), Some(Deleted { id: 1, deleted: 1 }));
        assert!(dir.get_by_id(1).await.expect("get").is_none());
    }
}
