//! Users and their followed subreddits.

use tracing::{debug, instrument};

use super::{Result, Store, StoreError, User};

const USER_COLUMNS: &str = "id, name, access_token, created_at";

/// Built-in identity that owns episodes generated without `--user`.
pub const GLOBAL_USER: &str = "global";

impl Store {
    /// Returns the user named `name`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert or lookup fails.
    #[instrument(skip(self))]
    pub async fn get_or_create_user(&self, name: &str) -> Result<User> {
        let result = sqlx::query("INSERT INTO users (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(self.db.pool())
            .await?;
        if result.rows_affected() > 0 {
            debug!(name, "Created user");
        }

        self.find_user(name)
            .await?
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))
    }

    /// Looks up a user by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn find_user(&self, name: &str) -> Result<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?"))
            .bind(name)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(user)
    }

    /// Lists users created through login, i.e. everyone except [`GLOBAL_USER`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn authenticated_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE name <> ? ORDER BY name"
        ))
        .bind(GLOBAL_USER)
        .fetch_all(self.db.pool())
        .await?;
        Ok(users)
    }

    /// Resolves the user a command acts for.
    ///
    /// With a name, that user must exist. Without one, the only authenticated
    /// user is picked; zero or several authenticated users are errors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`], [`StoreError::NoUsers`] or
    /// [`StoreError::AmbiguousUser`] as described above.
    #[instrument(skip(self))]
    pub async fn current_user(&self, name: Option<&str>) -> Result<User> {
        if let Some(name) = name {
            return self
                .find_user(name)
                .await?
                .ok_or_else(|| StoreError::UserNotFound(name.to_string()));
        }

        let mut users = self.authenticated_users().await?;
        match users.len() {
            0 => Err(StoreError::NoUsers),
            1 => Ok(users.remove(0)),
            _ => Err(StoreError::AmbiguousUser {
                names: users.into_iter().map(|user| user.name).collect(),
            }),
        }
    }

    /// Stores or clears the bearer token of a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self, token))]
    pub async fn set_access_token(&self, user_id: i64, token: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET access_token = ? WHERE id = ?")
            .bind(token)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Deletes a user together with their episodes and followed subreddits.
    ///
    /// Returns `false` when no such user exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE name = ?")
            .bind(name)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Follows a subreddit. Returns `false` when it was already followed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self))]
    pub async fn add_subreddit(&self, user_id: i64, subreddit: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO user_subreddits (user_id, subreddit) VALUES (?, ?) \
             ON CONFLICT(user_id, subreddit) DO NOTHING",
        )
        .bind(user_id)
        .bind(subreddit)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lists the subreddits a user follows, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn list_subreddits(&self, user_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT subreddit FROM user_subreddits WHERE user_id = ? ORDER BY subreddit",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Unfollows a subreddit. Returns `false` when it was not followed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove_subreddit(&self, user_id: i64, subreddit: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_subreddits WHERE user_id = ? AND subreddit = ?")
            .bind(user_id)
            .bind(subreddit)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::GLOBAL_USER;
    use crate::store::StoreError;
    use crate::store::tests::test_store;

    #[tokio::test]
    async fn test_get_or_create_user_is_stable() {
        let store = test_store().await;

        let first = store.get_or_create_user("alice").await.unwrap();
        let second = store.get_or_create_user("alice").await.unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_current_user_single_user_is_picked() {
        let store = test_store().await;
        store.get_or_create_user("alice").await.unwrap();

        let user = store.current_user(None).await.unwrap();

        assert_eq!(user.name, "alice");
    }

    #[tokio::test]
    async fn test_current_user_ignores_global_user() {
        let store = test_store().await;
        assert!(store.find_user(GLOBAL_USER).await.unwrap().is_some());

        let err = store.current_user(None).await.unwrap_err();

        assert!(matches!(err, StoreError::NoUsers));
    }

    #[tokio::test]
    async fn test_current_user_ambiguous_errors() {
        let store = test_store().await;
        store.get_or_create_user("alice").await.unwrap();
        store.get_or_create_user("bob").await.unwrap();

        let err = store.current_user(None).await.unwrap_err();

        assert!(matches!(err, StoreError::AmbiguousUser { ref names } if names.len() == 2));
    }

    #[tokio::test]
    async fn test_current_user_named_missing_errors() {
        let store = test_store().await;

        let err = store.current_user(Some("nobody")).await.unwrap_err();

        assert!(matches!(err, StoreError::UserNotFound(ref name) if name == "nobody"));
    }

    #[tokio::test]
    async fn test_access_token_set_and_clear() {
        let store = test_store().await;
        let user = store.get_or_create_user("alice").await.unwrap();

        store.set_access_token(user.id, Some("tok")).await.unwrap();
        let stored = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("tok"));

        store.set_access_token(user.id, None).await.unwrap();
        let stored = store.find_user("alice").await.unwrap().unwrap();
        assert!(stored.access_token.is_none());
    }

    // ==================== Subreddit Tests ====================

    #[tokio::test]
    async fn test_subreddit_add_list_remove() {
        let store = test_store().await;
        let user = store.get_or_create_user("alice").await.unwrap();

        assert!(store.add_subreddit(user.id, "rust").await.unwrap());
        assert!(!store.add_subreddit(user.id, "rust").await.unwrap());
        assert!(store.add_subreddit(user.id, "golang").await.unwrap());

        assert_eq!(
            store.list_subreddits(user.id).await.unwrap(),
            vec!["golang".to_string(), "rust".to_string()]
        );

        assert!(store.remove_subreddit(user.id, "rust").await.unwrap());
        assert!(!store.remove_subreddit(user.id, "rust").await.unwrap());
        assert_eq!(store.list_subreddits(user.id).await.unwrap(), vec!["golang"]);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_subreddits() {
        let store = test_store().await;
        let user = store.get_or_create_user("alice").await.unwrap();
        store.add_subreddit(user.id, "rust").await.unwrap();

        assert!(store.delete_user("alice").await.unwrap());
        assert!(store.list_subreddits(user.id).await.unwrap().is_empty());
        assert!(!store.delete_user("alice").await.unwrap());
    }
}
