use sqlx::{QueryBuilder, Sqlite};

use crate::db::{Store, StoreError};
use crate::users::repo_types::{User, UserChanges};

impl Store {
    /// Insert a user; id and created_at are assigned by the database.
    pub async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES (?, ?, ?)
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    /// Apply `changes` to one row in a single statement. Returns rows affected.
    pub async fn update_user_by_id(&self, id: i64, changes: UserChanges) -> Result<u64, StoreError> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(email) = changes.email {
                set.push("email = ");
                set.push_bind_unseparated(email);
            }
            if let Some(hash) = changes.password_hash {
                set.push("password_hash = ");
                set.push_bind_unseparated(hash);
            }
        }
        qb.push(" WHERE id = ").push_bind(id);

        let res = qb.build().execute(self.pool()).await?;
        Ok(res.rows_affected())
    }

    pub async fn delete_user_by_id(&self, id: i64) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected())
    }

    #[cfg(test)]
    pub(crate) async fn password_hash_of(&self, id: i64) -> Result<Option<String>, StoreError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(hash)
    }

    #[cfg(test)]
    pub(crate) async fn count_users(&self) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }
}
