use super::{DBClient, DatabaseError, Result, constraint_error, text_contains};
use crate::models::{NewUser, User, UserChanges};
use async_trait::async_trait;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"id, username, email, first_name, last_name, bio, role, is_staff, is_superuser, confirmation_code, date_joined"#;

/// User database operations trait
#[async_trait]
pub trait UserExt: Send + Sync {
    /// Get single user by ID, username or email (first `Some` wins)
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>>;

    /// Page of users ordered by username, optionally filtered by a username fragment
    async fn get_users(&self, search: Option<&str>, limit: i64, offset: i64) -> Result<Vec<User>>;

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64>;

    /// Insert a user. Username and email uniqueness is enforced by constraints
    /// and reported as [`DatabaseError::Conflict`].
    async fn save_user(&self, new_user: NewUser) -> Result<User>;

    /// Apply a partial update
    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<User>;

    /// Replace the pending confirmation code hash
    async fn set_confirmation_code(&self, user_id: Uuid, code_hash: &str) -> Result<()>;

    /// Clear the confirmation code if it still equals `code_hash`.
    /// Returns false when another request consumed or replaced it first.
    async fn consume_confirmation_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
            ))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            // Emails are stored lowercased
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = LOWER($1)"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(&self, search: Option<&str>, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE {}
            ORDER BY username
            LIMIT $2 OFFSET $3
            "#,
            text_contains("username", 1)
        ))
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM users WHERE {}",
            text_contains("username", 1)
        ))
        .bind(search)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_user(&self, new_user: NewUser) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, bio, role)
            VALUES ($1, LOWER($2), $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.bio)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "user", &new_user.username))
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                email = COALESCE(LOWER($2), email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                bio = COALESCE($5, bio),
                role = COALESCE($6, role)
            WHERE id = $7
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(changes.username.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.bio.as_deref())
        .bind(changes.role)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| constraint_error(e, "user", &user_id.to_string()))?;

        user.ok_or(DatabaseError::NotFound {
            resource: "user",
            identifier: "id",
        })
    }

    async fn set_confirmation_code(&self, user_id: Uuid, code_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET confirmation_code = $1 WHERE id = $2")
            .bind(code_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn consume_confirmation_code(&self, user_id: Uuid, code_hash: &str) -> Result<bool> {
        // Compare-and-clear in one statement: two concurrent exchanges of the
        // same code cannot both succeed.
        let result = sqlx::query(
            "UPDATE users SET confirmation_code = NULL WHERE id = $1 AND confirmation_code = $2",
        )
        .bind(user_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
