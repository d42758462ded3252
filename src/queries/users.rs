use anyhow::anyhow;
use sqlx::PgConnection;
use uuid::Uuid;

use super::db_error;
use crate::error::{AppError, AppResult};
use crate::models::users::User;

pub async fn insert_user(conn: &mut PgConnection, username: &str) -> AppResult<User> {
    let result = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username) VALUES ($1, $2) RETURNING id, username, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .fetch_one(conn)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return Err(AppError::BadRequest(anyhow!("Username already exists")));
                }
            }
            Err(db_error("insert_user")(e))
        }
    }
}

/// Inserts the user, or renames it if the id already exists.
pub async fn upsert_user(conn: &mut PgConnection, user_id: Uuid, username: &str) -> AppResult<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username) VALUES ($1, $2)
         ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username
         RETURNING id, username, created_at",
    )
    .bind(user_id)
    .bind(username)
    .fetch_one(conn)
    .await
    .map_err(db_error("upsert_user"))
}

pub async fn find_user_by_id(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Option<User>> {
    sqlx::query_as::<_, User>("SELECT id, username, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(db_error("find_user_by_id"))
}

pub async fn find_user_by_username(
    conn: &mut PgConnection,
    username: &str,
) -> AppResult<Option<User>> {
    sqlx::query_as::<_, User>("SELECT id, username, created_at FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(conn)
        .await
        .map_err(db_error("find_user_by_username"))
}

pub async fn user_exists(conn: &mut PgConnection, user_id: Uuid) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(conn)
        .await
        .map_err(db_error("user_exists"))?;
    Ok(exists)
}
