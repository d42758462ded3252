use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use super::db_error;
use crate::error::AppResult;
use crate::models::contacts::Contact;

const CONTACT_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.contact_user_id, u.username, c.created_at
    FROM contacts c
    JOIN users u ON u.id = c.contact_user_id
"#;

/// Adds both directions in one transaction and returns `user_id`'s side.
pub async fn insert_contact_pair(
    conn: &mut PgConnection,
    user_id: Uuid,
    contact_user_id: Uuid,
) -> AppResult<Contact> {
    let mut tx = conn.begin().await.map_err(db_error("insert_contact_pair"))?;

    for (owner, other) in [(user_id, contact_user_id), (contact_user_id, user_id)] {
        sqlx::query(
            "INSERT INTO contacts (user_id, contact_user_id) VALUES ($1, $2)
             ON CONFLICT (user_id, contact_user_id) DO NOTHING",
        )
        .bind(owner)
        .bind(other)
        .execute(&mut *tx)
        .await
        .map_err(db_error("insert_contact_pair"))?;
    }

    let contact = sqlx::query_as::<_, Contact>(&format!(
        "{CONTACT_SELECT} WHERE c.user_id = $1 AND c.contact_user_id = $2"
    ))
    .bind(user_id)
    .bind(contact_user_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error("insert_contact_pair"))?;

    tx.commit().await.map_err(db_error("insert_contact_pair"))?;
    Ok(contact)
}

pub async fn find_contacts_for_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        "{CONTACT_SELECT} WHERE c.user_id = $1 ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(db_error("find_contacts_for_user"))
}

/// Removes both directions; true if anything was removed.
pub async fn delete_contact_pair(
    conn: &mut PgConnection,
    user_id: Uuid,
    contact_user_id: Uuid,
) -> AppResult<bool> {
    let result = sqlx::query(
        "DELETE FROM contacts
         WHERE (user_id = $1 AND contact_user_id = $2)
            OR (user_id = $2 AND contact_user_id = $1)",
    )
    .bind(user_id)
    .bind(contact_user_id)
    .execute(conn)
    .await
    .map_err(db_error("delete_contact_pair"))?;
    Ok(result.rows_affected() > 0)
}

pub async fn contact_exists(
    conn: &mut PgConnection,
    user_id: Uuid,
    contact_user_id: Uuid,
) -> AppResult<bool> {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM contacts WHERE user_id = $1 AND contact_user_id = $2)",
    )
    .bind(user_id)
    .bind(contact_user_id)
    .fetch_one(conn)
    .await
    .map_err(db_error("contact_exists"))?;
    Ok(exists)
}

pub async fn search_contacts(
    conn: &mut PgConnection,
    user_id: Uuid,
    query: &str,
) -> AppResult<Vec<Contact>> {
    sqlx::query_as::<_, Contact>(&format!(
        "{CONTACT_SELECT} WHERE c.user_id = $1 AND u.username ILIKE $2 ESCAPE '\\'
         ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(user_id)
    .bind(like_pattern(query))
    .fetch_all(conn)
    .await
    .map_err(db_error("search_contacts"))
}

/// Substring pattern with LIKE wildcards in `query` taken literally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("ali"), "%ali%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
