use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{ItemStore, StoreError, UserStore};
use crate::db::{
    format_timestamp, parse_timestamp, DbPool, Item, ItemStatus, NewItem, NewUser, Session, User,
};
use crate::engine::SearchFilter;

const ITEM_COLUMNS: &str =
    "id, title, description, contact, status, image, created_at, resolved_at, owner_id";

/// Item row as stored; converted into [`Item`] after validation
#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    description: String,
    contact: String,
    status: String,
    image: Option<String>,
    created_at: String,
    resolved_at: Option<String>,
    owner_id: Option<i64>,
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let status = ItemStatus::from_form(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("item {} has status '{}'", row.id, row.status))
        })?;
        let created_at = parse_timestamp(&row.created_at).ok_or_else(|| {
            StoreError::Corrupt(format!("item {} has created_at '{}'", row.id, row.created_at))
        })?;
        let resolved_at = match row.resolved_at.as_deref() {
            Some(value) => Some(parse_timestamp(value).ok_or_else(|| {
                StoreError::Corrupt(format!("item {} has resolved_at '{}'", row.id, value))
            })?),
            None => None,
        };

        Ok(Item {
            id: row.id,
            title: row.title,
            description: row.description,
            contact: row.contact,
            status,
            image: row.image,
            created_at,
            resolved_at,
            owner_id: row.owner_id,
        })
    }
}

/// SQLite-backed implementation of both store traits
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn create_item(&self, item: &NewItem) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO items (title, description, contact, status, image, created_at, resolved_at, owner_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.contact)
        .bind(item.status.as_str())
        .bind(&item.image)
        .bind(format_timestamp(&item.created_at))
        .bind(item.resolved_at.as_ref().map(format_timestamp))
        .bind(item.owner_id)
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_item(&self, id: i64) -> Result<Item, StoreError> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET title = ?, description = ?, contact = ?, image = ?,
                status = CASE WHEN status = 'found' THEN 'found' ELSE ? END,
                resolved_at = CASE WHEN status = 'found' THEN resolved_at ELSE ? END
            WHERE id = ?
            "#,
        )
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.contact)
        .bind(&item.image)
        .bind(item.status.as_str())
        .bind(item.resolved_at.as_ref().map(format_timestamp))
        .bind(item.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_found(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE items SET status = 'found', resolved_at = ? WHERE id = ? AND status = 'lost'",
        )
        .bind(format_timestamp(&resolved_at))
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_items(&self, filter: &SearchFilter) -> Result<Vec<Item>, StoreError> {
        // Status and ordering run in SQL. The text match runs on the decoded
        // rows because SQLite case folding is ASCII only.
        let mut sql = format!("SELECT {} FROM items", ITEM_COLUMNS);
        if filter.status().is_some() {
            sql.push_str(" WHERE status = ?");
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(filter.order().sql());

        let mut query = sqlx::query_as::<_, ItemRow>(&sql);
        if let Some(status) = filter.status() {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.db).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item = Item::try_from(row)?;
            if filter.matches(&item) {
                items.push(item);
            }
        }
        Ok(items)
    }

    async fn delete_all_items(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM items").execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: &NewUser) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE username = ? OR email = ?")
            .bind(login)
            .bind(login)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(&session.expires_at)
        .bind(&session.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as(
            r#"
            SELECT u.* FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(token_hash)
        .bind(format_timestamp(&now))
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
