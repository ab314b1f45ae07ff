use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct MessageStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub uuid: String,
    pub thread_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    uuid: String,
    thread_id: i64,
    author_id: i64,
    author_username: String,
    content: String,
    created_at: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            thread_id: row.thread_id,
            author_id: row.author_id,
            author_username: row.author_username,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

const MESSAGE_SELECT: &str = "SELECT m.id, m.uuid, m.thread_id, m.author_id, \
     p.username AS author_username, m.content, m.created_at \
     FROM messages m JOIN profiles p ON p.id = m.author_id";

impl MessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message and return it with the author joined in.
    pub async fn create(
        &self,
        uuid: &str,
        thread_id: i64,
        author_id: i64,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        sqlx::query("INSERT INTO messages (uuid, thread_id, author_id, content) VALUES (?, ?, ?, ?)")
            .bind(uuid)
            .bind(thread_id)
            .bind(author_id)
            .bind(content)
            .execute(&self.pool)
            .await?;

        let row: MessageRow = sqlx::query_as(&format!("{MESSAGE_SELECT} WHERE m.uuid = ?"))
            .bind(uuid)
            .fetch_one(&self.pool)
            .await?;
        Ok(Message::from(row))
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Message>, sqlx::Error> {
        let row: Option<MessageRow> = sqlx::query_as(&format!("{MESSAGE_SELECT} WHERE m.uuid = ?"))
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Message::from))
    }

    /// List messages in a thread, oldest first.
    pub async fn list_for_thread(&self, thread_id: i64) -> Result<Vec<Message>, sqlx::Error> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{MESSAGE_SELECT} WHERE m.thread_id = ? ORDER BY m.id"
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    /// Delete a message (author self-delete or admin moderation).
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
