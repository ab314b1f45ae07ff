use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ThreadStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Thread {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub created_by: i64,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: i64,
    uuid: String,
    title: String,
    created_by: i64,
    created_at: String,
}

impl From<ThreadRow> for Thread {
    fn from(row: ThreadRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            title: row.title,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

impl ThreadStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a thread and enroll the creator as its first member.
    /// Both inserts happen in one transaction.
    pub async fn create(
        &self,
        uuid: &str,
        title: &str,
        created_by: i64,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO threads (uuid, title, created_by) VALUES (?, ?, ?)")
            .bind(uuid)
            .bind(title)
            .bind(created_by)
            .execute(&mut *tx)
            .await?;
        let thread_id = result.last_insert_rowid();

        sqlx::query("INSERT INTO thread_members (thread_id, user_id) VALUES (?, ?)")
            .bind(thread_id)
            .bind(created_by)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(thread_id)
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Thread>, sqlx::Error> {
        let row: Option<ThreadRow> = sqlx::query_as(
            "SELECT id, uuid, title, created_by, created_at FROM threads WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Thread::from))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Thread>, sqlx::Error> {
        let row: Option<ThreadRow> = sqlx::query_as(
            "SELECT id, uuid, title, created_by, created_at FROM threads WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Thread::from))
    }

    /// List all threads, newest first.
    pub async fn list(&self) -> Result<Vec<Thread>, sqlx::Error> {
        let rows: Vec<ThreadRow> = sqlx::query_as(
            "SELECT id, uuid, title, created_by, created_at FROM threads ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Thread::from).collect())
    }

    /// Add a member to a thread. Joining twice is not an error.
    pub async fn add_member(&self, thread_id: i64, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO thread_members (thread_id, user_id) VALUES (?, ?)")
            .bind(thread_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Check whether a user is a member of a thread.
    pub async fn is_member(&self, thread_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as(
            "SELECT COUNT(*) FROM thread_members WHERE thread_id = ? AND user_id = ?",
        )
        .bind(thread_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// Number of members in a thread.
    pub async fn member_count(&self, thread_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM thread_members WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Delete a thread. Memberships, messages, tasks, and meetings cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
