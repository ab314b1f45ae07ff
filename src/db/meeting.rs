use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct MeetingStore {
    pool: SqlitePool,
}

/// Lifecycle of a meeting's video session: scheduled -> active -> ended.
/// `ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Active,
    Ended,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Active => "active",
            MeetingStatus::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => MeetingStatus::Active,
            "ended" => MeetingStatus::Ended,
            _ => MeetingStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Meeting {
    pub id: i64,
    pub uuid: String,
    pub thread_id: i64,
    pub title: String,
    pub status: MeetingStatus,
    pub room_name: Option<String>,
    pub created_by: i64,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct MeetingRow {
    id: i64,
    uuid: String,
    thread_id: i64,
    title: String,
    status: String,
    room_name: Option<String>,
    created_by: i64,
    started_at: Option<String>,
    ended_at: Option<String>,
    created_at: String,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            thread_id: row.thread_id,
            title: row.title,
            status: MeetingStatus::from_str(&row.status),
            room_name: row.room_name,
            created_by: row.created_by,
            started_at: row.started_at,
            ended_at: row.ended_at,
            created_at: row.created_at,
        }
    }
}

const MEETING_COLUMNS: &str = "id, uuid, thread_id, title, status, room_name, \
     created_by, started_at, ended_at, created_at";

impl MeetingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a scheduled meeting. Returns the meeting ID.
    pub async fn create(
        &self,
        uuid: &str,
        thread_id: i64,
        title: &str,
        created_by: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO meetings (uuid, thread_id, title, created_by) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(thread_id)
        .bind(title)
        .bind(created_by)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Meeting>, sqlx::Error> {
        let row: Option<MeetingRow> = sqlx::query_as(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE uuid = ?"
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Meeting::from))
    }

    /// Look up a meeting by its video room name.
    pub async fn get_by_room_name(&self, room_name: &str) -> Result<Option<Meeting>, sqlx::Error> {
        let row: Option<MeetingRow> = sqlx::query_as(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE room_name = ?"
        ))
        .bind(room_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Meeting::from))
    }

    /// List meetings in a thread, newest first.
    pub async fn list_for_thread(&self, thread_id: i64) -> Result<Vec<Meeting>, sqlx::Error> {
        let rows: Vec<MeetingRow> = sqlx::query_as(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE thread_id = ? ORDER BY id DESC"
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Meeting::from).collect())
    }

    /// Activate a scheduled meeting, assigning its room name.
    /// Returns false if the meeting is not in the scheduled state.
    pub async fn start(&self, id: i64, room_name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE meetings SET status = 'active', room_name = ?, started_at = datetime('now') \
             WHERE id = ? AND status = 'scheduled'",
        )
        .bind(room_name)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// End an active meeting. Terminal; returns false unless it was active.
    pub async fn end(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE meetings SET status = 'ended', ended_at = datetime('now') \
             WHERE id = ? AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM meetings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
