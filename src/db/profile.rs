use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
}

/// Profile role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            _ => Role::Member,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_approved: bool,
    pub is_verified: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    uuid: String,
    username: String,
    display_name: String,
    password_hash: String,
    role: String,
    is_approved: i32,
    is_verified: i32,
    created_at: String,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role: Role::from_str(&row.role),
            is_approved: row.is_approved != 0,
            is_verified: row.is_verified != 0,
            created_at: row.created_at,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, uuid, username, display_name, password_hash, \
     role, is_approved, is_verified, created_at";

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new unapproved member profile. Returns the profile ID.
    pub async fn create(
        &self,
        uuid: &str,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO profiles (uuid, username, display_name, password_hash) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(username)
        .bind(display_name)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create a pre-approved admin profile (startup bootstrap). Returns the profile ID.
    pub async fn create_admin(
        &self,
        uuid: &str,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO profiles (uuid, username, display_name, password_hash, role, is_approved) \
             VALUES (?, ?, ?, ?, 'admin', 1)",
        )
        .bind(uuid)
        .bind(username)
        .bind(display_name)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Profile>, sqlx::Error> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Profile::from))
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Profile>, sqlx::Error> {
        let row: Option<ProfileRow> =
            sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE uuid = ?"))
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Profile::from))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<Profile>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Profile::from))
    }

    /// Approve a pending profile.
    pub async fn approve(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.set_approved(id, true).await
    }

    pub async fn set_approved(&self, id: i64, approved: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE profiles SET is_approved = ? WHERE id = ?")
            .bind(approved)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the role for a profile.
    pub async fn set_role(&self, id: i64, role: Role) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE profiles SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the verified flag.
    pub async fn set_verified(&self, id: i64, verified: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE profiles SET is_verified = ? WHERE id = ?")
            .bind(verified as i32)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the display name.
    pub async fn set_display_name(&self, id: i64, display_name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE profiles SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a profile. Memberships, messages, and tokens cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all profiles, pending first (for the admin dashboard).
    pub async fn list(&self) -> Result<Vec<Profile>, sqlx::Error> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY is_approved, created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Profile::from).collect())
    }

    /// Check if any admin profile exists.
    pub async fn has_admin(&self) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM profiles WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }
}
