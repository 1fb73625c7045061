/// Database row types — these map directly to SQLite rows.
/// Distinct from tasklist-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct RefreshTokenRow {
    pub id: String,
    pub hashed_token: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: String,
    pub expired_at: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

pub struct TodoRow {
    pub id: String,
    pub user_id: String,
    pub task: String,
    pub is_complete: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}
