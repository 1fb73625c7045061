use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id            TEXT PRIMARY KEY,
            hashed_token  TEXT NOT NULL UNIQUE,
            ip            TEXT,
            user_agent    TEXT,
            user_id       TEXT NOT NULL REFERENCES users(id),
            expired_at    TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user
            ON refresh_tokens(user_id);

        CREATE TABLE IF NOT EXISTS todos (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL REFERENCES users(id),
            task         TEXT NOT NULL,
            is_complete  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_todos_user
            ON todos(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
