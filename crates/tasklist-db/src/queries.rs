use crate::Database;
use crate::models::{RefreshTokenRow, TodoRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Refresh tokens --

    pub fn insert_refresh_token(
        &self,
        id: &str,
        hashed_token: &str,
        ip: Option<&str>,
        user_agent: Option<&str>,
        user_id: &str,
        expired_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (id, hashed_token, ip, user_agent, user_id, expired_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, hashed_token, ip, user_agent, user_id, expired_at],
            )?;
            Ok(())
        })
    }

    pub fn get_refresh_token_by_hash(&self, hashed_token: &str) -> Result<Option<RefreshTokenRow>> {
        self.with_conn(|conn| query_refresh_token(conn, hashed_token))
    }

    /// Rotation: rewrite the existing row's hash and expiry in place. The
    /// previously issued plaintext stops matching `hashed_token` and is dead
    /// from this point on. Single UPDATE keyed by row id, no transaction
    /// needed.
    pub fn rotate_refresh_token(&self, id: &str, hashed_token: &str, expired_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE refresh_tokens
                 SET hashed_token = ?1, expired_at = ?2, updated_at = datetime('now')
                 WHERE id = ?3",
                rusqlite::params![hashed_token, expired_at, id],
            )?;
            if changed == 0 {
                return Err(anyhow!("Refresh token not found: {}", id));
            }
            Ok(())
        })
    }

    // -- Todos --

    pub fn insert_todo(&self, id: &str, user_id: &str, task: &str) -> Result<TodoRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO todos (id, user_id, task) VALUES (?1, ?2, ?3)",
                (id, user_id, task),
            )?;
            query_todo(conn, id, user_id)?.ok_or_else(|| anyhow!("Todo not found after insert: {}", id))
        })
    }

    pub fn list_todos(&self, user_id: &str) -> Result<Vec<TodoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, task, is_complete, created_at, updated_at
                 FROM todos
                 WHERE user_id = ?1
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], todo_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Update keyed by (id, user_id). Rows owned by someone else match
    /// nothing, so a cross-tenant update reads as absent.
    pub fn update_todo(
        &self,
        id: &str,
        user_id: &str,
        task: Option<&str>,
        is_complete: Option<bool>,
    ) -> Result<Option<TodoRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE todos
                 SET task = COALESCE(?1, task),
                     is_complete = COALESCE(?2, is_complete),
                     updated_at = datetime('now')
                 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![task, is_complete, id, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_todo(conn, id, user_id)
        })
    }

    /// Delete keyed by (id, user_id). Returns whether a row was removed.
    pub fn delete_todo(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM todos WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // column is one of two fixed names, never user input
    let sql = format!("SELECT id, email, password, created_at FROM users WHERE {} = ?1", column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_refresh_token(conn: &Connection, hashed_token: &str) -> Result<Option<RefreshTokenRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, hashed_token, ip, user_agent, user_id, expired_at, created_at, updated_at
         FROM refresh_tokens
         WHERE hashed_token = ?1",
    )?;

    let row = stmt
        .query_row([hashed_token], |row| {
            Ok(RefreshTokenRow {
                id: row.get(0)?,
                hashed_token: row.get(1)?,
                ip: row.get(2)?,
                user_agent: row.get(3)?,
                user_id: row.get(4)?,
                expired_at: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_todo(conn: &Connection, id: &str, user_id: &str) -> Result<Option<TodoRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, task, is_complete, created_at, updated_at
         FROM todos
         WHERE id = ?1 AND user_id = ?2",
    )?;

    let row = stmt.query_row((id, user_id), todo_from_row).optional()?;

    Ok(row)
}

fn todo_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<TodoRow, rusqlite::Error> {
    Ok(TodoRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task: row.get(2)?,
        is_complete: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn user_roundtrip_and_unique_email() {
        let db = db();
        db.create_user("u1", "a@b.com", "hash").unwrap();

        let user = db.get_user_by_email("a@b.com").unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(db.get_user_by_id("u1").unwrap().unwrap().email, "a@b.com");

        // email is UNIQUE
        assert!(db.create_user("u2", "a@b.com", "hash").is_err());
    }

    #[test]
    fn refresh_token_rotation_replaces_hash_in_place() {
        let db = db();
        db.create_user("u1", "a@b.com", "hash").unwrap();
        db.insert_refresh_token("t1", "old-hash", Some("127.0.0.1"), None, "u1", "2099-01-01T00:00:00+00:00")
            .unwrap();

        db.rotate_refresh_token("t1", "new-hash", "2099-06-01T00:00:00+00:00").unwrap();

        assert!(db.get_refresh_token_by_hash("old-hash").unwrap().is_none());
        let row = db.get_refresh_token_by_hash("new-hash").unwrap().unwrap();
        assert_eq!(row.id, "t1");
        assert_eq!(row.ip.as_deref(), Some("127.0.0.1"));
        assert!(row.updated_at.is_some());
    }

    #[test]
    fn rotating_unknown_row_fails() {
        let db = db();
        assert!(db.rotate_refresh_token("missing", "hash", "2099-01-01T00:00:00+00:00").is_err());
    }

    #[test]
    fn todos_are_tenant_scoped() {
        let db = db();
        db.create_user("a", "a@b.com", "h").unwrap();
        db.create_user("b", "b@b.com", "h").unwrap();
        db.insert_todo("t1", "a", "write tests").unwrap();

        // B cannot see, update, or delete A's row
        assert!(db.update_todo("t1", "b", Some("stolen"), None).unwrap().is_none());
        assert!(!db.delete_todo("t1", "b").unwrap());

        let kept = db.update_todo("t1", "a", None, Some(true)).unwrap().unwrap();
        assert!(kept.is_complete);
        assert_eq!(kept.task, "write tests");

        assert!(db.delete_todo("t1", "a").unwrap());
        assert!(db.list_todos("a").unwrap().is_empty());
    }
}
