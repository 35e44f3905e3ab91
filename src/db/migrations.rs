use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS books (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            author       TEXT,
            total_pages  INTEGER,
            status       TEXT NOT NULL DEFAULT 'reading'
                         CHECK(status IN ('reading','finished')),
            created_at   TEXT DEFAULT (datetime('now')),
            finished_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id         INTEGER REFERENCES books(id) ON DELETE SET NULL,
            session_date    TEXT NOT NULL,
            pages_read      INTEGER NOT NULL DEFAULT 0,
            minutes         INTEGER,
            note            TEXT,
            points_awarded  INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(session_date);

        CREATE TABLE IF NOT EXISTS profile (
            id                  INTEGER PRIMARY KEY CHECK(id = 1),
            display_name        TEXT NOT NULL DEFAULT 'Reader',
            points              INTEGER NOT NULL DEFAULT 0,
            books_completed     INTEGER NOT NULL DEFAULT 0,
            total_pages_read    INTEGER NOT NULL DEFAULT 0,
            current_streak      INTEGER NOT NULL DEFAULT 0,
            longest_streak      INTEGER NOT NULL DEFAULT 0,
            last_activity_date  TEXT,
            level               TEXT NOT NULL DEFAULT 'Iniciante',
            freezes_used        INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS streak_freezes (
            date        TEXT PRIMARY KEY,
            created_at  TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ")?;

    seed_profile(conn)?;
    Ok(())
}

fn seed_profile(conn: &Connection) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO profile (id) VALUES (1)", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM profile", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
