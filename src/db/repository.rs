use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

use crate::models::{Book, BookStatus, Profile, ReadingSession, StreakState};

/// Stored counters are clamped into `u32`; NULL and negatives read as zero.
fn counter(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            log::warn!("Ignoring malformed stored date '{}': {}", s, e);
            None
        }
    }
}

fn format_day(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

// ─── Book repo ───────────────────────────────────────────────────────────────

pub struct BookRepo;

const BOOK_COLUMNS: &str = "
    SELECT b.id, b.title, b.author, b.total_pages, b.status, b.finished_at,
           COALESCE((SELECT SUM(s.pages_read) FROM sessions s WHERE s.book_id = b.id), 0)
    FROM books b";

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let status: String = row.get(4)?;
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        total_pages: row.get::<_, Option<i64>>(3)?.map(|p| counter(Some(p))),
        status: BookStatus::from_str(&status)
            .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?,
        finished_at: row.get(5)?,
        pages_read: counter(row.get(6)?),
    })
}

impl BookRepo {
    pub fn add(
        conn: &Connection,
        title: &str,
        author: Option<&str>,
        total_pages: Option<u32>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO books (title, author, total_pages, status) VALUES (?1, ?2, ?3, 'reading')",
            params![title, author, total_pages],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Book>> {
        conn.query_row(
            &format!("{} WHERE b.id = ?1", BOOK_COLUMNS),
            params![id],
            book_from_row,
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn list(conn: &Connection) -> Result<Vec<Book>> {
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY CASE b.status WHEN 'reading' THEN 0 ELSE 1 END, b.id",
            BOOK_COLUMNS
        ))?;
        let rows = stmt.query_map([], book_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    /// Returns false if the book was already finished
    pub fn mark_finished(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE books SET status = 'finished', finished_at = datetime('now')
             WHERE id = ?1 AND status = 'reading'",
            params![id],
        )?;
        Ok(changed > 0)
    }
}

// ─── Session repo ────────────────────────────────────────────────────────────

pub struct SessionRepo;

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ReadingSession> {
    Ok(ReadingSession {
        id: row.get(0)?,
        book_id: row.get(1)?,
        session_date: row.get(2)?,
        pages_read: counter(row.get(3)?),
        minutes: row.get::<_, Option<i64>>(4)?.map(|m| counter(Some(m))),
        note: row.get(5)?,
        points_awarded: counter(row.get(6)?),
    })
}

impl SessionRepo {
    pub fn add(
        conn: &Connection,
        book_id: Option<i64>,
        session_date: &str,
        pages_read: u32,
        minutes: Option<u32>,
        note: Option<&str>,
        points_awarded: u32,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO sessions (book_id, session_date, pages_read, minutes, note, points_awarded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![book_id, session_date, pages_read, minutes, note, points_awarded],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<ReadingSession>> {
        conn.query_row(
            "SELECT id, book_id, session_date, pages_read, minutes, note, points_awarded
             FROM sessions WHERE id = ?1",
            params![id],
            session_from_row,
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    /// Every session, oldest first
    pub fn all(conn: &Connection) -> Result<Vec<ReadingSession>> {
        let mut stmt = conn.prepare(
            "SELECT id, book_id, session_date, pages_read, minutes, note, points_awarded
             FROM sessions ORDER BY session_date, id",
        )?;
        let rows = stmt.query_map([], session_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<ReadingSession>> {
        let mut stmt = conn.prepare(
            "SELECT id, book_id, session_date, pages_read, minutes, note, points_awarded
             FROM sessions ORDER BY session_date DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], session_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

// ─── Profile repo ────────────────────────────────────────────────────────────

pub struct ProfileRepo;

impl ProfileRepo {
    pub fn get(conn: &Connection) -> Result<Profile> {
        conn.query_row(
            "SELECT display_name, points, books_completed, total_pages_read,
                    current_streak, longest_streak, last_activity_date, level, freezes_used
             FROM profile WHERE id = 1",
            [],
            |row| {
                Ok(Profile {
                    display_name: row.get(0)?,
                    points: counter(row.get(1)?),
                    books_completed: counter(row.get(2)?),
                    total_pages_read: counter(row.get(3)?),
                    current_streak: counter(row.get(4)?),
                    longest_streak: counter(row.get(5)?),
                    last_activity_date: row
                        .get::<_, Option<String>>(6)?
                        .as_deref()
                        .and_then(parse_day),
                    level: row.get(7)?,
                    freezes_used: counter(row.get(8)?),
                })
            },
        )
        .map_err(anyhow::Error::from)
    }

    pub fn set_display_name(conn: &Connection, name: &str) -> Result<()> {
        conn.execute(
            "UPDATE profile SET display_name = ?1 WHERE id = 1",
            params![name],
        )?;
        Ok(())
    }

    pub fn update_streak(conn: &Connection, streak: &StreakState) -> Result<()> {
        conn.execute(
            "UPDATE profile
             SET current_streak = ?1, longest_streak = ?2, last_activity_date = ?3
             WHERE id = 1",
            params![
                streak.current_streak,
                streak.longest_streak,
                streak.last_activity_date.map(format_day),
            ],
        )?;
        Ok(())
    }

    pub fn set_level(conn: &Connection, label: &str) -> Result<()> {
        conn.execute("UPDATE profile SET level = ?1 WHERE id = 1", params![label])?;
        Ok(())
    }

    pub fn credit_session(conn: &Connection, points: u32, pages: u32) -> Result<()> {
        conn.execute(
            "UPDATE profile
             SET points = points + ?1, total_pages_read = total_pages_read + ?2
             WHERE id = 1",
            params![points, pages],
        )?;
        Ok(())
    }

    pub fn debit_session(conn: &Connection, points: u32, pages: u32) -> Result<()> {
        conn.execute(
            "UPDATE profile
             SET points = MAX(0, points - ?1), total_pages_read = MAX(0, total_pages_read - ?2)
             WHERE id = 1",
            params![points, pages],
        )?;
        Ok(())
    }

    pub fn credit_book_finished(conn: &Connection, points: u32) -> Result<()> {
        conn.execute(
            "UPDATE profile SET points = points + ?1, books_completed = books_completed + 1
             WHERE id = 1",
            params![points],
        )?;
        Ok(())
    }

    pub fn use_freeze(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE profile SET freezes_used = freezes_used + 1 WHERE id = 1",
            [],
        )?;
        Ok(())
    }
}

// ─── Freeze repo ─────────────────────────────────────────────────────────────

pub struct FreezeRepo;

impl FreezeRepo {
    /// Returns false if the day was already frozen
    pub fn add(conn: &Connection, date: NaiveDate) -> Result<bool> {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO streak_freezes (date) VALUES (?1)",
            params![format_day(date)],
        )?;
        Ok(changed > 0)
    }

    pub fn all(conn: &Connection) -> Result<Vec<NaiveDate>> {
        let mut stmt = conn.prepare("SELECT date FROM streak_freezes ORDER BY date")?;
        let dates: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(dates.iter().filter_map(|s| parse_day(s)).collect())
    }
}

// ─── App meta ────────────────────────────────────────────────────────────────

pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn books_track_pages_from_sessions() {
        let conn = conn();
        let id = BookRepo::add(&conn, "Dom Casmurro", Some("Machado de Assis"), Some(256)).unwrap();
        SessionRepo::add(&conn, Some(id), "2024-05-01T20:00:00Z", 40, Some(30), None, 45).unwrap();
        let note = Some("ch. 3");
        SessionRepo::add(&conn, Some(id), "2024-05-02T20:00:00Z", 24, None, note, 29).unwrap();

        let book = BookRepo::get(&conn, id).unwrap().unwrap();
        assert_eq!(book.pages_read, 64);
        assert_eq!(book.status, BookStatus::Reading);
        assert_eq!(book.completion_ratio(), Some(0.25));

        assert!(BookRepo::mark_finished(&conn, id).unwrap());
        assert!(!BookRepo::mark_finished(&conn, id).unwrap());
        let book = BookRepo::get(&conn, id).unwrap().unwrap();
        assert_eq!(book.status, BookStatus::Finished);
        assert!(book.finished_at.is_some());
    }

    #[test]
    fn missing_book_is_none() {
        let conn = conn();
        assert!(BookRepo::get(&conn, 42).unwrap().is_none());
    }

    #[test]
    fn sessions_list_newest_first_and_delete() {
        let conn = conn();
        let old =
            SessionRepo::add(&conn, None, "2024-05-01T08:00:00Z", 10, None, None, 15).unwrap();
        let new = SessionRepo::add(&conn, None, "2024-05-03T08:00:00Z", 5, None, None, 10).unwrap();

        let recent = SessionRepo::recent(&conn, 10).unwrap();
        assert_eq!(recent.iter().map(|s| s.id).collect::<Vec<_>>(), vec![new, old]);

        let all = SessionRepo::all(&conn).unwrap();
        assert_eq!(all.first().map(|s| s.id), Some(old));

        assert!(SessionRepo::delete(&conn, old).unwrap());
        assert!(!SessionRepo::delete(&conn, old).unwrap());
        assert_eq!(SessionRepo::all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn profile_counters_never_go_negative() {
        let conn = conn();
        ProfileRepo::credit_session(&conn, 10, 5).unwrap();
        ProfileRepo::debit_session(&conn, 25, 50).unwrap();
        let profile = ProfileRepo::get(&conn).unwrap();
        assert_eq!(profile.points, 0);
        assert_eq!(profile.total_pages_read, 0);
    }

    #[test]
    fn negative_stored_values_read_as_zero() {
        let conn = conn();
        conn.execute("UPDATE profile SET points = -30 WHERE id = 1", [])
            .unwrap();
        assert_eq!(ProfileRepo::get(&conn).unwrap().points, 0);
    }

    #[test]
    fn streak_fields_round_trip() {
        let conn = conn();
        let streak = StreakState {
            current_streak: 4,
            longest_streak: 9,
            last_activity_date: NaiveDate::from_ymd_opt(2024, 5, 20),
        };
        ProfileRepo::update_streak(&conn, &streak).unwrap();
        assert_eq!(ProfileRepo::get(&conn).unwrap().streak(), streak);

        ProfileRepo::update_streak(&conn, &StreakState::default()).unwrap();
        assert_eq!(ProfileRepo::get(&conn).unwrap().last_activity_date, None);
    }

    #[test]
    fn freezes_are_unique_per_day() {
        let conn = conn();
        let day = NaiveDate::from_ymd_opt(2024, 5, 19).unwrap();
        assert!(FreezeRepo::add(&conn, day).unwrap());
        assert!(!FreezeRepo::add(&conn, day).unwrap());
        assert_eq!(FreezeRepo::all(&conn).unwrap(), vec![day]);
    }

    #[test]
    fn meta_upserts() {
        let conn = conn();
        assert_eq!(MetaRepo::get(&conn, "k").unwrap(), None);
        MetaRepo::set(&conn, "k", "1").unwrap();
        MetaRepo::set(&conn, "k", "2").unwrap();
        assert_eq!(MetaRepo::get(&conn, "k").unwrap().as_deref(), Some("2"));
    }
}
