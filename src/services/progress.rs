//! Orchestration around the streak and level engines.
//!
//! Every mutation (session logged or deleted, book finished, day frozen) ends
//! in [`ProgressTracker::refresh`], which recomputes the streak from the full
//! history, persists it, then derives and caches the level.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;

use crate::config::AppConfig;
use crate::config::settings::PointsConfig;
use crate::db::repository::{BookRepo, FreezeRepo, ProfileRepo, SessionRepo};
use crate::engine::{
    DayBoundary, LevelInfo, LevelTier, calculate_streak, can_level_up, collect_activity_dates,
    level_info, parse_timestamp,
};
use crate::error::ReadQuestError;
use crate::models::{DailyStats, ReadingSession, StreakState, WeeklyGrid};

/// Result of one pass through the pipeline
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub streak: StreakState,
    pub level: LevelInfo,
    /// Label that was cached before this refresh
    pub previous_level: Option<LevelTier>,
    /// Stats now clear the tier after the cached one
    pub leveled_up: bool,
}

/// A session as entered by the user, before points are assigned
#[derive(Debug, Clone, Copy, Default)]
pub struct NewSession<'a> {
    pub book_id: Option<i64>,
    pub pages: u32,
    pub minutes: Option<u32>,
    pub note: Option<&'a str>,
    /// Defaults to now
    pub at: Option<&'a str>,
}

impl<'a> NewSession<'a> {
    pub fn pages(pages: u32) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn book(mut self, id: i64) -> Self {
        self.book_id = Some(id);
        self
    }

    pub fn at(mut self, at: &'a str) -> Self {
        self.at = Some(at);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggedSession {
    pub session_id: i64,
    pub points_awarded: u32,
    pub update: ProgressUpdate,
}

pub struct ProgressTracker {
    boundary: DayBoundary,
    points: PointsConfig,
    freezes_allowed: u32,
}

impl ProgressTracker {
    pub fn new(boundary: DayBoundary, points: PointsConfig, freezes_allowed: u32) -> Self {
        Self {
            boundary,
            points,
            freezes_allowed,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.day_boundary()?,
            config.points.clone(),
            config.streak.freezes_allowed,
        ))
    }

    pub fn boundary(&self) -> &DayBoundary {
        &self.boundary
    }

    pub fn today(&self) -> NaiveDate {
        self.boundary.today()
    }

    pub fn freezes_allowed(&self) -> u32 {
        self.freezes_allowed
    }

    /// Record a session and credit its points. Sessions dated after `today` are rejected.
    pub fn log_session(
        &self,
        conn: &Connection,
        session: &NewSession,
        today: NaiveDate,
    ) -> Result<LoggedSession> {
        if session.pages == 0 {
            return Err(ReadQuestError::InvalidPages.into());
        }
        if let Some(id) = session.book_id {
            if BookRepo::get(conn, id)?.is_none() {
                return Err(ReadQuestError::BookNotFound(id).into());
            }
        }
        let timestamp = match session.at {
            Some(raw) => parse_timestamp(raw)?.with_timezone(&Utc),
            None => Utc::now(),
        };
        let day = self.boundary.activity_date(&timestamp);
        if day > today {
            return Err(ReadQuestError::FutureDate(day).into());
        }
        let session_date = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        let points_awarded = self.points.for_session(session.pages);

        let tx = conn.unchecked_transaction()?;
        let session_id = SessionRepo::add(
            &tx,
            session.book_id,
            &session_date,
            session.pages,
            session.minutes,
            session.note,
            points_awarded,
        )?;
        ProfileRepo::credit_session(&tx, points_awarded, session.pages)?;
        let update = self.refresh_in(&tx, today)?;
        tx.commit()?;

        log::debug!(
            "Logged session #{} at {} ({} pages, +{} points)",
            session_id,
            session_date,
            session.pages,
            points_awarded
        );
        Ok(LoggedSession {
            session_id,
            points_awarded,
            update,
        })
    }

    /// Remove a session and take back exactly what it credited
    pub fn delete_session(
        &self,
        conn: &Connection,
        id: i64,
        today: NaiveDate,
    ) -> Result<ProgressUpdate> {
        let session = SessionRepo::get(conn, id)?.ok_or(ReadQuestError::SessionNotFound(id))?;
        let tx = conn.unchecked_transaction()?;
        SessionRepo::delete(&tx, id)?;
        ProfileRepo::debit_session(&tx, session.points_awarded, session.pages_read)?;
        let update = self.refresh_in(&tx, today)?;
        tx.commit()?;

        log::debug!(
            "Deleted session #{} (-{} points, -{} pages)",
            id,
            session.points_awarded,
            session.pages_read
        );
        Ok(update)
    }

    /// Returns `None` when the book was already finished
    pub fn finish_book(
        &self,
        conn: &Connection,
        id: i64,
        today: NaiveDate,
    ) -> Result<Option<ProgressUpdate>> {
        if BookRepo::get(conn, id)?.is_none() {
            return Err(ReadQuestError::BookNotFound(id).into());
        }
        let tx = conn.unchecked_transaction()?;
        if !BookRepo::mark_finished(&tx, id)? {
            return Ok(None);
        }
        ProfileRepo::credit_book_finished(&tx, self.points.per_book_finished)?;
        let update = self.refresh_in(&tx, today)?;
        tx.commit()?;
        Ok(Some(update))
    }

    /// Spend one freeze to count `date` as an activity day
    pub fn freeze_day(
        &self,
        conn: &Connection,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<ProgressUpdate> {
        if date > today {
            return Err(ReadQuestError::FutureDate(date).into());
        }
        let profile = ProfileRepo::get(conn)?;
        if profile.freezes_used >= self.freezes_allowed {
            return Err(ReadQuestError::NoFreezesLeft.into());
        }
        let sessions = self.timed_sessions(conn)?;
        if sessions
            .iter()
            .any(|(_, ts)| self.boundary.activity_date(ts) == date)
        {
            return Err(ReadQuestError::AlreadyActive(date).into());
        }

        let tx = conn.unchecked_transaction()?;
        if !FreezeRepo::add(&tx, date)? {
            return Err(ReadQuestError::AlreadyFrozen(date).into());
        }
        ProfileRepo::use_freeze(&tx)?;
        let update = self.refresh_in(&tx, today)?;
        tx.commit()?;

        log::info!(
            "Froze {} ({} of {} freezes used)",
            date,
            profile.freezes_used + 1,
            self.freezes_allowed
        );
        Ok(update)
    }

    /// Recompute streak and level from the full history and persist both.
    pub fn refresh(&self, conn: &Connection, today: NaiveDate) -> Result<ProgressUpdate> {
        let tx = conn.unchecked_transaction()?;
        let update = self.refresh_in(&tx, today)?;
        tx.commit()?;
        Ok(update)
    }

    /// Body of [`Self::refresh`], run inside the caller's transaction
    fn refresh_in(&self, conn: &Connection, today: NaiveDate) -> Result<ProgressUpdate> {
        let before = ProfileRepo::get(conn)?;
        let streak = self.recalculate_streak(conn, today, before.longest_streak)?;
        if streak != before.streak() {
            log::info!(
                "Streak {} -> {} (longest {})",
                before.current_streak,
                streak.current_streak,
                streak.longest_streak
            );
        }
        ProfileRepo::update_streak(conn, &streak)?;

        let profile = ProfileRepo::get(conn)?;
        let progress = profile.progress();
        let level = level_info(&progress);
        let previous_level = profile.level.parse::<LevelTier>().ok();
        if previous_level.is_none() {
            log::warn!("Replacing unknown cached level '{}'", profile.level);
        }
        // the derived tier already sits at the top of what the stats allow, so
        // eligibility is judged against the cached tier instead
        let leveled_up = previous_level.is_some_and(|cached| can_level_up(&progress, cached));
        ProfileRepo::set_level(conn, level.current_level.label())?;

        if leveled_up {
            log::info!("Level up: {}", level.current_level);
        }
        Ok(ProgressUpdate {
            streak,
            level,
            previous_level,
            leveled_up,
        })
    }

    /// Every stored session with its parsed timestamp. Unreadable timestamps are skipped.
    fn timed_sessions(
        &self,
        conn: &Connection,
    ) -> Result<Vec<(ReadingSession, DateTime<FixedOffset>)>> {
        let sessions = SessionRepo::all(conn)?;
        Ok(sessions
            .into_iter()
            .filter_map(|s| match parse_timestamp(&s.session_date) {
                Ok(ts) => Some((s, ts)),
                Err(e) => {
                    log::warn!("Skipping session #{}: {}", s.id, e);
                    None
                }
            })
            .collect())
    }

    /// Activity days from every stored session plus frozen days, then the streak over them.
    pub fn recalculate_streak(
        &self,
        conn: &Connection,
        today: NaiveDate,
        previous_longest: u32,
    ) -> Result<StreakState> {
        let timestamps = self.timed_sessions(conn)?.into_iter().map(|(_, ts)| ts);
        let mut dates = collect_activity_dates(timestamps, &self.boundary);
        let freezes = FreezeRepo::all(conn)?;
        log::debug!(
            "Recalculating streak over {} activity days and {} frozen days",
            dates.len(),
            freezes.len()
        );
        dates.extend(freezes);
        Ok(calculate_streak(&dates, today, previous_longest))
    }

    /// Pages and sessions per day for the seven days ending `today`
    pub fn weekly_grid(&self, conn: &Connection, today: NaiveDate) -> Result<WeeklyGrid> {
        let start = today - chrono::Duration::days(6);
        let mut days: BTreeMap<NaiveDate, DailyStats> = start
            .iter_days()
            .take(7)
            .map(|d| (d, DailyStats::empty(d)))
            .collect();

        for (session, ts) in self.timed_sessions(conn)? {
            if let Some(day) = days.get_mut(&self.boundary.activity_date(&ts)) {
                day.sessions += 1;
                day.pages_read += session.pages_read;
            }
        }
        for date in FreezeRepo::all(conn)? {
            if let Some(day) = days.get_mut(&date) {
                day.frozen = true;
            }
        }
        Ok(WeeklyGrid::new(days.into_values().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup() -> (Connection, ProgressTracker) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let tracker = ProgressTracker::new(DayBoundary::utc(), PointsConfig::default(), 2);
        (conn, tracker)
    }

    const TODAY: &str = "2024-05-20";

    #[test]
    fn logging_credits_points_and_starts_streak() {
        let (conn, tracker) = setup();
        let session = NewSession {
            minutes: Some(25),
            ..NewSession::pages(20).at("2024-05-20T07:30:00Z")
        };
        let logged = tracker.log_session(&conn, &session, d(TODAY)).unwrap();
        assert_eq!(logged.points_awarded, 25);
        assert_eq!(logged.update.streak.current_streak, 1);
        assert_eq!(logged.update.streak.last_activity_date, Some(d(TODAY)));

        let profile = ProfileRepo::get(&conn).unwrap();
        assert_eq!(profile.points, 25);
        assert_eq!(profile.total_pages_read, 20);
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.level, "Iniciante");
    }

    #[test]
    fn zero_pages_and_unknown_books_are_rejected() {
        let (conn, tracker) = setup();
        let err = tracker
            .log_session(&conn, &NewSession::pages(0), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::InvalidPages)
        ));

        let err = tracker
            .log_session(&conn, &NewSession::pages(5).book(9), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::BookNotFound(9))
        ));
    }

    #[test]
    fn deleting_a_session_reverts_points_and_streak() {
        let (conn, tracker) = setup();
        tracker
            .log_session(&conn, &NewSession::pages(10).at("2024-05-19T12:00:00Z"), d(TODAY))
            .unwrap();
        let second = tracker
            .log_session(&conn, &NewSession::pages(30).at("2024-05-20T12:00:00Z"), d(TODAY))
            .unwrap();
        assert_eq!(second.update.streak.current_streak, 2);

        let update = tracker
            .delete_session(&conn, second.session_id, d(TODAY))
            .unwrap();
        assert_eq!(update.streak.current_streak, 1);
        // historical best survives the deletion
        assert_eq!(update.streak.longest_streak, 2);

        let profile = ProfileRepo::get(&conn).unwrap();
        assert_eq!(profile.points, 15);
        assert_eq!(profile.total_pages_read, 10);

        let err = tracker
            .delete_session(&conn, second.session_id, d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::SessionNotFound(_))
        ));
    }

    #[test]
    fn freeze_bridges_a_missed_day() {
        let (conn, tracker) = setup();
        for at in ["2024-05-17T09:00:00Z", "2024-05-18T09:00:00Z", "2024-05-20T09:00:00Z"] {
            tracker
                .log_session(&conn, &NewSession::pages(5).at(at), d(TODAY))
                .unwrap();
        }
        assert_eq!(ProfileRepo::get(&conn).unwrap().current_streak, 1);

        let update = tracker.freeze_day(&conn, d("2024-05-19"), d(TODAY)).unwrap();
        assert_eq!(update.streak.current_streak, 4);

        let err = tracker
            .freeze_day(&conn, d("2024-05-19"), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::AlreadyFrozen(_))
        ));
    }

    #[test]
    fn freezes_run_out() {
        let (conn, tracker) = setup();
        tracker.freeze_day(&conn, d("2024-05-10"), d(TODAY)).unwrap();
        tracker.freeze_day(&conn, d("2024-05-11"), d(TODAY)).unwrap();
        let err = tracker
            .freeze_day(&conn, d("2024-05-12"), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::NoFreezesLeft)
        ));
        let err = tracker
            .freeze_day(&conn, d("2024-05-21"), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::FutureDate(_))
        ));
    }

    #[test]
    fn future_sessions_are_rejected() {
        let (conn, tracker) = setup();
        for at in ["2024-05-19T09:00:00Z", "2024-05-20T09:00:00Z"] {
            tracker
                .log_session(&conn, &NewSession::pages(5).at(at), d(TODAY))
                .unwrap();
        }
        let err = tracker
            .log_session(&conn, &NewSession::pages(5).at("2024-06-20T09:00:00Z"), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::FutureDate(day)) if *day == d("2024-06-20")
        ));

        let profile = ProfileRepo::get(&conn).unwrap();
        assert_eq!(profile.current_streak, 2);
        assert_eq!(profile.last_activity_date, Some(d(TODAY)));
        assert_eq!(profile.points, 20);
        assert_eq!(SessionRepo::all(&conn).unwrap().len(), 2);
    }

    #[test]
    fn freezing_a_day_with_reading_keeps_the_freeze() {
        let (conn, tracker) = setup();
        tracker
            .log_session(&conn, &NewSession::pages(5).at("2024-05-19T09:00:00Z"), d(TODAY))
            .unwrap();
        let err = tracker
            .freeze_day(&conn, d("2024-05-19"), d(TODAY))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReadQuestError>(),
            Some(ReadQuestError::AlreadyActive(_))
        ));
        assert_eq!(ProfileRepo::get(&conn).unwrap().freezes_used, 0);
        assert!(FreezeRepo::all(&conn).unwrap().is_empty());
    }

    #[test]
    fn failed_mutation_leaves_no_partial_writes() {
        let (conn, tracker) = setup();
        conn.execute_batch("DROP TABLE profile").unwrap();
        assert!(tracker
            .log_session(&conn, &NewSession::pages(5).at("2024-05-20T09:00:00Z"), d(TODAY))
            .is_err());
        assert!(SessionRepo::all(&conn).unwrap().is_empty());
    }

    #[test]
    fn finishing_books_levels_up() {
        let (conn, tracker) = setup();
        let book = BookRepo::add(&conn, "Vidas Secas", None, Some(176)).unwrap();
        for at in ["2024-05-18T21:00:00Z", "2024-05-19T21:00:00Z"] {
            tracker
                .log_session(&conn, &NewSession::pages(40).book(book).at(at), d(TODAY))
                .unwrap();
        }
        let last = NewSession::pages(40).book(book).at("2024-05-20T21:00:00Z");
        let before = tracker.log_session(&conn, &last, d(TODAY)).unwrap();
        // 3 x (5 + 40) = 135 points, 120 pages, streak 3, no books yet
        assert_eq!(before.update.level.current_level, LevelTier::Iniciante);
        assert!(!before.update.level.can_upgrade);

        let update = tracker.finish_book(&conn, book, d(TODAY)).unwrap().unwrap();
        assert_eq!(update.level.current_level, LevelTier::Explorador);
        assert!(update.leveled_up);
        assert_eq!(update.previous_level, Some(LevelTier::Iniciante));
        assert_eq!(ProfileRepo::get(&conn).unwrap().level, "Explorador");

        assert!(tracker.finish_book(&conn, book, d(TODAY)).unwrap().is_none());
    }

    #[test]
    fn refresh_is_idempotent() {
        let (conn, tracker) = setup();
        tracker
            .log_session(&conn, &NewSession::pages(12).at("2024-05-20T10:00:00Z"), d(TODAY))
            .unwrap();
        let first = tracker.refresh(&conn, d(TODAY)).unwrap();
        let second = tracker.refresh(&conn, d(TODAY)).unwrap();
        assert_eq!(first.streak, second.streak);
        assert_eq!(first.level.progress, second.level.progress);
        assert!(!second.leveled_up);
    }

    #[test]
    fn malformed_stored_timestamps_are_skipped() {
        let (conn, tracker) = setup();
        SessionRepo::add(&conn, None, "not a date", 5, None, None, 10).unwrap();
        SessionRepo::add(&conn, None, "2024-05-20T10:00:00Z", 5, None, None, 10).unwrap();
        let streak = tracker.recalculate_streak(&conn, d(TODAY), 0).unwrap();
        assert_eq!(streak.current_streak, 1);
        let grid = tracker.weekly_grid(&conn, d(TODAY)).unwrap();
        assert_eq!(grid.total_pages(), 5);
    }

    #[test]
    fn offset_moves_late_sessions_to_the_next_day() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let tracker =
            ProgressTracker::new(DayBoundary::new(330).unwrap(), PointsConfig::default(), 0);
        tracker
            .log_session(&conn, &NewSession::pages(5).at("2024-05-19T23:30:00Z"), d(TODAY))
            .unwrap();
        let profile = ProfileRepo::get(&conn).unwrap();
        assert_eq!(profile.last_activity_date, Some(d(TODAY)));
    }

    #[test]
    fn weekly_grid_buckets_by_day() {
        let (conn, tracker) = setup();
        for (at, pages) in [
            ("2024-05-20T08:00:00Z", 10),
            ("2024-05-20T20:00:00Z", 15),
            ("2024-05-16T08:00:00Z", 7),
            ("2024-05-01T08:00:00Z", 99),
        ] {
            tracker
                .log_session(&conn, &NewSession::pages(pages).at(at), d(TODAY))
                .unwrap();
        }
        tracker.freeze_day(&conn, d("2024-05-18"), d(TODAY)).unwrap();

        let grid = tracker.weekly_grid(&conn, d(TODAY)).unwrap();
        assert_eq!(grid.days.len(), 7);
        assert_eq!(grid.days.first().unwrap().date, d("2024-05-14"));
        assert_eq!(grid.days.last().unwrap().pages_read, 25);
        assert_eq!(grid.days.last().unwrap().sessions, 2);
        assert_eq!(grid.total_pages(), 32);
        assert_eq!(grid.active_days(), 3);
    }
}
