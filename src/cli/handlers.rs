use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::cli::args::{BookCommands, SessionCommands, Toggle};
use crate::config::AppConfig;
use crate::db::repository::{BookRepo, ProfileRepo, SessionRepo};
use crate::engine::{LevelInfo, LevelTier, Requirements, level_info};
use crate::models::{BookStatus, Profile, StreakState, WeeklyGrid};
use crate::services::{
    NewSession, NotificationPreferences, ProgressTracker, ProgressUpdate, SqlitePreferenceStore,
};
use crate::utils::format::{
    fit_width, format_minutes, format_tz_offset, parse_tz_offset, progress_bar,
};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

fn load_prefs(conn: &Connection) -> Result<NotificationPreferences> {
    NotificationPreferences::load(&SqlitePreferenceStore::new(conn))
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// Messages that follow any mutation: level up, plus the streak nudge
fn report_update(update: &ProgressUpdate, prefs: &NotificationPreferences, today: NaiveDate) {
    if prefs.level_up_alerts && update.leveled_up {
        println!();
        println_colored!(
            GOLD,
            "  ★ Level up! You are now {}",
            update.level.current_level
        );
    }
    report_streak_risk(&update.streak, prefs, today);
}

fn report_streak_risk(streak: &StreakState, prefs: &NotificationPreferences, today: NaiveDate) {
    if prefs.streak_reminders && streak.at_risk(today) {
        println_colored!(
            AMBER,
            "  Read something today to keep your {}-day streak",
            streak.current_streak
        );
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

pub fn handle_config(
    conn: &Connection,
    config: &mut AppConfig,
    name: Option<&str>,
    timezone: Option<&str>,
) -> Result<()> {
    let mut changed = false;
    if let Some(name) = name {
        config.profile.display_name = name.to_string();
        ProfileRepo::set_display_name(conn, name)?;
        changed = true;
    }
    if let Some(tz) = timezone {
        let minutes = parse_tz_offset(tz)
            .with_context(|| format!("Invalid timezone offset '{}'", tz))?;
        config.profile.timezone_offset = minutes;
        // validates the offset before it is saved
        config.day_boundary()?;
        changed = true;
    }

    if changed {
        config.save()?;
        // day boundaries may have moved
        let tracker = ProgressTracker::from_config(config)?;
        tracker.refresh(conn, tracker.today())?;
        println_colored!(GREEN, "  ✓ Configuration saved");
    }

    println!();
    println_colored!(GOLD, "  Configuration");
    println!();
    println!("  Name:           {}", config.profile.display_name);
    println!(
        "  Timezone:       UTC{}",
        format_tz_offset(config.profile.timezone_offset)
    );
    println!(
        "  Points:         {}/page, {}/session, {}/book finished",
        config.points.per_page, config.points.per_session, config.points.per_book_finished
    );
    println!("  Freezes:        {}", config.streak.freezes_allowed);
    println!("  Config file:    {:?}", AppConfig::config_path()?);
    println!();
    Ok(())
}

// ─── Books ───────────────────────────────────────────────────────────────────

pub fn handle_book(
    conn: &Connection,
    tracker: &ProgressTracker,
    action: &BookCommands,
) -> Result<()> {
    match action {
        BookCommands::Add {
            title,
            author,
            pages,
        } => {
            let id = BookRepo::add(conn, title, author.as_deref(), *pages)?;
            println_colored!(GREEN, "  ✓ Added #{}: {}", id, title);
        }
        BookCommands::List => {
            let books = BookRepo::list(conn)?;
            println!();
            if books.is_empty() {
                println_colored!(DIM, "  No books yet. Add one with `readquest book add <title>`");
            }
            for book in &books {
                let progress = match (book.completion_ratio(), book.total_pages) {
                    (Some(ratio), Some(total)) => format!(
                        "{} {}/{}",
                        progress_bar((ratio * 100.0).round() as u32, 100, 10),
                        book.pages_read,
                        total
                    ),
                    _ => format!("{} pages", book.pages_read),
                };
                let line = format!(
                    "  #{:<4} {}  {:<20}  {}",
                    book.id,
                    fit_width(&book.title, 30),
                    fit_width(book.author.as_deref().unwrap_or("-"), 20),
                    progress
                );
                match book.status {
                    BookStatus::Finished => println_colored!(
                        DIM,
                        "{}  ✓ {}",
                        line,
                        book.finished_at.as_deref().unwrap_or_default()
                    ),
                    BookStatus::Reading => println!("{}", line),
                }
            }
            println!();
        }
        BookCommands::Finish { id } => {
            let today = tracker.today();
            match tracker.finish_book(conn, *id, today)? {
                Some(update) => {
                    println_colored!(GREEN, "  ✓ Finished book #{}", id);
                    report_update(&update, &load_prefs(conn)?, today);
                }
                None => println_colored!(DIM, "  Book #{} was already finished", id),
            }
        }
    }
    Ok(())
}

// ─── Sessions ────────────────────────────────────────────────────────────────

pub fn handle_read(
    conn: &Connection,
    tracker: &ProgressTracker,
    pages: u32,
    book: Option<i64>,
    minutes: Option<u32>,
    note: Option<&str>,
    at: Option<&str>,
) -> Result<()> {
    let today = tracker.today();
    let session = NewSession {
        book_id: book,
        pages,
        minutes,
        note,
        at,
    };
    let logged = tracker.log_session(conn, &session, today)?;
    let duration = minutes
        .map(|m| format!(" in {}", format_minutes(m)))
        .unwrap_or_default();
    println_colored!(
        GREEN,
        "  ✓ Logged {} pages{} (+{} points)",
        pages,
        duration,
        logged.points_awarded
    );
    println_colored!(
        BOLD,
        "  Streak: {} days  ·  {} {}%",
        logged.update.streak.current_streak,
        logged.update.level.current_level,
        logged.update.level.progress
    );
    report_update(&logged.update, &load_prefs(conn)?, today);
    Ok(())
}

pub fn handle_session(
    conn: &Connection,
    tracker: &ProgressTracker,
    action: &SessionCommands,
) -> Result<()> {
    match action {
        SessionCommands::List { limit } => {
            let sessions = SessionRepo::recent(conn, *limit)?;
            println!();
            if sessions.is_empty() {
                println_colored!(DIM, "  No sessions logged yet");
            }
            for s in &sessions {
                let book = match s.book_id {
                    Some(id) => BookRepo::get(conn, id)?
                        .map(|b| b.title)
                        .unwrap_or_else(|| format!("#{}", id)),
                    None => "-".to_string(),
                };
                println!(
                    "  #{:<5} {}  {:>4} pages  {:>7}  {}",
                    s.id,
                    s.session_date,
                    s.pages_read,
                    s.minutes.map(format_minutes).unwrap_or_default(),
                    fit_width(&book, 30)
                );
                if let Some(note) = &s.note {
                    println_colored!(DIM, "         {}", note);
                }
            }
            println!();
        }
        SessionCommands::Delete { id } => {
            let today = tracker.today();
            let update = tracker.delete_session(conn, *id, today)?;
            println_colored!(RED, "  ✗ Deleted session #{}", id);
            println_colored!(
                BOLD,
                "  Streak: {} days  ·  {}",
                update.streak.current_streak,
                update.level.current_level
            );
        }
    }
    Ok(())
}

// ─── Freeze ──────────────────────────────────────────────────────────────────

pub fn handle_freeze(
    conn: &Connection,
    tracker: &ProgressTracker,
    date: Option<&str>,
) -> Result<()> {
    let today = tracker.today();
    let date = match date {
        Some(raw) => parse_day(raw)?,
        None => today.pred_opt().context("No day before today")?,
    };
    let update = tracker.freeze_day(conn, date, today)?;
    let profile = ProfileRepo::get(conn)?;
    println_colored!(
        GREEN,
        "  ✓ {} frozen. Streak: {} days",
        date,
        update.streak.current_streak
    );
    println_colored!(
        DIM,
        "  Freezes left: {}",
        tracker.freezes_allowed().saturating_sub(profile.freezes_used)
    );
    Ok(())
}

// ─── Stats ───────────────────────────────────────────────────────────────────

pub fn handle_stats(conn: &Connection, tracker: &ProgressTracker, week: bool) -> Result<()> {
    let today = tracker.today();
    // a missed day must show as a broken streak without waiting for the next session
    let update = tracker.refresh(conn, today)?;
    let profile = ProfileRepo::get(conn)?;
    let info = &update.level;

    println!();
    println_colored!(GOLD, "  {} — Statistics", profile.display_name);
    println!();
    println_colored!(
        BOLD,
        "  Streak:      {} days current  |  {} days best",
        update.streak.current_streak,
        update.streak.longest_streak
    );
    println!(
        "  Level:       {}  {} {}%",
        info.current_level,
        progress_bar(info.progress as u32, 100, 20),
        info.progress
    );
    if !info.is_max_level {
        println_colored!(DIM, "               next: {}", info.next_level);
    }
    println!("  Points:      {}", profile.points);
    println!("  Books:       {} finished", profile.books_completed);
    println!("  Pages:       {}", profile.total_pages_read);
    if let Some(last) = update.streak.last_activity_date {
        if update.streak.is_active(today) {
            println_colored!(DIM, "  Last read:   {}", last);
        } else {
            println_colored!(RED, "  Last read:   {} (streak broken)", last);
        }
    }

    if week {
        let grid = tracker.weekly_grid(conn, today)?;
        println!();
        println_colored!(DIM, "  Last 7 days  (● = read, ❄ = frozen, ○ = none)");
        println!();
        print!("  ");
        for day in &grid.days {
            let icon = if day.sessions > 0 {
                format!("{}●\x1b[0m ", GREEN)
            } else if day.frozen {
                format!("{}❄\x1b[0m ", AMBER)
            } else {
                format!("{}○\x1b[0m ", DIM)
            };
            print!("{}", icon);
        }
        println!();
        println_colored!(
            DIM,
            "  {} pages over {} active days",
            grid.total_pages(),
            grid.active_days()
        );
    }

    report_streak_risk(&update.streak, &load_prefs(conn)?, today);
    println!();
    Ok(())
}

// ─── Level ───────────────────────────────────────────────────────────────────

fn requirement_row(label: &str, have: u32, need: u32, missing: u32) {
    if missing == 0 {
        println_colored!(GREEN, "  {:<8} {:>6} / {:<6} ✓", label, have, need);
    } else {
        println_colored!(
            AMBER,
            "  {:<8} {:>6} / {:<6} {} more",
            label,
            have,
            need,
            missing
        );
    }
}

pub fn handle_level(conn: &Connection) -> Result<()> {
    let profile = ProfileRepo::get(conn)?;
    let progress = profile.progress();
    let info = level_info(&progress);

    println!();
    println_colored!(GOLD, "  Level: {}", info.current_level);
    println!();
    for tier in LevelTier::ALL {
        let r = tier.requirements();
        let marker = if tier == info.current_level { "▶" } else { " " };
        let line = format!(
            "  {} {:<14} {:>5} pts  {:>3} books  {:>3} days  {:>6} pages",
            marker,
            tier.label(),
            r.points,
            r.books,
            r.streak,
            r.pages
        );
        if tier <= info.current_level {
            println_colored!(DIM, "{}", line);
        } else {
            println!("{}", line);
        }
    }

    if let Some(next) = info.next_requirements {
        let gap: Requirements = next.shortfall(&progress);
        println!();
        println_colored!(
            BOLD,
            "  Toward {} ({}%)",
            info.next_level,
            info.progress
        );
        requirement_row("Points", progress.points, next.points, gap.points);
        requirement_row("Books", progress.books_completed, next.books, gap.books);
        requirement_row("Streak", progress.longest_streak, next.streak, gap.streak);
        requirement_row("Pages", progress.total_pages_read, next.pages, gap.pages);
    } else {
        println!();
        println_colored!(GREEN, "  Highest level reached");
    }
    println!();
    Ok(())
}

// ─── Recalc ──────────────────────────────────────────────────────────────────

pub fn handle_recalc(conn: &Connection, tracker: &ProgressTracker) -> Result<()> {
    let before = ProfileRepo::get(conn)?;
    let update = tracker.refresh(conn, tracker.today())?;
    println_colored!(
        GREEN,
        "  ✓ Streak {} → {} (best {}), level {}",
        before.current_streak,
        update.streak.current_streak,
        update.streak.longest_streak,
        update.level.current_level
    );
    Ok(())
}

// ─── Preferences ─────────────────────────────────────────────────────────────

pub fn handle_prefs(
    conn: &Connection,
    streak_reminders: Option<Toggle>,
    level_up_alerts: Option<Toggle>,
) -> Result<()> {
    let mut store = SqlitePreferenceStore::new(conn);
    let mut prefs = NotificationPreferences::load(&store)?;
    if streak_reminders.is_some() || level_up_alerts.is_some() {
        if let Some(t) = streak_reminders {
            prefs.streak_reminders = t.enabled();
        }
        if let Some(t) = level_up_alerts {
            prefs.level_up_alerts = t.enabled();
        }
        prefs.save(&mut store)?;
        println_colored!(GREEN, "  ✓ Preferences saved");
    }
    let on_off = |b: bool| if b { "on" } else { "off" };
    println!("  Streak reminders:  {}", on_off(prefs.streak_reminders));
    println!("  Level-up alerts:   {}", on_off(prefs.level_up_alerts));
    Ok(())
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ExportDocument {
    generated_on: NaiveDate,
    profile: Profile,
    level: LevelInfo,
    week: WeeklyGrid,
}

pub fn handle_export(conn: &Connection, tracker: &ProgressTracker, json: bool) -> Result<()> {
    let today = tracker.today();
    let update = tracker.refresh(conn, today)?;
    let profile = ProfileRepo::get(conn)?;
    let week = tracker.weekly_grid(conn, today)?;

    if json {
        let doc = ExportDocument {
            generated_on: today,
            profile,
            level: update.level,
            week,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Serializing export")?
        );
        return Ok(());
    }

    println!("# readquest — Weekly Summary");
    println!("# {}", today);
    println!();
    println!("Reader: {}", profile.display_name);
    println!();
    println!("## Pages (last 7 days)");
    let busiest = week.days.iter().map(|d| d.pages_read).max().unwrap_or(0);
    for day in &week.days {
        let marker = if day.frozen && day.sessions == 0 { " (frozen)" } else { "" };
        println!(
            "  {}  {:>4}  {}{}",
            day.date,
            day.pages_read,
            progress_bar(day.pages_read, busiest, 10),
            marker
        );
    }
    println!();
    println!("## Summary");
    println!(
        "  Streak:  {} days (best: {})",
        update.streak.current_streak, update.streak.longest_streak
    );
    println!(
        "  Level:   {} ({}% to {})",
        update.level.current_level, update.level.progress, update.level.next_level
    );
    println!("  Points:  {}", profile.points);
    println!("  Books:   {}", profile.books_completed);
    println!("  Pages (7d): {}", week.total_pages());
    Ok(())
}
