mod cli;
mod config;
mod db;
mod engine;
mod error;
mod models;
mod services;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use cli::args::{Cli, Commands};
use cli::handlers;
use config::AppConfig;
use db::migrations::run_migrations;
use db::repository::{MetaRepo, ProfileRepo};
use services::ProgressTracker;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Run migrations on every startup
    run_migrations(&conn)?;
    ensure_profile_name(&conn, &config)?;

    let tracker = ProgressTracker::from_config(&config)?;
    log::debug!(
        "Using {:?} with day boundary at UTC{:+} minutes",
        db_path,
        tracker.boundary().offset_minutes()
    );

    match cli.command {
        Some(Commands::Config { name, timezone }) => {
            handlers::handle_config(&conn, &mut config, name.as_deref(), timezone.as_deref())?;
        }
        Some(Commands::Book { action }) => {
            handlers::handle_book(&conn, &tracker, &action)?;
        }
        Some(Commands::Read {
            pages,
            book,
            minutes,
            note,
            at,
        }) => {
            handlers::handle_read(
                &conn,
                &tracker,
                pages,
                book,
                minutes,
                note.as_deref(),
                at.as_deref(),
            )?;
        }
        Some(Commands::Session { action }) => {
            handlers::handle_session(&conn, &tracker, &action)?;
        }
        Some(Commands::Freeze { date }) => {
            handlers::handle_freeze(&conn, &tracker, date.as_deref())?;
        }
        Some(Commands::Stats { week }) => {
            handlers::handle_stats(&conn, &tracker, week)?;
        }
        Some(Commands::Level) => {
            handlers::handle_level(&conn)?;
        }
        Some(Commands::Recalc) => {
            handlers::handle_recalc(&conn, &tracker)?;
        }
        Some(Commands::Prefs {
            streak_reminders,
            level_up_alerts,
        }) => {
            handlers::handle_prefs(&conn, streak_reminders, level_up_alerts)?;
        }
        Some(Commands::Export { json }) => {
            handlers::handle_export(&conn, &tracker, json)?;
        }
        // No subcommand → overview
        None => {
            handlers::handle_stats(&conn, &tracker, true)?;
        }
    }

    Ok(())
}

/// Copy the configured display name onto the profile the first time the database is opened.
fn ensure_profile_name(conn: &Connection, config: &AppConfig) -> Result<()> {
    if MetaRepo::get(conn, "profile_initialized")?.as_deref() != Some("1") {
        ProfileRepo::set_display_name(conn, &config.profile.display_name)?;
        MetaRepo::set(conn, "profile_initialized", "1")?;
    }
    Ok(())
}
