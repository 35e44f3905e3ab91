use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "readquest",
    version,
    author,
    about = "Track your reading: streaks, points and levels"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or change settings
    Config {
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// UTC offset used to decide which day a session belongs to (e.g. +5:30, -3)
        #[arg(long, allow_hyphen_values = true)]
        timezone: Option<String>,
    },
    /// Manage your books
    Book {
        #[command(subcommand)]
        action: BookCommands,
    },
    /// Log a reading session
    Read {
        /// Number of pages read
        pages: u32,
        /// Book id (see `book list`)
        #[arg(long)]
        book: Option<i64>,
        /// Minutes spent reading
        #[arg(long)]
        minutes: Option<u32>,
        /// Free-form note (chapter, thoughts)
        #[arg(long)]
        note: Option<String>,
        /// When the session happened (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Inspect or remove logged sessions
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },
    /// Spend a streak freeze to cover a missed day
    Freeze {
        /// Day to freeze (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<String>,
    },
    /// Show statistics
    Stats {
        /// Show the last 7 days
        #[arg(long)]
        week: bool,
    },
    /// Show level requirements and what is still missing
    Level,
    /// Recompute streak and level from the full history
    Recalc,
    /// Notification preferences
    Prefs {
        /// Remind when the streak is about to break
        #[arg(long, value_enum)]
        streak_reminders: Option<Toggle>,
        /// Announce level ups
        #[arg(long, value_enum)]
        level_up_alerts: Option<Toggle>,
    },
    /// Export a weekly summary to stdout
    Export {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BookCommands {
    /// Add a book to your shelf
    Add {
        /// Book title
        title: String,
        /// Author name
        #[arg(long)]
        author: Option<String>,
        /// Total number of pages
        #[arg(long)]
        pages: Option<u32>,
    },
    /// List books
    List,
    /// Mark a book as finished
    Finish {
        /// Book id
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Show the most recent sessions
    List {
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Delete a session and take back its points
    Delete {
        /// Session id
        id: i64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}
