pub mod preferences;
pub mod progress;

pub use preferences::{NotificationPreferences, PreferenceStore, SqlitePreferenceStore};
pub use progress::{NewSession, ProgressTracker, ProgressUpdate};
