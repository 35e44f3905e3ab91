use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingSession {
    pub id: i64,
    pub book_id: Option<i64>,
    /// RFC 3339 timestamp, as recorded
    pub session_date: String,
    pub pages_read: u32,
    pub minutes: Option<u32>,
    pub note: Option<String>,
    /// Exactly what was credited, so deleting the session can take it back
    pub points_awarded: u32,
}
