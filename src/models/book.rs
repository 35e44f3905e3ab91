use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Reading,
    Finished,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Reading => "reading",
            BookStatus::Finished => "finished",
        }
    }
}

impl FromStr for BookStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reading" => Ok(BookStatus::Reading),
            "finished" => Ok(BookStatus::Finished),
            _ => Err(anyhow::anyhow!("Unknown book status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: Option<u32>,
    pub status: BookStatus,
    pub finished_at: Option<String>,
    /// Sum of pages over this book's sessions, filled in by the repo
    pub pages_read: u32,
}

impl Book {
    /// Fraction of the book read, if the page count is known
    pub fn completion_ratio(&self) -> Option<f64> {
        match self.total_pages {
            Some(total) if total > 0 => Some((self.pages_read as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}
