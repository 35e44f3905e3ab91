//! Tiered leveling.
//!
//! A tier is reached only when all four tracked stats meet its thresholds.
//! Progress toward the next tier is reported separately from eligibility:
//! averaging can hide a lagging dimension, so a high percentage does not
//! imply `can_upgrade`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::UserProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LevelTier {
    Iniciante,
    Explorador,
    Aventureiro,
    Mestre,
    Lenda,
    #[serde(rename = "Grande Mestre")]
    GrandeMestre,
    Imortal,
}

impl LevelTier {
    /// Every tier, lowest first
    pub const ALL: [LevelTier; 7] = [
        LevelTier::Iniciante,
        LevelTier::Explorador,
        LevelTier::Aventureiro,
        LevelTier::Mestre,
        LevelTier::Lenda,
        LevelTier::GrandeMestre,
        LevelTier::Imortal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LevelTier::Iniciante => "Iniciante",
            LevelTier::Explorador => "Explorador",
            LevelTier::Aventureiro => "Aventureiro",
            LevelTier::Mestre => "Mestre",
            LevelTier::Lenda => "Lenda",
            LevelTier::GrandeMestre => "Grande Mestre",
            LevelTier::Imortal => "Imortal",
        }
    }

    pub fn requirements(&self) -> Requirements {
        let (points, books, streak, pages) = match self {
            LevelTier::Iniciante => (0, 0, 0, 0),
            LevelTier::Explorador => (100, 1, 3, 100),
            LevelTier::Aventureiro => (300, 3, 7, 500),
            LevelTier::Mestre => (750, 7, 15, 1500),
            LevelTier::Lenda => (1500, 15, 30, 3000),
            LevelTier::GrandeMestre => (3000, 25, 50, 6000),
            LevelTier::Imortal => (5000, 50, 100, 12000),
        };
        Requirements {
            points,
            books,
            streak,
            pages,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    pub fn next(&self) -> Option<LevelTier> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(&self) -> Option<LevelTier> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn is_max(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for LevelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for LevelTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', '-'], " ");
        LevelTier::ALL
            .into_iter()
            .find(|t| t.label().to_lowercase() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown level: {}", s))
    }
}

/// Threshold set for a tier. All four must be met or exceeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub points: u32,
    pub books: u32,
    pub streak: u32,
    pub pages: u32,
}

impl Requirements {
    pub fn met_by(&self, progress: &UserProgress) -> bool {
        progress.points >= self.points
            && progress.books_completed >= self.books
            && progress.longest_streak >= self.streak
            && progress.total_pages_read >= self.pages
    }

    /// What is still missing in each dimension (zero where already met)
    pub fn shortfall(&self, progress: &UserProgress) -> Requirements {
        Requirements {
            points: self.points.saturating_sub(progress.points),
            books: self.books.saturating_sub(progress.books_completed),
            streak: self.streak.saturating_sub(progress.longest_streak),
            pages: self.pages.saturating_sub(progress.total_pages_read),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelInfo {
    pub current_level: LevelTier,
    pub next_level: LevelTier,
    pub can_upgrade: bool,
    pub progress: u8,
    pub requirements: Requirements,
    pub next_requirements: Option<Requirements>,
    pub is_max_level: bool,
}

/// Highest tier whose every threshold is met
pub fn determine_current_level(progress: &UserProgress) -> LevelTier {
    LevelTier::ALL
        .into_iter()
        .rev()
        .find(|tier| tier.requirements().met_by(progress))
        .unwrap_or(LevelTier::Iniciante)
}

/// Tier after `current`, or `current` itself at the top
pub fn next_level(current: LevelTier) -> LevelTier {
    current.next().unwrap_or(current)
}

pub fn can_level_up(progress: &UserProgress, current: LevelTier) -> bool {
    current
        .next()
        .is_some_and(|next| next.requirements().met_by(progress))
}

fn dimension_ratio(value: u32, floor: u32, ceiling: u32) -> f64 {
    if ceiling <= floor {
        return 1.0;
    }
    ((value as f64 - floor as f64) / (ceiling - floor) as f64).clamp(0.0, 1.0)
}

/// Percentage (0-100) toward the tier after `current`.
///
/// The floor is the tier below `current` (or `current` itself at the bottom).
/// Each dimension is clamped to [0, 1] before the four are averaged.
pub fn calculate_progress(progress: &UserProgress, current: LevelTier) -> u8 {
    let Some(next) = current.next() else {
        return 100;
    };
    let floor = current.previous().unwrap_or(current).requirements();
    let ceiling = next.requirements();

    let ratios = [
        dimension_ratio(progress.points, floor.points, ceiling.points),
        dimension_ratio(progress.books_completed, floor.books, ceiling.books),
        dimension_ratio(progress.longest_streak, floor.streak, ceiling.streak),
        dimension_ratio(progress.total_pages_read, floor.pages, ceiling.pages),
    ];
    let average = ratios.iter().sum::<f64>() / ratios.len() as f64;
    (average * 100.0).round() as u8
}

pub fn level_info(progress: &UserProgress) -> LevelInfo {
    let current = determine_current_level(progress);
    let is_max_level = current.is_max();
    LevelInfo {
        current_level: current,
        next_level: next_level(current),
        can_upgrade: can_level_up(progress, current),
        progress: calculate_progress(progress, current),
        requirements: current.requirements(),
        next_requirements: current.next().map(|t| t.requirements()),
        is_max_level,
    }
}
