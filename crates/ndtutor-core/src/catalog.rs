//! Views over the exercise list: sorting by popularity, difficulty buckets,
//! favorites and unfinished exercises.

use crate::models::{Exercise, ExerciseId};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    #[default]
    All,
    Likes,
    Difficulty,
    Favorites,
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown list mode `{0}` (expected all, likes, difficulty, favorites or incomplete)")]
pub struct UnknownListMode(pub String);

impl FromStr for ListMode {
    type Err = UnknownListMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "default" => Ok(ListMode::All),
            "likes" => Ok(ListMode::Likes),
            "difficulty" => Ok(ListMode::Difficulty),
            "favorites" | "favourites" => Ok(ListMode::Favorites),
            "incomplete" => Ok(ListMode::Incomplete),
            _ => Err(UnknownListMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DifficultyBucket {
    Easy,
    Intermediate,
    Hard,
    Insane,
}

impl DifficultyBucket {
    pub const ALL: [DifficultyBucket; 4] = [
        DifficultyBucket::Easy,
        DifficultyBucket::Intermediate,
        DifficultyBucket::Hard,
        DifficultyBucket::Insane,
    ];

    pub fn of(difficulty: f64) -> Self {
        if difficulty <= 4.0 {
            DifficultyBucket::Easy
        } else if difficulty <= 7.0 {
            DifficultyBucket::Intermediate
        } else if difficulty <= 9.0 {
            DifficultyBucket::Hard
        } else {
            DifficultyBucket::Insane
        }
    }
}

impl fmt::Display for DifficultyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DifficultyBucket::Easy => "Easy",
            DifficultyBucket::Intermediate => "Intermediate",
            DifficultyBucket::Hard => "Hard",
            DifficultyBucket::Insane => "Insane",
        };
        f.write_str(label)
    }
}

/// Higher like ratio first; exercises nobody voted on go last.
pub fn by_like_ratio(a: &Exercise, b: &Exercise) -> Ordering {
    match (a.like_ratio(), b.like_ratio()) {
        (Some(ra), Some(rb)) => rb.partial_cmp(&ra).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sorted_by_likes(exercises: &[Exercise]) -> Vec<&Exercise> {
    let mut out: Vec<&Exercise> = exercises.iter().collect();
    out.sort_by(|a, b| by_like_ratio(a, b));
    out
}

/// Exercises grouped by difficulty, each group sorted by like ratio. Empty
/// groups are kept so every bucket can be shown.
pub fn by_difficulty(exercises: &[Exercise]) -> Vec<(DifficultyBucket, Vec<&Exercise>)> {
    DifficultyBucket::ALL
        .into_iter()
        .map(|bucket| {
            let mut group: Vec<&Exercise> = exercises
                .iter()
                .filter(|e| DifficultyBucket::of(e.difficulty) == bucket)
                .collect();
            group.sort_by(|a, b| by_like_ratio(a, b));
            (bucket, group)
        })
        .collect()
}

pub fn favorites<'a>(exercises: &'a [Exercise], favorite_ids: &[ExerciseId]) -> Vec<&'a Exercise> {
    let wanted: HashSet<&ExerciseId> = favorite_ids.iter().collect();
    exercises.iter().filter(|e| wanted.contains(&e.id)).collect()
}

pub fn incomplete<'a>(exercises: &'a [Exercise], completed_ids: &[ExerciseId]) -> Vec<&'a Exercise> {
    let done: HashSet<&ExerciseId> = completed_ids.iter().collect();
    exercises.iter().filter(|e| !done.contains(&e.id)).collect()
}
