//! Records shared by the store, the scheduler and the play flow.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub type LeagueId = u64;
pub type SeriesId = u64;
pub type AnswerId = u64;
pub type GuessId = u64;
pub type UserId = u64;

/// Cadence bounds: one leap year in each unit.
pub const MAX_SERIES_DAYS: u32 = 366;
pub const MAX_ANSWER_INTERVAL_MINUTES: u32 = 366 * 24 * 60;
pub const MAX_TIME_TO_LIVE_HOURS: u32 = 366 * 24;

/// True when every cadence field is positive and within its bound.
pub fn cadence_in_bounds(
    series_days: u32,
    answer_interval_minutes: u32,
    time_to_live_hours: u32,
) -> bool {
    (1..=MAX_SERIES_DAYS).contains(&series_days)
        && (1..=MAX_ANSWER_INTERVAL_MINUTES).contains(&answer_interval_minutes)
        && (1..=MAX_TIME_TO_LIVE_HOURS).contains(&time_to_live_hours)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub league_id: LeagueId,
    pub league_slug: String,
    pub league_name: String,
    pub letters: usize,
    pub max_guesses: u32,
    pub series_days: u32,
    pub answer_interval_minutes: u32,
    pub time_to_live_hours: u32,
    pub is_hard_mode: bool,
    pub is_private: bool,
    pub invite_code: Option<String>,
    pub accept_word_list: String,
    pub source_word_list: String,
    pub create_user_id: UserId,
    pub create_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
}

impl League {
    pub fn has_valid_cadence(&self) -> bool {
        cadence_in_bounds(self.series_days, self.answer_interval_minutes, self.time_to_live_hours)
    }

    pub fn series_length(&self) -> Duration {
        Duration::days(i64::from(self.series_days))
    }

    pub fn answer_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.answer_interval_minutes))
    }

    pub fn time_to_live(&self) -> Duration {
        Duration::hours(i64::from(self.time_to_live_hours))
    }
}

/// League fields supplied at creation; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLeague {
    pub league_slug: String,
    pub league_name: String,
    pub letters: usize,
    pub max_guesses: u32,
    pub series_days: u32,
    pub answer_interval_minutes: u32,
    pub time_to_live_hours: u32,
    pub is_hard_mode: bool,
    pub is_private: bool,
    pub invite_code: Option<String>,
    pub accept_word_list: String,
    pub source_word_list: String,
    pub create_user_id: UserId,
    pub create_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueMember {
    pub league_id: LeagueId,
    pub user_id: UserId,
    pub active: bool,
    pub add_date: DateTime<Utc>,
    pub rejoin_date: DateTime<Utc>,
    pub leave_date: Option<DateTime<Utc>>,
}

/// A scoring window `[start_date, end_date)` within a league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueSeries {
    pub series_id: SeriesId,
    pub league_id: LeagueId,
    pub create_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl LeagueSeries {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at < self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSeries {
    pub league_id: LeagueId,
    pub create_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// One puzzle. `league_id` is carried alongside the series so league-wide
/// lookups do not need to go through the series table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer_id: AnswerId,
    pub series_id: SeriesId,
    pub league_id: LeagueId,
    pub answer: String,
    pub create_date: DateTime<Utc>,
    pub active_after: DateTime<Utc>,
    pub active_before: DateTime<Utc>,
}

impl Answer {
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.active_after <= at && at <= self.active_before
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnswer {
    pub series_id: SeriesId,
    pub league_id: LeagueId,
    pub answer: String,
    pub create_date: DateTime<Utc>,
    pub active_after: DateTime<Utc>,
    pub active_before: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guess {
    pub guess_id: GuessId,
    pub user_id: UserId,
    pub answer_id: AnswerId,
    pub guess: String,
    pub correct_placement: usize,
    pub correct_letters: usize,
    pub correct: bool,
    pub create_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGuess {
    pub user_id: UserId,
    pub answer_id: AnswerId,
    pub guess: String,
    pub correct_placement: usize,
    pub correct_letters: usize,
    pub correct: bool,
    pub create_date: DateTime<Utc>,
}

/// Per user, per answer aggregate over [`Guess`] rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub user_id: UserId,
    pub answer_id: AnswerId,
    pub num_guesses: usize,
    pub correct_placement: usize,
    pub correct_letters: usize,
    pub correct: bool,
    pub completed: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Status {
    /// Status after a player's first guess.
    pub fn opened(first: &Guess, max_guesses: u32) -> Self {
        Self {
            user_id: first.user_id,
            answer_id: first.answer_id,
            num_guesses: 0,
            correct_placement: 0,
            correct_letters: 0,
            correct: false,
            completed: false,
            start_date: first.create_date,
            end_date: first.create_date,
        }
        .record(first, max_guesses)
    }

    /// Folds one more guess into the aggregate.
    pub fn record(mut self, guess: &Guess, max_guesses: u32) -> Self {
        self.num_guesses += 1;
        self.correct_placement = guess.correct_placement;
        self.correct_letters = guess.correct_letters;
        self.correct |= guess.correct;
        self.completed = self.correct || self.num_guesses >= max_guesses as usize;
        self.end_date = guess.create_date;
        self
    }

    /// Rebuilds the status from a player's guesses in submission order.
    /// Returns `None` when there are no guesses yet.
    pub fn from_guesses(guesses: &[Guess], max_guesses: u32) -> Option<Self> {
        let (first, rest) = guesses.split_first()?;
        Some(
            rest.iter()
                .fold(Self::opened(first, max_guesses), |status, g| status.record(g, max_guesses)),
        )
    }
}

/// Leaderboard row for one player within one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub user_id: UserId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub raw_score: u32,
    pub score: Option<f64>,
    pub avg_guesses: Option<f64>,
    pub avg_guesses_correct: Option<f64>,
    pub max_guesses: usize,
    pub min_guesses_correct: Option<usize>,
    pub done: usize,
    pub wins: usize,
    pub win_pct: Option<f64>,
    pub win_pct_possible: Option<f64>,
    pub possible: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 3, 12, minute, 0).unwrap()
    }

    fn guess(word: &str, correct: bool, minute: u32) -> Guess {
        Guess {
            guess_id: u64::from(minute),
            user_id: 7,
            answer_id: 3,
            guess: word.to_string(),
            correct_placement: if correct { 5 } else { 1 },
            correct_letters: if correct { 5 } else { 2 },
            correct,
            create_date: at(minute),
        }
    }

    #[test]
    fn test_status_from_no_guesses() {
        assert!(Status::from_guesses(&[], 6).is_none());
    }

    #[test]
    fn test_status_tracks_latest_guess() {
        let guesses = vec![guess("basse", false, 1), guess("masse", true, 4)];
        let status = Status::from_guesses(&guesses, 6).unwrap();
        assert_eq!(status.num_guesses, 2);
        assert!(status.correct);
        assert!(status.completed);
        assert_eq!(status.correct_placement, 5);
        assert_eq!(status.start_date, at(1));
        assert_eq!(status.end_date, at(4));
    }

    #[test]
    fn test_status_completed_when_guesses_exhausted() {
        let guesses = vec![guess("basse", false, 1), guess("lasse", false, 2)];
        let status = Status::from_guesses(&guesses, 2).unwrap();
        assert!(!status.correct);
        assert!(status.completed);
    }

    #[test]
    fn test_series_window_is_half_open() {
        let series = LeagueSeries {
            series_id: 1,
            league_id: 1,
            create_date: at(0),
            start_date: at(10),
            end_date: at(20),
        };
        assert!(series.contains(at(10)));
        assert!(series.contains(at(19)));
        assert!(!series.contains(at(20)));
        assert!(!series.contains(at(9)));
    }

    #[test]
    fn test_cadence_bounds() {
        assert!(cadence_in_bounds(7, 1440, 24));
        assert!(cadence_in_bounds(MAX_SERIES_DAYS, MAX_ANSWER_INTERVAL_MINUTES, MAX_TIME_TO_LIVE_HOURS));
        assert!(!cadence_in_bounds(0, 1440, 24));
        assert!(!cadence_in_bounds(7, 1440, 0));
        assert!(!cadence_in_bounds(u32::MAX, 1440, 24));
        assert!(!cadence_in_bounds(7, MAX_ANSWER_INTERVAL_MINUTES + 1, 24));
        assert!(!cadence_in_bounds(7, 1440, u32::MAX));
    }
}
