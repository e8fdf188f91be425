//! Storage seam for leagues, series, answers, guesses and statuses.
//!
//! Queries take typed filter structs. Every `Some` field adds one fixed
//! comparison and `None` fields are ignored.

use crate::error::{RejectReason, StoreError};
use crate::model::{
    Answer, AnswerId, Guess, League, LeagueId, LeagueMember, LeagueSeries, NewAnswer, NewGuess,
    NewLeague, NewSeries, SeriesId, Status, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct LeagueFilter {
    pub league_id: Option<LeagueId>,
    pub league_slug: Option<String>,
}

impl LeagueFilter {
    pub fn by_slug(slug: &str) -> Self {
        Self {
            league_slug: Some(slug.to_string()),
            ..Self::default()
        }
    }

    fn matches(&self, league: &League) -> bool {
        self.league_id.is_none_or(|id| league.league_id == id)
            && self
                .league_slug
                .as_deref()
                .is_none_or(|slug| league.league_slug == slug)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub league_id: Option<LeagueId>,
    pub user_id: Option<UserId>,
    pub active: Option<bool>,
}

impl MemberFilter {
    fn matches(&self, member: &LeagueMember) -> bool {
        self.league_id.is_none_or(|id| member.league_id == id)
            && self.user_id.is_none_or(|id| member.user_id == id)
            && self.active.is_none_or(|active| member.active == active)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeriesFilter {
    pub league_id: Option<LeagueId>,
    pub series_id: Option<SeriesId>,
    /// `start_date <= value`
    pub start_before: Option<DateTime<Utc>>,
    /// Order by `start_date` descending instead of ascending.
    pub newest_first: bool,
    pub limit: Option<usize>,
}

impl SeriesFilter {
    fn matches(&self, series: &LeagueSeries) -> bool {
        self.league_id.is_none_or(|id| series.league_id == id)
            && self.series_id.is_none_or(|id| series.series_id == id)
            && self.start_before.is_none_or(|t| series.start_date <= t)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnswerFilter {
    pub league_id: Option<LeagueId>,
    pub series_id: Option<SeriesId>,
    pub answer_id: Option<AnswerId>,
    /// `active_after == value`
    pub active_after: Option<DateTime<Utc>>,
    /// `active_after >= value`
    pub active_since: Option<DateTime<Utc>>,
    /// `active_after < value`
    pub active_until: Option<DateTime<Utc>>,
    /// `active_after <= value <= active_before`
    pub active_at: Option<DateTime<Utc>>,
    /// Order by `active_after` descending instead of ascending.
    pub newest_first: bool,
    pub limit: Option<usize>,
}

impl AnswerFilter {
    fn matches(&self, answer: &Answer) -> bool {
        self.league_id.is_none_or(|id| answer.league_id == id)
            && self.series_id.is_none_or(|id| answer.series_id == id)
            && self.answer_id.is_none_or(|id| answer.answer_id == id)
            && self.active_after.is_none_or(|t| answer.active_after == t)
            && self.active_since.is_none_or(|t| answer.active_after >= t)
            && self.active_until.is_none_or(|t| answer.active_after < t)
            && self.active_at.is_none_or(|t| answer.is_active(t))
    }
}

/// Guesses always come back in submission order.
#[derive(Debug, Clone, Default)]
pub struct GuessFilter {
    pub answer_id: Option<AnswerId>,
    pub user_id: Option<UserId>,
}

impl GuessFilter {
    pub fn for_player(user_id: UserId, answer_id: AnswerId) -> Self {
        Self {
            answer_id: Some(answer_id),
            user_id: Some(user_id),
        }
    }

    fn matches(&self, guess: &Guess) -> bool {
        self.answer_id.is_none_or(|id| guess.answer_id == id)
            && self.user_id.is_none_or(|id| guess.user_id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusFilter {
    pub answer_id: Option<AnswerId>,
    pub user_id: Option<UserId>,
    pub completed: Option<bool>,
}

impl StatusFilter {
    fn matches(&self, status: &Status) -> bool {
        self.answer_id.is_none_or(|id| status.answer_id == id)
            && self.user_id.is_none_or(|id| status.user_id == id)
            && self.completed.is_none_or(|completed| status.completed == completed)
    }
}

pub trait Store: Send + Sync {
    fn leagues(&self, filter: &LeagueFilter) -> Result<Vec<League>, StoreError>;
    fn insert_league(&self, league: NewLeague) -> Result<League, StoreError>;

    fn members(&self, filter: &MemberFilter) -> Result<Vec<LeagueMember>, StoreError>;
    /// Adds the member, or reactivates a member who left.
    fn upsert_member(
        &self,
        league_id: LeagueId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<LeagueMember, StoreError>;
    fn deactivate_member(
        &self,
        league_id: LeagueId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn league_series(&self, filter: &SeriesFilter) -> Result<Vec<LeagueSeries>, StoreError>;
    /// Returns `None` when `(league_id, start_date, end_date)` already exists.
    fn insert_series(&self, series: NewSeries) -> Result<Option<LeagueSeries>, StoreError>;

    fn answers(&self, filter: &AnswerFilter) -> Result<Vec<Answer>, StoreError>;
    /// Returns the existing row when the league already has an answer with
    /// the same `active_after`.
    fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, StoreError>;

    fn guesses(&self, filter: &GuessFilter) -> Result<Vec<Guess>, StoreError>;
    fn statuses(&self, filter: &StatusFilter) -> Result<Vec<Status>, StoreError>;

    /// Appends a guess and upserts the player's status as one unit. The
    /// already-correct, repeated-guess and max-guess rules are checked again
    /// under the same lock so concurrent submissions cannot slip past them.
    fn record_guess(&self, guess: NewGuess, max_guesses: u32) -> Result<Status, StoreError>;

    fn league(&self, filter: &LeagueFilter) -> Result<Option<League>, StoreError> {
        Ok(self.leagues(filter)?.into_iter().next())
    }

    fn answer(&self, filter: &AnswerFilter) -> Result<Option<Answer>, StoreError> {
        Ok(self.answers(filter)?.into_iter().next())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    next_id: u64,
    leagues: Vec<League>,
    members: Vec<LeagueMember>,
    series: Vec<LeagueSeries>,
    answers: Vec<Answer>,
    guesses: Vec<Guess>,
    statuses: Vec<Status>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn limited<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

/// In-process store behind a single mutex, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path` if it exists, otherwise starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let tables = if path.exists() {
            let data = fs::read_to_string(path)?;
            serde_json::from_str(&data)?
        } else {
            Tables::default()
        };
        Ok(Self {
            tables: Mutex::new(tables),
            path: Some(path.to_path_buf()),
        })
    }

    /// Writes the snapshot back. No-op for stores without a path.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&*self.tables()?)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    fn leagues(&self, filter: &LeagueFilter) -> Result<Vec<League>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.leagues.iter().filter(|l| filter.matches(l)).cloned().collect())
    }

    fn insert_league(&self, league: NewLeague) -> Result<League, StoreError> {
        let mut tables = self.tables()?;
        let league = League {
            league_id: tables.next_id(),
            league_slug: league.league_slug,
            league_name: league.league_name,
            letters: league.letters,
            max_guesses: league.max_guesses,
            series_days: league.series_days,
            answer_interval_minutes: league.answer_interval_minutes,
            time_to_live_hours: league.time_to_live_hours,
            is_hard_mode: league.is_hard_mode,
            is_private: league.is_private,
            invite_code: league.invite_code,
            accept_word_list: league.accept_word_list,
            source_word_list: league.source_word_list,
            create_user_id: league.create_user_id,
            create_date: league.create_date,
            start_date: league.start_date,
        };
        tables.leagues.push(league.clone());
        Ok(league)
    }

    fn members(&self, filter: &MemberFilter) -> Result<Vec<LeagueMember>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.members.iter().filter(|m| filter.matches(m)).cloned().collect())
    }

    fn upsert_member(
        &self,
        league_id: LeagueId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<LeagueMember, StoreError> {
        let mut tables = self.tables()?;
        if let Some(member) = tables
            .members
            .iter_mut()
            .find(|m| m.league_id == league_id && m.user_id == user_id)
        {
            if !member.active {
                member.rejoin_date = now;
            }
            member.active = true;
            return Ok(member.clone());
        }

        let member = LeagueMember {
            league_id,
            user_id,
            active: true,
            add_date: now,
            rejoin_date: now,
            leave_date: None,
        };
        tables.members.push(member.clone());
        Ok(member)
    }

    fn deactivate_member(
        &self,
        league_id: LeagueId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        for member in tables
            .members
            .iter_mut()
            .filter(|m| m.league_id == league_id && m.user_id == user_id)
        {
            member.active = false;
            member.leave_date = Some(now);
        }
        Ok(())
    }

    fn league_series(&self, filter: &SeriesFilter) -> Result<Vec<LeagueSeries>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<LeagueSeries> =
            tables.series.iter().filter(|s| filter.matches(s)).cloned().collect();
        rows.sort_by_key(|s| s.start_date);
        if filter.newest_first {
            rows.reverse();
        }
        Ok(limited(rows, filter.limit))
    }

    fn insert_series(&self, series: NewSeries) -> Result<Option<LeagueSeries>, StoreError> {
        let mut tables = self.tables()?;
        let exists = tables.series.iter().any(|s| {
            s.league_id == series.league_id
                && s.start_date == series.start_date
                && s.end_date == series.end_date
        });
        if exists {
            return Ok(None);
        }
        let row = LeagueSeries {
            series_id: tables.next_id(),
            league_id: series.league_id,
            create_date: series.create_date,
            start_date: series.start_date,
            end_date: series.end_date,
        };
        tables.series.push(row.clone());
        Ok(Some(row))
    }

    fn answers(&self, filter: &AnswerFilter) -> Result<Vec<Answer>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Answer> =
            tables.answers.iter().filter(|a| filter.matches(a)).cloned().collect();
        rows.sort_by_key(|a| a.active_after);
        if filter.newest_first {
            rows.reverse();
        }
        Ok(limited(rows, filter.limit))
    }

    fn insert_answer(&self, answer: NewAnswer) -> Result<Answer, StoreError> {
        let mut tables = self.tables()?;
        if let Some(existing) = tables
            .answers
            .iter()
            .find(|a| a.league_id == answer.league_id && a.active_after == answer.active_after)
        {
            return Ok(existing.clone());
        }
        let row = Answer {
            answer_id: tables.next_id(),
            series_id: answer.series_id,
            league_id: answer.league_id,
            answer: answer.answer,
            create_date: answer.create_date,
            active_after: answer.active_after,
            active_before: answer.active_before,
        };
        tables.answers.push(row.clone());
        Ok(row)
    }

    fn guesses(&self, filter: &GuessFilter) -> Result<Vec<Guess>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Guess> =
            tables.guesses.iter().filter(|g| filter.matches(g)).cloned().collect();
        rows.sort_by_key(|g| (g.create_date, g.guess_id));
        Ok(rows)
    }

    fn statuses(&self, filter: &StatusFilter) -> Result<Vec<Status>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.statuses.iter().filter(|s| filter.matches(s)).cloned().collect())
    }

    fn record_guess(&self, guess: NewGuess, max_guesses: u32) -> Result<Status, StoreError> {
        let mut tables = self.tables()?;
        let mut prior: Vec<Guess> = tables
            .guesses
            .iter()
            .filter(|g| g.user_id == guess.user_id && g.answer_id == guess.answer_id)
            .cloned()
            .collect();
        prior.sort_by_key(|g| (g.create_date, g.guess_id));
        if prior.iter().any(|g| g.correct) {
            return Err(StoreError::GuessRejected(RejectReason::AlreadyCorrect));
        }
        if prior.iter().any(|g| g.guess == guess.guess) {
            return Err(StoreError::GuessRejected(RejectReason::AlreadyGuessed));
        }
        if prior.len() >= max_guesses as usize {
            return Err(StoreError::GuessRejected(RejectReason::MaxGuessesReached));
        }

        let row = Guess {
            guess_id: tables.next_id(),
            user_id: guess.user_id,
            answer_id: guess.answer_id,
            guess: guess.guess,
            correct_placement: guess.correct_placement,
            correct_letters: guess.correct_letters,
            correct: guess.correct,
            create_date: guess.create_date,
        };
        let status = match Status::from_guesses(&prior, max_guesses) {
            Some(status) => status.record(&row, max_guesses),
            None => Status::opened(&row, max_guesses),
        };
        tables.guesses.push(row);

        match tables
            .statuses
            .iter_mut()
            .find(|s| s.user_id == status.user_id && s.answer_id == status.answer_id)
        {
            Some(existing) => *existing = status.clone(),
            None => tables.statuses.push(status.clone()),
        }
        Ok(status)
    }
}
