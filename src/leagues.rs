use crate::app::App;
use crate::error::{RejectReason, Result, WwmError};
use crate::model::{
    League, LeagueSeries, NewLeague, SeriesId, SeriesStats, Status, UserId, cadence_in_bounds,
};
use crate::store::{AnswerFilter, LeagueFilter, MemberFilter, SeriesFilter, StatusFilter, Store};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

const MIN_LEAGUE_NAME_LEN: usize = 5;

/// Settings a player picks when creating a league.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewLeagueRequest {
    pub league_name: String,
    pub letters: usize,
    pub max_guesses: u32,
    pub series_days: u32,
    pub answer_interval_minutes: u32,
    pub time_to_live_hours: u32,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_hard_mode: bool,
}

/// A league as listed to one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeagueView {
    pub league_slug: String,
    pub league_name: String,
    pub letters: usize,
    pub max_guesses: u32,
    pub series_days: u32,
    pub create_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub time_to_live_hours: u32,
    pub is_hard_mode: bool,
    pub is_private: bool,
    pub is_member: bool,
    pub is_creator: bool,
}

/// Lowercases and joins alphanumeric runs with `-`.
pub fn name_to_slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Midnight UTC of the most recent Sunday at or before `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_back = i64::from(now.weekday().num_days_from_sunday());
    let day = now.date_naive() - Duration::days(days_back);
    day.and_time(NaiveTime::MIN).and_utc()
}

fn invite_code<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Validates a proposed league name and returns its slug.
pub fn check_league_name<S: Store>(app: &App<S>, league_name: &str) -> Result<String> {
    if league_name.trim().len() < MIN_LEAGUE_NAME_LEN {
        return Err(RejectReason::LeagueNameTooShort.into());
    }
    let slug = name_to_slug(league_name);
    if slug.is_empty() {
        return Err(RejectReason::LeagueNameTooShort.into());
    }
    if app.store.league(&LeagueFilter::by_slug(&slug))?.is_some() {
        return Err(RejectReason::LeagueNameExists.into());
    }
    Ok(slug)
}

pub fn add_league<S: Store>(
    app: &App<S>,
    creator: UserId,
    request: NewLeagueRequest,
    now: DateTime<Utc>,
) -> Result<League> {
    let slug = check_league_name(app, &request.league_name)?;
    let cadence_ok = cadence_in_bounds(
        request.series_days,
        request.answer_interval_minutes,
        request.time_to_live_hours,
    );
    if request.letters == 0 || request.max_guesses == 0 || !cadence_ok {
        return Err(RejectReason::InvalidLeagueConfig.into());
    }

    let league = app.store.insert_league(NewLeague {
        league_slug: slug,
        league_name: request.league_name.trim().to_string(),
        letters: request.letters,
        max_guesses: request.max_guesses,
        series_days: request.series_days,
        answer_interval_minutes: request.answer_interval_minutes,
        time_to_live_hours: request.time_to_live_hours,
        is_hard_mode: request.is_hard_mode,
        is_private: request.is_private,
        invite_code: request
            .is_private
            .then(|| invite_code(&mut rand::thread_rng())),
        accept_word_list: app.settings.default_accept_list.clone(),
        source_word_list: app.settings.default_source_list.clone(),
        create_user_id: creator,
        create_date: now,
        start_date: week_start(now),
    })?;
    app.store.upsert_member(league.league_id, creator, now)?;
    log::info!("League {} created by user {creator}", league.league_slug);
    Ok(league)
}

fn is_member<S: Store>(app: &App<S>, league: &League, user: UserId) -> Result<bool> {
    if league.create_user_id == user {
        return Ok(true);
    }
    let members = app.store.members(&MemberFilter {
        league_id: Some(league.league_id),
        user_id: Some(user),
        active: Some(true),
    })?;
    Ok(!members.is_empty())
}

/// Resolves `slug` for `viewer`. A league the viewer may not see reports
/// [`WwmError::NotInLeague`]; an unknown slug reports not found.
pub fn check_league<S: Store>(
    app: &App<S>,
    slug: &str,
    viewer: UserId,
    members_only: bool,
) -> Result<League> {
    if slug.is_empty() {
        return Err(RejectReason::MissingSlug.into());
    }
    let league = app
        .store
        .league(&LeagueFilter::by_slug(slug))?
        .ok_or_else(|| WwmError::not_found("League"))?;

    let visible = (!members_only && !league.is_private) || is_member(app, &league, viewer)?;
    if visible {
        Ok(league)
    } else {
        Err(WwmError::NotInLeague)
    }
}

pub fn join_league<S: Store>(
    app: &App<S>,
    user: UserId,
    slug: &str,
    invite: Option<&str>,
    now: DateTime<Utc>,
) -> Result<League> {
    let league = app
        .store
        .league(&LeagueFilter::by_slug(slug))?
        .ok_or_else(|| WwmError::not_found("League"))?;
    // A wrong invite code looks the same as a missing league.
    if league.is_private && invite != league.invite_code.as_deref() {
        return Err(WwmError::not_found("League"));
    }
    app.store.upsert_member(league.league_id, user, now)?;
    log::info!("User {user} joined {}", league.league_slug);
    Ok(league)
}

pub fn leave_league<S: Store>(
    app: &App<S>,
    user: UserId,
    slug: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let league = check_league(app, slug, user, true)?;
    if league.create_user_id == user {
        return Err(RejectReason::OwnerCannotLeave.into());
    }
    app.store.deactivate_member(league.league_id, user, now)?;
    log::info!("User {user} left {}", league.league_slug);
    Ok(())
}

pub fn list_leagues<S: Store>(app: &App<S>, viewer: UserId) -> Result<Vec<LeagueView>> {
    let mut views = Vec::new();
    for league in app.store.leagues(&LeagueFilter::default())? {
        let member = is_member(app, &league, viewer)?;
        if league.is_private && !member {
            continue;
        }
        views.push(LeagueView {
            is_creator: league.create_user_id == viewer,
            is_member: member,
            league_slug: league.league_slug,
            league_name: league.league_name,
            letters: league.letters,
            max_guesses: league.max_guesses,
            series_days: league.series_days,
            create_date: league.create_date,
            start_date: league.start_date,
            time_to_live_hours: league.time_to_live_hours,
            is_hard_mode: league.is_hard_mode,
            is_private: league.is_private,
        });
    }
    views.sort_by(|a, b| a.league_name.cmp(&b.league_name));
    Ok(views)
}

/// Series that have already started, newest first.
pub fn league_series<S: Store>(
    app: &App<S>,
    slug: &str,
    viewer: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<LeagueSeries>> {
    let league = check_league(app, slug, viewer, false)?;
    Ok(app.store.league_series(&SeriesFilter {
        league_id: Some(league.league_id),
        start_before: Some(now),
        newest_first: true,
        ..SeriesFilter::default()
    })?)
}

fn ratio(numerator: f64, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator / denominator as f64)
}

fn mean(values: &[usize]) -> Option<f64> {
    ratio(values.iter().sum::<usize>() as f64, values.len())
}

fn player_stats(
    user_id: UserId,
    series: &LeagueSeries,
    statuses: &[Status],
    max_guesses: u32,
    possible: usize,
) -> SeriesStats {
    let done = statuses.iter().filter(|s| s.completed).count();
    let correct: Vec<usize> = statuses
        .iter()
        .filter(|s| s.correct)
        .map(|s| s.num_guesses)
        .collect();
    let wins = correct.len();
    let raw_score: u32 = correct
        .iter()
        .map(|&n| (1 + max_guesses).saturating_sub(n as u32))
        .sum();
    let all: Vec<usize> = statuses.iter().map(|s| s.num_guesses).collect();

    SeriesStats {
        user_id,
        start_date: series.start_date,
        end_date: series.end_date,
        raw_score,
        score: ratio(f64::from(raw_score), possible),
        avg_guesses: mean(&all),
        avg_guesses_correct: mean(&correct),
        max_guesses: all.iter().copied().max().unwrap_or(0),
        min_guesses_correct: correct.iter().copied().min(),
        done,
        wins,
        win_pct: ratio(wins as f64, done),
        win_pct_possible: ratio(wins as f64, possible),
        possible,
    }
}

/// Leaderboard for one series: every member with at least one completed
/// puzzle, best score first.
pub fn series_stats<S: Store>(
    app: &App<S>,
    slug: &str,
    series_id: SeriesId,
    viewer: UserId,
    now: DateTime<Utc>,
) -> Result<Vec<SeriesStats>> {
    let league = check_league(app, slug, viewer, false)?;
    let series = app
        .store
        .league_series(&SeriesFilter {
            league_id: Some(league.league_id),
            series_id: Some(series_id),
            ..SeriesFilter::default()
        })?
        .into_iter()
        .next()
        .ok_or_else(|| WwmError::not_found("Series"))?;

    let answers = app.store.answers(&AnswerFilter {
        league_id: Some(league.league_id),
        series_id: Some(series.series_id),
        ..AnswerFilter::default()
    })?;
    let possible = answers.iter().filter(|a| a.active_after < now).count();

    let mut members: HashSet<UserId> = app
        .store
        .members(&MemberFilter {
            league_id: Some(league.league_id),
            ..MemberFilter::default()
        })?
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    members.insert(league.create_user_id);

    let mut by_user: BTreeMap<UserId, Vec<Status>> = BTreeMap::new();
    for answer in &answers {
        for status in app.store.statuses(&StatusFilter {
            answer_id: Some(answer.answer_id),
            ..StatusFilter::default()
        })? {
            if members.contains(&status.user_id) {
                by_user.entry(status.user_id).or_default().push(status);
            }
        }
    }

    let mut stats: Vec<SeriesStats> = by_user
        .into_iter()
        .map(|(user, statuses)| player_stats(user, &series, &statuses, league.max_guesses, possible))
        .filter(|s| s.done > 0)
        .collect();
    stats.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.raw_score.cmp(&a.raw_score))
    });
    Ok(stats)
}
