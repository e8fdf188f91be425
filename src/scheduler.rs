//! Rolling generation of series windows and puzzle answers.
//!
//! Every tick walks each league forward from its newest series and newest
//! answer until `lookahead_days` past `now`. Rows are keyed on their natural
//! columns, so running a tick twice creates nothing the second time.

use crate::app::App;
use crate::error::{RejectReason, StoreError, WwmError};
use crate::model::{Answer, League, LeagueSeries, NewAnswer, NewSeries};
use crate::store::{AnswerFilter, LeagueFilter, SeriesFilter, Store};
use crate::{debug_log, info_log};
use chrono::{DateTime, Duration, Timelike, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::thread;

/// Outcome of trying to fill one answer slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSlot {
    Created(Answer),
    Existing(Answer),
    /// No series covers the slot yet.
    NoSeries,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeagueFailure {
    pub league_slug: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub leagues: usize,
    pub series_created: usize,
    pub answers_created: usize,
    pub failures: Vec<LeagueFailure>,
}

/// Rounds to the nearest whole hour.
pub fn rounded_now(now: DateTime<Utc>) -> DateTime<Utc> {
    let hour = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    if now.minute() >= 30 {
        hour + Duration::hours(1)
    } else {
        hour
    }
}

fn check_cadence(league: &League) -> Result<(), WwmError> {
    if !league.has_valid_cadence() {
        return Err(RejectReason::InvalidLeagueConfig.into());
    }
    Ok(())
}

/// `at + step`, or `InvalidLeagueConfig` when it leaves chrono's range.
fn advance(at: DateTime<Utc>, step: Duration) -> Result<DateTime<Utc>, WwmError> {
    at.checked_add_signed(step)
        .ok_or_else(|| RejectReason::InvalidLeagueConfig.into())
}

fn lookahead_cutoff<S>(app: &App<S>, now: DateTime<Utc>) -> Result<DateTime<Utc>, WwmError> {
    advance(now, Duration::days(i64::from(app.settings.lookahead_days)))
}

/// Appends contiguous series until one starts past the lookahead cutoff.
pub fn generate_series<S: Store>(
    app: &App<S>,
    league: &League,
    now: DateTime<Utc>,
) -> Result<Vec<LeagueSeries>, WwmError> {
    check_cadence(league)?;
    let last = app.store.league_series(&SeriesFilter {
        league_id: Some(league.league_id),
        newest_first: true,
        limit: Some(1),
        ..SeriesFilter::default()
    })?;

    let mut start = last.first().map_or(league.start_date, |s| s.end_date);
    let cutoff = lookahead_cutoff(app, now)?;
    let mut created = Vec::new();
    while start < cutoff {
        let end = advance(start, league.series_length())?;
        if let Some(series) = app.store.insert_series(NewSeries {
            league_id: league.league_id,
            create_date: now,
            start_date: start,
            end_date: end,
        })? {
            log::info!("Add league series {} {} - {}", league.league_slug, start, end);
            created.push(series);
        }
        start = end;
    }
    Ok(created)
}

/// Fills answer slots every `answer_interval_minutes` up to the lookahead
/// cutoff, starting one interval after the newest existing answer.
pub fn generate_answers<S: Store>(
    app: &App<S>,
    league: &League,
    now: DateTime<Utc>,
) -> Result<Vec<AnswerSlot>, WwmError> {
    check_cadence(league)?;
    let last = app.store.answers(&AnswerFilter {
        league_id: Some(league.league_id),
        newest_first: true,
        limit: Some(1),
        ..AnswerFilter::default()
    })?;

    let mut start = match last.first() {
        Some(a) => advance(a.active_after, league.answer_interval())?,
        None => league.start_date,
    };
    let cutoff = lookahead_cutoff(app, now)?;
    let mut slots = Vec::new();
    while start < cutoff {
        slots.push(generate_answer(app, league, start, now)?);
        start = advance(start, league.answer_interval())?;
    }
    Ok(slots)
}

/// Creates the answer active from `active_after`, unless the slot is already
/// filled or no series covers it.
pub fn generate_answer<S: Store>(
    app: &App<S>,
    league: &League,
    active_after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<AnswerSlot, WwmError> {
    let active_before = advance(active_after, league.time_to_live())?;
    let series = app.store.league_series(&SeriesFilter {
        league_id: Some(league.league_id),
        start_before: Some(active_after),
        newest_first: true,
        limit: Some(1),
        ..SeriesFilter::default()
    })?;
    let Some(series) = series.into_iter().find(|s| s.contains(active_after)) else {
        debug_log!("No series for {} at {}, skipping answer", league.league_slug, active_after);
        return Ok(AnswerSlot::NoSeries);
    };

    if let Some(existing) = app.store.answer(&AnswerFilter {
        league_id: Some(league.league_id),
        active_after: Some(active_after),
        limit: Some(1),
        ..AnswerFilter::default()
    })? {
        return Ok(AnswerSlot::Existing(existing));
    }

    let lookback = Duration::days(i64::from(app.settings.answer_lookback_days));
    let recent: HashSet<String> = app
        .store
        .answers(&AnswerFilter {
            league_id: Some(league.league_id),
            active_since: active_after.checked_sub_signed(lookback),
            active_until: Some(active_after),
            ..AnswerFilter::default()
        })?
        .into_iter()
        .map(|a| a.answer)
        .collect();

    let word = app
        .words
        .pick_random_word(
            league.letters,
            &league.source_word_list,
            &recent,
            app.settings.random_word_attempts,
        )?
        .to_lowercase();
    if recent.contains(&word) {
        log::warn!(
            "Reusing recent answer {word} for {} at {active_after}",
            league.league_slug
        );
    }

    let answer = app.store.insert_answer(NewAnswer {
        series_id: series.series_id,
        league_id: league.league_id,
        answer: word,
        create_date: now,
        active_after,
        active_before,
    })?;
    info_log!("Adding answer {} {} - {}", league.league_slug, active_after, active_before);
    Ok(AnswerSlot::Created(answer))
}

/// Series then answers for one league; returns how many of each were created.
pub fn generate_league<S: Store>(
    app: &App<S>,
    league: &League,
    now: DateTime<Utc>,
) -> Result<(usize, usize), WwmError> {
    let series = generate_series(app, league, now)?;
    let slots = generate_answers(app, league, now)?;
    let answers = slots
        .iter()
        .filter(|slot| matches!(slot, AnswerSlot::Created(_)))
        .count();
    Ok((series.len(), answers))
}

/// One scheduler pass over every league. A failing league is logged and
/// reported without stopping the others.
pub fn run_tick<S: Store>(app: &App<S>, now: DateTime<Utc>) -> Result<TickReport, StoreError> {
    let leagues = app.store.leagues(&LeagueFilter::default())?;
    log::info!("Scheduler tick at {now} over {} leagues", leagues.len());

    let outcomes: Vec<(&League, Result<(usize, usize), WwmError>)> = if app.settings.parallel_leagues
    {
        leagues
            .par_iter()
            .map(|league| (league, generate_league(app, league, now)))
            .collect()
    } else {
        leagues
            .iter()
            .map(|league| (league, generate_league(app, league, now)))
            .collect()
    };

    let mut report = TickReport {
        leagues: leagues.len(),
        ..TickReport::default()
    };
    for (league, outcome) in outcomes {
        match outcome {
            Ok((series, answers)) => {
                report.series_created += series;
                report.answers_created += answers;
            }
            Err(e) => {
                log::error!("Generation failed for league {}: {e}", league.league_slug);
                report.failures.push(LeagueFailure {
                    league_slug: league.league_slug.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    log::info!(
        "Scheduler tick done: {} series, {} answers, {} failures",
        report.series_created,
        report.answers_created,
        report.failures.len()
    );
    Ok(report)
}

/// Runs a tick every `tick_interval_minutes`, handing each report to
/// `after_tick` (used to persist the store). Never returns.
pub fn run_forever<S, F>(app: &App<S>, mut after_tick: F) -> !
where
    S: Store,
    F: FnMut(&TickReport),
{
    let interval = std::time::Duration::from_secs(u64::from(app.settings.tick_interval_minutes) * 60);
    loop {
        match run_tick(app, rounded_now(Utc::now())) {
            Ok(report) => after_tick(&report),
            Err(e) => log::error!("Scheduler tick failed: {e}"),
        }
        thread::sleep(interval);
    }
}
