use crate::app::App;
use crate::error::{RejectReason, Result, WwmError};
use crate::hard_mode;
use crate::leagues::check_league;
use crate::model::{Answer, AnswerId, Guess, NewGuess, Status, UserId};
use crate::solver::{Pattern, Verdict, evaluate, is_solved, reduce_history, tally};
use crate::store::{AnswerFilter, GuessFilter, SeriesFilter, StatusFilter, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cumulative accept-list count after a guess, or `-1` when not computed.
pub type Reduction = [i64; 2];

const NOT_REDUCED: Reduction = [-1, -1];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuessStep {
    pub guess: String,
    pub result: Vec<Verdict>,
    pub correct: bool,
    pub reduction: Reduction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckGuessResponse {
    pub guesses: Vec<GuessStep>,
    pub correct: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuessesResponse {
    pub user_id: UserId,
    pub guesses: Vec<GuessStep>,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// A puzzle as seen by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PuzzleView {
    pub league_slug: String,
    pub league_name: String,
    pub answer_id: AnswerId,
    pub active_after: DateTime<Utc>,
    pub active_before: DateTime<Utc>,
    pub series_start_date: Option<DateTime<Utc>>,
    pub series_end_date: Option<DateTime<Utc>>,
    pub num_guesses: usize,
    pub correct: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PuzzleWindow {
    #[default]
    All,
    Active,
    Expired,
}

impl PuzzleWindow {
    fn admits(self, answer: &Answer, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Active => answer.is_active(now),
            Self::Expired => now > answer.active_before,
        }
    }
}

fn step(answer: &str, guess: &str, reduction: Reduction) -> GuessStep {
    GuessStep {
        guess: guess.to_string(),
        result: evaluate(answer, guess),
        correct: guess == answer,
        reduction,
    }
}

fn player_status<S: Store>(app: &App<S>, user: UserId, answer_id: AnswerId) -> Result<Option<Status>> {
    Ok(app
        .store
        .statuses(&StatusFilter {
            answer_id: Some(answer_id),
            user_id: Some(user),
            ..StatusFilter::default()
        })?
        .into_iter()
        .next())
}

/// Whose board is being looked at: the requested player, else the viewer.
pub fn viewed_player(viewer: UserId, requested: Option<UserId>) -> UserId {
    requested.unwrap_or(viewer)
}

fn require_completed<S: Store>(app: &App<S>, user: UserId, answer_id: AnswerId) -> Result<()> {
    match player_status(app, user, answer_id)? {
        Some(status) if status.completed => Ok(()),
        _ => Err(RejectReason::NotCompleted.into()),
    }
}

/// Validates and records one guess.
pub fn check_guess<S: Store>(
    app: &App<S>,
    viewer: UserId,
    slug: &str,
    answer_id: AnswerId,
    guess: &str,
    now: DateTime<Utc>,
) -> Result<CheckGuessResponse> {
    let league = check_league(app, slug, viewer, true)?;
    let answer = app
        .store
        .answer(&AnswerFilter {
            league_id: Some(league.league_id),
            answer_id: Some(answer_id),
            active_at: Some(now),
            ..AnswerFilter::default()
        })?
        .ok_or_else(|| WwmError::not_found("Puzzle"))?;

    let guess = guess.trim().to_lowercase();
    if guess.is_empty() {
        return Err(RejectReason::EmptyGuess.into());
    }
    if guess.chars().count() != league.letters {
        return Err(RejectReason::WrongLength.into());
    }

    let prior = app.store.guesses(&GuessFilter::for_player(viewer, answer_id))?;
    if prior.iter().any(|g| g.correct) {
        return Err(RejectReason::AlreadyCorrect.into());
    }
    if prior.iter().any(|g| g.guess == guess) {
        return Err(RejectReason::AlreadyGuessed.into());
    }
    if prior.len() >= league.max_guesses as usize {
        return Err(RejectReason::MaxGuessesReached.into());
    }
    if !app.words.contains_word(&guess, &league.accept_word_list)? {
        return Err(RejectReason::InvalidWord.into());
    }
    if league.is_hard_mode && !hard_mode::is_legal(&app.words, &league, &guess, &prior, &answer)? {
        return Err(RejectReason::HardModeViolation.into());
    }

    let verdicts = evaluate(&answer.answer, &guess);
    let (correct_placement, correct_letters) = tally(&verdicts);
    let correct = is_solved(&verdicts);
    let status = app.store.record_guess(
        NewGuess {
            user_id: viewer,
            answer_id,
            guess: guess.clone(),
            correct_placement,
            correct_letters,
            correct,
            create_date: now,
        },
        league.max_guesses,
    )?;
    log::debug!(
        "User {viewer} guess {} on puzzle {answer_id}: {}",
        status.num_guesses,
        Pattern(&verdicts)
    );

    let guesses: Vec<GuessStep> = prior
        .iter()
        .map(|g| g.guess.as_str())
        .chain(std::iter::once(guess.as_str()))
        .map(|g| step(&answer.answer, g, NOT_REDUCED))
        .collect();
    let revealed = guesses.len() >= league.max_guesses as usize;

    Ok(CheckGuessResponse {
        guesses,
        correct,
        completed: status.completed,
        answer: revealed.then(|| answer.answer.clone()),
    })
}

/// The guess history of `of_user` (the viewer when `None`). Looking at
/// someone else's board needs the viewer to have finished the puzzle first.
pub fn guesses<S: Store>(
    app: &App<S>,
    viewer: UserId,
    slug: &str,
    answer_id: AnswerId,
    of_user: Option<UserId>,
    reduce: bool,
) -> Result<GuessesResponse> {
    let league = check_league(app, slug, viewer, true)?;
    let answer = app
        .store
        .answer(&AnswerFilter {
            league_id: Some(league.league_id),
            answer_id: Some(answer_id),
            ..AnswerFilter::default()
        })?
        .ok_or_else(|| WwmError::not_found("Puzzle"))?;

    let player = viewed_player(viewer, of_user);
    if player != viewer {
        require_completed(app, viewer, answer_id)?;
    }

    let history: Vec<Guess> = app.store.guesses(&GuessFilter::for_player(player, answer_id))?;
    let reductions: Vec<Reduction> = if reduce {
        let accepted = app.words.load_words(league.letters, &league.accept_word_list)?;
        let (counts, _) = reduce_history(
            accepted.words(),
            &answer.answer,
            history.iter().map(|g| g.guess.as_str()),
        );
        counts.into_iter().map(|n| [n as i64, -1]).collect()
    } else {
        vec![NOT_REDUCED; history.len()]
    };

    let steps: Vec<GuessStep> = history
        .iter()
        .zip(reductions)
        .map(|(g, reduction)| step(&answer.answer, &g.guess, reduction))
        .collect();
    let revealed = steps.len() >= league.max_guesses as usize;

    Ok(GuessesResponse {
        user_id: player,
        correct: steps.iter().any(|s| s.correct),
        guesses: steps,
        answer: revealed.then_some(answer.answer),
    })
}

/// Puzzles of a league in schedule order, joined with the viewer's progress.
pub fn puzzles<S: Store>(
    app: &App<S>,
    viewer: UserId,
    slug: &str,
    window: PuzzleWindow,
    now: DateTime<Utc>,
) -> Result<Vec<PuzzleView>> {
    let league = check_league(app, slug, viewer, false)?;
    let series = app.store.league_series(&SeriesFilter {
        league_id: Some(league.league_id),
        ..SeriesFilter::default()
    })?;

    let mut views = Vec::new();
    for answer in app.store.answers(&AnswerFilter {
        league_id: Some(league.league_id),
        ..AnswerFilter::default()
    })? {
        if !window.admits(&answer, now) {
            continue;
        }
        let parent = series.iter().find(|s| s.series_id == answer.series_id);
        let status = player_status(app, viewer, answer.answer_id)?;
        let completed = status.as_ref().is_some_and(|s| s.completed);
        views.push(PuzzleView {
            league_slug: league.league_slug.clone(),
            league_name: league.league_name.clone(),
            answer_id: answer.answer_id,
            active_after: answer.active_after,
            active_before: answer.active_before,
            series_start_date: parent.map(|s| s.start_date),
            series_end_date: parent.map(|s| s.end_date),
            num_guesses: status.as_ref().map_or(0, |s| s.num_guesses),
            correct: status.as_ref().is_some_and(|s| s.correct),
            completed,
            correct_answer: completed.then_some(answer.answer),
        });
    }
    views.sort_by_key(|v| v.active_after);
    Ok(views)
}

/// Finished players for a puzzle: solvers first, then fewest guesses, then
/// earliest finish.
pub fn completed<S: Store>(
    app: &App<S>,
    viewer: UserId,
    slug: &str,
    answer_id: AnswerId,
) -> Result<Vec<Status>> {
    let league = check_league(app, slug, viewer, true)?;
    app.store
        .answer(&AnswerFilter {
            league_id: Some(league.league_id),
            answer_id: Some(answer_id),
            ..AnswerFilter::default()
        })?
        .ok_or_else(|| WwmError::not_found("Puzzle"))?;
    require_completed(app, viewer, answer_id)?;

    let mut board = app.store.statuses(&StatusFilter {
        answer_id: Some(answer_id),
        completed: Some(true),
        ..StatusFilter::default()
    })?;
    board.sort_by(|a, b| {
        b.correct
            .cmp(&a.correct)
            .then(a.num_guesses.cmp(&b.num_guesses))
            .then(a.end_date.cmp(&b.end_date))
    });
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::leagues::{NewLeagueRequest, add_league, join_league};
    use crate::model::{League, NewAnswer, NewSeries};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use std::fs;
    use std::path::PathBuf;
    use Verdict::{Hit, Miss, Present};

    const ACCEPT: &str = "masse\nbasse\nlasse\nsasas\nxmass\ntasks\ncrane\nmossy\nguest\nslate\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()
    }

    fn data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wwm_puzzles_{name}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("accept.txt"), ACCEPT).unwrap();
        fs::write(dir.join("answers.txt"), "masse\n").unwrap();
        dir
    }

    struct Fixture {
        app: App<MemoryStore>,
        league: League,
        answer: Answer,
    }

    fn fixture(name: &str, hard_mode: bool, max_guesses: u32) -> Fixture {
        let app = App::new(MemoryStore::new(), Settings::default().with_data_dir(data_dir(name)));
        let league = add_league(
            &app,
            1,
            NewLeagueRequest {
                league_name: format!("League {name}"),
                letters: 5,
                max_guesses,
                series_days: 7,
                answer_interval_minutes: 1440,
                time_to_live_hours: 24,
                is_private: false,
                is_hard_mode: hard_mode,
            },
            now(),
        )
        .unwrap();
        let series = app
            .store
            .insert_series(NewSeries {
                league_id: league.league_id,
                create_date: now(),
                start_date: league.start_date,
                end_date: league.start_date + Duration::days(7),
            })
            .unwrap()
            .unwrap();
        let answer = app
            .store
            .insert_answer(NewAnswer {
                series_id: series.series_id,
                league_id: league.league_id,
                answer: "masse".to_string(),
                create_date: now(),
                active_after: now() - Duration::hours(1),
                active_before: now() + Duration::hours(23),
            })
            .unwrap();
        Fixture { app, league, answer }
    }

    fn rejection(result: Result<CheckGuessResponse>) -> RejectReason {
        match result {
            Err(WwmError::Rejected(reason)) => reason,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_check_guess_until_solved() {
        let f = fixture("solve", false, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;

        let first = check_guess(&f.app, 1, slug, id, "BASSE", now()).unwrap();
        assert_eq!(first.guesses.len(), 1);
        assert_eq!(first.guesses[0].result, vec![Miss, Hit, Hit, Hit, Hit]);
        assert!(!first.correct && !first.completed);
        assert!(first.answer.is_none());

        let second = check_guess(&f.app, 1, slug, id, "masse", now()).unwrap();
        assert_eq!(second.guesses.len(), 2);
        assert_eq!(second.guesses[1].result, vec![Hit; 5]);
        assert!(second.correct && second.completed);

        let stored = f.app.store.guesses(&GuessFilter::for_player(1, id)).unwrap();
        assert_eq!((stored[0].correct_placement, stored[0].correct_letters), (4, 4));
        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "lasse", now())), RejectReason::AlreadyCorrect);
    }

    #[test]
    fn test_check_guess_rejections_in_order() {
        let f = fixture("reject", false, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;

        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "  ", now())), RejectReason::EmptyGuess);
        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "mass", now())), RejectReason::WrongLength);
        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "zzzzz", now())), RejectReason::InvalidWord);
        check_guess(&f.app, 1, slug, id, "crane", now()).unwrap();
        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "crane", now())), RejectReason::AlreadyGuessed);
    }

    #[test]
    fn test_check_guess_access() {
        let f = fixture("access", false, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;

        assert!(matches!(check_guess(&f.app, 2, slug, id, "crane", now()), Err(WwmError::NotInLeague)));
        join_league(&f.app, 2, slug, None, now()).unwrap();
        assert!(check_guess(&f.app, 2, slug, id, "crane", now()).is_ok());

        let later = now() + Duration::days(2);
        assert!(matches!(check_guess(&f.app, 2, slug, id, "slate", later), Err(WwmError::NotFound(_))));
    }

    #[test]
    fn test_answer_revealed_after_last_guess() {
        let f = fixture("reveal", false, 2);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;

        check_guess(&f.app, 1, slug, id, "crane", now()).unwrap();
        let last = check_guess(&f.app, 1, slug, id, "slate", now()).unwrap();
        assert!(last.completed && !last.correct);
        assert_eq!(last.answer.as_deref(), Some("masse"));
        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "basse", now())), RejectReason::MaxGuessesReached);
    }

    #[test]
    fn test_hard_mode_rejects_ignored_hints() {
        let f = fixture("hard", true, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;

        check_guess(&f.app, 1, slug, id, "basse", now()).unwrap();
        assert_eq!(rejection(check_guess(&f.app, 1, slug, id, "crane", now())), RejectReason::HardModeViolation);
        assert!(check_guess(&f.app, 1, slug, id, "lasse", now()).is_ok());
        assert!(check_guess(&f.app, 1, slug, id, "masse", now()).unwrap().correct);
    }

    #[test]
    fn test_guesses_with_reduction() {
        let f = fixture("browse", false, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;
        check_guess(&f.app, 1, slug, id, "basse", now()).unwrap();

        let plain = guesses(&f.app, 1, slug, id, None, false).unwrap();
        assert_eq!(plain.guesses[0].reduction, [-1, -1]);

        // basse leaves masse and lasse.
        let reduced = guesses(&f.app, 1, slug, id, None, true).unwrap();
        assert_eq!(reduced.guesses[0].reduction, [2, -1]);
        assert!(!reduced.correct);
        assert!(reduced.answer.is_none());
    }

    #[test]
    fn test_other_boards_need_completion() {
        let f = fixture("peek", false, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;
        join_league(&f.app, 2, slug, None, now()).unwrap();
        check_guess(&f.app, 2, slug, id, "masse", now()).unwrap();

        let peek = guesses(&f.app, 1, slug, id, Some(2), false);
        assert!(matches!(peek, Err(WwmError::Rejected(RejectReason::NotCompleted))));
        assert!(matches!(
            completed(&f.app, 1, slug, id),
            Err(WwmError::Rejected(RejectReason::NotCompleted))
        ));

        check_guess(&f.app, 1, slug, id, "basse", now()).unwrap();
        check_guess(&f.app, 1, slug, id, "masse", now() + Duration::minutes(5)).unwrap();
        let theirs = guesses(&f.app, 1, slug, id, Some(2), false).unwrap();
        assert_eq!(theirs.user_id, 2);
        assert!(theirs.correct);

        let board = completed(&f.app, 1, slug, id).unwrap();
        let order: Vec<UserId> = board.iter().map(|s| s.user_id).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn test_puzzle_listing() {
        let f = fixture("listing", false, 6);
        let slug = &f.league.league_slug;
        let id = f.answer.answer_id;

        let open = puzzles(&f.app, 1, slug, PuzzleWindow::Active, now()).unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].correct_answer.is_none());
        assert_eq!(open[0].series_start_date, Some(f.league.start_date));

        check_guess(&f.app, 1, slug, id, "masse", now()).unwrap();
        let solved = puzzles(&f.app, 1, slug, PuzzleWindow::All, now()).unwrap();
        assert_eq!(solved[0].correct_answer.as_deref(), Some("masse"));
        assert_eq!(solved[0].num_guesses, 1);

        assert!(puzzles(&f.app, 1, slug, PuzzleWindow::Expired, now()).unwrap().is_empty());
        let later = now() + Duration::days(1);
        assert_eq!(puzzles(&f.app, 1, slug, PuzzleWindow::Expired, later).unwrap().len(), 1);
    }
}
