use crate::app::App;
use crate::config::Settings;
use crate::error::{Result, WwmError};
use crate::leagues::{self, NewLeagueRequest};
use crate::model::{AnswerId, SeriesId, UserId};
use crate::puzzles::{self, PuzzleWindow};
use crate::scheduler;
use crate::store::Store;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Words with Melvins league backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the word list files
    #[arg(long, global = true, env = "WWM_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// JSON snapshot the store is loaded from and saved to
    #[arg(long = "store", global = true, env = "WWM_STORE")]
    pub store_path: Option<PathBuf>,

    /// Acting player id
    #[arg(short = 'u', long, global = true, env = "WWM_USER", default_value_t = 1)]
    pub user: UserId,

    /// Evaluate as of this instant (RFC 3339) instead of the clock
    #[arg(long, global = true)]
    pub now: Option<DateTime<Utc>>,

    /// Fan league generation out across threads
    #[arg(long, global = true)]
    pub parallel: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate due series and answers once
    Tick,
    /// Generate series and answers on a fixed interval, forever
    Run,
    #[command(subcommand)]
    League(LeagueCommand),
    /// List a league's puzzles with your progress
    Puzzles {
        slug: String,
        #[arg(long, conflicts_with = "expired")]
        active: bool,
        #[arg(long)]
        expired: bool,
    },
    /// Submit a guess
    Guess {
        slug: String,
        answer_id: AnswerId,
        word: String,
    },
    /// Show a player's guesses for a puzzle
    Guesses {
        slug: String,
        answer_id: AnswerId,
        #[arg(long)]
        of_user: Option<UserId>,
        /// Include remaining word counts per guess
        #[arg(long)]
        reduce: bool,
    },
    /// Show everyone who finished a puzzle
    Completed { slug: String, answer_id: AnswerId },
}

#[derive(Subcommand, Debug)]
pub enum LeagueCommand {
    /// Create a league
    Add(AddLeague),
    /// Check whether a league name is free
    Check { name: String },
    Join {
        slug: String,
        #[arg(long)]
        invite: Option<String>,
    },
    Leave { slug: String },
    List,
    Info { slug: String },
    /// List started series
    Series { slug: String },
    /// Series leaderboard
    Stats { slug: String, series_id: SeriesId },
}

#[derive(Args, Debug)]
pub struct AddLeague {
    pub name: String,
    #[arg(long, default_value_t = 5)]
    pub letters: usize,
    #[arg(long, default_value_t = 6)]
    pub max_guesses: u32,
    #[arg(long, default_value_t = 7)]
    pub series_days: u32,
    #[arg(long, default_value_t = 1440)]
    pub interval_minutes: u32,
    #[arg(long, default_value_t = 24)]
    pub ttl_hours: u32,
    #[arg(long)]
    pub private: bool,
    #[arg(long)]
    pub hard: bool,
}

impl From<AddLeague> for NewLeagueRequest {
    fn from(args: AddLeague) -> Self {
        Self {
            league_name: args.name,
            letters: args.letters,
            max_guesses: args.max_guesses,
            series_days: args.series_days,
            answer_interval_minutes: args.interval_minutes,
            time_to_live_hours: args.ttl_hours,
            is_private: args.private,
            is_hard_mode: args.hard,
        }
    }
}

#[must_use]
pub fn parse_cli() -> Cli {
    Cli::parse()
}

impl Cli {
    /// Defaults overlaid with the path and fan-out flags.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        if let Some(dir) = &self.data_dir {
            settings.data_dir.clone_from(dir);
        }
        if let Some(path) = &self.store_path {
            settings.store_path.clone_from(path);
        }
        settings.parallel_leagues |= self.parallel;
        settings
    }
}

fn json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| WwmError::Store(e.into()))
}

/// Runs one command and returns its result as JSON. `Run` is handled by the
/// binary since it never returns.
pub fn execute<S: Store>(app: &App<S>, user: UserId, command: Command, now: DateTime<Utc>) -> Result<Value> {
    match command {
        Command::Tick | Command::Run => json(scheduler::run_tick(app, scheduler::rounded_now(now))?),
        Command::League(cmd) => execute_league(app, user, cmd, now),
        Command::Puzzles {
            slug,
            active,
            expired,
        } => {
            let window = match (active, expired) {
                (true, _) => PuzzleWindow::Active,
                (_, true) => PuzzleWindow::Expired,
                _ => PuzzleWindow::All,
            };
            json(puzzles::puzzles(app, user, &slug, window, now)?)
        }
        Command::Guess {
            slug,
            answer_id,
            word,
        } => json(puzzles::check_guess(app, user, &slug, answer_id, &word, now)?),
        Command::Guesses {
            slug,
            answer_id,
            of_user,
            reduce,
        } => json(puzzles::guesses(app, user, &slug, answer_id, of_user, reduce)?),
        Command::Completed { slug, answer_id } => json(puzzles::completed(app, user, &slug, answer_id)?),
    }
}

fn execute_league<S: Store>(app: &App<S>, user: UserId, command: LeagueCommand, now: DateTime<Utc>) -> Result<Value> {
    match command {
        LeagueCommand::Add(args) => {
            let league = leagues::add_league(app, user, args.into(), now)?;
            // The league is usable even if its word list is not in place yet.
            if let Err(e) = scheduler::generate_league(app, &league, scheduler::rounded_now(now)) {
                log::warn!("Initial generation for {} failed: {e}", league.league_slug);
            }
            json(league)
        }
        LeagueCommand::Check { name } => {
            let slug = leagues::check_league_name(app, &name)?;
            json(serde_json::json!({ "league_slug": slug }))
        }
        LeagueCommand::Join { slug, invite } => {
            json(leagues::join_league(app, user, &slug, invite.as_deref(), now)?.league_slug)
        }
        LeagueCommand::Leave { slug } => {
            leagues::leave_league(app, user, &slug, now)?;
            json(serde_json::json!({ "left": slug }))
        }
        LeagueCommand::List => json(leagues::list_leagues(app, user)?),
        LeagueCommand::Info { slug } => {
            let mut league = leagues::check_league(app, &slug, user, false)?;
            if league.create_user_id != user {
                league.invite_code = None;
            }
            json(league)
        }
        LeagueCommand::Series { slug } => json(leagues::league_series(app, &slug, user, now)?),
        LeagueCommand::Stats { slug, series_id } => {
            json(leagues::series_stats(app, &slug, series_id, user, now)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_guess() {
        let cli = Cli::try_parse_from(["wwm", "-u", "7", "guess", "morning", "3", "crane"]).unwrap();
        assert_eq!(cli.user, 7);
        match cli.command {
            Command::Guess {
                slug,
                answer_id,
                word,
            } => {
                assert_eq!(slug, "morning");
                assert_eq!(answer_id, 3);
                assert_eq!(word, "crane");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_league_add_defaults() {
        let cli = Cli::try_parse_from(["wwm", "league", "add", "Morning Crew", "--hard"]).unwrap();
        let Command::League(LeagueCommand::Add(args)) = cli.command else {
            panic!("expected league add");
        };
        let request = NewLeagueRequest::from(args);
        assert_eq!(request.letters, 5);
        assert_eq!(request.max_guesses, 6);
        assert_eq!(request.answer_interval_minutes, 1440);
        assert!(request.is_hard_mode);
        assert!(!request.is_private);
    }

    #[test]
    fn test_settings_overlay() {
        let cli = Cli::try_parse_from(["wwm", "--data-dir", "/tmp/w", "--store", "/tmp/s.json", "--parallel", "tick"])
            .unwrap();
        let settings = cli.settings();
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/w"));
        assert_eq!(settings.store_path, PathBuf::from("/tmp/s.json"));
        assert!(settings.parallel_leagues);
    }

    #[test]
    fn test_now_flag() {
        let cli = Cli::try_parse_from(["wwm", "--now", "2024-03-06T12:00:00Z", "tick"]).unwrap();
        assert_eq!(cli.now.map(|t| t.to_rfc3339()), Some("2024-03-06T12:00:00+00:00".to_string()));
    }

    #[test]
    fn test_active_conflicts_with_expired() {
        assert!(Cli::try_parse_from(["wwm", "puzzles", "x", "--active", "--expired"]).is_err());
    }
}
