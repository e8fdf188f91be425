use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Machine-readable reason attached to a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingSlug,
    EmptyGuess,
    WrongLength,
    InvalidWord,
    AlreadyGuessed,
    AlreadyCorrect,
    MaxGuessesReached,
    HardModeViolation,
    NotCompleted,
    LeagueNameTooShort,
    LeagueNameExists,
    OwnerCannotLeave,
    InvalidLeagueConfig,
}

impl RejectReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingSlug => "missing_slug",
            Self::EmptyGuess => "empty_guess",
            Self::WrongLength => "wrong_length",
            Self::InvalidWord => "invalid_word",
            Self::AlreadyGuessed => "already_guessed",
            Self::AlreadyCorrect => "already_correct",
            Self::MaxGuessesReached => "max_guesses_reached",
            Self::HardModeViolation => "hard_mode_violation",
            Self::NotCompleted => "not_completed",
            Self::LeagueNameTooShort => "league_name_too_short",
            Self::LeagueNameExists => "league_name_exists",
            Self::OwnerCannotLeave => "owner_cannot_leave",
            Self::InvalidLeagueConfig => "invalid_league_config",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::MissingSlug => "must pass in league_slug",
            Self::EmptyGuess => "must pass a guessed word",
            Self::WrongLength => "guess has the wrong number of letters",
            Self::InvalidWord => "invalid word",
            Self::AlreadyGuessed => "already made this guess",
            Self::AlreadyCorrect => "already have a correct answer",
            Self::MaxGuessesReached => "already reached maximum number of guesses for this puzzle",
            Self::HardModeViolation => "invalid guess - violates prior rules",
            Self::NotCompleted => "you have not completed this puzzle",
            Self::LeagueNameTooShort => "league names need to be at least 5 letters",
            Self::LeagueNameExists => "a league with this slug already exists",
            Self::OwnerCannotLeave => "league owner can not leave league",
            Self::InvalidLeagueConfig => "league settings must all be positive",
        }
    }
}

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("failed to read word list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("word list {list} has no words of length {length}")]
    Empty { list: String, length: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store snapshot i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("store snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("guess rejected: {}", .0.message())]
    GuessRejected(RejectReason),
    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum WwmError {
    #[error("{}", .0.message())]
    Rejected(RejectReason),
    #[error("{0}")]
    NotFound(String),
    #[error("you are not in this league")]
    NotInLeague,
    #[error(transparent)]
    WordList(#[from] WordListError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WwmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GuessRejected(reason) => Self::Rejected(reason),
            other => Self::Store(other),
        }
    }
}

impl From<RejectReason> for WwmError {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

impl WwmError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Rejected(_) => 400,
            Self::NotInLeague => 403,
            Self::NotFound(_) => 404,
            Self::WordList(_) | Self::Store(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected(reason) => reason.code(),
            Self::NotInLeague => "not_in_league",
            Self::NotFound(_) => "not_found",
            Self::WordList(_) => "word_list_error",
            Self::Store(_) => "store_error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status(),
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Serialized form of a [`WwmError`] handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub code: &'static str,
    pub message: String,
}

impl ErrorBody {
    /// Body for failures outside [`WwmError`], such as an unreadable snapshot.
    pub fn internal(message: String) -> Self {
        Self {
            status: 500,
            code: "internal_error",
            message,
        }
    }
}

pub type Result<T, E = WwmError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_bad_requests() {
        let err = WwmError::from(RejectReason::HardModeViolation);
        assert_eq!(err.status(), 400);
        assert_eq!(err.code(), "hard_mode_violation");
        assert_eq!(err.to_string(), "invalid guess - violates prior rules");
    }

    #[test]
    fn test_not_in_league_is_distinct_from_not_found() {
        let missing = WwmError::not_found("League");
        assert_eq!(missing.status(), 404);
        assert_eq!(missing.to_string(), "League not found");
        assert_eq!(WwmError::NotInLeague.status(), 403);
        assert_eq!(WwmError::NotInLeague.code(), "not_in_league");
    }

    #[test]
    fn test_store_rejection_becomes_validation_error() {
        let err = WwmError::from(StoreError::GuessRejected(RejectReason::MaxGuessesReached));
        assert!(matches!(err, WwmError::Rejected(RejectReason::MaxGuessesReached)));
    }

    #[test]
    fn test_reason_serializes_as_code() {
        let json = serde_json::to_string(&RejectReason::AlreadyGuessed).unwrap();
        assert_eq!(json, "\"already_guessed\"");
    }

    #[test]
    fn test_error_body() {
        let body = WwmError::not_found("Puzzle").body();
        assert_eq!(body.status, 404);
        assert_eq!(body.code, "not_found");
        assert_eq!(body.message, "Puzzle not found");
    }
}
