use crate::error::WordListError;
use crate::model::{Answer, Guess, League};
use crate::solver::{evaluate, filter_candidates};
use crate::wordbank::WordCache;

/// Whether `candidate` respects everything revealed by `prior` guesses.
///
/// The candidate list is rebuilt from the league's accept list on every call,
/// replaying each prior guess against the real answer in submission order.
pub fn is_legal(
    words: &WordCache,
    league: &League,
    candidate: &str,
    prior: &[Guess],
    answer: &Answer,
) -> Result<bool, WordListError> {
    let accepted = words.load_words(league.letters, &league.accept_word_list)?;
    Ok(is_legal_in(accepted.words(), candidate, prior, &answer.answer))
}

/// [`is_legal`] over an explicit word list.
pub fn is_legal_in(words: &[String], candidate: &str, prior: &[Guess], answer: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let mut remaining = words.to_vec();
    for guess in prior {
        remaining = filter_candidates(&remaining, &guess.guess, &evaluate(answer, &guess.guess));
        if remaining.is_empty() {
            break;
        }
    }
    remaining.contains(&candidate)
}
