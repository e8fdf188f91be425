use crate::debug_log;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Per-letter feedback for one guessed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Right letter, right position.
    #[serde(rename = "+")]
    Hit,
    /// Letter is in the answer at another position.
    #[serde(rename = "-")]
    Present,
    /// Letter is not in the answer, or its count in the answer is used up.
    #[serde(rename = " ")]
    Miss,
}

impl Verdict {
    pub fn symbol(self) -> char {
        match self {
            Self::Hit => '+',
            Self::Present => '-',
            Self::Miss => ' ',
        }
    }
}

/// Renders a verdict sequence with the `+`, `-`, ` ` symbols.
pub struct Pattern<'a>(pub &'a [Verdict]);

impl fmt::Display for Pattern<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|v| write!(f, "{}", v.symbol()))
    }
}

/// Scores `guess` against `answer`, one verdict per guessed position.
///
/// Repeated letters are budgeted left to right: every exact hit of a letter is
/// counted first, then each misplaced occurrence bumps a running count and is
/// `Present` only while that count stays within the letter's count in the
/// answer. Length checks belong to the caller; extra guessed positions
/// score against nothing.
pub fn evaluate(answer: &str, guess: &str) -> Vec<Verdict> {
    let answer: Vec<char> = answer.to_lowercase().chars().collect();
    let guess: Vec<char> = guess.to_lowercase().chars().collect();

    let mut expected: HashMap<char, usize> = HashMap::new();
    for &c in &answer {
        *expected.entry(c).or_insert(0) += 1;
    }

    let mut seen: HashMap<char, usize> = HashMap::new();
    for (&g, a) in guess.iter().zip(&answer) {
        if g == *a {
            *seen.entry(g).or_insert(0) += 1;
        }
    }

    guess
        .iter()
        .enumerate()
        .map(|(i, &g)| {
            let hit = answer.get(i) == Some(&g);
            if hit {
                return Verdict::Hit;
            }
            let count = seen.entry(g).or_insert(0);
            *count += 1;
            match expected.get(&g) {
                Some(&budget) if *count <= budget => Verdict::Present,
                _ => Verdict::Miss,
            }
        })
        .collect()
}

pub fn is_solved(verdicts: &[Verdict]) -> bool {
    verdicts.iter().all(|&v| v == Verdict::Hit)
}

/// `(correct_placement, correct_letters)`: hits, and hits plus presents.
pub fn tally(verdicts: &[Verdict]) -> (usize, usize) {
    let hits = verdicts.iter().filter(|&&v| v == Verdict::Hit).count();
    let letters = verdicts.iter().filter(|&&v| v != Verdict::Miss).count();
    (hits, letters)
}

/// A set of lowercase ascii letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LetterSet(u32);

impl LetterSet {
    pub const ALPHABET: Self = Self((1 << 26) - 1);

    fn bit(c: char) -> u32 {
        if c.is_ascii_lowercase() {
            1 << (c as u8 - b'a')
        } else {
            0
        }
    }

    pub fn only(c: char) -> Self {
        Self(Self::bit(c))
    }

    pub fn contains(self, c: char) -> bool {
        let bit = Self::bit(c);
        bit != 0 && self.0 & bit != 0
    }

    pub fn insert(&mut self, c: char) {
        self.0 |= Self::bit(c);
    }

    pub fn remove(&mut self, c: char) {
        self.0 &= !Self::bit(c);
    }
}

/// What one scored guess reveals about the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    /// Letters still possible at each position.
    pub allowed: Vec<LetterSet>,
    /// Letters the answer does not contain at all.
    pub forbidden: LetterSet,
    /// Minimum count of each letter outside the positions pinned by a hit.
    pub required: HashMap<char, usize>,
    /// Positions fixed by a hit in this guess.
    pub pinned: Vec<bool>,
}

impl Constraints {
    pub fn derive(guess: &str, verdicts: &[Verdict]) -> Self {
        let guess: Vec<char> = guess.to_lowercase().chars().collect();
        let length = guess.len();
        let mut allowed = vec![LetterSet::ALPHABET; length];
        let mut forbidden = LetterSet::default();
        let mut required: HashMap<char, usize> = HashMap::new();
        let mut pinned = vec![false; length];

        let mut occurrences: HashMap<char, usize> = HashMap::new();
        let mut confirmed: HashMap<char, usize> = HashMap::new();
        for (&c, &v) in guess.iter().zip(verdicts) {
            *occurrences.entry(c).or_insert(0) += 1;
            if v != Verdict::Miss {
                *confirmed.entry(c).or_insert(0) += 1;
            }
        }

        for (i, (&c, &v)) in guess.iter().zip(verdicts).enumerate() {
            match v {
                Verdict::Hit => {
                    allowed[i] = LetterSet::only(c);
                    pinned[i] = true;
                }
                Verdict::Present => {
                    allowed[i].remove(c);
                    *required.entry(c).or_insert(0) += 1;
                }
                Verdict::Miss => {
                    let known = confirmed.get(&c).copied().unwrap_or(0);
                    if known == 0 || occurrences.get(&c) == Some(&known) {
                        forbidden.insert(c);
                    } else {
                        allowed[i].remove(c);
                    }
                }
            }
        }

        Self {
            allowed,
            forbidden,
            required,
            pinned,
        }
    }

    pub fn matches(&self, word: &str) -> bool {
        let letters: Vec<char> = word.chars().collect();
        if letters.len() != self.allowed.len() {
            return false;
        }

        let mut unpinned: HashMap<char, usize> = HashMap::new();
        for (i, &c) in letters.iter().enumerate() {
            if !self.allowed[i].contains(c) || self.forbidden.contains(c) {
                return false;
            }
            if !self.pinned[i] {
                *unpinned.entry(c).or_insert(0) += 1;
            }
        }

        self.required
            .iter()
            .all(|(c, &count)| unpinned.get(c).copied().unwrap_or(0) >= count)
    }
}

/// Keeps the words consistent with one scored guess.
pub fn filter_candidates(candidates: &[String], guess: &str, verdicts: &[Verdict]) -> Vec<String> {
    let constraints = Constraints::derive(guess, verdicts);
    let filtered: Vec<String> = candidates
        .iter()
        .filter(|word| constraints.matches(word))
        .cloned()
        .collect();
    debug_log!(
        "filter_candidates({guess}, '{}'): {} -> {}",
        Pattern(verdicts),
        candidates.len(),
        filtered.len()
    );
    filtered
}

/// Folds a guess history over `words`, returning the candidate count after
/// each step alongside the final survivors.
pub fn reduce_history<'a, I>(words: &[String], answer: &str, history: I) -> (Vec<usize>, Vec<String>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates = words.to_vec();
    let mut counts = Vec::new();
    for guess in history {
        candidates = filter_candidates(&candidates, guess, &evaluate(answer, guess));
        counts.push(candidates.len());
    }
    (counts, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Verdict::{Hit, Miss, Present};

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_evaluate_known_vectors() {
        assert_eq!(evaluate("masse", "basse"), vec![Miss, Hit, Hit, Hit, Hit]);
        assert_eq!(evaluate("masse", "masse"), vec![Hit; 5]);
        assert_eq!(evaluate("masse", "sasas"), vec![Present, Hit, Hit, Miss, Miss]);
        assert_eq!(evaluate("masse", "xmass"), vec![Miss, Present, Present, Hit, Present]);
        assert_eq!(evaluate("guest", "xgues"), vec![Miss, Present, Present, Present, Present]);
    }

    #[test]
    fn test_evaluate_is_case_insensitive() {
        assert_eq!(evaluate("MASSE", "sasas"), evaluate("masse", "SASAS"));
    }

    #[test]
    fn test_evaluate_same_word_is_all_hits() {
        for word in ["crane", "eerie", "aaaaa", "ab", "sessions"] {
            let verdicts = evaluate(word, word);
            assert_eq!(verdicts.len(), word.len());
            assert!(is_solved(&verdicts));
        }
    }

    #[test]
    fn test_evaluate_length_matches_input() {
        let verdicts = evaluate("abcdefg", "gfedcba");
        assert_eq!(verdicts.len(), 7);
        assert_eq!(verdicts[3], Hit);
    }

    #[test]
    fn test_evaluate_mismatched_lengths() {
        let short = evaluate("masse", "mass");
        assert_eq!(short, vec![Hit, Hit, Hit, Hit]);
        let long = evaluate("mass", "masses");
        assert_eq!(long.len(), 6);
        assert_eq!(&long[..4], &[Hit, Hit, Hit, Hit]);
        assert_eq!(long[5], Miss);
    }

    #[test]
    fn test_pattern_symbols() {
        let verdicts = evaluate("masse", "sasas");
        assert_eq!(Pattern(&verdicts).to_string(), "-++  ");
        assert_eq!(Pattern(&[]).to_string(), "");
    }

    #[test]
    fn test_verdict_serializes_as_symbol() {
        let json = serde_json::to_string(&vec![Hit, Present, Miss]).unwrap();
        assert_eq!(json, r#"["+","-"," "]"#);
    }

    #[test]
    fn test_tally() {
        assert_eq!(tally(&[Present, Hit, Hit, Miss, Miss]), (2, 3));
        assert_eq!(tally(&[Hit; 5]), (5, 5));
    }

    #[test]
    fn test_letter_set() {
        let mut set = LetterSet::ALPHABET;
        assert!(('a'..='z').all(|c| set.contains(c)));
        set.remove('q');
        assert!(!set.contains('q'));
        assert!(set.contains('a'));
        assert!(!set.contains('A'));
        assert!(LetterSet::only('z').contains('z'));
        assert!(!LetterSet::default().contains('a'));
    }

    #[test]
    fn test_derive_constraints_for_repeated_letters() {
        let constraints = Constraints::derive("sasas", &[Present, Hit, Hit, Miss, Miss]);
        assert!(!constraints.allowed[0].contains('s'));
        assert_eq!(constraints.allowed[1], LetterSet::only('a'));
        assert_eq!(constraints.allowed[2], LetterSet::only('s'));
        assert!(!constraints.allowed[3].contains('a'));
        assert!(!constraints.allowed[4].contains('s'));
        assert_eq!(constraints.forbidden, LetterSet::default());
        assert_eq!(constraints.required.get(&'s'), Some(&1));
        assert_eq!(constraints.pinned, vec![false, true, true, false, false]);
    }

    #[test]
    fn test_derive_constraints_forbids_absent_letters() {
        let constraints = Constraints::derive("basse", &[Miss, Hit, Hit, Hit, Hit]);
        assert!(constraints.forbidden.contains('b'));
        assert!(!constraints.forbidden.contains('s'));
        assert!(constraints.required.is_empty());
    }

    #[test]
    fn test_filter_keeps_answer_with_repeated_letters() {
        let candidates = words(&["masse", "basse", "sassy", "lasso", "mossy"]);
        let filtered = filter_candidates(&candidates, "sasas", &evaluate("masse", "sasas"));
        assert!(filtered.contains(&"masse".to_string()));
        assert!(!filtered.contains(&"sassy".to_string()));
    }

    #[test]
    fn test_filter_requires_present_letter_off_pinned_slots() {
        // 's' is pinned at position 2 and also present elsewhere.
        let verdicts = evaluate("masse", "tasks");
        assert_eq!(verdicts, vec![Miss, Hit, Hit, Miss, Present]);
        let candidates = words(&["masse", "mases", "mashe"]);
        let filtered = filter_candidates(&candidates, "tasks", &verdicts);
        assert_eq!(filtered, words(&["masse"]));
    }

    #[test]
    fn test_filter_forbidden_letter() {
        let candidates = words(&["crane", "slate", "raise", "stare", "dumpy"]);
        let filtered = filter_candidates(&candidates, "crane", &[Miss; 5]);
        assert_eq!(filtered, words(&["dumpy"]));
    }

    #[test]
    fn test_filter_rejects_wrong_length() {
        let candidates = words(&["masse", "masses"]);
        let filtered = filter_candidates(&candidates, "basse", &evaluate("masse", "basse"));
        assert_eq!(filtered, words(&["masse"]));
    }

    #[test]
    fn test_answer_survives_its_own_feedback() {
        let answers = ["masse", "guest", "eerie", "llama", "abbey", "sissy"];
        let guesses = ["sasas", "xmass", "xgues", "eeeee", "level", "lllll", "babes", "hissy"];
        for answer in answers {
            for guess in guesses {
                if guess.len() != answer.len() {
                    continue;
                }
                let constraints = Constraints::derive(guess, &evaluate(answer, guess));
                assert!(
                    constraints.matches(answer),
                    "{answer} eliminated by its own feedback for {guess}"
                );
            }
        }
    }

    #[test]
    fn test_reduce_history_counts_each_step() {
        let list = words(&["masse", "basse", "lasse", "mases", "crane", "sassy"]);
        let (counts, remaining) = reduce_history(&list, "masse", ["basse", "masse"]);
        assert_eq!(counts.len(), 2);
        assert!(counts[0] >= counts[1]);
        assert_eq!(remaining, words(&["masse"]));
    }
}
