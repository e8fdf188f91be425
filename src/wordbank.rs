use crate::error::WordListError;
use crate::info_log;
use dashmap::DashMap;
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Words of one length taken from one list file, in file order.
#[derive(Debug, Default)]
pub struct WordList {
    words: Vec<String>,
    index: HashSet<String>,
}

impl WordList {
    pub fn new(words: Vec<String>) -> Self {
        let index = words.iter().cloned().collect();
        Self { words, index }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Parses a newline-delimited list, keeping lowercase ascii words of `length`.
pub fn load_wordbank_from_str(data: &str, length: usize) -> Vec<String> {
    data.lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|word| word.len() == length && word.chars().all(|c| c.is_ascii_alphabetic()))
        .collect()
}

pub fn load_wordbank_from_file<P: AsRef<Path>>(
    path: P,
    length: usize,
) -> Result<Vec<String>, WordListError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| WordListError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(load_wordbank_from_str(&data, length))
}

/// Process-wide cache of word lists keyed by `(list name, word length)`.
///
/// Lists are static for the life of the process, so entries are never
/// evicted. Two threads racing on a cold key may both read the file; the
/// first insert wins and the other copy is dropped.
#[derive(Debug)]
pub struct WordCache {
    root: PathBuf,
    lists: DashMap<(String, usize), Arc<WordList>>,
}

impl WordCache {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            lists: DashMap::new(),
        }
    }

    pub fn load_words(&self, length: usize, list: &str) -> Result<Arc<WordList>, WordListError> {
        let key = (list.to_string(), length);
        if let Some(cached) = self.lists.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let words = load_wordbank_from_file(self.root.join(list), length)?;
        log::info!("Loaded word list {list} length {length}: {} words", words.len());
        let loaded = Arc::new(WordList::new(words));
        Ok(Arc::clone(self.lists.entry(key).or_insert(loaded).value()))
    }

    /// Whether `word` is in `list`, looked up among words of the same length.
    pub fn contains_word(&self, word: &str, list: &str) -> Result<bool, WordListError> {
        let word = word.to_lowercase();
        Ok(self.load_words(word.len(), list)?.contains(&word))
    }

    pub fn pick_random_word(
        &self,
        length: usize,
        list: &str,
        excluded: &HashSet<String>,
        attempts: usize,
    ) -> Result<String, WordListError> {
        self.pick_random_word_with(&mut rand::thread_rng(), length, list, excluded, attempts)
    }

    /// Samples up to `attempts` times for a word not in `excluded`. When every
    /// sample is excluded the last one is returned anyway.
    pub fn pick_random_word_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        length: usize,
        list: &str,
        excluded: &HashSet<String>,
        attempts: usize,
    ) -> Result<String, WordListError> {
        let words = self.load_words(length, list)?;
        if words.is_empty() {
            return Err(WordListError::Empty {
                list: list.to_string(),
                length,
            });
        }

        let mut picked = &words.words()[rng.gen_range(0..words.len())];
        for _ in 1..attempts.max(1) {
            if !excluded.contains(picked) {
                break;
            }
            picked = &words.words()[rng.gen_range(0..words.len())];
        }
        if excluded.contains(picked) {
            info_log!("Every sampled word from {list} was excluded, returning {picked}");
        }
        Ok(picked.clone())
    }
}
