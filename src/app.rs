use crate::config::Settings;
use crate::store::Store;
use crate::wordbank::WordCache;

/// Everything an operation needs: the store, the word list cache and the
/// settings. Built once per process and passed by reference.
#[derive(Debug)]
pub struct App<S> {
    pub store: S,
    pub words: WordCache,
    pub settings: Settings,
}

impl<S: Store> App<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self {
            store,
            words: WordCache::new(&settings.data_dir),
            settings,
        }
    }
}
