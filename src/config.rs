use std::path::PathBuf;

pub const DEFAULT_ACCEPT_LIST: &str = "accept.txt";
pub const DEFAULT_SOURCE_LIST: &str = "answers.txt";

/// Runtime settings shared by the scheduler and the play flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the newline-delimited word list files.
    pub data_dir: PathBuf,
    /// JSON snapshot used by the command line store.
    pub store_path: PathBuf,
    pub default_accept_list: String,
    pub default_source_list: String,
    pub tick_interval_minutes: u32,
    /// How far past `now` series and answers are generated.
    pub lookahead_days: u32,
    /// How far back prior answers are excluded when picking a new one.
    pub answer_lookback_days: u32,
    pub random_word_attempts: usize,
    pub parallel_leagues: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_path: default_store_path(),
            default_accept_list: DEFAULT_ACCEPT_LIST.to_string(),
            default_source_list: DEFAULT_SOURCE_LIST.to_string(),
            tick_interval_minutes: 10,
            lookahead_days: 7,
            answer_lookback_days: 90,
            random_word_attempts: 100,
            parallel_leagues: false,
        }
    }
}

impl Settings {
    pub fn with_data_dir<P: Into<PathBuf>>(mut self, data_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

fn app_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("wwm"))
}

/// `<platform data dir>/wwm/data`, or `./data` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    app_dir().map_or_else(|| PathBuf::from("data"), |dir| dir.join("data"))
}

pub fn default_store_path() -> PathBuf {
    app_dir().map_or_else(|| PathBuf::from("wwm-store.json"), |dir| dir.join("store.json"))
}
