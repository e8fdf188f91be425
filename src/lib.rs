// Library interface for the Words with Melvins league backend.
// The binary and the integration tests both drive it through these modules.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod hard_mode;
pub mod leagues;
pub mod logging;
pub mod model;
pub mod puzzles;
pub mod scheduler;
pub mod solver;
pub mod store;
pub mod wordbank;

// Re-export the core game functions.
pub use app::App;
pub use error::{RejectReason, WwmError};
pub use solver::{Constraints, Verdict, evaluate, filter_candidates};
pub use store::{MemoryStore, Store};
pub use wordbank::{WordCache, load_wordbank_from_file, load_wordbank_from_str};
