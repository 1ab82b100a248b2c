#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod database;
pub mod game_clock;
pub mod leaderboard;
pub mod models;
pub mod preferences;
pub mod repository;
pub mod time_of_day;
pub mod votes;

pub use commands::{Command, Reply};
pub use game_clock::{GameClock, SystemClock};
pub use leaderboard::{Leaderboard, Period};
pub use models::{BaitVote, CatchRecord, RankedEntry, SpeciesBreakdown};
pub use repository::{CatchRepository, MemoryRepository, StoreError};
pub use time_of_day::{InvalidTimeValue, TimeOfDay, TimePeriod};
pub use votes::{register_vote, VoteError};
