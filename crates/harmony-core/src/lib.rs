//! Harmony Hub wellness core.
//!
//! Every component takes its store capability at construction and the
//! signed-in user per call. Components that show live data own at most one
//! subscription at a time and expose `next_update` / `poll_updates` to fold
//! incoming snapshots into their cached projection.

pub mod breathing;
pub mod chat;
pub mod community;
pub mod error;
pub mod feed;
pub mod gratitude;
mod live;
pub mod mood;
pub mod seed;

pub use breathing::{BreathingMode, BreathingSession, MODES, Step, TickOutcome};
pub use chat::GroupChat;
pub use community::CommunityDirectory;
pub use error::{CoreError, ValidationError};
pub use feed::{REACTION_EMOJIS, ReflectionFeed};
pub use gratitude::GratitudeJournal;
pub use mood::MoodLog;
pub use seed::{SeedOutcome, ensure_defaults};
