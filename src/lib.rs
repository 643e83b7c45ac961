// Library surface for the CLI and integration tests.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod game;
pub mod geo;
pub mod history;
pub mod leaderboard;
pub mod pool;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod source;
pub mod store;

pub use engine::{Effect, Event, GameError};
pub use game::{Game, PlayError};
pub use geo::LatLon;
pub use pool::{CandidatePool, Target};
pub use session::{GameSession, GameState, SessionConfig};
