use crate::geo::LatLon;
use crate::pool::{CandidatePool, Target};
use crate::scoring::RoundResult;
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TOTAL_ROUNDS: u32 = 10;
pub const DEFAULT_ROUND_SECS: u32 = 30;
pub const DEFAULT_RESULT_DISPLAY: Duration = Duration::from_secs(3);

/// Longest round clock a config may ask for
pub const MAX_ROUND_SECS: u32 = 3600;
/// Longest pause on a round result a config may ask for
pub const MAX_RESULT_DISPLAY_SECS: u64 = 600;

/// Countdown tick period
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// What a round timeout does with a marker the player placed but never submitted
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TimeoutPolicy {
    /// The round scores nothing
    #[default]
    Forfeit,
    /// The placed marker earns distance points
    ScorePlacedGuess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub total_rounds: u32,
    pub round_secs: u32,
    pub result_display: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            round_secs: DEFAULT_ROUND_SECS,
            result_display: DEFAULT_RESULT_DISPLAY,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GameState {
    Setup,
    Playing,
    Finished,
}

/// Identifies a countdown or a pending delayed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum RoundPhase {
    AwaitingGuess,
    /// The round is scored and the answer is on display until `advance` fires
    ShowingResult { advance: TimerId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub target: Target,
    pub guess: Option<LatLon>,
    pub result: RoundResult,
}

/// State of one play-through. Only the round engine produces new sessions.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub(crate) config: SessionConfig,
    pub(crate) state: GameState,
    pub(crate) round: u32,
    pub(crate) score: u32,
    pub(crate) time_remaining_secs: u32,
    pub(crate) target: Option<Target>,
    pub(crate) marker: Option<LatLon>,
    pub(crate) phase: RoundPhase,
    pub(crate) history: Vec<RoundRecord>,
    pub(crate) pool: CandidatePool,
    pub(crate) rng: StdRng,
    pub(crate) countdown: Option<TimerId>,
    pub(crate) next_timer: u64,
}

impl GameSession {
    pub fn new(config: SessionConfig, pool: CandidatePool) -> Self {
        Self::with_rng(config, pool, StdRng::from_entropy())
    }

    /// Deterministic target order for a given seed
    pub fn seeded(config: SessionConfig, pool: CandidatePool, seed: u64) -> Self {
        Self::with_rng(config, pool, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SessionConfig, pool: CandidatePool, rng: StdRng) -> Self {
        let time_remaining_secs = config.round_secs;
        Self {
            config,
            state: GameState::Setup,
            round: 0,
            score: 0,
            time_remaining_secs,
            target: None,
            marker: None,
            phase: RoundPhase::AwaitingGuess,
            history: Vec::new(),
            pool,
            rng,
            countdown: None,
            next_timer: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_rounds(&self) -> u32 {
        self.config.total_rounds
    }

    /// Rounds still to be played after the current one
    pub fn rounds_remaining(&self) -> u32 {
        match self.state {
            GameState::Setup => self.config.total_rounds,
            GameState::Playing => self.config.total_rounds.saturating_sub(self.round),
            GameState::Finished => 0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Guess placed on the map but not yet submitted
    pub fn marker(&self) -> Option<LatLon> {
        self.marker
    }

    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    pub fn is_showing_result(&self) -> bool {
        matches!(self.phase, RoundPhase::ShowingResult { .. })
    }

    /// Scored rounds of the current (or just finished) game
    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn last_round(&self) -> Option<&RoundRecord> {
        self.history.last()
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    pub fn countdown(&self) -> Option<TimerId> {
        self.countdown
    }

    pub fn pending_advance(&self) -> Option<TimerId> {
        match self.phase {
            RoundPhase::ShowingResult { advance } => Some(advance),
            RoundPhase::AwaitingGuess => None,
        }
    }

    pub(crate) fn allocate_timer(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId(self.next_timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.total_rounds, 10);
        assert_eq!(config.round_secs, 30);
        assert_eq!(config.result_display, Duration::from_secs(3));
        assert_eq!(config.timeout_policy, TimeoutPolicy::Forfeit);
    }

    #[test]
    fn test_new_session_is_in_setup() {
        let session = GameSession::new(SessionConfig::default(), CandidatePool::default());
        assert_eq!(session.state(), GameState::Setup);
        assert_eq!(session.round(), 0);
        assert_eq!(session.score(), 0);
        assert_eq!(session.time_remaining_secs(), 30);
        assert!(session.target().is_none());
        assert!(session.countdown().is_none());
        assert!(session.pending_advance().is_none());
        assert_eq!(session.rounds_remaining(), 10);
    }

    #[test]
    fn test_timer_ids_are_unique() {
        let mut session = GameSession::new(SessionConfig::default(), CandidatePool::default());
        let a = session.allocate_timer();
        let b = session.allocate_timer();
        assert_ne!(a, b);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(GameState::Setup.to_string(), "setup");
        assert_eq!(GameState::Playing.to_string(), "playing");
        assert_eq!(GameState::Finished.to_string(), "finished");
        assert_eq!(TimeoutPolicy::ScorePlacedGuess.to_string(), "score-placed-guess");
    }
}
