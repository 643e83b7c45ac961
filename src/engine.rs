//! Round engine: a session plus an event yields the next session and the
//! effects its driver has to carry out (timers, leaderboard writes).

use crate::geo::LatLon;
use crate::leaderboard::{LeaderboardEntry, MAX_NAME_CHARS};
use crate::pool::{CandidatePool, Target};
use crate::scoring::score_round;
use crate::session::{
    GameSession, GameState, RoundPhase, RoundRecord, TimeoutPolicy, TimerId, TICK_PERIOD,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Replace the candidate pool (setup only)
    LoadPool(Vec<Target>),
    Start,
    /// One second of the countdown identified by `timer` has elapsed
    Tick { timer: TimerId },
    /// Put (or move) the marker on the map
    PlaceGuess(LatLon),
    /// Resolve the round with `guess`, or with the placed marker when `None`
    SubmitGuess { guess: Option<LatLon> },
    /// The result display identified by `timer` is over
    Advance { timer: TimerId },
    SubmitScore { name: String, at: DateTime<Utc> },
    /// Abandon the session and return to setup
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `Event::Tick { timer }` every `period`
    StartCountdown { timer: TimerId, period: Duration },
    /// Stop the countdown or drop the scheduled event with this id
    Cancel { timer: TimerId },
    /// Deliver `event` once after `after`
    Schedule {
        timer: TimerId,
        after: Duration,
        event: Event,
    },
    RoundStarted { round: u32, target: Target },
    RoundResolved(RoundRecord),
    GameFinished { score: u32 },
    RecordScore(LeaderboardEntry),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("not enough targets for a game: {available} available, {required} required")]
    PoolTooSmall { available: usize, required: usize },

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: GameState,
    },

    #[error("this round has already been scored")]
    RoundAlreadyResolved,

    #[error("please enter your name")]
    EmptyName,

    #[error("name is too long (maximum {max} characters)")]
    NameTooLong { max: usize },

    #[error("ran out of targets")]
    PoolExhausted,
}

/// Outcome of applying one event
#[derive(Debug, Clone)]
pub struct Step {
    pub session: GameSession,
    pub effects: Vec<Effect>,
}

impl Step {
    fn unchanged(session: &GameSession) -> Self {
        Step {
            session: session.clone(),
            effects: Vec::new(),
        }
    }
}

impl GameSession {
    /// Computes the session that follows `event`. `self` is left untouched, so a
    /// rejected event leaves the caller with its previous state.
    pub fn apply(&self, event: Event) -> Result<Step, GameError> {
        match event {
            Event::LoadPool(targets) => self.load_pool(targets),
            Event::Start => self.start(),
            Event::Tick { timer } => self.on_tick(timer),
            Event::PlaceGuess(at) => self.place_guess(at),
            Event::SubmitGuess { guess } => self.resolve_by_player(guess),
            Event::Advance { timer } => self.on_advance(timer),
            Event::SubmitScore { name, at } => self.record_score(&name, at),
            Event::Reset => Ok(self.reset()),
        }
    }

    /// Applies `event` in place and returns its effects
    pub fn dispatch(&mut self, event: Event) -> Result<Vec<Effect>, GameError> {
        let Step { session, effects } = self.apply(event)?;
        *self = session;
        Ok(effects)
    }

    pub fn start_game(&mut self) -> Result<Vec<Effect>, GameError> {
        self.dispatch(Event::Start)
    }

    /// Advances the live countdown by one second; a no-op when none is running
    pub fn tick(&mut self) -> Result<Vec<Effect>, GameError> {
        match self.countdown {
            Some(timer) => self.dispatch(Event::Tick { timer }),
            None => Ok(Vec::new()),
        }
    }

    pub fn submit_guess(&mut self, guess: Option<LatLon>) -> Result<Vec<Effect>, GameError> {
        self.dispatch(Event::SubmitGuess { guess })
    }

    /// Ends the result display right away instead of waiting for its timer
    pub fn advance_round(&mut self) -> Result<Vec<Effect>, GameError> {
        match self.pending_advance() {
            Some(timer) => self.dispatch(Event::Advance { timer }),
            None => Ok(Vec::new()),
        }
    }

    pub fn submit_score(&mut self, name: &str) -> Result<Vec<Effect>, GameError> {
        self.dispatch(Event::SubmitScore {
            name: name.to_string(),
            at: Utc::now(),
        })
    }

    fn require(&self, state: GameState, action: &'static str) -> Result<(), GameError> {
        if self.state == state {
            Ok(())
        } else {
            Err(GameError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn require_open_round(&self, action: &'static str) -> Result<(), GameError> {
        self.require(GameState::Playing, action)?;
        match self.phase {
            RoundPhase::AwaitingGuess => Ok(()),
            RoundPhase::ShowingResult { .. } => Err(GameError::RoundAlreadyResolved),
        }
    }

    fn load_pool(&self, targets: Vec<Target>) -> Result<Step, GameError> {
        self.require(GameState::Setup, "change targets")?;
        let mut next = self.clone();
        next.pool = CandidatePool::new(targets);
        debug!("pool loaded with {} targets", next.pool.size());
        Ok(Step {
            session: next,
            effects: Vec::new(),
        })
    }

    fn start(&self) -> Result<Step, GameError> {
        self.require(GameState::Setup, "start a game")?;

        let required = self.config.total_rounds as usize;
        if self.pool.size() < required {
            return Err(GameError::PoolTooSmall {
                available: self.pool.size(),
                required,
            });
        }

        let mut next = self.clone();
        let mut effects = Vec::new();
        next.state = GameState::Playing;
        next.round = 1;
        next.score = 0;
        next.history.clear();
        next.begin_round(&mut effects)?;

        info!(
            "game started: {} rounds from {} targets",
            next.config.total_rounds, self.pool.size()
        );
        Ok(Step {
            session: next,
            effects,
        })
    }

    /// Draws the next target and restarts the clock
    fn begin_round(&mut self, effects: &mut Vec<Effect>) -> Result<(), GameError> {
        let target = self
            .pool
            .pick_random(&mut self.rng)
            .ok_or(GameError::PoolExhausted)?;

        if let Some(old) = self.countdown.take() {
            effects.push(Effect::Cancel { timer: old });
        }
        let timer = self.allocate_timer();
        self.countdown = Some(timer);
        self.time_remaining_secs = self.config.round_secs;
        self.marker = None;
        self.phase = RoundPhase::AwaitingGuess;

        debug!("round {} target: {}", self.round, target.name);
        effects.push(Effect::StartCountdown {
            timer,
            period: TICK_PERIOD,
        });
        effects.push(Effect::RoundStarted {
            round: self.round,
            target: target.clone(),
        });
        self.target = Some(target);
        Ok(())
    }

    fn on_tick(&self, timer: TimerId) -> Result<Step, GameError> {
        let live = self.state == GameState::Playing
            && self.countdown == Some(timer)
            && self.phase == RoundPhase::AwaitingGuess;
        if !live {
            debug!("ignoring stale tick {timer:?}");
            return Ok(Step::unchanged(self));
        }

        let mut next = self.clone();
        next.time_remaining_secs = next.time_remaining_secs.saturating_sub(1);
        if next.time_remaining_secs > 0 {
            return Ok(Step {
                session: next,
                effects: Vec::new(),
            });
        }

        let guess = match next.config.timeout_policy {
            TimeoutPolicy::Forfeit => None,
            TimeoutPolicy::ScorePlacedGuess => next.marker,
        };
        debug!("round {} timed out", next.round);
        let effects = next.resolve(guess);
        Ok(Step {
            session: next,
            effects,
        })
    }

    fn place_guess(&self, at: LatLon) -> Result<Step, GameError> {
        self.require_open_round("place a guess")?;
        let mut next = self.clone();
        next.marker = Some(at);
        Ok(Step {
            session: next,
            effects: Vec::new(),
        })
    }

    fn resolve_by_player(&self, guess: Option<LatLon>) -> Result<Step, GameError> {
        self.require_open_round("submit a guess")?;
        let mut next = self.clone();
        let guess = guess.or(next.marker);
        let effects = next.resolve(guess);
        Ok(Step {
            session: next,
            effects,
        })
    }

    /// Scores the open round and schedules the move to the next one
    fn resolve(&mut self, guess: Option<LatLon>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(timer) = self.countdown.take() {
            effects.push(Effect::Cancel { timer });
        }

        // A session in Playing always has a target
        let Some(target) = self.target.clone() else {
            return effects;
        };

        let result = score_round(&target, guess, self.time_remaining_secs);
        self.score = self.score.saturating_add(result.round_score);
        self.marker = guess;

        let record = RoundRecord {
            round: self.round,
            target,
            guess,
            result,
        };
        info!(
            "round {}/{}: {} scored {} ({:.2} km)",
            record.round,
            self.config.total_rounds,
            record.target.name,
            result.round_score,
            result.distance_km
        );
        self.history.push(record.clone());
        effects.push(Effect::RoundResolved(record));

        let advance = self.allocate_timer();
        self.phase = RoundPhase::ShowingResult { advance };
        effects.push(Effect::Schedule {
            timer: advance,
            after: self.config.result_display,
            event: Event::Advance { timer: advance },
        });

        effects
    }

    fn on_advance(&self, timer: TimerId) -> Result<Step, GameError> {
        if self.state != GameState::Playing || self.pending_advance() != Some(timer) {
            debug!("ignoring stale advance {timer:?}");
            return Ok(Step::unchanged(self));
        }

        let mut next = self.clone();
        let mut effects = Vec::new();

        if next.round < next.config.total_rounds {
            next.round += 1;
            next.begin_round(&mut effects)?;
        } else {
            next.state = GameState::Finished;
            next.phase = RoundPhase::AwaitingGuess;
            next.target = None;
            next.marker = None;
            info!("game finished with {} points", next.score);
            effects.push(Effect::GameFinished { score: next.score });
        }

        Ok(Step {
            session: next,
            effects,
        })
    }

    fn record_score(&self, name: &str, at: DateTime<Utc>) -> Result<Step, GameError> {
        self.require(GameState::Finished, "submit a score")?;

        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(GameError::NameTooLong {
                max: MAX_NAME_CHARS,
            });
        }

        let entry = LeaderboardEntry::new(name, self.score, at);
        let mut next = self.reset().session;
        next.history.clear();

        Ok(Step {
            session: next,
            effects: vec![Effect::RecordScore(entry)],
        })
    }

    /// Back to setup with the remaining pool, cancelling outstanding timers
    fn reset(&self) -> Step {
        let mut next = self.clone();
        let mut effects = Vec::new();

        if let Some(timer) = next.countdown.take() {
            effects.push(Effect::Cancel { timer });
        }
        if let Some(timer) = next.pending_advance() {
            effects.push(Effect::Cancel { timer });
        }

        next.state = GameState::Setup;
        next.phase = RoundPhase::AwaitingGuess;
        next.round = 0;
        next.score = 0;
        next.target = None;
        next.marker = None;
        next.time_remaining_secs = next.config.round_secs;

        Step {
            session: next,
            effects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use assert_matches::assert_matches;

    fn pool(n: usize) -> CandidatePool {
        CandidatePool::new(
            (0..n)
                .map(|i| {
                    Target::new(
                        format!("Katu {i}"),
                        LatLon::new(60.44 + i as f64 * 0.001, 22.25),
                    )
                })
                .collect(),
        )
    }

    fn started(n: usize) -> GameSession {
        let mut session = GameSession::seeded(SessionConfig::default(), pool(n), 3);
        session.start_game().unwrap();
        session
    }

    fn target_location(session: &GameSession) -> LatLon {
        session.target().unwrap().location
    }

    #[test]
    fn test_start_game() {
        let session = started(15);
        assert_eq!(session.state(), GameState::Playing);
        assert_eq!(session.round(), 1);
        assert_eq!(session.score(), 0);
        assert_eq!(session.time_remaining_secs(), 30);
        assert!(session.target().is_some());
        assert_eq!(session.pool().size(), 14);
        assert_eq!(session.rounds_remaining(), 9);
    }

    #[test]
    fn test_start_game_effects() {
        let mut session = GameSession::seeded(SessionConfig::default(), pool(10), 1);
        let effects = session.start_game().unwrap();
        let timer = session.countdown().unwrap();
        assert_eq!(
            effects[0],
            Effect::StartCountdown {
                timer,
                period: Duration::from_secs(1)
            }
        );
        assert_matches!(&effects[1], Effect::RoundStarted { round: 1, .. });
    }

    #[test]
    fn test_start_with_small_pool_stays_in_setup() {
        let mut session = GameSession::seeded(SessionConfig::default(), pool(9), 1);
        let err = session.start_game().unwrap_err();
        assert_eq!(
            err,
            GameError::PoolTooSmall {
                available: 9,
                required: 10
            }
        );
        assert_eq!(session.state(), GameState::Setup);
        assert_eq!(session.pool().size(), 9);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut session = started(12);
        assert_matches!(
            session.start_game(),
            Err(GameError::InvalidState {
                state: GameState::Playing,
                ..
            })
        );
    }

    #[test]
    fn test_perfect_game_scores_1600() {
        let mut session = started(15);
        for round in 1..=10 {
            assert_eq!(session.round(), round);
            let guess = target_location(&session);
            session.submit_guess(Some(guess)).unwrap();
            session.advance_round().unwrap();
        }
        assert_eq!(session.state(), GameState::Finished);
        assert_eq!(session.score(), 10 * (100 + 60));
        assert_eq!(session.history().len(), 10);
    }

    #[test]
    fn test_targets_do_not_repeat() {
        let mut session = started(10);
        let mut seen = std::collections::HashSet::new();
        while session.state() == GameState::Playing {
            assert!(seen.insert(session.target().unwrap().name.clone()));
            session.submit_guess(None).unwrap();
            session.advance_round().unwrap();
        }
        assert_eq!(seen.len(), 10);
        assert!(session.pool().is_empty());
    }

    #[test]
    fn test_tick_counts_down() {
        let mut session = started(10);
        session.tick().unwrap();
        session.tick().unwrap();
        assert_eq!(session.time_remaining_secs(), 28);
    }

    #[test]
    fn test_timeout_after_thirty_ticks() {
        let mut session = started(10);
        let mut resolved = None;
        for _ in 0..30 {
            for effect in session.tick().unwrap() {
                if let Effect::RoundResolved(record) = effect {
                    resolved = Some(record);
                }
            }
        }
        let record = resolved.expect("round should time out");
        assert_eq!(record.result.distance_points, 0);
        assert_eq!(record.result.round_score, 0);
        assert_eq!(record.guess, None);
        assert_eq!(session.time_remaining_secs(), 0);
        assert!(session.is_showing_result());
        assert!(session.countdown().is_none());
    }

    #[test]
    fn test_timeout_forfeits_placed_marker_by_default() {
        let mut session = started(10);
        let at = target_location(&session);
        session.dispatch(Event::PlaceGuess(at)).unwrap();
        for _ in 0..30 {
            session.tick().unwrap();
        }
        assert_eq!(session.last_round().unwrap().result.round_score, 0);
    }

    #[test]
    fn test_timeout_can_score_placed_marker() {
        let config = SessionConfig {
            timeout_policy: TimeoutPolicy::ScorePlacedGuess,
            ..SessionConfig::default()
        };
        let mut session = GameSession::seeded(config, pool(10), 9);
        session.start_game().unwrap();
        let at = target_location(&session);
        session.dispatch(Event::PlaceGuess(at)).unwrap();
        for _ in 0..30 {
            session.tick().unwrap();
        }
        let result = session.last_round().unwrap().result;
        assert_eq!(result.distance_points, 100);
        assert_eq!(result.time_points, 0);
    }

    #[test]
    fn test_submit_uses_placed_marker() {
        let mut session = started(10);
        let at = target_location(&session);
        session.dispatch(Event::PlaceGuess(at)).unwrap();
        session.submit_guess(None).unwrap();
        assert_eq!(session.score(), 160);
    }

    #[test]
    fn test_submit_without_any_guess_scores_zero() {
        let mut session = started(10);
        session.tick().unwrap();
        session.submit_guess(None).unwrap();
        assert_eq!(session.score(), 0);
        assert_eq!(session.last_round().unwrap().guess, None);
    }

    #[test]
    fn test_time_points_use_remaining_time() {
        let mut session = started(10);
        for _ in 0..10 {
            session.tick().unwrap();
        }
        let guess = target_location(&session);
        session.submit_guess(Some(guess)).unwrap();
        assert_eq!(session.score(), 100 + 40);
    }

    #[test]
    fn test_score_saturates_with_huge_round_clock() {
        let config = SessionConfig {
            total_rounds: 2,
            round_secs: u32::MAX,
            ..SessionConfig::default()
        };
        let mut session = GameSession::seeded(config, pool(2), 3);
        session.start_game().unwrap();
        let guess = target_location(&session);
        session.submit_guess(Some(guess)).unwrap();
        assert_eq!(session.score(), u32::MAX);

        session.advance_round().unwrap();
        let guess = target_location(&session);
        session.submit_guess(Some(guess)).unwrap();
        assert_eq!(session.score(), u32::MAX);
    }

    #[test]
    fn test_second_guess_in_same_round_is_rejected() {
        let mut session = started(10);
        session.submit_guess(None).unwrap();
        let before = session.score();
        assert_eq!(
            session.submit_guess(Some(LatLon::new(0.0, 0.0))),
            Err(GameError::RoundAlreadyResolved)
        );
        assert_eq!(
            session.dispatch(Event::PlaceGuess(LatLon::new(0.0, 0.0))),
            Err(GameError::RoundAlreadyResolved)
        );
        assert_eq!(session.score(), before);
    }

    #[test]
    fn test_ticks_ignored_while_showing_result() {
        let mut session = started(10);
        let timer = session.countdown().unwrap();
        session.submit_guess(None).unwrap();
        let effects = session.dispatch(Event::Tick { timer }).unwrap();
        assert!(effects.is_empty());
        assert_eq!(session.time_remaining_secs(), 30);
    }

    #[test]
    fn test_resolve_schedules_advance() {
        let mut session = started(10);
        let countdown = session.countdown().unwrap();
        let effects = session.submit_guess(None).unwrap();
        let advance = session.pending_advance().unwrap();

        assert_eq!(effects[0], Effect::Cancel { timer: countdown });
        assert_matches!(&effects[1], Effect::RoundResolved(r) if r.round == 1);
        assert_eq!(
            effects[2],
            Effect::Schedule {
                timer: advance,
                after: Duration::from_secs(3),
                event: Event::Advance { timer: advance },
            }
        );
    }

    #[test]
    fn test_stale_advance_is_ignored() {
        let mut session = started(10);
        session.submit_guess(None).unwrap();
        let stale = TimerId(9999);
        let effects = session.dispatch(Event::Advance { timer: stale }).unwrap();
        assert!(effects.is_empty());
        assert_eq!(session.round(), 1);
        assert!(session.is_showing_result());
    }

    #[test]
    fn test_advance_starts_next_round_with_fresh_clock() {
        let mut session = started(10);
        session.tick().unwrap();
        session.submit_guess(None).unwrap();
        let effects = session.advance_round().unwrap();

        assert_eq!(session.round(), 2);
        assert_eq!(session.time_remaining_secs(), 30);
        assert!(!session.is_showing_result());
        assert_matches!(effects[0], Effect::StartCountdown { .. });
        assert_matches!(&effects[1], Effect::RoundStarted { round: 2, .. });
    }

    #[test]
    fn test_old_countdown_cannot_tick_new_round() {
        let mut session = started(10);
        let first = session.countdown().unwrap();
        session.submit_guess(None).unwrap();
        session.advance_round().unwrap();

        session.dispatch(Event::Tick { timer: first }).unwrap();
        assert_eq!(session.time_remaining_secs(), 30);
    }

    #[test]
    fn test_reset_cancels_pending_advance() {
        let mut session = started(10);
        session.submit_guess(None).unwrap();
        let advance = session.pending_advance().unwrap();

        let effects = session.dispatch(Event::Reset).unwrap();
        assert_eq!(effects, vec![Effect::Cancel { timer: advance }]);
        assert_eq!(session.state(), GameState::Setup);

        // The delayed advance must not revive the abandoned game
        let effects = session.dispatch(Event::Advance { timer: advance }).unwrap();
        assert!(effects.is_empty());
        assert_eq!(session.state(), GameState::Setup);
        assert_eq!(session.round(), 0);
    }

    #[test]
    fn test_reset_cancels_countdown() {
        let mut session = started(10);
        let countdown = session.countdown().unwrap();
        let effects = session.dispatch(Event::Reset).unwrap();
        assert_eq!(effects, vec![Effect::Cancel { timer: countdown }]);
        assert!(session.countdown().is_none());
    }

    #[test]
    fn test_finish_and_submit_score() {
        let mut session = started(12);
        while session.state() == GameState::Playing {
            let guess = target_location(&session);
            session.submit_guess(Some(guess)).unwrap();
            session.advance_round().unwrap();
        }

        assert_eq!(session.submit_score("   "), Err(GameError::EmptyName));
        assert_eq!(session.state(), GameState::Finished);
        assert_eq!(
            session.submit_score("abcdefghijklmnop"),
            Err(GameError::NameTooLong { max: 15 })
        );

        let effects = session.submit_score("  Aino ").unwrap();
        assert_matches!(
            &effects[..],
            [Effect::RecordScore(entry)] if entry.name == "Aino" && entry.score == 1600
        );
        assert_eq!(session.state(), GameState::Setup);
        assert_eq!(session.score(), 0);
        assert_eq!(session.pool().size(), 2);
    }

    #[test]
    fn test_last_round_emits_game_finished() {
        let config = SessionConfig {
            total_rounds: 1,
            ..SessionConfig::default()
        };
        let mut session = GameSession::seeded(config, pool(3), 5);
        session.start_game().unwrap();
        let guess = target_location(&session);
        session.submit_guess(Some(guess)).unwrap();
        let effects = session.advance_round().unwrap();
        assert_eq!(effects, vec![Effect::GameFinished { score: 160 }]);
        assert!(session.target().is_none());
    }

    #[test]
    fn test_submit_score_outside_finished() {
        let mut session = started(10);
        assert_matches!(
            session.submit_score("Aino"),
            Err(GameError::InvalidState { .. })
        );
    }

    #[test]
    fn test_load_pool_only_in_setup() {
        let mut session = GameSession::seeded(SessionConfig::default(), pool(2), 1);
        session
            .dispatch(Event::LoadPool(pool(11).remaining().to_vec()))
            .unwrap();
        assert_eq!(session.pool().size(), 11);
        session.start_game().unwrap();
        assert_matches!(
            session.dispatch(Event::LoadPool(Vec::new())),
            Err(GameError::InvalidState { .. })
        );
    }

    #[test]
    fn test_apply_leaves_original_untouched() {
        let session = started(10);
        let step = session.apply(Event::SubmitGuess { guess: None }).unwrap();
        assert!(!session.is_showing_result());
        assert!(step.session.is_showing_result());
    }

    #[test]
    fn test_round_stays_in_bounds() {
        let mut session = started(10);
        let mut rounds = Vec::new();
        while session.state() == GameState::Playing {
            rounds.push(session.round());
            session.submit_guess(None).unwrap();
            session.advance_round().unwrap();
        }
        assert_eq!(rounds, (1..=10).collect::<Vec<u32>>());
    }
}
