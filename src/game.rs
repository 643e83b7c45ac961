//! Drives a [`GameSession`]: carries out the engine's effects against a
//! wall clock and a leaderboard.

use crate::engine::{Effect, Event, GameError, Step};
use crate::geo::LatLon;
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::runtime::Timers;
use crate::session::GameSession;
use crate::store::{KeyValueStore, StoreError};
use chrono::Utc;
use log::debug;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("could not save the score: {0}")]
    Store(#[from] StoreError),
}

pub struct Game<S: KeyValueStore> {
    session: GameSession,
    leaderboard: Leaderboard<S>,
    timers: Timers,
    saved: Option<Vec<LeaderboardEntry>>,
}

impl<S: KeyValueStore> Game<S> {
    pub fn new(session: GameSession, leaderboard: Leaderboard<S>) -> Self {
        Self {
            session,
            leaderboard,
            timers: Timers::new(),
            saved: None,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn leaderboard(&self) -> &Leaderboard<S> {
        &self.leaderboard
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Board as persisted by the most recent score submission
    pub fn last_saved(&self) -> Option<&[LeaderboardEntry]> {
        self.saved.as_deref()
    }

    /// Feeds one event to the engine and carries out its effects at `now`.
    ///
    /// A score is persisted before the new session is committed, so a failed
    /// save leaves the game finished and the score can be submitted again.
    pub fn dispatch(&mut self, event: Event, now: Instant) -> Result<Vec<Effect>, PlayError> {
        let Step { session, effects } = self.session.apply(event)?;

        let mut saved = None;
        for effect in &effects {
            if let Effect::RecordScore(entry) = effect {
                saved = Some(self.leaderboard.submit(entry.clone())?);
            }
        }

        self.session = session;
        for effect in &effects {
            self.timers.apply(effect, now);
        }
        if saved.is_some() {
            self.saved = saved;
        }
        Ok(effects)
    }

    /// Delivers every timer event due by `now`, each at its own due time
    pub fn poll(&mut self, now: Instant) -> Result<Vec<Effect>, PlayError> {
        let mut all = Vec::new();
        while let Some((at, event)) = self.timers.next_due(now) {
            debug!("timer event {event:?}");
            all.extend(self.dispatch(event, at)?);
        }
        Ok(all)
    }

    pub fn start(&mut self, now: Instant) -> Result<Vec<Effect>, PlayError> {
        self.dispatch(Event::Start, now)
    }

    pub fn place_guess(&mut self, at: LatLon, now: Instant) -> Result<Vec<Effect>, PlayError> {
        self.dispatch(Event::PlaceGuess(at), now)
    }

    pub fn submit_guess(
        &mut self,
        guess: Option<LatLon>,
        now: Instant,
    ) -> Result<Vec<Effect>, PlayError> {
        self.dispatch(Event::SubmitGuess { guess }, now)
    }

    pub fn submit_score(&mut self, name: &str, now: Instant) -> Result<Vec<Effect>, PlayError> {
        self.dispatch(
            Event::SubmitScore {
                name: name.to_string(),
                at: Utc::now(),
            },
            now,
        )
    }

    pub fn reset(&mut self, now: Instant) -> Result<Vec<Effect>, PlayError> {
        self.dispatch(Event::Reset, now)
    }
}
