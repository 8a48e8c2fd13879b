//! Game state and phase transitions
//!
//! `GameState` is the single owner of phase, score, lives and level. Every
//! mutation goes through a transition method that checks the edge is legal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the first qualifying input
    Ready,
    /// Active gameplay, ticks execute
    Running,
    /// Ticks suspended, last frame redrawn
    Paused,
    /// Board cleared; resumes `Running` at the next level
    Won,
    /// Run ended (terminal)
    GameOver,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Ready => "ready",
            GamePhase::Running => "running",
            GamePhase::Paused => "paused",
            GamePhase::Won => "won",
            GamePhase::GameOver => "game_over",
        }
    }
}

/// A phase change that is not one of the legal edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: GamePhase,
    pub to: GamePhase,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "illegal phase transition {} -> {}",
            self.from.as_str(),
            self.to.as_str()
        )
    }
}

impl std::error::Error for TransitionError {}

/// Shared per-instance game state (phase, score, lives, level)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: GamePhase,
    score: u64,
    lives: u32,
    level: u32,
    /// Simulation ticks executed while running
    pub frame_count: u64,
}

impl GameState {
    /// Fresh state in `Ready` at level 1
    pub fn new(lives: u32) -> Self {
        Self {
            phase: GamePhase::Ready,
            score: 0,
            lives,
            level: 1,
            frame_count: 0,
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_running(&self) -> bool {
        self.phase == GamePhase::Running
    }

    pub fn is_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    fn transition(&mut self, allowed: bool, to: GamePhase) -> Result<(), TransitionError> {
        if !allowed {
            let err = TransitionError {
                from: self.phase,
                to,
            };
            log::debug!("{}", err);
            return Err(err);
        }
        self.phase = to;
        Ok(())
    }

    /// `Ready -> Running`
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(self.phase == GamePhase::Ready, GamePhase::Running)
    }

    /// `Running <-> Paused`. Returns the phase after the toggle.
    pub fn toggle_pause(&mut self) -> Result<GamePhase, TransitionError> {
        match self.phase {
            GamePhase::Running => self.phase = GamePhase::Paused,
            GamePhase::Paused => self.phase = GamePhase::Running,
            from => {
                let err = TransitionError {
                    from,
                    to: GamePhase::Paused,
                };
                log::debug!("{}", err);
                return Err(err);
            }
        }
        Ok(self.phase)
    }

    /// `Running -> GameOver`
    pub fn game_over(&mut self) -> Result<(), TransitionError> {
        self.transition(self.phase == GamePhase::Running, GamePhase::GameOver)
    }

    /// `Running -> Won`
    pub fn win(&mut self) -> Result<(), TransitionError> {
        self.transition(self.phase == GamePhase::Running, GamePhase::Won)
    }

    /// `Won -> Running` with the level incremented. Score carries forward.
    pub fn advance_level(&mut self) -> Result<u32, TransitionError> {
        self.transition(self.phase == GamePhase::Won, GamePhase::Running)?;
        self.level += 1;
        log::info!("Level {} (score {})", self.level, self.score);
        Ok(self.level)
    }

    /// Add points. Only counts while running, so the score never moves
    /// outside active play.
    pub fn add_score(&mut self, points: u64) {
        if self.phase == GamePhase::Running {
            self.score = self.score.saturating_add(points);
        }
    }

    /// Set the level directly (used by games whose level derives from progress)
    pub fn set_level(&mut self, level: u32) {
        if self.phase == GamePhase::Running && level > self.level {
            self.level = level;
        }
    }

    /// Remove one life. Returns the remaining count.
    pub fn lose_life(&mut self) -> u32 {
        if self.phase == GamePhase::Running {
            self.lives = self.lives.saturating_sub(1);
        }
        self.lives
    }

    /// Count one executed simulation tick
    pub fn count_frame(&mut self) {
        self.frame_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn running() -> GameState {
        let mut state = GameState::new(3);
        state.start().unwrap();
        state
    }

    #[test]
    fn test_ready_to_running() {
        let mut state = GameState::new(3);
        assert_eq!(state.phase, GamePhase::Ready);
        state.start().unwrap();
        assert_eq!(state.phase, GamePhase::Running);
        // Starting twice is rejected
        assert!(state.start().is_err());
    }

    #[test]
    fn test_pause_is_a_toggle() {
        let mut state = running();
        assert_eq!(state.toggle_pause(), Ok(GamePhase::Paused));
        assert_eq!(state.toggle_pause(), Ok(GamePhase::Running));
    }

    #[test]
    fn test_pause_rejected_outside_play() {
        let mut state = GameState::new(3);
        assert!(state.toggle_pause().is_err());
        assert_eq!(state.phase, GamePhase::Ready);

        let mut state = running();
        state.game_over().unwrap();
        assert!(state.toggle_pause().is_err());
        assert_eq!(state.phase, GamePhase::GameOver);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let mut state = running();
        state.game_over().unwrap();
        assert!(state.start().is_err());
        assert!(state.win().is_err());
        assert!(state.advance_level().is_err());
        state.add_score(100);
        assert_eq!(state.score(), 0);
        assert_eq!(state.lose_life(), 3);
    }

    #[test]
    fn test_win_advances_level_and_keeps_score() {
        let mut state = running();
        state.add_score(500);
        state.win().unwrap();
        assert_eq!(state.advance_level(), Ok(2));
        assert_eq!(state.phase, GamePhase::Running);
        assert_eq!(state.score(), 500);
    }

    #[test]
    fn test_illegal_edges() {
        let mut state = GameState::new(3);
        assert!(state.game_over().is_err());
        assert!(state.win().is_err());

        let mut state = running();
        state.toggle_pause().unwrap();
        assert!(state.game_over().is_err());
        assert!(state.win().is_err());
        assert_eq!(state.phase, GamePhase::Paused);
    }

    #[test]
    fn test_lives_saturate() {
        let mut state = GameState::new(1);
        state.start().unwrap();
        assert_eq!(state.lose_life(), 0);
        assert_eq!(state.lose_life(), 0);
    }

    proptest! {
        #[test]
        fn score_never_decreases(points in proptest::collection::vec(0u64..10_000, 0..50)) {
            let mut state = running();
            let mut last = state.score();
            for p in points {
                state.add_score(p);
                prop_assert!(state.score() >= last);
                last = state.score();
            }
        }
    }
}
