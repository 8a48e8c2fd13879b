//! Playable games
//!
//! Each game owns its board and entities and implements `ArcadeGame`; the
//! widget host supplies timing, input, persistence and the surface.

pub mod asteroids;
pub mod frogger;
pub mod missile_command;
pub mod snake;
pub mod space_invaders;
pub mod tetris;

pub use asteroids::Asteroids;
pub use frogger::Frogger;
pub use missile_command::MissileCommand;
pub use snake::Snake;
pub use space_invaders::SpaceInvaders;
pub use tetris::Tetris;
