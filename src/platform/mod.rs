//! Platform abstraction layer
//!
//! Handles the host-facing edges of a game instance:
//! - Keyboard input mapping
//! - Frame scheduling and delayed actions

pub mod input;
pub mod scheduler;

pub use input::{Action, Direction, InputMapper, Intents, KeyBindings, MoveQueue, keycode};
pub use scheduler::{DelayedTasks, FixedTimestep, Scheduler, TaskHandle};
