//! Deterministic simulation module
//!
//! All gameplay mechanics shared by the games live here. This module must be
//! pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod collision;
pub mod effects;
pub mod entity;
pub mod state;
pub mod tick;

pub use collision::{
    CollisionEvent, CollisionKind, cell_occupied, circles_overlap, interval_covers,
    point_in_circle, resolve,
};
pub use effects::{EffectKind, Particle, ParticleSystem, ScreenShake};
pub use entity::{Boundary, Entity, EntityId, EntityKind, EntityStore, HitOutcome};
pub use state::{GamePhase, GameState, TransitionError};
pub use tick::{MoveTimer, SpawnTimer, StepReport, step};
