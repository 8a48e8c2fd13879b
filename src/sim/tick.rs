//! Fixed timestep simulation step
//!
//! Movement integration, boundary handling, lifetimes and the timers that
//! gate grid movement and spawning.

use glam::Vec2;
use rand::Rng;

use super::entity::{Boundary, EntityId, EntityStore};
use crate::{Bounds, clamp_position, wrap_position};

/// What one step did to the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Entities whose lifetime ran out (already removed)
    pub expired: Vec<EntityId>,
    /// `DieOnExit` entities that left the board (already removed)
    pub exited: Vec<EntityId>,
    /// Entities that actually changed position
    pub moved: Vec<EntityId>,
    /// Entities whose integration produced a non-finite position
    pub faulted: Vec<EntityId>,
}

/// Advance every entity one tick.
///
/// `position += velocity * speed_factor`, then the entity's boundary policy
/// is applied. Non-finite results are refused: the entity keeps its previous
/// position and its velocity is zeroed.
pub fn step(store: &mut EntityStore, bounds: Bounds, speed_factor: f32) -> StepReport {
    let mut report = StepReport::default();

    for entity in store.iter_mut() {
        if entity.invulnerable > 0 {
            entity.invulnerable -= 1;
        }
        entity.angle += entity.spin;

        if let Some(ticks) = entity.lifetime.as_mut() {
            *ticks = ticks.saturating_sub(1);
            if *ticks == 0 {
                report.expired.push(entity.id());
                continue;
            }
        }

        if entity.vel == Vec2::ZERO {
            continue;
        }

        let next = entity.pos + entity.vel * speed_factor;
        if !next.is_finite() {
            log::warn!(
                "Entity {} produced non-finite position, velocity reset",
                entity.id()
            );
            entity.vel = Vec2::ZERO;
            report.faulted.push(entity.id());
            continue;
        }

        entity.pos = match entity.boundary {
            Boundary::Wrap => wrap_position(next, bounds),
            Boundary::Clamp => clamp_position(next, bounds),
            Boundary::DieOnExit => {
                if !bounds.contains(next) {
                    report.exited.push(entity.id());
                }
                next
            }
        };
        report.moved.push(entity.id());
    }

    store.remove_all(&report.expired);
    store.remove_all(&report.exited);
    report
}

/// Gates discrete grid moves: fires once per `interval_ms` of accumulated time
#[derive(Debug, Clone, PartialEq)]
pub struct MoveTimer {
    interval_ms: f32,
    elapsed_ms: f32,
}

impl MoveTimer {
    pub fn new(interval_ms: f32) -> Self {
        Self {
            interval_ms: interval_ms.max(1.0),
            elapsed_ms: 0.0,
        }
    }

    pub fn interval_ms(&self) -> f32 {
        self.interval_ms
    }

    pub fn set_interval(&mut self, interval_ms: f32) {
        self.interval_ms = interval_ms.max(1.0);
    }

    /// Accumulate time; returns true when a move is due
    pub fn advance(&mut self, dt_ms: f32) -> bool {
        self.elapsed_ms += dt_ms;
        if self.elapsed_ms >= self.interval_ms {
            self.elapsed_ms -= self.interval_ms;
            // Never carry more than one pending move
            self.elapsed_ms = self.elapsed_ms.min(self.interval_ms);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.elapsed_ms = 0.0;
    }
}

/// Fires after `base + random() * variance` ticks, then re-arms with fresh jitter
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnTimer {
    base: u32,
    variance: u32,
    remaining: u32,
}

impl SpawnTimer {
    pub fn new(base: u32, variance: u32, rng: &mut impl Rng) -> Self {
        let mut timer = Self {
            base,
            variance,
            remaining: 0,
        };
        timer.rearm(rng);
        timer
    }

    fn rearm(&mut self, rng: &mut impl Rng) {
        let jitter = if self.variance > 0 {
            rng.random_range(0..=self.variance)
        } else {
            0
        };
        self.remaining = (self.base + jitter).max(1);
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Count down one tick; true when it fires
    pub fn tick(&mut self, rng: &mut impl Rng) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.rearm(rng);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{Entity, EntityKind};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const BOARD: Bounds = Bounds::new(100.0, 100.0);

    fn spawn(store: &mut EntityStore, pos: Vec2, vel: Vec2, boundary: Boundary) -> EntityId {
        store.spawn(Entity::new(EntityKind::Hostile, pos, vel, 1.0).with_boundary(boundary))
    }

    #[test]
    fn test_integrates_velocity() {
        let mut store = EntityStore::new();
        let id = spawn(&mut store, Vec2::new(10.0, 10.0), Vec2::new(2.0, -1.0), Boundary::Wrap);
        let report = step(&mut store, BOARD, 1.0);
        assert_eq!(store.get(id).unwrap().pos, Vec2::new(12.0, 9.0));
        assert_eq!(report.moved, vec![id]);
    }

    #[test]
    fn test_speed_factor_scales_motion() {
        let mut store = EntityStore::new();
        let id = spawn(&mut store, Vec2::new(10.0, 10.0), Vec2::new(2.0, 0.0), Boundary::Wrap);
        step(&mut store, BOARD, 2.5);
        assert_eq!(store.get(id).unwrap().pos.x, 15.0);
    }

    #[test]
    fn test_wrap_boundary() {
        let mut store = EntityStore::new();
        let id = spawn(&mut store, Vec2::new(99.0, 50.0), Vec2::new(1.0, 0.0), Boundary::Wrap);
        step(&mut store, BOARD, 1.0);
        // Exactly at the far edge wraps to 0
        assert_eq!(store.get(id).unwrap().pos.x, 0.0);
    }

    #[test]
    fn test_clamp_boundary() {
        let mut store = EntityStore::new();
        let id = spawn(&mut store, Vec2::new(1.0, 50.0), Vec2::new(-5.0, 0.0), Boundary::Clamp);
        step(&mut store, BOARD, 1.0);
        assert_eq!(store.get(id).unwrap().pos.x, 0.0);
    }

    #[test]
    fn test_die_on_exit_edge_rules() {
        let mut store = EntityStore::new();
        // Lands exactly on 0: still inside
        let stays = spawn(&mut store, Vec2::new(1.0, 50.0), Vec2::new(-1.0, 0.0), Boundary::DieOnExit);
        // Lands exactly on the far edge: outside
        let leaves = spawn(&mut store, Vec2::new(99.0, 50.0), Vec2::new(1.0, 0.0), Boundary::DieOnExit);
        let report = step(&mut store, BOARD, 1.0);
        assert!(store.get(stays).is_some());
        assert!(store.get(leaves).is_none());
        assert_eq!(report.exited, vec![leaves]);
    }

    #[test]
    fn test_zero_velocity_never_moves() {
        let mut store = EntityStore::new();
        spawn(&mut store, Vec2::new(5.0, 5.0), Vec2::ZERO, Boundary::Wrap);
        let report = step(&mut store, BOARD, 1.0);
        assert!(report.moved.is_empty());
    }

    #[test]
    fn test_lifetime_expires() {
        let mut store = EntityStore::new();
        let id = store.spawn(
            Entity::new(EntityKind::Projectile, Vec2::ONE, Vec2::X, 1.0).with_lifetime(2),
        );
        assert!(step(&mut store, BOARD, 1.0).expired.is_empty());
        let report = step(&mut store, BOARD, 1.0);
        assert_eq!(report.expired, vec![id]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_non_finite_velocity_is_guarded() {
        let mut store = EntityStore::new();
        let id = spawn(&mut store, Vec2::new(5.0, 5.0), Vec2::new(f32::NAN, 0.0), Boundary::Wrap);
        let report = step(&mut store, BOARD, 1.0);
        let e = store.get(id).unwrap();
        assert_eq!(e.pos, Vec2::new(5.0, 5.0));
        assert_eq!(e.vel, Vec2::ZERO);
        assert_eq!(report.faulted, vec![id]);
    }

    #[test]
    fn test_move_timer() {
        let mut timer = MoveTimer::new(150.0);
        assert!(!timer.advance(100.0));
        assert!(timer.advance(60.0));
        assert!(!timer.advance(10.0));
    }

    #[test]
    fn test_spawn_timer_jitter_range() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut timer = SpawnTimer::new(10, 5, &mut rng);
        for _ in 0..20 {
            let armed = timer.remaining();
            assert!((10..=15).contains(&armed));
            let mut fired_after = 0;
            while !timer.tick(&mut rng) {
                fired_after += 1;
            }
            assert_eq!(fired_after + 1, armed);
        }
    }

    proptest! {
        #[test]
        fn wrap_and_clamp_stay_in_bounds(
            x in 0.0f32..100.0, y in 0.0f32..100.0,
            vx in -500.0f32..500.0, vy in -500.0f32..500.0,
            clamp in any::<bool>(),
        ) {
            let mut store = EntityStore::new();
            let boundary = if clamp { Boundary::Clamp } else { Boundary::Wrap };
            let id = spawn(&mut store, Vec2::new(x, y), Vec2::new(vx, vy), boundary);
            step(&mut store, BOARD, 1.0);
            prop_assert!(BOARD.contains(store.get(id).unwrap().pos));
        }
    }
}
