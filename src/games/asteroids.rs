//! Asteroids
//!
//! Continuous movement on an 800x600 torus. Everything is an entity in the
//! shared store: the ship (player), bullets (projectiles with a lifetime) and
//! rocks (hostiles that split into two smaller rocks until the smallest
//! tier). Clearing the field wins the wave; the next one arrives 2 s later.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::platform::{DelayedTasks, Direction, Intents};
use crate::renderer::{self, Color, RenderSurface};
use crate::sim::{
    CollisionKind, EffectKind, Entity, EntityId, EntityKind, EntityStore, GamePhase, GameState,
    HitOutcome, ParticleSystem, point_in_circle, resolve, step,
};
use crate::widget::ArcadeGame;
use crate::Bounds;

pub const FIELD: Bounds = Bounds::new(800.0, 600.0);
const LIVES: u32 = 3;

const SHIP_SIZE: f32 = 15.0;
const ROTATION_SPEED: f32 = 0.15;
const THRUST_POWER: f32 = 0.3;
const FRICTION: f32 = 0.98;

const BULLET_SPEED: f32 = 8.0;
const BULLET_LIFETIME: u32 = 60;
const MAX_BULLETS: usize = 8;

/// Radius and points per tier, largest first
const ROCK_RADII: [f32; 3] = [60.0, 40.0, 20.0];
const ROCK_POINTS: [u64; 3] = [100, 50, 20];
const SPLIT_COUNT: u8 = 2;
const MAX_WAVE: usize = 8;
/// Fresh rocks never spawn closer than this to the ship
const SAFE_SPAWN_DISTANCE: f32 = 100.0;

const HIT_INVULNERABLE: u32 = 120;
const HYPERSPACE_INVULNERABLE: u32 = 60;
const HYPERSPACE_SAFE_CHANCE: f32 = 0.7;

const WAVE_BONUS: u64 = 1000;
const NEXT_WAVE_DELAY_MS: f32 = 2000.0;

/// Actions deferred through the widget's task list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsteroidsDelayed {
    NextWave,
}

pub struct Asteroids {
    state: GameState,
    fx: ParticleSystem,
    rng: Pcg32,
    store: EntityStore,
    thrusting: bool,
}

impl Asteroids {
    pub fn new(seed: u64) -> Self {
        let mut game = Self {
            state: GameState::new(LIVES),
            fx: ParticleSystem::default(),
            rng: Pcg32::seed_from_u64(seed),
            store: EntityStore::new(),
            thrusting: false,
        };
        game.reset();
        game
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn rocks(&self) -> usize {
        self.store.count(EntityKind::Hostile)
    }

    pub fn bullets(&self) -> usize {
        self.store.count(EntityKind::Projectile)
    }

    fn ship_pos(&self) -> Vec2 {
        self.store.player().map_or(FIELD.center(), |s| s.pos)
    }

    fn spawn_ship(&mut self) {
        self.store.clear_kind(EntityKind::Player);
        self.store
            .spawn(Entity::new(EntityKind::Player, FIELD.center(), Vec2::ZERO, SHIP_SIZE));
    }

    fn spawn_rock(&mut self, pos: Vec2, vel: Vec2, tier: u8) -> EntityId {
        let splits = if (tier as usize) < ROCK_RADII.len() - 1 {
            SPLIT_COUNT
        } else {
            0
        };
        let mut rock = Entity::new(EntityKind::Hostile, pos, vel, ROCK_RADII[tier as usize])
            .with_splits(splits, tier);
        rock.spin = (self.rng.random::<f32>() - 0.5) * 0.1;
        self.store.spawn(rock)
    }

    /// Fresh wave of large rocks away from the ship
    fn spawn_wave(&mut self) {
        self.store.clear_kind(EntityKind::Hostile);
        self.store.clear_kind(EntityKind::Projectile);
        let count = (4 + self.state.level() as usize).min(MAX_WAVE);
        let ship = self.ship_pos();
        for _ in 0..count {
            let mut pos = Vec2::ZERO;
            for _ in 0..64 {
                pos = Vec2::new(
                    self.rng.random::<f32>() * FIELD.width,
                    self.rng.random::<f32>() * FIELD.height,
                );
                if !point_in_circle(pos, ship, SAFE_SPAWN_DISTANCE) {
                    break;
                }
            }
            if point_in_circle(pos, ship, SAFE_SPAWN_DISTANCE) {
                pos = Vec2::ZERO;
            }
            let vel = Vec2::new(
                (self.rng.random::<f32>() - 0.5) * 2.0,
                (self.rng.random::<f32>() - 0.5) * 2.0,
            );
            self.spawn_rock(pos, vel, 0);
        }
        log::info!("Asteroids wave {}: {} rocks", self.state.level(), count);
    }

    fn steer(&mut self, intents: &Intents) {
        let rotate = match (intents.holding(Direction::Left), intents.holding(Direction::Right)) {
            (true, false) => -ROTATION_SPEED,
            (false, true) => ROTATION_SPEED,
            _ => 0.0,
        };
        self.thrusting = intents.holding(Direction::Up);
        let frame = self.state.frame_count;
        let Some(ship) = self.store.player_mut() else {
            return;
        };
        ship.angle += rotate;
        if self.thrusting {
            ship.vel += Vec2::from_angle(ship.angle) * THRUST_POWER;
        }
        ship.vel *= FRICTION;
        let (pos, angle) = (ship.pos, ship.angle);
        if self.thrusting && frame % 2 == 0 {
            let exhaust = pos - Vec2::from_angle(angle) * SHIP_SIZE;
            self.fx.spawn_directed(EffectKind::Thrust, exhaust, angle, 1, &mut self.rng);
        }
    }

    fn shoot(&mut self) {
        if self.bullets() >= MAX_BULLETS {
            return;
        }
        let Some(ship) = self.store.player() else {
            return;
        };
        let heading = Vec2::from_angle(ship.angle);
        let bullet = Entity::new(
            EntityKind::Projectile,
            ship.pos + heading * SHIP_SIZE,
            heading * BULLET_SPEED + ship.vel,
            0.0,
        )
        .with_lifetime(BULLET_LIFETIME);
        self.store.spawn(bullet);
    }

    fn hyperspace(&mut self) {
        let from = self.ship_pos();
        self.fx.spawn(EffectKind::Explosion { big: false }, from, 12, &mut self.rng);

        if self.rng.random::<f32>() < HYPERSPACE_SAFE_CHANCE {
            let to = Vec2::new(
                self.rng.random::<f32>() * FIELD.width,
                self.rng.random::<f32>() * FIELD.height,
            );
            if let Some(ship) = self.store.player_mut() {
                ship.pos = to;
                ship.vel = Vec2::ZERO;
                ship.invulnerable = HYPERSPACE_INVULNERABLE;
            }
            self.fx.spawn(EffectKind::Burst, to, 8, &mut self.rng);
        } else {
            log::debug!("Hyperspace malfunction");
            self.lose_ship();
        }
    }

    /// Lose a life and respawn at the center with a grace period
    fn lose_ship(&mut self) {
        self.state.lose_life();
        if let Some(ship) = self.store.player_mut() {
            ship.pos = FIELD.center();
            ship.vel = Vec2::ZERO;
            ship.invulnerable = HIT_INVULNERABLE;
        }
        let at = FIELD.center();
        self.fx.spawn(EffectKind::Explosion { big: true }, at, 20, &mut self.rng);
    }

    fn break_rock(&mut self, id: EntityId) {
        let Some(rock) = self.store.get_mut(id) else {
            return;
        };
        let outcome = rock.take_hit();
        let (pos, tier) = (rock.pos, rock.tier);
        self.state.add_score(ROCK_POINTS[tier as usize]);

        let (big, count) = match tier {
            0 => (true, 20),
            1 => (false, 12),
            _ => (false, 8),
        };
        self.fx.spawn(EffectKind::Explosion { big }, pos, count, &mut self.rng);

        match outcome {
            HitOutcome::Split(n) => {
                self.store.remove(id);
                for _ in 0..n {
                    let offset = Vec2::new(
                        (self.rng.random::<f32>() - 0.5) * 20.0,
                        (self.rng.random::<f32>() - 0.5) * 20.0,
                    );
                    let vel = Vec2::new(
                        (self.rng.random::<f32>() - 0.5) * 3.0,
                        (self.rng.random::<f32>() - 0.5) * 3.0,
                    );
                    self.spawn_rock(crate::wrap_position(pos + offset, FIELD), vel, tier + 1);
                }
            }
            HitOutcome::Destroyed => {
                self.store.remove(id);
            }
            HitOutcome::Damaged { .. } => {}
        }
    }

    fn handle_collisions(&mut self) {
        for event in resolve(&self.store) {
            match event.kind {
                CollisionKind::ProjectileHostile => {
                    self.store.remove(event.a);
                    self.break_rock(event.b);
                }
                CollisionKind::HostilePlayer => self.lose_ship(),
                CollisionKind::PlayerCollectible => {}
            }
        }
    }

    /// Jagged outline, stable per rock
    fn rock_outline(rock: &Entity) -> Vec<Vec2> {
        let vertices = 8 + (rock.id() % 4) as usize;
        (0..vertices)
            .map(|i| {
                let seed = rock.id().wrapping_mul(2654435761).wrapping_add(i as u32 * 40503);
                let jag = 0.8 + (seed % 1000) as f32 / 1000.0 * 0.4;
                let angle = i as f32 / vertices as f32 * TAU + rock.angle;
                rock.pos + Vec2::from_angle(angle) * rock.radius * jag
            })
            .collect()
    }
}

impl ArcadeGame for Asteroids {
    type Delayed = AsteroidsDelayed;
    const NAME: &'static str = "asteroids";

    fn fire_cooldown() -> u32 {
        10
    }

    fn bounds(&self) -> Bounds {
        FIELD
    }

    fn state(&self) -> &GameState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.state = GameState::new(LIVES);
        self.fx.clear();
        self.store.clear();
        self.thrusting = false;
        self.spawn_ship();
        self.spawn_wave();
    }

    fn update(&mut self, intents: &Intents, _dt_ms: f32, delayed: &mut DelayedTasks<AsteroidsDelayed>) {
        self.steer(intents);
        if intents.fire {
            self.shoot();
        }
        if intents.secondary {
            self.hyperspace();
        }

        step(&mut self.store, FIELD, 1.0);
        self.handle_collisions();

        if self.state.lives() == 0 {
            let at = self.ship_pos();
            self.fx.spawn(EffectKind::Explosion { big: true }, at, 20, &mut self.rng);
            let _ = self.state.game_over();
            return;
        }

        if self.rocks() == 0 && self.state.phase == GamePhase::Running {
            self.state.add_score(WAVE_BONUS);
            self.store.clear_kind(EntityKind::Projectile);
            for _ in 0..15 {
                let at = Vec2::new(
                    self.rng.random::<f32>() * FIELD.width,
                    self.rng.random::<f32>() * FIELD.height,
                );
                self.fx.spawn(EffectKind::Burst, at, 8, &mut self.rng);
            }
            if self.state.win().is_ok() {
                delayed.schedule(NEXT_WAVE_DELAY_MS, AsteroidsDelayed::NextWave);
            }
        }
    }

    fn on_delayed(&mut self, action: AsteroidsDelayed, _delayed: &mut DelayedTasks<AsteroidsDelayed>) {
        match action {
            AsteroidsDelayed::NextWave => {
                if self.state.advance_level().is_ok() {
                    self.spawn_wave();
                }
            }
        }
    }

    fn effects(&self) -> &ParticleSystem {
        &self.fx
    }

    fn effects_mut(&mut self) -> &mut ParticleSystem {
        &mut self.fx
    }

    fn render(&self, surface: &mut dyn RenderSurface) {
        for rock in self.store.of_kind(EntityKind::Hostile) {
            renderer::polygon(surface, &Self::rock_outline(rock), 2.0, Color::GRAY);
        }

        for bullet in self.store.of_kind(EntityKind::Projectile) {
            surface.fill_circle(bullet.pos, 2.0, Color::YELLOW);
        }

        if let Some(ship) = self.store.player() {
            // Blink while invulnerable
            let visible = ship.invulnerable == 0 || (ship.invulnerable / 5) % 2 == 0;
            if visible && !self.state.is_over() {
                let nose = ship.pos + Vec2::from_angle(ship.angle) * SHIP_SIZE;
                let left = ship.pos + Vec2::from_angle(ship.angle + 2.5) * SHIP_SIZE;
                let right = ship.pos + Vec2::from_angle(ship.angle - 2.5) * SHIP_SIZE;
                renderer::polygon(surface, &[nose, left, right], 2.0, Color::CYAN);
                if self.thrusting {
                    let tail = ship.pos - Vec2::from_angle(ship.angle) * SHIP_SIZE * 1.2;
                    surface.fill_circle(tail, 3.0, Color::ORANGE);
                }
            }
        }

        let hud = format!(
            "Score {}   Lives {}   Level {}",
            self.state.score(),
            self.state.lives(),
            self.state.level()
        );
        surface.text(Vec2::new(10.0, 20.0), &hud, 16.0, Color::WHITE);
        if self.state.phase == GamePhase::Won {
            surface.text(FIELD.center(), "WAVE CLEARED", 28.0, Color::GREEN);
        }
    }

    fn hud(&self) -> serde_json::Value {
        serde_json::json!({
            "rocks": self.rocks(),
            "bullets": self.bullets(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance;

    fn running(seed: u64) -> Asteroids {
        let mut game = Asteroids::new(seed);
        game.state.start().unwrap();
        game
    }

    /// Running game with only the ship and the given rocks (still)
    fn with_rocks(rocks: &[(Vec2, u8)]) -> Asteroids {
        let mut game = running(1);
        game.store.clear_kind(EntityKind::Hostile);
        for &(pos, tier) in rocks {
            game.spawn_rock(pos, Vec2::ZERO, tier);
        }
        game
    }

    fn tick(game: &mut Asteroids, intents: &Intents, delayed: &mut DelayedTasks<AsteroidsDelayed>) {
        game.update(intents, 1000.0 / 60.0, delayed);
    }

    #[test]
    fn test_first_wave_keeps_distance() {
        let game = Asteroids::new(9);
        assert_eq!(game.rocks(), 5);
        for rock in game.store.of_kind(EntityKind::Hostile) {
            assert!(distance(rock.pos, FIELD.center()) >= SAFE_SPAWN_DISTANCE);
            assert_eq!(rock.radius, 60.0);
        }
    }

    #[test]
    fn test_large_rock_splits_in_two() {
        let mut game = with_rocks(&[(Vec2::new(100.0, 100.0), 0)]);
        let rock = game.store.of_kind(EntityKind::Hostile).next().unwrap().id();
        game.break_rock(rock);
        assert_eq!(game.rocks(), 2);
        assert_eq!(game.state.score(), 100);
        for child in game.store.of_kind(EntityKind::Hostile) {
            assert_eq!(child.radius, 40.0);
            assert_eq!(child.tier, 1);
            assert!(distance(child.pos, Vec2::new(100.0, 100.0)) <= 15.0);
        }
    }

    #[test]
    fn test_smallest_rock_is_destroyed() {
        let mut game = with_rocks(&[(Vec2::new(100.0, 100.0), 2)]);
        let rock = game.store.of_kind(EntityKind::Hostile).next().unwrap().id();
        game.break_rock(rock);
        assert_eq!(game.rocks(), 0);
        assert_eq!(game.state.score(), 20);
    }

    #[test]
    fn test_bullet_hits_rock() {
        let mut game = with_rocks(&[(Vec2::new(400.0, 200.0), 1), (Vec2::new(100.0, 500.0), 0)]);
        // Aim straight up (-y) from the center at the medium rock
        game.store.player_mut().unwrap().angle = -std::f32::consts::FRAC_PI_2;
        let mut delayed = DelayedTasks::new();
        let fire = Intents {
            fire: true,
            ..Intents::default()
        };
        tick(&mut game, &fire, &mut delayed);
        let idle = Intents::default();
        for _ in 0..30 {
            tick(&mut game, &idle, &mut delayed);
        }
        assert_eq!(game.state.score(), 50);
        assert_eq!(game.bullets(), 0);
        assert_eq!(game.rocks(), 3);
    }

    #[test]
    fn test_bullet_cap() {
        let mut game = with_rocks(&[(Vec2::new(50.0, 50.0), 2)]);
        for _ in 0..12 {
            game.shoot();
        }
        assert_eq!(game.bullets(), MAX_BULLETS);
    }

    #[test]
    fn test_bullets_expire() {
        let mut game = with_rocks(&[(Vec2::new(50.0, 50.0), 2)]);
        game.store.player_mut().unwrap().angle = 0.3;
        game.shoot();
        let mut delayed = DelayedTasks::new();
        for _ in 0..BULLET_LIFETIME {
            tick(&mut game, &Intents::default(), &mut delayed);
        }
        assert_eq!(game.bullets(), 0);
    }

    #[test]
    fn test_ship_hit_costs_a_life() {
        let mut game = with_rocks(&[(FIELD.center() + Vec2::new(30.0, 0.0), 1)]);
        let mut delayed = DelayedTasks::new();
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 2);
        let ship = game.store.player().unwrap();
        assert_eq!(ship.pos, FIELD.center());
        assert_eq!(ship.invulnerable, HIT_INVULNERABLE);
        // Still overlapping, but invulnerable
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 2);
    }

    #[test]
    fn test_last_life_ends_game() {
        let mut game = with_rocks(&[(FIELD.center(), 1)]);
        let mut delayed = DelayedTasks::new();
        for _ in 0..3 {
            game.store.player_mut().unwrap().invulnerable = 0;
            tick(&mut game, &Intents::default(), &mut delayed);
        }
        assert_eq!(game.state.lives(), 0);
        assert!(game.state.is_over());
    }

    #[test]
    fn test_wave_clear_bonus_and_delayed_next_wave() {
        let mut game = with_rocks(&[]);
        let mut delayed = DelayedTasks::new();
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.phase, GamePhase::Won);
        assert_eq!(game.state.score(), WAVE_BONUS);
        assert_eq!(delayed.len(), 1);

        assert!(delayed.advance(1999.0).is_empty());
        let due = delayed.advance(1.0);
        assert_eq!(due, vec![AsteroidsDelayed::NextWave]);
        game.on_delayed(AsteroidsDelayed::NextWave, &mut delayed);
        assert_eq!(game.state.phase, GamePhase::Running);
        assert_eq!(game.state.level(), 2);
        assert_eq!(game.rocks(), 6);
    }

    #[test]
    fn test_wave_size_caps_at_eight() {
        let mut game = running(3);
        for _ in 0..10 {
            game.state.win().unwrap();
            game.state.advance_level().unwrap();
        }
        game.spawn_wave();
        assert_eq!(game.rocks(), MAX_WAVE);
    }

    #[test]
    fn test_hyperspace_outcomes() {
        for seed in 0..20 {
            let mut game = running(seed);
            game.hyperspace();
            let ship = game.store.player().unwrap();
            match game.state.lives() {
                3 => assert_eq!(ship.invulnerable, HYPERSPACE_INVULNERABLE),
                2 => {
                    assert_eq!(ship.invulnerable, HIT_INVULNERABLE);
                    assert_eq!(ship.pos, FIELD.center());
                }
                other => panic!("unexpected lives {}", other),
            }
        }
    }

    #[test]
    fn test_thrust_and_friction() {
        let mut game = with_rocks(&[(Vec2::new(50.0, 50.0), 2)]);
        let thrust = Intents {
            held: vec![Direction::Up],
            ..Intents::default()
        };
        game.steer(&thrust);
        let v = game.store.player().unwrap().vel;
        assert!((v.x - THRUST_POWER * FRICTION).abs() < 1e-5);
        game.steer(&Intents::default());
        let slower = game.store.player().unwrap().vel;
        assert!(slower.x < v.x);
    }
}
