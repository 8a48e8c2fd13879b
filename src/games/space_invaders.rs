//! Space Invaders
//!
//! A 10x5 formation marches across an 800x600 field, stepping down and
//! speeding up each time it touches a wall. The ship slides along the bottom
//! and fires upward; invaders drop shots on a jittered timer. The top row is
//! armored and takes two hits. Clearing the formation wins the level.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::platform::{DelayedTasks, Direction, Intents};
use crate::renderer::{self, Color, RenderSurface};
use crate::sim::{
    Boundary, CollisionKind, EffectKind, Entity, EntityId, EntityKind, EntityStore, GamePhase,
    GameState, HitOutcome, ParticleSystem, SpawnTimer, resolve, step,
};
use crate::widget::ArcadeGame;
use crate::Bounds;

pub const FIELD: Bounds = Bounds::new(800.0, 600.0);
const LIVES: u32 = 3;

const SHIP_Y: f32 = 575.0;
const SHIP_RADIUS: f32 = 18.0;
const SHIP_SPEED: f32 = 5.0;
const HIT_INVULNERABLE: u32 = 60;

const BULLET_SPEED: f32 = 7.0;
const ENEMY_BULLET_SPEED: f32 = 3.0;
const BULLET_RADIUS: f32 = 3.0;

const ROWS: usize = 5;
const COLUMNS: usize = 10;
const SPACING: f32 = 50.0;
/// Center of the top-left invader
const FORMATION_ORIGIN: Vec2 = Vec2::new(120.0, 65.0);
const INVADER_HALF: Vec2 = Vec2::new(20.0, 15.0);
const INVADER_RADIUS: f32 = 16.0;
const ARMOR: u8 = 2;
const DROP: f32 = 20.0;
const SPEED_STEP: f32 = 0.2;

/// Ticks between enemy shots: `max(20, 70 - 10 * level)` plus up to this much
const FIRE_JITTER: u32 = 40;

const LEVEL_BONUS: u64 = 100;
const NEXT_LEVEL_DELAY_MS: f32 = 1500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvadersDelayed {
    NextLevel,
}

/// Point class by formation row: 3 for the top two rows, then 2, then 1
fn rank(row: usize) -> u8 {
    match row {
        0 | 1 => 3,
        2 | 3 => 2,
        _ => 1,
    }
}

/// March speed in pixels per tick at the start of `level`
fn base_speed(level: u32) -> f32 {
    if level <= 1 {
        1.0
    } else {
        1.0 + level as f32 * 0.5
    }
}

fn fire_base(level: u32) -> u32 {
    70u32.saturating_sub(level * 10).max(20)
}

pub struct SpaceInvaders {
    state: GameState,
    fx: ParticleSystem,
    rng: Pcg32,
    store: EntityStore,
    /// Live invaders and their point class
    invaders: BTreeMap<EntityId, u8>,
    march_dir: f32,
    march_speed: f32,
    fire_timer: SpawnTimer,
    invaded: bool,
}

impl SpaceInvaders {
    pub fn new(seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let fire_timer = SpawnTimer::new(fire_base(1), FIRE_JITTER, &mut rng);
        let mut game = Self {
            state: GameState::new(LIVES),
            fx: ParticleSystem::default(),
            rng,
            store: EntityStore::new(),
            invaders: BTreeMap::new(),
            march_dir: 1.0,
            march_speed: base_speed(1),
            fire_timer,
            invaded: false,
        };
        game.reset();
        game
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn invaders(&self) -> usize {
        self.invaders.len()
    }

    pub fn march_speed(&self) -> f32 {
        self.march_speed
    }

    /// Shots in flight from the formation
    pub fn enemy_shots(&self) -> usize {
        self.store
            .of_kind(EntityKind::Hostile)
            .filter(|e| !self.invaders.contains_key(&e.id()))
            .count()
    }

    fn ship_pos(&self) -> Vec2 {
        self.store
            .player()
            .map_or(Vec2::new(FIELD.width / 2.0, SHIP_Y), |s| s.pos)
    }

    fn spawn_ship(&mut self) {
        self.store.clear_kind(EntityKind::Player);
        let ship = Entity::new(
            EntityKind::Player,
            Vec2::new(FIELD.width / 2.0, SHIP_Y),
            Vec2::ZERO,
            SHIP_RADIUS,
        )
        .with_boundary(Boundary::Clamp);
        self.store.spawn(ship);
    }

    /// Fresh formation for the current level; every shot in flight is dropped
    fn spawn_formation(&mut self) {
        self.store.clear_kind(EntityKind::Hostile);
        self.store.clear_kind(EntityKind::Projectile);
        self.invaders.clear();
        for row in 0..ROWS {
            for col in 0..COLUMNS {
                let pos = FORMATION_ORIGIN + Vec2::new(col as f32, row as f32) * SPACING;
                let health = if row == 0 { ARMOR } else { 1 };
                let invader = Entity::new(EntityKind::Hostile, pos, Vec2::ZERO, INVADER_RADIUS)
                    .with_health(health)
                    .with_boundary(Boundary::Clamp);
                let id = self.store.spawn(invader);
                self.invaders.insert(id, rank(row));
            }
        }
        let level = self.state.level();
        self.march_dir = 1.0;
        self.march_speed = base_speed(level);
        self.fire_timer = SpawnTimer::new(fire_base(level), FIRE_JITTER, &mut self.rng);
        log::info!("Space Invaders level {}: speed {}", level, self.march_speed);
    }

    fn steer(&mut self, intents: &Intents) {
        let vx = if intents.holding(Direction::Left) {
            -SHIP_SPEED
        } else if intents.holding(Direction::Right) {
            SHIP_SPEED
        } else {
            0.0
        };
        if let Some(ship) = self.store.player_mut() {
            ship.vel.x = vx;
        }
    }

    fn shoot(&mut self) {
        let muzzle = self.ship_pos() - Vec2::new(0.0, SHIP_RADIUS);
        let bullet = Entity::new(
            EntityKind::Projectile,
            muzzle,
            Vec2::new(0.0, -BULLET_SPEED),
            BULLET_RADIUS,
        )
        .with_boundary(Boundary::DieOnExit);
        self.store.spawn(bullet);
    }

    /// Move the formation one tick. Touching a wall in the direction of
    /// travel drops every invader instead, then reverses and speeds up.
    fn march(&mut self) {
        let dir = self.march_dir;
        let at_wall = self.invaders.keys().filter_map(|&id| self.store.get(id)).any(|e| {
            (dir < 0.0 && e.pos.x - INVADER_HALF.x <= 0.0)
                || (dir > 0.0 && e.pos.x + INVADER_HALF.x >= FIELD.width)
        });
        let shift = if at_wall {
            Vec2::new(0.0, DROP)
        } else {
            Vec2::new(self.march_speed * dir, 0.0)
        };
        for &id in self.invaders.keys() {
            if let Some(invader) = self.store.get_mut(id) {
                invader.pos += shift;
            }
        }
        if at_wall {
            self.march_dir = -dir;
            self.march_speed += SPEED_STEP;
            self.fx.add_shake(5.0);
        }
    }

    /// The lowest invader in a randomly chosen occupied column fires
    fn enemy_shoot(&mut self) {
        let positions: Vec<Vec2> = self
            .invaders
            .keys()
            .filter_map(|&id| self.store.get(id))
            .map(|e| e.pos)
            .collect();
        if positions.is_empty() {
            return;
        }
        let pick = positions[self.rng.random_range(0..positions.len())];
        let shooter = positions
            .iter()
            .filter(|p| (p.x - pick.x).abs() < 1.0)
            .fold(pick, |low, p| if p.y > low.y { *p } else { low });
        let shot = Entity::new(
            EntityKind::Hostile,
            shooter + Vec2::new(0.0, INVADER_HALF.y),
            Vec2::new(0.0, ENEMY_BULLET_SPEED),
            BULLET_RADIUS,
        )
        .with_boundary(Boundary::DieOnExit);
        self.store.spawn(shot);
    }

    fn hit_invader(&mut self, id: EntityId) {
        let Some(invader) = self.store.get_mut(id) else {
            return;
        };
        let outcome = invader.take_hit();
        let pos = invader.pos;
        match outcome {
            HitOutcome::Damaged { .. } => {
                self.fx.spawn(EffectKind::Burst, pos, 6, &mut self.rng);
            }
            HitOutcome::Destroyed | HitOutcome::Split(_) => {
                self.store.remove(id);
                let points = self.invaders.remove(&id).unwrap_or(1);
                self.state.add_score(points as u64 * 10);
                self.fx
                    .spawn(EffectKind::Explosion { big: false }, pos, 8, &mut self.rng);
            }
        }
    }

    fn lose_ship(&mut self) {
        self.state.lose_life();
        let at = self.ship_pos();
        self.fx.spawn(EffectKind::Explosion { big: true }, at, 15, &mut self.rng);
        if let Some(ship) = self.store.player_mut() {
            ship.invulnerable = HIT_INVULNERABLE;
        }
    }

    fn handle_collisions(&mut self) {
        for event in resolve(&self.store) {
            match event.kind {
                CollisionKind::ProjectileHostile => {
                    self.store.remove(event.a);
                    if self.invaders.contains_key(&event.b) {
                        self.hit_invader(event.b);
                    } else if let Some(shot) = self.store.remove(event.b) {
                        // Shots cancel each other out
                        self.fx.spawn(EffectKind::Burst, shot.pos, 4, &mut self.rng);
                    }
                }
                CollisionKind::HostilePlayer => {
                    if self.invaders.contains_key(&event.a) {
                        self.invaded = true;
                    } else {
                        self.store.remove(event.a);
                        self.lose_ship();
                    }
                }
                CollisionKind::PlayerCollectible => {}
            }
        }
    }

    /// Any invader down at the ship's line ends the run
    fn reached_ship_line(&self) -> bool {
        let line = SHIP_Y - SHIP_RADIUS;
        self.invaders
            .keys()
            .filter_map(|&id| self.store.get(id))
            .any(|e| e.pos.y + INVADER_HALF.y >= line)
    }

    fn draw_invader(surface: &mut dyn RenderSurface, invader: &Entity, rank: u8, frame: u64) {
        let color = match rank {
            3 => Color::PURPLE,
            2 => Color::CYAN,
            _ => Color::GREEN,
        };
        // Cracked armor
        let color = if rank == 3 && invader.health < ARMOR {
            color.with_alpha(0.7)
        } else {
            color
        };
        let top_left = invader.pos - INVADER_HALF;
        surface.fill_rect(
            top_left + Vec2::new(4.0, 0.0),
            Vec2::new(INVADER_HALF.x * 2.0 - 8.0, INVADER_HALF.y * 1.4),
            color,
        );
        // Legs swap every half second
        let spread = if (frame / 30) % 2 == 0 { 0.0 } else { 4.0 };
        let leg = Vec2::new(6.0, 8.0);
        let feet_y = invader.pos.y + INVADER_HALF.y - leg.y;
        surface.fill_rect(Vec2::new(top_left.x + spread, feet_y), leg, color);
        surface.fill_rect(
            Vec2::new(invader.pos.x + INVADER_HALF.x - leg.x - spread, feet_y),
            leg,
            color,
        );
    }
}

impl ArcadeGame for SpaceInvaders {
    type Delayed = InvadersDelayed;
    const NAME: &'static str = "spaceinvaders";

    /// 200 ms between shots
    fn fire_cooldown() -> u32 {
        12
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
        self.invaded = false;
        self.spawn_ship();
        self.spawn_formation();
    }

    fn update(&mut self, intents: &Intents, _dt_ms: f32, delayed: &mut DelayedTasks<InvadersDelayed>) {
        self.steer(intents);
        if intents.fire {
            self.shoot();
        }

        step(&mut self.store, FIELD, 1.0);
        self.march();
        if self.fire_timer.tick(&mut self.rng) {
            self.enemy_shoot();
        }
        self.handle_collisions();

        if self.state.lives() == 0 || self.invaded || self.reached_ship_line() {
            let at = self.ship_pos();
            self.fx.spawn(EffectKind::Explosion { big: true }, at, 15, &mut self.rng);
            let _ = self.state.game_over();
            return;
        }

        if self.invaders.is_empty() && self.state.phase == GamePhase::Running {
            self.state.add_score(LEVEL_BONUS);
            self.store.clear_kind(EntityKind::Projectile);
            self.store.clear_kind(EntityKind::Hostile);
            for _ in 0..20 {
                let at = Vec2::new(
                    self.rng.random::<f32>() * FIELD.width,
                    self.rng.random::<f32>() * FIELD.height / 2.0,
                );
                self.fx
                    .spawn(EffectKind::Explosion { big: false }, at, 8, &mut self.rng);
            }
            if self.state.win().is_ok() {
                delayed.schedule(NEXT_LEVEL_DELAY_MS, InvadersDelayed::NextLevel);
            }
        }
    }

    fn on_delayed(&mut self, action: InvadersDelayed, _delayed: &mut DelayedTasks<InvadersDelayed>) {
        match action {
            InvadersDelayed::NextLevel => {
                if self.state.advance_level().is_ok() {
                    self.spawn_formation();
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
        let frame = self.state.frame_count;
        for (&id, &rank) in &self.invaders {
            if let Some(invader) = self.store.get(id) {
                Self::draw_invader(surface, invader, rank, frame);
            }
        }

        let bullet = Vec2::new(BULLET_RADIUS * 1.4, BULLET_RADIUS * 3.4);
        for shot in self.store.of_kind(EntityKind::Projectile) {
            surface.fill_rect(shot.pos - bullet / 2.0, bullet, Color::YELLOW);
        }
        for shot in self.store.of_kind(EntityKind::Hostile) {
            if !self.invaders.contains_key(&shot.id()) {
                surface.fill_rect(shot.pos - bullet / 2.0, bullet, Color::RED);
            }
        }

        if let Some(ship) = self.store.player() {
            let visible = ship.invulnerable == 0 || (ship.invulnerable / 5) % 2 == 0;
            if visible && !self.state.is_over() {
                let p = ship.pos;
                let outline = [
                    p + Vec2::new(0.0, -SHIP_RADIUS),
                    p + Vec2::new(SHIP_RADIUS, SHIP_RADIUS * 0.8),
                    p + Vec2::new(-SHIP_RADIUS, SHIP_RADIUS * 0.8),
                ];
                renderer::polygon(surface, &outline, 2.0, Color::GREEN);
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
            surface.text(FIELD.center(), "LEVEL CLEARED", 28.0, Color::GREEN);
        }
    }

    fn hud(&self) -> serde_json::Value {
        serde_json::json!({
            "invaders": self.invaders(),
            "enemy_shots": self.enemy_shots(),
            "speed": self.march_speed,
        })
    }
}
