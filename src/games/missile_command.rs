//! Missile Command
//!
//! Warheads fall from the top of a 420x600 field toward six cities and three
//! silos. Clicking launches an interceptor from the nearest silo with ammo;
//! it flies to the click point and detonates into an expanding blast that
//! destroys any warhead inside it. Each city counts as a life.
//!
//! A wave's warheads arrive over two seconds through the delayed-task list.
//! A wave ends when nothing is left to arrive, paying a bonus for surviving
//! cities and unspent ammo; the next one starts three seconds later.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::platform::{DelayedTasks, Intents};
use crate::renderer::{self, Color, RenderSurface};
use crate::sim::{
    Boundary, CollisionKind, EffectKind, Entity, EntityId, EntityKind, EntityStore, GamePhase,
    GameState, ParticleSystem, point_in_circle, resolve, step,
};
use crate::widget::ArcadeGame;
use crate::{Bounds, direction_to, distance};

pub const FIELD: Bounds = Bounds::new(420.0, 600.0);
pub const GROUND: f32 = 550.0;

pub const CITY_COUNT: usize = 6;
const CITY_HIT_RANGE: f32 = 40.0;
const SILO_X: [f32; 3] = [80.0, FIELD.width / 2.0, FIELD.width - 80.0];
const SILO_AMMO: u32 = 10;
const SILO_HIT_RANGE: f32 = 30.0;

const INTERCEPTOR_SPEED: f32 = 6.0;
/// Interceptors detonate once this close to their target
const ARRIVAL_RANGE: f32 = 10.0;
const WARHEAD_RADIUS: f32 = 3.0;
const TARGET_JITTER: f32 = 60.0;
/// MIRVs split once below this fraction of the field height
const MIRV_ALTITUDE: f32 = 0.4;

const INTERCEPT_BLAST: f32 = 50.0;
const CHAIN_BLAST: f32 = 30.0;
const IMPACT_BLAST: f32 = 60.0;

const WAVE_SPREAD_MS: f32 = 2000.0;
const NEXT_WAVE_DELAY_MS: f32 = 3000.0;
const CITY_BONUS: u64 = 100;
const AMMO_BONUS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissileDelayed {
    /// One warhead of the current wave enters
    Spawn,
    NextWave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarheadKind {
    Icbm,
    Mirv,
    Cruise,
    Smart,
}

impl WarheadKind {
    const ALL: [WarheadKind; 4] = [
        WarheadKind::Icbm,
        WarheadKind::Mirv,
        WarheadKind::Cruise,
        WarheadKind::Smart,
    ];

    fn speed(self) -> f32 {
        match self {
            WarheadKind::Icbm => 2.0,
            WarheadKind::Mirv => 1.5,
            WarheadKind::Cruise => 3.0,
            WarheadKind::Smart => 2.5,
        }
    }

    fn points(self) -> u64 {
        match self {
            WarheadKind::Icbm => 25,
            WarheadKind::Mirv => 50,
            WarheadKind::Cruise => 15,
            WarheadKind::Smart => 40,
        }
    }

    fn color(self) -> Color {
        match self {
            WarheadKind::Icbm => Color::RED,
            WarheadKind::Mirv => Color::RED.with_alpha(0.8),
            WarheadKind::Cruise => Color::ORANGE,
            WarheadKind::Smart => Color::PURPLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Warhead {
    kind: WarheadKind,
    target: Vec2,
}

/// Expanding then collapsing detonation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blast {
    pub pos: Vec2,
    pub radius: f32,
    max_radius: f32,
    growing: bool,
    life: u32,
    friendly: bool,
}

impl Blast {
    const START_RADIUS: f32 = 5.0;
    const GROWTH: f32 = 4.0;
    const SHRINK: f32 = 2.0;
    const LIFE: u32 = 80;

    fn new(pos: Vec2, max_radius: f32, friendly: bool) -> Self {
        Self {
            pos,
            radius: Self::START_RADIUS,
            max_radius,
            growing: true,
            life: Self::LIFE,
            friendly,
        }
    }

    /// Advance one tick; false once spent
    fn tick(&mut self) -> bool {
        self.life = self.life.saturating_sub(1);
        if self.growing {
            self.radius += Self::GROWTH;
            if self.radius >= self.max_radius {
                self.growing = false;
            }
        } else {
            self.radius -= Self::SHRINK;
        }
        self.life > 0 && self.radius > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Silo {
    pub x: f32,
    pub ammo: u32,
}

fn city_x(index: usize) -> f32 {
    FIELD.width / (CITY_COUNT + 1) as f32 * (index + 1) as f32
}

/// Warheads in wave `wave`
fn wave_size(wave: u32) -> u32 {
    let tier = 1 + wave / 5;
    3 + wave * 2 + (tier as f32 * 1.5) as u32
}

pub struct MissileCommand {
    state: GameState,
    fx: ParticleSystem,
    rng: Pcg32,
    store: EntityStore,
    warheads: BTreeMap<EntityId, Warhead>,
    /// Interceptor id to detonation point
    interceptors: BTreeMap<EntityId, Vec2>,
    blasts: Vec<Blast>,
    cities: [bool; CITY_COUNT],
    silos: [Silo; 3],
    wave_live: bool,
    to_spawn: u32,
    last_bonus: u64,
    crosshair: Option<Vec2>,
}

impl MissileCommand {
    pub fn new(seed: u64) -> Self {
        let mut game = Self {
            state: GameState::new(CITY_COUNT as u32),
            fx: ParticleSystem::default(),
            rng: Pcg32::seed_from_u64(seed),
            store: EntityStore::new(),
            warheads: BTreeMap::new(),
            interceptors: BTreeMap::new(),
            blasts: Vec::new(),
            cities: [true; CITY_COUNT],
            silos: SILO_X.map(|x| Silo { x, ammo: SILO_AMMO }),
            wave_live: false,
            to_spawn: 0,
            last_bonus: 0,
            crosshair: None,
        };
        game.reset();
        game
    }

    pub fn cities_left(&self) -> usize {
        self.cities.iter().filter(|alive| **alive).count()
    }

    pub fn silos(&self) -> &[Silo; 3] {
        &self.silos
    }

    pub fn warheads(&self) -> usize {
        self.warheads.len()
    }

    pub fn blasts(&self) -> &[Blast] {
        &self.blasts
    }

    /// Queue every warhead of the current wave, evenly over the spread
    fn start_wave(&mut self, delayed: &mut DelayedTasks<MissileDelayed>) {
        let count = wave_size(self.state.level());
        let gap = WAVE_SPREAD_MS / count as f32;
        for i in 0..count {
            delayed.schedule(i as f32 * gap, MissileDelayed::Spawn);
        }
        self.to_spawn = count;
        self.wave_live = true;
        log::info!("Missile Command wave {}: {} warheads", self.state.level(), count);
    }

    /// Pick a live city or a silo with ammo to aim at
    fn pick_target(&mut self) -> Option<Vec2> {
        let mut targets: Vec<f32> = (0..CITY_COUNT)
            .filter(|&i| self.cities[i])
            .map(city_x)
            .collect();
        targets.extend(self.silos.iter().filter(|s| s.ammo > 0).map(|s| s.x));
        if targets.is_empty() {
            return None;
        }
        let x = targets[self.rng.random_range(0..targets.len())];
        let jitter = (self.rng.random::<f32>() - 0.5) * TARGET_JITTER;
        Some(Vec2::new(x + jitter, GROUND))
    }

    fn spawn_warhead(&mut self) {
        let kind = WarheadKind::ALL[self.rng.random_range(0..WarheadKind::ALL.len())];
        let Some(target) = self.pick_target() else {
            return;
        };
        let start = Vec2::new(self.rng.random::<f32>() * FIELD.width, 0.0);
        self.launch_warhead(kind, start, direction_to(start, target) * kind.speed(), target);
    }

    fn launch_warhead(&mut self, kind: WarheadKind, pos: Vec2, vel: Vec2, target: Vec2) -> EntityId {
        let splits = if kind == WarheadKind::Mirv { 3 } else { 0 };
        let warhead = Entity::new(EntityKind::Hostile, pos, vel, WARHEAD_RADIUS)
            .with_splits(splits, 0)
            .with_boundary(Boundary::DieOnExit);
        let id = self.store.spawn(warhead);
        self.warheads.insert(id, Warhead { kind, target });
        id
    }

    /// Launch from the nearest silo (by x) that still has ammo
    fn fire_at(&mut self, target: Vec2) {
        let nearest = self
            .silos
            .iter_mut()
            .filter(|s| s.ammo > 0)
            .min_by(|a, b| (a.x - target.x).abs().total_cmp(&(b.x - target.x).abs()));
        let Some(silo) = nearest else {
            log::debug!("All silos empty");
            return;
        };
        silo.ammo -= 1;
        let from = Vec2::new(silo.x, GROUND);
        let vel = direction_to(from, target) * INTERCEPTOR_SPEED;
        let interceptor = Entity::new(EntityKind::Projectile, from, vel, 2.0)
            .with_boundary(Boundary::DieOnExit);
        let id = self.store.spawn(interceptor);
        self.interceptors.insert(id, target);
        self.fx.spawn(EffectKind::Burst, from, 8, &mut self.rng);
    }

    fn detonate(&mut self, interceptor: EntityId) {
        if let Some(e) = self.store.remove(interceptor) {
            self.blasts.push(Blast::new(e.pos, INTERCEPT_BLAST, true));
        }
        self.interceptors.remove(&interceptor);
    }

    /// MIRVs past the split altitude become warheads fanning out
    fn split_mirvs(&mut self) {
        let split_y = FIELD.height * MIRV_ALTITUDE;
        let ready: Vec<(EntityId, Vec2, Vec2, u8, Vec2)> = self
            .warheads
            .iter()
            .filter_map(|(&id, w)| self.store.get(id).map(|e| (id, e, w)))
            .filter(|(_, e, _)| e.splits > 0 && e.pos.y > split_y)
            .map(|(id, e, w)| (id, e.pos, e.vel, e.splits, w.target))
            .collect();

        for (id, pos, vel, splits, target) in ready {
            self.store.remove(id);
            self.warheads.remove(&id);
            let speed = WarheadKind::Mirv.speed();
            let middle = (splits as f32 - 1.0) / 2.0;
            for j in 0..splits {
                let angle = (j as f32 - middle) * 0.3;
                let child_vel = Vec2::new(angle.sin(), angle.cos()) * speed + vel;
                let child_target = target + Vec2::new((j as f32 - 1.0) * 50.0, 0.0);
                self.launch_warhead(WarheadKind::Icbm, pos, child_vel, child_target);
            }
            log::debug!("MIRV split into {}", splits);
        }
    }

    fn impact(&mut self, pos: Vec2) {
        self.blasts.push(Blast::new(pos, IMPACT_BLAST, false));
        for i in 0..CITY_COUNT {
            if self.cities[i] && (city_x(i) - pos.x).abs() < CITY_HIT_RANGE {
                self.cities[i] = false;
                self.state.lose_life();
                let at = Vec2::new(city_x(i), GROUND);
                self.fx.spawn(EffectKind::Debris, at, 20, &mut self.rng);
            }
        }
        for silo in self.silos.iter_mut() {
            if silo.ammo > 0 && (silo.x - pos.x).abs() < SILO_HIT_RANGE {
                silo.ammo = 0;
                let at = Vec2::new(silo.x, GROUND);
                self.fx
                    .spawn(EffectKind::Explosion { big: true }, at, 15, &mut self.rng);
            }
        }
    }

    fn land_warheads(&mut self) {
        let landed: Vec<(EntityId, Vec2)> = self
            .warheads
            .iter()
            .filter_map(|(&id, w)| self.store.get(id).map(|e| (id, e.pos, w.target)))
            .filter(|(_, pos, target)| pos.y >= target.y)
            .map(|(id, pos, _)| (id, pos))
            .collect();
        for (id, pos) in landed {
            self.store.remove(id);
            self.warheads.remove(&id);
            self.impact(pos);
        }
    }

    /// Grow and shrink every blast; warheads inside one are destroyed and
    /// leave a smaller blast of their own
    fn update_blasts(&mut self) {
        self.blasts.retain_mut(|b| b.tick());

        let caught: Vec<(EntityId, Vec2)> = self
            .warheads
            .keys()
            .filter_map(|&id| self.store.get(id))
            .filter(|e| self.blasts.iter().any(|b| point_in_circle(e.pos, b.pos, b.radius)))
            .map(|e| (e.id(), e.pos))
            .collect();
        for (id, pos) in caught {
            self.store.remove(id);
            if let Some(warhead) = self.warheads.remove(&id) {
                self.state.add_score(warhead.kind.points());
            }
            self.blasts.push(Blast::new(pos, CHAIN_BLAST, true));
            self.fx.spawn(EffectKind::Explosion { big: false }, pos, 15, &mut self.rng);
        }
    }

    fn finish_wave(&mut self, delayed: &mut DelayedTasks<MissileDelayed>) {
        let ammo: u32 = self.silos.iter().map(|s| s.ammo).sum();
        let bonus = self.cities_left() as u64 * CITY_BONUS + ammo as u64 * AMMO_BONUS;
        self.state.add_score(bonus);
        self.last_bonus = bonus;
        for silo in self.silos.iter_mut() {
            silo.ammo = SILO_AMMO;
        }
        self.store.clear_kind(EntityKind::Projectile);
        self.interceptors.clear();
        self.blasts.clear();
        self.wave_live = false;
        if self.state.win().is_ok() {
            delayed.schedule(NEXT_WAVE_DELAY_MS, MissileDelayed::NextWave);
        }
    }
}

impl ArcadeGame for MissileCommand {
    type Delayed = MissileDelayed;
    const NAME: &'static str = "missilecommand";

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
        self.state = GameState::new(CITY_COUNT as u32);
        self.fx.clear();
        self.store.clear();
        self.warheads.clear();
        self.interceptors.clear();
        self.blasts.clear();
        self.cities = [true; CITY_COUNT];
        self.silos = SILO_X.map(|x| Silo { x, ammo: SILO_AMMO });
        self.wave_live = false;
        self.to_spawn = 0;
        self.last_bonus = 0;
        self.crosshair = None;
    }

    fn update(&mut self, intents: &Intents, _dt_ms: f32, delayed: &mut DelayedTasks<MissileDelayed>) {
        if !self.wave_live {
            self.start_wave(delayed);
        }
        self.crosshair = intents.aim;
        for &click in &intents.clicks {
            self.fire_at(click);
        }

        let report = step(&mut self.store, FIELD, 1.0);
        for id in &report.exited {
            self.warheads.remove(id);
            self.interceptors.remove(id);
        }
        self.split_mirvs();

        let arrived: Vec<EntityId> = self
            .interceptors
            .iter()
            .filter(|(id, target)| {
                self.store
                    .get(**id)
                    .is_some_and(|e| distance(e.pos, **target) < ARRIVAL_RANGE)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in arrived {
            self.detonate(id);
        }
        // A direct hit detonates early
        for event in resolve(&self.store) {
            if event.kind == CollisionKind::ProjectileHostile {
                self.detonate(event.a);
            }
        }

        self.land_warheads();
        self.update_blasts();

        if self.cities_left() == 0 {
            let _ = self.state.game_over();
            for _ in 0..3 {
                let at = FIELD.center();
                self.fx.spawn(EffectKind::Debris, at, 10, &mut self.rng);
            }
            return;
        }

        if self.to_spawn == 0 && self.warheads.is_empty() && self.state.phase == GamePhase::Running {
            self.finish_wave(delayed);
        }
    }

    fn on_delayed(&mut self, action: MissileDelayed, _delayed: &mut DelayedTasks<MissileDelayed>) {
        match action {
            MissileDelayed::Spawn => {
                self.to_spawn = self.to_spawn.saturating_sub(1);
                self.spawn_warhead();
            }
            MissileDelayed::NextWave => {
                let _ = self.state.advance_level();
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
        surface.fill_rect(
            Vec2::new(0.0, GROUND),
            Vec2::new(FIELD.width, FIELD.height - GROUND),
            Color::BROWN,
        );

        for (i, alive) in self.cities.iter().enumerate() {
            let color = if *alive { Color::CYAN } else { Color::GRAY.with_alpha(0.4) };
            let height = if *alive { 30.0 } else { 6.0 };
            surface.fill_rect(
                Vec2::new(city_x(i) - 15.0, GROUND - height),
                Vec2::new(30.0, height),
                color,
            );
        }

        for silo in &self.silos {
            let base = Vec2::new(silo.x, GROUND);
            let outline = [
                base + Vec2::new(-14.0, 0.0),
                base + Vec2::new(0.0, -18.0),
                base + Vec2::new(14.0, 0.0),
            ];
            let color = if silo.ammo > 0 { Color::GREEN } else { Color::GRAY };
            renderer::polygon(surface, &outline, 2.0, color);
            surface.text(base + Vec2::new(0.0, 30.0), &silo.ammo.to_string(), 14.0, Color::WHITE);
        }

        for (&id, warhead) in &self.warheads {
            if let Some(e) = self.store.get(id) {
                surface.line(e.pos - e.vel * 20.0, e.pos, 1.5, warhead.kind.color().with_alpha(0.6));
                surface.fill_circle(e.pos, WARHEAD_RADIUS, warhead.kind.color());
            }
        }

        for (&id, target) in &self.interceptors {
            if let Some(e) = self.store.get(id) {
                surface.line(e.pos - e.vel * 6.0, e.pos, 1.5, Color::GREEN.with_alpha(0.6));
                surface.fill_circle(e.pos, 2.0, Color::WHITE);
                let arm = Vec2::new(4.0, 4.0);
                surface.line(*target - arm, *target + arm, 1.0, Color::GREEN);
            }
        }

        for blast in &self.blasts {
            let color = if blast.friendly { Color::GREEN } else { Color::RED };
            let fade = blast.life as f32 / Blast::LIFE as f32;
            surface.fill_circle(blast.pos, blast.radius, color.with_alpha(0.3 + 0.5 * fade));
        }

        if let Some(aim) = self.crosshair {
            let (h, v) = (Vec2::new(10.0, 0.0), Vec2::new(0.0, 10.0));
            surface.line(aim - h, aim + h, 1.5, Color::WHITE);
            surface.line(aim - v, aim + v, 1.5, Color::WHITE);
        }

        let hud = format!(
            "Score {}   Wave {}   Cities {}",
            self.state.score(),
            self.state.level(),
            self.cities_left()
        );
        surface.text(Vec2::new(FIELD.width / 2.0, 20.0), &hud, 14.0, Color::WHITE);
        if self.state.phase == GamePhase::Won {
            let line = format!("WAVE CLEARED +{}", self.last_bonus);
            surface.text(FIELD.center(), &line, 24.0, Color::GREEN);
        }
    }

    fn hud(&self) -> serde_json::Value {
        serde_json::json!({
            "cities": self.cities_left(),
            "ammo": self.silos.map(|s| s.ammo),
            "incoming": self.warheads.len() as u32 + self.to_spawn,
        })
    }
}
