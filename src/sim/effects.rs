//! Cosmetic particles and screen shake
//!
//! Nothing here is read by gameplay. Dropping every particle is always safe.

use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::renderer::Color;

/// Effect presets, each with its own spawn parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Even ring of sparks (food pickup, goal reached)
    Burst,
    /// Random spray with shake; size scales speed and count weight
    Explosion { big: bool },
    /// Short-lived drifting sparkle behind a moving actor
    Trail,
    /// Falling debris with gravity (line clear, game over)
    Debris,
    /// Engine exhaust opposite to a heading
    Thrust,
}

/// Parameters for one effect preset
#[derive(Debug, Clone, Copy)]
pub struct EffectParams {
    pub speed: f32,
    pub life_min: f32,
    pub life_jitter: f32,
    pub size_min: f32,
    pub size_jitter: f32,
    pub gravity: f32,
    pub friction: f32,
    pub palette: &'static [Color],
    /// Added to screen shake on spawn
    pub shake: f32,
}

const GOLD: &[Color] = &[Color::GOLD];
const FIRE: &[Color] = &[Color::ORANGE, Color::RED, Color::YELLOW];
const GREEN: &[Color] = &[Color::GREEN];
const CONFETTI: &[Color] = &[Color::GOLD, Color::ORANGE, Color::RED, Color::WHITE];

impl EffectKind {
    pub fn params(self) -> EffectParams {
        match self {
            EffectKind::Burst => EffectParams {
                speed: 3.0,
                life_min: 30.0,
                life_jitter: 20.0,
                size_min: 2.0,
                size_jitter: 2.0,
                gravity: 0.0,
                friction: 0.95,
                palette: GOLD,
                shake: 0.0,
            },
            EffectKind::Explosion { big } => EffectParams {
                speed: if big { 5.0 } else { 3.0 },
                life_min: 40.0,
                life_jitter: 30.0,
                size_min: if big { 4.0 } else { 3.0 },
                size_jitter: 0.0,
                gravity: 0.0,
                friction: 0.98,
                palette: FIRE,
                shake: if big { 15.0 } else { 8.0 },
            },
            EffectKind::Trail => EffectParams {
                speed: 1.0,
                life_min: 20.0,
                life_jitter: 10.0,
                size_min: 1.0,
                size_jitter: 1.0,
                gravity: 0.0,
                friction: 0.98,
                palette: GREEN,
                shake: 0.0,
            },
            EffectKind::Debris => EffectParams {
                speed: 4.0,
                life_min: 30.0,
                life_jitter: 20.0,
                size_min: 2.0,
                size_jitter: 3.0,
                gravity: 0.3,
                friction: 0.99,
                palette: CONFETTI,
                shake: 8.0,
            },
            EffectKind::Thrust => EffectParams {
                speed: 3.0,
                life_min: 20.0,
                life_jitter: 10.0,
                size_min: 2.0,
                size_jitter: 0.0,
                gravity: 0.0,
                friction: 0.95,
                palette: FIRE,
                shake: 0.0,
            },
        }
    }
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Ticks left
    pub life: f32,
    pub max_life: f32,
    pub color: Color,
    pub size: f32,
    pub gravity: f32,
    pub friction: f32,
}

impl Particle {
    /// Remaining life as 0-1 (for fading)
    pub fn alpha(&self) -> f32 {
        if self.max_life <= 0.0 {
            0.0
        } else {
            (self.life / self.max_life).clamp(0.0, 1.0)
        }
    }
}

/// Decaying render-origin displacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenShake {
    pub magnitude: f32,
}

impl ScreenShake {
    const DECAY: f32 = 0.9;

    pub fn add(&mut self, amount: f32) {
        self.magnitude = (self.magnitude + amount).min(20.0);
    }

    pub fn decay(&mut self) {
        self.magnitude *= Self::DECAY;
        if self.magnitude < 0.05 {
            self.magnitude = 0.0;
        }
    }

    /// Random offset for the render origin this frame
    pub fn offset(&self, rng: &mut impl Rng) -> Vec2 {
        if self.magnitude == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            (rng.random::<f32>() - 0.5) * self.magnitude,
            (rng.random::<f32>() - 0.5) * self.magnitude,
        )
    }
}

/// Owns every live particle of one game instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleSystem {
    particles: VecDeque<Particle>,
    cap: usize,
    pub shake: ScreenShake,
    shake_enabled: bool,
    density: f32,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(crate::consts::MAX_PARTICLES)
    }
}

impl ParticleSystem {
    pub fn new(cap: usize) -> Self {
        Self {
            particles: VecDeque::with_capacity(cap.min(1024)),
            cap,
            shake: ScreenShake::default(),
            shake_enabled: true,
            density: 1.0,
        }
    }

    /// Apply particle cap, shake toggle and burst density from settings
    pub fn configure(&mut self, cap: usize, shake_enabled: bool, density: f32) {
        self.cap = cap;
        self.shake_enabled = shake_enabled;
        self.density = if density.is_finite() {
            density.clamp(0.0, 1.0)
        } else {
            1.0
        };
        while self.particles.len() > cap {
            self.particles.pop_front();
        }
        if !shake_enabled {
            self.shake = ScreenShake::default();
        }
    }

    /// Burst size after density scaling. A requested burst never shrinks
    /// below one particle.
    fn scaled(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        ((count as f32 * self.density).round() as usize).max(1)
    }

    fn push(&mut self, particle: Particle) {
        if self.cap == 0 {
            return;
        }
        if self.particles.len() >= self.cap {
            // Oldest particles make room
            self.particles.pop_front();
        }
        self.particles.push_back(particle);
    }

    /// Spawn `count` particles of `kind` at `pos`
    pub fn spawn(&mut self, kind: EffectKind, pos: Vec2, count: usize, rng: &mut impl Rng) {
        let params = kind.params();
        let count = self.scaled(count);
        for i in 0..count {
            let vel = match kind {
                EffectKind::Burst => {
                    let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                    Vec2::from_angle(angle) * params.speed
                }
                _ => Vec2::new(
                    (rng.random::<f32>() - 0.5) * params.speed * 2.0,
                    (rng.random::<f32>() - 0.5) * params.speed * 2.0,
                ),
            };
            self.push(Self::make(&params, pos, vel, rng));
        }
        self.add_shake(params.shake);
    }

    /// Spawn particles streaming opposite to `heading` (radians)
    pub fn spawn_directed(
        &mut self,
        kind: EffectKind,
        pos: Vec2,
        heading: f32,
        count: usize,
        rng: &mut impl Rng,
    ) {
        let params = kind.params();
        let back = -Vec2::from_angle(heading) * params.speed;
        for _ in 0..self.scaled(count) {
            let jitter = Vec2::new(rng.random::<f32>() - 0.5, rng.random::<f32>() - 0.5);
            self.push(Self::make(&params, pos, back + jitter, rng));
        }
        self.add_shake(params.shake);
    }

    fn make(params: &EffectParams, pos: Vec2, vel: Vec2, rng: &mut impl Rng) -> Particle {
        let life = params.life_min + rng.random::<f32>() * params.life_jitter;
        let color = params.palette[rng.random_range(0..params.palette.len())];
        Particle {
            pos,
            vel,
            life,
            max_life: params.life_min + params.life_jitter,
            color,
            size: params.size_min + rng.random::<f32>() * params.size_jitter,
            gravity: params.gravity,
            friction: params.friction,
        }
    }

    pub fn add_shake(&mut self, amount: f32) {
        if self.shake_enabled && amount > 0.0 {
            self.shake.add(amount);
        }
    }

    /// Integrate every particle one tick and drop the expired ones
    pub fn tick(&mut self) {
        for p in self.particles.iter_mut() {
            p.pos += p.vel;
            p.vel *= p.friction;
            p.vel.y += p.gravity;
            p.life -= 1.0;
        }
        self.particles.retain(|p| p.life > 0.0);
        self.shake.decay();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.shake = ScreenShake::default();
    }
}
