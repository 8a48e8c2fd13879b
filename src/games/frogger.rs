//! Frogger
//!
//! A 13x20 lane grid. Cars, logs and turtles slide along their lanes at a
//! per-lane speed (scaled by level) and wrap off the edges. The frog hops one
//! cell at a time over five ticks; presses made mid-hop are buffered (two at
//! most) and the next one starts 50 ms after the current hop lands.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::platform::{DelayedTasks, Direction, Intents, MoveQueue};
use crate::renderer::{Color, RenderSurface};
use crate::sim::{EffectKind, GamePhase, GameState, ParticleSystem, interval_covers};
use crate::widget::ArcadeGame;
use crate::{Bounds, grid_to_pixel};

pub const GRID: f32 = 45.0;
pub const COLS: i32 = 13;
pub const LANES: i32 = 20;
pub const FIELD: Bounds = Bounds::new(600.0, 900.0);

const LIVES: u32 = 5;
const START: (f32, i32) = (6.0, 18);
const HOP_TICKS: u8 = 5;
const FOLLOW_UP_MS: f32 = 50.0;
const ROUND_SECONDS: u32 = 60;
const TICKS_PER_SECOND: u32 = 60;
const GOAL_BONUS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneKind {
    Water,
    Road,
    Safe,
    Goal,
}

#[rustfmt::skip]
const LANE_KINDS: [LaneKind; LANES as usize] = {
    use LaneKind::*;
    [
        Goal, Safe, Water, Water, Water, Water, Water, Water, Safe, Road,
        Road, Road, Road, Road, Road, Safe, Safe, Safe, Safe, Safe,
    ]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Log,
    Turtle,
    Car,
}

/// Lane contents at level 1: row, carrier, cells per second, (x, width)
const LANE_TABLE: &[(i32, Carrier, f32, &[(f32, f32)])] = &[
    (2, Carrier::Log, -1.8, &[(0.0, 3.0), (5.0, 3.0), (9.0, 2.0)]),
    (3, Carrier::Turtle, 1.5, &[(1.0, 1.0), (3.0, 1.0), (5.0, 1.0), (7.0, 1.0), (9.0, 1.0)]),
    (4, Carrier::Log, 2.2, &[(2.0, 4.0), (7.0, 3.0), (11.0, 2.0)]),
    (5, Carrier::Turtle, -1.6, &[(0.0, 1.0), (2.5, 1.0), (5.0, 1.0), (7.5, 1.0), (10.0, 1.0)]),
    (6, Carrier::Log, 2.5, &[(1.0, 3.0), (6.0, 3.0), (10.0, 2.0)]),
    (7, Carrier::Turtle, -2.0, &[(1.0, 1.0), (4.0, 1.0), (7.0, 1.0), (10.0, 1.0)]),
    (9, Carrier::Car, -2.5, &[(0.0, 2.0), (4.0, 2.0), (8.0, 2.0), (11.0, 1.5)]),
    (10, Carrier::Car, 3.0, &[(2.0, 1.5), (5.5, 1.5), (9.0, 1.5)]),
    (11, Carrier::Car, -3.0, &[(1.0, 2.0), (5.0, 1.5), (8.0, 2.0), (11.0, 1.5)]),
    (12, Carrier::Car, 2.0, &[(0.0, 2.5), (4.5, 2.0), (8.0, 2.0)]),
    (13, Carrier::Car, -3.5, &[(2.0, 2.0), (6.0, 2.0), (10.0, 2.0)]),
    (14, Carrier::Car, 4.0, &[(1.0, 1.5), (4.0, 2.0), (7.5, 1.5), (10.5, 1.5)]),
];

/// Something sliding along a lane, in grid units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneObject {
    pub x: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lane {
    pub kind: LaneKind,
    pub carrier: Option<Carrier>,
    /// Cells per second
    pub speed: f32,
    pub objects: Vec<LaneObject>,
}

impl Lane {
    fn empty(kind: LaneKind) -> Self {
        Self {
            kind,
            carrier: None,
            speed: 0.0,
            objects: Vec::new(),
        }
    }

    /// Slide one tick and wrap anything that left the grid
    fn advance(&mut self) {
        let cols = COLS as f32;
        for obj in &mut self.objects {
            obj.x += self.speed / TICKS_PER_SECOND as f32;
            if self.speed > 0.0 && obj.x > cols + obj.width {
                obj.x = -obj.width;
            } else if self.speed < 0.0 && obj.x < -obj.width {
                obj.x = cols;
            }
        }
    }

    fn covers(&self, x: f32) -> bool {
        self.objects.iter().any(|o| interval_covers(x, o.x, o.width))
    }
}

/// Fresh lanes for `level`
pub fn build_lanes(level: u32) -> Vec<Lane> {
    let scale = 1.0 + level.saturating_sub(1) as f32 * 0.2;
    let mut lanes: Vec<Lane> = LANE_KINDS.iter().map(|&k| Lane::empty(k)).collect();
    for &(row, carrier, speed, objects) in LANE_TABLE {
        let lane = &mut lanes[row as usize];
        lane.carrier = Some(carrier);
        lane.speed = speed * scale;
        lane.objects = objects
            .iter()
            .map(|&(x, width)| LaneObject { x, width })
            .collect();
    }
    lanes
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hop {
    to: (f32, i32),
    ticks: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Death {
    Drowned,
    SweptAway,
    HitByCar,
    TimeUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FroggerDelayed {
    NextHop,
}

pub struct Frogger {
    state: GameState,
    fx: ParticleSystem,
    rng: Pcg32,
    lanes: Vec<Lane>,
    /// Column is fractional while riding
    frog: (f32, i32),
    hop: Option<Hop>,
    queue: MoveQueue,
    follow_up_pending: bool,
    time_left: u32,
    timer_ticks: u32,
}

impl Frogger {
    pub fn new(seed: u64) -> Self {
        let mut game = Self {
            state: GameState::new(LIVES),
            fx: ParticleSystem::default(),
            rng: Pcg32::seed_from_u64(seed),
            lanes: build_lanes(1),
            frog: START,
            hop: None,
            queue: MoveQueue::new(),
            follow_up_pending: false,
            time_left: ROUND_SECONDS,
            timer_ticks: 0,
        };
        game.reset();
        game
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Horizontal grid position; fractional after riding
    pub fn x(&self) -> f32 {
        self.frog.0
    }

    pub fn row(&self) -> i32 {
        self.frog.1
    }

    pub fn is_hopping(&self) -> bool {
        self.hop.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    fn center(&self, col: f32, row: i32) -> Vec2 {
        grid_to_pixel(glam::IVec2::new(0, row), GRID) + Vec2::new(col * GRID, 0.0)
    }

    /// Begin a hop; moves that would leave the grid do nothing
    fn start_hop(&mut self, dir: Direction) -> bool {
        let delta = dir.delta();
        let x = (self.frog.0 + delta.x as f32).clamp(0.0, (COLS - 1) as f32);
        let row = (self.frog.1 + delta.y).clamp(0, LANES - 1);
        if x == self.frog.0 && row == self.frog.1 {
            return false;
        }
        if self.lanes[row as usize].kind == LaneKind::Water {
            let at = self.center(x, row);
            self.fx.spawn(EffectKind::Burst, at, 6, &mut self.rng);
        }
        self.hop = Some(Hop {
            to: (x, row),
            ticks: 0,
        });
        true
    }

    fn next_queued(&mut self) {
        while self.hop.is_none() {
            match self.queue.pop() {
                Some(dir) => {
                    self.start_hop(dir);
                }
                None => break,
            }
        }
    }

    /// Advance the hop animation; true when it lands this tick
    fn advance_hop(&mut self) -> bool {
        let Some(hop) = self.hop.as_mut() else {
            return false;
        };
        hop.ticks += 1;
        if hop.ticks < HOP_TICKS {
            return false;
        }
        self.frog = hop.to;
        self.hop = None;
        true
    }

    /// Hazard check at the frog's exact position. Riding moves the frog
    /// with the platform under it.
    fn check_position(&mut self, ride: bool) -> Option<Death> {
        let x = self.frog.0;
        let lane = &self.lanes[self.frog.1 as usize];
        match lane.kind {
            LaneKind::Water => {
                if !lane.covers(x) {
                    return Some(Death::Drowned);
                }
                if ride {
                    self.frog.0 += lane.speed / TICKS_PER_SECOND as f32;
                    if !(0.0..COLS as f32).contains(&self.frog.0) {
                        return Some(Death::SweptAway);
                    }
                }
                None
            }
            LaneKind::Road if lane.covers(x) => Some(Death::HitByCar),
            _ => None,
        }
    }

    fn die(&mut self, death: Death) {
        log::debug!("Frog lost: {:?}", death);
        let at = self.center(self.frog.0, self.frog.1);
        let kind = match death {
            Death::Drowned | Death::SweptAway => EffectKind::Burst,
            _ => EffectKind::Explosion { big: false },
        };
        self.fx.spawn(kind, at, 15, &mut self.rng);

        self.state.lose_life();
        self.frog = START;
        self.hop = None;
        self.queue.clear();
        self.follow_up_pending = false;
        if self.state.lives() == 0 {
            let _ = self.state.game_over();
        }
    }

    fn reach_goal(&mut self) {
        let bonus = GOAL_BONUS + self.time_left as u64 * 5;
        self.state.add_score(bonus);
        let at = self.center(self.frog.0, self.frog.1);
        self.fx.spawn(EffectKind::Debris, at, 20, &mut self.rng);

        if self.state.win().is_ok() && self.state.advance_level().is_ok() {
            self.lanes = build_lanes(self.state.level());
        }
        self.frog = START;
        self.hop = None;
        self.queue.clear();
        self.follow_up_pending = false;
        self.time_left = ROUND_SECONDS;
        self.timer_ticks = 0;
    }

    fn tick_timer(&mut self) {
        self.timer_ticks += 1;
        if self.timer_ticks % TICKS_PER_SECOND != 0 {
            return;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.die(Death::TimeUp);
            self.time_left = ROUND_SECONDS;
        }
    }

    fn carrier_color(carrier: Option<Carrier>) -> Color {
        match carrier {
            Some(Carrier::Log) => Color::BROWN,
            Some(Carrier::Turtle) => Color::GREEN,
            Some(Carrier::Car) => Color::RED,
            None => Color::GRAY,
        }
    }
}

impl ArcadeGame for Frogger {
    type Delayed = FroggerDelayed;
    const NAME: &'static str = "frogger";

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
        self.lanes = build_lanes(1);
        self.frog = START;
        self.hop = None;
        self.queue.clear();
        self.follow_up_pending = false;
        self.time_left = ROUND_SECONDS;
        self.timer_ticks = 0;
    }

    fn is_start_intent(&self, intents: &Intents) -> bool {
        intents.direction.is_some()
    }

    fn update(&mut self, intents: &Intents, _dt_ms: f32, delayed: &mut DelayedTasks<FroggerDelayed>) {
        for &dir in &intents.pressed {
            if self.hop.is_none() && !self.follow_up_pending && self.queue.is_empty() {
                self.start_hop(dir);
            } else {
                self.queue.push(dir);
            }
        }

        self.tick_timer();
        if self.state.phase != GamePhase::Running {
            return;
        }

        if self.advance_hop() {
            if let Some(death) = self.check_position(false) {
                self.die(death);
                return;
            }
            if self.frog.1 == 0 {
                self.reach_goal();
                return;
            }
            if !self.queue.is_empty() {
                self.follow_up_pending = true;
                delayed.schedule(FOLLOW_UP_MS, FroggerDelayed::NextHop);
            }
        }

        for lane in &mut self.lanes {
            lane.advance();
        }

        if self.hop.is_none() {
            if let Some(death) = self.check_position(true) {
                self.die(death);
            }
        }
    }

    fn on_delayed(&mut self, action: FroggerDelayed, _delayed: &mut DelayedTasks<FroggerDelayed>) {
        match action {
            FroggerDelayed::NextHop => {
                if self.follow_up_pending {
                    self.follow_up_pending = false;
                    self.next_queued();
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
        for (row, lane) in self.lanes.iter().enumerate() {
            let color = match lane.kind {
                LaneKind::Water => Color::BLUE,
                LaneKind::Road => Color::BLACK,
                LaneKind::Safe => Color::GRID,
                LaneKind::Goal => Color::GOLD,
            };
            let top = row as f32 * GRID;
            surface.fill_rect(Vec2::new(0.0, top), Vec2::new(FIELD.width, GRID), color);

            let obj_color = Self::carrier_color(lane.carrier);
            for obj in &lane.objects {
                surface.fill_rect(
                    Vec2::new(obj.x * GRID, top + 4.0),
                    Vec2::new(obj.width * GRID, GRID - 8.0),
                    obj_color,
                );
            }
        }

        // Ease in-out between cells while hopping
        let (col, row) = self.frog;
        let mut pos = self.center(col, row);
        if let Some(hop) = self.hop {
            let t = hop.ticks as f32 / HOP_TICKS as f32;
            let eased = if t < 0.5 { 2.0 * t * t } else { -1.0 + (4.0 - 2.0 * t) * t };
            let to = self.center(hop.to.0, hop.to.1);
            pos = pos.lerp(to, eased);
        }
        surface.fill_circle(pos, GRID * 0.35, Color::GREEN);

        let hud = format!(
            "Score {}   Lives {}   Level {}   Time {}",
            self.state.score(),
            self.state.lives(),
            self.state.level(),
            self.time_left
        );
        surface.text(Vec2::new(10.0, FIELD.height - 10.0), &hud, 16.0, Color::WHITE);
    }

    fn hud(&self) -> serde_json::Value {
        serde_json::json!({
            "time_left": self.time_left,
            "queued": self.queue.len(),
            "frog": { "x": self.frog.0, "row": self.frog.1 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Frogger {
        let mut game = Frogger::new(5);
        game.state.start().unwrap();
        game
    }

    fn press(dir: Direction) -> Intents {
        Intents {
            direction: Some(dir),
            pressed: vec![dir],
            ..Intents::default()
        }
    }

    fn tick(game: &mut Frogger, intents: &Intents, delayed: &mut DelayedTasks<FroggerDelayed>) {
        game.update(intents, 1000.0 / 60.0, delayed);
    }

    fn idle(game: &mut Frogger, ticks: usize, delayed: &mut DelayedTasks<FroggerDelayed>) {
        for _ in 0..ticks {
            tick(game, &Intents::default(), delayed);
        }
    }

    #[test]
    fn test_lane_layout() {
        let lanes = build_lanes(1);
        assert_eq!(lanes.len(), LANES as usize);
        assert_eq!(lanes[0].kind, LaneKind::Goal);
        assert_eq!(lanes[18].kind, LaneKind::Safe);
        assert_eq!(lanes[3].carrier, Some(Carrier::Turtle));
        assert_eq!(lanes[3].objects.len(), 5);
        assert_eq!(lanes[14].speed, 4.0);
        assert!(lanes[8].objects.is_empty());
    }

    #[test]
    fn test_lane_speed_scales_with_level() {
        let lanes = build_lanes(3);
        assert!((lanes[9].speed - -2.5 * 1.4).abs() < 1e-5);
    }

    #[test]
    fn test_lane_wraps() {
        let mut lane = build_lanes(1)[14].clone();
        lane.objects[0].x = COLS as f32 + 1.49;
        lane.advance();
        assert_eq!(lane.objects[0].x, -1.5);

        let mut lane = build_lanes(1)[9].clone();
        lane.objects[0].x = -1.99;
        lane.advance();
        assert_eq!(lane.objects[0].x, COLS as f32);
    }

    #[test]
    fn test_hop_takes_five_ticks() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        tick(&mut game, &press(Direction::Up), &mut delayed);
        assert!(game.is_hopping());
        assert_eq!(game.row(), 18);
        idle(&mut game, 4, &mut delayed);
        assert!(!game.is_hopping());
        assert_eq!(game.row(), 17);
    }

    #[test]
    fn test_edge_hop_is_ignored() {
        let mut game = running();
        game.frog = (0.0, 19);
        assert!(!game.start_hop(Direction::Down));
        assert!(!game.start_hop(Direction::Left));
        assert!(game.hop.is_none());
    }

    #[test]
    fn test_queue_holds_two_moves() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        tick(&mut game, &press(Direction::Up), &mut delayed);
        tick(&mut game, &press(Direction::Left), &mut delayed);
        tick(&mut game, &press(Direction::Left), &mut delayed);
        tick(&mut game, &press(Direction::Right), &mut delayed);
        assert_eq!(game.queued(), 2);
    }

    #[test]
    fn test_queued_move_follows_after_delay() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        tick(&mut game, &press(Direction::Up), &mut delayed);
        tick(&mut game, &press(Direction::Left), &mut delayed);
        idle(&mut game, 3, &mut delayed);
        assert!(!game.is_hopping());
        assert_eq!(delayed.len(), 1);

        // Presses while the follow-up is pending are buffered too
        tick(&mut game, &press(Direction::Up), &mut delayed);
        assert!(!game.is_hopping());
        assert_eq!(game.queued(), 2);

        let due = delayed.advance(FOLLOW_UP_MS);
        assert_eq!(due, vec![FroggerDelayed::NextHop]);
        game.on_delayed(FroggerDelayed::NextHop, &mut delayed);
        assert!(game.is_hopping());
        assert_eq!(game.queued(), 1);
        assert_eq!(game.hop.map(|h| h.to), Some((5.0, 17)));
    }

    #[test]
    fn test_car_hit() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.frog = (0.0, 9);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 4);
        assert_eq!(game.frog, START);
    }

    #[test]
    fn test_drowning() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.frog = (12.0, 2);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 4);
    }

    #[test]
    fn test_frog_rides_log() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.frog = (1.0, 2);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 5);
        assert!((game.frog.0 - (1.0 - 1.8 / 60.0)).abs() < 1e-5);
    }

    #[test]
    fn test_rider_near_the_edge_survives() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.frog = (12.49, 4);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 5);
        assert!((game.x() - (12.49 + 2.2 / 60.0)).abs() < 1e-4);
    }

    #[test]
    fn test_swept_off_the_edge() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.frog = (12.98, 4);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 4);
        assert_eq!(game.frog, START);
    }

    #[test]
    fn test_frog_judged_at_fractional_position() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.lanes[2].speed = 0.0;
        game.lanes[2].objects = vec![LaneObject { x: 1.2, width: 3.6 }];
        // Rounding 4.6 up to column 5 would put the frog in the water
        game.frog = (4.6, 2);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 5);
        assert_eq!(game.x(), 4.6);

        game.frog = (5.0, 2);
        tick(&mut game, &Intents::default(), &mut delayed);
        assert_eq!(game.state.lives(), 4);
    }

    #[test]
    fn test_hop_keeps_fractional_position() {
        let mut game = running();
        game.frog = (4.6, 2);
        assert!(game.start_hop(Direction::Up));
        assert_eq!(game.hop.map(|h| h.to), Some((4.6, 1)));
        game.frog = (12.5, 10);
        assert!(game.start_hop(Direction::Right));
        assert_eq!(game.hop.map(|h| h.to), Some((12.0, 10)));
    }

    #[test]
    fn test_timer_counts_down_and_expires() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        idle(&mut game, 60, &mut delayed);
        assert_eq!(game.time_left(), 59);

        game.time_left = 1;
        idle(&mut game, 60, &mut delayed);
        assert_eq!(game.state.lives(), 4);
        assert_eq!(game.time_left(), ROUND_SECONDS);
    }

    #[test]
    fn test_goal_bonus_and_level() {
        let mut game = running();
        let mut delayed = DelayedTasks::new();
        game.frog = (6.0, 1);
        tick(&mut game, &press(Direction::Up), &mut delayed);
        idle(&mut game, 4, &mut delayed);
        assert_eq!(game.state.score(), GOAL_BONUS + 60 * 5);
        assert_eq!(game.state.level(), 2);
        assert_eq!(game.state.phase, GamePhase::Running);
        assert_eq!(game.frog, START);
        assert!((game.lanes[9].speed - -2.5 * 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_death_clears_queue() {
        let mut game = running();
        game.queue.push(Direction::Up);
        game.die(Death::HitByCar);
        assert_eq!(game.queued(), 0);
        assert_eq!(game.state.lives(), 4);
    }

    #[test]
    fn test_fifth_death_ends_game() {
        let mut game = running();
        for _ in 0..LIVES {
            game.die(Death::Drowned);
        }
        assert!(game.state.is_over());
    }
}
