//! Snake
//!
//! 20x20 grid. The snake advances one cell per move-timer interval; the
//! interval shrinks by 2 ms per food down to 80 ms. Walls and the snake's own
//! body are fatal.

use std::collections::VecDeque;
use std::convert::Infallible;

use glam::{IVec2, Vec2};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::platform::{Action, DelayedTasks, Direction, Intents, KeyBindings, keycode};
use crate::renderer::{Color, RenderSurface};
use crate::sim::{EffectKind, GameState, MoveTimer, ParticleSystem, cell_occupied};
use crate::widget::ArcadeGame;
use crate::{Bounds, grid_to_pixel};

pub const BOARD_CELLS: i32 = 20;
pub const CELL_SIZE: f32 = 20.0;
const START: IVec2 = IVec2::new(10, 10);
const START_INTERVAL_MS: f32 = 150.0;
const MIN_INTERVAL_MS: f32 = 80.0;
const SPEEDUP_MS: f32 = 2.0;
/// Celebrate every time the length hits a multiple of this
const MILESTONE: usize = 5;
const CELEBRATION_TICKS: u32 = 60;

pub struct Snake {
    state: GameState,
    fx: ParticleSystem,
    rng: Pcg32,
    /// Head first
    body: VecDeque<IVec2>,
    heading: Direction,
    next_heading: Direction,
    food: Option<IVec2>,
    timer: MoveTimer,
    celebration: u32,
}

impl Snake {
    pub fn new(seed: u64) -> Self {
        let mut snake = Self {
            state: GameState::new(1),
            fx: ParticleSystem::default(),
            rng: Pcg32::seed_from_u64(seed),
            body: VecDeque::new(),
            heading: Direction::Right,
            next_heading: Direction::Right,
            food: None,
            timer: MoveTimer::new(START_INTERVAL_MS),
            celebration: 0,
        };
        snake.reset();
        snake
    }

    pub fn body(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.body.iter().copied()
    }

    pub fn head(&self) -> IVec2 {
        self.body.front().copied().unwrap_or(START)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn food(&self) -> Option<IVec2> {
        self.food
    }

    pub fn interval_ms(&self) -> f32 {
        self.timer.interval_ms()
    }

    fn in_board(cell: IVec2) -> bool {
        cell.x >= 0 && cell.x < BOARD_CELLS && cell.y >= 0 && cell.y < BOARD_CELLS
    }

    /// Put food on a random empty cell; none left means no food
    fn place_food(&mut self) {
        let body: Vec<IVec2> = self.body.iter().copied().collect();
        let empty: Vec<IVec2> = (0..BOARD_CELLS)
            .flat_map(|x| (0..BOARD_CELLS).map(move |y| IVec2::new(x, y)))
            .filter(|cell| !cell_occupied(*cell, &body))
            .collect();
        self.food = if empty.is_empty() {
            None
        } else {
            Some(empty[self.rng.random_range(0..empty.len())])
        };
    }

    /// Queue a turn. Reversing onto the neck is refused.
    fn steer(&mut self, dir: Direction) {
        if dir != self.heading.opposite() {
            self.next_heading = dir;
        }
    }

    /// Advance one cell
    fn advance(&mut self) {
        self.heading = self.next_heading;
        let head = self.head() + self.heading.delta();

        let body: Vec<IVec2> = self.body.iter().copied().collect();
        if !Self::in_board(head) || cell_occupied(head, &body) {
            let at = grid_to_pixel(self.head(), CELL_SIZE);
            self.fx.spawn(EffectKind::Explosion { big: true }, at, 20, &mut self.rng);
            let _ = self.state.game_over();
            log::info!("Snake crashed at length {}", self.body.len());
            return;
        }

        self.body.push_front(head);

        if self.food == Some(head) {
            self.state.add_score(self.body.len() as u64 * 10);
            let at = grid_to_pixel(head, CELL_SIZE);
            self.fx.spawn(EffectKind::Burst, at, 12, &mut self.rng);
            self.place_food();

            if self.timer.interval_ms() > MIN_INTERVAL_MS {
                let faster = (self.timer.interval_ms() - SPEEDUP_MS).max(MIN_INTERVAL_MS);
                self.timer.set_interval(faster);
            }

            if self.body.len() % MILESTONE == 0 {
                self.celebration = CELEBRATION_TICKS;
                let center = self.bounds().center();
                self.fx.spawn(EffectKind::Debris, center, 30, &mut self.rng);
            }
        } else {
            self.body.pop_back();
        }
    }
}

impl ArcadeGame for Snake {
    type Delayed = Infallible;
    const NAME: &'static str = "snake";

    fn bindings() -> KeyBindings {
        KeyBindings::default().with(keycode::SPACE, Action::Pause)
    }

    fn bounds(&self) -> Bounds {
        let side = BOARD_CELLS as f32 * CELL_SIZE;
        Bounds::new(side, side)
    }

    fn state(&self) -> &GameState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    fn reset(&mut self) {
        self.state = GameState::new(1);
        self.fx.clear();
        self.body = VecDeque::from([START]);
        self.heading = Direction::Right;
        self.next_heading = Direction::Right;
        self.timer = MoveTimer::new(START_INTERVAL_MS);
        self.celebration = 0;
        self.place_food();
    }

    /// Only an arrow starts the run
    fn is_start_intent(&self, intents: &Intents) -> bool {
        intents.direction.is_some()
    }

    fn update(&mut self, intents: &Intents, dt_ms: f32, _delayed: &mut DelayedTasks<Infallible>) {
        for &dir in &intents.pressed {
            self.steer(dir);
        }

        self.celebration = self.celebration.saturating_sub(1);
        if self.rng.random::<f32>() < 0.3 {
            let jitter = Vec2::new(self.rng.random::<f32>() - 0.5, self.rng.random::<f32>() - 0.5);
            let at = grid_to_pixel(self.head(), CELL_SIZE) + jitter * CELL_SIZE;
            self.fx.spawn(EffectKind::Trail, at, 1, &mut self.rng);
        }

        if self.timer.advance(dt_ms) {
            self.advance();
        }
    }

    fn on_delayed(&mut self, action: Infallible, _delayed: &mut DelayedTasks<Infallible>) {
        match action {}
    }

    fn effects(&self) -> &ParticleSystem {
        &self.fx
    }

    fn effects_mut(&mut self) -> &mut ParticleSystem {
        &mut self.fx
    }

    fn render(&self, surface: &mut dyn RenderSurface) {
        let cell = Vec2::splat(CELL_SIZE - 2.0);
        for i in 0..=BOARD_CELLS {
            let at = i as f32 * CELL_SIZE;
            let side = BOARD_CELLS as f32 * CELL_SIZE;
            surface.line(Vec2::new(at, 0.0), Vec2::new(at, side), 1.0, Color::GRID);
            surface.line(Vec2::new(0.0, at), Vec2::new(side, at), 1.0, Color::GRID);
        }

        if let Some(food) = self.food {
            let pulse = (self.state.frame_count as f32 * 0.1).sin() * 0.5 + 0.5;
            let radius = CELL_SIZE * (0.3 + 0.1 * pulse);
            surface.fill_circle(grid_to_pixel(food, CELL_SIZE), radius, Color::GOLD);
        }

        let body_color = if self.celebration > 0 { Color::GOLD } else { Color::GREEN };
        for (i, segment) in self.body.iter().enumerate() {
            let color = if i == 0 { Color::CYAN } else { body_color };
            let corner = segment.as_vec2() * CELL_SIZE + Vec2::ONE;
            surface.fill_rect(corner, cell, color);
        }

        let score = format!("Score {}", self.state.score());
        surface.text(Vec2::new(8.0, 16.0), &score, 14.0, Color::WHITE);
    }

    fn hud(&self) -> serde_json::Value {
        serde_json::json!({
            "length": self.body.len(),
            "interval_ms": self.timer.interval_ms(),
        })
    }
}
