//! Keyboard and pointer input mapping
//!
//! Raw key codes and pointer events are buffered as they arrive and turned
//! into one `Intents` record per simulation tick. Edge-triggered actions
//! (pause, secondary, a fresh direction press, a click) are consumed by the
//! poll; held state and the pointer position persist.

use std::collections::{HashMap, VecDeque};

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::sim::GamePhase;

/// DOM key codes the cabinet understands
pub mod keycode {
    pub const ENTER: u32 = 13;
    pub const ESCAPE: u32 = 27;
    pub const SPACE: u32 = 32;
    pub const LEFT: u32 = 37;
    pub const UP: u32 = 38;
    pub const RIGHT: u32 = 39;
    pub const DOWN: u32 = 40;
}

/// Cardinal direction in screen space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// One-cell grid step
    pub fn delta(self) -> IVec2 {
        match self {
            Direction::Up => IVec2::new(0, -1),
            Direction::Down => IVec2::new(0, 1),
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// What a bound key does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Move(Direction),
    Fire,
    Pause,
    Secondary,
}

/// Key code to action table
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    table: HashMap<u32, Action>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let table = HashMap::from([
            (keycode::LEFT, Action::Move(Direction::Left)),
            (keycode::UP, Action::Move(Direction::Up)),
            (keycode::RIGHT, Action::Move(Direction::Right)),
            (keycode::DOWN, Action::Move(Direction::Down)),
            (keycode::SPACE, Action::Fire),
            (keycode::ENTER, Action::Secondary),
            (keycode::ESCAPE, Action::Pause),
        ]);
        Self { table }
    }
}

impl KeyBindings {
    /// Override (or add) one entry
    pub fn with(mut self, code: u32, action: Action) -> Self {
        self.table.insert(code, action);
        self
    }

    pub fn action(&self, code: u32) -> Option<Action> {
        self.table.get(&code).copied()
    }
}

/// Intents for one simulation tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intents {
    /// Direction pressed since the last poll (most recent wins)
    pub direction: Option<Direction>,
    /// Every direction pressed since the last poll, in arrival order
    pub pressed: Vec<Direction>,
    /// Directions currently held, oldest first
    pub held: Vec<Direction>,
    /// A shot is due this tick
    pub fire: bool,
    pub pause: bool,
    pub secondary: bool,
    /// Last known pointer position in field coordinates
    pub aim: Option<Vec2>,
    /// Clicks since the last poll, in arrival order
    pub clicks: Vec<Vec2>,
}

impl Intents {
    pub fn is_empty(&self) -> bool {
        self.direction.is_none()
            && !self.fire
            && !self.pause
            && !self.secondary
            && self.clicks.is_empty()
    }

    pub fn holding(&self, direction: Direction) -> bool {
        self.held.contains(&direction)
    }
}

/// Turns key events into per-tick intents
#[derive(Debug, Clone)]
pub struct InputMapper {
    bindings: KeyBindings,
    held: Vec<Direction>,
    pressed: Vec<Direction>,
    fire_held: bool,
    fire_tapped: bool,
    pause_tapped: bool,
    secondary_tapped: bool,
    fire_cooldown: u32,
    cooldown_left: u32,
    aim: Option<Vec2>,
    clicks: Vec<Vec2>,
}

impl InputMapper {
    pub fn new(bindings: KeyBindings, fire_cooldown: u32) -> Self {
        Self {
            bindings,
            held: Vec::new(),
            pressed: Vec::new(),
            fire_held: false,
            fire_tapped: false,
            pause_tapped: false,
            secondary_tapped: false,
            fire_cooldown,
            cooldown_left: 0,
            aim: None,
            clicks: Vec::new(),
        }
    }

    /// Record a key press. Returns false for unmapped codes.
    pub fn key_down(&mut self, code: u32) -> bool {
        let Some(action) = self.bindings.action(code) else {
            log::debug!("Ignoring unmapped key {}", code);
            return false;
        };
        match action {
            Action::Move(dir) => {
                // Auto-repeat of a held key is not a new press
                if !self.held.contains(&dir) {
                    self.held.push(dir);
                    self.pressed.push(dir);
                }
            }
            Action::Fire => {
                if !self.fire_held {
                    self.fire_tapped = true;
                }
                self.fire_held = true;
            }
            Action::Pause => self.pause_tapped = true,
            Action::Secondary => self.secondary_tapped = true,
        }
        true
    }

    /// Record a key release. Returns false for unmapped codes.
    pub fn key_up(&mut self, code: u32) -> bool {
        let Some(action) = self.bindings.action(code) else {
            return false;
        };
        match action {
            Action::Move(dir) => self.held.retain(|d| *d != dir),
            Action::Fire => self.fire_held = false,
            Action::Pause | Action::Secondary => {}
        }
        true
    }

    /// Track the pointer over the field
    pub fn pointer_move(&mut self, pos: Vec2) {
        if pos.is_finite() {
            self.aim = Some(pos);
        }
    }

    /// Record a click. The click also moves the aim point.
    pub fn pointer_down(&mut self, pos: Vec2) {
        if pos.is_finite() {
            self.aim = Some(pos);
            self.clicks.push(pos);
        }
    }

    /// The pointer left the field
    pub fn pointer_leave(&mut self) {
        self.aim = None;
    }

    /// Produce this tick's intents, gated by the game phase.
    ///
    /// `Running` gets everything. `Ready` gets everything too so the caller
    /// can decide whether it qualifies as a start input (and then drops it).
    /// `Paused` only sees the pause toggle. `Won` and `GameOver` see nothing.
    /// Edge-triggered input is consumed in every phase.
    pub fn poll(&mut self, phase: GamePhase) -> Intents {
        let pressed = std::mem::take(&mut self.pressed);
        let pause = std::mem::take(&mut self.pause_tapped);
        let secondary = std::mem::take(&mut self.secondary_tapped);
        let clicks = std::mem::take(&mut self.clicks);

        match phase {
            GamePhase::Running => {
                self.cooldown_left = self.cooldown_left.saturating_sub(1);
                let wants_fire = self.fire_tapped || self.fire_held;
                let fire = wants_fire && self.cooldown_left == 0;
                if fire {
                    self.fire_tapped = false;
                    self.cooldown_left = self.fire_cooldown;
                }
                Intents {
                    direction: pressed.last().copied(),
                    pressed,
                    held: self.held.clone(),
                    fire,
                    pause,
                    secondary,
                    aim: self.aim,
                    clicks,
                }
            }
            GamePhase::Ready => {
                let fire = std::mem::take(&mut self.fire_tapped);
                Intents {
                    direction: pressed.last().copied(),
                    pressed,
                    held: self.held.clone(),
                    fire,
                    pause,
                    secondary,
                    aim: self.aim,
                    clicks,
                }
            }
            GamePhase::Paused => {
                self.fire_tapped = false;
                Intents {
                    pause,
                    ..Intents::default()
                }
            }
            GamePhase::Won | GamePhase::GameOver => {
                self.fire_tapped = false;
                Intents::default()
            }
        }
    }

    /// Forget all held and pending input
    pub fn clear(&mut self) {
        self.held.clear();
        self.pressed.clear();
        self.fire_held = false;
        self.fire_tapped = false;
        self.pause_tapped = false;
        self.secondary_tapped = false;
        self.cooldown_left = 0;
        self.aim = None;
        self.clicks.clear();
    }
}

/// Bounded FIFO of buffered grid moves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveQueue {
    moves: VecDeque<Direction>,
}

impl MoveQueue {
    pub const CAPACITY: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a move. A move arriving while the queue is full is rejected.
    pub fn push(&mut self, dir: Direction) -> bool {
        if self.moves.len() >= Self::CAPACITY {
            log::debug!("Move queue full, dropping {:?}", dir);
            return false;
        }
        self.moves.push_back(dir);
        true
    }

    pub fn pop(&mut self) -> Option<Direction> {
        self.moves.pop_front()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(cooldown: u32) -> InputMapper {
        InputMapper::new(KeyBindings::default(), cooldown)
    }

    #[test]
    fn test_default_table() {
        let b = KeyBindings::default();
        assert_eq!(b.action(37), Some(Action::Move(Direction::Left)));
        assert_eq!(b.action(40), Some(Action::Move(Direction::Down)));
        assert_eq!(b.action(32), Some(Action::Fire));
        assert_eq!(b.action(13), Some(Action::Secondary));
        assert_eq!(b.action(27), Some(Action::Pause));
        assert_eq!(b.action(65), None);
    }

    #[test]
    fn test_override_binding() {
        let b = KeyBindings::default().with(keycode::SPACE, Action::Pause);
        assert_eq!(b.action(keycode::SPACE), Some(Action::Pause));
    }

    #[test]
    fn test_unmapped_key_is_ignored() {
        let mut input = mapper(5);
        assert!(!input.key_down(65));
        assert!(input.poll(GamePhase::Running).is_empty());
    }

    #[test]
    fn test_direction_press_then_held() {
        let mut input = mapper(5);
        input.key_down(keycode::LEFT);
        let first = input.poll(GamePhase::Running);
        assert_eq!(first.direction, Some(Direction::Left));
        assert!(first.holding(Direction::Left));

        let second = input.poll(GamePhase::Running);
        assert_eq!(second.direction, None);
        assert!(second.holding(Direction::Left));

        input.key_up(keycode::LEFT);
        assert!(input.poll(GamePhase::Running).held.is_empty());
    }

    #[test]
    fn test_held_fire_respects_cooldown() {
        let mut input = mapper(5);
        input.key_down(keycode::SPACE);
        let shots: Vec<bool> = (0..11)
            .map(|_| input.poll(GamePhase::Running).fire)
            .collect();
        let fired: Vec<usize> = shots
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.then_some(i))
            .collect();
        assert_eq!(fired, vec![0, 5, 10]);
    }

    #[test]
    fn test_tap_yields_one_shot() {
        let mut input = mapper(8);
        input.key_down(keycode::SPACE);
        input.key_up(keycode::SPACE);
        assert!(input.poll(GamePhase::Running).fire);
        assert!(!input.poll(GamePhase::Running).fire);
    }

    #[test]
    fn test_paused_only_sees_pause() {
        let mut input = mapper(5);
        input.key_down(keycode::LEFT);
        input.key_down(keycode::SPACE);
        input.key_down(keycode::ESCAPE);
        let intents = input.poll(GamePhase::Paused);
        assert!(intents.pause);
        assert!(intents.direction.is_none());
        assert!(!intents.fire);
        assert!(intents.held.is_empty());
    }

    #[test]
    fn test_game_over_drops_everything() {
        let mut input = mapper(5);
        input.key_down(keycode::ESCAPE);
        input.key_down(keycode::UP);
        assert!(input.poll(GamePhase::GameOver).is_empty());
    }

    #[test]
    fn test_clicks_are_edges_aim_persists() {
        let mut input = mapper(5);
        input.pointer_move(Vec2::new(10.0, 20.0));
        input.pointer_down(Vec2::new(50.0, 60.0));
        input.pointer_down(Vec2::new(70.0, 80.0));
        let first = input.poll(GamePhase::Running);
        assert_eq!(first.clicks, vec![Vec2::new(50.0, 60.0), Vec2::new(70.0, 80.0)]);
        assert_eq!(first.aim, Some(Vec2::new(70.0, 80.0)));
        assert!(!first.is_empty());

        let second = input.poll(GamePhase::Running);
        assert!(second.clicks.is_empty());
        assert_eq!(second.aim, Some(Vec2::new(70.0, 80.0)));

        input.pointer_leave();
        assert_eq!(input.poll(GamePhase::Running).aim, None);
    }

    #[test]
    fn test_paused_drops_clicks() {
        let mut input = mapper(5);
        input.pointer_down(Vec2::new(1.0, 1.0));
        assert!(input.poll(GamePhase::Paused).clicks.is_empty());
        assert!(input.poll(GamePhase::Running).clicks.is_empty());
        input.pointer_down(Vec2::new(f32::NAN, 1.0));
        assert!(input.poll(GamePhase::Running).clicks.is_empty());
    }

    #[test]
    fn test_move_queue_rejects_third() {
        let mut queue = MoveQueue::new();
        assert!(queue.push(Direction::Up));
        assert!(queue.push(Direction::Left));
        assert!(!queue.push(Direction::Right));
        assert_eq!(queue.pop(), Some(Direction::Up));
        assert_eq!(queue.pop(), Some(Direction::Left));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_opposites() {
        for dir in [Direction::Up, Direction::Down, Direction::Left, Direction::Right] {
            assert_eq!(dir.delta() + dir.opposite().delta(), IVec2::ZERO);
        }
    }
}
