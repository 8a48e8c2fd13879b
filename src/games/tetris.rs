//! Tetris
//!
//! 10x20 board, seven pieces with fixed rotation tables, gravity from a drop
//! timer that speeds up every 10 lines. Clearing `n` rows scores
//! `n * 100 * level` at the level the rows were cleared on.

use std::convert::Infallible;

use glam::{IVec2, Vec2};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::platform::{DelayedTasks, Direction, Intents};
use crate::renderer::{Color, RenderSurface};
use crate::sim::{EffectKind, GameState, MoveTimer, ParticleSystem};
use crate::widget::ArcadeGame;
use crate::{Bounds, grid_to_pixel};

pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;
pub const CELL_SIZE: f32 = 30.0;
const PREVIEW_WIDTH: f32 = 120.0;
const LINES_PER_LEVEL: u32 = 10;
/// Ticks a sideways/down key must be held before it repeats
const REPEAT_DELAY: u32 = 10;
const REPEAT_EVERY: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    /// Rotation states as rows of `#` (filled) and `.` (empty)
    pub fn rotations(self) -> &'static [&'static [&'static str]] {
        match self {
            PieceKind::I => &[&["....", "####", "....", "...."], &[".#..", ".#..", ".#..", ".#.."]],
            PieceKind::O => &[&["##", "##"]],
            PieceKind::T => &[
                &[".#.", "###", "..."],
                &["#..", "##.", "#.."],
                &["...", "###", ".#."],
                &[".#.", "##.", ".#."],
            ],
            PieceKind::S => &[&[".##", "##.", "..."], &["#..", "##.", ".#."]],
            PieceKind::Z => &[&["##.", ".##", "..."], &[".#.", "##.", "#.."]],
            PieceKind::J => &[
                &["#..", "###", "..."],
                &[".##", ".#.", ".#."],
                &["...", "###", "..#"],
                &[".#.", ".#.", "##."],
            ],
            PieceKind::L => &[
                &["..#", "###", "..."],
                &[".#.", ".#.", ".##"],
                &["...", "###", "#.."],
                &["##.", ".#.", ".#."],
            ],
        }
    }

    pub fn color(self) -> Color {
        match self {
            PieceKind::I => Color::CYAN,
            PieceKind::O => Color::YELLOW,
            PieceKind::T => Color::PURPLE,
            PieceKind::S => Color::GREEN,
            PieceKind::Z => Color::RED,
            PieceKind::J => Color::BLUE,
            PieceKind::L => Color::ORANGE,
        }
    }
}

/// A falling piece: kind, rotation index and the top-left of its shape box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub rotation: usize,
    pub pos: IVec2,
}

impl Piece {
    pub fn spawn(kind: PieceKind) -> Self {
        Self {
            kind,
            rotation: 0,
            pos: IVec2::new(BOARD_WIDTH as i32 / 2 - 1, 0),
        }
    }

    /// Board cells covered by this piece
    pub fn cells(&self) -> impl Iterator<Item = IVec2> + '_ {
        let shape = self.kind.rotations()[self.rotation];
        shape.iter().enumerate().flat_map(move |(y, row)| {
            row.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'#')
                .map(move |(x, _)| self.pos + IVec2::new(x as i32, y as i32))
        })
    }

    pub fn shifted(&self, by: IVec2) -> Self {
        Self {
            pos: self.pos + by,
            ..*self
        }
    }

    pub fn rotated(&self) -> Self {
        Self {
            rotation: (self.rotation + 1) % self.kind.rotations().len(),
            ..*self
        }
    }
}

/// Locked cells, row 0 at the top
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: Vec<[Option<PieceKind>; BOARD_WIDTH]>,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            rows: vec![[None; BOARD_WIDTH]; BOARD_HEIGHT],
        }
    }
}

impl Board {
    pub fn get(&self, cell: IVec2) -> Option<PieceKind> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        self.rows
            .get(cell.y as usize)
            .and_then(|row| row.get(cell.x as usize).copied().flatten())
    }

    /// Inside the walls and floor and not overlapping locked cells.
    /// Cells above the top row are allowed.
    pub fn fits(&self, piece: &Piece) -> bool {
        piece.cells().all(|c| {
            c.x >= 0
                && c.x < BOARD_WIDTH as i32
                && c.y < BOARD_HEIGHT as i32
                && (c.y < 0 || self.get(c).is_none())
        })
    }

    /// Write a piece into the board (cells above the top are lost)
    pub fn lock(&mut self, piece: &Piece) {
        for c in piece.cells() {
            if c.y >= 0 && (c.y as usize) < BOARD_HEIGHT && c.x >= 0 && (c.x as usize) < BOARD_WIDTH {
                self.rows[c.y as usize][c.x as usize] = Some(piece.kind);
            }
        }
    }

    /// Remove every full row in one pass and shift the rest down.
    /// Returns the cleared row indices, bottom first.
    pub fn clear_full_rows(&mut self) -> Vec<usize> {
        let cleared: Vec<usize> = (0..BOARD_HEIGHT)
            .rev()
            .filter(|&y| self.rows[y].iter().all(Option::is_some))
            .collect();
        if cleared.is_empty() {
            return cleared;
        }
        let mut kept: Vec<_> = self
            .rows
            .iter()
            .filter(|row| !row.iter().all(Option::is_some))
            .copied()
            .collect();
        let mut rows = vec![[None; BOARD_WIDTH]; cleared.len()];
        rows.append(&mut kept);
        self.rows = rows;
        cleared
    }

    pub fn filled(&self) -> usize {
        self.rows.iter().flatten().filter(|c| c.is_some()).count()
    }
}

pub struct Tetris {
    state: GameState,
    fx: ParticleSystem,
    rng: Pcg32,
    board: Board,
    current: Piece,
    next: PieceKind,
    lines: u32,
    drop_timer: MoveTimer,
    /// Ticks each direction has been held, for key repeat
    held_ticks: u32,
    level_flash: u32,
}

fn drop_interval_ms(level: u32) -> f32 {
    let reduction = level.saturating_sub(1).saturating_mul(50);
    500u32.saturating_sub(reduction).max(50) as f32
}

impl Tetris {
    pub fn new(seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let current = Piece::spawn(Self::random_kind(&mut rng));
        let next = Self::random_kind(&mut rng);
        let mut tetris = Self {
            state: GameState::new(1),
            fx: ParticleSystem::default(),
            rng,
            board: Board::default(),
            current,
            next,
            lines: 0,
            drop_timer: MoveTimer::new(drop_interval_ms(1)),
            held_ticks: 0,
            level_flash: 0,
        };
        tetris.reset();
        tetris
    }

    fn random_kind(rng: &mut impl Rng) -> PieceKind {
        PieceKind::ALL[rng.random_range(0..PieceKind::ALL.len())]
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current(&self) -> &Piece {
        &self.current
    }

    pub fn next(&self) -> PieceKind {
        self.next
    }

    pub fn lines(&self) -> u32 {
        self.lines
    }

    /// Where the current piece would land
    pub fn ghost(&self) -> Piece {
        let mut ghost = self.current;
        while self.board.fits(&ghost.shifted(IVec2::Y)) {
            ghost = ghost.shifted(IVec2::Y);
        }
        ghost
    }

    /// Apply a move if the result fits
    fn try_move(&mut self, dir: Direction) -> bool {
        let candidate = match dir {
            Direction::Left | Direction::Right | Direction::Down => self.current.shifted(dir.delta()),
            Direction::Up => self.current.rotated(),
        };
        if self.board.fits(&candidate) {
            self.current = candidate;
            true
        } else {
            false
        }
    }

    /// Gravity step: fall one row or lock and spawn the next piece
    fn drop_step(&mut self) {
        if self.try_move(Direction::Down) {
            return;
        }
        self.board.lock(&self.current);
        self.clear_lines();

        self.current = Piece::spawn(self.next);
        self.next = Self::random_kind(&mut self.rng);
        if !self.board.fits(&self.current) {
            let center = self.bounds().center();
            self.fx.spawn(EffectKind::Explosion { big: true }, center, 20, &mut self.rng);
            let _ = self.state.game_over();
            log::info!("Tetris topped out after {} lines", self.lines);
        }
    }

    fn clear_lines(&mut self) {
        let cleared = self.board.clear_full_rows();
        if cleared.is_empty() {
            return;
        }
        let count = cleared.len() as u32;
        let level = self.state.level();
        self.state.add_score(count as u64 * 100 * level as u64);
        self.lines += count;

        for &row in &cleared {
            for x in (0..BOARD_WIDTH as i32).step_by(2) {
                let at = grid_to_pixel(IVec2::new(x, row as i32), CELL_SIZE);
                self.fx.spawn(EffectKind::Debris, at, 2, &mut self.rng);
            }
        }

        let new_level = self.lines / LINES_PER_LEVEL + 1;
        if new_level > level {
            self.state.set_level(new_level);
            self.drop_timer.set_interval(drop_interval_ms(new_level));
            self.level_flash = 60;
            self.fx.add_shake(15.0);
            log::info!("Tetris level {}", new_level);
        }
    }

    fn draw_piece(surface: &mut dyn RenderSurface, piece: &Piece, color: Color) {
        let size = Vec2::splat(CELL_SIZE - 1.0);
        for c in piece.cells().filter(|c| c.y >= 0) {
            surface.fill_rect(c.as_vec2() * CELL_SIZE, size, color);
        }
    }
}

impl ArcadeGame for Tetris {
    type Delayed = Infallible;
    const NAME: &'static str = "tetris";

    fn bounds(&self) -> Bounds {
        Bounds::new(
            BOARD_WIDTH as f32 * CELL_SIZE + PREVIEW_WIDTH,
            BOARD_HEIGHT as f32 * CELL_SIZE,
        )
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
        self.board = Board::default();
        self.current = Piece::spawn(Self::random_kind(&mut self.rng));
        self.next = Self::random_kind(&mut self.rng);
        self.lines = 0;
        self.drop_timer = MoveTimer::new(drop_interval_ms(1));
        self.held_ticks = 0;
        self.level_flash = 0;
    }

    fn update(&mut self, intents: &Intents, dt_ms: f32, _delayed: &mut DelayedTasks<Infallible>) {
        for &dir in &intents.pressed {
            self.try_move(dir);
        }

        // Held sideways/down keys repeat; rotation never does
        let repeating = intents
            .held
            .last()
            .copied()
            .filter(|d| *d != Direction::Up);
        match repeating {
            Some(dir) if intents.direction.is_none() => {
                self.held_ticks += 1;
                if self.held_ticks >= REPEAT_DELAY && (self.held_ticks - REPEAT_DELAY) % REPEAT_EVERY == 0 {
                    self.try_move(dir);
                }
            }
            Some(_) => self.held_ticks = 0,
            None => self.held_ticks = 0,
        }

        self.level_flash = self.level_flash.saturating_sub(1);

        if self.drop_timer.advance(dt_ms) {
            self.drop_step();
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
        let size = Vec2::splat(CELL_SIZE - 1.0);
        for y in 0..BOARD_HEIGHT as i32 {
            for x in 0..BOARD_WIDTH as i32 {
                let cell = IVec2::new(x, y);
                let color = self.board.get(cell).map_or(Color::GRID, PieceKind::color);
                surface.fill_rect(cell.as_vec2() * CELL_SIZE, size, color);
            }
        }

        if !self.state.is_over() {
            Self::draw_piece(surface, &self.ghost(), self.current.kind.color().with_alpha(0.3));
            Self::draw_piece(surface, &self.current, self.current.kind.color());
        }

        let panel_x = BOARD_WIDTH as f32 * CELL_SIZE + 10.0;
        surface.text(Vec2::new(panel_x, 20.0), "NEXT", 14.0, Color::WHITE);
        let preview = Piece {
            kind: self.next,
            rotation: 0,
            pos: IVec2::ZERO,
        };
        for c in preview.cells() {
            let corner = Vec2::new(panel_x, 40.0) + c.as_vec2() * (CELL_SIZE * 0.6);
            surface.fill_rect(corner, Vec2::splat(CELL_SIZE * 0.6 - 1.0), self.next.color());
        }

        let stats = [
            format!("Score {}", self.state.score()),
            format!("Lines {}", self.lines),
            format!("Level {}", self.state.level()),
        ];
        for (i, line) in stats.iter().enumerate() {
            let color = if i == 2 && self.level_flash > 0 { Color::GOLD } else { Color::WHITE };
            surface.text(Vec2::new(panel_x, 140.0 + i as f32 * 24.0), line, 14.0, color);
        }
    }

    fn hud(&self) -> serde_json::Value {
        serde_json::json!({
            "lines": self.lines,
            "next": self.next,
            "drop_interval_ms": self.drop_timer.interval_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(seed: u64) -> Tetris {
        let mut tetris = Tetris::new(seed);
        tetris.state.start().unwrap();
        tetris
    }

    fn fill_row(board: &mut Board, y: usize, gap: Option<usize>) {
        for x in 0..BOARD_WIDTH {
            if Some(x) != gap {
                board.rows[y][x] = Some(PieceKind::O);
            }
        }
    }

    #[test]
    fn test_full_bottom_row_clears_and_scores() {
        let mut tetris = running(1);
        fill_row(&mut tetris.board, BOARD_HEIGHT - 1, None);
        tetris.board.rows[BOARD_HEIGHT - 2][3] = Some(PieceKind::T);

        tetris.clear_lines();

        assert_eq!(tetris.state.score(), 100);
        assert_eq!(tetris.lines, 1);
        // The lone block above fell one row
        assert_eq!(tetris.board.get(IVec2::new(3, BOARD_HEIGHT as i32 - 1)), Some(PieceKind::T));
        assert_eq!(tetris.board.filled(), 1);
    }

    #[test]
    fn test_multi_line_clear_uses_current_level() {
        let mut tetris = running(1);
        tetris.state.set_level(3);
        tetris.lines = 25;
        for y in BOARD_HEIGHT - 2..BOARD_HEIGHT {
            fill_row(&mut tetris.board, y, None);
        }
        tetris.clear_lines();
        assert_eq!(tetris.state.score(), 2 * 100 * 3);
        assert_eq!(tetris.lines, 27);
        assert_eq!(tetris.state.level(), 3);
    }

    #[test]
    fn test_non_adjacent_rows_shift_by_cleared_count() {
        let mut board = Board::default();
        fill_row(&mut board, 19, None);
        fill_row(&mut board, 18, Some(0));
        fill_row(&mut board, 17, None);
        board.rows[16][5] = Some(PieceKind::L);

        let cleared = board.clear_full_rows();

        assert_eq!(cleared, vec![19, 17]);
        // Partial row dropped from 18 to 19, marker from 16 to 18
        assert_eq!(board.get(IVec2::new(0, 19)), None);
        assert_eq!(board.get(IVec2::new(1, 19)), Some(PieceKind::O));
        assert_eq!(board.get(IVec2::new(5, 18)), Some(PieceKind::L));
    }

    #[test]
    fn test_level_up_every_ten_lines() {
        let mut tetris = running(1);
        tetris.lines = 9;
        fill_row(&mut tetris.board, BOARD_HEIGHT - 1, None);
        tetris.clear_lines();
        assert_eq!(tetris.state.level(), 2);
        assert_eq!(tetris.drop_timer.interval_ms(), 450.0);
        // Scored at level 1
        assert_eq!(tetris.state.score(), 100);
    }

    #[test]
    fn test_drop_interval_floor() {
        assert_eq!(drop_interval_ms(1), 500.0);
        assert_eq!(drop_interval_ms(5), 300.0);
        assert_eq!(drop_interval_ms(10), 50.0);
        assert_eq!(drop_interval_ms(40), 50.0);
    }

    #[test]
    fn test_spawn_position() {
        let piece = Piece::spawn(PieceKind::O);
        assert_eq!(piece.pos, IVec2::new(4, 0));
        let cells: Vec<IVec2> = piece.cells().collect();
        assert_eq!(
            cells,
            vec![IVec2::new(4, 0), IVec2::new(5, 0), IVec2::new(4, 1), IVec2::new(5, 1)]
        );
    }

    #[test]
    fn test_every_rotation_has_four_cells() {
        for kind in PieceKind::ALL {
            let mut piece = Piece::spawn(kind);
            for _ in 0..kind.rotations().len() {
                assert_eq!(piece.cells().count(), 4, "{:?} rotation {}", kind, piece.rotation);
                piece = piece.rotated();
            }
            assert_eq!(piece.rotation, 0);
        }
    }

    #[test]
    fn test_walls_block_moves() {
        let mut tetris = running(1);
        tetris.current = Piece {
            kind: PieceKind::O,
            rotation: 0,
            pos: IVec2::new(0, 5),
        };
        assert!(!tetris.try_move(Direction::Left));
        assert!(tetris.try_move(Direction::Right));
    }

    #[test]
    fn test_rotation_into_wall_is_refused() {
        let mut tetris = running(1);
        // Vertical I hugging the right wall: column 9
        tetris.current = Piece {
            kind: PieceKind::I,
            rotation: 1,
            pos: IVec2::new(8, 5),
        };
        assert!(!tetris.try_move(Direction::Up));
        assert_eq!(tetris.current.rotation, 1);
    }

    #[test]
    fn test_piece_locks_on_floor() {
        let mut tetris = running(1);
        tetris.current = Piece {
            kind: PieceKind::O,
            rotation: 0,
            pos: IVec2::new(0, BOARD_HEIGHT as i32 - 2),
        };
        tetris.drop_step();
        assert_eq!(tetris.board.filled(), 4);
        assert_eq!(tetris.current.pos, IVec2::new(4, 0));
    }

    #[test]
    fn test_ghost_lands_on_floor() {
        let tetris = running(1);
        let ghost = tetris.ghost();
        let lowest = ghost.cells().map(|c| c.y).max().unwrap();
        assert_eq!(lowest, BOARD_HEIGHT as i32 - 1);
    }

    #[test]
    fn test_blocked_spawn_ends_game() {
        let mut tetris = running(1);
        // Columns 0..8 filled everywhere, so no row can complete
        for row in tetris.board.rows.iter_mut() {
            for cell in row.iter_mut().take(8) {
                *cell = Some(PieceKind::Z);
            }
        }
        // Vertical I resting in the last column
        tetris.current = Piece {
            kind: PieceKind::I,
            rotation: 1,
            pos: IVec2::new(8, BOARD_HEIGHT as i32 - 4),
        };
        tetris.drop_step();
        assert!(tetris.board.clear_full_rows().is_empty());
        assert!(tetris.state.is_over());
    }
}
