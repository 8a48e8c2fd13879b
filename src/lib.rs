//! Arcade Cabinet - arcade game widgets on a shared engine core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entities, step, collisions, game state, effects)
//! - `games`: Snake, Tetris, Asteroids and Frogger built on `sim`
//! - `platform`: Input mapping and frame scheduling
//! - `persistence`: Key-value store seam (LocalStorage on web)
//! - `renderer`: Draw-primitive surface the games render into
//! - `widget`: Host lifecycle wrapper tying everything together

pub mod games;
pub mod highscores;
pub mod persistence;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod widget;

pub use highscores::BestScore;
pub use settings::{QualityPreset, Settings};
pub use widget::{GameWidget, WidgetError, WidgetHost};

use glam::{IVec2, Vec2};

/// Engine configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Fixed timestep in milliseconds, used by ms-based game timers
    pub const SIM_DT_MS: f32 = 1000.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest frame delta accepted by the scheduler (seconds)
    pub const MAX_FRAME_DT: f32 = 0.1;

    /// Default particle cap when no settings are loaded
    pub const MAX_PARTICLES: usize = 512;
}

/// Axis-aligned board bounds, half-open: `[0, width) x [0, height)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when `pos` lies inside the half-open board rectangle.
    /// A coordinate equal to 0 is inside; one equal to the extent is not.
    #[inline]
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= 0.0 && pos.x < self.width && pos.y >= 0.0 && pos.y < self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// Euclidean distance between two points
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Largest representable value strictly below `extent`
#[inline]
fn inside_limit(extent: f32) -> f32 {
    (extent - extent.abs().max(1.0) * f32::EPSILON).max(0.0)
}

/// Wrap a scalar into `[0, extent)`
#[inline]
pub fn wrap_scalar(value: f32, extent: f32) -> f32 {
    if extent <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs
    if wrapped >= extent { 0.0 } else { wrapped }
}

/// Wrap a position toroidally into the board
#[inline]
pub fn wrap_position(pos: Vec2, bounds: Bounds) -> Vec2 {
    Vec2::new(
        wrap_scalar(pos.x, bounds.width),
        wrap_scalar(pos.y, bounds.height),
    )
}

/// Clamp a position so it stays inside the board
#[inline]
pub fn clamp_position(pos: Vec2, bounds: Bounds) -> Vec2 {
    let x = if pos.x.is_finite() { pos.x } else { 0.0 };
    let y = if pos.y.is_finite() { pos.y } else { 0.0 };
    Vec2::new(
        x.clamp(0.0, inside_limit(bounds.width)),
        y.clamp(0.0, inside_limit(bounds.height)),
    )
}

/// Center of a grid cell in pixels
#[inline]
pub fn grid_to_pixel(cell: IVec2, cell_size: f32) -> Vec2 {
    Vec2::new(
        cell.x as f32 * cell_size + cell_size / 2.0,
        cell.y as f32 * cell_size + cell_size / 2.0,
    )
}

/// Grid cell containing a pixel position
#[inline]
pub fn pixel_to_grid(pos: Vec2, cell_size: f32) -> IVec2 {
    IVec2::new(
        (pos.x / cell_size).floor() as i32,
        (pos.y / cell_size).floor() as i32,
    )
}

/// Unit vector from `from` toward `to`.
///
/// Returns zero when the points coincide or anything is non-finite, so
/// "move toward target" AI never divides by a zero distance.
#[inline]
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    let delta = to - from;
    if !delta.is_finite() {
        return Vec2::ZERO;
    }
    delta.normalize_or_zero()
}
