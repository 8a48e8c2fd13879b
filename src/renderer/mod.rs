//! Draw-primitive rendering seam
//!
//! Games render into a `RenderSurface` and never read anything back from it.
//! The host decides what a surface is (a canvas context, a test recorder).
//! `DrawList` is the in-memory surface used headless and in tests.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::ParticleSystem;

/// Linear RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const BLACK: Color = Color([0.0, 0.0, 0.0, 1.0]);
    pub const WHITE: Color = Color([1.0, 1.0, 1.0, 1.0]);
    pub const BACKGROUND: Color = Color([0.02, 0.02, 0.05, 1.0]);
    pub const GRID: Color = Color([0.12, 0.12, 0.18, 1.0]);
    pub const RED: Color = Color([1.0, 0.25, 0.2, 1.0]);
    pub const ORANGE: Color = Color([1.0, 0.55, 0.1, 1.0]);
    pub const YELLOW: Color = Color([1.0, 0.9, 0.2, 1.0]);
    pub const GOLD: Color = Color([0.9, 0.85, 0.3, 1.0]);
    pub const GREEN: Color = Color([0.2, 0.8, 0.4, 1.0]);
    pub const CYAN: Color = Color([0.3, 0.9, 1.0, 1.0]);
    pub const BLUE: Color = Color([0.25, 0.45, 1.0, 1.0]);
    pub const PURPLE: Color = Color([0.6, 0.2, 0.8, 1.0]);
    pub const BROWN: Color = Color([0.55, 0.35, 0.15, 1.0]);
    pub const GRAY: Color = Color([0.5, 0.5, 0.55, 1.0]);

    pub fn with_alpha(self, alpha: f32) -> Self {
        let [r, g, b, _] = self.0;
        Color([r, g, b, alpha.clamp(0.0, 1.0)])
    }

    pub fn alpha(&self) -> f32 {
        self.0[3]
    }
}

/// Primitive drawing operations a game needs
pub trait RenderSurface {
    fn clear(&mut self, color: Color);
    /// Offset applied to everything drawn afterwards (screen shake)
    fn set_origin(&mut self, origin: Vec2);
    fn fill_rect(&mut self, pos: Vec2, size: Vec2, color: Color);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color);
    fn text(&mut self, pos: Vec2, text: &str, size: f32, color: Color);
}

/// One recorded draw call, origin already applied
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Rect { pos: Vec2, size: Vec2, color: Color },
    Circle { center: Vec2, radius: f32, color: Color },
    Line { from: Vec2, to: Vec2, width: f32, color: Color },
    Text { pos: Vec2, text: String, size: f32, color: Color },
}

/// Recording surface
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    origin: Vec2,
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drop recorded commands (keeps the origin)
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Every text string drawn, in order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl RenderSurface for DrawList {
    fn clear(&mut self, color: Color) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
    }

    fn fill_rect(&mut self, pos: Vec2, size: Vec2, color: Color) {
        self.commands.push(DrawCommand::Rect {
            pos: pos + self.origin,
            size,
            color,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCommand::Circle {
            center: center + self.origin,
            radius,
            color,
        });
    }

    fn line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        self.commands.push(DrawCommand::Line {
            from: from + self.origin,
            to: to + self.origin,
            width,
            color,
        });
    }

    fn text(&mut self, pos: Vec2, text: &str, size: f32, color: Color) {
        self.commands.push(DrawCommand::Text {
            pos: pos + self.origin,
            text: text.to_string(),
            size,
            color,
        });
    }
}

/// Closed outline through `points`
pub fn polygon(surface: &mut dyn RenderSurface, points: &[Vec2], width: f32, color: Color) {
    for (i, &from) in points.iter().enumerate() {
        let to = points[(i + 1) % points.len()];
        surface.line(from, to, width, color);
    }
}

/// Draw every live particle, faded by remaining life
pub fn draw_particles(surface: &mut dyn RenderSurface, particles: &ParticleSystem) {
    for p in particles.iter() {
        surface.fill_circle(p.pos, p.size, p.color.with_alpha(p.alpha()));
    }
}

/// Centered overlay banner (READY, PAUSED, GAME OVER)
pub fn banner(surface: &mut dyn RenderSurface, center: Vec2, title: &str, subtitle: &str) {
    surface.text(center - Vec2::new(0.0, 20.0), title, 32.0, Color::WHITE);
    if !subtitle.is_empty() {
        surface.text(center + Vec2::new(0.0, 20.0), subtitle, 16.0, Color::GRAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_offsets_later_draws() {
        let mut list = DrawList::new();
        list.clear(Color::BLACK);
        list.fill_circle(Vec2::new(10.0, 10.0), 2.0, Color::WHITE);
        list.set_origin(Vec2::new(3.0, -1.0));
        list.fill_circle(Vec2::new(10.0, 10.0), 2.0, Color::WHITE);
        let centers: Vec<Vec2> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Circle { center, .. } => Some(*center),
                _ => None,
            })
            .collect();
        assert_eq!(centers, vec![Vec2::new(10.0, 10.0), Vec2::new(13.0, 9.0)]);
    }

    #[test]
    fn test_polygon_closes() {
        let mut list = DrawList::new();
        let tri = [Vec2::ZERO, Vec2::X, Vec2::Y];
        polygon(&mut list, &tri, 1.0, Color::WHITE);
        assert_eq!(list.commands().len(), 3);
        assert_eq!(
            list.commands()[2],
            DrawCommand::Line {
                from: Vec2::Y,
                to: Vec2::ZERO,
                width: 1.0,
                color: Color::WHITE
            }
        );
    }

    #[test]
    fn test_clear_starts_a_new_frame() {
        let mut list = DrawList::new();
        list.text(Vec2::ZERO, "old", 12.0, Color::WHITE);
        list.clear(Color::BACKGROUND);
        assert_eq!(list.commands().len(), 1);
        assert_eq!(list.texts().count(), 0);
    }
}
