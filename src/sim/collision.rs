//! Collision detection and resolution
//!
//! Shape tests (circle, cell, interval) plus the fixed-order resolver that
//! turns an entity snapshot into collision events.

use std::collections::HashSet;

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityKind, EntityStore};

/// Which pair of classes collided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionKind {
    /// `a` is the projectile, `b` the hostile
    ProjectileHostile,
    /// `a` is the hostile, `b` the player
    HostilePlayer,
    /// `a` is the player, `b` the collectible
    PlayerCollectible,
}

/// One collision, consumed in the same tick it is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub a: EntityId,
    pub b: EntityId,
    pub kind: CollisionKind,
}

/// Strict circle overlap: touching circles do not collide
#[inline]
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance(b) < ra + rb
}

/// Point-in-circle test for games that only model the target's radius
#[inline]
pub fn point_in_circle(point: Vec2, center: Vec2, radius: f32) -> bool {
    point.distance(center) < radius
}

/// Whether `cell` is one of `occupied`
#[inline]
pub fn cell_occupied(cell: IVec2, occupied: &[IVec2]) -> bool {
    occupied.contains(&cell)
}

/// Whether a grid position lies on a horizontal span starting at `x` with `width`.
///
/// The span covers `[floor(x), ceil(x + width))`. `grid_x` may sit between
/// columns, as a rider carried by a platform does.
#[inline]
pub fn interval_covers(grid_x: f32, x: f32, width: f32) -> bool {
    grid_x >= x.floor() && grid_x < (x + width).ceil()
}

/// Evaluate every collision in the store.
///
/// Order is fixed: projectiles vs hostiles, then hostiles vs player, then
/// player vs collectibles. Within a pass entities are visited by ascending
/// id. A projectile hits at most one hostile, and a hostile already hit by a
/// projectile this tick cannot also hit the player, so a simultaneous
/// mutual kill goes to the shooter. Hostiles are skipped entirely while the
/// player is invulnerable.
pub fn resolve(store: &EntityStore) -> Vec<CollisionEvent> {
    let mut events = Vec::new();
    let mut hit_hostiles: HashSet<EntityId> = HashSet::new();

    for projectile in store.of_kind(EntityKind::Projectile) {
        let target = store.of_kind(EntityKind::Hostile).find(|h| {
            !hit_hostiles.contains(&h.id())
                && circles_overlap(projectile.pos, projectile.radius, h.pos, h.radius)
        });
        if let Some(hostile) = target {
            hit_hostiles.insert(hostile.id());
            events.push(CollisionEvent {
                a: projectile.id(),
                b: hostile.id(),
                kind: CollisionKind::ProjectileHostile,
            });
        }
    }

    let Some(player) = store.player() else {
        return events;
    };

    if player.invulnerable == 0 {
        let hit = store.of_kind(EntityKind::Hostile).find(|h| {
            !hit_hostiles.contains(&h.id())
                && circles_overlap(h.pos, h.radius, player.pos, player.radius)
        });
        if let Some(hostile) = hit {
            events.push(CollisionEvent {
                a: hostile.id(),
                b: player.id(),
                kind: CollisionKind::HostilePlayer,
            });
        }
    }

    for item in store.of_kind(EntityKind::Collectible) {
        if circles_overlap(player.pos, player.radius, item.pos, item.radius) {
            events.push(CollisionEvent {
                a: player.id(),
                b: item.id(),
                kind: CollisionKind::PlayerCollectible,
            });
        }
    }

    events
}
