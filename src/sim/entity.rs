//! Entity store
//!
//! Typed actors with position, velocity and optional lifetime. The store
//! keeps entities sorted by id so every pass iterates in a stable order.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Stable entity identifier (never reused within a store)
pub type EntityId = u32;

/// What an entity is. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Projectile,
    Hostile,
    Collectible,
}

/// What happens when an entity leaves the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Boundary {
    /// Re-enter from the opposite edge
    #[default]
    Wrap,
    /// Stop at the edge
    Clamp,
    /// Removed on exit
    DieOnExit,
}

/// Result of one hit on a hostile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
    /// Removed outright
    Destroyed,
    /// Removed and replaced by this many smaller entities
    Split(u8),
    /// Absorbed the hit; health left
    Damaged { remaining: u8 },
}

/// A simulated game object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// Ticks left before expiry (None = lives until killed)
    pub lifetime: Option<u32>,
    pub boundary: Boundary,
    pub health: u8,
    /// Replacement count when destroyed (0 = does not split)
    pub splits: u8,
    /// Size class for splitting hostiles (0 = largest)
    pub tier: u8,
    /// Ticks during which collisions with hostiles are ignored
    pub invulnerable: u32,
    /// Facing angle in radians
    pub angle: f32,
    pub spin: f32,
}

impl Entity {
    pub fn new(kind: EntityKind, pos: Vec2, vel: Vec2, radius: f32) -> Self {
        Self {
            id: 0,
            kind,
            pos,
            vel,
            radius,
            lifetime: None,
            boundary: Boundary::default(),
            health: 1,
            splits: 0,
            tier: 0,
            invulnerable: 0,
            angle: 0.0,
            spin: 0.0,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn with_lifetime(mut self, ticks: u32) -> Self {
        self.lifetime = Some(ticks);
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_health(mut self, health: u8) -> Self {
        self.health = health.max(1);
        self
    }

    pub fn with_splits(mut self, splits: u8, tier: u8) -> Self {
        self.splits = splits;
        self.tier = tier;
        self
    }

    /// Apply one hit and report what it did.
    ///
    /// Health above one absorbs the hit; the last point of health either
    /// destroys the entity or splits it.
    pub fn take_hit(&mut self) -> HitOutcome {
        if self.health > 1 {
            self.health -= 1;
            return HitOutcome::Damaged {
                remaining: self.health,
            };
        }
        self.health = 0;
        if self.splits > 0 {
            HitOutcome::Split(self.splits)
        } else {
            HitOutcome::Destroyed
        }
    }
}

/// Owner of every live entity in one game instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    entities: Vec<Entity>,
    next_id: EntityId,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            next_id: 1,
        }
    }

    /// Insert an entity and return its new id
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        entity.id = id;
        // Ids only grow, so pushing keeps the vec sorted
        self.entities.push(entity);
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index_of(id).map(|i| &self.entities[i])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index_of(id).map(move |i| &mut self.entities[i])
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entities.binary_search_by_key(&id, |e| e.id).ok()
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.index_of(id).map(|i| self.entities.remove(i))
    }

    /// Remove every entity whose id is in `ids`
    pub fn remove_all(&mut self, ids: &[EntityId]) {
        if !ids.is_empty() {
            self.entities.retain(|e| !ids.contains(&e.id));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Entities of one kind, in id order
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.of_kind(kind).count()
    }

    /// First player entity, if any
    pub fn player(&self) -> Option<&Entity> {
        self.of_kind(EntityKind::Player).next()
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|e| e.kind == EntityKind::Player)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop all entities of one kind
    pub fn clear_kind(&mut self, kind: EntityKind) {
        self.entities.retain(|e| e.kind != kind);
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
