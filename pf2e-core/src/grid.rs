//! The battle grid.
//!
//! Distances are measured in squares. Straight steps cost 1 and diagonal
//! steps alternate between 1 and 2, starting with 1, so three diagonal steps
//! cost 1 + 2 + 1 = 4.

use crate::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A square on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Returned by lookups for entities that are not on the grid.
    pub const INVALID: Position = Position { x: -1, y: -1 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        *self != Position::INVALID
    }

    fn chebyshev(&self, other: Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Occupancy map over a bounded `width` x `height` area.
///
/// At most one entity per square; an entity is on one square or none.
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: HashMap<Position, EntityId>,
}

impl Grid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
            cells: HashMap::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.cells.contains_key(&pos)
    }

    pub fn entity_at(&self, pos: Position) -> Option<EntityId> {
        self.cells.get(&pos).copied()
    }

    /// Put an entity on an empty, in-bounds square.
    pub fn place(&mut self, pos: Position, entity: EntityId) -> bool {
        if !self.in_bounds(pos) || self.is_occupied(pos) || self.position_of(entity).is_valid() {
            return false;
        }
        self.cells.insert(pos, entity);
        true
    }

    /// Move whatever occupies `from` to `to`.
    pub fn move_entity(&mut self, from: Position, to: Position) -> bool {
        if !self.in_bounds(to) || self.is_occupied(to) {
            return false;
        }
        match self.cells.remove(&from) {
            Some(entity) => {
                self.cells.insert(to, entity);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, pos: Position) -> Option<EntityId> {
        self.cells.remove(&pos)
    }

    /// Linear scan; [`Position::INVALID`] when the entity is not placed.
    pub fn position_of(&self, entity: EntityId) -> Position {
        self.cells
            .iter()
            .find(|(_, occupant)| **occupant == entity)
            .map(|(pos, _)| *pos)
            .unwrap_or(Position::INVALID)
    }

    pub fn distance(&self, a: Position, b: Position) -> i32 {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        let diagonals = dx.min(dy);
        let straights = dx.max(dy) - diagonals;
        // Every second diagonal costs an extra square.
        diagonals + diagonals / 2 + straights
    }

    /// Distance between two placed entities.
    pub fn distance_between(&self, a: EntityId, b: EntityId) -> Option<i32> {
        let pa = self.position_of(a);
        let pb = self.position_of(b);
        (pa.is_valid() && pb.is_valid()).then(|| self.distance(pa, pb))
    }

    pub fn adjacent(&self, a: Position, b: Position) -> bool {
        a != b && a.chebyshev(b) <= 1
    }

    /// The in-bounds squares around `pos`.
    pub fn neighbors(&self, pos: Position) -> Vec<Position> {
        let mut out = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let candidate = Position::new(pos.x + dx, pos.y + dy);
                if candidate != pos && self.in_bounds(candidate) {
                    out.push(candidate);
                }
            }
        }
        out
    }

    /// Pick the free square within `max_range` of `from` that ends closest to
    /// `target`.
    ///
    /// Ties prefer the shorter move, then scan order (row-major). Returns
    /// `from` when no reachable square is closer than where we stand.
    /// Occupied squares along the way are not treated as obstacles.
    pub fn best_move_toward(&self, from: Position, target: Position, max_range: i32) -> Position {
        let mut best = from;
        let mut best_remaining = self.distance(from, target);
        let mut best_cost = 0;

        if max_range <= 0 {
            return from;
        }

        let min_x = (from.x - max_range).max(0);
        let max_x = (from.x + max_range).min(self.width - 1);
        let min_y = (from.y - max_range).max(0);
        let max_y = (from.y + max_range).min(self.height - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let candidate = Position::new(x, y);
                if candidate == from || self.is_occupied(candidate) {
                    continue;
                }
                let cost = self.distance(from, candidate);
                if cost > max_range {
                    continue;
                }
                let remaining = self.distance(candidate, target);
                let better = remaining < best_remaining
                    || (remaining == best_remaining && best != from && cost < best_cost);
                if better {
                    best = candidate;
                    best_remaining = remaining;
                    best_cost = cost;
                }
            }
        }

        best
    }

    /// Every occupied square with its occupant.
    pub fn occupants(&self) -> impl Iterator<Item = (Position, EntityId)> + '_ {
        self.cells.iter().map(|(pos, id)| (*pos, *id))
    }
}
