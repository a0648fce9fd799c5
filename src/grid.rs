//! Grid coordinates and the per-pass coordinate index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Building, Tile};

/// Radius of the neighborhood window that influences a building's profit
/// (Chebyshev distance, so a 5x5 block minus its center).
pub const ADJACENCY_RADIUS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn chebyshev(self, other: Coord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Coordinates within `radius` of self, center excluded, in row-major
    /// order. Callers filter out-of-map coordinates by lookup misses.
    pub fn window(self, radius: i32) -> impl Iterator<Item = Coord> {
        let center = self;
        (-radius..=radius).flat_map(move |dy| {
            (-radius..=radius).filter_map(move |dx| {
                if dx == 0 && dy == 0 {
                    None
                } else {
                    Some(Coord::new(center.x + dx, center.y + dy))
                }
            })
        })
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Coordinate-keyed lookups over one map's rows, built once per recompute
/// pass so per-building calculation never re-queries storage.
pub struct GridIndex<'a> {
    tiles: HashMap<Coord, &'a Tile>,
    buildings: HashMap<Coord, &'a Building>,
}

impl<'a> GridIndex<'a> {
    /// Collapsed buildings are left out: they neither earn nor count as
    /// neighbor-synergy contributors.
    pub fn build(tiles: &'a [Tile], buildings: &'a [Building]) -> Self {
        let tiles = tiles.iter().map(|t| (t.pos(), t)).collect();
        let buildings = buildings
            .iter()
            .filter(|b| !b.collapsed)
            .map(|b| (b.pos(), b))
            .collect();
        Self { tiles, buildings }
    }

    pub fn tile_at(&self, c: Coord) -> Option<&'a Tile> {
        self.tiles.get(&c).copied()
    }

    pub fn building_at(&self, c: Coord) -> Option<&'a Building> {
        self.buildings.get(&c).copied()
    }
}
