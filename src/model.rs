//! Domain entities and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grid::Coord;
use crate::profit::ModifierLine;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

id_type!(MapId);
id_type!(TileId);
id_type!(BuildingId);
id_type!(CompanyId);
id_type!(UserId);

/// Terrain category of a tile. Closed set; catalog rules are keyed on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Open,
    Water,
    Road,
    Track,
    Wooded,
}

impl Terrain {
    pub fn label(self) -> &'static str {
        match self {
            Terrain::Open => "open land",
            Terrain::Water => "water",
            Terrain::Road => "road",
            Terrain::Track => "unpaved track",
            Terrain::Wooded => "wooded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub map: MapId,
    pub x: i32,
    pub y: i32,
    pub terrain: Terrain,
    /// Administrator-placed structure (town hall, monument, ...). Never ownable.
    pub special: Option<String>,
    pub owner: Option<CompanyId>,
    pub acquired_at: Option<DateTime<Utc>>,
}

impl Tile {
    pub fn pos(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// Water and road tiles, and tiles carrying a special structure,
    /// can never be owned by a company.
    pub fn purchasable(&self) -> bool {
        !matches!(self.terrain, Terrain::Water | Terrain::Road) && self.special.is_none()
    }
}

/// Cached derived profit for a building. `value` and `breakdown` are
/// written only by a committed recompute batch; everything else may only
/// flip `dirty` to true.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfitCache {
    pub value: i64,
    pub breakdown: Vec<ModifierLine>,
    pub dirty: bool,
}

impl ProfitCache {
    pub fn stale() -> Self {
        Self {
            value: 0,
            breakdown: Vec::new(),
            dirty: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub tile: TileId,
    pub map: MapId,
    pub x: i32,
    pub y: i32,
    /// Building type slug, resolved against the catalog.
    pub kind: String,
    pub owner: CompanyId,
    /// Structural damage in percent, 0..=100.
    pub damage: u8,
    pub on_fire: bool,
    pub collapsed: bool,
    /// Listing price when the owner has put the building up for sale.
    pub for_sale: Option<i64>,
    pub profit: ProfitCache,
}

impl Building {
    pub fn pos(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// Heavily damaged buildings drag down their neighbors' profit.
    pub fn heavily_damaged(&self) -> bool {
        self.damage > 50
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub user: UserId,
    /// Absent while the company sits in the lobby, unplaced.
    pub map: Option<MapId>,
    pub cash: i64,
    pub offshore: i64,
    /// Derived from (cash, actions) against the tier catalog; raised only
    /// by the progression tracker, never lowered.
    pub level: u32,
    pub actions: u64,
    pub imprisoned: bool,
    pub fine: i64,
    pub last_action: Option<DateTime<Utc>>,
    pub idle_ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationTier {
    Town,
    City,
    Capital,
}

impl LocationTier {
    /// Multiplier on land and construction prices.
    pub fn cost_multiplier(self) -> f64 {
        match self {
            LocationTier::Town => 1.0,
            LocationTier::City => 1.5,
            LocationTier::Capital => 2.5,
        }
    }

    pub fn starting_capital(self) -> i64 {
        match self {
            LocationTier::Town => 20_000,
            LocationTier::City => 50_000,
            LocationTier::Capital => 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapInfo {
    pub id: MapId,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub tier: LocationTier,
    /// Day of week (0 = Monday) on which enforcement sweeps run.
    pub enforcement_day: u8,
}

impl MapInfo {
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && c.x < self.width && c.y < self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    BuyLand,
    Build,
    Demolish,
    PayFine,
    LevelUp,
    Income,
    Damage,
    Imprison,
}

/// Append-only audit record of a mutating action. Never updated or
/// deleted; the only source other subsystems read history from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub company: CompanyId,
    pub kind: ActionKind,
    pub tile: Option<TileId>,
    pub building: Option<BuildingId>,
    pub target_company: Option<CompanyId>,
    pub amount: i64,
    pub detail: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(terrain: Terrain, special: Option<&str>) -> Tile {
        Tile {
            id: TileId::new(1),
            map: MapId::new(1),
            x: 0,
            y: 0,
            terrain,
            special: special.map(str::to_string),
            owner: None,
            acquired_at: None,
        }
    }

    #[test]
    fn water_and_road_are_never_purchasable() {
        assert!(!tile(Terrain::Water, None).purchasable());
        assert!(!tile(Terrain::Road, None).purchasable());
        assert!(tile(Terrain::Open, None).purchasable());
        assert!(tile(Terrain::Track, None).purchasable());
        assert!(tile(Terrain::Wooded, None).purchasable());
    }

    #[test]
    fn special_structures_block_purchase() {
        assert!(!tile(Terrain::Open, Some("town_hall")).purchasable());
    }

    #[test]
    fn map_bounds() {
        let map = MapInfo {
            id: MapId::new(1),
            name: "test".into(),
            width: 10,
            height: 5,
            tier: LocationTier::Town,
            enforcement_day: 0,
        };
        assert!(map.contains(Coord::new(0, 0)));
        assert!(map.contains(Coord::new(9, 4)));
        assert!(!map.contains(Coord::new(10, 0)));
        assert!(!map.contains(Coord::new(-1, 2)));
    }
}
