//! Persistence seam.
//!
//! The core talks to storage through the [`Store`] trait: row loads, an
//! all-or-nothing [`Store::batch_write`], and an append-only log. Guards
//! on individual ops (unowned tile, free slot, non-negative cash) turn
//! lost races into [`StoreError::Conflict`] for the whole batch.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! demo binary; a relational adapter slots in behind the same trait.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::grid::Coord;
use crate::model::{
    Building, BuildingId, Company, CompanyId, LogEntry, MapId, MapInfo, Tile, TileId,
};
use crate::profit::ModifierLine;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found: {0}")]
    Missing(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

/// One row mutation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Transfer an unowned tile to a company. Fails the batch if the tile
    /// is owned at commit time.
    ClaimTile {
        tile: TileId,
        owner: CompanyId,
        at: DateTime<Utc>,
    },
    ReleaseTile {
        tile: TileId,
    },
    /// Insert a building. Fails the batch if the tile already hosts a
    /// non-collapsed building.
    InsertBuilding(Building),
    SetCollapsed {
        building: BuildingId,
    },
    SetDamage {
        building: BuildingId,
        damage: u8,
        on_fire: bool,
    },
    /// Recompute commit: cached value and breakdown, dirty cleared.
    SetProfit {
        building: BuildingId,
        profit: i64,
        breakdown: Vec<ModifierLine>,
    },
    MarkDirty {
        building: BuildingId,
    },
    /// Fails the batch if the resulting balance would be negative.
    AdjustCash {
        company: CompanyId,
        delta: i64,
    },
    SetLevel {
        company: CompanyId,
        level: u32,
    },
    /// Count one gated action: bump the counter, reset the idle tick
    /// counter, stamp the time.
    RecordAction {
        company: CompanyId,
        at: DateTime<Utc>,
    },
    SetPrison {
        company: CompanyId,
        imprisoned: bool,
        fine: i64,
    },
    AppendLog(LogEntry),
}

pub trait Store: Send + Sync {
    /// Opaque unique identifier for a new row.
    fn allocate_id(&self) -> u64;

    fn load_maps(&self) -> impl std::future::Future<Output = Result<Vec<MapInfo>, StoreError>> + Send;
    fn load_map(&self, map: MapId) -> impl std::future::Future<Output = Result<MapInfo, StoreError>> + Send;
    fn load_tiles(&self, map: MapId) -> impl std::future::Future<Output = Result<Vec<Tile>, StoreError>> + Send;
    fn load_tile(&self, tile: TileId) -> impl std::future::Future<Output = Result<Tile, StoreError>> + Send;
    fn load_tile_at(
        &self,
        map: MapId,
        at: Coord,
    ) -> impl std::future::Future<Output = Result<Option<Tile>, StoreError>> + Send;
    fn load_buildings(
        &self,
        map: MapId,
        only_dirty: bool,
    ) -> impl std::future::Future<Output = Result<Vec<Building>, StoreError>> + Send;
    fn load_building(
        &self,
        building: BuildingId,
    ) -> impl std::future::Future<Output = Result<Building, StoreError>> + Send;
    fn load_company(
        &self,
        company: CompanyId,
    ) -> impl std::future::Future<Output = Result<Company, StoreError>> + Send;

    /// Apply every op or none of them.
    fn batch_write(
        &self,
        ops: Vec<WriteOp>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    fn append_log(
        &self,
        entry: LogEntry,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Clone, Default)]
struct State {
    maps: HashMap<MapId, MapInfo>,
    tiles: HashMap<TileId, Tile>,
    tile_coords: HashMap<(MapId, Coord), TileId>,
    buildings: HashMap<BuildingId, Building>,
    /// Active (non-collapsed) building per tile.
    occupied: HashMap<TileId, BuildingId>,
    companies: HashMap<CompanyId, Company>,
    log: Vec<LogEntry>,
}

pub struct MemoryStore {
    state: Mutex<State>,
    ids: Mutex<ChaCha8Rng>,
}

impl MemoryStore {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ids: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("store lock poisoned")
    }

    // Seeding hooks for scenarios and tests; row creation beyond the
    // gated actions is CRUD that lives outside the core.

    pub fn insert_map(&self, map: MapInfo) {
        self.lock().maps.insert(map.id, map);
    }

    pub fn insert_tile(&self, tile: Tile) {
        let mut state = self.lock();
        state.tile_coords.insert((tile.map, tile.pos()), tile.id);
        state.tiles.insert(tile.id, tile);
    }

    pub fn insert_company(&self, company: Company) {
        self.lock().companies.insert(company.id, company);
    }

    pub fn insert_building(&self, building: Building) {
        let mut state = self.lock();
        if !building.collapsed {
            state.occupied.insert(building.tile, building.id);
        }
        state.buildings.insert(building.id, building);
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.lock().log.clone()
    }
}

fn apply(state: &mut State, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::ClaimTile { tile, owner, at } => {
            let row = state
                .tiles
                .get_mut(&tile)
                .ok_or_else(|| StoreError::Missing(format!("tile {}", tile.raw())))?;
            if row.owner.is_some() {
                return Err(StoreError::Conflict(format!(
                    "tile {} already owned",
                    tile.raw()
                )));
            }
            row.owner = Some(owner);
            row.acquired_at = Some(at);
        }
        WriteOp::ReleaseTile { tile } => {
            let row = state
                .tiles
                .get_mut(&tile)
                .ok_or_else(|| StoreError::Missing(format!("tile {}", tile.raw())))?;
            row.owner = None;
            row.acquired_at = None;
        }
        WriteOp::InsertBuilding(building) => {
            if !state.tiles.contains_key(&building.tile) {
                return Err(StoreError::Missing(format!("tile {}", building.tile.raw())));
            }
            if state.occupied.contains_key(&building.tile) {
                return Err(StoreError::Conflict(format!(
                    "tile {} already hosts a building",
                    building.tile.raw()
                )));
            }
            state.occupied.insert(building.tile, building.id);
            state.buildings.insert(building.id, building);
        }
        WriteOp::SetCollapsed { building } => {
            let row = state
                .buildings
                .get_mut(&building)
                .ok_or_else(|| StoreError::Missing(format!("building {}", building.raw())))?;
            row.collapsed = true;
            row.for_sale = None;
            state.occupied.remove(&row.tile);
        }
        WriteOp::SetDamage {
            building,
            damage,
            on_fire,
        } => {
            let row = state
                .buildings
                .get_mut(&building)
                .ok_or_else(|| StoreError::Missing(format!("building {}", building.raw())))?;
            row.damage = damage.min(100);
            row.on_fire = on_fire;
        }
        WriteOp::SetProfit {
            building,
            profit,
            breakdown,
        } => {
            let row = state
                .buildings
                .get_mut(&building)
                .ok_or_else(|| StoreError::Missing(format!("building {}", building.raw())))?;
            row.profit.value = profit;
            row.profit.breakdown = breakdown;
            row.profit.dirty = false;
        }
        WriteOp::MarkDirty { building } => {
            let row = state
                .buildings
                .get_mut(&building)
                .ok_or_else(|| StoreError::Missing(format!("building {}", building.raw())))?;
            row.profit.dirty = true;
        }
        WriteOp::AdjustCash { company, delta } => {
            let row = state
                .companies
                .get_mut(&company)
                .ok_or_else(|| StoreError::Missing(format!("company {}", company.raw())))?;
            let next = row.cash + delta;
            if next < 0 {
                return Err(StoreError::Conflict(format!(
                    "company {} balance would go negative",
                    company.raw()
                )));
            }
            row.cash = next;
        }
        WriteOp::SetLevel { company, level } => {
            let row = state
                .companies
                .get_mut(&company)
                .ok_or_else(|| StoreError::Missing(format!("company {}", company.raw())))?;
            row.level = level;
        }
        WriteOp::RecordAction { company, at } => {
            let row = state
                .companies
                .get_mut(&company)
                .ok_or_else(|| StoreError::Missing(format!("company {}", company.raw())))?;
            row.actions += 1;
            row.idle_ticks = 0;
            row.last_action = Some(at);
        }
        WriteOp::SetPrison {
            company,
            imprisoned,
            fine,
        } => {
            let row = state
                .companies
                .get_mut(&company)
                .ok_or_else(|| StoreError::Missing(format!("company {}", company.raw())))?;
            row.imprisoned = imprisoned;
            row.fine = fine;
        }
        WriteOp::AppendLog(entry) => {
            state.log.push(entry);
        }
    }
    Ok(())
}

impl Store for MemoryStore {
    fn allocate_id(&self) -> u64 {
        self.ids.lock().expect("id lock poisoned").gen()
    }

    async fn load_maps(&self) -> Result<Vec<MapInfo>, StoreError> {
        let mut maps: Vec<MapInfo> = self.lock().maps.values().cloned().collect();
        maps.sort_by_key(|m| m.id);
        Ok(maps)
    }

    async fn load_map(&self, map: MapId) -> Result<MapInfo, StoreError> {
        self.lock()
            .maps
            .get(&map)
            .cloned()
            .ok_or_else(|| StoreError::Missing(format!("map {}", map.raw())))
    }

    async fn load_tiles(&self, map: MapId) -> Result<Vec<Tile>, StoreError> {
        let mut tiles: Vec<Tile> = self
            .lock()
            .tiles
            .values()
            .filter(|t| t.map == map)
            .cloned()
            .collect();
        tiles.sort_by_key(|t| (t.y, t.x));
        Ok(tiles)
    }

    async fn load_tile(&self, tile: TileId) -> Result<Tile, StoreError> {
        self.lock()
            .tiles
            .get(&tile)
            .cloned()
            .ok_or_else(|| StoreError::Missing(format!("tile {}", tile.raw())))
    }

    async fn load_tile_at(&self, map: MapId, at: Coord) -> Result<Option<Tile>, StoreError> {
        let state = self.lock();
        Ok(state
            .tile_coords
            .get(&(map, at))
            .and_then(|id| state.tiles.get(id))
            .cloned())
    }

    async fn load_buildings(&self, map: MapId, only_dirty: bool) -> Result<Vec<Building>, StoreError> {
        let mut buildings: Vec<Building> = self
            .lock()
            .buildings
            .values()
            .filter(|b| b.map == map && (!only_dirty || b.profit.dirty))
            .cloned()
            .collect();
        buildings.sort_by_key(|b| (b.y, b.x));
        Ok(buildings)
    }

    async fn load_building(&self, building: BuildingId) -> Result<Building, StoreError> {
        self.lock()
            .buildings
            .get(&building)
            .cloned()
            .ok_or_else(|| StoreError::Missing(format!("building {}", building.raw())))
    }

    async fn load_company(&self, company: CompanyId) -> Result<Company, StoreError> {
        self.lock()
            .companies
            .get(&company)
            .cloned()
            .ok_or_else(|| StoreError::Missing(format!("company {}", company.raw())))
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut state = self.lock();
        // Stage against a copy so a failing guard leaves nothing applied.
        let mut staged = state.clone();
        for op in ops {
            apply(&mut staged, op)?;
        }
        *state = staged;
        Ok(())
    }

    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.lock().log.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocationTier, ProfitCache, Terrain, UserId};

    fn seeded() -> (MemoryStore, MapId, TileId, CompanyId) {
        let store = MemoryStore::new(1);
        let map = MapId::new(1);
        store.insert_map(MapInfo {
            id: map,
            name: "test".into(),
            width: 8,
            height: 8,
            tier: LocationTier::Town,
            enforcement_day: 0,
        });
        let tile = TileId::new(10);
        store.insert_tile(Tile {
            id: tile,
            map,
            x: 2,
            y: 2,
            terrain: Terrain::Open,
            special: None,
            owner: None,
            acquired_at: None,
        });
        let company = CompanyId::new(5);
        store.insert_company(Company {
            id: company,
            user: UserId::new(1),
            map: Some(map),
            cash: 1_000,
            offshore: 0,
            level: 1,
            actions: 0,
            imprisoned: false,
            fine: 0,
            last_action: None,
            idle_ticks: 0,
        });
        (store, map, tile, company)
    }

    #[tokio::test]
    async fn claim_guard_rejects_owned_tile() {
        let (store, _, tile, company) = seeded();
        let now = Utc::now();
        store
            .batch_write(vec![WriteOp::ClaimTile {
                tile,
                owner: company,
                at: now,
            }])
            .await
            .unwrap();

        let again = store
            .batch_write(vec![WriteOp::ClaimTile {
                tile,
                owner: CompanyId::new(9),
                at: now,
            }])
            .await;
        assert!(matches!(again, Err(StoreError::Conflict(_))));
        let row = store.load_tile(tile).await.unwrap();
        assert_eq!(row.owner, Some(company));
    }

    #[tokio::test]
    async fn failed_batch_applies_nothing() {
        let (store, _, _, company) = seeded();
        let result = store
            .batch_write(vec![
                WriteOp::AdjustCash {
                    company,
                    delta: -500,
                },
                // Drives the balance negative; the whole batch must roll back.
                WriteOp::AdjustCash {
                    company,
                    delta: -600,
                },
            ])
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.load_company(company).await.unwrap().cash, 1_000);
    }

    #[tokio::test]
    async fn collapsed_building_frees_the_tile_slot() {
        let (store, map, tile, company) = seeded();
        let building = Building {
            id: BuildingId::new(100),
            tile,
            map,
            x: 2,
            y: 2,
            kind: "shop".into(),
            owner: company,
            damage: 0,
            on_fire: false,
            collapsed: false,
            for_sale: None,
            profit: ProfitCache::stale(),
        };
        store
            .batch_write(vec![WriteOp::InsertBuilding(building.clone())])
            .await
            .unwrap();

        let duplicate = store
            .batch_write(vec![WriteOp::InsertBuilding(Building {
                id: BuildingId::new(101),
                ..building.clone()
            })])
            .await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        store
            .batch_write(vec![WriteOp::SetCollapsed {
                building: building.id,
            }])
            .await
            .unwrap();
        // Ruins stay in the table but the slot is free again.
        assert!(store.load_building(building.id).await.unwrap().collapsed);
        store
            .batch_write(vec![WriteOp::InsertBuilding(Building {
                id: BuildingId::new(102),
                ..building
            })])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn record_action_bumps_counters() {
        let (store, _, _, company) = seeded();
        let now = Utc::now();
        store
            .batch_write(vec![WriteOp::RecordAction { company, at: now }])
            .await
            .unwrap();
        let row = store.load_company(company).await.unwrap();
        assert_eq!(row.actions, 1);
        assert_eq!(row.idle_ticks, 0);
        assert_eq!(row.last_action, Some(now));
    }

    #[test]
    fn id_allocation_is_seeded_and_unique() {
        let store = MemoryStore::new(42);
        let a = store.allocate_id();
        let b = store.allocate_id();
        assert_ne!(a, b);
        let other = MemoryStore::new(42);
        assert_eq!(other.allocate_id(), a);
    }
}
