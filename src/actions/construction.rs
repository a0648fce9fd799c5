//! Construction, profit preview, and demolition.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::actions::{ensure_free, GameService};
use crate::error::{GameError, GameResult};
use crate::grid::GridIndex;
use crate::model::{ActionKind, Building, BuildingId, CompanyId, LogEntry, ProfitCache, TileId};
use crate::profit::{self, ModifierLine, ProfitQuote};
use crate::progression;
use crate::store::{Store, WriteOp};

#[derive(Debug, Clone, Serialize)]
pub struct BuildReceipt {
    pub building: BuildingId,
    /// Expected profit for the new building's neighborhood. The cached
    /// value starts dirty and is filled by the next recompute pass.
    pub profit: i64,
    pub breakdown: Vec<ModifierLine>,
}

impl<S: Store> GameService<S> {
    pub async fn build(
        &self,
        company_id: CompanyId,
        tile_id: TileId,
        kind: &str,
    ) -> GameResult<BuildReceipt> {
        let company = self.store().load_company(company_id).await?;
        ensure_free(&company)?;
        let kind = self
            .catalog()
            .building_type(kind)
            .ok_or_else(|| GameError::Validation(format!("unknown building type '{}'", kind)))?;
        let tile = self.store().load_tile(tile_id).await?;
        if tile.owner != Some(company_id) {
            return Err(GameError::Precondition(format!(
                "tile {} is not owned by company {}",
                tile_id.raw(),
                company_id.raw()
            )));
        }
        let level = progression::effective_level(self.catalog(), &company);
        if level < kind.min_level {
            return Err(GameError::Precondition(format!(
                "{} requires level {}, company is level {}",
                kind.name, kind.min_level, level
            )));
        }
        let map = self.store().load_map(tile.map).await?;
        let buildings = self.store().load_buildings(tile.map, false).await?;
        if buildings.iter().any(|b| b.tile == tile_id && !b.collapsed) {
            return Err(GameError::Conflict(format!(
                "tile {} already hosts a building",
                tile_id.raw()
            )));
        }
        if let Some(cap) = kind.max_per_map {
            let standing = buildings
                .iter()
                .filter(|b| b.kind == kind.id && !b.collapsed)
                .count();
            if standing as u32 >= cap {
                return Err(GameError::Precondition(format!(
                    "license cap reached: {} allows {} per map",
                    kind.name, cap
                )));
            }
        }
        let cost = ((kind.cost as f64) * map.tier.cost_multiplier()).round() as i64;
        if company.cash < cost {
            return Err(GameError::Precondition(format!(
                "insufficient funds: {} costs {}, cash is {}",
                kind.name, cost, company.cash
            )));
        }

        let tiles = self.store().load_tiles(tile.map).await?;
        let grid = GridIndex::build(&tiles, &buildings);
        let quote = profit::calculate(kind, tile.pos(), &grid);

        let building_id = BuildingId::new(self.store().allocate_id());
        let building = Building {
            id: building_id,
            tile: tile_id,
            map: tile.map,
            x: tile.x,
            y: tile.y,
            kind: kind.id.clone(),
            owner: company_id,
            damage: 0,
            on_fire: false,
            collapsed: false,
            for_sale: None,
            profit: ProfitCache::stale(),
        };
        let entry = LogEntry {
            tile: Some(tile_id),
            building: Some(building_id),
            ..self.log_entry(
                company_id,
                ActionKind::Build,
                cost,
                json!({ "kind": kind.id, "x": tile.x, "y": tile.y }),
            )
        };
        self.commit(vec![
            WriteOp::InsertBuilding(building),
            WriteOp::AdjustCash {
                company: company_id,
                delta: -cost,
            },
            WriteOp::RecordAction {
                company: company_id,
                at: Utc::now(),
            },
            WriteOp::AppendLog(entry),
        ])
        .await?;

        info!(
            company = company_id.raw(),
            kind = %kind.id,
            at = %tile.pos(),
            cost,
            "building constructed"
        );
        self.settle(company_id, Some((tile.map, tile.pos()))).await?;
        Ok(BuildReceipt {
            building: building_id,
            profit: quote.profit,
            breakdown: quote.breakdown,
        })
    }

    /// What a building of `kind` would earn on `tile_id` today. Read-only:
    /// touches neither dirty flags nor caches.
    pub async fn preview_profit(&self, tile_id: TileId, kind: &str) -> GameResult<ProfitQuote> {
        let kind = self
            .catalog()
            .building_type(kind)
            .ok_or_else(|| GameError::Validation(format!("unknown building type '{}'", kind)))?;
        let tile = self.store().load_tile(tile_id).await?;
        let tiles = self.store().load_tiles(tile.map).await?;
        let buildings = self.store().load_buildings(tile.map, false).await?;
        let grid = GridIndex::build(&tiles, &buildings);
        Ok(profit::calculate(kind, tile.pos(), &grid))
    }

    /// Tear a building down. The row stays as a collapsed ruin for the
    /// audit trail; the tile can be built over again.
    pub async fn demolish(&self, company_id: CompanyId, building_id: BuildingId) -> GameResult<()> {
        let company = self.store().load_company(company_id).await?;
        ensure_free(&company)?;
        let building = self.store().load_building(building_id).await?;
        if building.owner != company_id {
            return Err(GameError::Precondition(format!(
                "building {} is not owned by company {}",
                building_id.raw(),
                company_id.raw()
            )));
        }
        if building.collapsed {
            return Err(GameError::Precondition(format!(
                "building {} is already collapsed",
                building_id.raw()
            )));
        }

        let entry = LogEntry {
            tile: Some(building.tile),
            building: Some(building_id),
            ..self.log_entry(
                company_id,
                ActionKind::Demolish,
                0,
                json!({ "kind": building.kind, "x": building.x, "y": building.y }),
            )
        };
        self.commit(vec![
            WriteOp::SetCollapsed {
                building: building_id,
            },
            WriteOp::RecordAction {
                company: company_id,
                at: Utc::now(),
            },
            WriteOp::AppendLog(entry),
        ])
        .await?;

        info!(
            company = company_id.raw(),
            building = building_id.raw(),
            "building demolished"
        );
        self.settle(company_id, Some((building.map, building.pos())))
            .await?;
        Ok(())
    }
}
