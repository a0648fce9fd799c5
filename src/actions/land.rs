//! Land purchase.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::actions::{ensure_free, GameService};
use crate::error::{GameError, GameResult};
use crate::grid::Coord;
use crate::model::{ActionKind, CompanyId, LogEntry};
use crate::store::{Store, WriteOp};

#[derive(Debug, Clone, Serialize)]
pub struct BuyLandReceipt {
    pub cost: i64,
    pub remaining_cash: i64,
}

impl<S: Store> GameService<S> {
    /// Buy the tile at `at` on the company's current map.
    ///
    /// The ownership transfer is guarded at commit time: if another actor
    /// claimed the tile since the read, the batch fails with a conflict
    /// and the caller should retry with fresh data.
    pub async fn buy_land(&self, company_id: CompanyId, at: Coord) -> GameResult<BuyLandReceipt> {
        let company = self.store().load_company(company_id).await?;
        ensure_free(&company)?;
        let map_id = company.map.ok_or_else(|| {
            GameError::Precondition("company is in the lobby, not placed on a map".into())
        })?;
        let map = self.store().load_map(map_id).await?;
        if !map.contains(at) {
            return Err(GameError::Validation(format!(
                "coordinate {} is outside the map",
                at
            )));
        }
        let tile = self
            .store()
            .load_tile_at(map_id, at)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("no tile at {}", at)))?;
        if !tile.purchasable() {
            return Err(GameError::Validation(format!(
                "{} at {} cannot be bought",
                tile.terrain.label(),
                at
            )));
        }
        if tile.owner.is_some() {
            return Err(GameError::Conflict(format!("tile at {} is already owned", at)));
        }
        let base = self.catalog().land_price(tile.terrain).ok_or_else(|| {
            GameError::Internal(format!(
                "no land price configured for {}",
                tile.terrain.label()
            ))
        })?;
        let cost = ((base as f64) * map.tier.cost_multiplier()).round() as i64;
        if company.cash < cost {
            return Err(GameError::Precondition(format!(
                "insufficient funds: land costs {}, cash is {}",
                cost, company.cash
            )));
        }

        let entry = LogEntry {
            tile: Some(tile.id),
            ..self.log_entry(
                company_id,
                ActionKind::BuyLand,
                cost,
                json!({ "x": at.x, "y": at.y, "terrain": tile.terrain }),
            )
        };
        self.commit(vec![
            WriteOp::ClaimTile {
                tile: tile.id,
                owner: company_id,
                at: Utc::now(),
            },
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

        info!(company = company_id.raw(), %at, cost, "land purchased");
        self.settle(company_id, Some((map_id, at))).await?;
        Ok(BuyLandReceipt {
            cost,
            remaining_cash: company.cash - cost,
        })
    }
}
