//! Batch recompute of cached profit values.
//!
//! One pass per map: snapshot the dirty set, load the map's rows once
//! into a [`GridIndex`], run the calculator per dirty building, and
//! commit every update in a single atomic batch. A per-map lease keeps
//! passes for the same map strictly serial; dirty marks that land while
//! a pass is in flight are simply picked up by the next one. Passes on
//! different maps run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{GameError, GameResult};
use crate::grid::GridIndex;
use crate::model::MapId;
use crate::profit;
use crate::store::{Store, WriteOp};

#[derive(Default)]
pub struct RecomputeEngine {
    leases: Mutex<HashMap<MapId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecomputeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lease(&self, map: MapId) -> Arc<tokio::sync::Mutex<()>> {
        let mut leases = self.leases.lock().expect("lease table poisoned");
        leases.entry(map).or_default().clone()
    }

    /// Recompute all currently-dirty, non-collapsed buildings for one map.
    /// Returns the number processed. Safe to re-invoke after a failure:
    /// the commit is all-or-nothing, so an interrupted pass leaves every
    /// dirty flag in place.
    pub async fn run<S: Store>(
        &self,
        store: &S,
        catalog: &Catalog,
        map: MapId,
    ) -> GameResult<usize> {
        let lease = self.lease(map);
        let _guard = lease.lock().await;

        let dirty: Vec<_> = store
            .load_buildings(map, true)
            .await?
            .into_iter()
            .filter(|b| !b.collapsed)
            .collect();
        if dirty.is_empty() {
            debug!(map = map.raw(), "recompute pass found nothing dirty");
            return Ok(0);
        }

        let tiles = store.load_tiles(map).await?;
        let all = store.load_buildings(map, false).await?;
        let grid = GridIndex::build(&tiles, &all);

        let mut ops = Vec::with_capacity(dirty.len());
        for building in &dirty {
            let kind = catalog.building_type(&building.kind).ok_or_else(|| {
                GameError::Internal(format!(
                    "building {} references unknown type '{}'",
                    building.id.raw(),
                    building.kind
                ))
            })?;
            let quote = profit::calculate(kind, building.pos(), &grid);
            ops.push(WriteOp::SetProfit {
                building: building.id,
                profit: quote.profit,
                breakdown: quote.breakdown,
            });
        }
        store.batch_write(ops).await?;

        info!(map = map.raw(), count = dirty.len(), "recompute pass committed");
        Ok(dirty.len())
    }
}
