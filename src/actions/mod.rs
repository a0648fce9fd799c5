//! Gated mutating actions.
//!
//! Every company-initiated action runs the same sequence: prison gate →
//! domain effect committed atomically with its log entry and company
//! updates → dirty-mark → level recompute. The follow-ups are idempotent
//! and safe to retry; the batch is all-or-nothing.

mod construction;
mod fine;
mod land;
mod upkeep;

pub use construction::BuildReceipt;
pub use fine::PayFineReceipt;
pub use land::BuyLandReceipt;

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::info;

use crate::catalog::Catalog;
use crate::dirty;
use crate::error::{GameError, GameResult};
use crate::grid::Coord;
use crate::model::{ActionKind, Company, CompanyId, LogEntry, MapId};
use crate::progression::{self, LevelStatus};
use crate::recompute::RecomputeEngine;
use crate::store::{Store, WriteOp};

/// The core of the game: owns the catalog, the recompute engine, and the
/// event fan-out, and exposes every operation collaborators call.
pub struct GameService<S> {
    store: S,
    catalog: Arc<Catalog>,
    recompute: RecomputeEngine,
    events: broadcast::Sender<LogEntry>,
}

impl<S: Store> GameService<S> {
    pub fn new(store: S, catalog: Catalog) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            catalog: Arc::new(catalog),
            recompute: RecomputeEngine::new(),
            events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Live feed of committed transaction-log entries.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.events.subscribe()
    }

    /// Run one recompute pass for a map. Invoked by the scheduler; also
    /// safe to call on demand.
    pub async fn recompute(&self, map: MapId) -> GameResult<usize> {
        self.recompute.run(&self.store, &self.catalog, map).await
    }

    pub async fn level_status(&self, company: CompanyId) -> GameResult<LevelStatus> {
        let company = self.store.load_company(company).await?;
        Ok(progression::level_status(&self.catalog, &company))
    }

    /// Commit a batch and publish any log entries it carried.
    pub(crate) async fn commit(&self, ops: Vec<WriteOp>) -> GameResult<()> {
        let entries: Vec<LogEntry> = ops
            .iter()
            .filter_map(|op| match op {
                WriteOp::AppendLog(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect();
        self.store.batch_write(ops).await?;
        for entry in entries {
            let _ = self.events.send(entry);
        }
        Ok(())
    }

    pub(crate) fn log_entry(
        &self,
        company: CompanyId,
        kind: ActionKind,
        amount: i64,
        detail: serde_json::Value,
    ) -> LogEntry {
        LogEntry {
            id: self.store.allocate_id(),
            company,
            kind,
            tile: None,
            building: None,
            target_company: None,
            amount,
            detail,
            at: Utc::now(),
        }
    }

    /// Follow-ups shared by every action: invalidate the neighborhood and
    /// re-derive the company level. Both are idempotent.
    pub(crate) async fn settle(
        &self,
        company: CompanyId,
        touched: Option<(MapId, Coord)>,
    ) -> GameResult<()> {
        if let Some((map, at)) = touched {
            dirty::mark_dirty(&self.store, map, at).await?;
        }
        self.check_level_up(company).await?;
        Ok(())
    }

    /// Persist a level-up when the tier scan now exceeds the stored level,
    /// logging one transition per tier crossed. Returns the new level.
    pub(crate) async fn check_level_up(&self, company_id: CompanyId) -> GameResult<Option<u32>> {
        let company = self.store.load_company(company_id).await?;
        let scanned =
            progression::recompute_level(&self.catalog, company.cash, company.actions);
        if scanned <= company.level {
            return Ok(None);
        }
        let mut ops = vec![WriteOp::SetLevel {
            company: company_id,
            level: scanned,
        }];
        for level in company.level + 1..=scanned {
            let tier = self.catalog.tier(level).ok_or_else(|| {
                GameError::Internal(format!("tier {} missing from catalog", level))
            })?;
            ops.push(WriteOp::AppendLog(self.log_entry(
                company_id,
                ActionKind::LevelUp,
                0,
                json!({
                    "from": level - 1,
                    "to": level,
                    "unlocks_buildings": tier.unlocks_buildings,
                    "unlocks_actions": tier.unlocks_actions,
                }),
            )));
        }
        self.commit(ops).await?;
        info!(
            company = company_id.raw(),
            level = scanned,
            "company leveled up"
        );
        Ok(Some(scanned))
    }
}

/// Prison gate: every mutating action except `pay_fine` starts here.
pub(crate) fn ensure_free(company: &Company) -> GameResult<()> {
    if company.imprisoned {
        Err(GameError::Precondition(format!(
            "company {} is imprisoned; pay the {} fine first",
            company.id.raw(),
            company.fine
        )))
    } else {
        Ok(())
    }
}
