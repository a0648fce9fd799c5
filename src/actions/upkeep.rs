//! Passive effects and hooks for the external enforcement subsystem.
//!
//! Nothing here is company-initiated, so nothing is prison-gated.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::info;

use crate::actions::GameService;
use crate::dirty;
use crate::error::GameResult;
use crate::model::{ActionKind, BuildingId, CompanyId, LogEntry, MapId};
use crate::store::{Store, WriteOp};

impl<S: Store> GameService<S> {
    /// Credit every company the summed cached profit of its standing
    /// buildings on one map. Imprisoned companies still receive income.
    /// Returns the total credited.
    pub async fn accrue_income(&self, map: MapId) -> GameResult<i64> {
        let buildings = self.store().load_buildings(map, false).await?;
        let mut per_company: BTreeMap<CompanyId, (i64, u32)> = BTreeMap::new();
        for building in buildings.iter().filter(|b| !b.collapsed) {
            let slot = per_company.entry(building.owner).or_insert((0, 0));
            slot.0 += building.profit.value;
            slot.1 += 1;
        }

        let mut ops = Vec::new();
        let mut total = 0;
        let mut credited = Vec::new();
        for (company, (sum, count)) in per_company {
            if sum == 0 {
                continue;
            }
            total += sum;
            ops.push(WriteOp::AdjustCash {
                company,
                delta: sum,
            });
            ops.push(WriteOp::AppendLog(self.log_entry(
                company,
                ActionKind::Income,
                sum,
                json!({ "map": map.raw(), "buildings": count }),
            )));
            credited.push(company);
        }
        if ops.is_empty() {
            return Ok(0);
        }
        self.commit(ops).await?;
        // Income changes cash, so levels may move.
        for company in credited {
            self.check_level_up(company).await?;
        }
        info!(map = map.raw(), total, "income accrued");
        Ok(total)
    }

    /// Record attack or decay damage. At 100% the building collapses
    /// (structural failure; the row stays as a ruin). The neighborhood is
    /// dirty-marked either way, since damage over 50% drags neighbors down.
    pub async fn set_damage(
        &self,
        building_id: BuildingId,
        damage: u8,
        on_fire: bool,
    ) -> GameResult<()> {
        let building = self.store().load_building(building_id).await?;
        let damage = damage.min(100);
        let mut ops = vec![WriteOp::SetDamage {
            building: building_id,
            damage,
            on_fire,
        }];
        if damage >= 100 && !building.collapsed {
            ops.push(WriteOp::SetCollapsed {
                building: building_id,
            });
        }
        ops.push(WriteOp::AppendLog(LogEntry {
            building: Some(building_id),
            tile: Some(building.tile),
            ..self.log_entry(
                building.owner,
                ActionKind::Damage,
                0,
                json!({ "damage": damage, "on_fire": on_fire, "collapsed": damage >= 100 }),
            )
        }));
        self.commit(ops).await?;
        dirty::mark_dirty(self.store(), building.map, building.pos()).await?;
        Ok(())
    }

    /// Enforcement hook: lock a company up with an outstanding fine.
    pub async fn imprison(&self, company_id: CompanyId, fine: i64) -> GameResult<()> {
        // Load first so a missing company surfaces as not-found.
        let _ = self.store().load_company(company_id).await?;
        let entry = self.log_entry(
            company_id,
            ActionKind::Imprison,
            fine,
            json!({ "fine": fine }),
        );
        self.commit(vec![
            WriteOp::SetPrison {
                company: company_id,
                imprisoned: true,
                fine,
            },
            WriteOp::AppendLog(entry),
        ])
        .await?;
        info!(company = company_id.raw(), fine, "company imprisoned");
        Ok(())
    }
}
