//! Progression: level tiers unlocked by cumulative cash and actions.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::model::Company;

/// Highest tier whose cash AND action thresholds are both met.
///
/// Tiers ascend strictly, so the scan can stop at the first tier that
/// fails; an exact threshold hit qualifies.
pub fn recompute_level(catalog: &Catalog, cash: i64, actions: u64) -> u32 {
    let mut level = 1;
    for tier in catalog.tiers() {
        if cash >= tier.cash_threshold && actions >= tier.action_threshold {
            level = tier.level;
        } else {
            break;
        }
    }
    level
}

/// Levels never go down: spending cash after a level-up does not demote.
/// This also makes the scan a self-healing check after data repair.
pub fn effective_level(catalog: &Catalog, company: &Company) -> u32 {
    company
        .level
        .max(recompute_level(catalog, company.cash, company.actions))
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelStatus {
    pub level: u32,
    /// Percent progress toward the next tier's cash threshold, 0..=100.
    pub cash_progress: f64,
    /// Percent progress toward the next tier's action threshold, 0..=100.
    pub actions_progress: f64,
    pub next_tier_buildings: Vec<String>,
    pub next_tier_actions: Vec<String>,
}

pub fn level_status(catalog: &Catalog, company: &Company) -> LevelStatus {
    let level = effective_level(catalog, company);
    match catalog.tier(level + 1) {
        Some(next) => LevelStatus {
            level,
            cash_progress: percent(company.cash as f64, next.cash_threshold as f64),
            actions_progress: percent(company.actions as f64, next.action_threshold as f64),
            next_tier_buildings: next.unlocks_buildings.clone(),
            next_tier_actions: next.unlocks_actions.clone(),
        },
        // Top of the catalog.
        None => LevelStatus {
            level,
            cash_progress: 100.0,
            actions_progress: 100.0,
            next_tier_buildings: Vec::new(),
            next_tier_actions: Vec::new(),
        },
    }
}

fn percent(have: f64, need: f64) -> f64 {
    if need <= 0.0 {
        100.0
    } else {
        (have / need * 100.0).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompanyId, UserId};

    fn company(cash: i64, actions: u64, level: u32) -> Company {
        Company {
            id: CompanyId::new(1),
            user: UserId::new(1),
            map: None,
            cash,
            offshore: 0,
            level,
            actions,
            imprisoned: false,
            fine: 0,
            last_action: None,
            idle_ticks: 0,
        }
    }

    #[test]
    fn exact_threshold_hit_counts() {
        let catalog = Catalog::standard();
        assert_eq!(recompute_level(&catalog, 50_000, 50), 2);
        assert_eq!(recompute_level(&catalog, 49_999, 50), 1);
        assert_eq!(recompute_level(&catalog, 50_000, 49), 1);
    }

    #[test]
    fn both_thresholds_must_hold() {
        let catalog = Catalog::standard();
        assert_eq!(recompute_level(&catalog, 10_000_000, 0), 1);
        assert_eq!(recompute_level(&catalog, 0, 10_000), 1);
    }

    #[test]
    fn scan_is_a_max_not_a_first_match() {
        let catalog = Catalog::standard();
        assert_eq!(recompute_level(&catalog, 2_000_000, 700), 4);
    }

    #[test]
    fn effective_level_never_demotes() {
        let catalog = Catalog::standard();
        // Reached tier 2, then spent the cash back down.
        let c = company(1_200, 60, 2);
        assert_eq!(recompute_level(&catalog, c.cash, c.actions), 1);
        assert_eq!(effective_level(&catalog, &c), 2);
    }

    #[test]
    fn status_reports_progress_toward_next_tier() {
        let catalog = Catalog::standard();
        let status = level_status(&catalog, &company(25_000, 10, 1));
        assert_eq!(status.level, 1);
        assert!((status.cash_progress - 50.0).abs() < 1e-9);
        assert!((status.actions_progress - 20.0).abs() < 1e-9);
        assert!(status.next_tier_buildings.contains(&"office".to_string()));
    }

    #[test]
    fn status_at_top_tier_is_full() {
        let catalog = Catalog::standard();
        let status = level_status(&catalog, &company(5_000_000, 1_000, 4));
        assert_eq!(status.level, 4);
        assert_eq!(status.cash_progress, 100.0);
        assert!(status.next_tier_buildings.is_empty());
    }
}
