//! Adjacency profit calculator.
//!
//! Pure and deterministic: the same building type and neighborhood always
//! produce the same profit and breakdown, so everything here unit-tests
//! without storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::BuildingType;
use crate::grid::{Coord, GridIndex, ADJACENCY_RADIUS};
use crate::model::Terrain;

/// One named contribution to the profit multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierLine {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitQuote {
    pub profit: i64,
    pub breakdown: Vec<ModifierLine>,
}

/// Flat hit per neighboring building above 50% damage.
const DAMAGED_NEIGHBOR_MODIFIER: f64 = -0.05;

/// Compute profit for a building of type `kind` standing at `at`.
///
/// The neighborhood is the Chebyshev R=2 window around the coordinate;
/// coordinates outside the map are simply absent and contribute nothing.
pub fn calculate(kind: &BuildingType, at: Coord, grid: &GridIndex<'_>) -> ProfitQuote {
    let mut terrain_counts: BTreeMap<Terrain, u32> = BTreeMap::new();
    let mut neighbor_businesses = 0u32;
    let mut damaged: Vec<Coord> = Vec::new();

    for c in at.window(ADJACENCY_RADIUS) {
        if let Some(tile) = grid.tile_at(c) {
            *terrain_counts.entry(tile.terrain).or_insert(0) += 1;
        }
        if let Some(building) = grid.building_at(c) {
            neighbor_businesses += 1;
            if building.heavily_damaged() {
                damaged.push(c);
            }
        }
    }

    let mut breakdown: Vec<ModifierLine> = Vec::new();

    // Bonuses scale sublinearly: the second and third favorable neighbor
    // are worth less than the first.
    for (&terrain, &n) in &terrain_counts {
        if let Some(&rate) = kind.terrain_bonus.get(&terrain) {
            let value = rate * (1.0 + (n as f64).ln() / 2.0);
            breakdown.push(ModifierLine {
                label: format!("{} bonus x{}", terrain.label(), n),
                value,
            });
        }
    }

    // Penalties stay linear, so clustering near bad terrain hurts more
    // than clustering near good terrain helps.
    for (&terrain, &n) in &terrain_counts {
        if let Some(&rate) = kind.terrain_penalty.get(&terrain) {
            breakdown.push(ModifierLine {
                label: format!("{} penalty x{}", terrain.label(), n),
                value: -rate * n as f64,
            });
        }
    }

    if let Some(rate) = kind.commercial_rate {
        if neighbor_businesses > 0 {
            breakdown.push(ModifierLine {
                label: format!("commercial synergy x{}", neighbor_businesses),
                value: rate * 0.5 * neighbor_businesses as f64,
            });
        }
    }

    for c in damaged {
        breakdown.push(ModifierLine {
            label: format!("damaged neighbor {}", c),
            value: DAMAGED_NEIGHBOR_MODIFIER,
        });
    }

    let multiplier = 1.0 + breakdown.iter().map(|m| m.value).sum::<f64>();
    let profit = ((kind.base_profit as f64) * multiplier).round() as i64;

    ProfitQuote {
        profit: profit.max(0),
        breakdown,
    }
}
