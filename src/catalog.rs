//! Immutable reference data: building types, level tiers, land prices.
//!
//! Loaded once at process start and shared read-only; never mutated at
//! runtime.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Terrain;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingType {
    /// Slug referenced by building instances and scenario files.
    pub id: String,
    pub name: String,
    pub cost: i64,
    pub base_profit: i64,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    #[serde(default)]
    pub requires_license: bool,
    /// Favorable terrain: rate applied with diminishing returns.
    #[serde(default)]
    pub terrain_bonus: HashMap<Terrain, f64>,
    /// Unfavorable terrain: positive rate, applied linearly and negatively.
    #[serde(default)]
    pub terrain_penalty: HashMap<Terrain, f64>,
    /// Synergy with neighboring businesses, if any.
    #[serde(default)]
    pub commercial_rate: Option<f64>,
    #[serde(default)]
    pub max_per_map: Option<u32>,
}

fn default_min_level() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelTier {
    pub level: u32,
    pub cash_threshold: i64,
    pub action_threshold: u64,
    /// Content newly available exactly at this tier, not cumulative.
    #[serde(default)]
    pub unlocks_buildings: Vec<String>,
    #[serde(default)]
    pub unlocks_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    building_types: Vec<BuildingType>,
    tiers: Vec<LevelTier>,
    #[serde(default)]
    land_prices: Option<HashMap<Terrain, i64>>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    building_types: HashMap<String, BuildingType>,
    tiers: Vec<LevelTier>,
    land_prices: HashMap<Terrain, i64>,
}

impl Catalog {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let file: CatalogFile = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Self::from_parts(
            file.building_types,
            file.tiers,
            file.land_prices.unwrap_or_else(default_land_prices),
        )
    }

    fn from_parts(
        types: Vec<BuildingType>,
        tiers: Vec<LevelTier>,
        land_prices: HashMap<Terrain, i64>,
    ) -> Result<Self> {
        if tiers.is_empty() {
            bail!("catalog has no level tiers");
        }
        for pair in tiers.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.level != a.level + 1 {
                bail!("tier levels must be consecutive: {} then {}", a.level, b.level);
            }
            if b.cash_threshold <= a.cash_threshold || b.action_threshold <= a.action_threshold {
                bail!("tier thresholds must strictly increase at level {}", b.level);
            }
        }
        let mut building_types = HashMap::new();
        for bt in types {
            if bt.cost < 0 || bt.base_profit < 0 {
                bail!("building type '{}' has negative cost or base profit", bt.id);
            }
            if building_types.insert(bt.id.clone(), bt).is_some() {
                bail!("duplicate building type id in catalog");
            }
        }
        for tier in &tiers {
            for slug in &tier.unlocks_buildings {
                if !building_types.contains_key(slug) {
                    bail!("tier {} unlocks unknown building type '{}'", tier.level, slug);
                }
            }
        }
        Ok(Self {
            building_types,
            tiers,
            land_prices,
        })
    }

    pub fn building_type(&self, id: &str) -> Option<&BuildingType> {
        self.building_types.get(id)
    }

    /// Tiers in ascending level order, starting at level 1.
    pub fn tiers(&self) -> &[LevelTier] {
        &self.tiers
    }

    pub fn tier(&self, level: u32) -> Option<&LevelTier> {
        self.tiers.iter().find(|t| t.level == level)
    }

    pub fn land_price(&self, terrain: Terrain) -> Option<i64> {
        self.land_prices.get(&terrain).copied()
    }

    /// Built-in catalog used when no file is supplied.
    pub fn standard() -> Self {
        let types = vec![
            BuildingType {
                id: "kiosk".into(),
                name: "Kiosk".into(),
                cost: 1_000,
                base_profit: 40,
                min_level: 1,
                requires_license: false,
                terrain_bonus: HashMap::from([(Terrain::Road, 0.1)]),
                terrain_penalty: HashMap::new(),
                commercial_rate: None,
                max_per_map: None,
            },
            BuildingType {
                id: "shop".into(),
                name: "Shop".into(),
                cost: 8_000,
                base_profit: 400,
                min_level: 1,
                requires_license: false,
                terrain_bonus: HashMap::from([(Terrain::Road, 0.15)]),
                terrain_penalty: HashMap::from([(Terrain::Water, 0.1)]),
                commercial_rate: Some(0.2),
                max_per_map: None,
            },
            BuildingType {
                id: "sawmill".into(),
                name: "Sawmill".into(),
                cost: 12_000,
                base_profit: 550,
                min_level: 2,
                requires_license: false,
                terrain_bonus: HashMap::from([(Terrain::Wooded, 0.2)]),
                terrain_penalty: HashMap::from([(Terrain::Road, 0.05)]),
                commercial_rate: None,
                max_per_map: None,
            },
            BuildingType {
                id: "office".into(),
                name: "Office Block".into(),
                cost: 40_000,
                base_profit: 1_800,
                min_level: 2,
                requires_license: false,
                terrain_bonus: HashMap::from([(Terrain::Road, 0.12)]),
                terrain_penalty: HashMap::from([(Terrain::Track, 0.08)]),
                commercial_rate: Some(0.3),
                max_per_map: None,
            },
            BuildingType {
                id: "hotel".into(),
                name: "Hotel".into(),
                cost: 150_000,
                base_profit: 5_000,
                min_level: 3,
                requires_license: true,
                terrain_bonus: HashMap::from([(Terrain::Water, 0.25), (Terrain::Road, 0.1)]),
                terrain_penalty: HashMap::new(),
                commercial_rate: Some(0.15),
                max_per_map: Some(4),
            },
            BuildingType {
                id: "casino".into(),
                name: "Casino".into(),
                cost: 600_000,
                base_profit: 18_000,
                min_level: 4,
                requires_license: true,
                terrain_bonus: HashMap::from([(Terrain::Road, 0.2)]),
                terrain_penalty: HashMap::new(),
                commercial_rate: Some(0.4),
                max_per_map: Some(1),
            },
        ];
        let tiers = vec![
            LevelTier {
                level: 1,
                cash_threshold: 0,
                action_threshold: 0,
                unlocks_buildings: vec!["kiosk".into(), "shop".into()],
                unlocks_actions: vec!["buy_land".into(), "build".into(), "demolish".into()],
            },
            LevelTier {
                level: 2,
                cash_threshold: 50_000,
                action_threshold: 50,
                unlocks_buildings: vec!["sawmill".into(), "office".into()],
                unlocks_actions: vec!["list_for_sale".into()],
            },
            LevelTier {
                level: 3,
                cash_threshold: 250_000,
                action_threshold: 200,
                unlocks_buildings: vec!["hotel".into()],
                unlocks_actions: vec!["offshore_transfer".into()],
            },
            LevelTier {
                level: 4,
                cash_threshold: 1_000_000,
                action_threshold: 600,
                unlocks_buildings: vec!["casino".into()],
                unlocks_actions: vec!["attack".into()],
            },
        ];
        Self::from_parts(types, tiers, default_land_prices())
            .expect("built-in catalog is valid")
    }
}

fn default_land_prices() -> HashMap<Terrain, i64> {
    HashMap::from([
        (Terrain::Open, 500),
        (Terrain::Track, 350),
        (Terrain::Wooded, 800),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_consistent() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.tiers()[0].level, 1);
        assert!(catalog.building_type("shop").is_some());
        assert_eq!(catalog.building_type("shop").unwrap().base_profit, 400);
        assert!(catalog.building_type("casino").unwrap().requires_license);
        assert_eq!(catalog.land_price(Terrain::Open), Some(500));
        assert_eq!(catalog.land_price(Terrain::Water), None);
    }

    #[test]
    fn rejects_non_increasing_tiers() {
        let mut tiers = Catalog::standard().tiers.clone();
        tiers[1].cash_threshold = 0;
        let result = Catalog::from_parts(Vec::new(), tiers, default_land_prices());
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_unlock() {
        let tiers = vec![LevelTier {
            level: 1,
            cash_threshold: 0,
            action_threshold: 0,
            unlocks_buildings: vec!["missing".into()],
            unlocks_actions: vec![],
        }];
        assert!(Catalog::from_parts(Vec::new(), tiers, default_land_prices()).is_err());
    }

    #[test]
    fn catalog_yaml_round_trip() {
        let catalog = Catalog::standard();
        let file = CatalogFile {
            building_types: catalog.building_types.values().cloned().collect(),
            tiers: catalog.tiers.clone(),
            land_prices: Some(catalog.land_prices.clone()),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, serde_yaml::to_string(&file).unwrap()).unwrap();

        let loaded = Catalog::from_yaml(&path).unwrap();
        assert_eq!(loaded.tiers().len(), catalog.tiers().len());
        assert_eq!(
            loaded.building_type("hotel").unwrap().max_per_map,
            Some(4)
        );
    }
}
