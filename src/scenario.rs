//! Scenario files: seed maps, terrain, and companies for the demo binary
//! and integration tests. Terrain comes as character rows, one per tile:
//! `.` open land, `~` water, `#` road, `:` unpaved track, `^` wooded,
//! `!` open land carrying an administrator structure.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::model::{
    Company, CompanyId, LocationTier, MapId, MapInfo, Terrain, Tile, TileId, UserId,
};
use crate::store::{MemoryStore, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub maps: Vec<ScenarioMap>,
    #[serde(default)]
    pub companies: Vec<ScenarioCompany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioMap {
    pub name: String,
    pub tier: LocationTier,
    #[serde(default)]
    pub enforcement_day: u8,
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioCompany {
    pub user: u64,
    /// Name of the map the company starts on.
    pub map: String,
    /// Defaults to the map tier's starting capital.
    #[serde(default)]
    pub cash: Option<i64>,
}

pub struct SeededWorld {
    pub store: MemoryStore,
    pub maps: Vec<MapId>,
    pub companies: Vec<CompanyId>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

fn terrain_for(ch: char) -> Result<(Terrain, Option<String>)> {
    Ok(match ch {
        '.' => (Terrain::Open, None),
        '~' => (Terrain::Water, None),
        '#' => (Terrain::Road, None),
        ':' => (Terrain::Track, None),
        '^' => (Terrain::Wooded, None),
        '!' => (Terrain::Open, Some("monument".to_string())),
        other => bail!("unknown terrain character '{}'", other),
    })
}

impl Scenario {
    pub fn build_store(&self) -> Result<SeededWorld> {
        let store = MemoryStore::new(self.seed);
        let mut maps = Vec::new();
        let mut companies = Vec::new();

        for map in &self.maps {
            let height = map.rows.len();
            if height == 0 {
                bail!("map '{}' has no rows", map.name);
            }
            let width = map.rows[0].chars().count();
            if map.rows.iter().any(|r| r.chars().count() != width) {
                bail!("map '{}' has ragged rows", map.name);
            }
            let map_id = MapId::new(store.allocate_id());
            store.insert_map(MapInfo {
                id: map_id,
                name: map.name.clone(),
                width: width as i32,
                height: height as i32,
                tier: map.tier,
                enforcement_day: map.enforcement_day,
            });
            for (y, row) in map.rows.iter().enumerate() {
                for (x, ch) in row.chars().enumerate() {
                    let (terrain, special) = terrain_for(ch)?;
                    store.insert_tile(Tile {
                        id: TileId::new(store.allocate_id()),
                        map: map_id,
                        x: x as i32,
                        y: y as i32,
                        terrain,
                        special,
                        owner: None,
                        acquired_at: None,
                    });
                }
            }
            maps.push(map_id);
        }

        for company in &self.companies {
            let (map_id, tier) = self
                .maps
                .iter()
                .zip(&maps)
                .find(|(m, _)| m.name == company.map)
                .map(|(m, id)| (*id, m.tier))
                .with_context(|| {
                    format!("company references unknown map '{}'", company.map)
                })?;
            let id = CompanyId::new(store.allocate_id());
            store.insert_company(Company {
                id,
                user: UserId::new(company.user),
                map: Some(map_id),
                cash: company.cash.unwrap_or_else(|| tier.starting_capital()),
                offshore: 0,
                level: 1,
                actions: 0,
                imprisoned: false,
                fine: 0,
                last_action: None,
                idle_ticks: 0,
            });
            companies.push(id);
        }

        Ok(SeededWorld {
            store,
            maps,
            companies,
        })
    }

    /// Built-in demo: one small town with a road cross, a pond, a wood,
    /// and two companies.
    pub fn demo_town() -> Self {
        Self {
            name: "demo_town".into(),
            seed: 7,
            maps: vec![ScenarioMap {
                name: "littleton".into(),
                tier: LocationTier::Town,
                enforcement_day: 4,
                rows: vec![
                    "..........".into(),
                    "..^^......".into(),
                    "..^^..~~..".into(),
                    "######~~..".into(),
                    "...#......".into(),
                    "...#...!..".into(),
                    "...#......".into(),
                    ":::#......".into(),
                    "..........".into(),
                    "..........".into(),
                ],
            }],
            companies: vec![
                ScenarioCompany {
                    user: 1,
                    map: "littleton".into(),
                    cash: None,
                },
                ScenarioCompany {
                    user: 2,
                    map: "littleton".into(),
                    cash: None,
                },
            ],
        }
    }
}
