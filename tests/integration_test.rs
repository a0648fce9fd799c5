//! Full action → dirty → recompute → accrual loop against the in-memory
//! store.

use magnate::{
    grid::Coord,
    model::{MapId, TileId},
    scenario::{Scenario, ScenarioCompany, ScenarioMap},
    store::Store,
    Catalog, GameService,
};

fn fixture() -> Scenario {
    Scenario {
        name: "fixture".into(),
        seed: 11,
        maps: vec![ScenarioMap {
            name: "crossroads".into(),
            tier: magnate::model::LocationTier::Town,
            enforcement_day: 0,
            rows: vec![
                "......".into(),
                ".###..".into(),
                "......".into(),
                "..~...".into(),
                "......".into(),
                "......".into(),
            ],
        }],
        companies: vec![
            ScenarioCompany {
                user: 1,
                map: "crossroads".into(),
                cash: None,
            },
            ScenarioCompany {
                user: 2,
                map: "crossroads".into(),
                cash: None,
            },
        ],
    }
}

async fn tile_at(service: &GameService<magnate::store::MemoryStore>, map: MapId, x: i32, y: i32) -> TileId {
    service
        .store()
        .load_tile_at(map, Coord::new(x, y))
        .await
        .unwrap()
        .expect("tile exists")
        .id
}

#[tokio::test]
async fn buy_build_recompute_accrue() {
    let seeded = fixture().build_store().unwrap();
    let (map, alice) = (seeded.maps[0], seeded.companies[0]);
    let service = GameService::new(seeded.store, Catalog::standard());

    // Town land: open tile at base price, no tier markup.
    let receipt = service.buy_land(alice, Coord::new(2, 2)).await.unwrap();
    assert_eq!(receipt.cost, 500);
    assert_eq!(receipt.remaining_cash, 19_500);

    // Shop at (2,2): three roads and one pond in the window.
    let tile = tile_at(&service, map, 2, 2).await;
    let built = service.build(alice, tile, "shop").await.unwrap();
    assert_eq!(built.profit, 453);
    assert!(built.breakdown.iter().any(|m| m.label.contains("road")));
    assert!(built.breakdown.iter().any(|m| m.label.contains("water")));

    // The cache starts dirty; the pass fills it with the same figure.
    let building = service.store().load_building(built.building).await.unwrap();
    assert!(building.profit.dirty);
    assert_eq!(building.profit.value, 0);

    assert_eq!(service.recompute(map).await.unwrap(), 1);
    let building = service.store().load_building(built.building).await.unwrap();
    assert!(!building.profit.dirty);
    assert_eq!(building.profit.value, 453);

    // Convergence: nothing changed, the second pass is a no-op.
    assert_eq!(service.recompute(map).await.unwrap(), 0);
    let again = service.store().load_building(built.building).await.unwrap();
    assert_eq!(again.profit.value, 453);
    assert_eq!(again.profit.breakdown, building.profit.breakdown);

    // Passive income credits the cached value.
    let total = service.accrue_income(map).await.unwrap();
    assert_eq!(total, 453);
    let company = service.store().load_company(alice).await.unwrap();
    assert_eq!(company.cash, 19_500 - 8_000 + 453);
    // Purchase and construction were two gated actions; accrual is not one.
    assert_eq!(company.actions, 2);
}

#[tokio::test]
async fn neighbor_construction_invalidates_and_demolition_reverts() {
    let seeded = fixture().build_store().unwrap();
    let (map, alice, bob) = (seeded.maps[0], seeded.companies[0], seeded.companies[1]);
    let service = GameService::new(seeded.store, Catalog::standard());

    service.buy_land(alice, Coord::new(2, 2)).await.unwrap();
    let shop_tile = tile_at(&service, map, 2, 2).await;
    let shop = service.build(alice, shop_tile, "shop").await.unwrap();
    service.recompute(map).await.unwrap();

    // Bob opens a kiosk next door; the shop's neighborhood changed, so
    // both buildings need recomputation.
    service.buy_land(bob, Coord::new(3, 2)).await.unwrap();
    let kiosk_tile = tile_at(&service, map, 3, 2).await;
    let kiosk = service.build(bob, kiosk_tile, "kiosk").await.unwrap();
    assert_eq!(service.recompute(map).await.unwrap(), 2);

    // Shop gains commercial synergy from one standing neighbor:
    // 453's modifiers plus 0.2 * 0.5.
    let shop_row = service.store().load_building(shop.building).await.unwrap();
    assert_eq!(shop_row.profit.value, 493);
    assert!(shop_row
        .profit
        .breakdown
        .iter()
        .any(|m| m.label.contains("commercial synergy")));

    // Kiosk sees the same three roads: 40 * (1 + 0.1*(1 + ln(3)/2)) = 46.
    let kiosk_row = service.store().load_building(kiosk.building).await.unwrap();
    assert_eq!(kiosk_row.profit.value, 46);

    // Tearing the kiosk down restores the shop's old figure.
    service.demolish(bob, kiosk.building).await.unwrap();
    assert_eq!(service.recompute(map).await.unwrap(), 1);
    let shop_row = service.store().load_building(shop.building).await.unwrap();
    assert_eq!(shop_row.profit.value, 453);
}

#[tokio::test]
async fn preview_matches_build_and_mutates_nothing() {
    let seeded = fixture().build_store().unwrap();
    let (map, alice) = (seeded.maps[0], seeded.companies[0]);
    let service = GameService::new(seeded.store, Catalog::standard());

    let tile = tile_at(&service, map, 2, 2).await;
    let quote = service.preview_profit(tile, "shop").await.unwrap();
    assert_eq!(quote.profit, 453);
    assert!(service
        .store()
        .load_buildings(map, true)
        .await
        .unwrap()
        .is_empty());

    service.buy_land(alice, Coord::new(2, 2)).await.unwrap();
    let built = service.build(alice, tile, "shop").await.unwrap();
    assert_eq!(built.profit, quote.profit);
}

#[tokio::test]
async fn purchase_validation_and_conflicts() {
    let seeded = fixture().build_store().unwrap();
    let (alice, bob) = (seeded.companies[0], seeded.companies[1]);
    let service = GameService::new(seeded.store, Catalog::standard());

    // Water and road are never for sale.
    let err = service.buy_land(alice, Coord::new(2, 3)).await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Validation(_)));
    let err = service.buy_land(alice, Coord::new(1, 1)).await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Validation(_)));

    // Outside the map.
    let err = service.buy_land(alice, Coord::new(40, 0)).await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Validation(_)));

    // Losing the race for a tile is a conflict, not a validation error.
    service.buy_land(alice, Coord::new(4, 4)).await.unwrap();
    let err = service.buy_land(bob, Coord::new(4, 4)).await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Conflict(_)));

    // Building on someone else's land fails before any write.
    let tile = tile_at(&service, seeded.maps[0], 4, 4).await;
    let err = service.build(bob, tile, "kiosk").await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Precondition(_)));

    // Unknown building type.
    let err = service.build(alice, tile, "launchpad").await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Validation(_)));
}

#[tokio::test]
async fn level_gate_blocks_advanced_buildings() {
    let seeded = fixture().build_store().unwrap();
    let alice = seeded.companies[0];
    let service = GameService::new(seeded.store, Catalog::standard());

    service.buy_land(alice, Coord::new(2, 2)).await.unwrap();
    let tile = tile_at(&service, seeded.maps[0], 2, 2).await;
    // Sawmill needs level 2; a fresh company is level 1.
    let err = service.build(alice, tile, "sawmill").await.unwrap_err();
    assert!(matches!(err, magnate::GameError::Precondition(_)));

    let status = service.level_status(alice).await.unwrap();
    assert_eq!(status.level, 1);
    assert!(status.next_tier_buildings.contains(&"sawmill".to_string()));
}
