//! Dirty tracker: flags buildings whose cached profit may be stale.
//!
//! Called after every map-affecting event: construction, demolition,
//! damage change, ownership transfer, terrain change. Marking must never
//! miss a building in range; a spurious mark only costs one extra
//! recompute.

use crate::error::GameResult;
use crate::grid::{Coord, ADJACENCY_RADIUS};
use crate::model::MapId;
use crate::store::{Store, WriteOp};

/// Flag every non-collapsed building within Chebyshev distance 2 of
/// `center` as needing recomputation. Idempotent; returns how many
/// buildings were newly marked.
pub async fn mark_dirty<S: Store>(store: &S, map: MapId, center: Coord) -> GameResult<usize> {
    let buildings = store.load_buildings(map, false).await?;
    let ops: Vec<WriteOp> = buildings
        .iter()
        .filter(|b| {
            !b.collapsed && !b.profit.dirty && center.chebyshev(b.pos()) <= ADJACENCY_RADIUS
        })
        .map(|b| WriteOp::MarkDirty { building: b.id })
        .collect();
    let marked = ops.len();
    if marked > 0 {
        store.batch_write(ops).await?;
    }
    Ok(marked)
}
