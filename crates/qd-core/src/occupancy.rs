//! Grid occupancy and adjacency queries.
//!
//! All queries are O(units) scans. Realistic blocks hold a few dozen
//! units at most, so nothing here maintains an index.

use crate::model::{GridPos, Unit};
use smallvec::SmallVec;

/// True if any unit's span covers `pos` — multi-cell units occupy every
/// cell of their footprint, not just the anchor.
pub fn is_occupied(units: &[Unit], pos: GridPos) -> bool {
    units.iter().any(|u| u.covers(pos))
}

/// The unit whose span covers `pos`, if any.
pub fn unit_at(units: &[Unit], pos: GridPos) -> Option<&Unit> {
    units.iter().find(|u| u.covers(pos))
}

/// The orthogonal neighbors of `pos` that are in bounds and unoccupied,
/// probed in up/down/left/right order. Drives the two-tap placement
/// gesture for flying geese.
pub fn valid_adjacent_cells(size: u32, units: &[Unit], pos: GridPos) -> SmallVec<[GridPos; 4]> {
    let mut cells = SmallVec::new();
    let mut push = |row: i64, col: i64| {
        if row < 0 || col < 0 || row >= size as i64 || col >= size as i64 {
            return;
        }
        let cell = GridPos::new(row as u32, col as u32);
        if !is_occupied(units, cell) {
            cells.push(cell);
        }
    };
    let (r, c) = (pos.row as i64, pos.col as i64);
    push(r - 1, c);
    push(r + 1, c);
    push(r, c - 1);
    push(r, c + 1);
    cells
}

/// Every unoccupied cell in the axis-aligned rectangle between `anchor`
/// and `end`, inclusive, iterated row-major. With no anchor the range
/// degenerates to the single `end` cell. Out-of-bounds corners are
/// clamped by the caller passing in-bounds positions; cells beyond the
/// grid are skipped.
pub fn range_fill(size: u32, units: &[Unit], anchor: Option<GridPos>, end: GridPos) -> Vec<GridPos> {
    let anchor = anchor.unwrap_or(end);
    let (r0, r1) = (anchor.row.min(end.row), anchor.row.max(end.row));
    let (c0, c1) = (anchor.col.min(end.col), anchor.col.max(end.col));

    let mut cells = Vec::new();
    for row in r0..=r1.min(size.saturating_sub(1)) {
        for col in c0..=c1.min(size.saturating_sub(1)) {
            let cell = GridPos::new(row, col);
            if !is_occupied(units, cell) {
                cells.push(cell);
            }
        }
    }
    cells
}
