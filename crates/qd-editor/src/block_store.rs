//! Block-level design store.
//!
//! Owns the block document, its undo history, and the in-flight placement
//! gesture. Every mutating action follows the same path: compute the
//! before/after deltas, build one [`BlockOp`], apply it through the pure
//! reducers, and record it. Undo and redo apply whatever the history hands
//! back. Actions signal user-input rejection with `false`/`None`; nothing
//! here panics on bad input.

use crate::history::History;
use crate::placement::TwoTapPlacement;
use log::debug;
use qd_core::id::{EntityId, IdGen};
use qd_core::model::{
    Block, Color, CornerOrientation, FabricRole, GeeseDirection, GridPos, MAX_ROLES, Palette,
    RowColDelta, Unit, UnitKind,
};
use qd_core::occupancy;
use qd_core::op::{BlockOp, RoleReassign, apply_block};
use qd_core::persist::{self, PersistError};
use qd_core::registry::{self, PlacementRule, UnitPatch, UnitTag};

pub const DEFAULT_BLOCK_SIZE: u32 = 6;

/// What a grid tap means right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Select,
    Place(UnitTag),
}

pub struct BlockStore {
    block: Block,
    history: History<BlockOp>,
    ids: IdGen,
    mode: EditMode,
    selected: Option<EntityId>,
    geese: TwoTapPlacement,
}

impl BlockStore {
    pub fn new(size: u32) -> Self {
        let mut ids = IdGen::new();
        let palette = Palette::starter(&mut ids);
        Self {
            block: Block::new(size, palette),
            history: History::default(),
            ids,
            mode: EditMode::Select,
            selected: None,
            geese: TwoTapPlacement::new(),
        }
    }

    /// Adopt an existing document, reseeding the id generator past every
    /// id it contains.
    pub fn from_block(block: Block) -> Self {
        let mut ids = IdGen::new();
        ids.seed_past(
            block
                .units
                .iter()
                .map(|u| &u.id)
                .chain(block.palette.roles.iter().map(|r| &r.id)),
        );
        Self {
            block,
            history: History::default(),
            ids,
            mode: EditMode::Select,
            selected: None,
            geese: TwoTapPlacement::new(),
        }
    }

    pub fn load(raw: &str) -> Result<Self, PersistError> {
        Ok(Self::from_block(persist::load_block(raw)?))
    }

    pub fn save(&self) -> Result<String, PersistError> {
        persist::save_block(&self.block)
    }

    // ─── Snapshot access ─────────────────────────────────────────────────

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Switching modes abandons any in-flight gesture.
    pub fn set_mode(&mut self, mode: EditMode) {
        self.geese.cancel();
        self.mode = mode;
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    pub fn select_unit(&mut self, id: EntityId) -> bool {
        if self.block.unit(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // ─── Placement ───────────────────────────────────────────────────────

    /// Mode-dispatched tap handler: select in `Select` mode, place in
    /// `Place` mode. Two-tap unit types route through the gesture machine.
    pub fn place_at(&mut self, pos: GridPos) -> Option<EntityId> {
        match self.mode {
            EditMode::Select => {
                self.selected = occupancy::unit_at(&self.block.units, pos).map(|u| u.id);
                None
            }
            EditMode::Place(tag) => match registry::unit_def(tag).placement {
                PlacementRule::SingleCell => self.add_unit(tag, pos),
                PlacementRule::TwoTapPair => {
                    if self.geese.is_active() {
                        self.complete_geese_placement(pos)
                    } else {
                        self.begin_geese_placement(pos);
                        None
                    }
                }
            },
        }
    }

    /// Place a single-cell unit of the given type. Rejects two-tap types,
    /// out-of-bounds anchors, and occupied cells.
    pub fn add_unit(&mut self, tag: UnitTag, pos: GridPos) -> Option<EntityId> {
        if registry::unit_def(tag).placement != PlacementRule::SingleCell {
            return None;
        }
        let kind = self.default_kind(tag, GeeseDirection::Right);
        self.insert_unit(kind, pos)
    }

    pub fn begin_geese_placement(&mut self, first: GridPos) -> bool {
        self.geese.begin(self.block.size, &self.block.units, first)
    }

    /// Valid second-tap cells while a gesture is in flight.
    pub fn geese_candidates(&self) -> Option<&[GridPos]> {
        self.geese.valid_cells()
    }

    pub fn complete_geese_placement(&mut self, second: GridPos) -> Option<EntityId> {
        let (anchor, direction) = self.geese.complete(second)?;
        let kind = self.default_kind(UnitTag::FlyingGeese, direction);
        self.insert_unit(kind, anchor)
    }

    pub fn cancel_geese_placement(&mut self) {
        self.geese.cancel();
    }

    /// Batch-place squares over every unoccupied cell of the dragged
    /// rectangle; one undo step. Returns the number of placed units.
    pub fn fill_range(&mut self, anchor: Option<GridPos>, end: GridPos) -> usize {
        let cells = occupancy::range_fill(self.block.size, &self.block.units, anchor, end);
        if cells.is_empty() {
            return 0;
        }
        let role = self.block.palette.roles[0].id;
        let base = self.block.units.len();
        let ops: Vec<BlockOp> = cells
            .iter()
            .enumerate()
            .map(|(offset, &pos)| BlockOp::AddUnit {
                unit: Unit::new(self.ids.next("unit"), pos, UnitKind::Square { role }),
                index: base + offset,
            })
            .collect();
        let count = ops.len();
        self.apply_and_record(single_or_batch(ops));
        count
    }

    pub fn remove_unit(&mut self, id: EntityId) -> bool {
        let Some(index) = self.block.units.iter().position(|u| u.id == id) else {
            return false;
        };
        let op = BlockOp::RemoveUnit {
            unit: self.block.units[index].clone(),
            index,
        };
        self.apply_and_record(op)
    }

    // ─── Transforms ──────────────────────────────────────────────────────

    /// Rotate a unit a quarter turn. No-op (false) for rotation-insensitive
    /// types and for rotations whose swapped span would leave the grid or
    /// collide with a neighbor.
    pub fn rotate_unit(&mut self, id: EntityId) -> bool {
        let Some(unit) = self.block.unit(id) else {
            return false;
        };
        let Some(patch) = registry::rotate(unit) else {
            return false;
        };
        self.record_unit_transform(id, patch)
    }

    pub fn flip_unit_h(&mut self, id: EntityId) -> bool {
        let Some(unit) = self.block.unit(id) else {
            return false;
        };
        let Some(patch) = registry::flip_h(unit) else {
            return false;
        };
        self.record_unit_transform(id, patch)
    }

    pub fn flip_unit_v(&mut self, id: EntityId) -> bool {
        let Some(unit) = self.block.unit(id) else {
            return false;
        };
        let Some(patch) = registry::flip_v(unit) else {
            return false;
        };
        self.record_unit_transform(id, patch)
    }

    /// Assign a palette role to one of the unit's slots (the type's primary
    /// slot when `part` is absent or unknown).
    pub fn assign_unit_role(&mut self, id: EntityId, role: EntityId, part: Option<&str>) -> bool {
        if self.block.palette.role(role).is_none() {
            return false;
        }
        let Some(unit) = self.block.unit(id) else {
            return false;
        };
        let Some((prev, next)) = registry::assign_role(unit, role, part) else {
            return false;
        };
        let op = BlockOp::UpdateUnit { id, prev, next };
        self.apply_and_record(op)
    }

    // ─── Palette lifecycle ───────────────────────────────────────────────

    pub fn set_role_color(&mut self, id: EntityId, color: Color) -> bool {
        let Some(role) = self.block.palette.role(id) else {
            return false;
        };
        if role.color == color {
            return false;
        }
        let op = BlockOp::SetRoleColor {
            id,
            prev: role.color,
            next: color,
        };
        self.apply_and_record(op)
    }

    /// Add a role with the next unused default color. `None` once the
    /// palette is at capacity.
    pub fn add_role(&mut self, name: Option<&str>) -> Option<EntityId> {
        if self.block.palette.roles.len() >= MAX_ROLES {
            return None;
        }
        let id = self.ids.next("role");
        let role = FabricRole {
            id,
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("Fabric {}", self.block.palette.roles.len() + 1)),
            color: self.block.palette.next_unused_color(),
            variant: false,
        };
        let index = self.block.palette.roles.len();
        self.apply_and_record(BlockOp::AddRole { role, index })
            .then_some(id)
    }

    /// Remove a role, reassigning every referencing unit to `fallback`
    /// (the first other role when none is given). Refuses to empty the
    /// palette.
    pub fn remove_role(&mut self, id: EntityId, fallback: Option<EntityId>) -> bool {
        let palette = &self.block.palette;
        if palette.roles.len() <= 1 {
            return false;
        }
        let Some(index) = palette.index_of(id) else {
            return false;
        };
        let Some(fallback) = fallback
            .filter(|f| *f != id && palette.role(*f).is_some())
            .or_else(|| palette.fallback_for(id))
        else {
            return false;
        };

        let mut reassigned = Vec::new();
        for unit in &self.block.units {
            if let Some(next) = registry::replace_role(unit, id, fallback) {
                reassigned.push(RoleReassign {
                    unit: unit.id,
                    prev: UnitPatch::of_kind(unit.kind.clone()),
                    next,
                });
            }
        }
        let op = BlockOp::RemoveRole {
            role: palette.roles[index].clone(),
            index,
            fallback: Some(fallback),
            reassigned,
        };
        self.apply_and_record(op)
    }

    pub fn rename_role(&mut self, id: EntityId, name: &str) -> bool {
        let Some(role) = self.block.palette.role(id) else {
            return false;
        };
        if role.name == name {
            return false;
        }
        let op = BlockOp::RenameRole {
            id,
            prev: role.name.clone(),
            next: name.to_string(),
        };
        self.apply_and_record(op)
    }

    // ─── Resize ──────────────────────────────────────────────────────────

    /// Resize the square grid, dropping units the new bounds cannot hold.
    /// Size change and removals land in one operation, so undo restores
    /// both atomically.
    pub fn resize(&mut self, new_size: u32) -> bool {
        self.resize_shifted(new_size, RowColDelta::NONE)
    }

    /// Resize with a positional shift (e.g. growing by a row at the top
    /// shifts every unit down one).
    pub fn resize_shifted(&mut self, new_size: u32, shift: RowColDelta) -> bool {
        if new_size == 0 || (new_size == self.block.size && shift == RowColDelta::NONE) {
            return false;
        }
        let mut removed = Vec::new();
        for (index, unit) in self.block.units.iter().enumerate() {
            let span = unit.span();
            let keep = unit
                .pos
                .shifted(shift)
                .is_some_and(|pos| pos.row + span.rows <= new_size && pos.col + span.cols <= new_size);
            if !keep {
                removed.push((index, unit.clone()));
            }
        }
        let op = BlockOp::ResizeGrid {
            prev_size: self.block.size,
            next_size: new_size,
            shift,
            removed,
            restored: Vec::new(),
        };
        // The cached adjacency set of an in-flight gesture is stale now.
        self.geese.cancel();
        self.apply_and_record(op)
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let Some(inverse) = self.history.undo() else {
            return false;
        };
        self.apply_only(&inverse);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(op) = self.history.redo() else {
            return false;
        };
        self.apply_only(&op);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn default_kind(&self, tag: UnitTag, direction: GeeseDirection) -> UnitKind {
        let primary = self.block.palette.roles[0].id;
        let secondary = self
            .block
            .palette
            .roles
            .get(1)
            .map_or(primary, |r| r.id);
        match tag {
            UnitTag::Square => UnitKind::Square { role: primary },
            UnitTag::Hst => UnitKind::Hst {
                corner: CornerOrientation::Nw,
                dark: secondary,
                light: primary,
            },
            UnitTag::FlyingGeese => UnitKind::FlyingGeese {
                direction,
                goose: secondary,
                sky: primary,
            },
            UnitTag::Qst => UnitKind::Qst {
                patches: [primary, secondary, primary, secondary],
            },
        }
    }

    fn insert_unit(&mut self, kind: UnitKind, pos: GridPos) -> Option<EntityId> {
        let span = registry::unit_def(kind.tag()).span(&kind);
        if !self.block.fits(pos, span) {
            return None;
        }
        for row in pos.row..pos.row + span.rows {
            for col in pos.col..pos.col + span.cols {
                if occupancy::is_occupied(&self.block.units, GridPos::new(row, col)) {
                    return None;
                }
            }
        }
        let unit = Unit::new(self.ids.next("unit"), pos, kind);
        let id = unit.id;
        let index = self.block.units.len();
        self.apply_and_record(BlockOp::AddUnit { unit, index })
            .then_some(id)
    }

    /// Validate a kind-changing transform against the grid (a rotated
    /// geese unit swaps its span) and record it.
    fn record_unit_transform(&mut self, id: EntityId, next: UnitPatch) -> bool {
        let Some(unit) = self.block.unit(id) else {
            return false;
        };
        let Some(new_kind) = next.kind.clone() else {
            return false;
        };
        let span = registry::unit_def(new_kind.tag()).span(&new_kind);
        if !self.block.fits(unit.pos, span) {
            return false;
        }
        for row in unit.pos.row..unit.pos.row + span.rows {
            for col in unit.pos.col..unit.pos.col + span.cols {
                if let Some(other) = occupancy::unit_at(&self.block.units, GridPos::new(row, col))
                    && other.id != id
                {
                    return false;
                }
            }
        }
        let op = BlockOp::UpdateUnit {
            id,
            prev: UnitPatch::of_kind(unit.kind.clone()),
            next,
        };
        self.apply_and_record(op)
    }

    fn apply_and_record(&mut self, op: BlockOp) -> bool {
        let Some(next) = apply_block(&self.block, &op) else {
            return false;
        };
        debug!("block edit: {op:?}");
        self.block = next;
        self.history.record(op);
        self.retain_selection();
        true
    }

    fn apply_only(&mut self, op: &BlockOp) {
        if let Some(next) = apply_block(&self.block, op) {
            self.block = next;
        }
        self.retain_selection();
    }

    fn retain_selection(&mut self) {
        if let Some(id) = self.selected
            && self.block.unit(id).is_none()
        {
            self.selected = None;
        }
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

fn single_or_batch(mut ops: Vec<BlockOp>) -> BlockOp {
    if ops.len() == 1 {
        ops.remove(0)
    } else {
        BlockOp::Batch { ops }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn overlapping_placement_is_rejected() {
        let mut store = BlockStore::new(4);
        assert!(store.add_unit(UnitTag::Square, GridPos::new(1, 1)).is_some());
        assert!(store.add_unit(UnitTag::Hst, GridPos::new(1, 1)).is_none());
        assert!(store.add_unit(UnitTag::Square, GridPos::new(4, 0)).is_none());
        assert_eq!(store.block().units.len(), 1);
    }

    #[test]
    fn geese_cannot_be_placed_single_tap() {
        let mut store = BlockStore::new(4);
        assert!(
            store
                .add_unit(UnitTag::FlyingGeese, GridPos::new(0, 0))
                .is_none()
        );
    }

    #[test]
    fn mode_dispatch_places_and_selects() {
        let mut store = BlockStore::new(4);
        store.set_mode(EditMode::Place(UnitTag::Square));
        let id = store.place_at(GridPos::new(2, 2)).unwrap();

        store.set_mode(EditMode::Select);
        assert_eq!(store.place_at(GridPos::new(2, 2)), None);
        assert_eq!(store.selected(), Some(id));

        store.clear_selection();
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn removing_selected_unit_clears_selection() {
        let mut store = BlockStore::new(4);
        let id = store.add_unit(UnitTag::Square, GridPos::new(0, 0)).unwrap();
        store.select_unit(id);
        store.remove_unit(id);
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn rotation_blocked_when_swapped_span_collides() {
        let mut store = BlockStore::new(4);
        store.set_mode(EditMode::Place(UnitTag::FlyingGeese));
        assert_eq!(store.place_at(GridPos::new(0, 0)), None);
        let geese = store.place_at(GridPos::new(0, 1)).unwrap();
        // A square directly below the anchor blocks the 2×1 footprint.
        assert!(store.add_unit(UnitTag::Square, GridPos::new(1, 0)).is_some());

        assert!(!store.rotate_unit(geese));
        match &store.block().unit(geese).unwrap().kind {
            UnitKind::FlyingGeese { direction, .. } => {
                assert_eq!(*direction, GeeseDirection::Right);
            }
            _ => panic!("expected FlyingGeese"),
        }
    }

    #[test]
    fn fill_range_is_one_undo_step() {
        let mut store = BlockStore::new(4);
        let placed = store.fill_range(Some(GridPos::new(0, 0)), GridPos::new(1, 1));
        assert_eq!(placed, 4);
        assert_eq!(store.block().units.len(), 4);

        assert!(store.undo());
        assert_eq!(store.block().units.len(), 0);
    }

    #[test]
    fn add_role_caps_at_palette_limit() {
        let mut store = BlockStore::new(4);
        while store.block().palette.roles.len() < MAX_ROLES {
            assert!(store.add_role(None).is_some());
        }
        assert_eq!(store.add_role(None), None);
    }

    #[test]
    fn last_role_cannot_be_removed() {
        let mut store = BlockStore::new(4);
        let first = store.block().palette.roles[0].id;
        let second = store.block().palette.roles[1].id;
        assert!(store.remove_role(second, None));
        assert!(!store.remove_role(first, None));
        assert_eq!(store.block().palette.roles.len(), 1);
    }
}
