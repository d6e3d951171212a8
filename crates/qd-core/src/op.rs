//! Reversible block-level operations.
//!
//! Every edit to a block document is described by one [`BlockOp`] value
//! carrying enough data to both apply and invert itself without consulting
//! outside state — a remove carries the full removed unit so its inverse,
//! an add, needs no lookup. Application happens through per-slice reducers
//! (`apply_units`, `apply_palette`, `apply_size`); a reducer returns `None`
//! when the operation did not touch its slice, so the store can skip
//! downstream invalidation.
//!
//! An operation referencing an entity absent from the document no-ops that
//! slice and logs a warning; see DESIGN.md for the rationale.

use crate::id::EntityId;
use crate::model::{Block, Color, FabricRole, Palette, RowColDelta, Unit};
use crate::registry::UnitPatch;
use log::warn;
use serde::{Deserialize, Serialize};

// ─── Inversion ───────────────────────────────────────────────────────────

/// An operation type with a structural inverse. Shared by both the
/// block-level and pattern-level vocabularies so one undo manager serves
/// both editors.
pub trait Invert {
    fn inverted(&self) -> Self;
}

/// Batch inversion rule: invert each member and reverse the list, so the
/// member applied last is undone first.
pub fn invert_members<T: Invert>(ops: &[T]) -> Vec<T> {
    ops.iter().rev().map(Invert::inverted).collect()
}

// ─── Operations ──────────────────────────────────────────────────────────

/// One unit's role state captured across a role removal: `prev` restores
/// whichever slot held the removed role, `next` is the fallback
/// reassignment. Whole-kind snapshots, so multi-part units restore exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReassign {
    pub unit: EntityId,
    pub prev: UnitPatch,
    pub next: UnitPatch,
}

/// The closed set of reversible block edits.
///
/// Add/remove carry the unit's list index so undo restores not just the
/// entity but its exact position in the document — round-trips are
/// list-identical, not merely set-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockOp {
    AddUnit {
        unit: Unit,
        index: usize,
    },
    RemoveUnit {
        unit: Unit,
        index: usize,
    },
    /// Generic partial-field update; `prev` and `next` are exact mirrors.
    UpdateUnit {
        id: EntityId,
        prev: UnitPatch,
        next: UnitPatch,
    },
    SetRoleColor {
        id: EntityId,
        prev: Color,
        next: Color,
    },
    AddRole {
        role: FabricRole,
        index: usize,
    },
    /// Removes a palette role and reassigns every referencing unit to
    /// `fallback` in the same atomic step. Inverts to a batch: the role
    /// re-added at its original index, then each unit's prior slot state
    /// restored.
    RemoveRole {
        role: FabricRole,
        index: usize,
        fallback: Option<EntityId>,
        reassigned: Vec<RoleReassign>,
    },
    RenameRole {
        id: EntityId,
        prev: String,
        next: String,
    },
    /// Grid resize with the remove/restore direction encoded explicitly:
    /// `apply` always drops `removed`, shifts survivors by `shift`, then
    /// inserts `restored` back at their recorded indexes. Inversion swaps
    /// the sizes and lists and negates the shift — no size-comparison
    /// inference.
    ResizeGrid {
        prev_size: u32,
        next_size: u32,
        shift: RowColDelta,
        removed: Vec<(usize, Unit)>,
        restored: Vec<(usize, Unit)>,
    },
    /// Ordered group applied in order, inverted member-wise in reverse.
    Batch {
        ops: Vec<BlockOp>,
    },
}

impl Invert for BlockOp {
    fn inverted(&self) -> Self {
        match self {
            Self::AddUnit { unit, index } => Self::RemoveUnit {
                unit: unit.clone(),
                index: *index,
            },
            Self::RemoveUnit { unit, index } => Self::AddUnit {
                unit: unit.clone(),
                index: *index,
            },
            Self::UpdateUnit { id, prev, next } => Self::UpdateUnit {
                id: *id,
                prev: next.clone(),
                next: prev.clone(),
            },
            Self::SetRoleColor { id, prev, next } => Self::SetRoleColor {
                id: *id,
                prev: *next,
                next: *prev,
            },
            Self::AddRole { role, index } => Self::RemoveRole {
                role: role.clone(),
                index: *index,
                fallback: None,
                reassigned: Vec::new(),
            },
            Self::RemoveRole {
                role,
                index,
                reassigned,
                ..
            } => {
                if reassigned.is_empty() {
                    return Self::AddRole {
                        role: role.clone(),
                        index: *index,
                    };
                }
                let mut ops = Vec::with_capacity(reassigned.len() + 1);
                ops.push(Self::AddRole {
                    role: role.clone(),
                    index: *index,
                });
                ops.extend(reassigned.iter().map(|r| Self::UpdateUnit {
                    id: r.unit,
                    prev: r.next.clone(),
                    next: r.prev.clone(),
                }));
                Self::Batch { ops }
            }
            Self::RenameRole { id, prev, next } => Self::RenameRole {
                id: *id,
                prev: next.clone(),
                next: prev.clone(),
            },
            Self::ResizeGrid {
                prev_size,
                next_size,
                shift,
                removed,
                restored,
            } => Self::ResizeGrid {
                prev_size: *next_size,
                next_size: *prev_size,
                shift: shift.negated(),
                removed: restored.clone(),
                restored: removed.clone(),
            },
            Self::Batch { ops } => Self::Batch {
                ops: invert_members(ops),
            },
        }
    }
}

// ─── Unit slice reducer ──────────────────────────────────────────────────

/// Apply `op` to the unit list. `None` when the slice is untouched.
pub fn apply_units(units: &[Unit], op: &BlockOp) -> Option<Vec<Unit>> {
    match op {
        BlockOp::AddUnit { unit, index } => {
            if units.iter().any(|u| u.id == unit.id) {
                warn!("add_unit: id {} already present, skipping", unit.id);
                return None;
            }
            let mut next = units.to_vec();
            next.insert((*index).min(next.len()), unit.clone());
            Some(next)
        }
        BlockOp::RemoveUnit { unit, .. } => {
            if !units.iter().any(|u| u.id == unit.id) {
                warn!("remove_unit: id {} not present", unit.id);
                return None;
            }
            Some(units.iter().filter(|u| u.id != unit.id).cloned().collect())
        }
        BlockOp::UpdateUnit { id, next, .. } => patch_unit(units, *id, next),
        BlockOp::RemoveRole { reassigned, .. } => {
            let mut current: Option<Vec<Unit>> = None;
            for r in reassigned {
                let slice = current.as_deref().unwrap_or(units);
                if let Some(next) = patch_unit(slice, r.unit, &r.next) {
                    current = Some(next);
                }
            }
            current
        }
        BlockOp::ResizeGrid {
            shift,
            removed,
            restored,
            ..
        } => {
            let mut next: Vec<Unit> = units
                .iter()
                .filter(|u| !removed.iter().any(|(_, r)| r.id == u.id))
                .cloned()
                .collect();
            if *shift != RowColDelta::NONE {
                next.retain_mut(|u| match u.pos.shifted(*shift) {
                    Some(pos) => {
                        u.pos = pos;
                        true
                    }
                    None => {
                        warn!("resize: unit {} shifted out of bounds, dropping", u.id);
                        false
                    }
                });
            }
            let mut restored: Vec<&(usize, Unit)> = restored.iter().collect();
            restored.sort_by_key(|(index, _)| *index);
            for (index, unit) in restored {
                next.insert((*index).min(next.len()), unit.clone());
            }
            if next == units { None } else { Some(next) }
        }
        BlockOp::Batch { ops } => {
            let mut current: Option<Vec<Unit>> = None;
            for member in ops {
                let slice = current.as_deref().unwrap_or(units);
                if let Some(next) = apply_units(slice, member) {
                    current = Some(next);
                }
            }
            current
        }
        _ => None,
    }
}

fn patch_unit(units: &[Unit], id: EntityId, patch: &UnitPatch) -> Option<Vec<Unit>> {
    if patch.is_empty() {
        return None;
    }
    let idx = units.iter().position(|u| u.id == id);
    let Some(idx) = idx else {
        warn!("update_unit: id {id} not present");
        return None;
    };
    let mut next = units.to_vec();
    patch.apply_to(&mut next[idx]);
    if next[idx] == units[idx] { None } else { Some(next) }
}

// ─── Palette slice reducer ───────────────────────────────────────────────

/// Apply `op` to the palette. `None` when the slice is untouched.
pub fn apply_palette(palette: &Palette, op: &BlockOp) -> Option<Palette> {
    match op {
        BlockOp::SetRoleColor { id, next, .. } => palette_set_color(palette, *id, *next),
        BlockOp::AddRole { role, index } => palette_add_role(palette, role, *index),
        BlockOp::RemoveRole { role, .. } => palette_remove_role(palette, role.id),
        BlockOp::RenameRole { id, next, .. } => palette_rename_role(palette, *id, next),
        BlockOp::Batch { ops } => {
            let mut current: Option<Palette> = None;
            for member in ops {
                let slice = current.as_ref().unwrap_or(palette);
                if let Some(next) = apply_palette(slice, member) {
                    current = Some(next);
                }
            }
            current
        }
        _ => None,
    }
}

pub(crate) fn palette_set_color(palette: &Palette, id: EntityId, next: Color) -> Option<Palette> {
    let Some(idx) = palette.index_of(id) else {
        warn!("set_role_color: role {id} not present");
        return None;
    };
    if palette.roles[idx].color == next {
        return None;
    }
    let mut out = palette.clone();
    out.roles[idx].color = next;
    Some(out)
}

pub(crate) fn palette_add_role(palette: &Palette, role: &FabricRole, index: usize) -> Option<Palette> {
    if palette.role(role.id).is_some() {
        warn!("add_role: role {} already present", role.id);
        return None;
    }
    let mut out = palette.clone();
    out.roles.insert(index.min(out.roles.len()), role.clone());
    Some(out)
}

pub(crate) fn palette_remove_role(palette: &Palette, id: EntityId) -> Option<Palette> {
    let Some(idx) = palette.index_of(id) else {
        warn!("remove_role: role {id} not present");
        return None;
    };
    let mut out = palette.clone();
    out.roles.remove(idx);
    Some(out)
}

pub(crate) fn palette_rename_role(palette: &Palette, id: EntityId, next: &str) -> Option<Palette> {
    let Some(idx) = palette.index_of(id) else {
        warn!("rename_role: role {id} not present");
        return None;
    };
    if palette.roles[idx].name == next {
        return None;
    }
    let mut out = palette.clone();
    out.roles[idx].name = next.to_string();
    Some(out)
}

// ─── Size slice reducer ──────────────────────────────────────────────────

/// Apply `op` to the grid size. `None` when the slice is untouched.
pub fn apply_size(size: u32, op: &BlockOp) -> Option<u32> {
    match op {
        BlockOp::ResizeGrid { next_size, .. } => (*next_size != size).then_some(*next_size),
        BlockOp::Batch { ops } => {
            let mut current: Option<u32> = None;
            for member in ops {
                if let Some(next) = apply_size(current.unwrap_or(size), member) {
                    current = Some(next);
                }
            }
            current
        }
        _ => None,
    }
}

// ─── Whole-document reducer ──────────────────────────────────────────────

/// Apply `op` across every slice. `None` when nothing changed at all.
pub fn apply_block(block: &Block, op: &BlockOp) -> Option<Block> {
    let units = apply_units(&block.units, op);
    let palette = apply_palette(&block.palette, op);
    let size = apply_size(block.size, op);
    if units.is_none() && palette.is_none() && size.is_none() {
        return None;
    }
    Some(Block {
        size: size.unwrap_or(block.size),
        units: units.unwrap_or_else(|| block.units.clone()),
        palette: palette.unwrap_or_else(|| block.palette.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{EntityId, IdGen};
    use crate::model::{CornerOrientation, GridPos, UnitKind};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> EntityId {
        EntityId::intern(s)
    }

    fn square(uid: &str, row: u32, col: u32, role: &str) -> Unit {
        Unit::new(id(uid), GridPos::new(row, col), UnitKind::Square { role: id(role) })
    }

    fn sample_block() -> Block {
        let mut ids = IdGen::new();
        let mut block = Block::new(4, Palette::starter(&mut ids));
        block.units.push(square("u_a", 0, 0, "role_0"));
        block.units.push(square("u_b", 1, 2, "role_1"));
        block
    }

    // ─── Inversion law ───────────────────────────────────────────────────

    #[test]
    fn double_inversion_is_structural_identity() {
        let ops = vec![
            BlockOp::AddUnit {
                unit: square("u_x", 2, 2, "role_0"),
                index: 2,
            },
            BlockOp::RemoveUnit {
                unit: square("u_x", 2, 2, "role_0"),
                index: 2,
            },
            BlockOp::UpdateUnit {
                id: id("u_a"),
                prev: UnitPatch::of_kind(UnitKind::Square { role: id("role_0") }),
                next: UnitPatch::of_kind(UnitKind::Square { role: id("role_1") }),
            },
            BlockOp::SetRoleColor {
                id: id("role_0"),
                prev: Color::rgb(1, 2, 3),
                next: Color::rgb(4, 5, 6),
            },
            BlockOp::RenameRole {
                id: id("role_0"),
                prev: "Background".into(),
                next: "Sky".into(),
            },
            BlockOp::ResizeGrid {
                prev_size: 4,
                next_size: 3,
                shift: RowColDelta { rows: -1, cols: 2 },
                removed: vec![(1, square("u_gone", 3, 3, "role_0"))],
                restored: vec![],
            },
        ];
        for op in &ops {
            assert_eq!(&op.inverted().inverted(), op);
        }

        // Batch double-inversion preserves member order.
        let batch = BlockOp::Batch { ops };
        assert_eq!(batch.inverted().inverted(), batch);
    }

    #[test]
    fn remove_role_inverts_to_batch() {
        let role = FabricRole {
            id: id("role_acc"),
            name: "Accent".into(),
            color: Color::rgb(9, 9, 9),
            variant: false,
        };
        let op = BlockOp::RemoveRole {
            role: role.clone(),
            index: 2,
            fallback: Some(id("role_0")),
            reassigned: vec![RoleReassign {
                unit: id("u_a"),
                prev: UnitPatch::of_kind(UnitKind::Square { role: id("role_acc") }),
                next: UnitPatch::of_kind(UnitKind::Square { role: id("role_0") }),
            }],
        };
        match op.inverted() {
            BlockOp::Batch { ops } => {
                assert_eq!(ops.len(), 2);
                assert!(matches!(&ops[0], BlockOp::AddRole { index: 2, .. }));
                match &ops[1] {
                    BlockOp::UpdateUnit { id: uid, next, .. } => {
                        assert_eq!(*uid, id("u_a"));
                        assert_eq!(
                            next.kind,
                            Some(UnitKind::Square { role: id("role_acc") })
                        );
                    }
                    other => panic!("expected UpdateUnit, got {other:?}"),
                }
            }
            other => panic!("expected Batch, got {other:?}"),
        }
    }

    // ─── Reducers ────────────────────────────────────────────────────────

    #[test]
    fn irrelevant_op_leaves_slice_untouched() {
        let block = sample_block();
        let op = BlockOp::SetRoleColor {
            id: block.palette.roles[0].id,
            prev: block.palette.roles[0].color,
            next: Color::rgb(0, 0, 0),
        };
        assert_eq!(apply_units(&block.units, &op), None);
        assert_eq!(apply_size(block.size, &op), None);
        assert!(apply_palette(&block.palette, &op).is_some());
    }

    #[test]
    fn add_then_inverted_remove_roundtrips() {
        let block = sample_block();
        let op = BlockOp::AddUnit {
            unit: square("u_new", 3, 3, "role_0"),
            index: 2,
        };
        let after = apply_block(&block, &op).unwrap();
        assert_eq!(after.units.len(), 3);
        let back = apply_block(&after, &op.inverted()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn middle_removal_restores_exact_position() {
        let mut block = sample_block();
        block.units.push(square("u_c", 3, 3, "role_0"));
        let op = BlockOp::RemoveUnit {
            unit: block.units[1].clone(),
            index: 1,
        };
        let after = apply_block(&block, &op).unwrap();
        assert_eq!(after.units.len(), 2);

        let back = apply_block(&after, &op.inverted()).unwrap();
        assert_eq!(back, block, "undo restores the unit at its old index");
    }

    #[test]
    fn update_missing_unit_is_noop() {
        let block = sample_block();
        let op = BlockOp::UpdateUnit {
            id: id("u_ghost"),
            prev: UnitPatch::default(),
            next: UnitPatch::of_kind(UnitKind::Square { role: id("role_1") }),
        };
        assert_eq!(apply_units(&block.units, &op), None);
    }

    #[test]
    fn resize_drop_shift_restore_order() {
        let block = sample_block();
        // Drop the first column: u_a sits in it, everything else shifts left.
        let op = BlockOp::ResizeGrid {
            prev_size: 4,
            next_size: 3,
            shift: RowColDelta { rows: 0, cols: -1 },
            removed: vec![(0, square("u_a", 0, 0, "role_0"))],
            restored: vec![],
        };
        let after = apply_block(&block, &op).unwrap();
        assert_eq!(after.size, 3);
        assert_eq!(after.units.len(), 1);
        assert_eq!(after.units[0].id, id("u_b"));
        assert_eq!(after.units[0].pos, GridPos::new(1, 1));

        let back = apply_block(&after, &op.inverted()).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn opposite_sign_resize_composes() {
        // Grow rows while shrinking cols: shift encodes both directions.
        let mut block = sample_block();
        block.units = vec![square("u_a", 0, 1, "role_0")];
        let op = BlockOp::ResizeGrid {
            prev_size: 4,
            next_size: 4,
            shift: RowColDelta { rows: 1, cols: -1 },
            removed: vec![],
            restored: vec![],
        };
        let after = apply_block(&block, &op).unwrap();
        assert_eq!(after.units[0].pos, GridPos::new(1, 0));
        let back = apply_block(&after, &op.inverted()).unwrap();
        assert_eq!(back.units[0].pos, GridPos::new(0, 1));
    }

    #[test]
    fn remove_role_apply_and_undo_restore_slots() {
        let mut block = sample_block();
        let accent = FabricRole {
            id: id("role_acc"),
            name: "Accent".into(),
            color: Color::rgb(7, 7, 7),
            variant: false,
        };
        block.palette.roles.push(accent.clone());
        block.units.push(Unit::new(
            id("u_hst"),
            GridPos::new(2, 0),
            UnitKind::Hst {
                corner: CornerOrientation::Se,
                dark: id("role_acc"),
                light: id("role_0"),
            },
        ));

        let op = BlockOp::RemoveRole {
            role: accent,
            index: 2,
            fallback: Some(id("role_0")),
            reassigned: vec![RoleReassign {
                unit: id("u_hst"),
                prev: UnitPatch::of_kind(UnitKind::Hst {
                    corner: CornerOrientation::Se,
                    dark: id("role_acc"),
                    light: id("role_0"),
                }),
                next: UnitPatch::of_kind(UnitKind::Hst {
                    corner: CornerOrientation::Se,
                    dark: id("role_0"),
                    light: id("role_0"),
                }),
            }],
        };

        let after = apply_block(&block, &op).unwrap();
        assert_eq!(after.palette.roles.len(), 2);
        match &after.unit(id("u_hst")).unwrap().kind {
            UnitKind::Hst { dark, .. } => assert_eq!(*dark, id("role_0")),
            _ => panic!("expected Hst"),
        }

        // Undo via the batch inverse restores the exact slot.
        let back = apply_block(&after, &op.inverted()).unwrap();
        assert_eq!(back, block);

        // Double inversion is semantically equivalent even though the
        // structural form differs (documented exception).
        let twice = op.inverted().inverted();
        assert_eq!(apply_block(&block, &twice), Some(after));
    }

    #[test]
    fn batch_applies_in_order_and_inverts_reversed() {
        let block = sample_block();
        let unit = square("u_new", 2, 2, "role_0");
        let op = BlockOp::Batch {
            ops: vec![
                BlockOp::AddUnit {
                    unit: unit.clone(),
                    index: 2,
                },
                BlockOp::UpdateUnit {
                    id: id("u_new"),
                    prev: UnitPatch::of_kind(unit.kind.clone()),
                    next: UnitPatch::of_kind(UnitKind::Square { role: id("role_1") }),
                },
            ],
        };
        let after = apply_block(&block, &op).unwrap();
        match &after.unit(id("u_new")).unwrap().kind {
            UnitKind::Square { role } => assert_eq!(*role, id("role_1")),
            _ => panic!("expected Square"),
        }
        let back = apply_block(&after, &op.inverted()).unwrap();
        assert_eq!(back, block);
    }
}
