//! Reversible pattern-level operations.
//!
//! The pattern vocabulary parallels the block one (`op.rs`): self-contained
//! operations, per-slice reducers returning `None` for untouched slices,
//! and the shared [`Invert`] batch rule. Only the payloads differ — block
//! instances instead of units, plus the border stack.

use crate::id::EntityId;
use crate::model::{Color, FabricRole, Palette, RowColDelta};
use crate::op::{self, Invert, invert_members};
use crate::pattern::{
    Border, BorderConfig, BorderPatch, BlockInstance, GridDims, InstancePatch, Pattern,
};
use log::warn;
use serde::{Deserialize, Serialize};

/// One instance's override state captured across a role removal: `prev`
/// restores the override entry for the removed role, `next` drops it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceReassign {
    pub instance: EntityId,
    pub prev: InstancePatch,
    pub next: InstancePatch,
}

/// The closed set of reversible pattern edits. As at the block level,
/// add/remove carry the list index so undo is list-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatternOp {
    AddInstance {
        instance: BlockInstance,
        index: usize,
    },
    RemoveInstance {
        instance: BlockInstance,
        index: usize,
    },
    UpdateInstance {
        id: EntityId,
        prev: InstancePatch,
        next: InstancePatch,
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
    RemoveRole {
        role: FabricRole,
        index: usize,
        fallback: Option<EntityId>,
        reassigned: Vec<InstanceReassign>,
    },
    RenameRole {
        id: EntityId,
        prev: String,
        next: String,
    },
    ResizeGrid {
        prev_dims: GridDims,
        next_dims: GridDims,
        shift: RowColDelta,
        removed: Vec<(usize, BlockInstance)>,
        restored: Vec<(usize, BlockInstance)>,
    },
    /// `creates_config` marks the add that materialized the border config;
    /// its inverse removal dissolves the config again, so documents that
    /// never had borders round-trip to exactly `None`.
    AddBorder {
        border: Border,
        index: usize,
        #[serde(default)]
        creates_config: bool,
    },
    RemoveBorder {
        border: Border,
        index: usize,
        #[serde(default)]
        removes_config: bool,
    },
    UpdateBorder {
        id: EntityId,
        prev: BorderPatch,
        next: BorderPatch,
    },
    SetBordersEnabled {
        prev: bool,
        next: bool,
    },
    Batch {
        ops: Vec<PatternOp>,
    },
}

impl Invert for PatternOp {
    fn inverted(&self) -> Self {
        match self {
            Self::AddInstance { instance, index } => Self::RemoveInstance {
                instance: instance.clone(),
                index: *index,
            },
            Self::RemoveInstance { instance, index } => Self::AddInstance {
                instance: instance.clone(),
                index: *index,
            },
            Self::UpdateInstance { id, prev, next } => Self::UpdateInstance {
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
                ops.extend(reassigned.iter().map(|r| Self::UpdateInstance {
                    id: r.instance,
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
                prev_dims,
                next_dims,
                shift,
                removed,
                restored,
            } => Self::ResizeGrid {
                prev_dims: *next_dims,
                next_dims: *prev_dims,
                shift: shift.negated(),
                removed: restored.clone(),
                restored: removed.clone(),
            },
            Self::AddBorder {
                border,
                index,
                creates_config,
            } => Self::RemoveBorder {
                border: border.clone(),
                index: *index,
                removes_config: *creates_config,
            },
            Self::RemoveBorder {
                border,
                index,
                removes_config,
            } => Self::AddBorder {
                border: border.clone(),
                index: *index,
                creates_config: *removes_config,
            },
            Self::UpdateBorder { id, prev, next } => Self::UpdateBorder {
                id: *id,
                prev: next.clone(),
                next: prev.clone(),
            },
            Self::SetBordersEnabled { prev, next } => Self::SetBordersEnabled {
                prev: *next,
                next: *prev,
            },
            Self::Batch { ops } => Self::Batch {
                ops: invert_members(ops),
            },
        }
    }
}

// ─── Instance slice reducer ──────────────────────────────────────────────

/// Apply `op` to the instance list. `None` when the slice is untouched.
pub fn apply_instances(
    instances: &[BlockInstance],
    op: &PatternOp,
) -> Option<Vec<BlockInstance>> {
    match op {
        PatternOp::AddInstance { instance, index } => {
            if instances.iter().any(|i| i.id == instance.id) {
                warn!("add_instance: id {} already present, skipping", instance.id);
                return None;
            }
            let mut next = instances.to_vec();
            next.insert((*index).min(next.len()), instance.clone());
            Some(next)
        }
        PatternOp::RemoveInstance { instance, .. } => {
            if !instances.iter().any(|i| i.id == instance.id) {
                warn!("remove_instance: id {} not present", instance.id);
                return None;
            }
            Some(
                instances
                    .iter()
                    .filter(|i| i.id != instance.id)
                    .cloned()
                    .collect(),
            )
        }
        PatternOp::UpdateInstance { id, next, .. } => patch_instance(instances, *id, next),
        PatternOp::RemoveRole { reassigned, .. } => {
            let mut current: Option<Vec<BlockInstance>> = None;
            for r in reassigned {
                let slice = current.as_deref().unwrap_or(instances);
                if let Some(next) = patch_instance(slice, r.instance, &r.next) {
                    current = Some(next);
                }
            }
            current
        }
        PatternOp::ResizeGrid {
            shift,
            removed,
            restored,
            ..
        } => {
            let mut next: Vec<BlockInstance> = instances
                .iter()
                .filter(|i| !removed.iter().any(|(_, r)| r.id == i.id))
                .cloned()
                .collect();
            if *shift != RowColDelta::NONE {
                next.retain_mut(|i| match i.pos.shifted(*shift) {
                    Some(pos) => {
                        i.pos = pos;
                        true
                    }
                    None => {
                        warn!("resize: instance {} shifted out of bounds, dropping", i.id);
                        false
                    }
                });
            }
            let mut restored: Vec<&(usize, BlockInstance)> = restored.iter().collect();
            restored.sort_by_key(|(index, _)| *index);
            for (index, instance) in restored {
                next.insert((*index).min(next.len()), instance.clone());
            }
            if next == instances { None } else { Some(next) }
        }
        PatternOp::Batch { ops } => {
            let mut current: Option<Vec<BlockInstance>> = None;
            for member in ops {
                let slice = current.as_deref().unwrap_or(instances);
                if let Some(next) = apply_instances(slice, member) {
                    current = Some(next);
                }
            }
            current
        }
        _ => None,
    }
}

fn patch_instance(
    instances: &[BlockInstance],
    id: EntityId,
    patch: &InstancePatch,
) -> Option<Vec<BlockInstance>> {
    if patch.is_empty() {
        return None;
    }
    let Some(idx) = instances.iter().position(|i| i.id == id) else {
        warn!("update_instance: id {id} not present");
        return None;
    };
    let mut next = instances.to_vec();
    patch.apply_to(&mut next[idx]);
    if next[idx] == instances[idx] { None } else { Some(next) }
}

// ─── Palette slice reducer ───────────────────────────────────────────────

/// Apply `op` to the pattern palette. Delegates to the shared role
/// reducers in `op.rs`.
pub fn apply_palette(palette: &Palette, op: &PatternOp) -> Option<Palette> {
    match op {
        PatternOp::SetRoleColor { id, next, .. } => op::palette_set_color(palette, *id, *next),
        PatternOp::AddRole { role, index } => op::palette_add_role(palette, role, *index),
        PatternOp::RemoveRole { role, .. } => op::palette_remove_role(palette, role.id),
        PatternOp::RenameRole { id, next, .. } => op::palette_rename_role(palette, *id, next),
        PatternOp::Batch { ops } => {
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

// ─── Dims slice reducer ──────────────────────────────────────────────────

/// Apply `op` to the grid dimensions. `None` when untouched.
pub fn apply_dims(dims: GridDims, op: &PatternOp) -> Option<GridDims> {
    match op {
        PatternOp::ResizeGrid { next_dims, .. } => (*next_dims != dims).then_some(*next_dims),
        PatternOp::Batch { ops } => {
            let mut current: Option<GridDims> = None;
            for member in ops {
                if let Some(next) = apply_dims(current.unwrap_or(dims), member) {
                    current = Some(next);
                }
            }
            current
        }
        _ => None,
    }
}

// ─── Border slice reducer ────────────────────────────────────────────────

/// Apply `op` to the border config. `None` when untouched.
pub fn apply_borders(
    borders: &Option<BorderConfig>,
    op: &PatternOp,
) -> Option<Option<BorderConfig>> {
    match op {
        PatternOp::AddBorder { border, index, .. } => {
            let mut cfg = borders.clone().unwrap_or(BorderConfig {
                enabled: true,
                borders: Vec::new(),
            });
            if cfg.borders.iter().any(|b| b.id == border.id) {
                warn!("add_border: id {} already present", border.id);
                return None;
            }
            cfg.borders
                .insert((*index).min(cfg.borders.len()), border.clone());
            Some(Some(cfg))
        }
        PatternOp::RemoveBorder {
            border,
            removes_config,
            ..
        } => {
            let Some(cfg) = borders else {
                warn!("remove_border: no border config");
                return None;
            };
            if !cfg.borders.iter().any(|b| b.id == border.id) {
                warn!("remove_border: id {} not present", border.id);
                return None;
            }
            let mut cfg = cfg.clone();
            cfg.borders.retain(|b| b.id != border.id);
            if *removes_config && cfg.borders.is_empty() {
                Some(None)
            } else {
                Some(Some(cfg))
            }
        }
        PatternOp::UpdateBorder { id, next, .. } => {
            if next.is_empty() {
                return None;
            }
            let Some(cfg) = borders else {
                warn!("update_border: no border config");
                return None;
            };
            let Some(idx) = cfg.borders.iter().position(|b| b.id == *id) else {
                warn!("update_border: id {id} not present");
                return None;
            };
            let mut cfg = cfg.clone();
            next.apply_to(&mut cfg.borders[idx]);
            Some(Some(cfg))
        }
        PatternOp::SetBordersEnabled { next, .. } => {
            let Some(cfg) = borders else {
                warn!("set_borders_enabled: no border config");
                return None;
            };
            if cfg.enabled == *next {
                return None;
            }
            let mut cfg = cfg.clone();
            cfg.enabled = *next;
            Some(Some(cfg))
        }
        PatternOp::Batch { ops } => {
            let mut current: Option<Option<BorderConfig>> = None;
            for member in ops {
                let slice = current.as_ref().unwrap_or(borders);
                if let Some(next) = apply_borders(slice, member) {
                    current = Some(next);
                }
            }
            current
        }
        _ => None,
    }
}

// ─── Whole-document reducer ──────────────────────────────────────────────

/// Apply `op` across every pattern slice. `None` when nothing changed.
pub fn apply_pattern(pattern: &Pattern, op: &PatternOp) -> Option<Pattern> {
    let instances = apply_instances(&pattern.instances, op);
    let palette = apply_palette(&pattern.palette, op);
    let dims = apply_dims(pattern.dims, op);
    let borders = apply_borders(&pattern.borders, op);
    if instances.is_none() && palette.is_none() && dims.is_none() && borders.is_none() {
        return None;
    }
    Some(Pattern {
        dims: dims.unwrap_or(pattern.dims),
        instances: instances.unwrap_or_else(|| pattern.instances.clone()),
        palette: palette.unwrap_or_else(|| pattern.palette.clone()),
        borders: borders.unwrap_or_else(|| pattern.borders.clone()),
    })
}
