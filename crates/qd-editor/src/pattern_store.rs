//! Pattern-level design store.
//!
//! Same record-then-apply discipline as the block store, over the pattern
//! vocabulary: block instances with per-instance transforms and color
//! overrides, the pattern palette, grid dimensions, and the border stack.
//!
//! Override colors are reference-counted by value: a color first used by
//! any override is auto-registered as a `variant` palette role, and a
//! variant role whose color loses its last reference is dropped. The
//! bookkeeping ops ride in the same recorded batch as the edit that
//! triggered them, so one undo restores both sides exactly.

use crate::history::History;
use log::debug;
use qd_core::id::{EntityId, IdGen};
use qd_core::model::{Color, FabricRole, GridPos, MAX_ROLES, Palette, RowColDelta};
use qd_core::pattern::{
    BlockInstance, Border, BorderPatch, BorderStyle, CornerStyle, GridDims, InstancePatch, Pattern,
};
use qd_core::pattern_op::{InstanceReassign, PatternOp, apply_pattern};
use qd_core::persist::{self, PersistError};

pub struct PatternStore {
    pattern: Pattern,
    history: History<PatternOp>,
    ids: IdGen,
}

impl PatternStore {
    pub fn new(dims: GridDims) -> Self {
        let mut ids = IdGen::new();
        let palette = Palette::starter(&mut ids);
        Self {
            pattern: Pattern::new(dims, palette),
            history: History::default(),
            ids,
        }
    }

    /// Adopt an existing document, reseeding the id generator past every
    /// id it contains.
    pub fn from_pattern(pattern: Pattern) -> Self {
        let mut ids = IdGen::new();
        let border_ids = pattern
            .borders
            .iter()
            .flat_map(|cfg| cfg.borders.iter().map(|b| &b.id));
        ids.seed_past(
            pattern
                .instances
                .iter()
                .map(|i| &i.id)
                .chain(pattern.palette.roles.iter().map(|r| &r.id))
                .chain(border_ids),
        );
        Self {
            pattern,
            history: History::default(),
            ids,
        }
    }

    pub fn load(raw: &str) -> Result<Self, PersistError> {
        Ok(Self::from_pattern(persist::load_pattern(raw)?))
    }

    pub fn save(&self) -> Result<String, PersistError> {
        persist::save_pattern(&self.pattern)
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    // ─── Instances ───────────────────────────────────────────────────────

    /// Place a block instance. An occupied position is replaced — the
    /// removal and the add land in one recorded batch, one undo step.
    pub fn place_instance(&mut self, block: EntityId, pos: GridPos) -> Option<EntityId> {
        if !self.pattern.dims.contains(pos) {
            return None;
        }
        let instance = BlockInstance::new(self.ids.next("inst"), block, pos);
        let id = instance.id;
        let mut ops = Vec::new();
        // A replacement takes over the occupant's list slot, so undo puts
        // the old instance back exactly where it was.
        let index = match self.pattern.instances.iter().position(|i| i.pos == pos) {
            Some(old_index) => {
                ops.push(PatternOp::RemoveInstance {
                    instance: self.pattern.instances[old_index].clone(),
                    index: old_index,
                });
                old_index
            }
            None => self.pattern.instances.len(),
        };
        ops.push(PatternOp::AddInstance { instance, index });
        let ops = self.with_variant_sync(ops);
        self.apply_and_record(single_or_batch(ops)).then_some(id)
    }

    pub fn remove_instance(&mut self, id: EntityId) -> bool {
        let Some(index) = self.pattern.instances.iter().position(|i| i.id == id) else {
            return false;
        };
        let ops = self.with_variant_sync(vec![PatternOp::RemoveInstance {
            instance: self.pattern.instances[index].clone(),
            index,
        }]);
        self.apply_and_record(single_or_batch(ops))
    }

    pub fn rotate_instance(&mut self, id: EntityId) -> bool {
        let Some(instance) = self.pattern.instance(id) else {
            return false;
        };
        let op = PatternOp::UpdateInstance {
            id,
            prev: InstancePatch {
                rotation: Some(instance.rotation),
                ..Default::default()
            },
            next: InstancePatch {
                rotation: Some(instance.rotation.rotated_cw()),
                ..Default::default()
            },
        };
        self.apply_and_record(op)
    }

    pub fn flip_instance_h(&mut self, id: EntityId) -> bool {
        let Some(instance) = self.pattern.instance(id) else {
            return false;
        };
        let op = PatternOp::UpdateInstance {
            id,
            prev: InstancePatch {
                flip_h: Some(instance.flip_h),
                ..Default::default()
            },
            next: InstancePatch {
                flip_h: Some(!instance.flip_h),
                ..Default::default()
            },
        };
        self.apply_and_record(op)
    }

    pub fn flip_instance_v(&mut self, id: EntityId) -> bool {
        let Some(instance) = self.pattern.instance(id) else {
            return false;
        };
        let op = PatternOp::UpdateInstance {
            id,
            prev: InstancePatch {
                flip_v: Some(instance.flip_v),
                ..Default::default()
            },
            next: InstancePatch {
                flip_v: Some(!instance.flip_v),
                ..Default::default()
            },
        };
        self.apply_and_record(op)
    }

    // ─── Overrides ───────────────────────────────────────────────────────

    /// Override one of the source block's roles with a color for this
    /// instance only. Role ids belong to the block's palette, which this
    /// store does not hold, so they are taken as given.
    pub fn set_override(&mut self, id: EntityId, role: EntityId, color: Color) -> bool {
        let Some(instance) = self.pattern.instance(id) else {
            return false;
        };
        if instance.overrides.get(&role) == Some(&color) {
            return false;
        }
        let mut next = instance.overrides.clone();
        next.insert(role, color);
        let op = self.override_update(instance, next);
        let ops = self.with_variant_sync(vec![op]);
        self.apply_and_record(single_or_batch(ops))
    }

    pub fn clear_override(&mut self, id: EntityId, role: EntityId) -> bool {
        let Some(instance) = self.pattern.instance(id) else {
            return false;
        };
        if !instance.overrides.contains_key(&role) {
            return false;
        }
        let mut next = instance.overrides.clone();
        next.remove(&role);
        let op = self.override_update(instance, next);
        let ops = self.with_variant_sync(vec![op]);
        self.apply_and_record(single_or_batch(ops))
    }

    fn override_update(
        &self,
        instance: &BlockInstance,
        next: std::collections::HashMap<EntityId, Color>,
    ) -> PatternOp {
        PatternOp::UpdateInstance {
            id: instance.id,
            prev: InstancePatch {
                overrides: Some(instance.overrides.clone()),
                ..Default::default()
            },
            next: InstancePatch {
                overrides: Some(next),
                ..Default::default()
            },
        }
    }

    // ─── Palette lifecycle ───────────────────────────────────────────────

    pub fn set_role_color(&mut self, id: EntityId, color: Color) -> bool {
        let Some(role) = self.pattern.palette.role(id) else {
            return false;
        };
        if role.color == color {
            return false;
        }
        let op = PatternOp::SetRoleColor {
            id,
            prev: role.color,
            next: color,
        };
        self.apply_and_record(op)
    }

    pub fn add_role(&mut self, name: Option<&str>) -> Option<EntityId> {
        if self.pattern.palette.roles.len() >= MAX_ROLES {
            return None;
        }
        let id = self.ids.next("role");
        let role = FabricRole {
            id,
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("Fabric {}", self.pattern.palette.roles.len() + 1)),
            color: self.pattern.palette.next_unused_color(),
            variant: false,
        };
        let index = self.pattern.palette.roles.len();
        self.apply_and_record(PatternOp::AddRole { role, index })
            .then_some(id)
    }

    /// Remove a role: overrides keyed by it are dropped, borders that
    /// reference it move to the fallback, and the whole cascade is one
    /// recorded operation.
    pub fn remove_role(&mut self, id: EntityId, fallback: Option<EntityId>) -> bool {
        let palette = &self.pattern.palette;
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
        for instance in &self.pattern.instances {
            if !instance.overrides.contains_key(&id) {
                continue;
            }
            let mut next = instance.overrides.clone();
            next.remove(&id);
            reassigned.push(InstanceReassign {
                instance: instance.id,
                prev: InstancePatch {
                    overrides: Some(instance.overrides.clone()),
                    ..Default::default()
                },
                next: InstancePatch {
                    overrides: Some(next),
                    ..Default::default()
                },
            });
        }

        let mut ops = Vec::new();
        if let Some(cfg) = &self.pattern.borders {
            for border in cfg.borders.iter().filter(|b| b.role == id) {
                ops.push(PatternOp::UpdateBorder {
                    id: border.id,
                    prev: BorderPatch {
                        role: Some(id),
                        ..Default::default()
                    },
                    next: BorderPatch {
                        role: Some(fallback),
                        ..Default::default()
                    },
                });
            }
        }
        ops.push(PatternOp::RemoveRole {
            role: palette.roles[index].clone(),
            index,
            fallback: Some(fallback),
            reassigned,
        });
        let ops = self.with_variant_sync(ops);
        self.apply_and_record(single_or_batch(ops))
    }

    pub fn rename_role(&mut self, id: EntityId, name: &str) -> bool {
        let Some(role) = self.pattern.palette.role(id) else {
            return false;
        };
        if role.name == name {
            return false;
        }
        let op = PatternOp::RenameRole {
            id,
            prev: role.name.clone(),
            next: name.to_string(),
        };
        self.apply_and_record(op)
    }

    // ─── Resize ──────────────────────────────────────────────────────────

    pub fn resize(&mut self, dims: GridDims) -> bool {
        self.resize_shifted(dims, RowColDelta::NONE)
    }

    pub fn resize_shifted(&mut self, dims: GridDims, shift: RowColDelta) -> bool {
        if dims.rows == 0 || dims.cols == 0 {
            return false;
        }
        if dims == self.pattern.dims && shift == RowColDelta::NONE {
            return false;
        }
        let removed: Vec<(usize, BlockInstance)> = self
            .pattern
            .instances
            .iter()
            .enumerate()
            .filter(|(_, i)| !i.pos.shifted(shift).is_some_and(|pos| dims.contains(pos)))
            .map(|(index, i)| (index, i.clone()))
            .collect();
        let op = PatternOp::ResizeGrid {
            prev_dims: self.pattern.dims,
            next_dims: dims,
            shift,
            removed,
            restored: Vec::new(),
        };
        let ops = self.with_variant_sync(vec![op]);
        self.apply_and_record(single_or_batch(ops))
    }

    // ─── Borders ─────────────────────────────────────────────────────────

    /// Append a border as the new outermost ring. The first add
    /// materializes the border config.
    pub fn add_border(
        &mut self,
        width_in: f32,
        style: BorderStyle,
        role: EntityId,
        corner: CornerStyle,
    ) -> Option<EntityId> {
        if width_in <= 0.0 || self.pattern.palette.role(role).is_none() {
            return None;
        }
        let id = self.ids.next("border");
        let border = Border {
            id,
            width_in,
            style,
            role,
            corner,
        };
        let index = self
            .pattern
            .borders
            .as_ref()
            .map_or(0, |cfg| cfg.borders.len());
        let op = PatternOp::AddBorder {
            border,
            index,
            creates_config: self.pattern.borders.is_none(),
        };
        self.apply_and_record(op).then_some(id)
    }

    pub fn remove_border(&mut self, id: EntityId) -> bool {
        let Some(cfg) = &self.pattern.borders else {
            return false;
        };
        let Some(index) = cfg.borders.iter().position(|b| b.id == id) else {
            return false;
        };
        let op = PatternOp::RemoveBorder {
            border: cfg.borders[index].clone(),
            index,
            removes_config: false,
        };
        self.apply_and_record(op)
    }

    /// Update a border's fields; `next` names only what changes and the
    /// matching before-values are captured here.
    pub fn update_border(&mut self, id: EntityId, next: BorderPatch) -> bool {
        if next.is_empty() {
            return false;
        }
        if let Some(role) = next.role
            && self.pattern.palette.role(role).is_none()
        {
            return false;
        }
        let Some(border) = self.pattern.border(id) else {
            return false;
        };
        let prev = BorderPatch {
            width_in: next.width_in.map(|_| border.width_in),
            style: next.style.map(|_| border.style),
            role: next.role.map(|_| border.role),
            corner: next.corner.map(|_| border.corner),
        };
        if prev == next {
            return false;
        }
        self.apply_and_record(PatternOp::UpdateBorder { id, prev, next })
    }

    pub fn set_borders_enabled(&mut self, enabled: bool) -> bool {
        let Some(cfg) = &self.pattern.borders else {
            return false;
        };
        if cfg.enabled == enabled {
            return false;
        }
        let op = PatternOp::SetBordersEnabled {
            prev: cfg.enabled,
            next: enabled,
        };
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

    /// Extend `ops` with the variant-role bookkeeping the edit implies:
    /// drop variant roles whose color lost its last override reference,
    /// register colors that gained their first. Computed against the
    /// post-edit state, appended to the same batch.
    fn with_variant_sync(&mut self, mut ops: Vec<PatternOp>) -> Vec<PatternOp> {
        let mut scratch = self.pattern.clone();
        for op in &ops {
            if let Some(next) = apply_pattern(&scratch, op) {
                scratch = next;
            }
        }
        let counts = scratch.override_color_counts();

        loop {
            let stale = scratch
                .palette
                .roles
                .iter()
                .position(|r| r.variant && !counts.contains_key(&r.color));
            let Some(index) = stale else { break };
            let op = PatternOp::RemoveRole {
                role: scratch.palette.roles[index].clone(),
                index,
                fallback: None,
                reassigned: Vec::new(),
            };
            if let Some(next) = apply_pattern(&scratch, &op) {
                scratch = next;
            }
            ops.push(op);
        }

        let mut colors: Vec<Color> = counts.keys().copied().collect();
        colors.sort_by_key(|c| (c.r, c.g, c.b));
        for color in colors {
            if scratch.palette.roles.iter().any(|r| r.color == color) {
                continue;
            }
            if scratch.palette.roles.len() >= MAX_ROLES {
                debug!("palette full, not registering variant color {}", color.to_hex());
                break;
            }
            let role = FabricRole {
                id: self.ids.next("role"),
                name: color.to_hex(),
                color,
                variant: true,
            };
            let index = scratch.palette.roles.len();
            let op = PatternOp::AddRole { role, index };
            if let Some(next) = apply_pattern(&scratch, &op) {
                scratch = next;
            }
            ops.push(op);
        }
        ops
    }

    fn apply_and_record(&mut self, op: PatternOp) -> bool {
        let Some(next) = apply_pattern(&self.pattern, &op) else {
            return false;
        };
        debug!("pattern edit: {op:?}");
        self.pattern = next;
        self.history.record(op);
        true
    }

    fn apply_only(&mut self, op: &PatternOp) {
        if let Some(next) = apply_pattern(&self.pattern, op) {
            self.pattern = next;
        }
    }
}

fn single_or_batch(mut ops: Vec<PatternOp>) -> PatternOp {
    if ops.len() == 1 {
        ops.remove(0)
    } else {
        PatternOp::Batch { ops }
    }
}
