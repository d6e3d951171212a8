//! Pattern-level data model.
//!
//! A pattern is a rectangular grid of block instances — placements of a
//! named block with per-instance rotation, mirroring, and sparse
//! palette-role color overrides — plus the pattern's own palette and an
//! optional border stack rendered innermost-to-outermost.

use crate::id::EntityId;
use crate::model::{Color, GridPos, Palette};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Grid dimensions ─────────────────────────────────────────────────────

/// Pattern grid dimensions; unlike blocks, patterns need not be square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    pub rows: u32,
    pub cols: u32,
}

impl GridDims {
    pub fn contains(self, pos: GridPos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }
}

// ─── Instances ───────────────────────────────────────────────────────────

/// Quarter-turn rotation applied to a block instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn rotated_cw(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }
}

/// A placement of a block inside the pattern grid. Overrides map role ids
/// of the source block's palette to replacement colors, independent of
/// that palette itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    pub id: EntityId,
    pub block: EntityId,
    pub pos: GridPos,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub flip_h: bool,
    #[serde(default)]
    pub flip_v: bool,
    #[serde(default)]
    pub overrides: HashMap<EntityId, Color>,
}

impl BlockInstance {
    pub fn new(id: EntityId, block: EntityId, pos: GridPos) -> Self {
        Self {
            id,
            block,
            pos,
            rotation: Rotation::R0,
            flip_h: false,
            flip_v: false,
            overrides: HashMap::new(),
        }
    }
}

/// Partial update to one instance. Overrides are snapshotted whole — the
/// map is small and a full copy keeps inversion exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<GridPos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_h: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_v: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<HashMap<EntityId, Color>>,
}

impl InstancePatch {
    pub fn is_empty(&self) -> bool {
        self.pos.is_none()
            && self.rotation.is_none()
            && self.flip_h.is_none()
            && self.flip_v.is_none()
            && self.overrides.is_none()
    }

    pub fn apply_to(&self, instance: &mut BlockInstance) {
        if let Some(pos) = self.pos {
            instance.pos = pos;
        }
        if let Some(rotation) = self.rotation {
            instance.rotation = rotation;
        }
        if let Some(flip_h) = self.flip_h {
            instance.flip_h = flip_h;
        }
        if let Some(flip_v) = self.flip_v {
            instance.flip_v = flip_v;
        }
        if let Some(overrides) = &self.overrides {
            instance.overrides = overrides.clone();
        }
    }
}

// ─── Borders ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BorderStyle {
    #[default]
    Solid,
    Pieced,
    SawTooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CornerStyle {
    #[default]
    Butted,
    Mitered,
    Cornerstone,
}

/// One border ring. Ordered innermost-to-outermost in the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub id: EntityId,
    pub width_in: f32,
    pub style: BorderStyle,
    pub role: EntityId,
    pub corner: CornerStyle,
}

/// Partial update to one border.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_in: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner: Option<CornerStyle>,
}

impl BorderPatch {
    pub fn is_empty(&self) -> bool {
        self.width_in.is_none()
            && self.style.is_none()
            && self.role.is_none()
            && self.corner.is_none()
    }

    pub fn apply_to(&self, border: &mut Border) {
        if let Some(width_in) = self.width_in {
            border.width_in = width_in;
        }
        if let Some(style) = self.style {
            border.style = style;
        }
        if let Some(role) = self.role {
            border.role = role;
        }
        if let Some(corner) = self.corner {
            border.corner = corner;
        }
    }
}

/// Border stack wrapper; only exists once at least one border was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderConfig {
    pub enabled: bool,
    pub borders: Vec<Border>,
}

// ─── Pattern document ────────────────────────────────────────────────────

/// The pattern document: the larger grid composed of block instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub dims: GridDims,
    pub instances: Vec<BlockInstance>,
    pub palette: Palette,
    /// Absent until the first border is added; older documents load as None.
    #[serde(default)]
    pub borders: Option<BorderConfig>,
}

impl Pattern {
    pub fn new(dims: GridDims, palette: Palette) -> Self {
        Self {
            dims,
            instances: Vec::new(),
            palette,
            borders: None,
        }
    }

    pub fn instance(&self, id: EntityId) -> Option<&BlockInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// A position holds at most one instance.
    pub fn instance_at(&self, pos: GridPos) -> Option<&BlockInstance> {
        self.instances.iter().find(|i| i.pos == pos)
    }

    pub fn border(&self, id: EntityId) -> Option<&Border> {
        self.borders
            .as_ref()
            .and_then(|cfg| cfg.borders.iter().find(|b| b.id == id))
    }

    /// Reference counts of override colors across all instances, keyed by
    /// exact color value. Drives variant-role bookkeeping.
    pub fn override_color_counts(&self) -> HashMap<Color, usize> {
        let mut counts = HashMap::new();
        for instance in &self.instances {
            for color in instance.overrides.values() {
                *counts.entry(*color).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> EntityId {
        EntityId::intern(s)
    }

    #[test]
    fn rotation_cycles_back() {
        let mut r = Rotation::R0;
        for _ in 0..4 {
            r = r.rotated_cw();
        }
        assert_eq!(r, Rotation::R0);
    }

    #[test]
    fn one_instance_per_position() {
        let mut ids = crate::id::IdGen::new();
        let mut pattern = Pattern::new(
            GridDims { rows: 3, cols: 4 },
            Palette::starter(&mut ids),
        );
        pattern
            .instances
            .push(BlockInstance::new(id("i_0"), id("block_star"), GridPos::new(1, 2)));
        assert_eq!(
            pattern.instance_at(GridPos::new(1, 2)).map(|i| i.id),
            Some(id("i_0"))
        );
        assert!(pattern.instance_at(GridPos::new(0, 0)).is_none());
    }

    #[test]
    fn override_counts_key_on_color_value() {
        let mut ids = crate::id::IdGen::new();
        let mut pattern = Pattern::new(
            GridDims { rows: 2, cols: 2 },
            Palette::starter(&mut ids),
        );
        let mut a = BlockInstance::new(id("i_a"), id("block_star"), GridPos::new(0, 0));
        a.overrides.insert(id("role_0"), Color::rgb(1, 2, 3));
        let mut b = BlockInstance::new(id("i_b"), id("block_star"), GridPos::new(0, 1));
        b.overrides.insert(id("role_1"), Color::rgb(1, 2, 3));
        pattern.instances.extend([a, b]);

        let counts = pattern.override_color_counts();
        assert_eq!(counts.get(&Color::rgb(1, 2, 3)), Some(&2));
    }

    #[test]
    fn instance_patch_applies_only_present_fields() {
        let mut instance = BlockInstance::new(id("i_c"), id("block_star"), GridPos::new(0, 0));
        instance.flip_h = true;
        let patch = InstancePatch {
            rotation: Some(Rotation::R90),
            ..Default::default()
        };
        patch.apply_to(&mut instance);
        assert_eq!(instance.rotation, Rotation::R90);
        assert!(instance.flip_h, "untouched field must survive");
    }
}
