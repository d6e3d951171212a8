//! Unit registry and type-erased transformation bridge.
//!
//! Every unit type is described by one [`UnitDef`] row in a static table:
//! its role slots, its placement rule, and how rotation and mirroring
//! remap its variant state. The bridge functions ([`rotate`], [`flip_h`],
//! [`assign_role`], …) dispatch through the table, so store code never
//! matches on a concrete variant and adding a unit type is a one-place
//! change — a new `UnitKind` variant plus one row here.
//!
//! Transforms return partial-update patches instead of mutating, so the
//! caller can record an exact before/after pair for undo.

use crate::id::EntityId;
use crate::model::{GridPos, QST_PARTS, Span, Unit, UnitKind};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Patches ─────────────────────────────────────────────────────────────

/// A partial update to one unit. Only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<UnitKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<GridPos>,
}

impl UnitPatch {
    pub fn of_kind(kind: UnitKind) -> Self {
        Self {
            kind: Some(kind),
            pos: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.pos.is_none()
    }

    pub fn apply_to(&self, unit: &mut Unit) {
        if let Some(kind) = &self.kind {
            unit.kind = kind.clone();
        }
        if let Some(pos) = self.pos {
            unit.pos = pos;
        }
    }
}

// ─── Definitions ─────────────────────────────────────────────────────────

/// Type tag for a unit variant; the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitTag {
    Square,
    Hst,
    FlyingGeese,
    Qst,
}

/// How a unit type is placed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementRule {
    /// One tap, one cell.
    SingleCell,
    /// Two taps on adjacent cells (flying geese).
    TwoTapPair,
}

/// A named role slot on a unit type.
#[derive(Debug, Clone, Copy)]
pub struct PartDef {
    pub name: &'static str,
    /// The slot `assign_role` falls back to when no part is given.
    pub primary: bool,
}

const fn part(name: &'static str, primary: bool) -> PartDef {
    PartDef { name, primary }
}

/// Per-type behavior descriptor. Transform entries are `None` when the
/// transform is undefined for the type (a square has no rotation).
pub struct UnitDef {
    pub tag: UnitTag,
    pub display_name: &'static str,
    pub parts: &'static [PartDef],
    pub placement: PlacementRule,
    rotated: Option<fn(&UnitKind) -> UnitKind>,
    flipped_h: Option<fn(&UnitKind) -> UnitKind>,
    flipped_v: Option<fn(&UnitKind) -> UnitKind>,
    roles: fn(&UnitKind) -> SmallVec<[(&'static str, EntityId); 4]>,
    with_role: fn(&UnitKind, &str, EntityId) -> UnitKind,
    span: fn(&UnitKind) -> Span,
}

impl UnitDef {
    pub fn span(&self, kind: &UnitKind) -> Span {
        (self.span)(kind)
    }

    /// The slot `assign_role` resolves to when the caller names none.
    pub fn primary_part(&self) -> &'static str {
        self.parts
            .iter()
            .find(|p| p.primary)
            .unwrap_or(&self.parts[0])
            .name
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }
}

static REGISTRY: [UnitDef; 4] = [
    UnitDef {
        tag: UnitTag::Square,
        display_name: "Square",
        parts: &[part("fabric", true)],
        placement: PlacementRule::SingleCell,
        rotated: None,
        flipped_h: None,
        flipped_v: None,
        roles: square_roles,
        with_role: square_with_role,
        span: |_| Span::SINGLE,
    },
    UnitDef {
        tag: UnitTag::Hst,
        display_name: "Half-square triangle",
        parts: &[part("dark", true), part("light", false)],
        placement: PlacementRule::SingleCell,
        rotated: Some(hst_rotated),
        flipped_h: Some(hst_flipped_h),
        flipped_v: Some(hst_flipped_v),
        roles: hst_roles,
        with_role: hst_with_role,
        span: |_| Span::SINGLE,
    },
    UnitDef {
        tag: UnitTag::FlyingGeese,
        display_name: "Flying geese",
        parts: &[part("goose", true), part("sky", false)],
        placement: PlacementRule::TwoTapPair,
        rotated: Some(geese_rotated),
        flipped_h: Some(geese_flipped_h),
        flipped_v: Some(geese_flipped_v),
        roles: geese_roles,
        with_role: geese_with_role,
        span: geese_span,
    },
    UnitDef {
        tag: UnitTag::Qst,
        display_name: "Quarter-square triangle",
        parts: &[
            part("north", true),
            part("east", false),
            part("south", false),
            part("west", false),
        ],
        placement: PlacementRule::SingleCell,
        rotated: Some(qst_rotated),
        // A QST has no orientation field; its mirror image is produced by
        // swapping the symmetric patch-role pair.
        flipped_h: Some(qst_flipped_h),
        flipped_v: Some(qst_flipped_v),
        roles: qst_roles,
        with_role: qst_with_role,
        span: |_| Span::SINGLE,
    },
];

/// Look up the behavior descriptor for a unit type.
pub fn unit_def(tag: UnitTag) -> &'static UnitDef {
    match tag {
        UnitTag::Square => &REGISTRY[0],
        UnitTag::Hst => &REGISTRY[1],
        UnitTag::FlyingGeese => &REGISTRY[2],
        UnitTag::Qst => &REGISTRY[3],
    }
}

pub fn all_defs() -> &'static [UnitDef] {
    &REGISTRY
}

// ─── Bridge ──────────────────────────────────────────────────────────────

/// Rotate a unit a quarter turn clockwise. `None` when the type declares
/// no rotation behavior — the caller treats that as a no-op, not an error.
pub fn rotate(unit: &Unit) -> Option<UnitPatch> {
    let def = unit_def(unit.kind.tag());
    let rotated = def.rotated?;
    let next = rotated(&unit.kind);
    changed_patch(&unit.kind, next)
}

/// Mirror a unit across the vertical axis. `None` when the type declares
/// no flip behavior or when the mirror image equals the current state
/// (geese pointing up are their own horizontal mirror).
pub fn flip_h(unit: &Unit) -> Option<UnitPatch> {
    let def = unit_def(unit.kind.tag());
    let flipped = def.flipped_h?;
    changed_patch(&unit.kind, flipped(&unit.kind))
}

/// Mirror a unit across the horizontal axis. Same contract as [`flip_h`].
pub fn flip_v(unit: &Unit) -> Option<UnitPatch> {
    let def = unit_def(unit.kind.tag());
    let flipped = def.flipped_v?;
    changed_patch(&unit.kind, flipped(&unit.kind))
}

/// Assign `role` to one of the unit's slots. `part` is resolved against
/// the type's definition, falling back to the primary slot when absent or
/// unknown. Returns `(prev, next)` patches for undo recording, or `None`
/// when the slot already holds the role.
pub fn assign_role(unit: &Unit, role: EntityId, part: Option<&str>) -> Option<(UnitPatch, UnitPatch)> {
    let def = unit_def(unit.kind.tag());
    let slot = match part {
        Some(name) if def.has_part(name) => name,
        _ => def.primary_part(),
    };
    let next = (def.with_role)(&unit.kind, slot, role);
    if next == unit.kind {
        return None;
    }
    Some((
        UnitPatch::of_kind(unit.kind.clone()),
        UnitPatch::of_kind(next),
    ))
}

/// Substitute `new` for `old` in every slot that references it. `None`
/// when the unit does not reference `old` at all.
pub fn replace_role(unit: &Unit, old: EntityId, new: EntityId) -> Option<UnitPatch> {
    let def = unit_def(unit.kind.tag());
    let mut kind = unit.kind.clone();
    let mut touched = false;
    for (slot, role) in (def.roles)(&unit.kind) {
        if role == old {
            kind = (def.with_role)(&kind, slot, new);
            touched = true;
        }
    }
    touched.then(|| UnitPatch::of_kind(kind))
}

/// Does any slot of the unit reference `role`?
pub fn uses_role(unit: &Unit, role: EntityId) -> bool {
    let def = unit_def(unit.kind.tag());
    (def.roles)(&unit.kind).iter().any(|(_, r)| *r == role)
}

fn changed_patch(current: &UnitKind, next: UnitKind) -> Option<UnitPatch> {
    (next != *current).then(|| UnitPatch::of_kind(next))
}

// ─── Per-type behavior ───────────────────────────────────────────────────

fn square_roles(kind: &UnitKind) -> SmallVec<[(&'static str, EntityId); 4]> {
    match kind {
        UnitKind::Square { role } => smallvec::smallvec![("fabric", *role)],
        _ => SmallVec::new(),
    }
}

fn square_with_role(kind: &UnitKind, _part: &str, role: EntityId) -> UnitKind {
    match kind {
        UnitKind::Square { .. } => UnitKind::Square { role },
        other => other.clone(),
    }
}

fn hst_rotated(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::Hst { corner, dark, light } => UnitKind::Hst {
            corner: corner.rotated_cw(),
            dark: *dark,
            light: *light,
        },
        other => other.clone(),
    }
}

fn hst_flipped_h(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::Hst { corner, dark, light } => UnitKind::Hst {
            corner: corner.flipped_h(),
            dark: *dark,
            light: *light,
        },
        other => other.clone(),
    }
}

fn hst_flipped_v(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::Hst { corner, dark, light } => UnitKind::Hst {
            corner: corner.flipped_v(),
            dark: *dark,
            light: *light,
        },
        other => other.clone(),
    }
}

fn hst_roles(kind: &UnitKind) -> SmallVec<[(&'static str, EntityId); 4]> {
    match kind {
        UnitKind::Hst { dark, light, .. } => {
            smallvec::smallvec![("dark", *dark), ("light", *light)]
        }
        _ => SmallVec::new(),
    }
}

fn hst_with_role(kind: &UnitKind, part: &str, role: EntityId) -> UnitKind {
    match kind {
        UnitKind::Hst { corner, dark, light } => {
            let (dark, light) = match part {
                "light" => (*dark, role),
                _ => (role, *light),
            };
            UnitKind::Hst {
                corner: *corner,
                dark,
                light,
            }
        }
        other => other.clone(),
    }
}

fn geese_rotated(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::FlyingGeese { direction, goose, sky } => UnitKind::FlyingGeese {
            direction: direction.rotated_cw(),
            goose: *goose,
            sky: *sky,
        },
        other => other.clone(),
    }
}

fn geese_flipped_h(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::FlyingGeese { direction, goose, sky } => UnitKind::FlyingGeese {
            direction: direction.flipped_h(),
            goose: *goose,
            sky: *sky,
        },
        other => other.clone(),
    }
}

fn geese_flipped_v(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::FlyingGeese { direction, goose, sky } => UnitKind::FlyingGeese {
            direction: direction.flipped_v(),
            goose: *goose,
            sky: *sky,
        },
        other => other.clone(),
    }
}

fn geese_roles(kind: &UnitKind) -> SmallVec<[(&'static str, EntityId); 4]> {
    match kind {
        UnitKind::FlyingGeese { goose, sky, .. } => {
            smallvec::smallvec![("goose", *goose), ("sky", *sky)]
        }
        _ => SmallVec::new(),
    }
}

fn geese_with_role(kind: &UnitKind, part: &str, role: EntityId) -> UnitKind {
    match kind {
        UnitKind::FlyingGeese { direction, goose, sky } => {
            let (goose, sky) = match part {
                "sky" => (*goose, role),
                _ => (role, *sky),
            };
            UnitKind::FlyingGeese {
                direction: *direction,
                goose,
                sky,
            }
        }
        other => other.clone(),
    }
}

fn geese_span(kind: &UnitKind) -> Span {
    match kind {
        UnitKind::FlyingGeese { direction, .. } => direction.span(),
        _ => Span::SINGLE,
    }
}

fn qst_rotated(kind: &UnitKind) -> UnitKind {
    match kind {
        // N, E, S, W → the north fabric moves to east, and so on around.
        UnitKind::Qst { patches: [n, e, s, w] } => UnitKind::Qst {
            patches: [*w, *n, *e, *s],
        },
        other => other.clone(),
    }
}

fn qst_flipped_h(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::Qst { patches: [n, e, s, w] } => UnitKind::Qst {
            patches: [*n, *w, *s, *e],
        },
        other => other.clone(),
    }
}

fn qst_flipped_v(kind: &UnitKind) -> UnitKind {
    match kind {
        UnitKind::Qst { patches: [n, e, s, w] } => UnitKind::Qst {
            patches: [*s, *e, *n, *w],
        },
        other => other.clone(),
    }
}

fn qst_roles(kind: &UnitKind) -> SmallVec<[(&'static str, EntityId); 4]> {
    match kind {
        UnitKind::Qst { patches } => QST_PARTS
            .iter()
            .zip(patches.iter())
            .map(|(name, role)| (*name, *role))
            .collect(),
        _ => SmallVec::new(),
    }
}

fn qst_with_role(kind: &UnitKind, part: &str, role: EntityId) -> UnitKind {
    match kind {
        UnitKind::Qst { patches } => {
            let mut patches = *patches;
            let slot = QST_PARTS.iter().position(|p| *p == part).unwrap_or(0);
            patches[slot] = role;
            UnitKind::Qst { patches }
        }
        other => other.clone(),
    }
}
