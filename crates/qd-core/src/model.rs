//! Block-level data model for QD documents.
//!
//! A block is a fixed-size square grid holding geometric piecing units.
//! Units are polymorphic: a shared header (`id`, `pos`) plus a `UnitKind`
//! payload carrying the variant state and its fabric-role slots. Cell
//! footprints are derived, never stored — a flying-geese unit is 1×2 or
//! 2×1 depending on which way it points.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};

// ─── Grid geometry ───────────────────────────────────────────────────────

/// A zero-indexed cell coordinate, bounded by the owning grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub row: u32,
    pub col: u32,
}

impl GridPos {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Apply a signed shift. `None` if the result would leave quadrant I.
    pub fn shifted(self, delta: RowColDelta) -> Option<Self> {
        let row = self.row as i64 + delta.rows as i64;
        let col = self.col as i64 + delta.cols as i64;
        if row < 0 || col < 0 {
            return None;
        }
        Some(Self {
            row: row as u32,
            col: col as u32,
        })
    }
}

/// How many cells a unit occupies from its anchor (top-left) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub rows: u32,
    pub cols: u32,
}

impl Span {
    pub const SINGLE: Span = Span { rows: 1, cols: 1 };

    /// Does a unit anchored at `anchor` with this span cover `cell`?
    pub fn covers(self, anchor: GridPos, cell: GridPos) -> bool {
        cell.row >= anchor.row
            && cell.row < anchor.row + self.rows
            && cell.col >= anchor.col
            && cell.col < anchor.col + self.cols
    }
}

/// A signed positional shift recorded by grid resizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowColDelta {
    pub rows: i32,
    pub cols: i32,
}

impl RowColDelta {
    pub const NONE: RowColDelta = RowColDelta { rows: 0, cols: 0 };

    /// The inverse shift.
    pub fn negated(self) -> Self {
        Self {
            rows: -self.rows,
            cols: -self.cols,
        }
    }
}

// ─── Color ───────────────────────────────────────────────────────────────

/// An opaque fabric color. Stored as 3 × u8 so color values can be
/// compared and hashed exactly (variant-color bookkeeping keys on this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a hex color string: `#RGB` or `#RRGGBB`.
    /// The string may optionally start with `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();

        match bytes.len() {
            3 => {
                let r = hex_val(bytes[0])?;
                let g = hex_val(bytes[1])?;
                let b = hex_val(bytes[2])?;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = hex_val(bytes[0])? << 4 | hex_val(bytes[1])?;
                let g = hex_val(bytes[2])? << 4 | hex_val(bytes[3])?;
                let b = hex_val(bytes[4])? << 4 | hex_val(bytes[5])?;
                Some(Self::rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Emit as `#RRGGBB`.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ─── Palette ─────────────────────────────────────────────────────────────

/// Maximum number of roles a palette will accept.
pub const MAX_ROLES: usize = 12;

/// Default colors handed out to new roles, in order. Cycles when a palette
/// has consumed all of them.
pub const DEFAULT_ROLE_COLORS: [Color; 8] = [
    Color::rgb(0xF5, 0xF0, 0xE6), // muslin
    Color::rgb(0x2C, 0x3E, 0x6B), // navy
    Color::rgb(0xB8, 0x3A, 0x2E), // barn red
    Color::rgb(0x4F, 0x7A, 0x3A), // leaf
    Color::rgb(0xE0, 0xA8, 0x2E), // goldenrod
    Color::rgb(0x6B, 0x4E, 0x8E), // plum
    Color::rgb(0x3E, 0x8E, 0x8E), // teal
    Color::rgb(0x8E, 0x5A, 0x3A), // rust
];

/// A named, colored slot referenced by units and instances instead of a
/// literal color, enabling global recoloring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricRole {
    pub id: EntityId,
    pub name: String,
    pub color: Color,
    /// Set on roles auto-registered from per-instance color overrides.
    /// Absent in older documents; defaults to false on load.
    #[serde(default)]
    pub variant: bool,
}

/// An ordered list of fabric roles. Invariants: never empty, ids unique.
/// Both invariants are enforced by the stores' role lifecycle actions,
/// not re-checked on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub roles: Vec<FabricRole>,
}

impl Palette {
    /// A two-role starting palette for a fresh document.
    pub fn starter(ids: &mut crate::id::IdGen) -> Self {
        Self {
            roles: vec![
                FabricRole {
                    id: ids.next("role"),
                    name: "Background".into(),
                    color: DEFAULT_ROLE_COLORS[0],
                    variant: false,
                },
                FabricRole {
                    id: ids.next("role"),
                    name: "Feature".into(),
                    color: DEFAULT_ROLE_COLORS[1],
                    variant: false,
                },
            ],
        }
    }

    pub fn role(&self, id: EntityId) -> Option<&FabricRole> {
        self.roles.iter().find(|r| r.id == id)
    }

    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.roles.iter().position(|r| r.id == id)
    }

    /// The first role other than `excluding` — the implicit fallback when a
    /// role is removed without one.
    pub fn fallback_for(&self, excluding: EntityId) -> Option<EntityId> {
        self.roles.iter().find(|r| r.id != excluding).map(|r| r.id)
    }

    /// Pick the next default color no current role uses, cycling through
    /// [`DEFAULT_ROLE_COLORS`] when every entry is taken.
    pub fn next_unused_color(&self) -> Color {
        for c in DEFAULT_ROLE_COLORS {
            if !self.roles.iter().any(|r| r.color == c) {
                return c;
            }
        }
        DEFAULT_ROLE_COLORS[self.roles.len() % DEFAULT_ROLE_COLORS.len()]
    }
}

// ─── Units ───────────────────────────────────────────────────────────────

/// Which corner of an HST the dark triangle occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CornerOrientation {
    Nw,
    Ne,
    Se,
    Sw,
}

impl CornerOrientation {
    pub fn rotated_cw(self) -> Self {
        match self {
            Self::Nw => Self::Ne,
            Self::Ne => Self::Se,
            Self::Se => Self::Sw,
            Self::Sw => Self::Nw,
        }
    }

    pub fn flipped_h(self) -> Self {
        match self {
            Self::Nw => Self::Ne,
            Self::Ne => Self::Nw,
            Self::Se => Self::Sw,
            Self::Sw => Self::Se,
        }
    }

    pub fn flipped_v(self) -> Self {
        match self {
            Self::Nw => Self::Sw,
            Self::Sw => Self::Nw,
            Self::Ne => Self::Se,
            Self::Se => Self::Ne,
        }
    }
}

/// Which way a flying-geese unit points. Determines its span:
/// Left/Right span 1×2, Up/Down span 2×1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeeseDirection {
    Up,
    Down,
    Left,
    Right,
}

impl GeeseDirection {
    pub fn rotated_cw(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    pub fn flipped_h(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            other => other,
        }
    }

    pub fn flipped_v(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            other => other,
        }
    }

    pub fn span(self) -> Span {
        match self {
            Self::Left | Self::Right => Span { rows: 1, cols: 2 },
            Self::Up | Self::Down => Span { rows: 2, cols: 1 },
        }
    }
}

/// The QST patch slots, clockwise from the top. Also used as the part
/// names the transformation bridge resolves against.
pub const QST_PARTS: [&str; 4] = ["north", "east", "south", "west"];

/// The unit variants a block can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// A plain square of one fabric.
    Square { role: EntityId },

    /// Half-square triangle: two fabrics split on a diagonal.
    Hst {
        corner: CornerOrientation,
        dark: EntityId,
        light: EntityId,
    },

    /// Flying geese: a center triangle (the goose) flanked by sky corners.
    /// The only multi-cell unit, placed via the two-tap gesture.
    FlyingGeese {
        direction: GeeseDirection,
        goose: EntityId,
        sky: EntityId,
    },

    /// Quarter-square triangle: four fabrics meeting in the center.
    /// Patch order is N, E, S, W.
    Qst { patches: [EntityId; 4] },
}

impl UnitKind {
    pub fn tag(&self) -> crate::registry::UnitTag {
        match self {
            Self::Square { .. } => crate::registry::UnitTag::Square,
            Self::Hst { .. } => crate::registry::UnitTag::Hst,
            Self::FlyingGeese { .. } => crate::registry::UnitTag::FlyingGeese,
            Self::Qst { .. } => crate::registry::UnitTag::Qst,
        }
    }
}

/// One placed piecing unit inside a block grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: EntityId,
    pub pos: GridPos,
    pub kind: UnitKind,
}

impl Unit {
    pub fn new(id: EntityId, pos: GridPos, kind: UnitKind) -> Self {
        Self { id, pos, kind }
    }

    /// Derived cell footprint from the anchor position.
    pub fn span(&self) -> Span {
        crate::registry::unit_def(self.kind.tag()).span(&self.kind)
    }

    /// Does this unit cover `cell`?
    pub fn covers(&self, cell: GridPos) -> bool {
        self.span().covers(self.pos, cell)
    }
}

// ─── Block document ──────────────────────────────────────────────────────

/// A block: a square grid of units plus its palette. The reusable design
/// element a pattern composes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Side length of the square grid, in cells.
    pub size: u32,
    pub units: Vec<Unit>,
    pub palette: Palette,
}

impl Block {
    pub fn new(size: u32, palette: Palette) -> Self {
        Self {
            size,
            units: Vec::new(),
            palette,
        }
    }

    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    /// True when the unit's whole span lies inside the grid.
    pub fn fits(&self, pos: GridPos, span: Span) -> bool {
        pos.row + span.rows <= self.size && pos.col + span.cols <= self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdGen;
    use pretty_assertions::assert_eq;

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#B83A2E").unwrap();
        assert_eq!(c.to_hex(), "#B83A2E");
        assert_eq!(Color::from_hex("fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::from_hex("#12345"), None);
    }

    #[test]
    fn span_covers_every_cell() {
        let span = Span { rows: 1, cols: 2 };
        let anchor = GridPos::new(2, 1);
        assert!(span.covers(anchor, GridPos::new(2, 1)));
        assert!(span.covers(anchor, GridPos::new(2, 2)));
        assert!(!span.covers(anchor, GridPos::new(2, 3)));
        assert!(!span.covers(anchor, GridPos::new(1, 1)));
    }

    #[test]
    fn shift_below_zero_is_none() {
        let pos = GridPos::new(0, 3);
        assert_eq!(pos.shifted(RowColDelta { rows: -1, cols: 0 }), None);
        assert_eq!(
            pos.shifted(RowColDelta { rows: 2, cols: -3 }),
            Some(GridPos::new(2, 0))
        );
    }

    #[test]
    fn corner_rotation_cycles() {
        let mut c = CornerOrientation::Nw;
        for _ in 0..4 {
            c = c.rotated_cw();
        }
        assert_eq!(c, CornerOrientation::Nw);
    }

    #[test]
    fn geese_span_follows_direction() {
        assert_eq!(GeeseDirection::Right.span(), Span { rows: 1, cols: 2 });
        assert_eq!(GeeseDirection::Up.span(), Span { rows: 2, cols: 1 });
    }

    #[test]
    fn next_unused_color_skips_taken() {
        let mut ids = IdGen::new();
        let mut palette = Palette::starter(&mut ids);
        assert_eq!(palette.next_unused_color(), DEFAULT_ROLE_COLORS[2]);

        // Saturate the defaults; the pick must cycle instead of failing.
        for (i, c) in DEFAULT_ROLE_COLORS.iter().enumerate().skip(2) {
            palette.roles.push(FabricRole {
                id: ids.next("role"),
                name: format!("Fabric {i}"),
                color: *c,
                variant: false,
            });
        }
        assert_eq!(
            palette.next_unused_color(),
            DEFAULT_ROLE_COLORS[palette.roles.len() % DEFAULT_ROLE_COLORS.len()]
        );
    }

    #[test]
    fn fallback_is_first_other_role() {
        let mut ids = IdGen::new();
        let palette = Palette::starter(&mut ids);
        let first = palette.roles[0].id;
        let second = palette.roles[1].id;
        assert_eq!(palette.fallback_for(first), Some(second));
        assert_eq!(palette.fallback_for(second), Some(first));
    }
}
