//! Two-tap placement gesture for flying geese.
//!
//! The only multi-cell unit type is placed by tapping two adjacent cells.
//! The first tap captures the cell and its precomputed valid-adjacent set;
//! the second is validated against that stored set — the one-shot gesture
//! is not re-checked against current occupancy. An invalid second tap
//! cancels the gesture silently: user-input rejection, not a failure.

use qd_core::model::{GeeseDirection, GridPos, Unit};
use qd_core::occupancy;
use smallvec::SmallVec;

#[derive(Debug, Clone, Default)]
enum TwoTapState {
    #[default]
    Idle,
    AwaitingSecond {
        first: GridPos,
        valid: SmallVec<[GridPos; 4]>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct TwoTapPlacement {
    state: TwoTapState,
}

impl TwoTapPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TwoTapState::AwaitingSecond { .. })
    }

    /// The adjacent cells the second tap may land on, while awaiting one.
    pub fn valid_cells(&self) -> Option<&[GridPos]> {
        match &self.state {
            TwoTapState::AwaitingSecond { valid, .. } => Some(valid),
            TwoTapState::Idle => None,
        }
    }

    /// Start the gesture. Rejects an out-of-bounds or occupied first cell
    /// by returning false and staying idle.
    pub fn begin(&mut self, size: u32, units: &[Unit], first: GridPos) -> bool {
        if first.row >= size || first.col >= size || occupancy::is_occupied(units, first) {
            return false;
        }
        let valid = occupancy::valid_adjacent_cells(size, units, first);
        self.state = TwoTapState::AwaitingSecond { first, valid };
        true
    }

    /// Finish the gesture. Returns the anchor (the smaller of the two
    /// row/col pairs) and the derived direction, or `None` when the second
    /// cell is not in the stored valid set. Either way the machine returns
    /// to idle.
    pub fn complete(&mut self, second: GridPos) -> Option<(GridPos, GeeseDirection)> {
        let state = std::mem::take(&mut self.state);
        let TwoTapState::AwaitingSecond { first, valid } = state else {
            return None;
        };
        if !valid.contains(&second) {
            return None;
        }
        let direction = pair_direction(first, second);
        let anchor = GridPos::new(first.row.min(second.row), first.col.min(second.col));
        Some((anchor, direction))
    }

    pub fn cancel(&mut self) {
        self.state = TwoTapState::Idle;
    }
}

/// Direction from the relative offset of the two taps, decided in
/// right/left/down/up order. Diagonals are impossible: the second cell
/// came from the orthogonal adjacency set.
fn pair_direction(first: GridPos, second: GridPos) -> GeeseDirection {
    if second.col == first.col + 1 {
        GeeseDirection::Right
    } else if second.col + 1 == first.col {
        GeeseDirection::Left
    } else if second.row == first.row + 1 {
        GeeseDirection::Down
    } else {
        GeeseDirection::Up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use qd_core::id::EntityId;
    use qd_core::model::UnitKind;

    fn square(id: &str, row: u32, col: u32) -> Unit {
        Unit::new(
            EntityId::intern(id),
            GridPos::new(row, col),
            UnitKind::Square {
                role: EntityId::intern("background"),
            },
        )
    }

    #[test]
    fn full_gesture_derives_direction_and_anchor() {
        let mut placement = TwoTapPlacement::new();
        assert!(placement.begin(3, &[], GridPos::new(1, 1)));
        assert_eq!(placement.valid_cells().map(<[GridPos]>::len), Some(4));

        let (anchor, direction) = placement.complete(GridPos::new(1, 2)).unwrap();
        assert_eq!(direction, GeeseDirection::Right);
        assert_eq!(anchor, GridPos::new(1, 1));
        assert!(!placement.is_active());
    }

    #[test]
    fn second_tap_left_and_up_anchor_at_second() {
        let mut placement = TwoTapPlacement::new();
        placement.begin(3, &[], GridPos::new(1, 1));
        let (anchor, direction) = placement.complete(GridPos::new(1, 0)).unwrap();
        assert_eq!(direction, GeeseDirection::Left);
        assert_eq!(anchor, GridPos::new(1, 0));

        placement.begin(3, &[], GridPos::new(1, 1));
        let (anchor, direction) = placement.complete(GridPos::new(0, 1)).unwrap();
        assert_eq!(direction, GeeseDirection::Up);
        assert_eq!(anchor, GridPos::new(0, 1));
    }

    #[test]
    fn invalid_second_tap_cancels_silently() {
        let mut placement = TwoTapPlacement::new();
        placement.begin(3, &[], GridPos::new(0, 0));
        assert_eq!(placement.complete(GridPos::new(2, 2)), None);
        assert!(!placement.is_active());
    }

    #[test]
    fn occupied_first_cell_is_rejected() {
        let units = vec![square("s", 1, 1)];
        let mut placement = TwoTapPlacement::new();
        assert!(!placement.begin(3, &units, GridPos::new(1, 1)));
        assert!(!placement.begin(3, &units, GridPos::new(3, 0)), "out of bounds");
        assert!(!placement.is_active());
    }

    #[test]
    fn occupied_neighbors_are_excluded_from_valid_set() {
        let units = vec![square("s", 0, 1)];
        let mut placement = TwoTapPlacement::new();
        placement.begin(3, &units, GridPos::new(0, 0));
        // Right neighbor occupied, up/left out of bounds: only down remains.
        assert_eq!(placement.valid_cells().unwrap(), &[GridPos::new(1, 0)]);
        assert_eq!(placement.complete(GridPos::new(0, 1)), None);
    }
}
