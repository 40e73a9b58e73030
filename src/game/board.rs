//! Board Definitions
//!
//! A board is a 6x6 grid flattened row-major into 36 cells. Each player places
//! exactly six single-cell boats before the match starts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cells per board.
pub const BOARD_CELLS: usize = 36;

/// Boats every board must carry.
pub const BOATS_PER_BOARD: usize = 6;

/// Cell index into a flattened board (0..36).
pub type Position = usize;

/// State of a single cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    /// Open water.
    Water,
    /// A boat.
    Boat,
}

/// Board validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Board does not have exactly [`BOARD_CELLS`] cells.
    #[error("board must have {expected} cells, got {actual}")]
    WrongSize {
        /// Required length.
        expected: usize,
        /// Submitted length.
        actual: usize,
    },

    /// Board does not have exactly [`BOATS_PER_BOARD`] boats.
    #[error("board must have {expected} boats, got {actual}")]
    WrongBoatCount {
        /// Required boats.
        expected: usize,
        /// Submitted boats.
        actual: usize,
    },

    /// Position outside the grid.
    #[error("position {0} is outside the board")]
    PositionOutOfRange(Position),
}

/// A validated board.
///
/// Only constructible through [`Board::new`], so holding one means the shape
/// and boat count have been checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    /// Validate and wrap a submitted cell list.
    pub fn new(cells: Vec<Cell>) -> Result<Self, BoardError> {
        if cells.len() != BOARD_CELLS {
            return Err(BoardError::WrongSize {
                expected: BOARD_CELLS,
                actual: cells.len(),
            });
        }

        let boats = count_boats(&cells);
        if boats != BOATS_PER_BOARD {
            return Err(BoardError::WrongBoatCount {
                expected: BOATS_PER_BOARD,
                actual: boats,
            });
        }

        Ok(Self { cells })
    }

    /// Cell at a position.
    pub fn cell(&self, position: Position) -> Option<Cell> {
        self.cells.get(position).copied()
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of boats (always [`BOATS_PER_BOARD`]).
    pub fn boat_count(&self) -> usize {
        count_boats(&self.cells)
    }
}

impl TryFrom<Vec<Cell>> for Board {
    type Error = BoardError;

    fn try_from(cells: Vec<Cell>) -> Result<Self, Self::Error> {
        Board::new(cells)
    }
}

/// Check that an attack target lies on the grid.
pub fn validate_position(position: Position) -> Result<Position, BoardError> {
    if position < BOARD_CELLS {
        Ok(position)
    } else {
        Err(BoardError::PositionOutOfRange(position))
    }
}

fn count_boats(cells: &[Cell]) -> usize {
    cells.iter().filter(|c| **c == Cell::Boat).count()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Valid board with boats at the given positions.
    pub(crate) fn board_with_boats(boats: [Position; BOATS_PER_BOARD]) -> Vec<Cell> {
        let mut cells = vec![Cell::Water; BOARD_CELLS];
        for p in boats {
            cells[p] = Cell::Boat;
        }
        cells
    }

    #[test]
    fn test_valid_board_accepted() {
        let board = Board::new(board_with_boats([0, 1, 2, 3, 4, 5])).unwrap();
        assert_eq!(board.boat_count(), 6);
        assert_eq!(board.cell(0), Some(Cell::Boat));
        assert_eq!(board.cell(6), Some(Cell::Water));
        assert_eq!(board.cell(36), None);
    }

    #[test]
    fn test_short_board_rejected() {
        let result = Board::new(vec![Cell::Boat; 6]);
        assert_eq!(
            result,
            Err(BoardError::WrongSize { expected: 36, actual: 6 })
        );
    }

    #[test]
    fn test_too_many_boats_rejected() {
        let mut cells = board_with_boats([0, 1, 2, 3, 4, 5]);
        cells[35] = Cell::Boat;
        let result = Board::new(cells);
        assert_eq!(
            result,
            Err(BoardError::WrongBoatCount { expected: 6, actual: 7 })
        );
    }

    #[test]
    fn test_cells_parse_from_wire_names() {
        let cells: Vec<Cell> = serde_json::from_str(r#"["water","boat"]"#).unwrap();
        assert_eq!(cells, vec![Cell::Water, Cell::Boat]);
        assert!(serde_json::from_str::<Cell>(r#""ship""#).is_err());
    }

    #[test]
    fn test_position_bounds() {
        assert_eq!(validate_position(0), Ok(0));
        assert_eq!(validate_position(35), Ok(35));
        assert_eq!(validate_position(36), Err(BoardError::PositionOutOfRange(36)));
    }

    proptest! {
        #[test]
        fn prop_accepted_iff_shape_and_boats(cells in prop::collection::vec(
            prop_oneof![Just(Cell::Water), Just(Cell::Boat)],
            30..42,
        )) {
            let boats = cells.iter().filter(|c| **c == Cell::Boat).count();
            let expected_ok = cells.len() == BOARD_CELLS && boats == BOATS_PER_BOARD;
            prop_assert_eq!(Board::new(cells).is_ok(), expected_ok);
        }

        #[test]
        fn prop_six_distinct_boats_always_valid(
            positions in prop::sample::subsequence((0..BOARD_CELLS).collect::<Vec<_>>(), BOATS_PER_BOARD)
        ) {
            let mut cells = vec![Cell::Water; BOARD_CELLS];
            for p in positions {
                cells[p] = Cell::Boat;
            }
            prop_assert!(Board::new(cells).is_ok());
        }
    }
}
