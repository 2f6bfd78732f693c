use crate::games::card::Card;
use crate::games::types::{BingoLetter, GRID_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the twelve winning lines.
///
/// `Row` and `Column` indices are 0-based and must be below `GRID_SIZE`;
/// `LineId::all` only yields valid ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineId {
    Row(usize),
    Column(usize),
    DiagMain,
    DiagAnti,
}

impl LineId {
    pub fn all() -> impl Iterator<Item = LineId> {
        (0..GRID_SIZE)
            .map(LineId::Row)
            .chain((0..GRID_SIZE).map(LineId::Column))
            .chain([LineId::DiagMain, LineId::DiagAnti])
    }

    pub fn is_valid(self) -> bool {
        match self {
            LineId::Row(index) | LineId::Column(index) => index < GRID_SIZE,
            LineId::DiagMain | LineId::DiagAnti => true,
        }
    }

    /// `(row, col)` positions along the line
    pub fn cells(self) -> [(usize, usize); GRID_SIZE] {
        debug_assert!(self.is_valid(), "{:?} is off the card", self);
        let mut cells = [(0, 0); GRID_SIZE];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = match self {
                LineId::Row(row) => (row, i),
                LineId::Column(col) => (i, col),
                LineId::DiagMain => (i, i),
                LineId::DiagAnti => (i, GRID_SIZE - 1 - i),
            };
        }
        cells
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineId::Row(row) => write!(f, "Row {}", row + 1),
            LineId::Column(col) => match BingoLetter::from_column(*col) {
                Some(letter) => write!(f, "Column {}", letter),
                None => write!(f, "Column {}", col + 1),
            },
            LineId::DiagMain => write!(f, "Diagonal \\"),
            LineId::DiagAnti => write!(f, "Diagonal /"),
        }
    }
}

/// Result of checking a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub complete: bool,
    pub satisfied_lines: BTreeSet<LineId>,
}

impl Evaluation {
    pub fn labels(&self) -> Vec<String> {
        self.satisfied_lines.iter().map(|l| l.to_string()).collect()
    }
}

/// Checks called cells against rows, columns and diagonals.
///
/// Stateless: every call recomputes from the card's called grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinDetector;

impl WinDetector {
    pub fn evaluate(&self, card: &Card) -> Evaluation {
        let rows = card.rows();
        let satisfied_lines: BTreeSet<LineId> = LineId::all()
            .filter(|line| line.cells().iter().all(|&(r, c)| rows[r][c].called))
            .collect();

        Evaluation {
            complete: !satisfied_lines.is_empty(),
            satisfied_lines,
        }
    }

    /// Indices of complete cards, in stored order
    pub fn complete_cards(&self, cards: &[Card]) -> Vec<usize> {
        cards
            .iter()
            .enumerate()
            .filter(|(_, card)| self.evaluate(card).complete)
            .map(|(index, _)| index)
            .collect()
    }
}
