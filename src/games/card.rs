use crate::errors::RoundError;
use crate::games::types::{BingoLetter, FREE_CELL, GRID_SIZE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Contents of a card cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellValue {
    Number(u8),
    Free,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    pub value: CellValue,
    /// Number has been drawn (always true for the free space)
    pub called: bool,
    /// Player or auto-daub has dabbed the cell (always true for the free space)
    pub marked: bool,
}

impl Cell {
    fn number(value: u8) -> Self {
        Self {
            value: CellValue::Number(value),
            called: false,
            marked: false,
        }
    }

    fn free() -> Self {
        Self {
            value: CellValue::Free,
            called: true,
            marked: true,
        }
    }

    pub fn is_free(&self) -> bool {
        self.value == CellValue::Free
    }
}

/// A 5x5 BINGO card, indexed `[row][col]` with column 0 = B
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: String,
    cells: [[Cell; GRID_SIZE]; GRID_SIZE],
}

impl Card {
    /// Build a card from column-major numbers; the center entry is ignored.
    pub fn from_columns(columns: [[u8; GRID_SIZE]; GRID_SIZE]) -> Result<Self, RoundError> {
        let mut cells = [[Cell::free(); GRID_SIZE]; GRID_SIZE];
        let mut seen = HashSet::new();

        for (col, numbers) in columns.iter().enumerate() {
            let letter = BingoLetter::ALL[col];
            for (row, &number) in numbers.iter().enumerate() {
                if (row, col) == FREE_CELL {
                    continue;
                }
                if !letter.range().contains(&number) {
                    return Err(RoundError::InvalidCard(format!(
                        "{} outside column {} range",
                        number, letter
                    )));
                }
                if !seen.insert(number) {
                    return Err(RoundError::InvalidCard(format!("{} appears twice", number)));
                }
                cells[row][col] = Cell::number(number);
            }
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            cells,
        })
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(row)?.get(col)
    }

    pub fn rows(&self) -> &[[Cell; GRID_SIZE]; GRID_SIZE] {
        &self.cells
    }

    /// Numbers of one column, top to bottom (`None` for the free space)
    pub fn column_numbers(&self, col: usize) -> Vec<Option<u8>> {
        self.cells
            .iter()
            .map(|row| match row[col].value {
                CellValue::Number(n) => Some(n),
                CellValue::Free => None,
            })
            .collect()
    }

    pub fn position_of(&self, number: u8) -> Option<(usize, usize)> {
        let col = BingoLetter::from_number(number)?.column();
        (0..GRID_SIZE).find(|&row| self.cells[row][col].value == CellValue::Number(number))
            .map(|row| (row, col))
    }

    /// Record a drawn number. Returns the cell position if the card holds it.
    pub fn apply_call(&mut self, number: u8, auto_daub: bool) -> Option<(usize, usize)> {
        let (row, col) = self.position_of(number)?;
        let cell = &mut self.cells[row][col];
        cell.called = true;
        if auto_daub {
            cell.marked = true;
        }
        Some((row, col))
    }

    /// Toggle the player's dab on a cell; the free space stays marked.
    pub fn toggle_mark(&mut self, row: usize, col: usize) -> Option<bool> {
        let cell = self.cells.get_mut(row)?.get_mut(col)?;
        if !cell.is_free() {
            cell.marked = !cell.marked;
        }
        Some(cell.marked)
    }

    pub fn called_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.called).count()
    }

    #[cfg(test)]
    pub(crate) fn set_called(&mut self, row: usize, col: usize, called: bool) {
        if !self.cells[row][col].is_free() {
            self.cells[row][col].called = called;
        }
    }
}

/// Issues cards by independent per-column rejection sampling
#[derive(Debug, Clone, Copy, Default)]
pub struct CardGenerator;

impl CardGenerator {
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Card {
        let mut cells = [[Cell::free(); GRID_SIZE]; GRID_SIZE];

        for letter in BingoLetter::ALL {
            let col = letter.column();
            let mut used = HashSet::with_capacity(GRID_SIZE);
            for row in 0..GRID_SIZE {
                if (row, col) == FREE_CELL {
                    continue;
                }
                // Re-sample on duplicates
                let number = loop {
                    let candidate = rng.gen_range(letter.range());
                    if used.insert(candidate) {
                        break candidate;
                    }
                };
                cells[row][col] = Cell::number(number);
            }
        }

        // Id comes from the same stream so a replayed seed reproduces it
        let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
        Card {
            id: id.to_string(),
            cells,
        }
    }

    pub fn generate_many<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<Card> {
        (0..count).map(|_| self.generate(rng)).collect()
    }
}
