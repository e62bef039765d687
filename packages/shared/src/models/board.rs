use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOARD_SIZE: usize = 9;

/// Rows, columns and diagonals of the 3x3 grid, row-major indices.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a board position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardStatus {
    InProgress,
    Won(Mark),
    Tied,
}

impl BoardStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BoardStatus::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    InvalidLength(usize),
    InvalidCell(String),
    IndexOutOfRange(usize),
    CellOccupied(usize),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::InvalidLength(len) => {
                write!(f, "Board must have {} cells, got {}", BOARD_SIZE, len)
            }
            BoardError::InvalidCell(value) => write!(f, "Invalid cell value: {:?}", value),
            BoardError::IndexOutOfRange(index) => write!(f, "Cell index {} is out of range", index),
            BoardError::CellOccupied(index) => write!(f, "Cell {} is already taken", index),
        }
    }
}

impl std::error::Error for BoardError {}

/// A 3x3 tic-tac-toe grid stored row-major.
///
/// Persisted as an array of nine strings (`""`, `"X"` or `"O"`) so that
/// records written by other clients stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct Board([Option<Mark>; BOARD_SIZE]);

impl Board {
    pub fn empty() -> Self {
        Board([None; BOARD_SIZE])
    }

    pub fn from_cells(cells: [Option<Mark>; BOARD_SIZE]) -> Self {
        Board(cells)
    }

    pub fn cells(&self) -> &[Option<Mark>; BOARD_SIZE] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<Mark> {
        self.0.get(index).copied().flatten()
    }

    pub fn is_empty_at(&self, index: usize) -> bool {
        index < BOARD_SIZE && self.0[index].is_none()
    }

    /// Returns a copy of the board with `mark` placed at `index`.
    pub fn with_mark(&self, index: usize, mark: Mark) -> Result<Board, BoardError> {
        if index >= BOARD_SIZE {
            return Err(BoardError::IndexOutOfRange(index));
        }
        if self.0[index].is_some() {
            return Err(BoardError::CellOccupied(index));
        }
        let mut next = *self;
        next.0[index] = Some(mark);
        Ok(next)
    }

    pub(crate) fn set(&mut self, index: usize, cell: Option<Mark>) {
        self.0[index] = cell;
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| index)
    }

    pub fn count(&self, mark: Mark) -> usize {
        self.0.iter().filter(|cell| **cell == Some(mark)).count()
    }

    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn winner(&self) -> Option<Mark> {
        LINES.iter().find_map(|[a, b, c]| match self.0[*a] {
            Some(mark) if self.0[*b] == Some(mark) && self.0[*c] == Some(mark) => Some(mark),
            _ => None,
        })
    }

    /// Board evaluator: a completed line wins even on a full board.
    pub fn status(&self) -> BoardStatus {
        match self.winner() {
            Some(mark) => BoardStatus::Won(mark),
            None if self.is_full() => BoardStatus::Tied,
            None => BoardStatus::InProgress,
        }
    }
}

impl From<Board> for Vec<String> {
    fn from(board: Board) -> Self {
        board
            .0
            .iter()
            .map(|cell| cell.map(|mark| mark.as_str()).unwrap_or("").to_string())
            .collect()
    }
}

impl TryFrom<Vec<String>> for Board {
    type Error = BoardError;

    fn try_from(values: Vec<String>) -> Result<Self, Self::Error> {
        if values.len() != BOARD_SIZE {
            return Err(BoardError::InvalidLength(values.len()));
        }
        let mut board = Board::empty();
        for (index, value) in values.iter().enumerate() {
            let cell = match value.as_str() {
                "" => None,
                "X" => Some(Mark::X),
                "O" => Some(Mark::O),
                other => return Err(BoardError::InvalidCell(other.to_string())),
            };
            board.set(index, cell);
        }
        Ok(board)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            let cells: Vec<String> = (0..3)
                .map(|col| {
                    let index = row * 3 + col;
                    match self.0[index] {
                        Some(mark) => mark.to_string(),
                        None => index.to_string(),
                    }
                })
                .collect();
            writeln!(f, " {} ", cells.join(" | "))?;
            if row < 2 {
                writeln!(f, "---+---+---")?;
            }
        }
        Ok(())
    }
}
