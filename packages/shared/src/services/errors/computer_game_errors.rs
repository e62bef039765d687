use crate::models::board::BoardError;

#[derive(Debug, PartialEq)]
pub enum ComputerGameError {
    NotYourTurn,
    GameOver,
    InvalidMove(BoardError),
}

impl std::fmt::Display for ComputerGameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputerGameError::NotYourTurn => write!(f, "Wait for the computer to move"),
            ComputerGameError::GameOver => write!(f, "The round is over, reset to play again"),
            ComputerGameError::InvalidMove(err) => write!(f, "Invalid move: {}", err),
        }
    }
}

impl std::error::Error for ComputerGameError {}

impl From<BoardError> for ComputerGameError {
    fn from(err: BoardError) -> Self {
        ComputerGameError::InvalidMove(err)
    }
}
