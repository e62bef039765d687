use tracing::{debug, info};

use crate::models::board::{Board, BoardStatus, Mark};
use crate::services::errors::computer_game_errors::ComputerGameError;
use crate::services::minimax_service::MinimaxService;

pub const COMPUTER_MARK: Mark = Mark::X;
pub const HUMAN_MARK: Mark = Mark::O;

/// Offline round against the minimax engine. The computer plays X and opens
/// every round; the human plays O.
#[derive(Debug, Clone)]
pub struct ComputerGame {
    board: Board,
    to_move: Mark,
    engine: MinimaxService,
}

impl Default for ComputerGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputerGame {
    pub fn new() -> Self {
        ComputerGame {
            board: Board::empty(),
            to_move: COMPUTER_MARK,
            engine: MinimaxService::new(COMPUTER_MARK),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn status(&self) -> BoardStatus {
        self.board.status()
    }

    pub fn is_active(&self) -> bool {
        !self.status().is_terminal()
    }

    pub fn is_human_turn(&self) -> bool {
        self.is_active() && self.to_move == HUMAN_MARK
    }

    pub fn is_computer_turn(&self) -> bool {
        self.is_active() && self.to_move == COMPUTER_MARK
    }

    /// Places the engine's move. Returns the chosen cell, or `None` when it is
    /// not the computer's turn.
    pub fn play_computer(&mut self) -> Option<usize> {
        if !self.is_computer_turn() {
            return None;
        }
        let index = self.engine.best_move(&self.board, COMPUTER_MARK)?;
        self.place(index, COMPUTER_MARK).ok()?;
        Some(index)
    }

    pub fn play_human(&mut self, index: usize) -> Result<BoardStatus, ComputerGameError> {
        if !self.is_active() {
            return Err(ComputerGameError::GameOver);
        }
        if self.to_move != HUMAN_MARK {
            return Err(ComputerGameError::NotYourTurn);
        }
        self.place(index, HUMAN_MARK)
    }

    pub fn reset(&mut self) {
        info!("Resetting computer game");
        self.board = Board::empty();
        self.to_move = COMPUTER_MARK;
    }

    fn place(&mut self, index: usize, mark: Mark) -> Result<BoardStatus, ComputerGameError> {
        self.board = self.board.with_mark(index, mark)?;
        let status = self.board.status();
        debug!("{} played {} -> {:?}", mark, index, status);
        if !status.is_terminal() {
            self.to_move = mark.opponent();
        }
        Ok(status)
    }

    pub fn turn_text(&self) -> &'static str {
        if self.to_move == HUMAN_MARK {
            "Your Turn (O)"
        } else {
            "Computer's Turn (X)"
        }
    }

    /// Result line shown once the round is decided.
    pub fn announcement(&self) -> Option<&'static str> {
        match self.status() {
            BoardStatus::Won(HUMAN_MARK) => Some("You Won! (O)"),
            BoardStatus::Won(_) => Some("Computer Won (X)"),
            BoardStatus::Tied => Some("Tie"),
            BoardStatus::InProgress => None,
        }
    }
}
