//! Exhaustive minimax search for the offline computer opponent.
//!
//! The 3x3 game tree is small enough to search to the end without pruning or
//! a depth limit. Terminal positions score +10 for a computer win, -10 for a
//! human win and 0 for a tie, with no preference for faster wins. Among equal
//! scores the lowest cell index wins.

use tracing::debug;

use crate::models::board::{Board, BoardStatus, Mark, BOARD_SIZE};

const WIN_SCORE: i32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct MinimaxService {
    computer: Mark,
}

impl MinimaxService {
    pub fn new(computer: Mark) -> Self {
        MinimaxService { computer }
    }

    pub fn computer(&self) -> Mark {
        self.computer
    }

    /// Best cell for `to_move`, assuming the computer maximizes and the human
    /// minimizes. `None` when the board is already full or decided.
    pub fn best_move(&self, board: &Board, to_move: Mark) -> Option<usize> {
        if board.status().is_terminal() {
            return None;
        }
        let mut scratch = *board;
        let (best, score) = self.search(&mut scratch, to_move);
        debug!("Minimax picked {:?} for {} (score {})", best, to_move, score);
        best
    }

    /// Game-theoretic value of the position from the computer's side.
    pub fn score(&self, board: &Board, to_move: Mark) -> i32 {
        let mut scratch = *board;
        self.search(&mut scratch, to_move).1
    }

    fn search(&self, board: &mut Board, to_move: Mark) -> (Option<usize>, i32) {
        match board.status() {
            BoardStatus::Won(mark) if mark == self.computer => return (None, WIN_SCORE),
            BoardStatus::Won(_) => return (None, -WIN_SCORE),
            BoardStatus::Tied => return (None, 0),
            BoardStatus::InProgress => {}
        }

        let maximizing = to_move == self.computer;
        let mut best: Option<(usize, i32)> = None;

        for index in 0..BOARD_SIZE {
            if !board.is_empty_at(index) {
                continue;
            }
            board.set(index, Some(to_move));
            let (_, score) = self.search(board, to_move.opponent());
            board.set(index, None);

            let improves = match best {
                None => true,
                Some((_, best_score)) if maximizing => score > best_score,
                Some((_, best_score)) => score < best_score,
            };
            if improves {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, score)) => (Some(index), score),
            None => (None, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(cells: &str) -> Board {
        let values: Vec<String> = cells
            .chars()
            .map(|c| match c {
                'X' => "X".to_string(),
                'O' => "O".to_string(),
                _ => String::new(),
            })
            .collect();
        Board::try_from(values).unwrap()
    }

    /// Plays every legal human reply against the engine and reports whether
    /// any line of play ends in a human win.
    fn human_can_win(engine: &MinimaxService, board: Board, to_move: Mark) -> bool {
        match board.status() {
            BoardStatus::Won(mark) => return mark != engine.computer(),
            BoardStatus::Tied => return false,
            BoardStatus::InProgress => {}
        }

        if to_move == engine.computer() {
            let index = engine.best_move(&board, to_move).unwrap();
            let next = board.with_mark(index, to_move).unwrap();
            human_can_win(engine, next, to_move.opponent())
        } else {
            board.empty_cells().collect::<Vec<_>>().into_iter().any(|index| {
                let next = board.with_mark(index, to_move).unwrap();
                human_can_win(engine, next, to_move.opponent())
            })
        }
    }

    #[test]
    fn test_never_loses_when_opening() {
        let engine = MinimaxService::new(Mark::X);
        assert!(!human_can_win(&engine, Board::empty(), Mark::X));
    }

    #[test]
    fn test_never_loses_when_replying() {
        let engine = MinimaxService::new(Mark::O);
        assert!(!human_can_win(&engine, Board::empty(), Mark::X));
    }

    #[test]
    fn test_takes_immediate_win() {
        let engine = MinimaxService::new(Mark::X);
        assert_eq!(engine.best_move(&board("XX_OO____"), Mark::X), Some(2));
    }

    #[test]
    fn test_blocks_immediate_loss() {
        let engine = MinimaxService::new(Mark::X);
        // O threatens 3-4-5; X has no win of its own.
        assert_eq!(engine.best_move(&board("X__OO___X"), Mark::X), Some(5));
    }

    #[test]
    fn test_first_index_breaks_ties() {
        // Every opening draws under perfect play, so the first cell is chosen.
        let engine = MinimaxService::new(Mark::X);
        assert_eq!(engine.score(&Board::empty(), Mark::X), 0);
        assert_eq!(engine.best_move(&Board::empty(), Mark::X), Some(0));
    }

    #[test]
    fn test_no_move_on_finished_board() {
        let engine = MinimaxService::new(Mark::X);
        assert_eq!(engine.best_move(&board("XXXOO____"), Mark::O), None);
        assert_eq!(engine.best_move(&board("XOXXOOOXX"), Mark::X), None);
    }

    #[test]
    fn test_search_does_not_touch_caller_board() {
        let engine = MinimaxService::new(Mark::O);
        let position = board("X___O___X");
        let before = position;

        let _ = engine.best_move(&position, Mark::O);

        assert_eq!(position, before);
    }

    #[test]
    fn test_terminal_scores() {
        let engine = MinimaxService::new(Mark::X);
        assert_eq!(engine.score(&board("XXXOO____"), Mark::O), 10);
        assert_eq!(engine.score(&board("OOOXX_X__"), Mark::X), -10);
        assert_eq!(engine.score(&board("XOXXOOOXX"), Mark::X), 0);
    }
}
