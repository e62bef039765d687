use std::fmt;

use crate::models::board::{Board, Mark};
use crate::models::game_match::{Match, MatchStatus, Seat, Winner};

/// Everything the UI shell needs to draw one match for the local player.
#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub match_id: String,
    pub status: MatchStatus,
    pub status_text: String,
    pub player_a_label: String,
    pub player_a_score: u32,
    pub player_b_label: String,
    pub player_b_score: u32,
    pub board: Board,
    pub local_mark: Option<Mark>,
    pub can_reset: bool,
    pub can_delete: bool,
}

impl GameView {
    pub fn project(game_match: &Match, local_seat: Option<Seat>) -> Self {
        let player_a_label = label_or(&game_match.player_a.display_name, "Player 1");
        let player_b_label = game_match
            .player_b
            .as_ref()
            .map(|player| label_or(&player.display_name, "Player 2"))
            .unwrap_or_else(|| "Waiting...".to_string());
        let local_mark = local_seat.map(Seat::mark);

        let status_text = match game_match.status {
            MatchStatus::Waiting => "Waiting for Player 2 to join...".to_string(),
            MatchStatus::Finished => match game_match.winner {
                Some(Winner::X) => format!("{} Won!", player_a_label),
                Some(Winner::O) => format!("{} Won!", player_b_label),
                Some(Winner::Tie) | None => "It's a Tie!".to_string(),
            },
            MatchStatus::Active if local_mark == Some(game_match.turn) => "Your Turn".to_string(),
            MatchStatus::Active => "Opponent's Turn".to_string(),
        };

        GameView {
            match_id: game_match.id.clone(),
            status: game_match.status,
            status_text,
            player_a_label,
            player_a_score: game_match.score_a,
            player_b_label,
            player_b_score: game_match.score_b,
            board: game_match.board,
            local_mark,
            can_reset: game_match.status != MatchStatus::Waiting,
            can_delete: game_match.status != MatchStatus::Active,
        }
    }
}

fn label_or(name: &str, fallback: &str) -> String {
    if name.trim().is_empty() {
        fallback.to_string()
    } else {
        name.to_string()
    }
}

impl fmt::Display for GameView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (X): {}    {} (O): {}",
            self.player_a_label, self.player_a_score, self.player_b_label, self.player_b_score
        )?;
        writeln!(f, "{}", self.status_text)?;
        writeln!(f)?;
        write!(f, "{}", self.board)?;
        writeln!(f)?;
        write!(f, "Game ID: {} (Share this with a friend!)", self.match_id)
    }
}
