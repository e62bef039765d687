use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::board::{Board, Mark};
use crate::models::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    Tie,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Winner::X,
            Mark::O => Winner::O,
        }
    }
}

impl Winner {
    pub fn mark(self) -> Option<Mark> {
        match self {
            Winner::X => Some(Mark::X),
            Winner::O => Some(Mark::O),
            Winner::Tie => None,
        }
    }
}

/// Roster slot. The creator sits in `A` and plays X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    pub fn mark(self) -> Mark {
        match self {
            Seat::A => Mark::X,
            Seat::B => Mark::O,
        }
    }

    pub fn from_mark(mark: Mark) -> Self {
        match mark {
            Mark::X => Seat::A,
            Mark::O => Seat::B,
        }
    }
}

/// The shared record both participants read, update and subscribe to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub player_a: Player,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_b: Option<Player>,
    pub board: Board,
    pub turn: Mark,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    pub score_a: u32,
    pub score_b: u32,
    pub stats_applied_a: bool,
    pub stats_applied_b: bool,
    /// Bumped by every committed write; used for compare-and-swap updates.
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn new(id: &str, host: &Player) -> Self {
        Match {
            id: id.to_string(),
            player_a: host.clone(),
            player_b: None,
            board: Board::empty(),
            turn: Mark::X,
            status: MatchStatus::Waiting,
            winner: None,
            score_a: 0,
            score_b: 0,
            stats_applied_a: false,
            stats_applied_b: false,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    pub fn seat_of(&self, player_id: &str) -> Option<Seat> {
        if self.player_a.id == player_id {
            Some(Seat::A)
        } else if self
            .player_b
            .as_ref()
            .is_some_and(|player| player.id == player_id)
        {
            Some(Seat::B)
        } else {
            None
        }
    }

    pub fn player(&self, seat: Seat) -> Option<&Player> {
        match seat {
            Seat::A => Some(&self.player_a),
            Seat::B => self.player_b.as_ref(),
        }
    }

    pub fn score(&self, seat: Seat) -> u32 {
        match seat {
            Seat::A => self.score_a,
            Seat::B => self.score_b,
        }
    }

    pub fn stats_applied(&self, seat: Seat) -> bool {
        match seat {
            Seat::A => self.stats_applied_a,
            Seat::B => self.stats_applied_b,
        }
    }

    pub fn set_stats_applied(&mut self, seat: Seat) {
        match seat {
            Seat::A => self.stats_applied_a = true,
            Seat::B => self.stats_applied_b = true,
        }
    }

    pub fn is_full(&self) -> bool {
        self.player_b.is_some()
    }
}

/// Partial-field patch merged into a stored match.
///
/// `winner: Some(None)` clears the winner; `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchUpdate {
    pub board: Option<Board>,
    pub turn: Option<Mark>,
    pub status: Option<MatchStatus>,
    pub winner: Option<Option<Winner>>,
    pub player_b: Option<Player>,
    pub increment_score: Option<Seat>,
    pub reset_stats_flags: bool,
}

impl MatchUpdate {
    pub fn join(player: &Player) -> Self {
        MatchUpdate {
            player_b: Some(player.clone()),
            status: Some(MatchStatus::Active),
            ..Default::default()
        }
    }

    pub fn reset_round() -> Self {
        MatchUpdate {
            board: Some(Board::empty()),
            turn: Some(Mark::X),
            status: Some(MatchStatus::Active),
            winner: Some(None),
            reset_stats_flags: true,
            ..Default::default()
        }
    }

    pub fn apply_to(&self, game_match: &mut Match) {
        if let Some(board) = self.board {
            game_match.board = board;
        }
        if let Some(turn) = self.turn {
            game_match.turn = turn;
        }
        if let Some(status) = self.status {
            game_match.status = status;
        }
        if let Some(winner) = self.winner {
            game_match.winner = winner;
        }
        if let Some(player) = &self.player_b {
            game_match.player_b = Some(player.clone());
        }
        match self.increment_score {
            Some(Seat::A) => game_match.score_a += 1,
            Some(Seat::B) => game_match.score_b += 1,
            None => {}
        }
        if self.reset_stats_flags {
            game_match.stats_applied_a = false;
            game_match.stats_applied_b = false;
        }
        game_match.revision += 1;
    }
}

/// Guard evaluated by the store before an update is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Blind write: the record only has to exist.
    Exists,
    /// Compare-and-swap against the revision the caller last saw.
    Revision(u64),
    /// Seat B is still free and the match is waiting.
    OpenSeat,
}

impl Precondition {
    pub fn holds(&self, game_match: &Match) -> bool {
        match self {
            Precondition::Exists => true,
            Precondition::Revision(expected) => game_match.revision == *expected,
            Precondition::OpenSeat => {
                game_match.player_b.is_none() && game_match.status == MatchStatus::Waiting
            }
        }
    }
}

/// A delivered copy of the match, or notice that it no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Present(Match),
    Absent,
}

impl From<Option<Match>> for Snapshot {
    fn from(value: Option<Match>) -> Self {
        match value {
            Some(game_match) => Snapshot::Present(game_match),
            None => Snapshot::Absent,
        }
    }
}
