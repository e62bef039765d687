use serde::{Deserialize, Serialize};

/// Lifetime counters stored per user, credited once per finished round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: String,
    #[serde(default)]
    pub games_played: u32,
    #[serde(default)]
    pub games_won: u32,
}

impl PlayerStats {
    pub fn new(player_id: &str) -> Self {
        PlayerStats {
            player_id: player_id.to_string(),
            ..Default::default()
        }
    }

    pub fn record_round(&mut self, won: bool) {
        self.games_played += 1;
        if won {
            self.games_won += 1;
        }
    }
}
