use serde::{Deserialize, Serialize};

/// An authenticated participant as seen by other players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub display_name: String,
}

impl Player {
    pub fn new(id: &str, display_name: &str) -> Self {
        Player {
            id: id.to_string(),
            display_name: display_name.to_string(),
        }
    }
}
