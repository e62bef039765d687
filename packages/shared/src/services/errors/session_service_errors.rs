#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A waiting or active match must be finished or left first.
    GameInProgress,
    AlreadyInGame(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::GameInProgress => {
                write!(f, "Please complete the current game first")
            }
            SessionError::AlreadyInGame(id) => write!(f, "Already playing in game {}", id),
        }
    }
}

impl std::error::Error for SessionError {}
