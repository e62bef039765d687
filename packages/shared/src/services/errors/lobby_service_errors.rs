use crate::repositories::errors::match_repository_errors::MatchRepositoryError;

#[derive(Debug, PartialEq)]
pub enum LobbyServiceError {
    NotFound,
    AlreadyFull,
    ValidationError(String),
    RepositoryError(MatchRepositoryError),
}

impl std::fmt::Display for LobbyServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LobbyServiceError::NotFound => write!(f, "Game not found"),
            LobbyServiceError::AlreadyFull => write!(f, "Game is full"),
            LobbyServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            LobbyServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for LobbyServiceError {}

impl From<MatchRepositoryError> for LobbyServiceError {
    fn from(err: MatchRepositoryError) -> Self {
        LobbyServiceError::RepositoryError(err)
    }
}
