use crate::repositories::errors::match_repository_errors::MatchRepositoryError;

#[derive(Debug, PartialEq)]
pub enum GameSessionServiceError {
    RepositoryError(MatchRepositoryError),
    ValidationError(String),
}

impl std::fmt::Display for GameSessionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            GameSessionServiceError::ValidationError(msg) => {
                write!(f, "Validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for GameSessionServiceError {}

impl From<MatchRepositoryError> for GameSessionServiceError {
    fn from(err: MatchRepositoryError) -> Self {
        GameSessionServiceError::RepositoryError(err)
    }
}
