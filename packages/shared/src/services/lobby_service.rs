use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::models::game_match::{Match, MatchUpdate, Precondition};
use crate::models::player::Player;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::match_repository::MatchRepository;
use crate::services::errors::lobby_service_errors::LobbyServiceError;

pub const MATCH_ID_LENGTH: usize = 6;

/// Six-digit numeric id, never starting with zero.
pub fn generate_match_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100000..=999999).to_string()
}

pub fn validate_match_id(raw_id: &str) -> Result<String, LobbyServiceError> {
    let id = raw_id.trim();
    if id.is_empty() {
        return Err(LobbyServiceError::ValidationError(
            "Game ID cannot be empty".to_string(),
        ));
    }
    if id.len() != MATCH_ID_LENGTH || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(LobbyServiceError::ValidationError(format!(
            "Game ID must be {} digits",
            MATCH_ID_LENGTH
        )));
    }
    Ok(id.to_string())
}

pub struct LobbyService {
    repository: Arc<dyn MatchRepository + Send + Sync>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl LobbyService {
    pub fn new(repository: Arc<dyn MatchRepository + Send + Sync>) -> Self {
        Self::with_rng(repository, StdRng::from_entropy())
    }

    pub fn with_rng<R>(repository: Arc<dyn MatchRepository + Send + Sync>, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        LobbyService {
            repository,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    fn next_id(&self) -> String {
        // A poisoned lock still holds a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        generate_match_id(&mut **rng)
    }

    /// Creates a waiting match hosted by `host` under a fresh id. Id
    /// collisions are retried until an unused id is found.
    pub async fn create_match(&self, host: &Player) -> Result<Match, LobbyServiceError> {
        if host.id.is_empty() {
            return Err(LobbyServiceError::ValidationError(
                "Player ID cannot be empty".to_string(),
            ));
        }

        loop {
            let id = self.next_id();
            if self.repository.get_match(&id).await?.is_some() {
                debug!("Match id {} is taken, generating another", id);
                continue;
            }

            let game_match = Match::new(&id, host);
            match self.repository.create_match(&game_match).await {
                Ok(()) => {
                    info!("{} created match {}", host.id, id);
                    return Ok(game_match);
                }
                Err(MatchRepositoryError::AlreadyExists) => {
                    warn!("Match id {} was claimed concurrently, retrying", id);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Takes seat B of a waiting match. A player who already holds a seat
    /// gets the match back unchanged.
    pub async fn join_match(
        &self,
        player: &Player,
        raw_id: &str,
    ) -> Result<Match, LobbyServiceError> {
        let id = validate_match_id(raw_id)?;

        let game_match = self
            .repository
            .get_match(&id)
            .await?
            .ok_or(LobbyServiceError::NotFound)?;

        if game_match.seat_of(&player.id).is_some() {
            debug!("{} rejoined match {}", player.id, id);
            return Ok(game_match);
        }
        if game_match.is_full() {
            return Err(LobbyServiceError::AlreadyFull);
        }

        let update = MatchUpdate::join(player);
        match self
            .repository
            .update_match(&id, &update, Precondition::OpenSeat)
            .await
        {
            Ok(()) => {}
            Err(MatchRepositoryError::ConditionFailed) => {
                return Err(LobbyServiceError::AlreadyFull)
            }
            Err(MatchRepositoryError::NotFound) => return Err(LobbyServiceError::NotFound),
            Err(e) => return Err(e.into()),
        }
        info!("{} joined match {}", player.id, id);

        let mut joined = game_match;
        update.apply_to(&mut joined);
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_match::MatchStatus;
    use crate::repositories::in_memory_match_repository::InMemoryMatchRepository;
    use crate::repositories::match_repository::MockMatchRepository;
    use rstest::rstest;

    fn host() -> Player {
        Player::new("host-uid", "Alice")
    }

    fn guest() -> Player {
        Player::new("guest-uid", "Bob")
    }

    #[rstest]
    #[case("", false)]
    #[case("   ", false)]
    #[case("12345", false)]
    #[case("1234567", false)]
    #[case("12a456", false)]
    #[case("123456", true)]
    #[case(" 654321 ", true)]
    fn test_validate_match_id(#[case] raw: &str, #[case] valid: bool) {
        assert_eq!(validate_match_id(raw).is_ok(), valid);
    }

    #[test]
    fn test_generated_ids_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let id = generate_match_id(&mut rng);
            assert!(validate_match_id(&id).is_ok(), "bad id {}", id);
        }
    }

    #[tokio::test]
    async fn test_create_match_persists_waiting_match() {
        let repository = Arc::new(InMemoryMatchRepository::new());
        let lobby = LobbyService::new(repository.clone());

        let created = lobby.create_match(&host()).await.unwrap();

        assert_eq!(created.status, MatchStatus::Waiting);
        assert_eq!(created.player_a, host());
        let stored = repository.get_match(&created.id).await.unwrap();
        assert_eq!(stored, Some(created));
    }

    #[tokio::test]
    async fn test_create_match_skips_taken_id() {
        let taken = generate_match_id(&mut StdRng::seed_from_u64(7));
        let repository = Arc::new(InMemoryMatchRepository::new());
        repository
            .create_match(&Match::new(&taken, &guest()))
            .await
            .unwrap();
        let lobby = LobbyService::with_rng(repository.clone(), StdRng::seed_from_u64(7));

        let created = lobby.create_match(&host()).await.unwrap();

        assert_ne!(created.id, taken);
        assert_eq!(
            repository.get_match(&taken).await.unwrap().unwrap().player_a,
            guest()
        );
    }

    #[tokio::test]
    async fn test_create_match_retries_lost_race() {
        let mut repository = MockMatchRepository::new();
        repository.expect_get_match().returning(|_| Ok(None));
        let mut attempts = 0;
        repository.expect_create_match().times(2).returning(move |_| {
            attempts += 1;
            if attempts == 1 {
                Err(MatchRepositoryError::AlreadyExists)
            } else {
                Ok(())
            }
        });
        let lobby = LobbyService::new(Arc::new(repository));

        assert!(lobby.create_match(&host()).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_match_surfaces_store_errors() {
        let mut repository = MockMatchRepository::new();
        repository
            .expect_get_match()
            .returning(|_| Err(MatchRepositoryError::DynamoDb("unreachable".to_string())));
        let lobby = LobbyService::new(Arc::new(repository));

        assert_eq!(
            lobby.create_match(&host()).await,
            Err(LobbyServiceError::RepositoryError(
                MatchRepositoryError::DynamoDb("unreachable".to_string())
            ))
        );
    }

    #[tokio::test]
    async fn test_join_match_takes_open_seat() {
        let repository = Arc::new(InMemoryMatchRepository::new());
        let lobby = LobbyService::new(repository.clone());
        let created = lobby.create_match(&host()).await.unwrap();

        let joined = lobby.join_match(&guest(), &created.id).await.unwrap();

        assert_eq!(joined.player_b, Some(guest()));
        assert_eq!(joined.status, MatchStatus::Active);
        assert_eq!(
            repository.get_match(&created.id).await.unwrap(),
            Some(joined)
        );
    }

    #[tokio::test]
    async fn test_join_unknown_match() {
        let lobby = LobbyService::new(Arc::new(InMemoryMatchRepository::new()));
        assert_eq!(
            lobby.join_match(&guest(), "123456").await,
            Err(LobbyServiceError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_join_full_match_does_not_mutate() {
        let repository = Arc::new(InMemoryMatchRepository::new());
        let lobby = LobbyService::new(repository.clone());
        let created = lobby.create_match(&host()).await.unwrap();
        lobby.join_match(&guest(), &created.id).await.unwrap();
        let before = repository.get_match(&created.id).await.unwrap();

        let result = lobby
            .join_match(&Player::new("eve-uid", "Eve"), &created.id)
            .await;

        assert_eq!(result, Err(LobbyServiceError::AlreadyFull));
        assert_eq!(repository.get_match(&created.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_rejoin_returns_match_unchanged() {
        let repository = Arc::new(InMemoryMatchRepository::new());
        let lobby = LobbyService::new(repository.clone());
        let created = lobby.create_match(&host()).await.unwrap();

        let rejoined = lobby.join_match(&host(), &created.id).await.unwrap();

        assert_eq!(rejoined, created);
        assert_eq!(rejoined.revision, 0);
    }

    #[tokio::test]
    async fn test_join_race_lost_reports_full() {
        let mut repository = MockMatchRepository::new();
        repository
            .expect_get_match()
            .returning(|id| Ok(Some(Match::new(id, &host()))));
        repository
            .expect_update_match()
            .times(1)
            .returning(|_, _, _| Err(MatchRepositoryError::ConditionFailed));
        let lobby = LobbyService::new(Arc::new(repository));

        assert_eq!(
            lobby.join_match(&guest(), "123456").await,
            Err(LobbyServiceError::AlreadyFull)
        );
    }
}
