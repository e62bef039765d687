use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::models::game_match::{Match, MatchStatus, MatchUpdate, Precondition, Seat, Snapshot};
use crate::models::player_stats::PlayerStats;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::match_repository::MatchRepository;
use crate::repositories::subscription::MatchSubscription;

/// Process-local store with the same semantics as the DynamoDB one.
///
/// A single lock covers matches, stats and subscribers, so every write and
/// its snapshot fan-out happen atomically and in commit order.
#[derive(Clone, Default)]
pub struct InMemoryMatchRepository {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    matches: HashMap<String, Match>,
    stats: HashMap<String, PlayerStats>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Snapshot>>>,
}

impl StoreState {
    fn publish(&mut self, match_id: &str) {
        let snapshot = Snapshot::from(self.matches.get(match_id).cloned());
        if let Some(senders) = self.subscribers.get_mut(match_id) {
            senders.retain(|sender| sender.send(snapshot.clone()).is_ok());
        }
    }
}

impl InMemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions for a match; dropped ones are pruned.
    pub async fn subscriber_count(&self, match_id: &str) -> usize {
        let mut state = self.state.lock().await;
        match state.subscribers.get_mut(match_id) {
            Some(senders) => {
                senders.retain(|sender| !sender.is_closed());
                senders.len()
            }
            None => 0,
        }
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, MatchRepositoryError> {
        let state = self.state.lock().await;
        Ok(state.matches.get(match_id).cloned())
    }

    async fn create_match(&self, game_match: &Match) -> Result<(), MatchRepositoryError> {
        let mut state = self.state.lock().await;
        if state.matches.contains_key(&game_match.id) {
            return Err(MatchRepositoryError::AlreadyExists);
        }
        state
            .matches
            .insert(game_match.id.clone(), game_match.clone());
        state.publish(&game_match.id);
        Ok(())
    }

    async fn update_match(
        &self,
        match_id: &str,
        update: &MatchUpdate,
        precondition: Precondition,
    ) -> Result<(), MatchRepositoryError> {
        let mut state = self.state.lock().await;
        let game_match = state
            .matches
            .get_mut(match_id)
            .ok_or(MatchRepositoryError::NotFound)?;
        if !precondition.holds(game_match) {
            return Err(MatchRepositoryError::ConditionFailed);
        }
        update.apply_to(game_match);
        state.publish(match_id);
        Ok(())
    }

    async fn delete_match(&self, match_id: &str) -> Result<(), MatchRepositoryError> {
        let mut state = self.state.lock().await;
        if state.matches.remove(match_id).is_some() {
            state.publish(match_id);
        }
        Ok(())
    }

    async fn subscribe(&self, match_id: &str) -> Result<MatchSubscription, MatchRepositoryError> {
        let mut state = self.state.lock().await;
        let (sender, subscription) = MatchSubscription::channel();
        let current = Snapshot::from(state.matches.get(match_id).cloned());
        let deleted = current == Snapshot::Absent;
        // The receiver is alive in `subscription`, so this send cannot fail.
        let _ = sender.send(current);
        if !deleted {
            state
                .subscribers
                .entry(match_id.to_string())
                .or_default()
                .push(sender);
        }
        Ok(subscription)
    }

    async fn apply_round_stats(
        &self,
        match_id: &str,
        seat: Seat,
        player_id: &str,
        won: bool,
    ) -> Result<bool, MatchRepositoryError> {
        let mut state = self.state.lock().await;
        let Some(game_match) = state.matches.get_mut(match_id) else {
            return Ok(false);
        };
        if game_match.status != MatchStatus::Finished || game_match.stats_applied(seat) {
            return Ok(false);
        }
        game_match.set_stats_applied(seat);
        game_match.revision += 1;

        state
            .stats
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerStats::new(player_id))
            .record_round(won);
        state.publish(match_id);
        Ok(true)
    }

    async fn get_player_stats(&self, player_id: &str) -> Result<PlayerStats, MatchRepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .stats
            .get(player_id)
            .cloned()
            .unwrap_or_else(|| PlayerStats::new(player_id)))
    }
}
