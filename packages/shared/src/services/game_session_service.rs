//! Synchronization of one online match for the local player.
//!
//! [`GameMachine`] is a pure transition function from snapshots and local UI
//! events to effects. [`ActiveGame`] owns the snapshot subscription, executes
//! the remote effects against the store and hands the UI effects back to the
//! shell. Dropping an `ActiveGame` releases its subscription.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::UpdatePolicy;
use crate::models::board::BoardStatus;
use crate::models::game_match::{
    Match, MatchStatus, MatchUpdate, Precondition, Seat, Snapshot, Winner,
};
use crate::models::game_view::GameView;
use crate::models::player::Player;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::match_repository::MatchRepository;
use crate::repositories::subscription::MatchSubscription;
use crate::services::errors::game_session_service_errors::GameSessionServiceError;

pub const SESSION_ENDED_NOTICE: &str = "The game session has ended.";
pub const CONNECTION_LOST_NOTICE: &str = "Lost connection to the game.";
pub const RESET_TOO_EARLY_NOTICE: &str = "Finish the round before starting a new one.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Loading,
    WaitingForOpponent,
    MyTurn,
    OpponentTurn,
    Finished,
    /// The match was deleted; the view should hand control back to the lobby.
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Snapshot(Snapshot),
    CellClicked(usize),
    ResetRequested,
    LeaveRequested,
    /// The snapshot feed closed without the match being deleted.
    FeedClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    Render(GameView),
    Notify(String),
    ReturnToLobby,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Ui(UiEffect),
    Submit {
        update: MatchUpdate,
        precondition: Precondition,
    },
    ApplyStats {
        seat: Seat,
        won: bool,
    },
    Delete,
}

#[derive(Debug, Clone)]
pub struct GameMachine {
    player: Player,
    match_id: String,
    policy: UpdatePolicy,
    snapshot: Option<Match>,
    local_seat: Option<Seat>,
    state: SyncState,
}

impl GameMachine {
    pub fn new(player: Player, match_id: &str, policy: UpdatePolicy) -> Self {
        GameMachine {
            player,
            match_id: match_id.to_string(),
            policy,
            snapshot: None,
            local_seat: None,
            state: SyncState::Loading,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&Match> {
        self.snapshot.as_ref()
    }

    pub fn local_seat(&self) -> Option<Seat> {
        self.local_seat
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn handle(&mut self, event: GameEvent) -> Vec<Effect> {
        if self.state == SyncState::Ended {
            return Vec::new();
        }
        match event {
            GameEvent::Snapshot(Snapshot::Absent) => self.on_absent(),
            GameEvent::Snapshot(Snapshot::Present(game_match)) => self.on_snapshot(game_match),
            GameEvent::CellClicked(index) => self.on_cell_clicked(index),
            GameEvent::ResetRequested => self.on_reset(),
            GameEvent::LeaveRequested => vec![Effect::Delete],
            GameEvent::FeedClosed => self.on_feed_closed(),
        }
    }

    fn on_absent(&mut self) -> Vec<Effect> {
        info!("Match {} no longer exists", self.match_id);
        self.snapshot = None;
        self.local_seat = None;
        self.state = SyncState::Ended;
        vec![
            Effect::Ui(UiEffect::Notify(SESSION_ENDED_NOTICE.to_string())),
            Effect::Ui(UiEffect::ReturnToLobby),
        ]
    }

    fn on_feed_closed(&mut self) -> Vec<Effect> {
        warn!("Snapshot feed for match {} closed", self.match_id);
        self.state = SyncState::Ended;
        vec![
            Effect::Ui(UiEffect::Notify(CONNECTION_LOST_NOTICE.to_string())),
            Effect::Ui(UiEffect::ReturnToLobby),
        ]
    }

    fn on_snapshot(&mut self, game_match: Match) -> Vec<Effect> {
        let seat = game_match.seat_of(&self.player.id);
        let state = match game_match.status {
            MatchStatus::Waiting => SyncState::WaitingForOpponent,
            MatchStatus::Finished => SyncState::Finished,
            MatchStatus::Active if seat.map(Seat::mark) == Some(game_match.turn) => {
                SyncState::MyTurn
            }
            MatchStatus::Active => SyncState::OpponentTurn,
        };
        if state != self.state {
            debug!("Match {}: {:?} -> {:?}", self.match_id, self.state, state);
        }

        let mut effects = vec![Effect::Ui(UiEffect::Render(GameView::project(
            &game_match,
            seat,
        )))];
        // Render always precedes the stats effect.
        if let Some(seat) = seat {
            if game_match.status == MatchStatus::Finished && !game_match.stats_applied(seat) {
                let won = game_match.winner.and_then(Winner::mark) == Some(seat.mark());
                effects.push(Effect::ApplyStats { seat, won });
            }
        }

        self.local_seat = seat;
        self.state = state;
        self.snapshot = Some(game_match);
        effects
    }

    fn on_cell_clicked(&mut self, index: usize) -> Vec<Effect> {
        let (Some(game_match), Some(seat)) = (&self.snapshot, self.local_seat) else {
            debug!("Ignoring click on {} without a seat in the match", index);
            return Vec::new();
        };
        let mark = seat.mark();
        if game_match.status != MatchStatus::Active
            || game_match.turn != mark
            || !game_match.board.is_empty_at(index)
        {
            debug!(
                "Ignoring click on {} (status {:?}, turn {})",
                index, game_match.status, game_match.turn
            );
            return Vec::new();
        }

        let board = match game_match.board.with_mark(index, mark) {
            Ok(board) => board,
            Err(e) => {
                debug!("Ignoring click: {}", e);
                return Vec::new();
            }
        };

        let mut update = MatchUpdate {
            board: Some(board),
            turn: Some(mark.opponent()),
            ..Default::default()
        };
        match board.status() {
            BoardStatus::Won(winner) => {
                update.status = Some(MatchStatus::Finished);
                update.winner = Some(Some(Winner::from(winner)));
                update.increment_score = Some(Seat::from_mark(winner));
            }
            BoardStatus::Tied => {
                update.status = Some(MatchStatus::Finished);
                update.winner = Some(Some(Winner::Tie));
            }
            BoardStatus::InProgress => {}
        }

        vec![Effect::Submit {
            update,
            precondition: self.precondition(game_match),
        }]
    }

    fn on_reset(&mut self) -> Vec<Effect> {
        match &self.snapshot {
            Some(game_match) if game_match.status == MatchStatus::Finished => {
                vec![Effect::Submit {
                    update: MatchUpdate::reset_round(),
                    precondition: self.precondition(game_match),
                }]
            }
            Some(_) => {
                debug!("Ignoring reset outside a finished round");
                vec![Effect::Ui(UiEffect::Notify(RESET_TOO_EARLY_NOTICE.to_string()))]
            }
            None => Vec::new(),
        }
    }

    fn precondition(&self, game_match: &Match) -> Precondition {
        match self.policy {
            UpdatePolicy::Conditional => Precondition::Revision(game_match.revision),
            UpdatePolicy::Blind => Precondition::Exists,
        }
    }
}

#[derive(Clone)]
pub struct GameSessionService {
    repository: Arc<dyn MatchRepository + Send + Sync>,
    policy: UpdatePolicy,
}

impl GameSessionService {
    pub fn new(repository: Arc<dyn MatchRepository + Send + Sync>, policy: UpdatePolicy) -> Self {
        GameSessionService { repository, policy }
    }

    /// Subscribes to the match and returns the live game view driver.
    pub async fn enter(
        &self,
        player: &Player,
        match_id: &str,
    ) -> Result<ActiveGame, GameSessionServiceError> {
        if match_id.trim().is_empty() {
            return Err(GameSessionServiceError::ValidationError(
                "Game ID cannot be empty".to_string(),
            ));
        }

        let subscription = self.repository.subscribe(match_id).await?;
        info!("{} entered match {}", player.id, match_id);

        Ok(ActiveGame {
            machine: GameMachine::new(player.clone(), match_id, self.policy),
            subscription,
            repository: self.repository.clone(),
        })
    }
}

pub struct ActiveGame {
    machine: GameMachine,
    subscription: MatchSubscription,
    repository: Arc<dyn MatchRepository + Send + Sync>,
}

impl ActiveGame {
    pub fn state(&self) -> SyncState {
        self.machine.state()
    }

    pub fn current_match(&self) -> Option<&Match> {
        self.machine.snapshot()
    }

    pub fn match_id(&self) -> &str {
        self.machine.match_id()
    }

    /// Waits for the next snapshot without applying it. Cancel safe, so it
    /// can race other inputs in `tokio::select!`.
    pub async fn next_snapshot(&mut self) -> Option<Snapshot> {
        if self.machine.state() == SyncState::Ended {
            return None;
        }
        self.subscription.next().await
    }

    /// Waits for the next snapshot and applies it. A closed feed is reported
    /// once; after that, and once the session has ended, returns `None`.
    pub async fn next_update(&mut self) -> Option<Vec<UiEffect>> {
        if self.machine.state() == SyncState::Ended {
            return None;
        }
        let event = match self.next_snapshot().await {
            Some(snapshot) => GameEvent::Snapshot(snapshot),
            None => GameEvent::FeedClosed,
        };
        Some(self.handle(event).await)
    }

    /// Applies every snapshot that has already arrived without waiting.
    pub async fn drain_updates(&mut self) -> Vec<UiEffect> {
        let mut effects = Vec::new();
        while self.machine.state() != SyncState::Ended {
            let Some(snapshot) = self.subscription.try_next() else {
                break;
            };
            effects.extend(self.handle(GameEvent::Snapshot(snapshot)).await);
        }
        effects
    }

    pub async fn click_cell(&mut self, index: usize) -> Vec<UiEffect> {
        self.handle(GameEvent::CellClicked(index)).await
    }

    pub async fn reset_round(&mut self) -> Vec<UiEffect> {
        self.handle(GameEvent::ResetRequested).await
    }

    pub async fn leave(&mut self) -> Vec<UiEffect> {
        self.handle(GameEvent::LeaveRequested).await
    }

    /// Runs a local event through the machine and performs its remote
    /// effects. Remote failures come back as notices, never as errors.
    pub async fn handle(&mut self, event: GameEvent) -> Vec<UiEffect> {
        let effects = self.machine.handle(event);
        let mut ui = Vec::new();

        for effect in effects {
            match effect {
                Effect::Ui(ui_effect) => ui.push(ui_effect),
                Effect::Submit {
                    update,
                    precondition,
                } => {
                    if let Err(e) = self
                        .repository
                        .update_match(self.machine.match_id(), &update, precondition)
                        .await
                    {
                        warn!("Update to match {} failed: {}", self.machine.match_id(), e);
                        ui.push(UiEffect::Notify(notice_for(&e)));
                    }
                }
                Effect::ApplyStats { seat, won } => {
                    let player_id = self.machine.player().id.clone();
                    match self
                        .repository
                        .apply_round_stats(self.machine.match_id(), seat, &player_id, won)
                        .await
                    {
                        Ok(true) => info!("Stats updated for {} (won: {})", player_id, won),
                        Ok(false) => debug!("Stats for {} were already applied", player_id),
                        Err(e) => {
                            error!("Failed to update stats for {}: {}", player_id, e);
                            ui.push(UiEffect::Notify(notice_for(&e)));
                        }
                    }
                }
                Effect::Delete => {
                    if let Err(e) = self.repository.delete_match(self.machine.match_id()).await {
                        error!("Error removing match {}: {}", self.machine.match_id(), e);
                        ui.push(UiEffect::Notify(notice_for(&e)));
                    }
                }
            }
        }

        ui
    }
}

fn notice_for(err: &MatchRepositoryError) -> String {
    match err {
        MatchRepositoryError::ConditionFailed => {
            "The board changed before your action was saved. Please try again.".to_string()
        }
        MatchRepositoryError::NotFound => SESSION_ENDED_NOTICE.to_string(),
        other => format!("Could not reach the game server: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::board::{Board, Mark};
    use crate::repositories::in_memory_match_repository::InMemoryMatchRepository;
    use crate::repositories::match_repository::MockMatchRepository;

    fn alice() -> Player {
        Player::new("alice-uid", "Alice")
    }

    fn bob() -> Player {
        Player::new("bob-uid", "Bob")
    }

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

    fn active_match() -> Match {
        let mut m = Match::new("123456", &alice());
        m.player_b = Some(bob());
        m.status = MatchStatus::Active;
        m.revision = 4;
        m
    }

    fn machine_for(player: Player, game_match: &Match) -> GameMachine {
        let mut machine = GameMachine::new(player, &game_match.id, UpdatePolicy::Conditional);
        machine.handle(GameEvent::Snapshot(Snapshot::Present(game_match.clone())));
        machine
    }

    #[test]
    fn test_states_follow_snapshots() {
        let mut machine = GameMachine::new(alice(), "123456", UpdatePolicy::Conditional);
        assert_eq!(machine.state(), SyncState::Loading);

        let waiting = Match::new("123456", &alice());
        machine.handle(GameEvent::Snapshot(Snapshot::Present(waiting)));
        assert_eq!(machine.state(), SyncState::WaitingForOpponent);
        assert_eq!(machine.local_seat(), Some(Seat::A));

        let mut m = active_match();
        machine.handle(GameEvent::Snapshot(Snapshot::Present(m.clone())));
        assert_eq!(machine.state(), SyncState::MyTurn);

        m.turn = Mark::O;
        machine.handle(GameEvent::Snapshot(Snapshot::Present(m)));
        assert_eq!(machine.state(), SyncState::OpponentTurn);
    }

    #[test]
    fn test_every_snapshot_renders() {
        let mut machine = GameMachine::new(bob(), "123456", UpdatePolicy::Conditional);
        let effects = machine.handle(GameEvent::Snapshot(Snapshot::Present(active_match())));

        assert_eq!(effects.len(), 1);
        match &effects[0] {
            Effect::Ui(UiEffect::Render(view)) => {
                assert_eq!(view.status_text, "Opponent's Turn");
                assert_eq!(view.local_mark, Some(Mark::O));
            }
            other => panic!("Expected render, got {:?}", other),
        }
    }

    #[test]
    fn test_winning_move_finishes_round() {
        let mut m = active_match();
        m.board = board("XX_OO____");
        let mut machine = machine_for(alice(), &m);

        let effects = machine.handle(GameEvent::CellClicked(2));

        assert_eq!(
            effects,
            vec![Effect::Submit {
                update: MatchUpdate {
                    board: Some(board("XXXOO____")),
                    turn: Some(Mark::O),
                    status: Some(MatchStatus::Finished),
                    winner: Some(Some(Winner::X)),
                    increment_score: Some(Seat::A),
                    ..Default::default()
                },
                precondition: Precondition::Revision(4),
            }]
        );
    }

    #[test]
    fn test_last_cell_without_line_is_tie() {
        let mut m = active_match();
        m.board = board("XOXXOOOX_");
        let mut machine = machine_for(alice(), &m);

        let effects = machine.handle(GameEvent::CellClicked(8));

        match &effects[..] {
            [Effect::Submit { update, .. }] => {
                assert_eq!(update.status, Some(MatchStatus::Finished));
                assert_eq!(update.winner, Some(Some(Winner::Tie)));
                assert_eq!(update.increment_score, None);
            }
            other => panic!("Expected a single submit, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_clicks_produce_nothing() {
        let mut m = active_match();
        m.board = board("X________");
        m.turn = Mark::O;

        // Not Alice's turn.
        let mut machine = machine_for(alice(), &m);
        assert!(machine.handle(GameEvent::CellClicked(4)).is_empty());

        // Bob clicks a taken cell, then an out-of-range one.
        let mut machine = machine_for(bob(), &m);
        assert!(machine.handle(GameEvent::CellClicked(0)).is_empty());
        assert!(machine.handle(GameEvent::CellClicked(9)).is_empty());

        // Nobody moves while waiting for an opponent.
        let waiting = Match::new("123456", &alice());
        let mut machine = machine_for(alice(), &waiting);
        assert!(machine.handle(GameEvent::CellClicked(0)).is_empty());

        // Outsiders never move.
        let mut machine = machine_for(Player::new("eve-uid", "Eve"), &active_match());
        assert!(machine.handle(GameEvent::CellClicked(0)).is_empty());
    }

    #[test]
    fn test_blind_policy_uses_plain_existence() {
        let m = active_match();
        let mut machine = GameMachine::new(alice(), "123456", UpdatePolicy::Blind);
        machine.handle(GameEvent::Snapshot(Snapshot::Present(m)));

        match &machine.handle(GameEvent::CellClicked(4))[..] {
            [Effect::Submit { precondition, .. }] => {
                assert_eq!(*precondition, Precondition::Exists)
            }
            other => panic!("Expected a single submit, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_only_when_finished() {
        let mut m = active_match();
        let mut machine = GameMachine::new(alice(), "123456", UpdatePolicy::Conditional);
        assert!(machine.handle(GameEvent::ResetRequested).is_empty());

        machine.handle(GameEvent::Snapshot(Snapshot::Present(m.clone())));
        assert_eq!(
            machine.handle(GameEvent::ResetRequested),
            vec![Effect::Ui(UiEffect::Notify(
                RESET_TOO_EARLY_NOTICE.to_string()
            ))]
        );

        m.status = MatchStatus::Finished;
        m.winner = Some(Winner::O);
        m.stats_applied_a = true;
        machine.handle(GameEvent::Snapshot(Snapshot::Present(m)));

        assert_eq!(
            machine.handle(GameEvent::ResetRequested),
            vec![Effect::Submit {
                update: MatchUpdate::reset_round(),
                precondition: Precondition::Revision(4),
            }]
        );
    }

    #[test]
    fn test_finished_snapshot_requests_stats_once_flag_missing() {
        let mut m = active_match();
        m.status = MatchStatus::Finished;
        m.winner = Some(Winner::O);

        let mut machine = GameMachine::new(bob(), "123456", UpdatePolicy::Conditional);
        let effects = machine.handle(GameEvent::Snapshot(Snapshot::Present(m.clone())));
        assert!(matches!(&effects[0], Effect::Ui(UiEffect::Render(_))));
        assert_eq!(
            effects[1],
            Effect::ApplyStats {
                seat: Seat::B,
                won: true
            }
        );

        m.stats_applied_b = true;
        let effects = machine.handle(GameEvent::Snapshot(Snapshot::Present(m)));
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::ApplyStats { .. })));
    }

    #[test]
    fn test_absent_snapshot_ends_session() {
        let mut machine = machine_for(alice(), &active_match());

        let effects = machine.handle(GameEvent::Snapshot(Snapshot::Absent));

        assert_eq!(
            effects,
            vec![
                Effect::Ui(UiEffect::Notify(SESSION_ENDED_NOTICE.to_string())),
                Effect::Ui(UiEffect::ReturnToLobby),
            ]
        );
        assert_eq!(machine.state(), SyncState::Ended);
        assert!(machine.snapshot().is_none());
        assert!(machine.handle(GameEvent::CellClicked(0)).is_empty());
        assert!(machine
            .handle(GameEvent::Snapshot(Snapshot::Present(active_match())))
            .is_empty());
    }

    #[test]
    fn test_leave_requests_delete() {
        let mut machine = machine_for(bob(), &active_match());
        assert_eq!(machine.handle(GameEvent::LeaveRequested), vec![Effect::Delete]);
    }

    #[tokio::test]
    async fn test_enter_rejects_empty_id() {
        let service = GameSessionService::new(
            Arc::new(InMemoryMatchRepository::new()),
            UpdatePolicy::Conditional,
        );
        let result = service.enter(&alice(), "  ").await;
        assert!(matches!(
            result,
            Err(GameSessionServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_submit_becomes_notice() {
        let mut repository = MockMatchRepository::new();
        repository.expect_subscribe().returning(|_| {
            let (sender, subscription) = MatchSubscription::channel();
            sender
                .send(Snapshot::Present(active_match()))
                .unwrap();
            Ok(subscription)
        });
        repository
            .expect_update_match()
            .times(1)
            .returning(|_, _, _| Err(MatchRepositoryError::ConditionFailed));

        let service = GameSessionService::new(Arc::new(repository), UpdatePolicy::Conditional);
        let mut game = service.enter(&alice(), "123456").await.unwrap();
        game.next_update().await.unwrap();

        let effects = game.click_cell(0).await;

        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], UiEffect::Notify(msg) if msg.contains("board changed")));
        assert_eq!(game.state(), SyncState::MyTurn);
    }

    #[tokio::test]
    async fn test_stats_failure_is_not_fatal() {
        let mut finished = active_match();
        finished.status = MatchStatus::Finished;
        finished.winner = Some(Winner::X);

        let mut repository = MockMatchRepository::new();
        repository.expect_subscribe().returning(move |_| {
            let (sender, subscription) = MatchSubscription::channel();
            sender.send(Snapshot::Present(finished.clone())).unwrap();
            Ok(subscription)
        });
        repository
            .expect_apply_round_stats()
            .times(1)
            .returning(|id, seat, player, won| {
                assert_eq!((id, seat, player, won), ("123456", Seat::A, "alice-uid", true));
                Err(MatchRepositoryError::DynamoDb("timeout".to_string()))
            });

        let service = GameSessionService::new(Arc::new(repository), UpdatePolicy::Conditional);
        let mut game = service.enter(&alice(), "123456").await.unwrap();
        let effects = game.next_update().await.unwrap();

        assert!(matches!(&effects[0], UiEffect::Render(view) if view.status_text == "Alice Won!"));
        assert!(
            matches!(&effects[1], UiEffect::Notify(msg) if msg.contains("Could not reach the game server"))
        );
        assert_eq!(game.state(), SyncState::Finished);
    }

    #[tokio::test]
    async fn test_closed_feed_returns_to_lobby_with_notice() {
        let mut repository = MockMatchRepository::new();
        repository.expect_subscribe().returning(|_| {
            let (sender, subscription) = MatchSubscription::channel();
            sender.send(Snapshot::Present(active_match())).unwrap();
            Ok(subscription)
        });

        let service = GameSessionService::new(Arc::new(repository), UpdatePolicy::Conditional);
        let mut game = service.enter(&alice(), "123456").await.unwrap();
        game.next_update().await.unwrap();

        let effects = game.next_update().await.unwrap();

        assert_eq!(
            effects,
            vec![
                UiEffect::Notify(CONNECTION_LOST_NOTICE.to_string()),
                UiEffect::ReturnToLobby,
            ]
        );
        assert_eq!(game.state(), SyncState::Ended);
        assert!(game.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_active_game_unsubscribes() {
        let repository = Arc::new(InMemoryMatchRepository::new());
        repository.create_match(&active_match()).await.unwrap();
        let service = GameSessionService::new(repository.clone(), UpdatePolicy::Conditional);

        let game = service.enter(&alice(), "123456").await.unwrap();
        assert_eq!(repository.subscriber_count("123456").await, 1);

        drop(game);
        assert_eq!(repository.subscriber_count("123456").await, 0);
    }
}
