use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::game_match::MatchStatus;
use crate::models::player::Player;
use crate::services::errors::session_service_errors::SessionError;

/// Per-sign-in state owned by the UI shell.
///
/// Holds the authenticated player and the match they are currently viewing.
/// Navigation away from a waiting or active match is refused.
#[derive(Debug)]
pub struct SessionContext {
    session_id: Uuid,
    player: Player,
    started_at: DateTime<Utc>,
    current_match: Option<String>,
    match_status: Option<MatchStatus>,
}

impl SessionContext {
    pub fn sign_in(player: Player) -> Self {
        let context = SessionContext {
            session_id: Uuid::new_v4(),
            player,
            started_at: Utc::now(),
            current_match: None,
            match_status: None,
        };
        info!(
            "Session {} started for {}",
            context.session_id, context.player.id
        );
        context
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn current_match(&self) -> Option<&str> {
        self.current_match.as_deref()
    }

    pub fn enter_match(&mut self, match_id: &str) -> Result<(), SessionError> {
        match &self.current_match {
            Some(current) if current == match_id => Ok(()),
            Some(current) if self.is_game_active() => {
                Err(SessionError::AlreadyInGame(current.clone()))
            }
            _ => {
                debug!("Session {} entered {}", self.session_id, match_id);
                self.current_match = Some(match_id.to_string());
                self.match_status = None;
                Ok(())
            }
        }
    }

    /// Records the status from the latest snapshot of the current match.
    pub fn observe_status(&mut self, status: Option<MatchStatus>) {
        self.match_status = status;
        if status.is_none() {
            self.current_match = None;
        }
    }

    pub fn leave_match(&mut self) {
        if let Some(id) = self.current_match.take() {
            debug!("Session {} left {}", self.session_id, id);
        }
        self.match_status = None;
    }

    pub fn is_game_active(&self) -> bool {
        matches!(
            self.match_status,
            Some(MatchStatus::Waiting) | Some(MatchStatus::Active)
        )
    }

    pub fn ensure_can_navigate(&self) -> Result<(), SessionError> {
        if self.is_game_active() {
            return Err(SessionError::GameInProgress);
        }
        Ok(())
    }

    /// Ends the session. While a game is in progress the context is handed
    /// back along with the refusal.
    pub fn sign_out(self) -> Result<Player, (Self, SessionError)> {
        if let Err(e) = self.ensure_can_navigate() {
            return Err((self, e));
        }
        info!("Session {} signed out", self.session_id);
        Ok(self.player)
    }
}
