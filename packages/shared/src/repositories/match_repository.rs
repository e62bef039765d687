use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    AttributeValue, ReturnValuesOnConditionCheckFailure, TransactWriteItem, Update,
};
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::models::game_match::{Match, MatchStatus, MatchUpdate, Precondition, Seat, Snapshot};
use crate::models::player_stats::PlayerStats;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;
use crate::repositories::subscription::MatchSubscription;

#[cfg(test)]
use mockall::automock;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Remote document store holding match records and per-player statistics.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, MatchRepositoryError>;

    /// Fails with `AlreadyExists` when the id is taken.
    async fn create_match(&self, game_match: &Match) -> Result<(), MatchRepositoryError>;

    /// Merges `update` into the stored match and bumps its revision.
    async fn update_match(
        &self,
        match_id: &str,
        update: &MatchUpdate,
        precondition: Precondition,
    ) -> Result<(), MatchRepositoryError>;

    /// Deleting a match that is already gone is not an error.
    async fn delete_match(&self, match_id: &str) -> Result<(), MatchRepositoryError>;

    /// Delivers the current state immediately, then every committed change,
    /// then `Snapshot::Absent` once the match is deleted.
    async fn subscribe(&self, match_id: &str) -> Result<MatchSubscription, MatchRepositoryError>;

    /// Atomically sets the seat's stats flag and credits the player's lifetime
    /// counters. Returns `false` without writing anything when the flag is
    /// already set or the round is no longer finished.
    async fn apply_round_stats(
        &self,
        match_id: &str,
        seat: Seat,
        player_id: &str,
        won: bool,
    ) -> Result<bool, MatchRepositoryError>;

    async fn get_player_stats(&self, player_id: &str) -> Result<PlayerStats, MatchRepositoryError>;
}

#[derive(Clone)]
pub struct DynamoDbMatchRepository {
    pub client: Client,
    pub matches_table: String,
    pub users_table: String,
    pub poll_interval: Duration,
}

impl DynamoDbMatchRepository {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            matches_table: config.matches_table.clone(),
            users_table: config.users_table.clone(),
            poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    fn match_key(match_id: &str) -> AttributeValue {
        AttributeValue::S(match_id.to_string())
    }
}

/// DynamoDB update expression assembled from a `MatchUpdate`.
#[derive(Debug, Default)]
struct UpdateExpression {
    set: Vec<String>,
    remove: Vec<String>,
    add: Vec<String>,
    conditions: Vec<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl UpdateExpression {
    fn from_update(
        update: &MatchUpdate,
        precondition: Precondition,
    ) -> Result<Self, MatchRepositoryError> {
        let mut expr = UpdateExpression::default();

        if let Some(board) = &update.board {
            expr.set_value("board", attribute(board)?);
        }
        if let Some(turn) = &update.turn {
            expr.set_value("turn", attribute(turn)?);
        }
        if let Some(status) = &update.status {
            expr.set_value("status", attribute(status)?);
        }
        match &update.winner {
            Some(Some(winner)) => expr.set_value("winner", attribute(winner)?),
            Some(None) => expr.remove_field("winner"),
            None => {}
        }
        if let Some(player) = &update.player_b {
            expr.set_value("player_b", attribute(player)?);
        }
        match update.increment_score {
            Some(Seat::A) => expr.add_one("score_a"),
            Some(Seat::B) => expr.add_one("score_b"),
            None => {}
        }
        if update.reset_stats_flags {
            expr.set_value("stats_applied_a", AttributeValue::Bool(false));
            expr.set_value("stats_applied_b", AttributeValue::Bool(false));
        }
        expr.add_one("revision");

        expr.conditions.push("attribute_exists(id)".to_string());
        match precondition {
            Precondition::Exists => {}
            Precondition::Revision(expected) => {
                expr.name("revision");
                expr.values.insert(
                    ":expected_revision".to_string(),
                    AttributeValue::N(expected.to_string()),
                );
                expr.conditions
                    .push("#revision = :expected_revision".to_string());
            }
            Precondition::OpenSeat => {
                expr.name("player_b");
                expr.name("status");
                expr.values.insert(
                    ":waiting".to_string(),
                    attribute(&MatchStatus::Waiting)?,
                );
                expr.conditions
                    .push("attribute_not_exists(#player_b) AND #status = :waiting".to_string());
            }
        }

        Ok(expr)
    }

    fn name(&mut self, field: &str) -> String {
        let placeholder = format!("#{}", field);
        self.names.insert(placeholder.clone(), field.to_string());
        placeholder
    }

    fn set_value(&mut self, field: &str, value: AttributeValue) {
        let name = self.name(field);
        let placeholder = format!(":{}", field);
        self.set.push(format!("{} = {}", name, placeholder));
        self.values.insert(placeholder, value);
    }

    fn remove_field(&mut self, field: &str) {
        let name = self.name(field);
        self.remove.push(name);
    }

    fn add_one(&mut self, field: &str) {
        let name = self.name(field);
        self.values
            .insert(":one".to_string(), AttributeValue::N("1".to_string()));
        self.add.push(format!("{} :one", name));
    }

    fn expression(&self) -> String {
        let mut clauses = Vec::new();
        if !self.set.is_empty() {
            clauses.push(format!("SET {}", self.set.join(", ")));
        }
        if !self.remove.is_empty() {
            clauses.push(format!("REMOVE {}", self.remove.join(", ")));
        }
        if !self.add.is_empty() {
            clauses.push(format!("ADD {}", self.add.join(", ")));
        }
        clauses.join(" ")
    }

    fn condition(&self) -> String {
        self.conditions.join(" AND ")
    }
}

fn attribute<T: serde::Serialize>(value: &T) -> Result<AttributeValue, MatchRepositoryError> {
    to_attribute_value(value).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))
}

fn stats_flag(seat: Seat) -> &'static str {
    match seat {
        Seat::A => "stats_applied_a",
        Seat::B => "stats_applied_b",
    }
}

#[async_trait]
impl MatchRepository for DynamoDbMatchRepository {
    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, MatchRepositoryError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.matches_table)
            .key("id", Self::match_key(match_id))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            let game_match: Match = from_item(item)
                .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;
            Ok(Some(game_match))
        } else {
            Ok(None)
        }
    }

    async fn create_match(&self, game_match: &Match) -> Result<(), MatchRepositoryError> {
        let item = to_item(game_match)
            .map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        let result = self
            .client
            .put_item()
            .table_name(&self.matches_table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => {
                    Err(MatchRepositoryError::AlreadyExists)
                }
                other => Err(MatchRepositoryError::DynamoDb(other.to_string())),
            },
        }
    }

    async fn update_match(
        &self,
        match_id: &str,
        update: &MatchUpdate,
        precondition: Precondition,
    ) -> Result<(), MatchRepositoryError> {
        let expr = UpdateExpression::from_update(update, precondition)?;
        debug!("Updating match {}: {}", match_id, expr.expression());

        let result = self
            .client
            .update_item()
            .table_name(&self.matches_table)
            .key("id", Self::match_key(match_id))
            .update_expression(expr.expression())
            .condition_expression(expr.condition())
            .set_expression_attribute_names(Some(expr.names.clone()))
            .set_expression_attribute_values(Some(expr.values.clone()))
            .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.into_service_error() {
                // The old item only comes back when the record exists, which
                // separates a stale revision from a deleted match.
                UpdateItemError::ConditionalCheckFailedException(failure) => {
                    if failure.item().is_some() {
                        Err(MatchRepositoryError::ConditionFailed)
                    } else {
                        Err(MatchRepositoryError::NotFound)
                    }
                }
                other => Err(MatchRepositoryError::DynamoDb(other.to_string())),
            },
        }
    }

    async fn delete_match(&self, match_id: &str) -> Result<(), MatchRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.matches_table)
            .key("id", Self::match_key(match_id))
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self, match_id: &str) -> Result<MatchSubscription, MatchRepositoryError> {
        // DynamoDB has no change listener for clients, so the feed polls and
        // forwards a snapshot whenever the revision (or existence) changes.
        let (sender, receiver) = mpsc::unbounded_channel();
        let repository = self.clone();
        let match_id = match_id.to_string();

        let listener = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(repository.poll_interval);
            let mut last_seen: Option<Option<u64>> = None;

            loop {
                ticker.tick().await;
                let current = match repository.get_match(&match_id).await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!("Polling match {} failed: {}", match_id, e);
                        continue;
                    }
                };

                let marker = current.as_ref().map(|m| m.revision);
                if last_seen == Some(marker) {
                    continue;
                }
                last_seen = Some(marker);

                let deleted = current.is_none();
                if sender.send(Snapshot::from(current)).is_err() || deleted {
                    debug!("Snapshot feed for match {} closed", match_id);
                    break;
                }
            }
        });

        Ok(MatchSubscription::with_listener(receiver, listener))
    }

    async fn apply_round_stats(
        &self,
        match_id: &str,
        seat: Seat,
        player_id: &str,
        won: bool,
    ) -> Result<bool, MatchRepositoryError> {
        let flag_update = Update::builder()
            .table_name(&self.matches_table)
            .key("id", Self::match_key(match_id))
            .update_expression("SET #flag = :applied ADD #revision :one")
            .condition_expression("#status = :finished AND #flag = :not_applied")
            .expression_attribute_names("#flag", stats_flag(seat))
            .expression_attribute_names("#status", "status")
            .expression_attribute_names("#revision", "revision")
            .expression_attribute_values(":applied", AttributeValue::Bool(true))
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":not_applied", AttributeValue::Bool(false))
            .expression_attribute_values(":finished", attribute(&MatchStatus::Finished)?)
            .build()
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        let stats_update = Update::builder()
            .table_name(&self.users_table)
            .key("player_id", AttributeValue::S(player_id.to_string()))
            .update_expression("ADD games_played :one, games_won :won")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(
                ":won",
                AttributeValue::N(if won { "1" } else { "0" }.to_string()),
            )
            .build()
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().update(flag_update).build())
            .transact_items(TransactWriteItem::builder().update(stats_update).build())
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match e.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(cancelled)
                    if cancelled
                        .cancellation_reasons()
                        .iter()
                        .any(|reason| reason.code() == Some("ConditionalCheckFailed")) =>
                {
                    debug!(
                        "Stats for seat {:?} in match {} already applied",
                        seat, match_id
                    );
                    Ok(false)
                }
                other => Err(MatchRepositoryError::DynamoDb(other.to_string())),
            },
        }
    }

    async fn get_player_stats(&self, player_id: &str) -> Result<PlayerStats, MatchRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.users_table)
            .key("player_id", AttributeValue::S(player_id.to_string()))
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                from_item(item).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))
            }
            None => Ok(PlayerStats::new(player_id)),
        }
    }
}
