use std::sync::Arc;

use shared::config::AppConfig;
use shared::models::player::Player;
use shared::repositories::match_repository::{DynamoDbMatchRepository, MatchRepository};
use shared::services::game_session_service::{GameEvent, GameSessionService, SyncState};
use shared::services::lobby_service::LobbyService;
use shared::services::session_service::SessionContext;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use crate::render;

type Input = Lines<BufReader<Stdin>>;

pub async fn run(config: &AppConfig, player: Player) -> anyhow::Result<()> {
    let aws_config = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&aws_config);
    let repository: Arc<dyn MatchRepository + Send + Sync> =
        Arc::new(DynamoDbMatchRepository::new(client, config));

    let lobby = LobbyService::new(repository.clone());
    let sessions = GameSessionService::new(repository.clone(), config.update_policy);
    let mut session = SessionContext::sign_in(player);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!();
        println!("Lobby: `create`, `join <game id>`, `stats` or `quit`");
        let Some(line) = input.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();

        let game_match = match (words.next(), words.next()) {
            (Some("create"), _) => lobby.create_match(session.player()).await,
            (Some("join"), Some(id)) => lobby.join_match(session.player(), id).await,
            (Some("join"), None) => {
                println!("! Please enter a Game ID");
                continue;
            }
            (Some("stats"), _) => {
                match repository.get_player_stats(&session.player().id).await {
                    Ok(stats) => println!(
                        "Games played: {}, games won: {}",
                        stats.games_played, stats.games_won
                    ),
                    Err(e) => println!("! Could not load stats: {}", e),
                }
                continue;
            }
            (Some("quit"), _) => break,
            (None, _) => continue,
            (Some(other), _) => {
                println!("! Unknown command `{}`", other);
                continue;
            }
        };

        match game_match {
            Ok(game_match) => play(&sessions, &mut session, &game_match.id, &mut input).await?,
            Err(e) => println!("! {}", e),
        }
    }

    match session.sign_out() {
        Ok(player) => info!("Goodbye, {}", player.id),
        Err((_, e)) => warn!("Signed out with a game still open: {}", e),
    }
    Ok(())
}

async fn play(
    sessions: &GameSessionService,
    session: &mut SessionContext,
    match_id: &str,
    input: &mut Input,
) -> anyhow::Result<()> {
    session.enter_match(match_id)?;
    let mut game = sessions.enter(session.player(), match_id).await?;

    loop {
        let back_to_lobby = tokio::select! {
            snapshot = game.next_snapshot() => {
                let event = match snapshot {
                    Some(snapshot) => GameEvent::Snapshot(snapshot),
                    None if game.state() == SyncState::Ended => break,
                    None => GameEvent::FeedClosed,
                };
                let effects = game.handle(event).await;
                session.observe_status(game.current_match().map(|m| m.status));
                render::apply(effects)
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let effects = match line.trim() {
                    "" => continue,
                    "reset" => game.reset_round().await,
                    "leave" => game.leave().await,
                    "lobby" => match session.ensure_can_navigate() {
                        Ok(()) => break,
                        Err(e) => {
                            println!("! {}", e);
                            continue;
                        }
                    },
                    command => match command.parse::<usize>() {
                        Ok(index) => game.click_cell(index).await,
                        Err(_) => {
                            println!("! Enter a cell 0-8, `reset`, `leave` or `lobby`");
                            continue;
                        }
                    },
                };
                render::apply(effects)
            }
        };
        if back_to_lobby {
            break;
        }
    }

    session.leave_match();
    Ok(())
}
