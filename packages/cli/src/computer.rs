use shared::config::AppConfig;
use shared::services::computer_game_service::ComputerGame;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::render;

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let mut game = ComputerGame::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        render::computer_game(&game);

        if game.is_computer_turn() {
            tokio::time::sleep(config.computer_move_delay).await;
            if let Some(index) = game.play_computer() {
                debug!("Computer played {}", index);
            }
            continue;
        }

        let Some(line) = input.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "quit" => break,
            "reset" => game.reset(),
            command => match command.parse::<usize>() {
                Ok(index) => {
                    if let Err(e) = game.play_human(index) {
                        println!("! {}", e);
                    }
                }
                Err(_) => println!("! Enter a cell 0-8, `reset` or `quit`"),
            },
        }
    }
    Ok(())
}
