use shared::models::game_view::GameView;
use shared::services::computer_game_service::ComputerGame;
use shared::services::game_session_service::UiEffect;

/// Prints the UI effects of one update. Returns true when the shell should
/// go back to the lobby.
pub fn apply(effects: Vec<UiEffect>) -> bool {
    let mut back_to_lobby = false;
    for effect in effects {
        match effect {
            UiEffect::Render(view) => game_view(&view),
            UiEffect::Notify(message) => println!("! {}", message),
            UiEffect::ReturnToLobby => back_to_lobby = true,
        }
    }
    back_to_lobby
}

pub fn game_view(view: &GameView) {
    println!();
    println!("{}", view);

    let mut controls = vec!["0-8 to play"];
    if view.can_reset {
        controls.push("`reset` for a new round");
    }
    if view.can_delete {
        controls.push("`leave` to end the game");
    }
    println!("[{}]", controls.join(", "));
}

pub fn computer_game(game: &ComputerGame) {
    println!();
    println!("{}", game.board());
    match game.announcement() {
        Some(text) => {
            println!("{}", text);
            println!("[`reset` to play again, `quit` to exit]");
        }
        None => println!("{}", game.turn_text()),
    }
}
