pub mod computer_game_service;
pub mod errors;
pub mod game_session_service;
pub mod lobby_service;
pub mod minimax_service;
pub mod session_service;
