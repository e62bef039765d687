pub mod computer_game_errors;
pub mod game_session_service_errors;
pub mod lobby_service_errors;
pub mod session_service_errors;
