pub mod board;
pub mod game_match;
pub mod game_view;
pub mod player;
pub mod player_stats;
