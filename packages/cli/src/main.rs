use clap::{Parser, Subcommand};
use shared::config::AppConfig;
use shared::models::player::Player;

mod computer;
mod online;
mod render;

#[derive(Parser)]
#[command(name = "tictactoe")]
#[command(about = "Tic-tac-toe against a friend online or against the computer", long_about = None)]
struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or join a match shared through DynamoDB
    Online {
        /// Identity of the signed-in player
        #[arg(long)]
        user_id: String,

        /// Name shown to the opponent
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Play offline against the minimax computer
    Computer,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Online { user_id, name } => {
            if user_id.trim().is_empty() {
                anyhow::bail!("--user-id cannot be empty");
            }
            online::run(&config, Player::new(user_id.trim(), name.trim())).await
        }
        Commands::Computer => computer::run(&config).await,
    }
}
