use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use embedfix::cli::{Cli, Command};
use embedfix::{Config, app};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_init()?;
    config.apply_env_overrides();

    let level = if config.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => app::run(config).await,
        Command::Doctor => app::doctor(&config).await,
        Command::ConfigPath => {
            println!("{}", config.config_path.display());
            Ok(())
        }
    }
}
