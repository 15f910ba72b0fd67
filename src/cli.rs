use clap::{Parser, Subcommand};

/// embedfix — replies to platform links with embed-friendly mirrors.
#[derive(Parser, Debug)]
#[command(name = "embedfix")]
#[command(version)]
#[command(about = "Discord bot that rewrites platform links to embed-friendly mirrors.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to Discord and start rewriting links (the default)
    Run,

    /// Check configuration, credentials, and the active rule set
    Doctor,

    /// Print the path of the active config file
    ConfigPath,
}
