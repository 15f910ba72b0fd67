//! Process wiring and the supervised gateway loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::chat::{ChatGateway, DiscordGateway, InboundEvent};
use crate::commands::{CommandResponder, command_payloads};
use crate::config::Config;
use crate::pipeline::MessagePipeline;
use crate::rules::RuleRegistry;
use crate::settings::{SettingsStore, SqliteSettings};

const RECONNECT_CAP: Duration = Duration::from_secs(60);

/// Build everything from config and run until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    if config.discord.bot_token.is_empty() {
        bail!(
            "no bot token configured; set DISCORD_BOT_TOKEN or [discord].bot_token in {}",
            config.config_path.display()
        );
    }

    let registry = Arc::new(
        RuleRegistry::from_config(&config.platforms).context("building rule registry")?,
    );
    if registry.is_empty() {
        warn!("no platforms configured; the bot will connect but never reply");
    } else {
        info!("{} rewrite rule(s) active", registry.entries().len());
    }

    let store = Arc::new(
        SqliteSettings::open(&config.data_dir.join("settings.db"))
            .await
            .context("opening settings database")?,
    );

    let gateway = Arc::new(DiscordGateway::new(&config.discord.bot_token));

    let username = gateway
        .current_user_name()
        .await
        .context("login check failed; is the bot token valid?")?;
    info!("logged in as {username}");

    if let Some(application_id) = config.discord.application_id.as_deref() {
        gateway
            .register_commands(
                application_id,
                config.discord.guild_id.as_deref(),
                &command_payloads(),
            )
            .await
            .context("registering slash commands")?;
        info!("slash commands registered");
    } else {
        info!("no application id configured, skipping command registration");
    }

    let pipeline = Arc::new(MessagePipeline::new(
        registry,
        Arc::clone(&gateway) as Arc<dyn ChatGateway>,
        Arc::clone(&store) as Arc<dyn SettingsStore>,
        config.fallback,
    ));
    let responder = Arc::new(CommandResponder::new(
        store,
        config.discord.application_id.clone(),
    ));

    let mut backoff = Duration::from_secs(1);
    loop {
        tokio::select! {
            () = shutdown_signal() => {
                info!("shutting down");
                return Ok(());
            }
            result = serve_connection(&gateway, &pipeline, &responder) => {
                match result {
                    Ok(()) => backoff = Duration::from_secs(1),
                    Err(err) => error!("gateway connection failed: {err}"),
                }
                warn!("disconnected, reconnecting in {backoff:?}");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RECONNECT_CAP);
            }
        }
    }
}

/// One gateway connection: listen, and fan events out to per-message tasks.
async fn serve_connection(
    gateway: &Arc<DiscordGateway>,
    pipeline: &Arc<MessagePipeline>,
    responder: &Arc<CommandResponder>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<InboundEvent>(64);

    let listener = {
        let gateway = Arc::clone(gateway);
        tokio::spawn(async move { gateway.listen(tx).await })
    };

    while let Some(event) = rx.recv().await {
        match event {
            InboundEvent::Message(message) => {
                let pipeline = Arc::clone(pipeline);
                tokio::spawn(async move {
                    pipeline.handle(&message).await;
                });
            }
            InboundEvent::Interaction(interaction) => {
                let gateway = Arc::clone(gateway);
                let responder = Arc::clone(responder);
                tokio::spawn(async move {
                    let content = responder.respond(&interaction).await;
                    if let Err(err) = gateway.respond_ephemeral(&interaction, &content).await {
                        warn!("interaction response failed: {err}");
                    }
                });
            }
        }
    }

    listener
        .await
        .context("gateway listener panicked")?
        .map_err(Into::into)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("could not listen for shutdown signal: {err}");
        // Without a signal handler the loop would spin forever on a
        // completed future; park instead.
        std::future::pending::<()>().await;
    }
}

/// Offline-first diagnostics for `embedfix doctor`.
pub async fn doctor(config: &Config) -> Result<()> {
    println!("config file: {}", config.config_path.display());
    println!("data dir:    {}", config.data_dir.display());

    match RuleRegistry::from_config(&config.platforms) {
        Ok(registry) if registry.is_empty() => {
            println!("rules:       none configured (the bot would never reply)");
        }
        Ok(registry) => {
            println!("rules:       {} active", registry.entries().len());
            for entry in registry.entries() {
                println!("  - {}", entry.id);
            }
        }
        Err(err) => println!("rules:       FAILED to build ({err})"),
    }

    if config.discord.bot_token.is_empty() {
        println!("token:       missing (set DISCORD_BOT_TOKEN)");
        return Ok(());
    }

    let gateway = DiscordGateway::new(&config.discord.bot_token);
    match gateway.current_user_name().await {
        Ok(username) => println!("token:       valid, logged in as {username}"),
        Err(err) => println!("token:       INVALID ({err})"),
    }

    Ok(())
}
