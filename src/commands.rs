//! Slash-command definitions and interaction handling.
//!
//! Command payloads are plain JSON in the shape the Discord API expects and
//! are registered wholesale at startup. Interactions are answered with
//! ephemeral text; building that text is pure so it can be tested without a
//! gateway.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::chat::Interaction;
use crate::settings::{GuildSettings, SettingsPatch, SettingsStore};

/// Permission bit required to run `/configure`.
const MANAGE_GUILD: u64 = 1 << 5;

/// Boolean option type in the Discord command schema.
const OPTION_BOOLEAN: u8 = 5;

const TOGGLES: &[(&str, &str)] = &[
    ("fix_twitter", "Rewrite twitter.com and x.com links"),
    ("fix_yt_shorts", "Rewrite YouTube Shorts links"),
    ("fix_instagram", "Rewrite Instagram links"),
    ("fix_tiktok", "Rewrite TikTok links"),
    ("fix_reddit", "Rewrite Reddit links"),
    ("fix_pixiv", "Rewrite pixiv links"),
    ("fix_bsky", "Rewrite Bluesky links"),
    ("suppress_embeds", "Hide previews on the original message"),
    ("delete_original_message", "Delete the original message after replying"),
    ("mention_user_in_reply", "Ping the author when replying"),
];

/// The full command set, in registration order.
#[must_use]
pub fn command_payloads() -> Vec<Value> {
    let configure_options: Vec<Value> = TOGGLES
        .iter()
        .map(|(name, description)| {
            json!({
                "name": name,
                "description": description,
                "type": OPTION_BOOLEAN,
                "required": false,
            })
        })
        .collect();

    vec![
        json!({
            "name": "configure",
            "description": "Configure how embedfix behaves in this server.",
            "options": configure_options,
            "dm_permission": false,
        }),
        json!({
            "name": "invite",
            "description": "Get a link to add embedfix to your server.",
        }),
        json!({
            "name": "help",
            "description": "What embedfix does and how to configure it.",
        }),
        json!({
            "name": "version",
            "description": "Show the running embedfix version.",
        }),
    ]
}

/// Builds ephemeral response text for incoming interactions.
pub struct CommandResponder {
    settings: Arc<dyn SettingsStore>,
    application_id: Option<String>,
}

impl CommandResponder {
    pub fn new(settings: Arc<dyn SettingsStore>, application_id: Option<String>) -> Self {
        Self {
            settings,
            application_id,
        }
    }

    /// Response content for `interaction`. Always produces something to say;
    /// store failures degrade to an apology rather than an error.
    pub async fn respond(&self, interaction: &Interaction) -> String {
        match interaction.command.as_str() {
            "configure" => self.configure(interaction).await,
            "invite" => self.invite(),
            "help" => help_text(),
            "version" => format!("embedfix v{}", env!("CARGO_PKG_VERSION")),
            unknown => {
                debug!("unknown command /{unknown}");
                format!("Unknown command `/{unknown}`.")
            }
        }
    }

    async fn configure(&self, interaction: &Interaction) -> String {
        let Some(guild_id) = interaction.guild_id.as_deref() else {
            return "`/configure` only works inside a server.".to_owned();
        };

        let can_manage = interaction
            .member_permissions
            .is_some_and(|bits| bits & MANAGE_GUILD != 0);
        if !can_manage {
            return "You need the Manage Server permission to configure embedfix.".to_owned();
        }

        let patch = SettingsPatch::from_options(&interaction.options);
        let result = if patch.is_empty() {
            self.settings.fetch(guild_id).await
        } else {
            self.settings.update(guild_id, &patch).await
        };

        match result {
            Ok(settings) => {
                let heading = if patch.is_empty() {
                    "Current settings:"
                } else {
                    "Settings updated:"
                };
                format!("{heading}\n{}", render_settings(&settings))
            }
            Err(err) => {
                debug!("configure failed for guild {guild_id}: {err}");
                "Could not load the settings for this server. Please try again later.".to_owned()
            }
        }
    }

    fn invite(&self) -> String {
        match self.application_id.as_deref() {
            Some(app_id) => format!(
                "Add embedfix to your server:\n\
                 <https://discord.com/oauth2/authorize?client_id={app_id}&scope=bot%20applications.commands&permissions=274877934592>"
            ),
            None => "This instance has no public invite link configured.".to_owned(),
        }
    }
}

fn render_settings(settings: &GuildSettings) -> String {
    let rows = [
        ("fix_twitter", settings.fix_twitter),
        ("fix_yt_shorts", settings.fix_yt_shorts),
        ("fix_instagram", settings.fix_instagram),
        ("fix_tiktok", settings.fix_tiktok),
        ("fix_reddit", settings.fix_reddit),
        ("fix_pixiv", settings.fix_pixiv),
        ("fix_bsky", settings.fix_bsky),
        ("suppress_embeds", settings.suppress_embeds),
        ("delete_original_message", settings.delete_original_message),
        ("mention_user_in_reply", settings.mention_user_in_reply),
    ];
    rows.iter()
        .map(|(name, enabled)| {
            format!("`{name}`: {}", if *enabled { "on" } else { "off" })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn help_text() -> String {
    "I watch for links to supported platforms (Twitter/X, YouTube Shorts, \
     Instagram, TikTok, Reddit, pixiv, Bluesky) and reply with a mirror link \
     whose preview actually renders. Server managers can tune my behavior \
     with `/configure`."
        .to_owned()
}
