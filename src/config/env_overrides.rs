use std::fs;

use super::Config;

impl Config {
    /// Apply environment overrides on top of the loaded file. Called once at
    /// startup, before anything reads the config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("DISCORD_BOT_TOKEN")
            && !token.is_empty()
        {
            self.discord.bot_token = token;
        } else if let Ok(path) = std::env::var("DISCORD_BOT_TOKEN_FILE")
            && !path.is_empty()
        {
            // Secret-file indirection, the usual container-secret shape.
            let expanded = shellexpand::tilde(&path);
            match fs::read_to_string(expanded.as_ref()) {
                Ok(contents) => self.discord.bot_token = contents.trim().to_owned(),
                Err(err) => {
                    tracing::warn!("could not read DISCORD_BOT_TOKEN_FILE {path}: {err}");
                }
            }
        }

        if let Ok(app_id) = std::env::var("DISCORD_APPLICATION_ID")
            && !app_id.is_empty()
        {
            self.discord.application_id = Some(app_id);
        }

        if let Ok(guild_id) = std::env::var("DISCORD_GUILD_ID")
            && !guild_id.is_empty()
        {
            self.discord.guild_id = Some(guild_id);
        }

        if let Ok(debug) = std::env::var("EMBEDFIX_DEBUG") {
            self.debug = debug != "0" && !debug.is_empty();
        }

        for (name, slot) in [
            ("TWITTER_FIX_URL", &mut self.platforms.twitter),
            ("YOUTUBE_FIX_URL", &mut self.platforms.youtube),
            ("INSTAGRAM_FIX_URL", &mut self.platforms.instagram),
            ("TIKTOK_FIX_URL", &mut self.platforms.tiktok),
            ("REDDIT_FIX_URL", &mut self.platforms.reddit),
            ("PIXIV_FIX_URL", &mut self.platforms.pixiv),
            ("BSKY_FIX_URL", &mut self.platforms.bsky),
        ] {
            if let Ok(domains) = std::env::var(name) {
                // An explicitly empty variable disables the platform.
                *slot = if domains.is_empty() {
                    None
                } else {
                    Some(domains)
                };
            }
        }

        if let Ok(retries) = std::env::var("EMBEDFIX_MAX_RETRIES")
            && let Ok(retries) = retries.parse()
        {
            self.fallback.max_retries = retries;
        }
    }
}
