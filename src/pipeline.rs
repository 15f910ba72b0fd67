//! Per-message orchestration: match, gate, substitute, verify.
//!
//! One inbound message flows through here exactly once. Single-domain rules
//! accumulate into one direct reply; every multi-domain rule gets its own
//! fallback session owning its own reply. Nothing in here ever surfaces an
//! error to chat; failures degrade to silence.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chat::{ChatGateway, InboundMessage};
use crate::config::FallbackTuning;
use crate::error::GatewayError;
use crate::fallback::{CandidateReply, FallbackSession};
use crate::rules::RuleRegistry;
use crate::settings::{GuildSettings, SettingsStore};

pub struct MessagePipeline {
    registry: Arc<RuleRegistry>,
    gateway: Arc<dyn ChatGateway>,
    settings: Arc<dyn SettingsStore>,
    tuning: FallbackTuning,
}

impl MessagePipeline {
    pub fn new(
        registry: Arc<RuleRegistry>,
        gateway: Arc<dyn ChatGateway>,
        settings: Arc<dyn SettingsStore>,
        tuning: FallbackTuning,
    ) -> Self {
        Self {
            registry,
            gateway,
            settings,
            tuning,
        }
    }

    /// Process one inbound message to completion. Runs inside its own spawned
    /// task; the observation delays in fallback sessions only suspend this
    /// message, never others.
    pub async fn handle(&self, message: &InboundMessage) {
        // Bots replying to bots is how infinite loops start.
        if message.author_is_bot {
            return;
        }

        // Spoiler bars are structurally special to Discord and would end up
        // glued to extracted URLs, so matching runs on a bar-free copy.
        let stripped = strip_spoiler_bars(&message.content);
        let matches = self.registry.match_message(&stripped);
        if matches.is_empty() {
            return;
        }

        let settings = self.settings_for(message.guild_id.as_deref()).await;
        let spoilered = message.content.contains("||");

        let mut direct = String::new();
        let mut sessions: Vec<(&'static str, Vec<CandidateReply>)> = Vec::new();

        for matched in &matches {
            if !settings.platform_enabled(matched.entry.platform) {
                debug!("{} disabled in this guild, skipping", matched.entry.id);
                continue;
            }

            let rule = &matched.entry.rule;
            if rule.candidate_count() <= 1 {
                direct.push_str(&rule.render(&matched.urls, 0));
                direct.push('\n');
            } else {
                let candidates = (0..rule.candidate_count())
                    .filter_map(|index| {
                        let domain = rule.candidate(index)?;
                        let content =
                            finalize_reply(&rule.render(&matched.urls, index), spoilered);
                        Some(CandidateReply::new(domain, content))
                    })
                    .collect();
                sessions.push((matched.entry.id, candidates));
            }
        }

        let mut replied = false;

        if !direct.is_empty() {
            let reply = finalize_reply(&direct, spoilered);
            match self
                .gateway
                .post_reply(&message.origin, &reply, settings.mention_user_in_reply)
                .await
            {
                Ok(_) => replied = true,
                Err(err) => log_swallowed("reply", &err),
            }
        }

        // Sessions run sequentially within this message; other messages are
        // on their own tasks and interleave freely.
        for (id, candidates) in sessions {
            let session = FallbackSession::new(
                self.gateway.as_ref(),
                &message.origin,
                candidates,
                self.tuning,
                settings.mention_user_in_reply,
            );
            let outcome = session.run().await;
            info!(
                "{id}: fallback finished {:?} after {} attempt(s) on {}",
                outcome.status, outcome.attempts, outcome.domain
            );
            replied = replied || outcome.reply.is_some();
        }

        if replied {
            self.tidy_original(message, &settings).await;
        }
    }

    async fn settings_for(&self, guild_id: Option<&str>) -> GuildSettings {
        match guild_id {
            Some(guild) => match self.settings.fetch(guild).await {
                Ok(settings) => settings,
                Err(err) => {
                    debug!("settings fetch failed for guild {guild}: {err}");
                    GuildSettings::default()
                }
            },
            // DMs have no stored settings; defaults apply.
            None => GuildSettings::default(),
        }
    }

    /// Best-effort cleanup of the original message once a reply exists:
    /// delete it outright when configured, otherwise hide its previews so
    /// only the corrected link renders one.
    async fn tidy_original(&self, message: &InboundMessage, settings: &GuildSettings) {
        if settings.delete_original_message {
            if let Err(err) = self.gateway.delete_message(&message.origin).await {
                log_swallowed("delete original", &err);
            }
        } else if settings.suppress_embeds {
            if let Err(err) = self.gateway.suppress_previews(&message.origin).await {
                log_swallowed("suppress embeds", &err);
            }
        }
    }
}

/// Remove every vertical bar so spoiler delimiters cannot leak into matched
/// URLs. No URL on the supported platforms legitimately contains one.
fn strip_spoiler_bars(content: &str) -> String {
    content.replace('|', "")
}

/// Trim the trailing newline the accumulator leaves behind, and re-wrap in
/// spoiler markup when the original link was spoilered. The space before the
/// closing bars keeps them from merging into the URL.
fn finalize_reply(reply: &str, spoilered: bool) -> String {
    let trimmed = reply.trim_end_matches('\n');
    if spoilered {
        format!("||{trimmed} ||")
    } else {
        trimmed.to_owned()
    }
}

fn log_swallowed(action: &str, err: &GatewayError) {
    match err {
        // Missing permissions is an admin choice, not a fault worth logging.
        GatewayError::PermissionDenied => {}
        other => debug!("{action} failed: {other}"),
    }
}
