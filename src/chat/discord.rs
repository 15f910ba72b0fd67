use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::error::GatewayError;

use self::http::DiscordHttp;

use super::traits::ChatGateway;
use super::types::{InboundEvent, InboundMessage, Interaction, MessageRef};

pub mod http;

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = 33281;

/// Interaction callback type: respond with a message immediately.
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

/// Message flag making an interaction response visible to the caller only.
const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Discord implementation of [`ChatGateway`]: REST for everything outbound,
/// the gateway WebSocket for inbound events.
pub struct DiscordGateway {
    http: DiscordHttp,
    bot_token: String,
}

impl DiscordGateway {
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        let bot_token = bot_token.into();
        Self {
            http: DiscordHttp::new(bot_token.clone()),
            bot_token,
        }
    }

    /// Construct against an alternate REST base URL. Tests point this at a
    /// local mock server; the WebSocket listener is not affected.
    #[must_use]
    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let bot_token = bot_token.into();
        Self {
            http: DiscordHttp::with_api_base(bot_token.clone(), api_base),
            bot_token,
        }
    }

    /// Overwrite the registered slash-command set.
    pub async fn register_commands(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        commands: &[serde_json::Value],
    ) -> Result<(), GatewayError> {
        self.http
            .register_commands(application_id, guild_id, commands)
            .await
    }

    /// Answer an interaction with an ephemeral message.
    pub async fn respond_ephemeral(
        &self,
        interaction: &Interaction,
        content: &str,
    ) -> Result<(), GatewayError> {
        self.http
            .create_interaction_response(
                &interaction.id,
                &interaction.token,
                CHANNEL_MESSAGE_WITH_SOURCE,
                Some(json!({ "content": content, "flags": EPHEMERAL_FLAG })),
            )
            .await
    }

    /// Login check. Returns the bot's username when the token is valid.
    pub async fn current_user_name(&self) -> Result<String, GatewayError> {
        let user = self.http.get_current_user().await?;
        Ok(user
            .get("username")
            .and_then(|name| name.as_str())
            .unwrap_or("<unknown>")
            .to_owned())
    }

    /// Connect to the gateway and deliver events until the connection drops
    /// or `tx` closes. The caller owns reconnection policy.
    pub async fn listen(
        &self,
        tx: tokio::sync::mpsc::Sender<InboundEvent>,
    ) -> Result<(), GatewayError> {
        let gateway_info = self.http.get_gateway_bot().await?;
        let gateway_url = gateway_info
            .get("url")
            .and_then(|url| url.as_str())
            .unwrap_or("wss://gateway.discord.gg");

        let ws_url = format!("{gateway_url}/?v=10&encoding=json");
        tracing::info!("discord: connecting to gateway");

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|err| GatewayError::Connect(format!("gateway websocket: {err}")))?;
        let (mut write, mut read) = ws_stream.split();

        // Hello (op 10) carries the heartbeat interval.
        let hello = read
            .next()
            .await
            .ok_or_else(|| GatewayError::Protocol("gateway closed before hello".into()))?
            .map_err(|err| GatewayError::Connect(format!("read hello: {err}")))?;
        let hello_data: serde_json::Value = serde_json::from_str(&hello.to_string())
            .map_err(|err| GatewayError::Protocol(format!("parse hello: {err}")))?;
        let heartbeat_interval = hello_data
            .get("d")
            .and_then(|d| d.get("heartbeat_interval"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(41_250);

        let identify = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": "linux",
                    "browser": "embedfix",
                    "device": "embedfix"
                }
            }
        });
        write
            .send(Message::Text(identify.to_string().into()))
            .await
            .map_err(|err| GatewayError::Connect(format!("send identify: {err}")))?;

        tracing::info!("discord: connected and identified");

        // Last dispatch sequence, echoed in heartbeats. Only touched inside
        // the select! loop, so a plain i64 suffices.
        let mut sequence: i64 = -1;

        // The timer task only ticks; the heartbeat payload is assembled in
        // the select! loop where `sequence` lives.
        let (hb_tx, mut hb_rx) = tokio::sync::mpsc::channel::<()>(1);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(heartbeat_interval));
            loop {
                interval.tick().await;
                if hb_tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                _ = hb_rx.recv() => {
                    let d = if sequence >= 0 { json!(sequence) } else { json!(null) };
                    let heartbeat = json!({ "op": 1, "d": d });
                    if write.send(Message::Text(heartbeat.to_string().into())).await.is_err() {
                        break;
                    }
                }
                frame = read.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => break,
                        _ => continue,
                    };

                    let event: serde_json::Value = match serde_json::from_str(&text) {
                        Ok(event) => event,
                        Err(_) => continue,
                    };

                    if let Some(s) = event.get("s").and_then(serde_json::Value::as_i64) {
                        sequence = s;
                    }

                    let op = event.get("op").and_then(serde_json::Value::as_u64).unwrap_or(0);
                    match op {
                        // Immediate heartbeat request
                        1 => {
                            let d = if sequence >= 0 { json!(sequence) } else { json!(null) };
                            let heartbeat = json!({ "op": 1, "d": d });
                            if write.send(Message::Text(heartbeat.to_string().into())).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        7 => {
                            tracing::warn!("discord: received Reconnect (op 7), closing for restart");
                            break;
                        }
                        9 => {
                            tracing::warn!("discord: received Invalid Session (op 9), closing for restart");
                            break;
                        }
                        _ => {}
                    }

                    let event_type = event.get("t").and_then(|t| t.as_str()).unwrap_or("");
                    let Some(d) = event.get("d") else {
                        continue;
                    };

                    let inbound = match event_type {
                        "MESSAGE_CREATE" => parse_message(d).map(InboundEvent::Message),
                        "INTERACTION_CREATE" => parse_interaction(d).map(InboundEvent::Interaction),
                        _ => None,
                    };

                    if let Some(inbound) = inbound
                        && tx.send(inbound).await.is_err()
                    {
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

fn parse_message(d: &serde_json::Value) -> Option<InboundMessage> {
    let channel_id = d.get("channel_id").and_then(|c| c.as_str())?;
    let message_id = d.get("id").and_then(|i| i.as_str())?;
    let content = d.get("content").and_then(|c| c.as_str()).unwrap_or("");
    let author_is_bot = d
        .get("author")
        .and_then(|author| author.get("bot"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    let guild_id = d
        .get("guild_id")
        .and_then(|g| g.as_str())
        .map(str::to_owned);

    Some(InboundMessage {
        origin: MessageRef::new(channel_id, message_id),
        guild_id,
        author_is_bot,
        content: content.to_owned(),
    })
}

fn parse_interaction(d: &serde_json::Value) -> Option<Interaction> {
    // Type 2 is APPLICATION_COMMAND; everything else (pings, components) is
    // not ours to answer.
    if d.get("type").and_then(serde_json::Value::as_u64) != Some(2) {
        return None;
    }

    let id = d.get("id").and_then(|i| i.as_str())?.to_owned();
    let token = d.get("token").and_then(|t| t.as_str())?.to_owned();
    let data = d.get("data")?;
    let command = data.get("name").and_then(|n| n.as_str())?.to_owned();

    let options = data
        .get("options")
        .and_then(serde_json::Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|option| {
                    let name = option.get("name").and_then(|n| n.as_str())?.to_owned();
                    let value = option.get("value").and_then(serde_json::Value::as_bool)?;
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default();

    let guild_id = d
        .get("guild_id")
        .and_then(|g| g.as_str())
        .map(str::to_owned);
    let member_permissions = d
        .get("member")
        .and_then(|member| member.get("permissions"))
        .and_then(|p| p.as_str())
        .and_then(|p| p.parse().ok());

    Some(Interaction {
        id,
        token,
        guild_id,
        command,
        options,
        member_permissions,
    })
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    fn name(&self) -> &str {
        "discord"
    }

    async fn post_reply(
        &self,
        origin: &MessageRef,
        content: &str,
        mention: bool,
    ) -> Result<MessageRef, GatewayError> {
        let created = self
            .http
            .send_reply(&origin.channel_id, &origin.message_id, content, mention)
            .await?;
        let message_id = created
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| GatewayError::Protocol("created message has no id".into()))?;
        Ok(MessageRef::new(origin.channel_id.clone(), message_id))
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        content: &str,
    ) -> Result<(), GatewayError> {
        self.http
            .edit_message(&message.channel_id, &message.message_id, content)
            .await
    }

    async fn has_preview(&self, message: &MessageRef) -> Result<bool, GatewayError> {
        let fetched = self
            .http
            .get_message(&message.channel_id, &message.message_id)
            .await?;
        Ok(fetched
            .get("embeds")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|embeds| !embeds.is_empty()))
    }

    async fn suppress_previews(&self, message: &MessageRef) -> Result<(), GatewayError> {
        self.http
            .suppress_embeds(&message.channel_id, &message.message_id)
            .await
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), GatewayError> {
        self.http
            .delete_message(&message.channel_id, &message.message_id)
            .await
    }
}
