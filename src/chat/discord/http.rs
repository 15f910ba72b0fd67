use std::{
    collections::HashMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use reqwest::{Method, Response, header::HeaderMap};
use serde_json::json;
use tokio::{sync::Mutex, time::sleep};

use crate::error::GatewayError;

pub const API_BASE: &str = "https://discord.com/api/v10";

/// Message flag hiding all embeds on a message.
pub const SUPPRESS_EMBEDS_FLAG: u64 = 1 << 2;

const MAX_RATE_LIMIT_RETRIES: u8 = 3;

#[derive(Debug, Clone, Copy)]
struct RouteBucket {
    remaining: u32,
    reset_at: f64,
}

/// Thin Discord REST client. Tracks per-route and global rate-limit state so
/// bursts of replies and edits wait instead of tripping 429 loops.
pub struct DiscordHttp {
    client: reqwest::Client,
    bot_token: String,
    api_base: String,
    buckets: Mutex<HashMap<String, RouteBucket>>,
    global_reset_at: Mutex<Option<f64>>,
}

impl DiscordHttp {
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(bot_token, API_BASE)
    }

    /// Construct against an alternate API base. Tests point this at a local
    /// mock server.
    #[must_use]
    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.into(),
            api_base: api_base.into(),
            buckets: Mutex::new(HashMap::new()),
            global_reset_at: Mutex::new(None),
        }
    }

    /// Post a reply to a message and return the created message payload.
    pub async fn send_reply(
        &self,
        channel_id: &str,
        reply_to: &str,
        content: &str,
        mention_author: bool,
    ) -> Result<serde_json::Value, GatewayError> {
        let body = json!({
            "content": content,
            "message_reference": { "message_id": reply_to },
            "allowed_mentions": { "replied_user": mention_author },
        });
        let response = self
            .request(
                Method::POST,
                &format!("/channels/{channel_id}/messages"),
                Some(body),
            )
            .await?;
        parse_json(response).await
    }

    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), GatewayError> {
        self.request(
            Method::PATCH,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            Some(json!({ "content": content })),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        self.request(
            Method::DELETE,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    /// Fetch a single message, embeds included.
    pub async fn get_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<serde_json::Value, GatewayError> {
        let response = self
            .request(
                Method::GET,
                &format!("/channels/{channel_id}/messages/{message_id}"),
                None,
            )
            .await?;
        parse_json(response).await
    }

    /// Set the suppress-embeds flag on a message. Works on other users'
    /// messages when the bot holds Manage Messages.
    pub async fn suppress_embeds(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), GatewayError> {
        self.request(
            Method::PATCH,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            Some(json!({ "flags": SUPPRESS_EMBEDS_FLAG })),
        )
        .await?;
        Ok(())
    }

    pub async fn get_current_user(&self) -> Result<serde_json::Value, GatewayError> {
        let response = self.request(Method::GET, "/users/@me", None).await?;
        parse_json(response).await
    }

    pub async fn get_gateway_bot(&self) -> Result<serde_json::Value, GatewayError> {
        let response = self.request(Method::GET, "/gateway/bot", None).await?;
        parse_json(response).await
    }

    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response_type: u8,
        data: Option<serde_json::Value>,
    ) -> Result<(), GatewayError> {
        let mut body = json!({ "type": response_type });
        if let Some(payload) = data {
            body["data"] = payload;
        }
        self.request(
            Method::POST,
            &format!("/interactions/{interaction_id}/{interaction_token}/callback"),
            Some(body),
        )
        .await?;
        Ok(())
    }

    /// Overwrite the application command set, guild-scoped when `guild_id`
    /// is given (guild commands propagate instantly; global ones take up to
    /// an hour).
    pub async fn register_commands(
        &self,
        application_id: &str,
        guild_id: Option<&str>,
        commands: &[serde_json::Value],
    ) -> Result<(), GatewayError> {
        let path = match guild_id {
            Some(guild) => format!("/applications/{application_id}/guilds/{guild}/commands"),
            None => format!("/applications/{application_id}/commands"),
        };
        self.request(Method::PUT, &path, Some(json!(commands)))
            .await?;
        Ok(())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, GatewayError> {
        let route = route_key(path);
        let url = format!("{}{path}", self.api_base);
        self.reserve_slot(&route).await;

        for attempt in 0..=MAX_RATE_LIMIT_RETRIES {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bot {}", self.bot_token));
            if let Some(payload) = body.clone() {
                builder = builder.json(&payload);
            }

            let response = builder
                .send()
                .await
                .map_err(|err| GatewayError::Connect(err.to_string()))?;

            self.note_rate_limit_headers(&route, response.headers())
                .await;

            let status = response.status().as_u16();

            if status == 429 {
                if attempt == MAX_RATE_LIMIT_RETRIES {
                    return Err(GatewayError::Request {
                        status,
                        message: format!(
                            "{} {path} still rate limited after {MAX_RATE_LIMIT_RETRIES} retries",
                            method.as_str()
                        ),
                    });
                }
                let is_global = is_global_limit(response.headers());
                let retry_after = parse_retry_after(response.headers())
                    .unwrap_or_else(|| Duration::from_secs(1));
                self.back_off(&route, is_global, retry_after).await;
                continue;
            }

            if status == 403 {
                let detail = read_body(response).await;
                tracing::debug!("discord {} {path} denied: {detail}", method.as_str());
                return Err(GatewayError::PermissionDenied);
            }

            if !response.status().is_success() {
                let detail = read_body(response).await;
                return Err(GatewayError::Request {
                    status,
                    message: format!("{} {path}: {detail}", method.as_str()),
                });
            }

            return Ok(response);
        }

        Err(GatewayError::Request {
            status: 429,
            message: format!("{} {path} exhausted rate-limit retries", method.as_str()),
        })
    }

    /// Sleep out any known global or per-route limit before sending.
    async fn reserve_slot(&self, route: &str) {
        let now = now_unix();
        let global_wait = {
            let global = self.global_reset_at.lock().await;
            global.and_then(|reset_at| (reset_at > now).then_some(reset_at - now))
        };
        if let Some(secs) = global_wait {
            sleep(Duration::from_secs_f64(secs)).await;
        }

        let route_wait = {
            let buckets = self.buckets.lock().await;
            buckets.get(route).and_then(|bucket| {
                (bucket.remaining == 0 && bucket.reset_at > now).then(|| bucket.reset_at - now)
            })
        };
        if let Some(secs) = route_wait {
            sleep(Duration::from_secs_f64(secs)).await;
        }
    }

    async fn back_off(&self, route: &str, is_global: bool, retry_after: Duration) {
        let reset_at = now_unix() + retry_after.as_secs_f64();
        if is_global {
            *self.global_reset_at.lock().await = Some(reset_at);
        } else {
            self.buckets.lock().await.insert(
                route.to_owned(),
                RouteBucket {
                    remaining: 0,
                    reset_at,
                },
            );
        }
        sleep(retry_after).await;
    }

    async fn note_rate_limit_headers(&self, route: &str, headers: &HeaderMap) {
        let remaining = parse_header_u32(headers, "X-RateLimit-Remaining");
        let reset_at = parse_header_f64(headers, "X-RateLimit-Reset");
        if let (Some(remaining), Some(reset_at)) = (remaining, reset_at) {
            self.buckets.lock().await.insert(
                route.to_owned(),
                RouteBucket {
                    remaining,
                    reset_at,
                },
            );
        }
    }
}

async fn parse_json(response: Response) -> Result<serde_json::Value, GatewayError> {
    response
        .json()
        .await
        .map_err(|err| GatewayError::Protocol(format!("response body is not JSON: {err}")))
}

async fn read_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|err| format!("<failed to read response body: {err}>"))
}

/// Collapse numeric path segments so all messages in one channel share a
/// rate-limit bucket.
fn route_key(path: &str) -> String {
    let normalized = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if segment.chars().all(|character| character.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("/{normalized}")
}

fn parse_header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn parse_header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = parse_header_f64(headers, "Retry-After")?;
    if seconds <= 0.0 {
        return Some(Duration::ZERO);
    }
    Some(Duration::from_secs_f64(seconds))
}

fn is_global_limit(headers: &HeaderMap) -> bool {
    headers
        .get("X-RateLimit-Global")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_key_collapses_numeric_segments() {
        assert_eq!(
            route_key("/channels/123456789/messages/987654321"),
            "/channels/{id}/messages/{id}"
        );
        assert_eq!(route_key("/gateway/bot"), "/gateway/bot");
    }

    #[test]
    fn retry_after_parses_fractional_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Retry-After",
            reqwest::header::HeaderValue::from_static("2.5"),
        );
        let parsed = parse_retry_after(&headers).unwrap();
        assert_eq!(parsed.as_millis(), 2500);
    }

    #[test]
    fn retry_after_clamps_negative_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Retry-After",
            reqwest::header::HeaderValue::from_static("-1"),
        );
        assert_eq!(parse_retry_after(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn global_limit_header_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-RateLimit-Global",
            reqwest::header::HeaderValue::from_static("True"),
        );
        assert!(is_global_limit(&headers));
    }

    #[tokio::test]
    async fn constructor_starts_with_clean_limit_state() {
        let http = DiscordHttp::new("token");
        assert_eq!(http.api_base, API_BASE);
        assert!(http.buckets.lock().await.is_empty());
        assert!(http.global_reset_at.lock().await.is_none());
    }
}
