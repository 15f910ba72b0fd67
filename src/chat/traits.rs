use async_trait::async_trait;

use crate::error::GatewayError;

use super::types::MessageRef;

/// Outbound surface of a chat platform, as needed by the rewrite pipeline and
/// the fallback engine. Implementations must be shareable across the spawned
/// per-message tasks.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Human-readable gateway name for logs.
    fn name(&self) -> &str;

    /// Post `content` as a reply to `origin`. `mention` controls whether the
    /// replied-to user is pinged. Returns the address of the new message so
    /// later attempts can edit it.
    async fn post_reply(
        &self,
        origin: &MessageRef,
        content: &str,
        mention: bool,
    ) -> Result<MessageRef, GatewayError>;

    /// Replace the content of an existing message authored by the bot.
    async fn edit_message(&self, message: &MessageRef, content: &str)
    -> Result<(), GatewayError>;

    /// Re-fetch `message` and report whether the platform has attached a link
    /// preview to it yet.
    async fn has_preview(&self, message: &MessageRef) -> Result<bool, GatewayError>;

    /// Hide the link previews of `message` (typically the original user
    /// message, so only the bot's reply renders one).
    async fn suppress_previews(&self, message: &MessageRef) -> Result<(), GatewayError>;

    /// Delete `message`.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), GatewayError>;
}
