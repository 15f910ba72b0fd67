/// Address of one message on the chat platform. The pair is all the REST API
/// needs to edit, fetch, or delete it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// A chat message as delivered by the gateway listener.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: MessageRef,
    pub guild_id: Option<String>,
    pub author_is_bot: bool,
    pub content: String,
}

/// A slash-command invocation as delivered by the gateway listener.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub guild_id: Option<String>,
    pub command: String,
    /// Boolean options supplied by the caller, in invocation order.
    pub options: Vec<(String, bool)>,
    /// Resolved permission bitset of the invoking member, when in a guild.
    pub member_permissions: Option<u64>,
}

/// Everything the listener can surface to the application loop.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(InboundMessage),
    Interaction(Interaction),
}
