//! Chat gateway abstraction and the Discord implementation.
//!
//! The pipeline and fallback engine talk to [`ChatGateway`] only; everything
//! Discord-specific (REST endpoints, the gateway WebSocket, payload shapes)
//! stays in the `discord` module.

pub mod discord;
mod traits;
mod types;

pub use discord::DiscordGateway;
pub use traits::ChatGateway;
pub use types::{InboundEvent, InboundMessage, Interaction, MessageRef};
