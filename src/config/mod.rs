//! Process configuration: the TOML file under `~/.embedfix/`, environment
//! overrides, and the tunables consumed by the registry and the fallback
//! engine.

mod env_overrides;
mod loader;
mod schema;

pub use schema::{Config, DiscordConfig, FallbackTuning, PlatformsConfig};
