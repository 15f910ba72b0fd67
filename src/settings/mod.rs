//! Per-guild settings: which platforms get fixed and how replies behave.

mod store;

pub use store::{GuildSettings, SettingsPatch, SettingsStore, SqliteSettings};
