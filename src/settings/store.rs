use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::SettingsError;
use crate::rules::Platform;

/// Per-guild toggles. Records are created lazily with these defaults the
/// first time a guild is seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSettings {
    pub suppress_embeds: bool,
    pub delete_original_message: bool,
    pub mention_user_in_reply: bool,
    pub fix_twitter: bool,
    pub fix_yt_shorts: bool,
    pub fix_instagram: bool,
    pub fix_tiktok: bool,
    pub fix_reddit: bool,
    pub fix_pixiv: bool,
    pub fix_bsky: bool,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            suppress_embeds: true,
            delete_original_message: false,
            mention_user_in_reply: false,
            fix_twitter: true,
            fix_yt_shorts: true,
            fix_instagram: true,
            fix_tiktok: true,
            fix_reddit: true,
            fix_pixiv: true,
            fix_bsky: true,
        }
    }
}

impl GuildSettings {
    /// Whether links for `platform` should be rewritten in this guild.
    #[must_use]
    pub fn platform_enabled(&self, platform: Platform) -> bool {
        match platform {
            Platform::Twitter => self.fix_twitter,
            Platform::Youtube => self.fix_yt_shorts,
            Platform::Instagram => self.fix_instagram,
            Platform::Tiktok => self.fix_tiktok,
            Platform::Reddit => self.fix_reddit,
            Platform::Pixiv => self.fix_pixiv,
            Platform::Bsky => self.fix_bsky,
        }
    }

    /// Apply a partial update, returning the merged settings.
    #[must_use]
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            suppress_embeds: patch.suppress_embeds.unwrap_or(self.suppress_embeds),
            delete_original_message: patch
                .delete_original_message
                .unwrap_or(self.delete_original_message),
            mention_user_in_reply: patch
                .mention_user_in_reply
                .unwrap_or(self.mention_user_in_reply),
            fix_twitter: patch.fix_twitter.unwrap_or(self.fix_twitter),
            fix_yt_shorts: patch.fix_yt_shorts.unwrap_or(self.fix_yt_shorts),
            fix_instagram: patch.fix_instagram.unwrap_or(self.fix_instagram),
            fix_tiktok: patch.fix_tiktok.unwrap_or(self.fix_tiktok),
            fix_reddit: patch.fix_reddit.unwrap_or(self.fix_reddit),
            fix_pixiv: patch.fix_pixiv.unwrap_or(self.fix_pixiv),
            fix_bsky: patch.fix_bsky.unwrap_or(self.fix_bsky),
        }
    }
}

/// One `Option<bool>` per toggle; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub suppress_embeds: Option<bool>,
    pub delete_original_message: Option<bool>,
    pub mention_user_in_reply: Option<bool>,
    pub fix_twitter: Option<bool>,
    pub fix_yt_shorts: Option<bool>,
    pub fix_instagram: Option<bool>,
    pub fix_tiktok: Option<bool>,
    pub fix_reddit: Option<bool>,
    pub fix_pixiv: Option<bool>,
    pub fix_bsky: Option<bool>,
}

impl SettingsPatch {
    /// Build a patch from `(name, value)` pairs as delivered by a slash
    /// command. Unknown names are ignored.
    #[must_use]
    pub fn from_options(options: &[(String, bool)]) -> Self {
        let mut patch = Self::default();
        for (name, value) in options {
            let value = Some(*value);
            match name.as_str() {
                "suppress_embeds" => patch.suppress_embeds = value,
                "delete_original_message" => patch.delete_original_message = value,
                "mention_user_in_reply" => patch.mention_user_in_reply = value,
                "fix_twitter" => patch.fix_twitter = value,
                "fix_yt_shorts" => patch.fix_yt_shorts = value,
                "fix_instagram" => patch.fix_instagram = value,
                "fix_tiktok" => patch.fix_tiktok = value,
                "fix_reddit" => patch.fix_reddit = value,
                "fix_pixiv" => patch.fix_pixiv = value,
                "fix_bsky" => patch.fix_bsky = value,
                _ => {}
            }
        }
        patch
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Durable per-guild settings, shared across all message tasks.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Settings for `guild_id`, inserting a default record the first time
    /// the guild is seen.
    async fn fetch(&self, guild_id: &str) -> Result<GuildSettings, SettingsError>;

    /// Apply a partial update and return the resulting settings.
    async fn update(
        &self,
        guild_id: &str,
        patch: &SettingsPatch,
    ) -> Result<GuildSettings, SettingsError>;
}

/// SQLite-backed [`SettingsStore`].
pub struct SqliteSettings {
    pool: SqlitePool,
}

impl SqliteSettings {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self, SettingsError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| SettingsError::Sqlx(err.to_string()))?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .map_err(|err| SettingsError::Sqlx(err.to_string()))?;

        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Numeric row id for the guild, inserting it when missing.
    async fn guild_row_id(&self, guild_id: &str) -> Result<i64, SettingsError> {
        let existing = sqlx::query("SELECT id FROM guilds WHERE native_guild_id = ?")
            .bind(guild_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| SettingsError::Sqlx(err.to_string()))?;

        if let Some(row) = existing {
            return Ok(row.get("id"));
        }

        let inserted = sqlx::query("INSERT INTO guilds (native_guild_id) VALUES (?) RETURNING id")
            .bind(guild_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| SettingsError::Sqlx(err.to_string()))?;
        Ok(inserted.get("id"))
    }

    async fn fetch_by_row_id(&self, guild: i64) -> Result<Option<GuildSettings>, SettingsError> {
        let row = sqlx::query(
            "SELECT suppress_embeds, delete_original_message, mention_user_in_reply,
                    fix_twitter, fix_yt_shorts, fix_instagram, fix_tiktok,
                    fix_reddit, fix_pixiv, fix_bsky
             FROM guild_settings WHERE guild = ?",
        )
        .bind(guild)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| SettingsError::Sqlx(err.to_string()))?;

        Ok(row.as_ref().map(row_to_settings))
    }

    async fn write(&self, guild: i64, settings: &GuildSettings) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO guild_settings (
                guild, suppress_embeds, delete_original_message, mention_user_in_reply,
                fix_twitter, fix_yt_shorts, fix_instagram, fix_tiktok,
                fix_reddit, fix_pixiv, fix_bsky
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(guild) DO UPDATE SET
                suppress_embeds = excluded.suppress_embeds,
                delete_original_message = excluded.delete_original_message,
                mention_user_in_reply = excluded.mention_user_in_reply,
                fix_twitter = excluded.fix_twitter,
                fix_yt_shorts = excluded.fix_yt_shorts,
                fix_instagram = excluded.fix_instagram,
                fix_tiktok = excluded.fix_tiktok,
                fix_reddit = excluded.fix_reddit,
                fix_pixiv = excluded.fix_pixiv,
                fix_bsky = excluded.fix_bsky",
        )
        .bind(guild)
        .bind(settings.suppress_embeds)
        .bind(settings.delete_original_message)
        .bind(settings.mention_user_in_reply)
        .bind(settings.fix_twitter)
        .bind(settings.fix_yt_shorts)
        .bind(settings.fix_instagram)
        .bind(settings.fix_tiktok)
        .bind(settings.fix_reddit)
        .bind(settings.fix_pixiv)
        .bind(settings.fix_bsky)
        .execute(&self.pool)
        .await
        .map_err(|err| SettingsError::Sqlx(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettings {
    async fn fetch(&self, guild_id: &str) -> Result<GuildSettings, SettingsError> {
        let guild = self.guild_row_id(guild_id).await?;
        if let Some(settings) = self.fetch_by_row_id(guild).await? {
            return Ok(settings);
        }

        let defaults = GuildSettings::default();
        self.write(guild, &defaults).await?;
        Ok(defaults)
    }

    async fn update(
        &self,
        guild_id: &str,
        patch: &SettingsPatch,
    ) -> Result<GuildSettings, SettingsError> {
        let guild = self.guild_row_id(guild_id).await?;
        let current = self
            .fetch_by_row_id(guild)
            .await?
            .unwrap_or_default();
        let merged = current.merged(patch);
        self.write(guild, &merged).await?;
        Ok(merged)
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<(), SettingsError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS guilds (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            native_guild_id TEXT NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await
    .map_err(|err| SettingsError::Sqlx(err.to_string()))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS guild_settings (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            guild                   INTEGER NOT NULL UNIQUE REFERENCES guilds(id),
            suppress_embeds         INTEGER NOT NULL DEFAULT 1,
            delete_original_message INTEGER NOT NULL DEFAULT 0,
            mention_user_in_reply   INTEGER NOT NULL DEFAULT 0,
            fix_twitter             INTEGER NOT NULL DEFAULT 1,
            fix_yt_shorts           INTEGER NOT NULL DEFAULT 1,
            fix_instagram           INTEGER NOT NULL DEFAULT 1,
            fix_tiktok              INTEGER NOT NULL DEFAULT 1,
            fix_reddit              INTEGER NOT NULL DEFAULT 1,
            fix_pixiv               INTEGER NOT NULL DEFAULT 1,
            fix_bsky                INTEGER NOT NULL DEFAULT 1
        )",
    )
    .execute(pool)
    .await
    .map_err(|err| SettingsError::Sqlx(err.to_string()))?;

    Ok(())
}

fn row_to_settings(row: &sqlx::sqlite::SqliteRow) -> GuildSettings {
    GuildSettings {
        suppress_embeds: row.get("suppress_embeds"),
        delete_original_message: row.get("delete_original_message"),
        mention_user_in_reply: row.get("mention_user_in_reply"),
        fix_twitter: row.get("fix_twitter"),
        fix_yt_shorts: row.get("fix_yt_shorts"),
        fix_instagram: row.get("fix_instagram"),
        fix_tiktok: row.get("fix_tiktok"),
        fix_reddit: row.get("fix_reddit"),
        fix_pixiv: row.get("fix_pixiv"),
        fix_bsky: row.get("fix_bsky"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_all_fixes_without_deleting() {
        let defaults = GuildSettings::default();
        assert!(defaults.suppress_embeds);
        assert!(!defaults.delete_original_message);
        assert!(!defaults.mention_user_in_reply);
        for platform in [
            Platform::Twitter,
            Platform::Youtube,
            Platform::Instagram,
            Platform::Tiktok,
            Platform::Reddit,
            Platform::Pixiv,
            Platform::Bsky,
        ] {
            assert!(defaults.platform_enabled(platform), "{platform} default");
        }
    }

    #[test]
    fn merged_applies_only_set_fields() {
        let patch = SettingsPatch {
            fix_twitter: Some(false),
            delete_original_message: Some(true),
            ..SettingsPatch::default()
        };
        let merged = GuildSettings::default().merged(&patch);
        assert!(!merged.fix_twitter);
        assert!(merged.delete_original_message);
        assert!(merged.fix_reddit, "untouched field keeps its value");
        assert!(merged.suppress_embeds);
    }

    #[test]
    fn patch_from_options_ignores_unknown_names() {
        let patch = SettingsPatch::from_options(&[
            ("fix_tiktok".to_owned(), false),
            ("not_a_setting".to_owned(), true),
        ]);
        assert_eq!(patch.fix_tiktok, Some(false));
        assert_eq!(
            patch,
            SettingsPatch {
                fix_tiktok: Some(false),
                ..SettingsPatch::default()
            }
        );
    }

    #[test]
    fn empty_patch_is_detectable() {
        assert!(SettingsPatch::default().is_empty());
        assert!(!SettingsPatch::from_options(&[("fix_bsky".to_owned(), true)]).is_empty());
    }
}
