//! SQLite settings store against throwaway databases.

use tempfile::TempDir;

use embedfix::settings::{GuildSettings, SettingsPatch, SettingsStore, SqliteSettings};

async fn open_store(dir: &TempDir) -> SqliteSettings {
    SqliteSettings::open(&dir.path().join("settings.db"))
        .await
        .expect("open settings db")
}

#[tokio::test]
async fn first_fetch_inserts_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let settings = store.fetch("643644919751376899").await.unwrap();
    assert_eq!(settings, GuildSettings::default());

    // Second fetch reads the stored record instead of re-inserting.
    let again = store.fetch("643644919751376899").await.unwrap();
    assert_eq!(again, settings);
}

#[tokio::test]
async fn update_applies_partial_patch() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let patch = SettingsPatch {
        fix_twitter: Some(false),
        mention_user_in_reply: Some(true),
        ..SettingsPatch::default()
    };
    let updated = store.update("99", &patch).await.unwrap();

    assert!(!updated.fix_twitter);
    assert!(updated.mention_user_in_reply);
    assert!(updated.fix_reddit, "unpatched fields keep defaults");

    let fetched = store.fetch("99").await.unwrap();
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn update_on_unseen_guild_starts_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let patch = SettingsPatch {
        delete_original_message: Some(true),
        ..SettingsPatch::default()
    };
    let updated = store.update("new-guild", &patch).await.unwrap();
    assert!(updated.delete_original_message);
    assert!(updated.suppress_embeds);
}

#[tokio::test]
async fn settings_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = open_store(&dir).await;
        let patch = SettingsPatch {
            fix_bsky: Some(false),
            ..SettingsPatch::default()
        };
        store.update("77", &patch).await.unwrap();
    }

    let reopened = open_store(&dir).await;
    let settings = reopened.fetch("77").await.unwrap();
    assert!(!settings.fix_bsky);
}

#[tokio::test]
async fn guilds_are_isolated_from_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let patch = SettingsPatch {
        fix_instagram: Some(false),
        ..SettingsPatch::default()
    };
    store.update("alpha", &patch).await.unwrap();

    let other = store.fetch("beta").await.unwrap();
    assert!(other.fix_instagram);
}

#[tokio::test]
async fn empty_patch_leaves_settings_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir).await;

    let before = store.fetch("55").await.unwrap();
    let after = store.update("55", &SettingsPatch::default()).await.unwrap();
    assert_eq!(before, after);
}
