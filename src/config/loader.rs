use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;

use super::Config;

impl Config {
    /// Load `~/.embedfix/config.toml`, creating the directory and a default
    /// config file on first run.
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let embedfix_dir = home.join(".embedfix");
        let config_path = embedfix_dir.join("config.toml");

        if !embedfix_dir.exists() {
            fs::create_dir_all(&embedfix_dir).context("Failed to create .embedfix directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.data_dir = embedfix_dir;
            Ok(config)
        } else {
            let config = Self {
                config_path: config_path.clone(),
                data_dir: embedfix_dir,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let config = Config {
            config_path: config_path.clone(),
            data_dir: dir.path().to_path_buf(),
            debug: true,
            ..Config::default()
        };
        config.save().unwrap();

        let contents = fs::read_to_string(&config_path).unwrap();
        let reloaded: Config = toml::from_str(&contents).unwrap();
        assert!(reloaded.debug);
        assert_eq!(reloaded.platforms.twitter, config.platforms.twitter);
    }
}
