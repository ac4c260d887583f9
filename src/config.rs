use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Configuration {
    pub authentication: Authentication,
    pub discord: Discord,
    pub commands: Commands,
}
impl Configuration {
    const FILENAME: &str = "config.toml";
    const TOKEN_ENV: &str = "DISCORD_TOKEN";

    pub fn load() -> anyhow::Result<Self> {
        let config: Self = if let Ok(file) = std::fs::read_to_string(Self::FILENAME) {
            toml::from_str(&file).context("failed to load config")?
        } else {
            Self::default()
        };
        config.save()?;

        anyhow::ensure!(
            !config.discord.prefix.trim().is_empty(),
            "discord.prefix must not be empty"
        );
        if config.discord.owners.is_empty() {
            tracing::warn!("discord.owners is empty; control commands will refuse everyone");
        }

        Ok(config)
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(std::fs::write(
            Self::FILENAME,
            toml::to_string_pretty(self)?,
        )?)
    }

    /// The bot token, preferring the config file over the environment.
    pub fn discord_token(&self) -> Option<String> {
        self.authentication
            .discord_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(Self::TOKEN_ENV).ok())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Authentication {
    pub discord_token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Discord {
    /// Prefix that marks a message as a text command
    pub prefix: String,
    /// User IDs allowed to use the control commands
    pub owners: Vec<u64>,
}

impl Default for Discord {
    fn default() -> Self {
        Self {
            prefix: "::".to_string(),
            owners: vec![],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Commands {
    /// Directory whose subdirectories are the command units
    pub root: PathBuf,
    /// Unit that hosts the control commands; it can never be unloaded
    pub control_unit: String,
    /// How long shutdown/restart wait after acknowledging
    pub ack_delay_ms: u64,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            root: PathBuf::from("commands"),
            control_unit: "ctl".to_string(),
            ack_delay_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Configuration = toml::from_str(
            r#"
[discord]
owners = [1234]
"#,
        )
        .unwrap();

        assert_eq!(config.discord.prefix, "::");
        assert_eq!(config.discord.owners, vec![1234]);
        assert_eq!(config.commands.root, PathBuf::from("commands"));
        assert_eq!(config.commands.control_unit, "ctl");
        assert!(config.authentication.discord_token.is_none());
    }

    #[test]
    fn defaults_survive_a_save_round() {
        let text = toml::to_string_pretty(&Configuration::default()).unwrap();
        let config: Configuration = toml::from_str(&text).unwrap();
        assert_eq!(config.commands.ack_delay_ms, 500);
    }
}
