use crate::dispatch::command::SYSTEM_COMMANDS;
use crate::intent::Verb;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub channel_dir: Option<PathBuf>,

    #[serde(default = "default_mic_poll_ms")]
    pub mic_poll_ms: u64,

    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,

    #[serde(default = "default_safety_window_secs")]
    pub safety_window_secs: u64,

    #[serde(default = "default_web_host")]
    pub web_host: String,

    #[serde(default = "default_web_port")]
    pub web_port: u16,

    #[serde(default = "default_command_separator")]
    pub command_separator: String,

    #[serde(default)]
    pub word_overrides: HashMap<String, String>,

    #[serde(default = "default_capabilities")]
    pub capabilities: HashMap<String, Vec<String>>,

    #[serde(default = "default_system_controls")]
    pub system_controls: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub image_command: Option<Vec<String>>,
}

fn default_mic_poll_ms() -> u64 {
    100
}

fn default_status_poll_ms() -> u64 {
    1000
}

fn default_safety_window_secs() -> u64 {
    12
}

fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    5000
}

fn default_command_separator() -> String {
    r"\s*(?:[,;]|\band then\b)\s*".to_string()
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn default_capabilities() -> HashMap<String, Vec<String>> {
    HashMap::from([
        ("open".to_string(), argv(&["gtk-launch", "{payload}"])),
        ("close".to_string(), argv(&["pkill", "-i", "-f", "{payload}"])),
        (
            "play".to_string(),
            argv(&["xdg-open", "https://www.youtube.com/results?search_query={payload_url}"]),
        ),
        (
            "google-search".to_string(),
            argv(&["xdg-open", "https://www.google.com/search?q={payload_url}"]),
        ),
        (
            "youtube-search".to_string(),
            argv(&["xdg-open", "https://www.youtube.com/results?search_query={payload_url}"]),
        ),
    ])
}

fn default_system_controls() -> HashMap<String, Vec<String>> {
    const SINK: &str = "@DEFAULT_AUDIO_SINK@";
    HashMap::from([
        ("mute".to_string(), argv(&["wpctl", "set-mute", SINK, "1"])),
        ("unmute".to_string(), argv(&["wpctl", "set-mute", SINK, "0"])),
        ("volume up".to_string(), argv(&["wpctl", "set-volume", SINK, "5%+"])),
        ("volume down".to_string(), argv(&["wpctl", "set-volume", SINK, "5%-"])),
    ])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_dir: None,
            mic_poll_ms: default_mic_poll_ms(),
            status_poll_ms: default_status_poll_ms(),
            safety_window_secs: default_safety_window_secs(),
            web_host: default_web_host(),
            web_port: default_web_port(),
            command_separator: default_command_separator(),
            word_overrides: HashMap::new(),
            capabilities: default_capabilities(),
            system_controls: default_system_controls(),
            image_command: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/jarvis/config.json)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(xdg_dir("XDG_CONFIG_HOME", ".config")?
            .join("jarvis")
            .join("config.json"))
    }

    /// Directory shared by every process for the channel files
    pub fn channel_dir(&self) -> Result<PathBuf> {
        match &self.channel_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(xdg_dir("XDG_DATA_HOME", ".local/share")?
                .join("jarvis")
                .join("channels")),
        }
    }

    pub fn mic_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mic_poll_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }

    pub fn safety_window(&self) -> Duration {
        Duration::from_secs(self.safety_window_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.mic_poll_ms == 0 || self.status_poll_ms == 0 {
            return Err(anyhow::anyhow!("poll intervals must be greater than zero"));
        }

        if self.safety_window_secs == 0 {
            return Err(anyhow::anyhow!("safety_window_secs must be greater than zero"));
        }

        regex::Regex::new(&self.command_separator)
            .with_context(|| format!("invalid command_separator: {:?}", self.command_separator))?;

        for (key, argv) in &self.capabilities {
            let verb: Verb = key
                .parse()
                .with_context(|| format!("invalid capability key {key:?}"))?;
            if !verb.is_dispatchable() {
                return Err(anyhow::anyhow!("capability key {key:?} cannot carry an action"));
            }
            if verb == Verb::System {
                return Err(anyhow::anyhow!(
                    "system commands are configured through system_controls"
                ));
            }
            if argv.is_empty() {
                return Err(anyhow::anyhow!("capability {key:?} has an empty command"));
            }
        }

        for (key, argv) in &self.system_controls {
            if !SYSTEM_COMMANDS.contains(&key.as_str()) {
                return Err(anyhow::anyhow!(
                    "system_controls keys must be one of: {}",
                    SYSTEM_COMMANDS.join(", ")
                ));
            }
            if argv.is_empty() {
                return Err(anyhow::anyhow!("system control {key:?} has an empty command"));
            }
        }

        if self.image_command.as_ref().is_some_and(|argv| argv.is_empty()) {
            return Err(anyhow::anyhow!("image_command cannot be empty"));
        }

        Ok(())
    }
}

fn xdg_dir(var: &str, fallback: &str) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(var) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"web_port": 8080}"#).unwrap();
        assert_eq!(config.web_port, 8080);
        assert_eq!(config.mic_poll_ms, 100);
        assert_eq!(config.safety_window(), Duration::from_secs(12));
        assert!(config.capabilities.contains_key("open"));
        assert_eq!(config.system_controls.len(), 4);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.channel_dir = Some(dir.path().join("channels"));
        config.word_overrides.insert("note pad".into(), "notepad".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.channel_dir().unwrap(), dir.path().join("channels"));
        assert_eq!(loaded.word_overrides["note pad"], "notepad");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.mic_poll_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.command_separator = "(".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.capabilities.insert("teleport".into(), argv(&["true"]));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.capabilities.insert("system".into(), argv(&["true"]));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.system_controls.insert("reboot".into(), argv(&["reboot"]));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.image_command = Some(Vec::new());
        assert!(config.validate().is_err());
    }
}
