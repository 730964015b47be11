//! Configuration for the proctoring agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the proctoring agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Thresholds used by the detectors
    pub detection: DetectionConfig,

    /// Where the transport listens
    pub server: ServerSettings,

    /// Base URL of the recording backend that stores events
    pub recorder_url: String,

    /// Path for storing the audit log
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctor-agent");

        Self {
            detection: DetectionConfig::default(),
            server: ServerSettings::default(),
            recorder_url: "http://localhost:3001".to_string(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.detection.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proctor-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the persisted audit counters.
    pub fn audit_path(&self) -> PathBuf {
        self.data_path.join("audit.json")
    }
}

/// Thresholds and timeouts for the detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// How long the candidate may look away before `focus_lost` fires
    #[serde(with = "duration_serde")]
    pub focus_timeout: Duration,

    /// How long the face may be absent before `face_missing` fires
    #[serde(with = "duration_serde")]
    pub face_timeout: Duration,

    /// Minimum spacing between two events of the same kind in a session
    #[serde(with = "duration_serde")]
    pub event_cooldown: Duration,

    /// Eye aspect ratio below which a frame counts as "eyes closed"
    pub eye_ratio_threshold: f64,

    /// Consecutive low-ratio frames needed to declare drowsiness
    pub eye_ratio_confirm_frames: u32,

    /// Maximum horizontal nose-tip deviation from screen center
    pub focus_horizontal_threshold: f64,

    /// Maximum vertical nose-tip deviation from screen center
    pub focus_vertical_threshold: f64,

    /// Object labels that raise `suspicious_object`
    pub watch_list: WatchList,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            focus_timeout: Duration::from_secs(7),
            face_timeout: Duration::from_secs(10),
            event_cooldown: Duration::from_secs(3),
            eye_ratio_threshold: 0.18,
            eye_ratio_confirm_frames: 2,
            focus_horizontal_threshold: 0.35,
            focus_vertical_threshold: 0.2,
            watch_list: WatchList::default(),
        }
    }
}

impl DetectionConfig {
    /// Reject thresholds the detectors cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eye_ratio_confirm_frames == 0 {
            return Err(ConfigError::Invalid(
                "eye_ratio_confirm_frames must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.focus_horizontal_threshold)
            || !(0.0..=1.0).contains(&self.focus_vertical_threshold)
        {
            return Err(ConfigError::Invalid(
                "focus thresholds must lie within [0, 1]".to_string(),
            ));
        }
        if self.eye_ratio_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "eye_ratio_threshold must be positive".to_string(),
            ));
        }
        for entry in &self.watch_list.entries {
            if !(0.0..=1.0).contains(&entry.min_confidence) {
                return Err(ConfigError::Invalid(format!(
                    "confidence bar for '{}' must lie within [0, 1]",
                    entry.label
                )));
            }
        }
        Ok(())
    }

    pub fn focus_timeout(&self) -> chrono::Duration {
        to_chrono(self.focus_timeout)
    }

    pub fn face_timeout(&self) -> chrono::Duration {
        to_chrono(self.face_timeout)
    }

    pub fn event_cooldown(&self) -> chrono::Duration {
        to_chrono(self.event_cooldown)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(duration.as_millis().min(i64::MAX as u128) as i64)
}

/// A watched object label with its own confidence bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedLabel {
    /// Detector class name, e.g. `cell phone`
    pub label: String,
    /// Detections must score strictly above this to count
    pub min_confidence: f64,
    /// Human readable name used in messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl WatchedLabel {
    fn new(label: &str, min_confidence: f64, display_name: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            min_confidence,
            display_name: display_name.map(str::to_string),
        }
    }
}

/// The set of prohibited object classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchList {
    pub entries: Vec<WatchedLabel>,
}

impl Default for WatchList {
    fn default() -> Self {
        Self {
            entries: vec![
                WatchedLabel::new("cell phone", 0.3, Some("Mobile Phone")),
                WatchedLabel::new("book", 0.2, Some("Book/Notes")),
                WatchedLabel::new("laptop", 0.2, Some("Laptop/Computer")),
                WatchedLabel::new("mouse", 0.3, Some("Computer Mouse")),
                WatchedLabel::new("keyboard", 0.3, Some("Keyboard")),
                WatchedLabel::new("remote", 0.3, None),
            ],
        }
    }
}

impl WatchList {
    /// Look up a watched label.
    pub fn get(&self, label: &str) -> Option<&WatchedLabel> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    /// Human readable name for a label, title-casing unknown ones.
    pub fn display_name(&self, label: &str) -> String {
        self.get(label)
            .and_then(|entry| entry.display_name.clone())
            .unwrap_or_else(|| title_case(label))
    }
}

fn title_case(label: &str) -> String {
    label
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Listening address for the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub port: u16,
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
