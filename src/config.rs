use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub voices: VoiceConfig,
    #[serde(default)]
    pub personas: PersonaConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_deployment")]
    pub deployment: String,
}

fn default_deployment() -> String {
    "gpt-4o".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            deployment: default_deployment(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TtsConfig {
    /// Full synthesis endpoint. When empty, derived from `region`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "eastus".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            region: default_region(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_connection")]
    pub connection: String,
}

fn default_connection() -> String {
    "rap-arena.sqlite".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
        }
    }
}

/// Persona → voice id table with explicit defaults.
///
/// Map values may name a concrete backend voice id, or one of the aliases
/// `default-male` / `default-female`, which resolve to the corresponding
/// default field. Personas absent from the map get `default_male`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoiceConfig {
    #[serde(default)]
    pub map: HashMap<String, String>,
    #[serde(default = "default_male_voice")]
    pub default_male: String,
    #[serde(default = "default_female_voice")]
    pub default_female: String,
}

fn default_male_voice() -> String {
    "en-US-GuyNeural".to_string()
}

fn default_female_voice() -> String {
    "en-US-JennyNeural".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            default_male: default_male_voice(),
            default_female: default_female_voice(),
        }
    }
}

impl VoiceConfig {
    pub fn voice_for(&self, persona: &str) -> &str {
        match self.map.get(persona).map(String::as_str) {
            Some("default-male") | None => &self.default_male,
            Some("default-female") => &self.default_female,
            Some(voice) => voice,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PersonaConfig {
    #[serde(default = "default_seed")]
    pub seed: Vec<String>,
}

fn default_seed() -> Vec<String> {
    [
        "Tupac Shakur",
        "The Notorious B.I.G.",
        "Eminem",
        "Jay-Z",
        "Nas",
        "Lauryn Hill",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

pub fn get_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

pub fn load_config(data_dir: &Path) -> AppConfig {
    let path = get_config_path(data_dir);
    match fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

pub fn save_config(data_dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path(data_dir);
    fs::create_dir_all(data_dir)?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&path, content)?;
    Ok(())
}
