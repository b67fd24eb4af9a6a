use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{LatchError, LatchResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LatchConfig {
    /// Prompt shown while entering a passcode.
    pub instructions: String,
    /// Prompt shown while confirming a new passcode.
    pub confirm_instructions: String,
    /// Delay between a correct entry and the granted callback, so the
    /// filled bubbles are visible before the screen goes away.
    pub grant_delay_ms: u64,
    /// How long the error style stays up after a rejected entry.
    pub feedback_reset_ms: u64,
    /// File name of the passcode list inside the data directory.
    pub storage_file: String,
    /// Number of passcodes kept in the file, current one included.
    pub history_limit: usize,
}

impl Default for LatchConfig {
    fn default() -> Self {
        Self {
            instructions: "Enter Passcode".to_string(),
            confirm_instructions: "Confirm Passcode".to_string(),
            grant_delay_ms: 200,
            feedback_reset_ms: 200,
            storage_file: "latch.json".to_string(),
            history_limit: 5,
        }
    }
}

impl LatchConfig {
    pub fn grant_delay(&self) -> Duration {
        Duration::from_millis(self.grant_delay_ms)
    }

    pub fn feedback_reset_delay(&self) -> Duration {
        Duration::from_millis(self.feedback_reset_ms)
    }

    pub fn validate(&self) -> LatchResult<()> {
        if self.history_limit == 0 {
            return Err(LatchError::Config(
                "historyLimit must keep at least the current passcode".into(),
            ));
        }
        if self.storage_file.trim().is_empty() {
            return Err(LatchError::Config("storageFile must not be empty".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> LatchResult<LatchConfig> {
    if !path.exists() {
        return Ok(LatchConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: LatchConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &LatchConfig) -> LatchResult<()> {
    config.validate()?;
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
