use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::processing::pipeline::AnalysisConfig;
use crate::state::theme::Theme;

pub const VERSION: &str = "0.1.0";

/// Settings that survive between sessions. The current analysis result is
/// held by the application, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub theme: Theme,
    pub config: AnalysisConfig,
    /// Column analysed last; preselected when a file with the same column
    /// is imported.
    pub last_column: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            config: AnalysisConfig::default(),
            last_column: None,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;
        std::fs::write(path, json)?;
        tracing::info!("Settings saved to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let state: AppState =
            serde_json::from_str(&json).map_err(|e| AnalysisError::Parse(format!("Invalid settings file: {e}")))?;
        state.config.validate()?;
        tracing::info!("Settings loaded from {:?}", path);
        Ok(state)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
