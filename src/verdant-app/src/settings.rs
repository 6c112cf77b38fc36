//! Persisted application settings.
//!
//! One `config.toml` in the platform config directory holds the theme, the
//! streaming toggle, the selected model and the sampling parameters. Load
//! never fails: a missing file yields defaults and an unparsable one is
//! reported and replaced by defaults. Mutations write the file before the
//! in-memory value is updated.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use verdant_engine::SamplingParameters;

use crate::error::{AppError, Result};

/// Color theme applied by the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Midnight,
    Cyberpunk,
    Forest,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Midnight => "midnight",
            Self::Cyberpunk => "cyberpunk",
            Self::Forest => "forest",
        }
    }
}

/// Named sampling presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Creative,
    Balanced,
    Precise,
    Coding,
}

impl Preset {
    /// Parse a preset name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "creative" => Some(Self::Creative),
            "balanced" => Some(Self::Balanced),
            "precise" => Some(Self::Precise),
            "coding" => Some(Self::Coding),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Creative => "creative",
            Self::Balanced => "balanced",
            Self::Precise => "precise",
            Self::Coding => "coding",
        }
    }

    /// Apply the preset's sampling values, leaving the system prompt alone.
    pub fn apply(&self, params: &mut SamplingParameters) {
        let (temperature, max_tokens, top_p, top_k, repeat_penalty) = match self {
            Self::Creative => (1.2, 4096, 0.95, 80, 1.0),
            Self::Balanced => (0.7, 2048, 0.9, 40, 1.1),
            Self::Precise => (0.3, 2048, 0.7, 20, 1.2),
            Self::Coding => (0.2, 4096, 0.8, 30, 1.15),
        };
        params.temperature = temperature;
        params.max_tokens = max_tokens;
        params.top_p = top_p;
        params.top_k = top_k;
        params.repeat_penalty = repeat_penalty;
    }
}

/// Persisted, process-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    /// Whether completions use the streaming branch.
    pub streaming: bool,
    /// Selected model id, surviving restarts.
    pub selected_model: Option<String>,
    pub parameters: SamplingParameters,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            streaming: true,
            selected_model: None,
            parameters: SamplingParameters::default(),
        }
    }
}

/// Hook run against freshly loaded settings, before the store is handed out.
/// The view layer registers theme application here.
pub type PostLoadHook = fn(&Settings);

/// Built-in post-load hook: report the active theme for the front end.
pub fn apply_theme(settings: &Settings) {
    debug!(theme = settings.theme.as_str(), "Applying theme");
}

/// Settings store with an explicit load/save contract.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unparsable settings file, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        };
        Self { path, settings }
    }

    /// Load settings and run the given post-load hooks against them.
    pub fn load_with_hooks(path: impl Into<PathBuf>, hooks: &[PostLoadHook]) -> Self {
        let store = Self::load(path);
        for hook in hooks {
            hook(&store.settings);
        }
        store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Mutate settings, persisting before the in-memory value changes.
    pub fn update<F: FnOnce(&mut Settings)>(&mut self, mutate: F) -> Result<()> {
        let mut next = self.settings.clone();
        mutate(&mut next);
        self.write(&next)?;
        self.settings = next;
        Ok(())
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.update(|s| s.theme = theme)
    }

    pub fn toggle_streaming(&mut self) -> Result<bool> {
        self.update(|s| s.streaming = !s.streaming)?;
        Ok(self.settings.streaming)
    }

    pub fn set_selected_model(&mut self, model: Option<String>) -> Result<()> {
        self.update(|s| s.selected_model = model)
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        let prompt = prompt.into();
        self.update(|s| s.parameters.system_prompt = prompt)
    }

    pub fn apply_preset(&mut self, preset: Preset) -> Result<()> {
        self.update(|s| preset.apply(&mut s.parameters))
    }

    /// Reset sampling values to the balanced preset.
    pub fn reset_parameters(&mut self) -> Result<()> {
        self.apply_preset(Preset::Balanced)
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        let raw = toml::to_string_pretty(settings).map_err(|e| AppError::Config(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw)?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
