use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::{DEFAULT_MODEL, DEFAULT_VISION_MODEL};
use crate::prompt::{Check, ClassificationRequest, ContentType, ResponseFormat, Sensitivity};
use crate::redaction::{Placeholder, RedactionCategory, RedactionRuleSet};
use crate::verdict::{clamp_threshold, DEFAULT_THRESHOLD};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub general: Option<GeneralConfig>,
    pub detection: Option<DetectionConfig>,
    pub redaction: Option<RedactionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// groq | openrouter | openai
    pub provider: Option<String>,
    pub model: Option<String>,
    pub vision_model: Option<String>,
    /// OpenAI-compatible base URL, e.g. a self-hosted proxy.
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DetectionConfig {
    pub format: Option<ResponseFormat>,
    pub mode: Option<Sensitivity>,
    pub content_type: Option<ContentType>,
    /// Percent, 10-90. SUSPICIOUS at or above this becomes SPAM.
    pub threshold: Option<u8>,
    pub checks: Option<Vec<Check>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RedactionConfig {
    pub ids: Option<bool>,
    pub phones: Option<bool>,
    pub banking: Option<bool>,
    pub passwords: Option<bool>,
    pub names: Option<bool>,
    pub dates: Option<bool>,
    pub placeholder: Option<Placeholder>,
    /// Ask the model first; the regex pass always runs.
    pub use_ai: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    pub format: ResponseFormat,
    pub sensitivity: Sensitivity,
    pub content_type: ContentType,
    pub checks: BTreeSet<Check>,
    pub threshold: u8,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            format: ResponseFormat::default(),
            sensitivity: Sensitivity::default(),
            content_type: ContentType::default(),
            checks: Check::defaults(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl DetectionSettings {
    pub fn request(&self, text: &str) -> ClassificationRequest {
        ClassificationRequest::new(
            text,
            self.format,
            self.content_type,
            self.sensitivity,
            self.checks.clone(),
        )
    }

    pub fn set_threshold(&mut self, threshold: u8) {
        let clamped = clamp_threshold(threshold);
        if clamped != threshold {
            tracing::warn!(threshold, clamped, "threshold out of range, clamped");
        }
        self.threshold = clamped;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedactionSettings {
    pub rules: RedactionRuleSet,
    pub placeholder: Placeholder,
    pub use_ai: bool,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            rules: RedactionRuleSet::all(),
            placeholder: Placeholder::default(),
            use_ai: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    pub provider: Option<String>,
    pub model: String,
    pub vision_model: String,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn load() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read config file");
                return Self::default();
            }
        };

        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                Self::default()
            }
        }
    }

    pub fn detection_settings(&self) -> DetectionSettings {
        let mut settings = DetectionSettings::default();
        let Some(d) = &self.detection else {
            return settings;
        };
        if let Some(format) = d.format {
            settings.format = format;
        }
        if let Some(mode) = d.mode {
            settings.sensitivity = mode;
        }
        if let Some(content_type) = d.content_type {
            settings.content_type = content_type;
        }
        if let Some(checks) = &d.checks {
            settings.checks = checks.iter().copied().collect();
        }
        if let Some(threshold) = d.threshold {
            settings.set_threshold(threshold);
        }
        settings
    }

    pub fn redaction_settings(&self) -> RedactionSettings {
        let mut settings = RedactionSettings::default();
        let Some(r) = &self.redaction else {
            return settings;
        };
        for (category, flag) in [
            (RedactionCategory::Ids, r.ids),
            (RedactionCategory::Phones, r.phones),
            (RedactionCategory::Banking, r.banking),
            (RedactionCategory::Passwords, r.passwords),
            (RedactionCategory::Names, r.names),
            (RedactionCategory::Dates, r.dates),
        ] {
            if let Some(enabled) = flag {
                settings.rules.set(category, enabled);
            }
        }
        if let Some(placeholder) = r.placeholder {
            settings.placeholder = placeholder;
        }
        if let Some(use_ai) = r.use_ai {
            settings.use_ai = use_ai;
        }
        settings
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        let general = self.general.clone().unwrap_or_default();
        GatewaySettings {
            provider: general.provider,
            model: general.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            vision_model: general
                .vision_model
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            base_url: general.base_url,
            timeout: Duration::from_secs(general.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

/// Home for `config.toml` and a user-level `.env`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".textguard"))
}

fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TEXTGUARD_CONFIG") {
        return Some(PathBuf::from(path));
    }
    config_dir().map(|dir| dir.join("config.toml"))
}
