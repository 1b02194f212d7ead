use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::language::Language;

pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_PAGE_PATH: &str = "static/voice-bot.html";
pub const DEFAULT_QWEN_API_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";
pub const DEFAULT_QWEN_MODEL: &str = "qwen-max";
pub const DEFAULT_MINIMAX_BASE_URL: &str = "https://api.minimax.io";
pub const DEFAULT_VOICE_ID: &str = "Cantonese_WiselProfessor";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const VOICE_VARS: [(Language, &str); 4] = [
    (Language::Cantonese, "MINIMAX_VOICE_ID_CANTONESE"),
    (Language::English, "MINIMAX_VOICE_ID_ENGLISH"),
    (Language::Mandarin, "MINIMAX_VOICE_ID_MANDARIN"),
    (Language::Japanese, "MINIMAX_VOICE_ID_JAPANESE"),
];

/// Process configuration, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub page_path: PathBuf,
    pub qwen_api_url: String,
    pub qwen_model: String,
    pub minimax_base_url: String,
    pub upstream_timeout: Duration,
    pub voices: VoiceDefaults,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceDefaults {
    pub cantonese: String,
    pub english: String,
    pub mandarin: String,
    pub japanese: String,
}

/// Presence of the server-side credentials, logged at startup.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub alicloud_api_key: bool,
    pub minimax_group_id: bool,
    pub minimax_api_key_len: Option<usize>,
    pub voices_configured: Vec<(&'static str, bool)>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match var("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidTimeout(raw.clone()))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let voice = |language: Language| {
            VOICE_VARS
                .iter()
                .find(|(l, _)| *l == language)
                .and_then(|(_, key)| var(*key))
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string())
        };

        let voices = VoiceDefaults {
            cantonese: voice(Language::Cantonese),
            english: voice(Language::English),
            mandarin: voice(Language::Mandarin),
            japanese: voice(Language::Japanese),
        };

        let diagnostics = Diagnostics {
            alicloud_api_key: var("ALICLOUD_API_KEY").is_some(),
            minimax_group_id: var("MINIMAX_GROUP_ID").is_some(),
            minimax_api_key_len: var("MINIMAX_API_KEY").map(|key| key.len()),
            voices_configured: VOICE_VARS
                .iter()
                .map(|(_, key)| (*key, var(*key).is_some()))
                .collect(),
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            page_path: var("PAGE_PATH")
                .unwrap_or_else(|| DEFAULT_PAGE_PATH.to_string())
                .into(),
            qwen_api_url: var("QWEN_API_URL").unwrap_or_else(|| DEFAULT_QWEN_API_URL.to_string()),
            qwen_model: var("QWEN_MODEL").unwrap_or_else(|| DEFAULT_QWEN_MODEL.to_string()),
            minimax_base_url: var("MINIMAX_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MINIMAX_BASE_URL.to_string()),
            upstream_timeout: Duration::from_secs(timeout_secs),
            voices,
            diagnostics,
        })
    }

    pub fn log_summary(&self) {
        let yes_no = |present: bool| if present { "Yes" } else { "No" };
        let d = &self.diagnostics;

        tracing::info!("ALICLOUD_API_KEY configured: {}", yes_no(d.alicloud_api_key));
        tracing::info!("MINIMAX_GROUP_ID configured: {}", yes_no(d.minimax_group_id));
        match d.minimax_api_key_len {
            Some(len) => tracing::info!("MINIMAX_API_KEY configured: Yes (length: {})", len),
            None => tracing::info!("MINIMAX_API_KEY configured: No"),
        }
        for (key, present) in &d.voices_configured {
            tracing::info!("{} configured: {}", key, yes_no(*present));
        }
        tracing::info!("Chat upstream: {} ({})", self.qwen_api_url, self.qwen_model);
        tracing::info!("Speech upstream: {}", self.minimax_base_url);
        tracing::info!("Upstream timeout: {}s", self.upstream_timeout.as_secs());
    }
}

impl VoiceDefaults {
    pub fn for_language(&self, language: Language) -> &str {
        match language {
            Language::Cantonese => &self.cantonese,
            Language::English => &self.english,
            Language::Mandarin => &self.mandarin,
            Language::Japanese => &self.japanese,
        }
    }

    /// An explicit voice wins when it is non-empty after trimming.
    pub fn select<'a>(&'a self, requested: Option<&'a str>, language: Language) -> &'a str {
        requested
            .map(str::trim)
            .filter(|voice| !voice.is_empty())
            .unwrap_or_else(|| self.for_language(language))
    }
}

/// Merges `KEY=VALUE` lines from `path` into the process environment,
/// overriding existing values. Lines that cannot be used are skipped.
pub fn load_env_file(path: &Path) -> bool {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => {
            tracing::info!("No {} file found", path.display());
            return false;
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return false;
        }
    };

    let mut loaded = 0;
    for entry in entries {
        let (key, value) = match entry {
            Ok(pair) => pair,
            // dotenvy rejects unquoted values with spaces, e.g. "Chinese (Mandarin)_News_Anchor".
            Err(dotenvy::Error::LineParse(line, _)) => match plain_pair(&line) {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => {
                    tracing::warn!("Skipping unparsable line in {}: {}", path.display(), line);
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!("Skipping entry in {}: {}", path.display(), e);
                continue;
            }
        };
        std::env::set_var(key, value);
        loaded += 1;
    }

    tracing::info!(
        "Loaded {} environment variables from {}",
        loaded,
        path.display()
    );
    true
}

fn plain_pair(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}
