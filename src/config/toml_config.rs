use crate::utils::error::{GangliaError, Result};
use crate::utils::files::{default_temp_root, Workspace};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GOOGLE_TTS_BASE_URL: &str = "https://texttospeech.googleapis.com";
pub const DEFAULT_GCS_S3_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GangliaConfig {
    pub logging: LoggingConfig,
    pub openai: OpenAiConfig,
    pub tts: TtsConfig,
    pub google: GoogleConfig,
    pub storage: StorageConfig,
    pub retry: RetryPolicy,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub timestamps: bool,
    pub json: bool,
    pub timing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub audio_model: String,
    pub tts_model: String,
    pub max_history_words: usize,
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            audio_model: "gpt-4o-audio-preview".to_string(),
            tts_model: "tts-1".to_string(),
            max_history_words: 4097,
            timeout_seconds: 60,
        }
    }
}

impl OpenAiConfig {
    pub fn api_key(&self) -> Option<&str> {
        resolved(self.api_key.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngineKind {
    #[default]
    Google,
    OpenAi,
}

impl fmt::Display for TtsEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtsEngineKind::Google => f.write_str("google"),
            TtsEngineKind::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for TtsEngineKind {
    type Err = GangliaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(TtsEngineKind::Google),
            "openai" => Ok(TtsEngineKind::OpenAi),
            other => Err(GangliaError::InvalidConfigValueError {
                field: "tts.engine".to_string(),
                value: other.to_string(),
                reason: "Expected one of: google, openai".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub engine: TtsEngineKind,
    /// Engine-specific voice id; each engine has its own default.
    pub voice: Option<String>,
    pub apply_effects: bool,
    pub max_parallel: Option<usize>,
    pub playback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub base_url: String,
    pub language_code: String,
    pub timeout_seconds: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            base_url: DEFAULT_GOOGLE_TTS_BASE_URL.to_string(),
            language_code: "en-US".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl GoogleConfig {
    pub fn api_key(&self) -> Option<&str> {
        resolved(self.api_key.as_deref())
    }

    pub fn access_token(&self) -> Option<&str> {
        resolved(self.access_token.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: Option<String>,
    pub project: Option<String>,
    pub region: String,
    pub endpoint: Option<String>,
    pub local_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: None,
            project: None,
            region: "auto".to_string(),
            endpoint: Some(DEFAULT_GCS_S3_ENDPOINT.to_string()),
            local_root: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub temp_dir: Option<PathBuf>,
}

/// Treats blank values and unresolved `${VAR}` placeholders as unset.
fn resolved(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !(v.starts_with("${") && v.ends_with('}')))
}

impl GangliaConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| GangliaError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Reads `path` when it exists, falls back to defaults otherwise, then
    /// layers environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::debug!("No config file at {}, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GangliaError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });
        Ok(result.to_string())
    }

    pub fn apply_env_overrides(&mut self) {
        fn env(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }

        if self.openai.api_key().is_none() {
            self.openai.api_key = env("OPENAI_API_KEY");
        }
        if let Some(url) = env("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
        if self.google.api_key().is_none() {
            self.google.api_key = env("GOOGLE_API_KEY");
        }
        if self.google.access_token().is_none() {
            self.google.access_token = env("GOOGLE_ACCESS_TOKEN");
        }
        if self.paths.temp_dir.is_none() {
            self.paths.temp_dir = env(crate::utils::files::TEMP_DIR_ENV).map(PathBuf::from);
        }
        if env("PLAYBACK_MEDIA_IN_TESTS").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            self.tts.playback = true;
        }
    }

    pub fn workspace(&self) -> Result<Workspace> {
        Workspace::new(default_temp_root(self.paths.temp_dir.as_deref()))
    }
}

impl Validate for GangliaConfig {
    fn validate(&self) -> Result<()> {
        validate_url("openai.base_url", &self.openai.base_url)?;
        validate_url("google.base_url", &self.google.base_url)?;
        validate_non_empty_string("openai.model", &self.openai.model)?;
        validate_non_empty_string("openai.audio_model", &self.openai.audio_model)?;
        validate_non_empty_string("google.language_code", &self.google.language_code)?;
        if let Some(endpoint) = &self.storage.endpoint {
            validate_url("storage.endpoint", endpoint)?;
        }
        if let Some(root) = &self.storage.local_root {
            validate_path("storage.local_root", &root.to_string_lossy())?;
        }

        validate_range(
            "openai.max_history_words",
            self.openai.max_history_words,
            1,
            1_000_000,
        )?;
        validate_range("openai.timeout_seconds", self.openai.timeout_seconds, 1, 600)?;
        validate_range("google.timeout_seconds", self.google.timeout_seconds, 1, 600)?;
        validate_range("retry.max_retries", self.retry.max_retries, 1, 20)?;
        if let Some(parallel) = self.tts.max_parallel {
            validate_range("tts.max_parallel", parallel, 1, 16)?;
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GangliaConfig::from_toml_str("").unwrap();

        assert_eq!(config.openai.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.max_history_words, 4097);
        assert_eq!(config.tts.engine, TtsEngineKind::Google);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.google.timeout_seconds, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_google_timeout_is_separate() {
        let config = GangliaConfig::from_toml_str(
            "[openai]\ntimeout_seconds = 30\n[google]\ntimeout_seconds = 0\n",
        )
        .unwrap();

        assert_eq!(config.openai.timeout_seconds, 30);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[openai]
base_url = "http://localhost:9000/v1"
model = "gpt-4o"

[tts]
engine = "openai"
voice = "nova"
max_parallel = 4

[retry]
max_retries = 3
initial_delay_ms = 250

[storage]
backend = "s3"
bucket = "ganglia-media"
"#;
        let config = GangliaConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.audio_model, "gpt-4o-audio-preview");
        assert_eq!(config.tts.engine, TtsEngineKind::OpenAi);
        assert_eq!(config.tts.voice.as_deref(), Some("nova"));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.bucket.as_deref(), Some("ganglia-media"));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GANGLIA_TEST_OPENAI_URL", "https://proxy.example.com/v1");

        let config = GangliaConfig::from_toml_str(
            r#"
[openai]
base_url = "${GANGLIA_TEST_OPENAI_URL}"
api_key = "${GANGLIA_TEST_UNSET_KEY}"
"#,
        )
        .unwrap();

        assert_eq!(config.openai.base_url, "https://proxy.example.com/v1");
        assert_eq!(config.openai.api_key.as_deref(), Some("${GANGLIA_TEST_UNSET_KEY}"));
        assert_eq!(config.openai.api_key(), None);

        std::env::remove_var("GANGLIA_TEST_OPENAI_URL");
    }

    #[test]
    fn test_config_validation() {
        let config = GangliaConfig::from_toml_str(
            r#"
[openai]
base_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = GangliaConfig::from_toml_str("[tts]\nmax_parallel = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_engine_rejected() {
        assert!(GangliaConfig::from_toml_str("[tts]\nengine = \"chatterbox\"\n").is_err());
        assert_eq!("OpenAI".parse::<TtsEngineKind>().unwrap(), TtsEngineKind::OpenAi);
        assert!("espeak".parse::<TtsEngineKind>().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[logging]\nverbose = true\n[google]\nlanguage_code = \"en-GB\"\n")
            .unwrap();

        let config = GangliaConfig::from_file(temp_file.path()).unwrap();
        assert!(config.logging.verbose);
        assert_eq!(config.google.language_code, "en-GB");
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = GangliaConfig::load(Some(Path::new("/nonexistent/ganglia.toml"))).unwrap();
        assert_eq!(config.openai.model, "gpt-4o-mini");
    }
}
