use thiserror::Error;

#[derive(Error, Debug)]
pub enum GangliaError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Text-to-speech error: {message}")]
    TtsError { message: String },

    #[error("Media tool error: {message}")]
    MediaError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GangliaError {
    pub fn tts(message: impl Into<String>) -> Self {
        Self::TtsError {
            message: message.into(),
        }
    }

    pub fn media(message: impl Into<String>) -> Self {
        Self::MediaError {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::HttpError(_) | Self::ApiError { .. } => ErrorSeverity::Medium,
            Self::TtsError { .. } | Self::MediaError { .. } | Self::StorageError { .. } => {
                ErrorSeverity::High
            }
            Self::SerializationError(_) | Self::DecodeError(_) => ErrorSeverity::High,
            Self::ValidationError { .. } => ErrorSeverity::Low,
            Self::IoError(_)
            | Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Server-side and transport failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::HttpError(_) => "Check network connectivity and the configured base URL",
            Self::ApiError { status: 401, .. } | Self::ApiError { status: 403, .. } => {
                "Check that the API key is set and valid"
            }
            Self::ApiError { status: 429, .. } => "Rate limited; wait and retry",
            Self::ApiError { .. } => "Inspect the API error message and request parameters",
            Self::IoError(_) => "Check file permissions and that GANGLIA_TEMP_DIR is writable",
            Self::SerializationError(_) | Self::DecodeError(_) => {
                "The remote service returned an unexpected payload"
            }
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file or the corresponding environment variable"
            }
            Self::ValidationError { .. } => "Adjust the input and try again",
            Self::TtsError { .. } => "Check the TTS engine, voice id and credentials",
            Self::MediaError { .. } => "Make sure ffmpeg, ffprobe and ffplay are on PATH",
            Self::StorageError { .. } => "Check bucket name, endpoint and storage credentials",
        }
    }
}

pub type Result<T> = std::result::Result<T, GangliaError>;
