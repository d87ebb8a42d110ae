use super::types::VoiceEngine;
use super::TextToSpeech;
use crate::config::GangliaConfig;
use crate::utils::error::{GangliaError, Result};
use crate::utils::files::precise_timestamp;
use crate::utils::{retry_with_backoff, Profiler, RetryPolicy, Workspace};
use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static filename pattern"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaking_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

enum Credentials {
    ApiKey(String),
    Bearer(String),
}

/// Google Cloud Text-to-Speech over its REST `text:synthesize` endpoint.
pub struct GoogleTts {
    client: Client,
    base_url: String,
    credentials: Credentials,
    language_code: String,
    default_voice: String,
    apply_effects: bool,
    retry: RetryPolicy,
    max_parallel: usize,
    workspace: Workspace,
    profiler: Profiler,
}

impl GoogleTts {
    pub const DEFAULT_VOICE: &'static str = "en-US-Casual-K";
    pub const DEFAULT_PARALLELISM: usize = 3;

    pub fn new(config: &GangliaConfig, workspace: Workspace, profiler: Profiler) -> Result<Self> {
        let credentials = match (config.google.api_key(), config.google.access_token()) {
            (Some(key), _) => Credentials::ApiKey(key.to_string()),
            (None, Some(token)) => Credentials::Bearer(token.to_string()),
            (None, None) => {
                return Err(GangliaError::MissingConfigError {
                    field: "google.api_key".to_string(),
                })
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.google.timeout_seconds))
            .build()?;

        let apply_effects = config.tts.apply_effects;
        tracing::info!(
            "Initializing GoogleTTS{}...",
            if apply_effects { " with audio effects" } else { "" }
        );

        Ok(Self {
            client,
            base_url: config.google.base_url.trim_end_matches('/').to_string(),
            credentials,
            language_code: config.google.language_code.clone(),
            default_voice: config
                .tts
                .voice
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_VOICE.to_string()),
            apply_effects,
            retry: config.retry.clone(),
            max_parallel: config.tts.max_parallel.unwrap_or(Self::DEFAULT_PARALLELISM),
            workspace,
            profiler,
        })
    }

    fn audio_config(&self) -> AudioConfig {
        if self.apply_effects {
            AudioConfig {
                audio_encoding: "MP3",
                pitch: Some(-20.0),
                speaking_rate: Some(1.0),
            }
        } else {
            AudioConfig {
                audio_encoding: "MP3",
                pitch: None,
                speaking_rate: None,
            }
        }
    }

    async fn synthesize_once(
        &self,
        text: &str,
        voice_id: &str,
        thread_id: Option<&str>,
    ) -> Result<PathBuf> {
        let prefix = thread_id.map(|id| format!("{} ", id)).unwrap_or_default();
        tracing::debug!(
            "{}Converting text to speech ({} chars)...",
            prefix,
            text.chars().count()
        );

        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                name: voice_id,
            },
            audio_config: self.audio_config(),
        };

        let start = Instant::now();
        let builder = self
            .client
            .post(format!("{}/v1/text:synthesize", self.base_url))
            .json(&request);
        let builder = match &self.credentials {
            Credentials::ApiKey(key) => builder.query(&[("key", key)]),
            Credentials::Bearer(token) => builder.bearer_auth(token),
        };
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GangliaError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        let body: SynthesizeResponse = response.json().await?;
        let elapsed = start.elapsed();
        self.profiler.record("tts_google", elapsed);
        if self.profiler.is_enabled() {
            self.profiler.note(&format!(
                "[TTS] Audio generated in {:.2}s",
                elapsed.as_secs_f64()
            ));
        }

        let audio = base64::engine::general_purpose::STANDARD.decode(body.audio_content)?;
        let path = self.workspace.tts_dir()?.join(format!(
            "tts_response_{}_{}.mp3",
            file_snippet(text),
            precise_timestamp()
        ));
        tokio::fs::write(&path, audio).await?;
        tracing::debug!("{}Audio saved to: {}", prefix, path.display());
        Ok(path)
    }
}

#[async_trait]
impl TextToSpeech for GoogleTts {
    fn engine(&self) -> VoiceEngine {
        VoiceEngine::Google
    }

    fn default_voice(&self) -> &str {
        &self.default_voice
    }

    fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    async fn convert_text_to_speech(
        &self,
        text: &str,
        voice_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<PathBuf> {
        let voice_id = voice_id.unwrap_or(&self.default_voice);
        retry_with_backoff(&self.retry, "Google TTS", thread_id, || {
            self.synthesize_once(text, voice_id, thread_id)
        })
        .await
        .inspect_err(|e| {
            let prefix = thread_id.map(|id| format!("{} ", id)).unwrap_or_default();
            tracing::error!("{}Error converting text to speech: {}", prefix, e);
        })
    }
}

/// First three words with anything outside `[\w\s-]` replaced, joined by `_`.
fn file_snippet(text: &str) -> String {
    text.split_whitespace()
        .take(3)
        .map(|word| UNSAFE_FILENAME_CHARS.replace_all(word, "_").into_owned())
        .collect::<Vec<_>>()
        .join("_")
}
