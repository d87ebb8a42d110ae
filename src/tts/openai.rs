use super::media::{concatenate_in_workspace, remove_parts};
use super::text::split_text;
use super::types::VoiceEngine;
use super::TextToSpeech;
use crate::config::GangliaConfig;
use crate::utils::error::{GangliaError, Result};
use crate::utils::files::precise_timestamp;
use crate::utils::{Profiler, Workspace};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const OPENAI_VOICES: [&str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Longest input sent in one request; longer text is chunked.
const MAX_INPUT_CHARS: usize = 4000;

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'static str,
}

/// OpenAI `audio/speech` synthesis.
pub struct OpenAiTts {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    max_parallel: usize,
    workspace: Workspace,
    profiler: Profiler,
}

impl OpenAiTts {
    pub const DEFAULT_VOICE: &'static str = "onyx";
    pub const DEFAULT_PARALLELISM: usize = 5;

    pub fn new(config: &GangliaConfig, workspace: Workspace, profiler: Profiler) -> Result<Self> {
        let api_key = config
            .openai
            .api_key()
            .ok_or_else(|| GangliaError::MissingConfigError {
                field: "openai.api_key".to_string(),
            })?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.openai.timeout_seconds))
            .build()?;

        let voice = config
            .tts
            .voice
            .as_deref()
            .filter(|v| OPENAI_VOICES.contains(v))
            .unwrap_or(Self::DEFAULT_VOICE)
            .to_string();
        tracing::info!("OpenAI TTS initialized with voice: {}", voice);

        Ok(Self {
            client,
            base_url: config.openai.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.openai.tts_model.clone(),
            voice,
            max_parallel: config
                .tts
                .max_parallel
                .unwrap_or(Self::DEFAULT_PARALLELISM),
            workspace,
            profiler,
        })
    }

    /// Unknown voice ids fall back to the configured voice.
    pub fn resolve_voice<'a>(&'a self, voice_id: Option<&'a str>) -> &'a str {
        voice_id
            .filter(|v| OPENAI_VOICES.contains(v))
            .unwrap_or(&self.voice)
    }

    async fn speak_chunk(
        &self,
        text: &str,
        voice_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<PathBuf> {
        let prefix = thread_id
            .map(|id| format!("[Thread {}] ", id))
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GangliaError::ValidationError {
                message: "Cannot convert empty text to speech".to_string(),
            });
        }

        let voice = self.resolve_voice(voice_id);
        if self.profiler.is_enabled() {
            self.profiler.note(&format!(
                "[TTS] Converting text to speech ({} chars)...",
                text.chars().count()
            ));
        } else {
            tracing::debug!("{}Converting text to speech with OpenAI TTS...", prefix);
        }

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                voice,
                input: text,
                response_format: "mp3",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(
                "{}Error generating speech with OpenAI TTS: HTTP {}",
                prefix,
                status
            );
            return Err(GangliaError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let elapsed = start.elapsed();
        self.profiler.record("tts_openai", elapsed);
        if self.profiler.is_enabled() {
            self.profiler.note(&format!(
                "[TTS] Audio generated in {:.2}s",
                elapsed.as_secs_f64()
            ));
        }

        let path = self
            .workspace
            .tts_dir()?
            .join(format!("openai_tts_{}.mp3", precise_timestamp()));
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!("{}Audio saved to: {}", prefix, path.display());
        Ok(path)
    }
}

#[async_trait]
impl TextToSpeech for OpenAiTts {
    fn engine(&self) -> VoiceEngine {
        VoiceEngine::OpenAi
    }

    fn default_voice(&self) -> &str {
        &self.voice
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
        let length = text.chars().count();
        if length <= MAX_INPUT_CHARS {
            return self.speak_chunk(text, voice_id, thread_id).await;
        }

        tracing::warn!("Text too long ({} chars), splitting into chunks...", length);
        let chunks = split_text(text, MAX_INPUT_CHARS);
        tracing::debug!("Split into {} chunks", chunks.len());

        let mut parts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_id = match thread_id {
                Some(id) => format!("{}-{}", id, i),
                None => format!("chunk-{}", i),
            };
            match self.speak_chunk(chunk, voice_id, Some(&chunk_id)).await {
                Ok(part) => parts.push(part),
                Err(e) => {
                    tracing::error!("Failed to convert chunk {}: {}", i, e);
                    remove_parts(&parts);
                    return Err(e);
                }
            }
        }

        concatenate_in_workspace(&self.workspace, &parts, &self.profiler).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(voice: Option<&str>, tmp: &TempDir) -> OpenAiTts {
        let mut config = GangliaConfig::default();
        config.openai.api_key = Some("sk-test".to_string());
        config.tts.voice = voice.map(str::to_string);
        OpenAiTts::new(&config, Workspace::new(tmp.path()).unwrap(), Profiler::default()).unwrap()
    }

    #[test]
    fn test_unknown_configured_voice_falls_back_to_onyx() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(engine(Some("en-US-Casual-K"), &tmp).default_voice(), "onyx");
        assert_eq!(engine(Some("nova"), &tmp).default_voice(), "nova");
        assert_eq!(engine(None, &tmp).max_parallel(), 5);
    }

    #[test]
    fn test_resolve_voice() {
        let tmp = TempDir::new().unwrap();
        let tts = engine(Some("echo"), &tmp);
        assert_eq!(tts.resolve_voice(Some("shimmer")), "shimmer");
        assert_eq!(tts.resolve_voice(Some("robot")), "echo");
        assert_eq!(tts.resolve_voice(None), "echo");
    }

    #[tokio::test]
    async fn test_blank_text_rejected_without_request() {
        let tmp = TempDir::new().unwrap();
        let tts = engine(None, &tmp);
        let result = tts.convert_text_to_speech("   ", None, None).await;
        assert!(matches!(result, Err(GangliaError::ValidationError { .. })));
    }
}
