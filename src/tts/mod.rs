//! Text-to-speech engines and the media helpers around them.

mod google;
pub mod media;
mod openai;
mod text;
pub mod types;

pub use google::GoogleTts;
pub use media::AudioPlayer;
pub use openai::{OpenAiTts, OPENAI_VOICES};
pub use text::{is_remote_url, split_text};
pub use types::{Voice, VoiceEngine};

use crate::config::{GangliaConfig, TtsEngineKind};
use crate::utils::error::{GangliaError, Result};
use crate::utils::{Profiler, Workspace};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::path::PathBuf;

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    fn engine(&self) -> VoiceEngine;

    fn default_voice(&self) -> &str;

    /// Upper bound on concurrent requests in [`convert_sentences`](Self::convert_sentences).
    fn max_parallel(&self) -> usize;

    fn workspace(&self) -> &Workspace;

    fn profiler(&self) -> &Profiler;

    /// Synthesizes `text` into a new file under the workspace `tts/` dir.
    /// `voice_id = None` uses the engine default.
    async fn convert_text_to_speech(
        &self,
        text: &str,
        voice_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<PathBuf>;

    async fn convert_voice(
        &self,
        text: &str,
        voice: &Voice,
        thread_id: Option<&str>,
    ) -> Result<PathBuf> {
        if voice.engine != self.engine() {
            return Err(GangliaError::tts(format!(
                "voice '{}' belongs to the {} engine, not {}",
                voice.name,
                voice.engine,
                self.engine()
            )));
        }
        self.convert_text_to_speech(text, voice.id.as_deref(), thread_id)
            .await
    }

    /// Converts sentences concurrently, at most [`max_parallel`](Self::max_parallel)
    /// at a time, returning the files in sentence order. If any sentence
    /// fails, the files already written are removed and the first error is
    /// returned.
    async fn convert_sentence_parts(
        &self,
        sentences: &[String],
        voice_id: Option<&str>,
    ) -> Result<Vec<PathBuf>> {
        let thread_ids: Vec<String> = (0..sentences.len())
            .map(|i| format!("parallel-{}", i))
            .collect();
        let conversions: Vec<_> = sentences
            .iter()
            .zip(&thread_ids)
            .map(|(sentence, thread_id)| {
                self.convert_text_to_speech(sentence, voice_id, Some(thread_id.as_str()))
            })
            .collect();

        let results: Vec<Result<PathBuf>> = stream::iter(conversions)
            .buffered(self.max_parallel().max(1))
            .collect()
            .await;

        let mut parts = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(path) => parts.push(path),
                Err(e) => {
                    tracing::error!("Failed to convert sentence {}: {}", i, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => {
                media::remove_parts(&parts);
                Err(e)
            }
            None => Ok(parts),
        }
    }

    /// Converts sentences concurrently and stitches the results, in order,
    /// into one file. Any failed sentence fails the whole call.
    async fn convert_sentences(
        &self,
        sentences: &[String],
        voice_id: Option<&str>,
    ) -> Result<PathBuf> {
        match sentences {
            [] => Err(GangliaError::tts("no sentences to convert")),
            [only] => self.convert_text_to_speech(only, voice_id, None).await,
            _ => {
                tracing::debug!(
                    "Generating TTS for {} sentences in parallel...",
                    sentences.len()
                );
                let parts = self.convert_sentence_parts(sentences, voice_id).await?;
                media::concatenate_in_workspace(self.workspace(), &parts, self.profiler()).await
            }
        }
    }
}

/// Engine selected by `tts.engine`.
pub fn build_engine(
    config: &GangliaConfig,
    workspace: Workspace,
    profiler: Profiler,
) -> Result<Box<dyn TextToSpeech>> {
    let engine: Box<dyn TextToSpeech> = match config.tts.engine {
        TtsEngineKind::Google => Box::new(GoogleTts::new(config, workspace, profiler)?),
        TtsEngineKind::OpenAi => Box::new(OpenAiTts::new(config, workspace, profiler)?),
    };
    tracing::debug!("Using {} text-to-speech engine", engine.engine());
    Ok(engine)
}
