use super::sse::{SentenceSplitter, SseDecoder, SseEvent};
use super::wire::{AudioRequest, ChatChunk, ChatCompletion, ChatRequest};
use crate::config::GangliaConfig;
use crate::domain::model::{ChatMessage, QueryReply};
use crate::utils::error::{GangliaError, Result};
use crate::utils::files::file_timestamp;
use crate::utils::{Profiler, Workspace};
use base64::Engine as _;
use futures::{Stream, StreamExt};
use reqwest::Client;
use std::time::{Duration, Instant};

const NO_RESPONSE: &str = "[No response received]";
const NO_TRANSCRIPT: &str = "[Audio response - no transcript]";

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Becomes the first system message of the session.
    pub pre_prompt: Option<String>,
    /// Ask the audio model for a spoken reply alongside the text.
    pub audio_output: bool,
    pub audio_voice: String,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            pre_prompt: None,
            audio_output: false,
            audio_voice: "alloy".to_string(),
        }
    }
}

/// A chat session against an OpenAI-compatible completion endpoint.
///
/// The dispatcher owns the conversation history; every query is sent with
/// the full (rotated) history and the reply is appended to it.
pub struct ChatDispatcher {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    text_model: String,
    audio_output: bool,
    audio_voice: String,
    max_history_words: usize,
    messages: Vec<ChatMessage>,
    workspace: Workspace,
    profiler: Profiler,
}

impl ChatDispatcher {
    pub fn new(
        config: &GangliaConfig,
        options: DispatcherOptions,
        workspace: Workspace,
        profiler: Profiler,
    ) -> Result<Self> {
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

        let model = if options.audio_output {
            config.openai.audio_model.clone()
        } else {
            config.openai.model.clone()
        };

        let mut messages = Vec::new();
        if let Some(pre_prompt) = options.pre_prompt.filter(|p| !p.is_empty()) {
            messages.push(ChatMessage::system(pre_prompt));
        }

        Ok(Self {
            client,
            api_key,
            base_url: config.openai.base_url.trim_end_matches('/').to_string(),
            model,
            text_model: config.openai.model.clone(),
            audio_output: options.audio_output,
            audio_voice: options.audio_voice,
            max_history_words: config.openai.max_history_words,
            messages,
            workspace,
            profiler,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn add_system_context<I, S>(&mut self, context_lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages
            .extend(context_lines.into_iter().map(ChatMessage::system));
    }

    pub async fn send_query(&mut self, current_input: &str) -> Result<QueryReply> {
        self.messages.push(ChatMessage::user(current_input));
        let start = Instant::now();
        self.rotate_session_history();

        if self.profiler.is_enabled() {
            self.profiler
                .note(&format!("[LLM] Sending query to OpenAI API ({})...", self.model));
        } else {
            tracing::debug!("Sending query to AI server...");
        }

        let reply = if self.audio_output {
            self.query_with_audio().await?
        } else {
            self.query_text().await?
        };

        self.messages.push(ChatMessage::assistant(reply.text.clone()));

        let elapsed = start.elapsed();
        self.profiler.record("llm_query", elapsed);
        let label = if reply.has_audio() { "LLM+AUDIO" } else { "LLM" };
        if self.profiler.is_enabled() {
            self.profiler.note(&format!(
                "[{}] Response received in {:.2}s ({} chars)",
                label,
                elapsed.as_secs_f64(),
                reply.text.chars().count()
            ));
        } else {
            tracing::info!("AI response received in {:.1} seconds.", elapsed.as_secs_f64());
        }

        self.workspace.write_raw_output(&reply.text)?;
        Ok(reply)
    }

    async fn query_text(&self) -> Result<QueryReply> {
        let request = ChatRequest {
            model: &self.model,
            messages: &self.messages,
            modalities: None,
            audio: None,
            stream: false,
        };
        let completion: ChatCompletion = self.post_completion(&request).await?.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(QueryReply::text(text))
    }

    async fn query_with_audio(&self) -> Result<QueryReply> {
        let request = ChatRequest {
            model: &self.model,
            messages: &self.messages,
            modalities: Some(["text", "audio"]),
            audio: Some(AudioRequest {
                voice: &self.audio_voice,
                format: "wav",
            }),
            stream: false,
        };
        let completion: ChatCompletion = self.post_completion(&request).await?.json().await?;
        let message = completion.choices.into_iter().next().map(|choice| choice.message);

        let (content, audio) = match message {
            Some(message) => (message.content.unwrap_or_default(), message.audio),
            None => (String::new(), None),
        };

        let Some((data, transcript)) =
            audio.and_then(|audio| Some((audio.data?, audio.transcript)))
        else {
            tracing::warn!(
                "⚠️  Audio output requested but not received from API. Falling back to TTS."
            );
            let text = if content.is_empty() {
                NO_RESPONSE.to_string()
            } else {
                content
            };
            return Ok(QueryReply::text(text));
        };

        let text = if content.is_empty() {
            transcript
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| NO_TRANSCRIPT.to_string())
        } else {
            content
        };

        let audio_bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
        let audio_path = self
            .workspace
            .tts_dir()?
            .join(format!("audio_response_{}.wav", file_timestamp()));
        tokio::fs::write(&audio_path, audio_bytes).await?;
        tracing::debug!("Saved audio reply to {}", audio_path.display());

        Ok(QueryReply {
            text,
            audio_path: Some(audio_path),
        })
    }

    /// Streams the reply sentence by sentence so speech synthesis can start
    /// before the model has finished. The full reply is appended to the
    /// history and saved once the stream is exhausted.
    pub fn send_query_streaming<'a>(
        &'a mut self,
        current_input: &'a str,
    ) -> impl Stream<Item = Result<String>> + 'a {
        async_stream::try_stream! {
            self.messages.push(ChatMessage::user(current_input));
            let start = Instant::now();
            self.rotate_session_history();
            tracing::debug!("Sending streaming query to AI server...");

            let request = ChatRequest {
                model: &self.text_model,
                messages: &self.messages,
                modalities: None,
                audio: None,
                stream: true,
            };
            let response = self.post_completion(&request).await?;
            let mut body = response.bytes_stream();

            let mut decoder = SseDecoder::new();
            let mut splitter = SentenceSplitter::new();
            let mut full_response = String::new();
            let mut first_chunk = true;
            let mut done = false;

            while !done {
                let events = match body.next().await {
                    Some(chunk) => decoder.push(&chunk?),
                    None => {
                        done = true;
                        decoder.finish().into_iter().collect()
                    }
                };

                if first_chunk && !events.is_empty() {
                    first_chunk = false;
                    if self.profiler.is_enabled() {
                        self.profiler.note(&format!(
                            "[LLM] First chunk received (TTFB: {:.2}s)",
                            start.elapsed().as_secs_f64()
                        ));
                    }
                }

                for event in events {
                    let payload = match event {
                        SseEvent::Data(payload) => payload,
                        SseEvent::Done => {
                            done = true;
                            break;
                        }
                    };
                    let chunk: ChatChunk = serde_json::from_str(&payload)?;
                    let Some(content) = chunk.delta_content() else {
                        continue;
                    };
                    full_response.push_str(&content);
                    if let Some(sentence) = splitter.push(&content) {
                        tracing::debug!("Streaming sentence: {}", preview(&sentence));
                        yield sentence;
                    }
                }
            }

            if let Some(rest) = splitter.finish() {
                tracing::debug!("Streaming final: {}", preview(&rest));
                yield rest;
            }

            self.messages.push(ChatMessage::assistant(full_response.clone()));
            let elapsed = start.elapsed();
            self.profiler.record("llm_stream", elapsed);
            tracing::debug!(
                "AI response streamed in {:.1} seconds ({} chars)",
                elapsed.as_secs_f64(),
                full_response.chars().count()
            );
            self.workspace.write_raw_output(&full_response)?;
        }
    }

    async fn post_completion(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI API error: HTTP {}, body: {}", status, message);
            return Err(GangliaError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Drops the oldest messages, whatever their role, until the history
    /// fits in `max_history_words`.
    pub fn rotate_session_history(&mut self) {
        let mut total = self.count_tokens();
        while total > self.max_history_words && !self.messages.is_empty() {
            let removed = self.messages.remove(0);
            let removed_words = removed.word_count();
            total -= removed_words;
            tracing::debug!(
                "Conversation history getting long - dropping oldest content: {} ({} tokens)",
                removed.content,
                removed_words
            );
        }
    }

    /// Whitespace-separated words across the whole history.
    pub fn count_tokens(&self) -> usize {
        self.messages.iter().map(ChatMessage::word_count).sum()
    }

    /// Asks the model to rewrite `content` so it passes image generation
    /// content filters. Failures are logged; `None` after the last attempt.
    pub async fn filter_content_for_image(
        &mut self,
        content: &str,
        max_attempts: u32,
    ) -> Option<String> {
        let prompt = image_filter_prompt(content);
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            tracing::info!(
                "Filtering content for image generation (attempt {}/{})",
                attempt,
                max_attempts
            );
            match self.send_query(&prompt).await {
                Ok(reply) => {
                    let filtered = reply.text.trim().to_string();
                    tracing::info!("Rewritten content:\n{}", filtered);
                    return Some(filtered);
                }
                Err(e) => {
                    tracing::error!("Error filtering content (attempt {}): {}", attempt, e);
                }
            }
        }
        None
    }
}

fn image_filter_prompt(content: &str) -> String {
    format!(
        "Please rewrite this story to pass OpenAI's DALL-E content filters. \
         The rewritten version should:\
         1. Replace all specific names with generic terms (e.g., 'the family', 'the children')\
         2. Replace specific locations with generic descriptions (e.g., 'a beautiful lake')\
         3. Remove any potentially sensitive or controversial content\
         4. Keep the core story and emotional tone\n\
         \nStory to rewrite:\n{}\n\
         \nReturn only the rewritten story with no additional text or explanation.",
        content
    )
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(50).collect();
    format!("{}...", head)
}
