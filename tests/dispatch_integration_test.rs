use anyhow::Result;
use base64::Engine as _;
use futures::StreamExt;
use ganglia_common::domain::model::Role;
use ganglia_common::utils::{Profiler, Workspace};
use ganglia_common::{ChatDispatcher, DispatcherOptions, GangliaConfig, GangliaError};
use httpmock::prelude::*;
use tempfile::TempDir;

fn config_for(server: &MockServer) -> GangliaConfig {
    let mut config = GangliaConfig::default();
    config.openai.api_key = Some("sk-test".to_string());
    config.openai.base_url = server.url("/v1");
    config.openai.timeout_seconds = 5;
    config
}

fn dispatcher(
    server: &MockServer,
    tmp: &TempDir,
    options: DispatcherOptions,
) -> Result<ChatDispatcher> {
    Ok(ChatDispatcher::new(
        &config_for(server),
        options,
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?)
}

fn raw_outputs(tmp: &TempDir) -> Vec<String> {
    std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("chatgpt_output_") && name.ends_with("_raw.txt"))
        .collect()
}

#[tokio::test]
async fn test_text_query_appends_history_and_saves_output() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .json_body_partial(r#"{"model": "gpt-4o-mini"}"#);
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello from GANGLIA."}}]
        }));
    });

    let mut dispatcher = dispatcher(
        &server,
        &tmp,
        DispatcherOptions {
            pre_prompt: Some("You are GANGLIA.".to_string()),
            ..DispatcherOptions::default()
        },
    )?;
    let reply = dispatcher.send_query("Who are you?").await?;

    mock.assert();
    assert_eq!(reply.text, "Hello from GANGLIA.");
    assert!(!reply.has_audio());

    let roles: Vec<Role> = dispatcher.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(raw_outputs(&tmp).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_audio_reply_is_decoded_to_wav() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;
    let audio = base64::engine::general_purpose::STANDARD.encode(b"RIFF-fake-wav");

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .json_body_partial(
                r#"{
                    "model": "gpt-4o-audio-preview",
                    "modalities": ["text", "audio"],
                    "audio": {"voice": "alloy", "format": "wav"}
                }"#,
            );
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "audio": {"id": "audio_1", "data": audio, "transcript": "Spoken reply."}
            }}]
        }));
    });

    let mut dispatcher = dispatcher(
        &server,
        &tmp,
        DispatcherOptions {
            audio_output: true,
            ..DispatcherOptions::default()
        },
    )?;
    let reply = dispatcher.send_query("Say something").await?;

    mock.assert();
    assert_eq!(reply.text, "Spoken reply.");
    let path = reply.audio_path.expect("audio path");
    assert!(path.starts_with(tmp.path().join("tts")));
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("audio_response_"));
    assert_eq!(std::fs::read(&path)?, b"RIFF-fake-wav");
    assert_eq!(
        dispatcher.messages().last().map(|m| m.content.as_str()),
        Some("Spoken reply.")
    );
    Ok(())
}

#[tokio::test]
async fn test_audio_requested_but_missing_falls_back_to_text() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": ""}}]
        }));
    });

    let mut dispatcher = dispatcher(
        &server,
        &tmp,
        DispatcherOptions {
            audio_output: true,
            ..DispatcherOptions::default()
        },
    )?;
    let reply = dispatcher.send_query("Hello?").await?;

    assert_eq!(reply.text, "[No response received]");
    assert!(reply.audio_path.is_none());
    Ok(())
}

#[tokio::test]
async fn test_streaming_yields_sentences() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let sse = [
        r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#,
        r#"{"choices":[{"delta":{"content":"Hello"},"index":0}]}"#,
        r#"{"choices":[{"delta":{"content":" there."},"index":0}]}"#,
        r#"{"choices":[{"delta":{"content":" How are you?"},"index":0}]}"#,
        r#"{"choices":[{"delta":{"content":" Bye"},"index":0}]}"#,
        r#"{"choices":[{"delta":{},"finish_reason":"stop","index":0}]}"#,
        "[DONE]",
    ]
    .iter()
    .map(|payload| format!("data: {}\n\n", payload))
    .collect::<String>();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .json_body_partial(r#"{"model": "gpt-4o-mini", "stream": true}"#);
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(sse);
    });

    let mut dispatcher = dispatcher(&server, &tmp, DispatcherOptions::default())?;
    let mut sentences = Vec::new();
    {
        let stream = dispatcher.send_query_streaming("Hi!");
        futures::pin_mut!(stream);
        while let Some(sentence) = stream.next().await {
            sentences.push(sentence?);
        }
    }

    mock.assert();
    assert_eq!(sentences, vec!["Hello there.", "How are you?", "Bye"]);
    let last = dispatcher.messages().last().expect("assistant message");
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "Hello there. How are you? Bye");
    assert_eq!(raw_outputs(&tmp).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_api_error_is_reported_with_status() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401).body(r#"{"error":{"message":"Incorrect API key provided"}}"#);
    });

    let mut dispatcher = dispatcher(&server, &tmp, DispatcherOptions::default())?;
    let err = dispatcher.send_query("Hello").await.unwrap_err();

    match err {
        GangliaError::ApiError { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("Incorrect API key"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(raw_outputs(&tmp).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_filter_content_gives_up_after_max_attempts() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(500).body("upstream failure");
    });

    let mut dispatcher = dispatcher(&server, &tmp, DispatcherOptions::default())?;
    let filtered = dispatcher
        .filter_content_for_image("Alice swam in Lake Tahoe.", 3)
        .await;

    assert!(filtered.is_none());
    assert_eq!(mock.hits(), 3);
    Ok(())
}

#[tokio::test]
async fn test_filter_content_returns_trimmed_rewrite() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("Story to rewrite");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"content": "  A child swam in a beautiful lake.\n"}}]
        }));
    });

    let mut dispatcher = dispatcher(&server, &tmp, DispatcherOptions::default())?;
    let filtered = dispatcher
        .filter_content_for_image("Alice swam in Lake Tahoe.", 3)
        .await;

    assert_eq!(filtered.as_deref(), Some("A child swam in a beautiful lake."));
    Ok(())
}

#[tokio::test]
async fn test_profiler_only_collects_when_enabled() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Noted."}}]
        }));
    });

    for enabled in [false, true] {
        let profiler = Profiler::new(enabled);
        let mut dispatcher = ChatDispatcher::new(
            &config_for(&server),
            DispatcherOptions::default(),
            Workspace::new(tmp.path())?,
            profiler.clone(),
        )?;
        for _ in 0..3 {
            dispatcher.send_query("Remember this.").await?;
        }

        let samples = profiler.get_stats("llm_query").map(|stats| stats.count);
        if enabled {
            assert_eq!(samples, Some(3));
        } else {
            assert_eq!(samples, None, "disabled profiler collected samples");
        }
    }
    Ok(())
}
