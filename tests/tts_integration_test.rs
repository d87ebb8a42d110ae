use anyhow::Result;
use base64::Engine as _;
use ganglia_common::config::TtsEngineKind;
use ganglia_common::tts::{build_engine, Voice, VoiceEngine};
use ganglia_common::utils::{Profiler, RetryPolicy, Workspace};
use ganglia_common::{GangliaConfig, GangliaError, GoogleTts, OpenAiTts, TextToSpeech};
use httpmock::prelude::*;
use std::time::Duration;
use tempfile::TempDir;

fn google_config(server: &MockServer) -> GangliaConfig {
    let mut config = GangliaConfig::default();
    config.google.api_key = Some("test-key".to_string());
    config.google.base_url = server.base_url();
    config.retry = RetryPolicy::new(3, Duration::from_millis(1));
    config
}

fn openai_config(server: &MockServer) -> GangliaConfig {
    let mut config = GangliaConfig::default();
    config.openai.api_key = Some("sk-test".to_string());
    config.openai.base_url = server.url("/v1");
    config.tts.engine = TtsEngineKind::OpenAi;
    config.tts.voice = Some("nova".to_string());
    config
}

#[tokio::test]
async fn test_google_synthesis_writes_mp3() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;
    let audio = base64::engine::general_purpose::STANDARD.encode(b"ID3-fake-mp3");

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/text:synthesize")
            .query_param("key", "test-key")
            .json_body_partial(
                r#"{
                    "input": {"text": "Hello there, friend. More words follow."},
                    "voice": {"languageCode": "en-US", "name": "en-US-Casual-K"},
                    "audioConfig": {"audioEncoding": "MP3"}
                }"#,
            );
        then.status(200)
            .json_body(serde_json::json!({ "audioContent": audio }));
    });

    let tts = GoogleTts::new(
        &google_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let path = tts
        .convert_text_to_speech("Hello there, friend. More words follow.", None, None)
        .await?;

    mock.assert();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("tts_response_Hello_there__friend__"), "{name}");
    assert!(name.ends_with(".mp3"));
    assert!(path.starts_with(tmp.path().join("tts")));
    assert_eq!(std::fs::read(&path)?, b"ID3-fake-mp3");
    Ok(())
}

#[tokio::test]
async fn test_google_retries_then_fails() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/text:synthesize");
        then.status(503).body("backend unavailable");
    });

    let tts = GoogleTts::new(
        &google_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let result = tts
        .convert_text_to_speech("Hello.", Some("en-US-Neural2-F"), Some("t-1"))
        .await;

    assert!(matches!(result, Err(GangliaError::ApiError { status: 503, .. })));
    assert_eq!(mock.hits(), 3);
    Ok(())
}

#[tokio::test]
async fn test_google_bearer_token_and_voice() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;
    let audio = base64::engine::general_purpose::STANDARD.encode(b"mp3");

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/text:synthesize")
            .header("authorization", "Bearer ya29.token")
            .json_body_partial(r#"{"voice": {"name": "en-GB-Standard-A"}}"#);
        then.status(200)
            .json_body(serde_json::json!({ "audioContent": audio }));
    });

    let mut config = google_config(&server);
    config.google.api_key = None;
    config.google.access_token = Some("ya29.token".to_string());
    let tts = GoogleTts::new(&config, Workspace::new(tmp.path())?, Profiler::default())?;

    let voice = Voice::new(VoiceEngine::Google, "British").with_id("en-GB-Standard-A");
    tts.convert_voice("Cheerio.", &voice, None).await?;

    mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_openai_speech_uses_configured_voice() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/audio/speech")
            .header("authorization", "Bearer sk-test")
            .json_body_partial(
                r#"{"model": "tts-1", "voice": "nova", "input": "Only one.", "response_format": "mp3"}"#,
            );
        then.status(200)
            .header("content-type", "audio/mpeg")
            .body("mp3-bytes");
    });

    let engine = build_engine(
        &openai_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let path = engine
        .convert_sentences(&["Only one.".to_string()], None)
        .await?;

    mock.assert();
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("openai_tts_"));
    assert_eq!(std::fs::read(&path)?, b"mp3-bytes");
    Ok(())
}

#[tokio::test]
async fn test_openai_unknown_voice_id_uses_default() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/audio/speech")
            .json_body_partial(r#"{"voice": "nova"}"#);
        then.status(200).body("mp3");
    });

    let tts = OpenAiTts::new(
        &openai_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    tts.convert_text_to_speech("Hi.", Some("en-US-Casual-K"), None)
        .await?;

    mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_openai_error_status() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    server.mock(|when, then| {
        when.method(POST).path("/v1/audio/speech");
        then.status(429).body("rate limited");
    });

    let tts = OpenAiTts::new(
        &openai_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let err = tts
        .convert_text_to_speech("Hi.", None, None)
        .await
        .unwrap_err();

    assert!(err.is_transient());
    assert!(matches!(err, GangliaError::ApiError { status: 429, .. }));
    Ok(())
}

fn tts_files(tmp: &TempDir) -> Vec<String> {
    match std::fs::read_dir(tmp.path().join("tts")) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_parallel_parts_keep_sentence_order() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;
    let encode = |bytes: &[u8]| base64::engine::general_purpose::STANDARD.encode(bytes);

    let sentences = vec![
        "Alpha comes first.".to_string(),
        "Bravo comes second.".to_string(),
        "Charlie comes third.".to_string(),
    ];
    let mut mocks = Vec::new();
    for (i, sentence) in sentences.iter().enumerate() {
        let audio = encode(format!("part-{i}").as_bytes());
        let body = serde_json::json!({ "input": { "text": sentence } }).to_string();
        mocks.push(server.mock(|when, then| {
            when.method(POST)
                .path("/v1/text:synthesize")
                .json_body_partial(body);
            // The first sentence finishes last.
            let then = if i == 0 {
                then.delay(Duration::from_millis(300))
            } else {
                then
            };
            then.status(200)
                .json_body(serde_json::json!({ "audioContent": audio }));
        }));
    }

    let tts = GoogleTts::new(
        &google_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let parts = tts.convert_sentence_parts(&sentences, None).await?;

    for mock in &mocks {
        mock.assert();
    }
    let contents: Vec<Vec<u8>> = parts
        .iter()
        .map(std::fs::read)
        .collect::<std::io::Result<_>>()?;
    assert_eq!(
        contents,
        vec![b"part-0".to_vec(), b"part-1".to_vec(), b"part-2".to_vec()]
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_sentence_fails_batch_and_removes_parts() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;
    let audio = base64::engine::general_purpose::STANDARD.encode(b"mp3");

    let ok = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/text:synthesize")
            .body_contains("works");
        then.status(200)
            .json_body(serde_json::json!({ "audioContent": audio }));
    });
    let broken = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/text:synthesize")
            .body_contains("breaks");
        then.status(500).body("internal error");
    });

    let tts = GoogleTts::new(
        &google_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let sentences = vec![
        "This one works.".to_string(),
        "This one breaks.".to_string(),
        "This also works.".to_string(),
    ];
    let result = tts.convert_sentences(&sentences, None).await;

    assert!(matches!(result, Err(GangliaError::ApiError { status: 500, .. })));
    assert_eq!(ok.hits(), 2);
    assert_eq!(broken.hits(), 3);
    assert!(tts_files(&tmp).is_empty(), "left behind: {:?}", tts_files(&tmp));
    Ok(())
}

#[tokio::test]
async fn test_openai_long_text_stops_at_first_failed_chunk() -> Result<()> {
    let server = MockServer::start();
    let tmp = TempDir::new()?;

    let text = format!("First sentence. {}{}.", "x".repeat(4000), "y".repeat(50));

    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/audio/speech")
            .json_body_partial(r#"{"input": "First sentence."}"#);
        then.status(200).body("mp3-one");
    });
    let middle = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/audio/speech")
            .body_contains("xxxxxxxxxx");
        then.status(500).body("chunk rejected");
    });
    let last = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/audio/speech")
            .body_contains("yyyyyyyyyy");
        then.status(200).body("mp3-three");
    });

    let tts = OpenAiTts::new(
        &openai_config(&server),
        Workspace::new(tmp.path())?,
        Profiler::default(),
    )?;
    let result = tts.convert_text_to_speech(&text, None, Some("t-9")).await;

    assert!(matches!(result, Err(GangliaError::ApiError { status: 500, .. })));
    first.assert();
    middle.assert();
    assert_eq!(last.hits(), 0);
    assert!(tts_files(&tmp).is_empty(), "left behind: {:?}", tts_files(&tmp));
    Ok(())
}
