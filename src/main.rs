use clap::Parser;
use futures::StreamExt;
use ganglia_common::config::{CliArgs, Command, GangliaConfig};
use ganglia_common::logger::{self, Console, Speaker};
use ganglia_common::storage::{video_stream_url, ConfiguredStorage, Storage};
use ganglia_common::tts::{build_engine, split_text, AudioPlayer};
use ganglia_common::utils::error::{ErrorSeverity, GangliaError};
use ganglia_common::utils::monitor::SystemMonitor;
use ganglia_common::utils::validation::Validate;
use ganglia_common::utils::{default_config_path, Profiler};
use ganglia_common::{ChatDispatcher, DispatcherOptions, Result};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = match GangliaConfig::load(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(exit_code(e.severity()));
        }
    };
    args.apply_to(&mut config);

    if config.logging.json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.logging.verbose, config.logging.timestamps);
    }
    tracing::debug!("Loaded configuration from {}", config_path.display());

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let monitor = SystemMonitor::new(args.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }
    let profiler = Profiler::new(config.logging.timing);

    let result = run(args.command, &config, &profiler, &monitor).await;

    if profiler.is_enabled() {
        profiler.log_summary();
    }
    monitor.log_final();

    if let Err(e) = result {
        tracing::error!("❌ Command failed: {} (Severity: {:?})", e, e.severity());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        eprintln!("💡 {}", e.recovery_suggestion());

        let code = exit_code(e.severity());
        if code > 0 {
            std::process::exit(code);
        }
    }
}

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

async fn run(
    command: Command,
    config: &GangliaConfig,
    profiler: &Profiler,
    monitor: &SystemMonitor,
) -> Result<()> {
    let console = Arc::new(Console::from_env());

    match command {
        Command::Ask {
            prompt,
            stream,
            audio,
            pre_prompt,
        } => {
            let options = DispatcherOptions {
                pre_prompt,
                audio_output: audio && !stream,
                ..DispatcherOptions::default()
            };
            let mut dispatcher =
                ChatDispatcher::new(config, options, config.workspace()?, profiler.clone())?;
            console.user_final(&prompt);

            if stream {
                let sentences = dispatcher.send_query_streaming(&prompt);
                futures::pin_mut!(sentences);
                while let Some(sentence) = sentences.next().await {
                    console.say(Speaker::Agent, &sentence?);
                }
            } else {
                let reply = dispatcher.send_query(&prompt).await?;
                console.say(Speaker::Agent, &reply.text);
                if let Some(path) = reply.audio_path {
                    println!("🔊 Audio saved to: {}", path.display());
                }
            }
            monitor.log_phase("Ask");
        }
        Command::Speak { text, .. } => {
            let engine = build_engine(config, config.workspace()?, profiler.clone())?;
            let sentences = split_text(&text, 250);
            let path = if sentences.len() > 1 {
                engine.convert_sentences(&sentences, None).await?
            } else {
                engine.convert_text_to_speech(&text, None, None).await?
            };
            monitor.log_phase("Speech synthesis");

            let player = AudioPlayer::new(config.tts.playback, console, profiler.clone());
            let path = player.play_speech_response(&path, &text, false).await?;
            println!("🔊 Audio saved to: {}", path.display());
        }
        Command::Upload { file, dest } => {
            let storage = ConfiguredStorage::from_config(config).await?;
            let key = storage.upload_file(&file, dest.as_deref()).await?;
            monitor.log_phase("Upload");
            println!("✅ Uploaded {} as {}", file.display(), key);
        }
        Command::Download { key, file } => {
            let storage = ConfiguredStorage::from_config(config).await?;
            storage.download_file(&key, &file).await?;
            monitor.log_phase("Download");
            println!("✅ Downloaded {} to {}", key, file.display());
        }
        Command::StreamUrl { key, minutes } => {
            if minutes == 0 {
                return Err(GangliaError::ValidationError {
                    message: "--minutes must be at least 1".to_string(),
                });
            }
            let storage = ConfiguredStorage::from_config(config).await?;
            let url = video_stream_url(&storage, &key, minutes).await?;
            println!("{}", url);
        }
    }

    Ok(())
}
