use crate::config::toml_config::{GangliaConfig, TtsEngineKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "ganglia")]
#[command(about = "GANGLIA shared utilities: chat, speech and media storage")]
pub struct CliArgs {
    /// Path to a TOML config (defaults to $GANGLIA_CONFIG or config/ganglia.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Prefix log lines with timestamps")]
    pub timestamps: bool,

    #[arg(long, global = true, help = "Log and summarise operation timings")]
    pub timing: bool,

    #[arg(long, global = true, help = "Enable system resource monitoring")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send a prompt to the chat model
    Ask {
        prompt: String,
        #[arg(long, help = "Print the reply sentence by sentence as it streams")]
        stream: bool,
        #[arg(long, help = "Request a spoken reply from the audio model")]
        audio: bool,
        #[arg(long)]
        pre_prompt: Option<String>,
    },
    /// Convert text to an audio file
    Speak {
        text: String,
        #[arg(long)]
        engine: Option<TtsEngineKind>,
        #[arg(long)]
        voice: Option<String>,
        #[arg(long, help = "Play the result with ffplay")]
        play: bool,
    },
    /// Upload a local file to the configured storage
    Upload {
        file: PathBuf,
        #[arg(long)]
        dest: Option<String>,
    },
    /// Download an object to a local file
    Download { key: String, file: PathBuf },
    /// Print a time-limited video URL for an object
    StreamUrl {
        key: String,
        #[arg(long, default_value = "60")]
        minutes: u64,
    },
}

impl CliArgs {
    /// Flags given on the command line win over the file.
    pub fn apply_to(&self, config: &mut GangliaConfig) {
        config.logging.verbose |= self.verbose;
        config.logging.timestamps |= self.timestamps;
        config.logging.timing |= self.timing;

        if let Command::Speak {
            engine, voice, play, ..
        } = &self.command
        {
            if let Some(engine) = engine {
                config.tts.engine = *engine;
            }
            if voice.is_some() {
                config.tts.voice = voice.clone();
            }
            config.tts.playback |= *play;
        }
    }
}
