//! ffmpeg/ffprobe/ffplay wrappers used to stitch and play synthesized audio.

use crate::utils::error::{GangliaError, Result};
use crate::utils::files::precise_timestamp;
use crate::utils::logger::{Console, Speaker};
use crate::utils::{Profiler, Workspace};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;

pub const PLAYBACK_ENV: &str = "PLAYBACK_MEDIA_IN_TESTS";

/// Writes an ffmpeg concat-demuxer list, one `file '<path>'` line per part.
pub fn write_concat_list(list_path: &Path, parts: &[PathBuf]) -> Result<()> {
    let content: String = parts
        .iter()
        .map(|part| {
            let escaped = part.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect();
    std::fs::write(list_path, content)?;
    Ok(())
}

/// Runs `ffmpeg -f concat` over an existing list file.
pub async fn concatenate_from_list(list_path: &Path, output: &Path) -> Result<()> {
    let output_result = Command::new("ffmpeg")
        .args(["-y", "-f", "concat", "-safe", "0", "-i"])
        .arg(list_path)
        .args(["-c", "copy"])
        .arg(output)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| GangliaError::media(format!("failed to run ffmpeg: {}", e)))?;

    if !output_result.status.success() {
        let stderr = String::from_utf8_lossy(&output_result.stderr);
        let last_line = stderr.lines().last().unwrap_or("no output").to_string();
        return Err(GangliaError::media(format!(
            "ffmpeg concat exited with {}: {}",
            output_result.status, last_line
        )));
    }
    Ok(())
}

/// Concatenates `parts` into `output`. The temporary list file is removed
/// whether or not ffmpeg succeeds.
pub async fn concatenate_audio(parts: &[PathBuf], output: &Path) -> Result<PathBuf> {
    let list_path = output.with_file_name(format!("concat_list_{}.txt", precise_timestamp()));
    write_concat_list(&list_path, parts)?;

    let result = concatenate_from_list(&list_path, output).await;
    if let Err(e) = std::fs::remove_file(&list_path) {
        tracing::debug!("could not remove {}: {}", list_path.display(), e);
    }
    result?;

    tracing::debug!(
        "Concatenated {} audio files into {}",
        parts.len(),
        output.display()
    );
    Ok(output.to_path_buf())
}

/// Best-effort removal of intermediate audio files.
pub(crate) fn remove_parts(parts: &[PathBuf]) {
    for part in parts {
        if let Err(e) = std::fs::remove_file(part) {
            tracing::debug!("could not remove {}: {}", part.display(), e);
        }
    }
}

/// Concatenates into `<tmp>/tts/concatenated_<ts>.mp3` and deletes the parts.
pub(crate) async fn concatenate_in_workspace(
    workspace: &Workspace,
    parts: &[PathBuf],
    profiler: &Profiler,
) -> Result<PathBuf> {
    let start = Instant::now();
    let output = workspace
        .tts_dir()?
        .join(format!("concatenated_{}.mp3", precise_timestamp()));
    let output = concatenate_audio(parts, &output).await?;
    remove_parts(parts);

    if profiler.is_enabled() {
        profiler.note(&format!(
            "[TTS] Concatenation took {:.2}s",
            start.elapsed().as_secs_f64()
        ));
    }
    Ok(output)
}

/// Duration in seconds as reported by ffprobe.
pub async fn audio_duration(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| GangliaError::media(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(GangliaError::media(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| GangliaError::media(format!("unexpected ffprobe output '{}': {}", raw.trim(), e)))
}

/// ffplay arguments; non-video files get a volume boost.
pub fn playback_args(path: &Path) -> Vec<String> {
    let mut args = vec!["-nodisp".to_string()];
    let is_video = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    if !is_video {
        args.push("-af".to_string());
        args.push("volume=5".to_string());
    }
    args.push("-autoexit".to_string());
    args.push(path.to_string_lossy().into_owned());
    args
}

/// Plays synthesized replies. Playback is off unless enabled in config or
/// through `PLAYBACK_MEDIA_IN_TESTS=true`.
pub struct AudioPlayer {
    enabled: bool,
    console: Arc<Console>,
    profiler: Profiler,
}

impl AudioPlayer {
    pub fn new(enabled: bool, console: Arc<Console>, profiler: Profiler) -> Self {
        let from_env = std::env::var(PLAYBACK_ENV)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            enabled: enabled || from_env,
            console,
            profiler,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `path` may be a concat list (`.txt`), which is stitched first.
    pub async fn play_speech_response(
        &self,
        path: &Path,
        text: &str,
        suppress_text: bool,
    ) -> Result<PathBuf> {
        let audio = if path.extension().is_some_and(|ext| ext == "txt") {
            let output = path.with_file_name("combined_audio.mp3");
            concatenate_from_list(path, &output).await?;
            output
        } else {
            path.to_path_buf()
        };

        if !self.enabled {
            tracing::debug!("Playback disabled, skipping {}", audio.display());
            return Ok(audio);
        }

        let duration = audio_duration(&audio).await?;
        if !suppress_text {
            self.console.say(
                Speaker::Agent,
                &format!("\nGANGLIA says... (Audio Duration: {:.1} seconds)", duration),
            );
            self.console.say(Speaker::Agent, text);
        }
        if self.profiler.is_enabled() {
            self.profiler.note(&format!(
                "[PLAYBACK] Starting audio playback NOW! (duration: {:.1}s)",
                duration
            ));
        }

        let status = Command::new("ffplay")
            .args(playback_args(&audio))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| GangliaError::media(format!("failed to run ffplay: {}", e)))?;
        if !status.success() {
            tracing::warn!("ffplay exited with {}", status);
        }
        Ok(audio)
    }
}
