use crate::utils::error::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const TEMP_DIR_ENV: &str = "GANGLIA_TEMP_DIR";
pub const CONFIG_PATH_ENV: &str = "GANGLIA_CONFIG";

/// Scratch area shared by the dispatcher and the TTS engines.
///
/// Cloning is cheap; clones share the lazily created run directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    run_dir: Arc<Mutex<Option<PathBuf>>>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            run_dir: Arc::new(Mutex::new(None)),
        })
    }

    /// `$GANGLIA_TEMP_DIR` if set, otherwise `<system tmp>/GANGLIA`.
    pub fn from_env() -> Result<Self> {
        Self::new(default_temp_root(None))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tts_dir(&self) -> Result<PathBuf> {
        let dir = self.root.join("tts");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Per-run directory for text-to-video artefacts. Created on first use,
    /// the same path is returned for the rest of the process.
    pub fn run_dir(&self) -> Result<PathBuf> {
        let mut guard = self
            .run_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(dir) = guard.as_ref() {
            return Ok(dir.clone());
        }
        let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();
        let dir = self.root.join("ttv").join(stamp);
        std::fs::create_dir_all(&dir)?;
        tracing::info!("📁 TTV directory created: {}", dir.display());
        *guard = Some(dir.clone());
        Ok(dir)
    }

    /// Keeps a copy of every model reply next to the audio it produced.
    pub fn write_raw_output(&self, text: &str) -> Result<PathBuf> {
        let path = self
            .root
            .join(format!("chatgpt_output_{}_raw.txt", file_timestamp()));
        std::fs::write(&path, text)?;
        Ok(path)
    }
}

pub(crate) fn default_temp_root(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    match std::env::var_os(TEMP_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::temp_dir().join("GANGLIA"),
    }
}

pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config").join("ganglia.toml"))
}

/// `YYYYmmdd-HHMMSS`, used for reply files.
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// `YYYYmmdd-HHMMSS-micros`, for files generated in parallel.
pub fn precise_timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S-%6f").to_string()
}
