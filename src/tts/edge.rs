//! Нейронные голоса Edge через утилиту `edge-tts`

use std::path::{Path, PathBuf};
use std::process::Stdio;
use async_trait::async_trait;
use tokio::process::Command;
use crate::config::{Accent, EnginePreference, Gender};
use crate::error::{NarratorError, Result};
use crate::media::codec;
use crate::tts::{EngineKind, SpeechEngine, SpeechRequest};
use crate::utils::ffmpeg::Ffmpeg;

/// Голос Edge для акцента и пола
pub fn voice_for(accent: Accent, gender: Gender) -> &'static str {
    match (accent, gender) {
        (Accent::EnUs, Gender::Male) => "en-US-GuyNeural",
        (Accent::EnUs, Gender::Female) => "en-US-JennyNeural",
        (Accent::EnGb, Gender::Male) => "en-GB-RyanNeural",
        (Accent::EnGb, Gender::Female) => "en-GB-SoniaNeural",
        (Accent::EnIn, Gender::Male) => "en-IN-PrabhatNeural",
        (Accent::EnIn, Gender::Female) => "en-IN-NeerjaNeural",
        (Accent::EnAu, Gender::Male) => "en-AU-WilliamNeural",
        (Accent::EnAu, Gender::Female) => "en-AU-NatashaNeural",
    }
}

/// Движок на основе `edge-tts`
#[derive(Debug, Clone)]
pub struct EdgeTtsEngine {
    binary: Option<PathBuf>,
    ffmpeg: Option<Ffmpeg>,
    bitrate: String,
}

impl EdgeTtsEngine {
    /// Создать движок; без явного пути утилита ищется в PATH
    pub fn new(configured: Option<&Path>, ffmpeg: Option<Ffmpeg>, bitrate: impl Into<String>) -> Self {
        let binary = match configured {
            Some(path) => Some(path.to_path_buf()),
            None => which::which("edge-tts").ok(),
        };
        match &binary {
            Some(path) => log::debug!("edge-tts found at {}", path.display()),
            None => log::info!("edge-tts not found, Edge voices are unavailable"),
        }

        Self {
            binary,
            ffmpeg,
            bitrate: bitrate.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.binary.as_ref().map(|path| path.exists()).unwrap_or(false)
    }
}

#[async_trait]
impl SpeechEngine for EdgeTtsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Edge
    }

    fn is_eligible(&self, request: &SpeechRequest) -> bool {
        request.engine == EnginePreference::Edge && self.is_available()
    }

    async fn synthesize(&self, request: &SpeechRequest, destination: &Path) -> Result<()> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| NarratorError::ToolNotFound("edge-tts".to_string()))?;
        let voice = voice_for(request.accent, request.gender);

        // edge-tts всегда пишет MP3
        let media = tempfile::Builder::new().suffix(".mp3").tempfile()?;
        log::debug!("Running edge-tts with voice {}", voice);

        let output = Command::new(binary)
            .arg("--voice")
            .arg(voice)
            .arg("--text")
            .arg(&request.text)
            .arg("--write-media")
            .arg(media.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NarratorError::SpeechSynthesis(format!(
                "edge-tts exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let data = tokio::fs::read(media.path()).await?;
        let destination = destination.to_path_buf();
        let ffmpeg = self.ffmpeg.clone();
        let bitrate = self.bitrate.clone();
        tokio::task::spawn_blocking(move || {
            codec::save_encoded(data, "mp3", &destination, ffmpeg.as_ref(), &bitrate)
        })
        .await
        .map_err(|e| NarratorError::Other(format!("edge-tts save task failed: {}", e)))?
    }
}
