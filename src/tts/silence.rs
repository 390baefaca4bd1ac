//! Последнее звено цепочки: тишина длительностью, пропорциональной тексту

use std::path::Path;
use async_trait::async_trait;
use crate::error::{NarratorError, Result};
use crate::media::codec;
use crate::media::segment::AudioSegment;
use crate::tts::{EngineKind, SpeechEngine, SpeechRequest};
use crate::utils::ffmpeg::Ffmpeg;

/// Минимальная длительность тишины, мс
pub const MIN_SILENCE_MS: u64 = 1000;
/// Длительность тишины на символ текста, мс
pub const SILENCE_MS_PER_CHAR: u64 = 60;
/// Частота дискретизации тишины
pub const SILENCE_SAMPLE_RATE: u32 = 24000;

/// Длительность тишины для текста
pub fn silence_duration_ms(text: &str) -> u64 {
    std::cmp::max(MIN_SILENCE_MS, SILENCE_MS_PER_CHAR * text.chars().count() as u64)
}

#[derive(Debug, Clone)]
pub struct SilenceEngine {
    ffmpeg: Option<Ffmpeg>,
    bitrate: String,
}

impl SilenceEngine {
    pub fn new(ffmpeg: Option<Ffmpeg>, bitrate: impl Into<String>) -> Self {
        Self {
            ffmpeg,
            bitrate: bitrate.into(),
        }
    }
}

#[async_trait]
impl SpeechEngine for SilenceEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Silence
    }

    fn is_eligible(&self, _request: &SpeechRequest) -> bool {
        true
    }

    async fn synthesize(&self, request: &SpeechRequest, destination: &Path) -> Result<()> {
        let duration_ms = silence_duration_ms(&request.text);
        log::warn!("Writing {} ms of silence instead of speech", duration_ms);

        let segment = AudioSegment::silent(duration_ms, SILENCE_SAMPLE_RATE);
        let destination = destination.to_path_buf();
        let ffmpeg = self.ffmpeg.clone();
        let bitrate = self.bitrate.clone();

        tokio::task::spawn_blocking(move || codec::export(&segment, &destination, ffmpeg.as_ref(), &bitrate))
            .await
            .map_err(|e| NarratorError::Other(format!("Silence export task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Accent, EnginePreference, Gender};

    #[test]
    fn test_silence_duration() {
        assert_eq!(silence_duration_ms(""), 1000);
        assert_eq!(silence_duration_ms("Hi"), 1000);
        assert_eq!(silence_duration_ms(&"a".repeat(50)), 3000);
        assert_eq!(silence_duration_ms(&"ж".repeat(50)), 3000);
    }

    #[tokio::test]
    async fn test_writes_silent_wav() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("narration.wav");
        let request = SpeechRequest::new("a".repeat(25), EnginePreference::Edge, Accent::EnUs, Gender::Female);

        SilenceEngine::new(None, "192k").synthesize(&request, &destination).await.unwrap();

        let segment = codec::decode_file(&destination).unwrap();
        assert_eq!(segment.duration_ms(), 1500);
        assert_eq!(segment.peak(), 0.0);
    }
}
