//! Сведение озвучки с фоновой музыкой

use std::path::Path;
use crate::error::Result;
use crate::media::codec;
use crate::media::segment::{AudioSegment, NORMALIZE_HEADROOM_DB};
use crate::utils::ffmpeg::Ffmpeg;

/// Насколько фон тише озвучки, дБ
pub const BACKGROUND_DUCK_DB: f32 = 8.0;

const FADE_IN_MS: u32 = 600;
const FADE_OUT_MS: u32 = 800;
const PLAIN_FADE_IN_MS: u32 = 300;
const PLAIN_FADE_OUT_MS: u32 = 300;

/// Микшер озвучки и фоновой дорожки
#[derive(Debug, Clone)]
pub struct AudioMixer {
    ffmpeg: Option<Ffmpeg>,
    bitrate: String,
}

impl AudioMixer {
    pub fn new(ffmpeg: Option<Ffmpeg>, bitrate: impl Into<String>) -> Self {
        Self {
            ffmpeg,
            bitrate: bitrate.into(),
        }
    }

    /// Свести озвучку с фоном и записать результат в `destination`.
    ///
    /// Длина результата всегда равна длине озвучки. Фон, который не удалось
    /// прочитать, считается отсутствующим.
    pub fn mix(&self, narration_path: &Path, background: Option<&Path>, destination: &Path) -> Result<()> {
        let narration = codec::decode_file(narration_path)?;
        log::info!(
            "Mixing narration {} ({} ms)",
            narration_path.display(),
            narration.duration_ms()
        );

        let background = background.and_then(|path| match codec::decode_file(path) {
            Ok(segment) if !segment.is_empty() => Some(segment),
            Ok(_) => {
                log::warn!("Background {} is empty, mixing without it", path.display());
                None
            }
            Err(e) => {
                log::warn!("Failed to decode background {}: {}", path.display(), e);
                None
            }
        });

        let mixed = match background {
            Some(background) => mix_with_background(&narration, &background)?,
            None => narration
                .fade_in(PLAIN_FADE_IN_MS)
                .fade_out(PLAIN_FADE_OUT_MS),
        };

        codec::export(&mixed, destination, self.ffmpeg.as_ref(), &self.bitrate)?;
        log::info!("Final audio written to {}", destination.display());
        Ok(())
    }
}

/// Наложить фон под озвучку: фон подгоняется по частоте и длине и приглушается
/// до уровня на [`BACKGROUND_DUCK_DB`] ниже озвучки
pub fn mix_with_background(narration: &AudioSegment, background: &AudioSegment) -> Result<AudioSegment> {
    let narration = narration.normalize(NORMALIZE_HEADROOM_DB);
    let frames = narration.len();

    let background = background
        .resample(narration.sample_rate())?
        .loop_to(frames)
        .truncate(frames);

    let target_dbfs = narration.dbfs() - BACKGROUND_DUCK_DB;
    let background = background.normalize(NORMALIZE_HEADROOM_DB);
    let gain = target_dbfs - background.dbfs();
    log::debug!("Background gain {:.2} dB (target {:.2} dBFS)", gain, target_dbfs);
    let background = background.apply_gain(gain);

    Ok(narration
        .overlay(&background)?
        .fade_in(FADE_IN_MS)
        .fade_out(FADE_OUT_MS))
}
