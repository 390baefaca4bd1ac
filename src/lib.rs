//! Основной файл библиотеки mood-narrator
//!
//! Библиотека превращает фрагмент текста в озвучку под настроение текста
//! с фоновой музыкой и постер. Конвейер: определение настроения, построение
//! промпта, параллельная генерация постера и озвучки, выбор фоновой дорожки
//! и сведение.

pub mod config;
pub mod error;
pub mod media;
pub mod mood;
pub mod poster;
pub mod progress;
pub mod prompt;
pub mod tts;
pub mod utils;

use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use crate::config::{Accent, AudioFormat, EnginePreference, Gender, NarratorConfig};
pub use crate::error::{NarratorError, Result};
pub use crate::media::library::{BackgroundChoice, TrackLibrary, TrackOption};
pub use crate::media::mixer::AudioMixer;
pub use crate::mood::Mood;
pub use crate::poster::{PosterOutcome, PosterProvider};
pub use crate::progress::{ProcessStep, ProgressTracker};
pub use crate::prompt::ImagePrompt;
pub use crate::tts::{available_voices, EngineKind, NarrationSynthesizer, SpeechRequest, VoiceOption};

use crate::utils::ffmpeg::Ffmpeg;
use crate::utils::temp::RequestFiles;

/// Запрос на генерацию
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub text: String,
    pub engine: EnginePreference,
    pub accent: Accent,
    pub gender: Gender,
    pub background: BackgroundChoice,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Результат генерации
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Идентификатор запроса, входит в имена файлов
    pub id: String,
    pub mood: Mood,
    pub prompt: String,
    /// Движок, которым получена озвучка
    pub engine: EngineKind,
    pub narration_url: String,
    /// Итоговое аудио с фоновой музыкой
    pub audio_url: String,
    /// Отсутствует, если постер не удалось ни скачать, ни нарисовать
    pub poster_url: Option<String>,
    pub poster: PosterOutcome,
    pub background: Option<TrackOption>,
    pub background_options: Vec<TrackOption>,
    pub created_at: DateTime<Utc>,
}

/// Конвейер генерации
pub struct MoodNarrator {
    config: NarratorConfig,
    poster: PosterProvider,
    synthesizer: NarrationSynthesizer,
    library: TrackLibrary,
    mixer: AudioMixer,
    rng: Mutex<StdRng>,
    progress_tracker: Option<ProgressTracker>,
}

impl MoodNarrator {
    /// Собрать конвейер по проверенной конфигурации
    pub fn new(config: NarratorConfig, ffmpeg: Option<Ffmpeg>) -> Self {
        Self {
            poster: PosterProvider::from_config(&config),
            synthesizer: NarrationSynthesizer::new(&config, ffmpeg.clone()),
            library: TrackLibrary::new(config.bg_root.clone()),
            mixer: AudioMixer::new(ffmpeg, config.mp3_bitrate.clone()),
            rng: Mutex::new(StdRng::from_entropy()),
            progress_tracker: None,
            config,
        }
    }

    /// Заменить цепочку движков речи
    pub fn with_synthesizer(mut self, synthesizer: NarrationSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Детерминированный выбор запасных сцен
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_progress(mut self, tracker: ProgressTracker) -> Self {
        self.progress_tracker = Some(tracker);
        self
    }

    pub fn config(&self) -> &NarratorConfig {
        &self.config
    }

    pub fn library(&self) -> &TrackLibrary {
        &self.library
    }

    /// Запустить конвейер для запроса.
    ///
    /// Ошибка постера никогда не прерывает конвейер; ошибкой завершаются
    /// только озвучка и сведение.
    pub async fn process(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let tracker = self.progress_tracker.as_ref();
        log::info!("Starting generation ({} chars)", request.text.chars().count());

        if let Some(t) = tracker {
            t.set_step(ProcessStep::MoodDetection);
        }
        let mood = mood::classify(&request.text);
        log::info!("Detected mood: {}", mood);

        if let Some(t) = tracker {
            t.set_step(ProcessStep::PromptComposition);
        }
        let prompt = {
            let mut rng = self.rng.lock();
            prompt::compose(&request.text, mood, &mut *rng)
        };
        log::debug!("Poster prompt: {}", prompt);

        let mut files = RequestFiles::new(self.config.cleanup_temp_files)?;
        let extension = self.config.output_format.extension();
        let (audio_dir, poster_dir) = media_dirs(&self.config);
        let narration_path = files.output_file(&audio_dir, "narration", extension)?;
        let final_path = files.output_file(&audio_dir, "final", extension)?;
        let poster_path = files.output_file(&poster_dir, "poster", "jpg")?;

        if let Some(t) = tracker {
            t.set_step(ProcessStep::MediaGeneration);
            t.update_step_progress(0.0, Some(format!("mood: {}", mood)));
        }
        let speech = SpeechRequest::new(request.text.clone(), request.engine, request.accent, request.gender);
        let (poster, narration) = tokio::join!(
            self.poster.provide(&prompt, mood, &poster_path),
            self.synthesizer.synthesize(&speech, &narration_path),
        );
        let narration = match narration {
            Ok(narration) => narration,
            Err(e) => {
                if poster.is_present() {
                    discard_file(&poster_path).await;
                }
                return Err(e);
            }
        };

        if let Some(t) = tracker {
            t.set_step(ProcessStep::BackgroundSelection);
        }
        let background_options = self.library.tracks_for(mood);
        let background = self.library.choose(&request.background, &background_options);
        match &background {
            Some(track) => log::info!("Background track: {}", track.label),
            None => log::info!("No background track"),
        }

        if let Some(t) = tracker {
            t.set_step(ProcessStep::Mixing);
        }
        let staged = files.temp_file("final", extension);
        let mixer = self.mixer.clone();
        let narration_file = narration.path.clone();
        let background_file = background.as_ref().map(|track| track.path.clone());
        let staged_file = staged.clone();
        tokio::task::spawn_blocking(move || {
            mixer.mix(&narration_file, background_file.as_deref(), &staged_file)
        })
        .await
        .map_err(|e| NarratorError::Other(format!("Mixing task failed: {}", e)))??;
        tokio::fs::copy(&staged, &final_path).await?;
        files.release();

        if let Some(t) = tracker {
            t.complete();
        }

        let result = GenerationResult {
            id: files.id().simple().to_string(),
            mood,
            prompt: prompt.as_str().to_string(),
            engine: narration.engine,
            narration_url: self.url_for(&narration.path),
            audio_url: self.url_for(&final_path),
            poster_url: poster.is_present().then(|| self.url_for(&poster_path)),
            poster,
            background,
            background_options,
            created_at: Utc::now(),
        };
        log::info!("Generation {} finished", result.id);
        Ok(result)
    }

    fn url_for(&self, path: &Path) -> String {
        self.config
            .media_url_for(path)
            .unwrap_or_else(|| path.display().to_string())
    }
}

async fn discard_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Проверить конфигурацию и обработать текст с параметрами по умолчанию
pub async fn narrate(text: &str, config: NarratorConfig) -> Result<GenerationResult> {
    let ffmpeg = config.validate()?;
    MoodNarrator::new(config, ffmpeg)
        .process(&GenerationRequest::new(text))
        .await
}

/// Пути, по которым конвейер раскладывает файлы внутри `media_root`
pub fn media_dirs(config: &NarratorConfig) -> (PathBuf, PathBuf) {
    (config.media_root.join("audio"), config.media_root.join("posters"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let request: GenerationRequest = serde_json::from_str(r#"{"text": "Hello", "accent": "en-GB"}"#).unwrap();
        assert_eq!(request.text, "Hello");
        assert_eq!(request.accent, Accent::EnGb);
        assert_eq!(request.engine, EnginePreference::Edge);
        assert_eq!(request.gender, Gender::Female);
        assert_eq!(request.background, BackgroundChoice::Auto);
    }

    #[test]
    fn test_media_dirs() {
        let config = NarratorConfig {
            media_root: PathBuf::from("/srv/media"),
            ..NarratorConfig::default()
        };
        let (audio, posters) = media_dirs(&config);
        assert_eq!(audio, Path::new("/srv/media/audio"));
        assert_eq!(posters, Path::new("/srv/media/posters"));
    }
}
