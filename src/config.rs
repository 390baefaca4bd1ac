//! Модуль конфигурации библиотеки mood-narrator
//!
//! Этот модуль содержит структуры и перечисления для настройки конвейера:
//! выбор движка речи, акцента и пола голоса, пути к медиа и внешним инструментам.
//! Конфигурация собирается один раз при старте и проверяется методом [`NarratorConfig::validate`].

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{NarratorError, Result};
use crate::utils::ffmpeg::Ffmpeg;

/// Предпочитаемый движок синтеза речи
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Нейронные голоса Edge (основной движок)
    #[default]
    Edge,
    /// Google Translate TTS (запасной движок)
    Gtts,
}

impl EnginePreference {
    /// Разобрать ключ движка из формы ("edge" / "gtts"), неизвестное значение даёт `Gtts`
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_lowercase().as_str() {
            "edge" => Self::Edge,
            _ => Self::Gtts,
        }
    }

    /// Получить строковое представление движка
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Gtts => "gtts",
        }
    }
}

/// Акцент диктора
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Accent {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "en-IN")]
    EnIn,
    #[serde(rename = "en-AU")]
    EnAu,
}

impl Accent {
    /// Все поддерживаемые акценты
    pub const ALL: [Accent; 4] = [Accent::EnUs, Accent::EnGb, Accent::EnIn, Accent::EnAu];

    /// Разобрать код акцента; неизвестный код даёт en-US
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|accent| accent.code().eq_ignore_ascii_case(code.trim()))
            .unwrap_or_default()
    }

    /// Код акцента в формате BCP 47
    pub fn code(&self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::EnGb => "en-GB",
            Self::EnIn => "en-IN",
            Self::EnAu => "en-AU",
        }
    }

    /// Человекочитаемое название региона
    pub fn region_label(&self) -> &'static str {
        match self {
            Self::EnUs => "US",
            Self::EnGb => "British",
            Self::EnIn => "Indian",
            Self::EnAu => "Australian",
        }
    }
}

/// Пол голоса
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Gender {
    Male,
    #[default]
    Female,
}

impl Gender {
    /// Разобрать пол из формы; всё, кроме "male", считается женским голосом
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("male") {
            Self::Male
        } else {
            Self::Female
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

/// Формат итоговых аудиофайлов
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3 (требует FFmpeg для кодирования)
    #[default]
    Mp3,
    /// WAV, 32-бит float
    Wav,
}

impl AudioFormat {
    /// Расширение файла без точки
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    /// Определить формат по расширению пути
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }
}

/// Конфигурация конвейера
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    /// Адрес сервиса генерации изображений; промпт добавляется сегментом пути
    pub poster_endpoint: String,
    /// Ключ сервиса изображений (необязательный)
    pub image_api_key: Option<String>,
    /// Таймаут запроса постера в секундах
    pub poster_timeout_secs: u64,
    /// Таймаут одной попытки синтеза речи в секундах
    pub speech_timeout_secs: u64,
    /// Шаблон адреса Google Translate TTS, `{tld}` заменяется региональным доменом
    pub google_tts_url: String,
    /// Каталог с фоновой музыкой
    pub bg_root: PathBuf,
    /// Каталог для сгенерированных файлов
    pub media_root: PathBuf,
    /// URL-префикс, под которым раздаётся `media_root`
    pub media_url: String,
    /// Формат итогового аудио
    pub output_format: AudioFormat,
    /// Битрейт MP3
    pub mp3_bitrate: String,
    /// Путь к FFmpeg; если не указан, ищется в PATH
    pub ffmpeg_path: Option<PathBuf>,
    /// Путь к утилите edge-tts; если не указан, ищется в PATH
    pub edge_tts_path: Option<PathBuf>,
    /// Удалять промежуточные файлы после завершения
    pub cleanup_temp_files: bool,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            poster_endpoint: "https://image.pollinations.ai/prompt".to_string(),
            image_api_key: None,
            poster_timeout_secs: 60,
            speech_timeout_secs: 30,
            google_tts_url: "https://translate.google.{tld}/translate_tts".to_string(),
            bg_root: PathBuf::from("bg_music"),
            media_root: PathBuf::from("media"),
            media_url: "/media/".to_string(),
            output_format: AudioFormat::default(),
            mp3_bitrate: "192k".to_string(),
            ffmpeg_path: None,
            edge_tts_path: None,
            cleanup_temp_files: true,
        }
    }
}

impl NarratorConfig {
    /// Собрать конфигурацию из переменных окружения поверх значений по умолчанию
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Собрать конфигурацию из произвольного источника пар ключ/значение
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(endpoint) = get("NARRATOR_POSTER_ENDPOINT") {
            config.poster_endpoint = endpoint;
        }
        config.image_api_key = get("NARRATOR_IMAGE_KEY")
            .or_else(|| get("POLLINATIONS_TOKEN"))
            .or_else(|| get("STABILITY_KEY"));
        if let Some(value) = get("NARRATOR_POSTER_TIMEOUT") {
            config.poster_timeout_secs = parse_secs("NARRATOR_POSTER_TIMEOUT", &value)?;
        }
        if let Some(value) = get("NARRATOR_SPEECH_TIMEOUT") {
            config.speech_timeout_secs = parse_secs("NARRATOR_SPEECH_TIMEOUT", &value)?;
        }
        if let Some(root) = get("NARRATOR_BG_ROOT") {
            config.bg_root = PathBuf::from(root);
        }
        if let Some(root) = get("NARRATOR_MEDIA_ROOT") {
            config.media_root = PathBuf::from(root);
        }
        if let Some(url) = get("NARRATOR_MEDIA_URL") {
            config.media_url = url;
        }
        if let Some(format) = get("NARRATOR_OUTPUT_FORMAT") {
            config.output_format = match format.to_lowercase().as_str() {
                "mp3" => AudioFormat::Mp3,
                "wav" => AudioFormat::Wav,
                other => {
                    return Err(NarratorError::Configuration(format!(
                        "Unsupported NARRATOR_OUTPUT_FORMAT: {}",
                        other
                    )))
                }
            };
        }
        if let Some(path) = get("NARRATOR_FFMPEG") {
            config.ffmpeg_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("NARRATOR_EDGE_TTS") {
            config.edge_tts_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Проверить конфигурацию и найти FFmpeg.
    ///
    /// FFmpeg обязателен только для вывода в MP3; для WAV отсутствие FFmpeg допустимо.
    pub fn validate(&self) -> Result<Option<Ffmpeg>> {
        if self.poster_timeout_secs == 0 || self.speech_timeout_secs == 0 {
            return Err(NarratorError::Configuration(
                "Timeouts must be greater than zero".to_string(),
            ));
        }
        if !self.google_tts_url.contains("{tld}") {
            return Err(NarratorError::Configuration(
                "google_tts_url must contain a {tld} placeholder".to_string(),
            ));
        }

        match Ffmpeg::locate(self.ffmpeg_path.as_deref()) {
            Ok(ffmpeg) => {
                log::info!("Using ffmpeg at {}", ffmpeg.path().display());
                Ok(Some(ffmpeg))
            }
            Err(e) if self.output_format == AudioFormat::Mp3 => {
                log::error!("MP3 output requires ffmpeg: {}", e);
                Err(e)
            }
            Err(e) => {
                log::warn!("ffmpeg unavailable, WAV output only: {}", e);
                Ok(None)
            }
        }
    }

    pub fn poster_timeout(&self) -> Duration {
        Duration::from_secs(self.poster_timeout_secs)
    }

    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech_timeout_secs)
    }

    /// Построить публичный URL для файла внутри `media_root`
    pub fn media_url_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.media_root).ok()?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("{}/{}", self.media_url.trim_end_matches('/'), relative))
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        NarratorError::Configuration(format!("{} must be a number of seconds, got {:?}", key, value))
    })
}
