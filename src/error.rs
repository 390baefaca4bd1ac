//! Модуль обработки ошибок библиотеки mood-narrator
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе конвейера.
//! Большая часть сбоев внешних сервисов гасится цепочками запасных вариантов,
//! наружу выходят только ошибки озвучки и сведения.

use thiserror::Error;

/// Ошибки библиотеки mood-narrator
#[derive(Debug, Error)]
pub enum NarratorError {
    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка чтения/записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка обработки изображения
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Ошибка декодирования аудио
    #[error("Audio decoding error: {0}")]
    AudioDecoding(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка отдельного движка синтеза речи
    #[error("Speech synthesis error: {0}")]
    SpeechSynthesis(String),

    /// Не удалось получить никакой озвучки, даже тишину
    #[error("Narration failed: {0}")]
    NarrationFailed(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Внешний инструмент не найден
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Некорректный путь
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Превышено время ожидания
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for NarratorError {
    fn from(s: &str) -> Self {
        NarratorError::Other(s.to_string())
    }
}

impl From<String> for NarratorError {
    fn from(s: String) -> Self {
        NarratorError::Other(s)
    }
}

/// Тип Result для библиотеки mood-narrator
pub type Result<T> = std::result::Result<T, NarratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let io: NarratorError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(io, NarratorError::Io(_)));
        assert_eq!(io.to_string(), "IO error: missing");

        let other: NarratorError = "mixing task failed".into();
        assert_eq!(other.to_string(), "Other error: mixing task failed");
    }
}
