//! Вспомогательные модули: FFmpeg, временные файлы, логирование

pub mod ffmpeg;
pub mod logger;
pub mod temp;
