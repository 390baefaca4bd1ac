//! Модуль для работы с FFmpeg
//!
//! FFmpeg нужен только для кодирования MP3; декодирование выполняется symphonia.
//! Путь к бинарнику определяется один раз при проверке конфигурации и дальше
//! передаётся явно, без изменения переменных окружения процесса.

use std::path::{Path, PathBuf};
use std::process::Command;
use crate::error::{NarratorError, Result};

/// Проверенный путь к FFmpeg
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    path: PathBuf,
}

impl Ffmpeg {
    /// Найти FFmpeg: явно указанный путь или поиск в PATH
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        let path = match configured {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                return Err(NarratorError::ToolNotFound(format!(
                    "ffmpeg not found at {}",
                    path.display()
                )))
            }
            None => which::which("ffmpeg").map_err(|e| {
                NarratorError::ToolNotFound(format!("ffmpeg not found in PATH: {}", e))
            })?,
        };

        let ffmpeg = Self { path };
        if !ffmpeg.check_installed()? {
            return Err(NarratorError::ToolNotFound(format!(
                "{} -version failed",
                ffmpeg.path.display()
            )));
        }
        Ok(ffmpeg)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Проверка, что бинарник запускается
    pub fn check_installed(&self) -> Result<bool> {
        let output = Command::new(&self.path).arg("-version").output()?;
        Ok(output.status.success())
    }

    /// Получение версии FFmpeg
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.path).arg("-version").output()?;

        if !output.status.success() {
            return Err(NarratorError::Other("Failed to get FFmpeg version".to_string()));
        }

        let version_str = String::from_utf8_lossy(&output.stdout);
        Ok(version_str.lines().next().unwrap_or("").to_string())
    }

    /// Запуск команды FFmpeg
    pub fn run(&self, args: &[&str]) -> Result<()> {
        log::debug!("ffmpeg {}", args.join(" "));
        let output = Command::new(&self.path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .args(args)
            .output()?;

        if !output.status.success() {
            return Err(NarratorError::AudioProcessing(format!(
                "FFmpeg command failed with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    /// Кодирование WAV в MP3 с заданным битрейтом
    pub fn encode_mp3(&self, input: &Path, output: &Path, bitrate: &str) -> Result<()> {
        let input = path_str(input)?;
        let output = path_str(output)?;
        self.run(&[
            "-i", input,
            "-codec:a", "libmp3lame",
            "-b:a", bitrate,
            "-y", output,
        ])
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        NarratorError::InvalidPath(format!("Path is not valid UTF-8: {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_configured_path() {
        let result = Ffmpeg::locate(Some(Path::new("/no/such/dir/ffmpeg")));
        assert!(matches!(result, Err(NarratorError::ToolNotFound(_))));
    }
}
