//! Модуль для работы с файлами одного запроса
//!
//! Каждый запуск конвейера получает собственный идентификатор, который входит
//! в имена всех выходных файлов, и собственную временную директорию для
//! промежуточных файлов. Параллельные запросы не пересекаются по путям.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;
use crate::error::Result;

/// Файлы одного запроса
pub struct RequestFiles {
    /// Идентификатор запроса
    id: Uuid,
    /// Временная директория
    temp_dir: Option<TempDir>,
    /// Список созданных временных файлов
    files: Vec<PathBuf>,
    /// Нужно ли удалять файлы при завершении
    cleanup: bool,
}

impl RequestFiles {
    /// Создать новый набор файлов запроса
    pub fn new(cleanup: bool) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("mood-narrator-").tempdir()?;

        Ok(Self {
            id: Uuid::new_v4(),
            temp_dir: Some(temp_dir),
            files: Vec::new(),
            cleanup,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Зарезервировать путь временного файла внутри директории запроса
    pub fn temp_file(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_path = self
            .temp_dir_path()
            .join(format!("{}_{}.{}", prefix, Uuid::new_v4().simple(), extension));
        self.files.push(file_path.clone());
        file_path
    }

    /// Путь выходного файла `dir/prefix_<id>.extension`, директория создаётся при необходимости
    pub fn output_file(&self, dir: &Path, prefix: &str, extension: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        Ok(dir.join(format!("{}_{}.{}", prefix, self.id.simple(), extension)))
    }

    /// Получить путь к временной директории
    pub fn temp_dir_path(&self) -> &Path {
        match &self.temp_dir {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }

    /// Очистить временные файлы
    ///
    /// Удаляются все файлы, которые получилось удалить; возвращается первая ошибка.
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.cleanup {
            return Ok(());
        }

        let mut first_error = None;
        for file in self.files.drain(..) {
            if file.exists() {
                if let Err(e) = fs::remove_file(&file) {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Очистить временные файлы; ошибка очистки только пишется в лог
    pub fn release(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("Failed to clean up temporary files of {}: {}", self.id.simple(), e);
        }
    }
}

impl Drop for RequestFiles {
    fn drop(&mut self) {
        let _ = self.cleanup();
        if !self.cleanup {
            // Оставляем директорию для отладки
            if let Some(dir) = self.temp_dir.take() {
                let kept = dir.into_path();
                log::debug!("Keeping request temp dir {}", kept.display());
            }
        }
    }
}
