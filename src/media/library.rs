//! Библиотека фоновой музыки
//!
//! Каталог с файлами по настроениям (`calm.mp3`, `rainy.mp3`, ...). Библиотека
//! только читается, поэтому безопасно разделяется между параллельными запросами.

use std::path::{Component, Path, PathBuf};
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;
use crate::media::codec::is_audio_file;
use crate::mood::Mood;

/// Доступная фоновая дорожка
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackOption {
    /// Подпись для пользователя ("Calm")
    pub label: String,
    /// Абсолютный или относительный путь к файлу
    pub path: PathBuf,
}

/// Выбор фоновой дорожки в запросе
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundChoice {
    /// Первая подходящая по настроению дорожка
    #[default]
    Auto,
    /// Без фоновой музыки
    None,
    /// Дорожка с указанной подписью или именем файла
    Named(String),
}

impl BackgroundChoice {
    /// Разобрать значение из формы: пусто/"auto" → Auto, "none" → None, иначе имя
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Auto,
            Some(v) if v.eq_ignore_ascii_case("auto") => Self::Auto,
            Some(v) if v.eq_ignore_ascii_case("none") => Self::None,
            Some(v) => Self::Named(v.to_string()),
        }
    }
}

/// Файлы библиотеки для настроения
fn mood_files(mood: Mood) -> &'static [&'static str] {
    match mood {
        Mood::Happy => &["happy.mp3"],
        Mood::Sad => &["sad.mp3"],
        Mood::Romantic => &["romantic.mp3"],
        Mood::Intense => &["intense.mp3"],
        Mood::Calm => &["calm.mp3"],
        Mood::Rainy => &["rainy.mp3"],
    }
}

/// Подпись дорожки по имени файла: "calm.mp3" → "Calm"
fn label_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Путь файла `name` прямо в каталоге `root`; `None`, если имя выводит за его пределы
fn library_path(root: &Path, name: &str) -> Option<PathBuf> {
    let root = root.clean();
    let candidate = root.join(name).clean();

    let single_file = {
        let relative = if root == Path::new(".") {
            candidate.as_path()
        } else {
            candidate.strip_prefix(&root).ok()?
        };
        let mut components = relative.components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
    };

    single_file.then_some(candidate)
}

/// Библиотека фоновой музыки
#[derive(Debug, Clone)]
pub struct TrackLibrary {
    root: PathBuf,
}

impl TrackLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Дорожки для настроения.
    ///
    /// Возвращает только существующие файлы из таблицы настроения; если таких нет,
    /// возвращает все аудиофайлы корня библиотеки. Никогда не завершается ошибкой.
    pub fn tracks_for(&self, mood: Mood) -> Vec<TrackOption> {
        let tracks: Vec<TrackOption> = mood_files(mood)
            .iter()
            .map(|name| self.root.join(name))
            .filter(|path| path.is_file())
            .map(|path| TrackOption { label: label_for(&path), path })
            .collect();

        if !tracks.is_empty() {
            return tracks;
        }

        log::debug!("No {} tracks in {}, scanning library", mood, self.root.display());
        self.all_tracks()
    }

    /// Все аудиофайлы в корне библиотеки, по имени файла
    pub fn all_tracks(&self) -> Vec<TrackOption> {
        if !self.root.is_dir() {
            return Vec::new();
        }

        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
            .map(|entry| TrackOption {
                label: label_for(entry.path()),
                path: entry.into_path(),
            })
            .collect()
    }

    /// Найти дорожку по подписи или имени файла.
    ///
    /// Пути, выходящие за пределы библиотеки, отвергаются.
    pub fn resolve(&self, name: &str) -> Option<TrackOption> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some(track) = self
            .all_tracks()
            .into_iter()
            .find(|track| track.label.eq_ignore_ascii_case(name))
        {
            return Some(track);
        }

        let candidate = match library_path(&self.root, name) {
            Some(path) => path,
            None => {
                log::warn!("Rejecting background outside library: {}", name);
                return None;
            }
        };
        if candidate.is_file() && is_audio_file(&candidate) {
            return Some(TrackOption {
                label: label_for(&candidate),
                path: candidate,
            });
        }
        None
    }

    /// Выбрать дорожку по запросу; `Named` без совпадения откатывается к `Auto`
    pub fn choose(&self, choice: &BackgroundChoice, options: &[TrackOption]) -> Option<TrackOption> {
        match choice {
            BackgroundChoice::None => None,
            BackgroundChoice::Auto => options.first().cloned(),
            BackgroundChoice::Named(name) => self.resolve(name).or_else(|| {
                log::warn!("Background {:?} not found, using mood default", name);
                options.first().cloned()
            }),
        }
    }
}
