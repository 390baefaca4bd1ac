//! Модуль для синтеза речи
//!
//! Озвучка строится цепочкой движков: нейронные голоса Edge, затем
//! Google Translate TTS, затем тишина. Каждый движок пробуется не больше
//! одного раза и ограничен по времени. Ошибкой считается только отказ
//! последнего звена цепочки.

pub mod edge;
pub mod google;
pub mod silence;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::config::{Accent, EnginePreference, Gender, NarratorConfig};
use crate::error::{NarratorError, Result};
use crate::utils::ffmpeg::Ffmpeg;

pub use edge::EdgeTtsEngine;
pub use google::GoogleTtsEngine;
pub use silence::SilenceEngine;

/// Параметры озвучки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub engine: EnginePreference,
    pub accent: Accent,
    pub gender: Gender,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, engine: EnginePreference, accent: Accent, gender: Gender) -> Self {
        Self {
            text: text.into(),
            engine,
            accent,
            gender,
        }
    }
}

/// Движок, которым получена озвучка
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Edge,
    Gtts,
    Silence,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Gtts => "gtts",
            Self::Silence => "silence",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Движок синтеза речи
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Можно ли пробовать этот движок для запроса
    fn is_eligible(&self, request: &SpeechRequest) -> bool;

    /// Озвучить текст и записать результат в `destination`
    async fn synthesize(&self, request: &SpeechRequest, destination: &Path) -> Result<()>;
}

/// Результат озвучки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationOutcome {
    pub engine: EngineKind,
    pub path: PathBuf,
}

/// Голос из каталога
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceOption {
    /// Идентификатор голоса Edge
    pub name: String,
    /// Подпись для пользователя ("US Female")
    pub label: String,
    pub accent: Accent,
    pub gender: Gender,
}

/// Все доступные голоса: каждый акцент в мужском и женском варианте
pub fn available_voices() -> Vec<VoiceOption> {
    Accent::ALL
        .into_iter()
        .flat_map(|accent| {
            [Gender::Female, Gender::Male].into_iter().map(move |gender| VoiceOption {
                name: edge::voice_for(accent, gender).to_string(),
                label: format!("{} {}", accent.region_label(), gender.as_str()),
                accent,
                gender,
            })
        })
        .collect()
}

/// Синтезатор озвучки с цепочкой запасных движков
pub struct NarrationSynthesizer {
    engines: Vec<Box<dyn SpeechEngine>>,
    timeout: Duration,
}

impl NarrationSynthesizer {
    /// Стандартная цепочка Edge → Google → тишина
    pub fn new(config: &NarratorConfig, ffmpeg: Option<Ffmpeg>) -> Self {
        let engines: Vec<Box<dyn SpeechEngine>> = vec![
            Box::new(EdgeTtsEngine::new(
                config.edge_tts_path.as_deref(),
                ffmpeg.clone(),
                config.mp3_bitrate.clone(),
            )),
            Box::new(GoogleTtsEngine::new(
                config.google_tts_url.clone(),
                ffmpeg.clone(),
                config.mp3_bitrate.clone(),
            )),
            Box::new(SilenceEngine::new(ffmpeg, config.mp3_bitrate.clone())),
        ];
        Self::with_engines(engines, config.speech_timeout())
    }

    /// Произвольная цепочка движков, в порядке попыток
    pub fn with_engines(engines: Vec<Box<dyn SpeechEngine>>, timeout: Duration) -> Self {
        Self { engines, timeout }
    }

    pub fn engines(&self) -> impl Iterator<Item = EngineKind> + '_ {
        self.engines.iter().map(|engine| engine.kind())
    }

    /// Озвучить текст в `destination`.
    ///
    /// Текст передаётся движкам без изменений. Каждая попытка пишет в свой
    /// временный каталог рядом с `destination`, и файл переносится на место
    /// только после успеха в пределах таймаута. Пустой текст озвучивается
    /// только тишиной.
    pub async fn synthesize(&self, request: &SpeechRequest, destination: &Path) -> Result<NarrationOutcome> {
        let blank = request.text.trim().is_empty();

        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;
        remove_partial(destination).await;

        let extension = destination
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp3");

        for engine in &self.engines {
            let kind = engine.kind();
            if blank && kind != EngineKind::Silence {
                log::debug!("Skipping {} for blank text", kind);
                continue;
            }
            if !engine.is_eligible(request) {
                log::debug!("Engine {} is not eligible", kind);
                continue;
            }

            let staging = tempfile::Builder::new()
                .prefix(".narration-")
                .tempdir_in(&parent)?;
            let staged = staging.path().join(format!("{}.{}", kind, extension));

            log::info!("Synthesizing narration with {}", kind);
            let attempt = tokio::time::timeout(self.timeout, engine.synthesize(request, &staged)).await;

            let error = match attempt {
                Ok(Ok(())) if is_non_empty_file(&staged).await => {
                    tokio::fs::rename(&staged, destination).await?;
                    log::info!("Narration ready ({}): {}", kind, destination.display());
                    return Ok(NarrationOutcome {
                        engine: kind,
                        path: destination.to_path_buf(),
                    });
                }
                Ok(Ok(())) => NarratorError::SpeechSynthesis(format!("{} produced no audio", kind)),
                Ok(Err(e)) => e,
                Err(_) => NarratorError::Timeout(format!("{} did not finish in {:?}", kind, self.timeout)),
            };

            // незавершённая работа движка может дописать только в удалённый каталог
            log::warn!("Engine {} failed, trying next: {}", kind, error);
        }

        log::error!("All speech engines failed for {}", destination.display());
        Err(NarratorError::NarrationFailed(
            "no speech engine produced audio".to_string(),
        ))
    }
}

async fn is_non_empty_file(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.is_file() && meta.len() > 0)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove partial narration {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Поведение тестового движка
    #[derive(Debug, Clone, Copy)]
    pub enum Behavior {
        /// Пишет обрывок файла и возвращает ошибку
        FailWithPartial,
        /// Зависает дольше любого таймаута
        Hang,
        /// Пишет заданные байты
        Write(&'static [u8]),
        /// Пишет из блокирующей задачи с задержкой, которую таймаут не отменяет
        WriteLate(Duration, &'static [u8]),
    }

    pub struct ScriptedEngine {
        pub kind: EngineKind,
        pub behavior: Behavior,
        pub calls: Arc<AtomicUsize>,
    }

    impl ScriptedEngine {
        pub fn boxed(kind: EngineKind, behavior: Behavior) -> (Box<dyn SpeechEngine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let engine = Self {
                kind,
                behavior,
                calls: calls.clone(),
            };
            (Box::new(engine), calls)
        }
    }

    #[async_trait]
    impl SpeechEngine for ScriptedEngine {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        fn is_eligible(&self, _request: &SpeechRequest) -> bool {
            true
        }

        async fn synthesize(&self, _request: &SpeechRequest, destination: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::FailWithPartial => {
                    tokio::fs::write(destination, b"partial").await?;
                    Err(NarratorError::SpeechSynthesis("scripted failure".to_string()))
                }
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Behavior::Write(bytes) => {
                    tokio::fs::write(destination, bytes).await?;
                    Ok(())
                }
                Behavior::WriteLate(delay, bytes) => {
                    let path = destination.to_path_buf();
                    tokio::task::spawn_blocking(move || {
                        std::thread::sleep(delay);
                        std::fs::write(path, bytes)
                    })
                    .await
                    .map_err(|e| NarratorError::Other(e.to_string()))??;
                    Ok(())
                }
            }
        }
    }
}
