//! Модуль для отслеживания прогресса конвейера
//!
//! Наблюдатели подписываются на репортер и получают снимки [`ProgressInfo`]
//! при смене этапа и обновлении прогресса. Трекер необязателен: конвейер
//! работает и без него.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения операции
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Текущий этап операции
    pub step: String,
    /// Процент выполнения текущего этапа (0.0 - 100.0)
    pub step_progress: f32,
    /// Общий процент выполнения (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация о текущем этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(step: impl Into<String>, step_progress: f32, total_progress: f32, details: Option<String>) -> Self {
        Self {
            step: step.into(),
            step_progress: step_progress.clamp(0.0, 100.0),
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Наблюдатель, получающий уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Объект, рассылающий уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя; возвращает идентификатор для удаления
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Синхронный репортер: наблюдатели вызываются в потоке уведомления
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        for observer in self.observers.read().values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Наблюдатель, пишущий прогресс в лог
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        match &progress.details {
            Some(details) => log::info!(
                "[{:>5.1}%] {}: {}",
                progress.total_progress,
                progress.step,
                details
            ),
            None => log::info!("[{:>5.1}%] {}", progress.total_progress, progress.step),
        }
    }
}

/// Этапы конвейера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessStep {
    /// Определение настроения
    MoodDetection,
    /// Построение промпта
    PromptComposition,
    /// Постер и озвучка (параллельно)
    MediaGeneration,
    /// Выбор фоновой музыки
    BackgroundSelection,
    /// Сведение
    Mixing,
}

impl ProcessStep {
    pub const ALL: [ProcessStep; 5] = [
        ProcessStep::MoodDetection,
        ProcessStep::PromptComposition,
        ProcessStep::MediaGeneration,
        ProcessStep::BackgroundSelection,
        ProcessStep::Mixing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoodDetection => "Определение настроения",
            Self::PromptComposition => "Построение промпта",
            Self::MediaGeneration => "Генерация постера и озвучки",
            Self::BackgroundSelection => "Выбор фоновой музыки",
            Self::Mixing => "Сведение аудио",
        }
    }

    /// Вес этапа в процентах от всего процесса
    pub fn weight(&self) -> f32 {
        match self {
            Self::MoodDetection => 5.0,
            Self::PromptComposition => 5.0,
            Self::MediaGeneration => 60.0,
            Self::BackgroundSelection => 5.0,
            Self::Mixing => 25.0,
        }
    }
}

struct TrackerState {
    current_step: ProcessStep,
    step_progress: f32,
    total_progress: f32,
    completed_steps: HashMap<ProcessStep, f32>,
}

impl TrackerState {
    fn recalculate(&mut self) {
        let completed: f32 = self
            .completed_steps
            .iter()
            .filter(|(step, _)| **step != self.current_step)
            .map(|(step, progress)| step.weight() * progress / 100.0)
            .sum();
        let current = self.current_step.weight() * self.step_progress / 100.0;
        self.total_progress = (completed + current).clamp(0.0, 100.0);
    }

    fn snapshot(&self, details: Option<String>) -> ProgressInfo {
        ProgressInfo::new(
            self.current_step.as_str(),
            self.step_progress,
            self.total_progress,
            details,
        )
    }
}

/// Трекер прогресса конвейера
pub struct ProgressTracker {
    reporter: Option<Box<dyn ProgressReporter>>,
    state: RwLock<TrackerState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            reporter: None,
            state: RwLock::new(TrackerState {
                current_step: ProcessStep::MoodDetection,
                step_progress: 0.0,
                total_progress: 0.0,
                completed_steps: HashMap::new(),
            }),
        }
    }

    pub fn with_reporter(reporter: Box<dyn ProgressReporter>) -> Self {
        let mut tracker = Self::new();
        tracker.reporter = Some(reporter);
        tracker
    }

    /// Трекер, пишущий прогресс в лог
    pub fn logging() -> Self {
        let mut reporter = DefaultProgressReporter::new();
        reporter.add_observer(Box::new(LogProgressObserver));
        Self::with_reporter(Box::new(reporter))
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> Option<usize> {
        self.reporter.as_mut().map(|reporter| reporter.add_observer(observer))
    }

    /// Перейти к этапу; предыдущий этап считается завершённым
    pub fn set_step(&self, step: ProcessStep) {
        let snapshot = {
            let mut state = self.state.write();
            if state.current_step == step {
                return;
            }
            let previous = state.current_step;
            state.completed_steps.insert(previous, 100.0);
            state.current_step = step;
            state.step_progress = 0.0;
            state.recalculate();
            state.snapshot(None)
        };
        self.report(snapshot);
    }

    /// Обновить прогресс текущего этапа
    pub fn update_step_progress(&self, progress: f32, details: Option<String>) {
        let snapshot = {
            let mut state = self.state.write();
            state.step_progress = progress.clamp(0.0, 100.0);
            state.recalculate();
            state.snapshot(details)
        };
        self.report(snapshot);
    }

    /// Отметить завершение всего процесса
    pub fn complete(&self) {
        let snapshot = {
            let mut state = self.state.write();
            for step in ProcessStep::ALL {
                state.completed_steps.insert(step, 100.0);
            }
            state.step_progress = 100.0;
            state.total_progress = 100.0;
            state.snapshot(Some("Процесс завершен".to_string()))
        };
        self.report(snapshot);
    }

    pub fn total_progress(&self) -> f32 {
        self.state.read().total_progress
    }

    pub fn current_step(&self) -> ProcessStep {
        self.state.read().current_step
    }

    fn report(&self, progress: ProgressInfo) {
        if let Some(reporter) = &self.reporter {
            reporter.notify_progress(progress);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
