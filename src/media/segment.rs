//! # Audio Segment
//!
//! Аудиофрагмент в памяти: моно PCM-семплы f32 в диапазоне [-1.0, 1.0]
//! и частота дискретизации. Все операции возвращают новый фрагмент,
//! исходный не изменяется.
//!
//! ## Основные возможности
//!
//! - Громкость в dBFS (по RMS) и пиковая нормализация
//! - Усиление в децибелах
//! - Зацикливание и обрезка до заданной длины
//! - Наложение дорожек с ограничением по полной шкале
//! - Плавные переходы (fade in/out)
//! - Ресемплинг с помощью Rubato

use std::cmp;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use crate::error::{NarratorError, Result};

/// Запас по пику при нормализации, дБ
pub const NORMALIZE_HEADROOM_DB: f32 = 0.1;

/// Перевод децибел в линейный коэффициент
pub fn db_to_gain(db: f32) -> f32 {
    if db == f32::NEG_INFINITY {
        return 0.0;
    }
    10f32.powf(db / 20.0)
}

/// Аудиофрагмент
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSegment {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Тишина заданной длительности
    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let frames = (duration_ms as u128 * sample_rate as u128 / 1000) as usize;
        Self::new(vec![0.0; frames], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Количество семплов (кадров, так как фрагмент моно)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Длительность в миллисекундах
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u128 * 1000 / self.sample_rate as u128) as u64
    }

    /// Среднеквадратичное значение
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / self.samples.len() as f64).sqrt() as f32
    }

    /// Максимальная абсолютная амплитуда
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |a, &b| a.max(b.abs()))
    }

    /// Громкость в dBFS; для тишины `-inf`
    pub fn dbfs(&self) -> f32 {
        let rms = self.rms();
        if rms <= 0.0 {
            return f32::NEG_INFINITY;
        }
        20.0 * rms.log10()
    }

    /// Усиление на `db` децибел. Нечисловое усиление оставляет фрагмент без изменений.
    pub fn apply_gain(&self, db: f32) -> Self {
        if db.is_nan() || db == f32::INFINITY {
            log::warn!("Ignoring non-finite gain {} dB", db);
            return self.clone();
        }
        let factor = db_to_gain(db);
        Self::new(self.samples.iter().map(|s| s * factor).collect(), self.sample_rate)
    }

    /// Пиковая нормализация до `-headroom_db` dBFS. Тишина возвращается без изменений.
    pub fn normalize(&self, headroom_db: f32) -> Self {
        let peak = self.peak();
        if peak <= 0.0 {
            return self.clone();
        }
        let target = db_to_gain(-headroom_db);
        let factor = target / peak;
        Self::new(self.samples.iter().map(|s| s * factor).collect(), self.sample_rate)
    }

    /// Повторять фрагмент, пока он не станет длиннее `frames` семплов
    pub fn loop_to(&self, frames: usize) -> Self {
        if self.samples.is_empty() || self.samples.len() >= frames {
            return self.clone();
        }
        let loops = frames / self.samples.len() + 1;
        Self::new(self.samples.repeat(loops), self.sample_rate)
    }

    /// Оставить первые `frames` семплов
    pub fn truncate(&self, frames: usize) -> Self {
        let end = cmp::min(frames, self.samples.len());
        Self::new(self.samples[..end].to_vec(), self.sample_rate)
    }

    /// Склеить с другим фрагментом той же частоты
    pub fn append(&self, other: &AudioSegment) -> Result<Self> {
        self.ensure_same_rate(other)?;
        let mut samples = Vec::with_capacity(self.len() + other.len());
        samples.extend_from_slice(&self.samples);
        samples.extend_from_slice(&other.samples);
        Ok(Self::new(samples, self.sample_rate))
    }

    /// Наложить `other` поверх этого фрагмента с позиции 0.
    ///
    /// Длина результата равна длине `self`; сумма ограничивается диапазоном [-1.0, 1.0].
    pub fn overlay(&self, other: &AudioSegment) -> Result<Self> {
        self.ensure_same_rate(other)?;
        let samples = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, &s)| (s + other.samples.get(i).copied().unwrap_or(0.0)).clamp(-1.0, 1.0))
            .collect();
        Ok(Self::new(samples, self.sample_rate))
    }

    /// Плавное нарастание в начале фрагмента, линейная огибающая
    pub fn fade_in(&self, duration_ms: u32) -> Self {
        let fade = cmp::min(self.ms_to_frames(duration_ms), self.samples.len());
        let mut samples = self.samples.clone();
        for (i, sample) in samples.iter_mut().take(fade).enumerate() {
            *sample *= i as f32 / fade as f32;
        }
        Self::new(samples, self.sample_rate)
    }

    /// Плавное затухание в конце фрагмента, линейная огибающая
    pub fn fade_out(&self, duration_ms: u32) -> Self {
        let fade = cmp::min(self.ms_to_frames(duration_ms), self.samples.len());
        let mut samples = self.samples.clone();
        let len = samples.len();
        for i in 0..fade {
            samples[len - 1 - i] *= i as f32 / fade as f32;
        }
        Self::new(samples, self.sample_rate)
    }

    /// Переинтерпретировать семплы с другой частотой без пересчёта (меняет высоту и темп)
    pub fn with_frame_rate(&self, sample_rate: u32) -> Self {
        Self::new(self.samples.clone(), sample_rate)
    }

    /// Пересчитать фрагмент на новую частоту дискретизации с сохранением длительности
    pub fn resample(&self, target_rate: u32) -> Result<Self> {
        if target_rate == 0 {
            return Err(NarratorError::AudioProcessing("Target sample rate is zero".to_string()));
        }
        if target_rate == self.sample_rate || self.samples.is_empty() {
            return Ok(Self::new(self.samples.clone(), target_rate));
        }
        let samples = resample_with_rubato(&self.samples, self.sample_rate, target_rate)?;
        Ok(Self::new(samples, target_rate))
    }

    fn ms_to_frames(&self, duration_ms: u32) -> usize {
        (duration_ms as u64 * self.sample_rate as u64 / 1000) as usize
    }

    fn ensure_same_rate(&self, other: &AudioSegment) -> Result<()> {
        if self.sample_rate != other.sample_rate {
            return Err(NarratorError::AudioProcessing(format!(
                "Sample rate mismatch: {} Hz vs {} Hz",
                self.sample_rate, other.sample_rate
            )));
        }
        Ok(())
    }
}

/// Ресемплинг моно-сигнала с помощью Rubato (sinc-интерполяция).
///
/// Длина результата равна `round(len * to / from)`; задержка фильтра компенсируется.
fn resample_with_rubato(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    const CHUNK_SIZE: usize = 1024;

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| NarratorError::AudioProcessing(format!("Rubato init failed: {}", e)))?;

    let expected = (input.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut idx = 0;
    while input.len() - idx >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: [&[f32]; 1] = [&input[idx..idx + needed]];
        let frames = resampler
            .process(&chunk[..], None)
            .map_err(|e| NarratorError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&frames[0]);
        idx += needed;
    }

    if idx < input.len() {
        let tail: [&[f32]; 1] = [&input[idx..]];
        let frames = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| NarratorError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&frames[0]);
    }

    // Выталкиваем хвост фильтра
    while output.len() < expected + delay {
        let frames = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| NarratorError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    let mut output: Vec<f32> = output.into_iter().skip(delay).collect();
    output.resize(expected, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    /// Создает тестовый синусоидальный сигнал
    fn sine(freq: f32, duration_ms: u64, sample_rate: u32, amplitude: f32) -> AudioSegment {
        let frames = (duration_ms * sample_rate as u64 / 1000) as usize;
        let samples = (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * amplitude)
            .collect();
        AudioSegment::new(samples, sample_rate)
    }

    #[test]
    fn test_silent_duration() {
        let silence = AudioSegment::silent(1500, 24000);
        assert_eq!(silence.len(), 36000);
        assert_eq!(silence.duration_ms(), 1500);
        assert_eq!(silence.dbfs(), f32::NEG_INFINITY);
    }

    #[test]
    fn test_dbfs_of_full_scale_square() {
        let square = AudioSegment::new(vec![1.0, -1.0, 1.0, -1.0], 8000);
        assert!(square.dbfs().abs() < 1e-4);

        let half = AudioSegment::new(vec![0.5, -0.5, 0.5, -0.5], 8000);
        assert!((half.dbfs() + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn test_apply_gain_shifts_dbfs() {
        let tone = sine(440.0, 500, 8000, 0.5);
        let quieter = tone.apply_gain(-8.0);
        assert!((tone.dbfs() - quieter.dbfs() - 8.0).abs() < 1e-3);

        // -inf обнуляет сигнал, +inf игнорируется
        assert_eq!(tone.apply_gain(f32::NEG_INFINITY).peak(), 0.0);
        assert_eq!(tone.apply_gain(f32::INFINITY), tone);
    }

    #[test]
    fn test_normalize_peak() {
        let samples = AudioSegment::new(vec![-0.3, 0.1, 0.5, -0.4, 0.2], 8000);
        let normalized = samples.normalize(NORMALIZE_HEADROOM_DB);
        assert!((normalized.peak() - db_to_gain(-0.1)).abs() < 1e-6);
        // Отношения между амплитудами сохраняются
        assert!((normalized.samples()[2] / normalized.samples()[1] - 5.0).abs() < 1e-4);

        let silence = AudioSegment::silent(100, 8000);
        assert_eq!(silence.normalize(NORMALIZE_HEADROOM_DB), silence);
    }

    #[test]
    fn test_loop_and_truncate() {
        let short = AudioSegment::new(vec![0.1, 0.2, 0.3], 1000);
        let looped = short.loop_to(10);
        assert_eq!(looped.len(), 12);
        assert_eq!(looped.truncate(10).len(), 10);
        assert_eq!(looped.samples()[3], 0.1);

        let long = AudioSegment::new(vec![0.0; 50], 1000);
        assert_eq!(long.loop_to(10).truncate(10).len(), 10);
    }

    #[test]
    fn test_overlay_keeps_base_length_and_clips() {
        let base = AudioSegment::new(vec![0.8, 0.8, 0.8, 0.8], 1000);
        let top = AudioSegment::new(vec![0.5, -0.5], 1000);
        let mixed = base.overlay(&top).unwrap();
        let expected = [1.0, 0.3, 0.8, 0.8];
        assert_eq!(mixed.len(), 4);
        for (a, b) in mixed.samples().iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }

        let other_rate = AudioSegment::new(vec![0.1], 2000);
        assert!(base.overlay(&other_rate).is_err());
    }

    #[test]
    fn test_fades() {
        let ones = AudioSegment::new(vec![1.0; 1000], 1000);
        let faded = ones.fade_in(100).fade_out(100);
        let s = faded.samples();

        assert!(s[0] < 0.01);
        assert!((s[50] - 0.5).abs() < 0.01);
        assert!(s[100] > 0.99);
        assert!(s[899] > 0.99);
        assert!((s[949] - 0.5).abs() < 0.02);
        assert!(s[999] < 0.01);
        assert_eq!(faded.len(), 1000);
    }

    #[test]
    fn test_fade_longer_than_segment() {
        let ones = AudioSegment::new(vec![1.0; 10], 1000);
        let faded = ones.fade_in(600).fade_out(800);
        assert_eq!(faded.len(), 10);
        assert!(faded.samples().iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_resample_preserves_duration() {
        let tone = sine(220.0, 1000, 22050, 0.5);
        let resampled = tone.resample(24000).unwrap();
        assert_eq!(resampled.sample_rate(), 24000);
        assert_eq!(resampled.len(), 24000);
        assert_eq!(resampled.duration_ms(), 1000);
        // Громкость примерно сохраняется
        assert!((resampled.dbfs() - tone.dbfs()).abs() < 1.0);
    }

    #[test]
    fn test_frame_rate_trick_lengthens_playback() {
        let tone = sine(440.0, 1000, 24000, 0.5);
        let lowered = tone
            .with_frame_rate((24000.0 * 0.92) as u32)
            .resample(24000)
            .unwrap();
        assert_eq!(lowered.sample_rate(), 24000);
        assert!(lowered.duration_ms() > 1080 && lowered.duration_ms() < 1090);
    }
}
