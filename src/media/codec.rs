//! # Audio Codec
//!
//! Декодирование аудиофайлов в [`AudioSegment`] и экспорт обратно на диск.
//!
//! - WAV читается и пишется через hound (запись: моно, 32-бит float)
//! - MP3, AAC, OGG, FLAC, M4A декодируются через symphonia
//! - MP3 кодируется через FFmpeg (WAV во временный файл, затем libmp3lame)
//!
//! Многоканальное аудио сводится в моно.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use crate::config::AudioFormat;
use crate::error::{NarratorError, Result};
use crate::media::segment::AudioSegment;
use crate::utils::ffmpeg::Ffmpeg;

/// Расширения, которые считаются аудиофайлами
pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "flac", "m4a", "aac"];

/// Проверить, похоже ли имя файла на аудио
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Декодирует аудиофайл в моно-фрагмент; формат определяется по расширению
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioSegment> {
    let path = path.as_ref();
    let extension = extension_of(path);

    if extension == "wav" {
        return decode_wav_file(path);
    }

    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    let segment = decode_bytes(buffer, &extension)?;
    log::debug!(
        "Decoded {} ({} samples at {} Hz)",
        path.display(),
        segment.len(),
        segment.sample_rate()
    );
    Ok(segment)
}

/// Декодирует сжатые аудиоданные из памяти через symphonia
pub fn decode_bytes(data: Vec<u8>, extension_hint: &str) -> Result<AudioSegment> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if !extension_hint.is_empty() {
        hint.with_extension(extension_hint);
    }

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| NarratorError::AudioDecoding(format!("Unrecognized audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| NarratorError::AudioDecoding("No audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| NarratorError::AudioDecoding(format!("Unsupported codec: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut pcm_data = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }
                let channels = spec.channels.count().max(1);

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_planar_ref(decoded);
                let samples = sample_buf.samples();

                if channels > 1 {
                    // В планарном буфере каналы идут подряд
                    let frames = samples.len() / channels;
                    for frame in 0..frames {
                        let sum: f32 = (0..channels).map(|ch| samples[ch * frames + frame]).sum();
                        pcm_data.push(sum / channels as f32);
                    }
                } else {
                    pcm_data.extend_from_slice(samples);
                }
            }
            Err(e) => {
                log::warn!("Skipping undecodable packet: {}", e);
            }
        }
    }

    if pcm_data.is_empty() || sample_rate == 0 {
        return Err(NarratorError::AudioDecoding("No audio samples decoded".to_string()));
    }

    Ok(AudioSegment::new(pcm_data, sample_rate))
}

/// Декодирует WAV-файл через hound
pub fn decode_wav_file<P: AsRef<Path>>(path: P) -> Result<AudioSegment> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let pcm_data: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8388608.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2147483648.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        _ => {
            return Err(NarratorError::AudioDecoding(format!(
                "Unsupported WAV format: {:?}, {} bits",
                spec.sample_format, spec.bits_per_sample
            )));
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels > 1 {
        pcm_data
            .chunks(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        pcm_data
    };

    Ok(AudioSegment::new(samples, spec.sample_rate))
}

/// Кодирует фрагмент в WAV (моно, 32-бит float)
pub fn encode_wav<P: AsRef<Path>>(segment: &AudioSegment, path: P) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: segment.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in segment.samples() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Экспортирует фрагмент в файл; формат определяется по расширению.
///
/// Для MP3 нужен FFmpeg, иначе возвращается `ToolNotFound`.
pub fn export(
    segment: &AudioSegment,
    destination: &Path,
    ffmpeg: Option<&Ffmpeg>,
    bitrate: &str,
) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match AudioFormat::from_path(destination) {
        Some(AudioFormat::Wav) => encode_wav(segment, destination)?,
        Some(AudioFormat::Mp3) => {
            let ffmpeg = ffmpeg.ok_or_else(|| {
                NarratorError::ToolNotFound("ffmpeg is required to export MP3".to_string())
            })?;
            let wav = tempfile::Builder::new().suffix(".wav").tempfile()?;
            encode_wav(segment, wav.path())?;
            ffmpeg.encode_mp3(wav.path(), destination, bitrate)?;
        }
        None => {
            return Err(NarratorError::InvalidPath(format!(
                "Unsupported output extension: {}",
                destination.display()
            )))
        }
    }

    log::debug!(
        "Exported {} ({} ms at {} Hz)",
        destination.display(),
        segment.duration_ms(),
        segment.sample_rate()
    );
    Ok(())
}

/// Сохраняет готовые аудиоданные формата `source_extension` в `destination`.
///
/// Данные всегда проверяются декодированием. Если форматы совпадают, байты
/// пишутся как есть; иначе декодированный сигнал экспортируется заново.
pub fn save_encoded(
    data: Vec<u8>,
    source_extension: &str,
    destination: &Path,
    ffmpeg: Option<&Ffmpeg>,
    bitrate: &str,
) -> Result<()> {
    if data.is_empty() {
        return Err(NarratorError::AudioDecoding("Empty audio payload".to_string()));
    }

    if extension_of(destination) == source_extension.to_lowercase() {
        decode_bytes(data.clone(), source_extension)?;
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(destination, data)?;
        return Ok(());
    }

    let segment = decode_bytes(data, source_extension)?;
    export(&segment, destination, ffmpeg, bitrate)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// 16-битный WAV в памяти, как его отдают внешние сервисы
    pub fn pcm16_wav_bytes(segment: &AudioSegment) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: segment.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for sample in segment.samples() {
                writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tone(duration_ms: u64, sample_rate: u32) -> AudioSegment {
        let frames = (duration_ms * sample_rate as u64 / 1000) as usize;
        let samples = (0..frames)
            .map(|i| (i as f32 / sample_rate as f32 * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5)
            .collect();
        AudioSegment::new(samples, sample_rate)
    }

    #[test]
    fn test_wav_export_and_decode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("tone.wav");
        let segment = tone(100, 16000);

        export(&segment, &path, None, "192k").unwrap();
        let decoded = decode_file(&path).unwrap();

        assert_eq!(decoded.sample_rate(), 16000);
        assert_eq!(decoded.len(), segment.len());
        for (a, b) in segment.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stereo_wav_is_downmixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_file(&path).unwrap();
        assert_eq!(decoded.len(), 100);
        assert!((decoded.samples()[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_mp3_export_without_ffmpeg_fails() {
        let dir = tempdir().unwrap();
        let result = export(&tone(10, 8000), &dir.path().join("out.mp3"), None, "192k");
        assert!(matches!(result, Err(NarratorError::ToolNotFound(_))));
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let result = decode_bytes(b"<html>not audio</html>".to_vec(), "mp3");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_encoded_same_format_is_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        let data = testing::pcm16_wav_bytes(&tone(200, 16000));

        save_encoded(data.clone(), "wav", &path, None, "192k").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), data);

        assert!(save_encoded(Vec::new(), "wav", &path, None, "192k").is_err());
    }

    #[test]
    fn test_save_encoded_rejects_non_audio_payload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.mp3");

        let result = save_encoded(b"<html>rate limited</html>".to_vec(), "mp3", &path, None, "192k");
        assert!(matches!(result, Err(NarratorError::AudioDecoding(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("calm.MP3")));
        assert!(is_audio_file(Path::new("rain.wav")));
        assert!(!is_audio_file(Path::new("notes.txt")));
        assert!(!is_audio_file(Path::new("README")));
    }
}
