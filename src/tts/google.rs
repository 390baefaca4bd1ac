//! Google Translate TTS
//!
//! Текст режется на куски по 200 символов по границам слов, каждый кусок
//! запрашивается отдельно, MP3-ответы склеиваются. Региональный домен задаёт
//! акцент. Для мужского голоса речь замедляется и понижается по высоте.

use std::path::Path;
use async_trait::async_trait;
use reqwest::Client;
use crate::config::{Accent, Gender};
use crate::error::{NarratorError, Result};
use crate::media::codec;
use crate::media::segment::AudioSegment;
use crate::tts::{EngineKind, SpeechEngine, SpeechRequest};
use crate::utils::ffmpeg::Ffmpeg;

/// Максимальная длина куска текста для одного запроса
pub const MAX_CHUNK_CHARS: usize = 200;

/// Доля исходной частоты, с которой переинтерпретируется мужской голос
pub const MALE_FRAME_RATE_FACTOR: f32 = 0.92;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Региональный домен Google для акцента
pub fn region_tld(accent: Accent) -> &'static str {
    match accent {
        Accent::EnUs => "com",
        Accent::EnGb => "co.uk",
        Accent::EnIn => "co.in",
        Accent::EnAu => "com.au",
    }
}

/// Разбить текст на куски не длиннее `max_chars` символов по границам слов.
///
/// Слово длиннее `max_chars` режется посимвольно.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Движок Google Translate TTS
#[derive(Debug, Clone)]
pub struct GoogleTtsEngine {
    client: Client,
    url_template: String,
    ffmpeg: Option<Ffmpeg>,
    bitrate: String,
}

impl GoogleTtsEngine {
    /// `url_template` содержит `{tld}`, который заменяется доменом акцента
    pub fn new(url_template: impl Into<String>, ffmpeg: Option<Ffmpeg>, bitrate: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url_template: url_template.into(),
            ffmpeg,
            bitrate: bitrate.into(),
        }
    }

    pub fn url_for(&self, accent: Accent) -> String {
        self.url_template.replace("{tld}", region_tld(accent))
    }

    async fn fetch_chunk(&self, url: &str, chunk: &str, index: usize, total: usize, slow: bool) -> Result<Vec<u8>> {
        let speed = if slow { "0.3" } else { "1" };
        let index = index.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", "en"),
                ("client", "tw-ob"),
                ("ttsspeed", speed),
                ("total", total.as_str()),
                ("idx", index.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarratorError::SpeechSynthesis(format!(
                "Google TTS returned {} for chunk {}",
                status, index
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechEngine for GoogleTtsEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gtts
    }

    fn is_eligible(&self, _request: &SpeechRequest) -> bool {
        true
    }

    async fn synthesize(&self, request: &SpeechRequest, destination: &Path) -> Result<()> {
        let chunks = split_into_chunks(&request.text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(NarratorError::SpeechSynthesis("Nothing to synthesize".to_string()));
        }

        let url = self.url_for(request.accent);
        let slow = request.gender == Gender::Male;
        log::debug!("Google TTS: {} chunk(s) via {}", chunks.len(), url);

        let mut data = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let bytes = self.fetch_chunk(&url, chunk, index, chunks.len(), slow).await?;
            data.extend_from_slice(&bytes);
        }

        let destination = destination.to_path_buf();
        let ffmpeg = self.ffmpeg.clone();
        let bitrate = self.bitrate.clone();
        let gender = request.gender;

        tokio::task::spawn_blocking(move || match gender {
            Gender::Male => {
                let segment = codec::decode_bytes(data, "mp3")?;
                let lowered = lower_voice(&segment, segment.sample_rate())?;
                codec::export(&lowered, &destination, ffmpeg.as_ref(), &bitrate)
            }
            Gender::Female => codec::save_encoded(data, "mp3", &destination, ffmpeg.as_ref(), &bitrate),
        })
        .await
        .map_err(|e| NarratorError::Other(format!("Google TTS save task failed: {}", e)))?
    }
}

/// Понизить голос: семплы переинтерпретируются на 92 % частоты и
/// пересчитываются обратно на исходную частоту (ниже и медленнее)
fn lower_voice(segment: &AudioSegment, original_rate: u32) -> Result<AudioSegment> {
    let slowed_rate = (original_rate as f32 * MALE_FRAME_RATE_FACTOR) as u32;
    segment.with_frame_rate(slowed_rate).resample(original_rate)
}
