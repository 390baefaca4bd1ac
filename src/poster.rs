//! Получение постера
//!
//! Сначала постер запрашивается у удалённого сервиса генерации изображений.
//! При любой ошибке рисуется локальный градиент в цветах настроения. Ошибки
//! наружу не выходят: единственный признак неудачи - отсутствие файла.

use std::path::Path;
use std::time::Duration;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use crate::config::NarratorConfig;
use crate::error::{NarratorError, Result};
use crate::mood::Mood;
use crate::prompt::ImagePrompt;

/// Размеры запасного постера
pub const FALLBACK_WIDTH: u32 = 1000;
pub const FALLBACK_HEIGHT: u32 = 600;
const JPEG_QUALITY: u8 = 90;

/// Откуда взялся постер
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterOutcome {
    /// Изображение от удалённого сервиса
    Remote,
    /// Локально нарисованный градиент
    Fallback,
    /// Файл не создан
    Missing,
}

impl PosterOutcome {
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Пара цветов градиента для настроения (верх, низ)
pub fn mood_palette(mood: Mood) -> ([u8; 3], [u8; 3]) {
    match mood {
        Mood::Romantic => ([255, 182, 193], [219, 112, 147]),
        Mood::Intense => ([255, 69, 0], [139, 0, 0]),
        Mood::Happy => ([255, 215, 0], [255, 165, 0]),
        Mood::Sad => ([70, 130, 180], [72, 61, 139]),
        Mood::Rainy => ([100, 149, 237], [176, 196, 222]),
        Mood::Calm => ([144, 238, 144], [34, 139, 34]),
    }
}

/// Вертикальный градиент от `top` к `bottom`
pub fn render_gradient(width: u32, height: u32, top: [u8; 3], bottom: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        let ratio = y as f32 / height as f32;
        let channel = |i: usize| (top[i] as f32 * (1.0 - ratio) + bottom[i] as f32 * ratio) as u8;
        Rgb([channel(0), channel(1), channel(2)])
    })
}

/// Сохранить изображение; JPEG пишется с качеством 90, остальное по расширению
fn save_image(img: &RgbImage, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let extension = destination
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let file = std::fs::File::create(destination)?;
            let mut writer = std::io::BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(img)?;
        }
        _ => img.save(destination)?,
    }

    Ok(())
}

/// Поставщик постеров
#[derive(Debug, Clone)]
pub struct PosterProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl PosterProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &NarratorConfig) -> Self {
        Self::new(
            config.poster_endpoint.clone(),
            config.image_api_key.clone(),
            config.poster_timeout(),
        )
    }

    /// URL запроса: промпт экранируется и добавляется сегментом пути
    pub fn request_url(&self, prompt: &ImagePrompt) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(prompt.as_str())
        )
    }

    /// Получить постер и записать его в `destination`. Никогда не завершается ошибкой.
    pub async fn provide(&self, prompt: &ImagePrompt, mood: Mood, destination: &Path) -> PosterOutcome {
        match self.fetch_remote(prompt, destination).await {
            Ok(()) => {
                log::info!("Poster generated remotely: {}", destination.display());
                return PosterOutcome::Remote;
            }
            Err(e) => log::warn!("Remote poster generation failed, using fallback: {}", e),
        }

        let target = destination.to_path_buf();
        let rendered = tokio::task::spawn_blocking(move || render_fallback(mood, &target)).await;

        match rendered {
            Ok(Ok(())) => {
                log::info!("Fallback poster rendered: {}", destination.display());
                PosterOutcome::Fallback
            }
            Ok(Err(e)) => {
                log::error!("Fallback poster failed: {}", e);
                PosterOutcome::Missing
            }
            Err(e) => {
                log::error!("Fallback poster task failed: {}", e);
                PosterOutcome::Missing
            }
        }
    }

    async fn fetch_remote(&self, prompt: &ImagePrompt, destination: &Path) -> Result<()> {
        let url = self.request_url(prompt);
        log::debug!("Requesting poster from {}", url);

        let mut request = self.client.get(&url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(NarratorError::Other(format!("Image service returned {}", status)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(NarratorError::Other("Image service returned an empty body".to_string()));
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(destination, &bytes).await?;
        Ok(())
    }
}

/// Нарисовать и сохранить запасной постер для настроения
pub fn render_fallback(mood: Mood, destination: &Path) -> Result<()> {
    let (top, bottom) = mood_palette(mood);
    let img = render_gradient(FALLBACK_WIDTH, FALLBACK_HEIGHT, top, bottom);
    save_image(&img, destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn prompt() -> ImagePrompt {
        crate::prompt::compose("a rose at sunset", Mood::Romantic, &mut StdRng::seed_from_u64(1))
    }

    /// Одноразовый HTTP-сервер, отвечающий заданным статусом и телом
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: image/jpeg\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/prompt", addr)
    }

    #[test]
    fn test_gradient_colors() {
        let img = render_gradient(10, 100, [0, 0, 0], [200, 100, 50]);
        assert_eq!(img.dimensions(), (10, 100));
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(5, 50), &Rgb([100, 50, 25]));
    }

    #[test]
    fn test_request_url_escapes_prompt() {
        let provider = PosterProvider::new("https://example.com/prompt/", None, Duration::from_secs(1));
        let url = provider.request_url(&prompt());
        assert!(url.starts_with("https://example.com/prompt/rose%20garden%20with%20petals%2C"));
        assert!(!url.contains(' '));
    }

    #[tokio::test]
    async fn test_network_error_falls_back_to_gradient() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("posters").join("poster.jpg");
        // Порт 9 (discard) на localhost обычно закрыт
        let provider = PosterProvider::new("http://127.0.0.1:9/prompt", None, Duration::from_secs(2));

        let outcome = provider.provide(&prompt(), Mood::Sad, &destination).await;

        assert_eq!(outcome, PosterOutcome::Fallback);
        let img = image::open(&destination).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (FALLBACK_WIDTH, FALLBACK_HEIGHT));
    }

    #[tokio::test]
    async fn test_non_200_falls_back() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("poster.png");
        let endpoint = serve_once("500 Internal Server Error", b"boom".to_vec()).await;
        let provider = PosterProvider::new(endpoint, None, Duration::from_secs(5));

        let outcome = provider.provide(&prompt(), Mood::Calm, &destination).await;

        assert_eq!(outcome, PosterOutcome::Fallback);
        let img = image::open(&destination).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0), &Rgb([144, 238, 144]));
    }

    #[tokio::test]
    async fn test_empty_body_falls_back() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("poster.png");
        let endpoint = serve_once("200 OK", Vec::new()).await;
        let provider = PosterProvider::new(endpoint, None, Duration::from_secs(5));

        let outcome = provider.provide(&prompt(), Mood::Calm, &destination).await;
        assert_eq!(outcome, PosterOutcome::Fallback);
    }

    #[tokio::test]
    async fn test_remote_body_written_verbatim() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("a").join("b").join("poster.jpg");
        let body = b"\xFF\xD8\xFFremote-image".to_vec();
        let endpoint = serve_once("200 OK", body.clone()).await;
        let provider = PosterProvider::new(endpoint, Some("token".to_string()), Duration::from_secs(5));

        let outcome = provider.provide(&prompt(), Mood::Happy, &destination).await;

        assert_eq!(outcome, PosterOutcome::Remote);
        assert_eq!(std::fs::read(&destination).unwrap(), body);
    }

    #[tokio::test]
    async fn test_unwritable_destination_is_missing() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let destination = blocker.join("poster.jpg");
        let provider = PosterProvider::new("http://127.0.0.1:9/prompt", None, Duration::from_secs(2));

        let outcome = provider.provide(&prompt(), Mood::Calm, &destination).await;
        assert_eq!(outcome, PosterOutcome::Missing);
        assert!(!outcome.is_present());
    }
}
