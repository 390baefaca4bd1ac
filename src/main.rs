use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use clap::Parser;
use mood_narrator::utils::logger::init_logger;
use mood_narrator::{
    available_voices, Accent, AudioFormat, BackgroundChoice, EnginePreference, Gender, GenerationRequest,
    Mood, MoodNarrator, NarratorConfig, ProgressTracker,
};

/// Озвучка текста под его настроение с фоновой музыкой и постером
#[derive(Debug, Parser)]
#[command(name = "mood-narrator", version, about)]
struct Args {
    /// Текст для озвучки
    #[arg(short, long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Файл с текстом для озвучки
    #[arg(long, value_name = "PATH")]
    text_file: Option<PathBuf>,

    /// Движок речи: edge или gtts
    #[arg(long, default_value = "edge")]
    engine: String,

    /// Акцент: en-US, en-GB, en-IN, en-AU
    #[arg(long, default_value = "en-US")]
    accent: String,

    /// Пол голоса: Male или Female
    #[arg(long, default_value = "Female")]
    gender: String,

    /// Фоновая дорожка: подпись, имя файла, auto или none
    #[arg(long)]
    background: Option<String>,

    /// Каталог для сгенерированных файлов
    #[arg(long, value_name = "DIR")]
    media_root: Option<PathBuf>,

    /// Каталог с фоновой музыкой
    #[arg(long, value_name = "DIR")]
    bg_root: Option<PathBuf>,

    /// Писать WAV вместо MP3 (FFmpeg не нужен)
    #[arg(long)]
    wav: bool,

    /// Показать доступные голоса и настроения и выйти
    #[arg(long)]
    list_voices: bool,
}

fn print_catalogue() -> Result<()> {
    let catalogue = serde_json::json!({
        "voices": available_voices(),
        "moods": Mood::ALL,
    });
    println!("{}", serde_json::to_string_pretty(&catalogue)?);
    Ok(())
}

fn read_text(args: &Args) -> Result<String> {
    match (&args.text, &args.text_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text from {}", path.display())),
        (None, None) => bail!("Either --text or --text-file is required"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    if args.list_voices {
        return print_catalogue();
    }

    let text = read_text(&args)?;

    let mut config = NarratorConfig::from_env().context("Invalid environment configuration")?;
    if let Some(root) = &args.media_root {
        config.media_root = root.clone();
    }
    if let Some(root) = &args.bg_root {
        config.bg_root = root.clone();
    }
    if args.wav {
        config.output_format = AudioFormat::Wav;
    }

    let ffmpeg = config.validate().context("Configuration check failed")?;
    if let Some(ffmpeg) = &ffmpeg {
        match ffmpeg.version() {
            Ok(version) => log::debug!("{}", version),
            Err(e) => log::warn!("Could not read ffmpeg version: {}", e),
        }
    }

    let request = GenerationRequest {
        text,
        engine: EnginePreference::from_key(&args.engine),
        accent: Accent::from_code(&args.accent),
        gender: Gender::from_label(&args.gender),
        background: BackgroundChoice::from_value(args.background.as_deref()),
    };

    let narrator = MoodNarrator::new(config, ffmpeg).with_progress(ProgressTracker::logging());
    let result = narrator.process(&request).await.context("Generation failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
