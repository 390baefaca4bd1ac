//! Построение промпта для генерации постера
//!
//! Промпт состоит из описания сцены, фиксированного описания стиля и запрета
//! на текст в изображении. Сцена собирается из визуальных мотивов, найденных
//! в тексте; если мотивов нет, выбирается одна из запасных сцен настроения.

use std::fmt;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::mood::Mood;

/// Максимальная длина промпта в символах
pub const MAX_PROMPT_CHARS: usize = 500;

/// Максимальное количество мотивов в сцене
const MAX_MOTIFS: usize = 3;

pub const STYLE_CLAUSE: &str = "cinematic, photorealistic, professional lighting, high detail, artistic";
pub const NO_TEXT_CLAUSE: &str = "no text, no captions, no letters";

/// Визуальные мотивы: слова-триггеры и фраза для сцены
const MOTIFS: [(&[&str], &str); 8] = [
    (&["shadow", "silhouette"], "dramatic shadows and silhouettes"),
    (&["candle", "dim"], "soft warm candlelight"),
    (&["rose", "flower", "petal"], "rose garden with petals"),
    (&["rain", "storm", "lightning"], "rainstorm and dramatic clouds"),
    (&["ocean", "sea", "wave"], "ocean waves on rocky shore"),
    (&["forest", "trees", "woods"], "enchanted forest"),
    (&["sunset", "sunrise", "golden"], "golden sunset sky"),
    (&["moon", "night", "stars"], "moonlit starry night"),
];

/// Запасные сцены для настроения
pub fn mood_scenes(mood: Mood) -> &'static [&'static str; 3] {
    match mood {
        Mood::Romantic => &[
            "candlelit scene with warm tones",
            "couple silhouettes at sunset",
            "rose garden at dusk",
        ],
        Mood::Intense => &[
            "stormy sky over mountains",
            "crashing waves and cliffs",
            "volcanic glow and dramatic clouds",
        ],
        Mood::Happy => &[
            "bright meadow with flowers",
            "balloons in a blue sky",
            "rainbow after a light rain",
        ],
        Mood::Sad => &[
            "misty empty street with rain",
            "solitary figure near window",
            "faded flowers on a table",
        ],
        Mood::Rainy => &[
            "umbrella on a wet city street at night",
            "raindrops on lake ripples",
            "heavy rainfall on green landscape",
        ],
        Mood::Calm => &[
            "still lake with mountains",
            "zen garden with stones",
            "gentle stream in a quiet forest",
        ],
    }
}

/// Готовый промпт для генерации изображения, не длиннее [`MAX_PROMPT_CHARS`] символов
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePrompt(String);

impl ImagePrompt {
    fn new(raw: String) -> Self {
        match raw.char_indices().nth(MAX_PROMPT_CHARS) {
            Some((cut, _)) => Self(raw[..cut].to_string()),
            None => Self(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImagePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImagePrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Мотивы, найденные в тексте, в порядке таблицы
fn detect_motifs(text: &str) -> Vec<&'static str> {
    let text = text.to_lowercase();
    MOTIFS
        .iter()
        .filter(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map(|(_, phrase)| *phrase)
        .collect()
}

/// Построить промпт по тексту и настроению.
///
/// Случайность используется только при выборе запасной сцены.
pub fn compose<R: Rng + ?Sized>(text: &str, mood: Mood, rng: &mut R) -> ImagePrompt {
    let motifs = detect_motifs(text);

    let scene = if motifs.is_empty() {
        mood_scenes(mood)
            .choose(rng)
            .copied()
            .unwrap_or(mood_scenes(Mood::Calm)[0])
            .to_string()
    } else {
        motifs
            .iter()
            .take(MAX_MOTIFS)
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    };

    ImagePrompt::new(format!("{}, {}, {}", scene, STYLE_CLAUSE, NO_TEXT_CLAUSE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_motifs_are_used_in_order() {
        let prompt = compose("Moonlight over the sea, a rose in her hand", Mood::Romantic, &mut rng());
        assert!(prompt
            .as_str()
            .starts_with("rose garden with petals, ocean waves on rocky shore, moonlit starry night, "));
    }

    #[test]
    fn test_at_most_three_motifs() {
        let text = "shadow candle rose rain ocean forest sunset moon";
        let prompt = compose(text, Mood::Calm, &mut rng());
        assert!(prompt.as_str().starts_with(
            "dramatic shadows and silhouettes, soft warm candlelight, rose garden with petals, cinematic"
        ));
        assert!(!prompt.as_str().contains("enchanted forest"));
    }

    #[test]
    fn test_fallback_scene_is_from_mood_and_seeded() {
        let first = compose("Hello there", Mood::Rainy, &mut rng());
        let second = compose("Hello there", Mood::Rainy, &mut rng());
        assert_eq!(first, second);

        let scene = first.as_str().split(", cinematic").next().unwrap();
        assert!(mood_scenes(Mood::Rainy).contains(&scene));
    }

    #[test]
    fn test_clauses_and_length_limit() {
        let long_text = "night ".repeat(500) + &"ж".repeat(1000);
        for text in ["", "A quiet walk", long_text.as_str()] {
            let prompt = compose(text, Mood::Calm, &mut rng());
            assert!(prompt.as_str().chars().count() <= MAX_PROMPT_CHARS);
            assert!(prompt.as_str().contains(NO_TEXT_CLAUSE));
            assert!(prompt.as_str().contains(STYLE_CLAUSE));
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let prompt = ImagePrompt::new("é".repeat(600));
        assert_eq!(prompt.as_str().chars().count(), MAX_PROMPT_CHARS);
    }

    #[test]
    fn test_quiet_lake_scene() {
        let prompt = compose(
            "A quiet walk by the lake at night under the stars",
            Mood::Calm,
            &mut rng(),
        );
        assert!(prompt.as_str().starts_with("moonlit starry night, "));
    }
}
