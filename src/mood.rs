//! Определение настроения текста по ключевым словам

use std::fmt;
use serde::{Deserialize, Serialize};

/// Настроение текста
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Romantic,
    Intense,
    Happy,
    Sad,
    Rainy,
    #[default]
    Calm,
}

/// Ключевые слова в порядке приоритета: первое совпадение определяет настроение
const MOOD_KEYWORDS: [(Mood, &[&str]); 6] = [
    (Mood::Romantic, &["love", "romance", "kiss", "beloved", "heart"]),
    (Mood::Intense, &["war", "fight", "battle", "storm", "thunder", "rage"]),
    (Mood::Happy, &["happy", "joy", "smile", "sun", "bright", "celebration"]),
    (Mood::Sad, &["sad", "tears", "cry", "lonely", "sorrow", "melancholy"]),
    (Mood::Rainy, &["rain", "drizzle", "monsoon", "cloud"]),
    (Mood::Calm, &["peace", "calm", "serene", "quiet", "meditation", "zen"]),
];

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Romantic,
        Mood::Intense,
        Mood::Happy,
        Mood::Sad,
        Mood::Rainy,
        Mood::Calm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Romantic => "romantic",
            Self::Intense => "intense",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Rainy => "rainy",
            Self::Calm => "calm",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Определить настроение текста.
///
/// Совпадение ищется как подстрока в тексте в нижнем регистре, поэтому "sunday"
/// тоже считается за "sun". Пустой текст и текст без совпадений дают [`Mood::Calm`].
pub fn classify(text: &str) -> Mood {
    let text = text.to_lowercase();
    MOOD_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(mood, _)| *mood)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_romantic() {
        assert_eq!(classify("My beloved, I wait for you"), Mood::Romantic);
        assert_eq!(classify("A KISS goodnight"), Mood::Romantic);
    }

    #[test]
    fn test_priority_order() {
        // romantic > intense > happy > sad > rainy
        assert_eq!(classify("love in the time of war"), Mood::Romantic);
        assert_eq!(classify("a battle on a bright morning"), Mood::Intense);
        assert_eq!(classify("tears of joy"), Mood::Happy);
        assert_eq!(classify("lonely in the rain"), Mood::Sad);
        assert_eq!(classify("a drizzle over a serene lake"), Mood::Rainy);
    }

    #[test]
    fn test_defaults_to_calm() {
        assert_eq!(classify(""), Mood::Calm);
        assert_eq!(classify("The bus departs at nine."), Mood::Calm);
        assert_eq!(classify("A quiet walk by the lake at night under the stars"), Mood::Calm);
    }

    #[test]
    fn test_substring_matching() {
        assert_eq!(classify("Sunday morning"), Mood::Happy);
        assert_eq!(classify("cloudless"), Mood::Rainy);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Mood::Rainy).unwrap(), "\"rainy\"");
        for mood in Mood::ALL {
            assert_eq!(mood.to_string(), mood.as_str());
        }
    }
}
