use serde::{Deserialize, Serialize};

/// Vocabulary card for reading mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    /// Chinese characters
    pub word: String,
    pub pinyin: String,
    /// English meaning
    pub meaning: String,
    /// `data:` URL of the generated illustration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_sentence: Option<String>,
}

/// Short story with a comprehension question for listening mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub content: String,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

impl Story {
    pub fn is_correct(&self, choice: &str) -> bool {
        choice == self.answer
    }
}

/// Handwriting assessment for writing mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingResult {
    /// 1 to 10
    pub score: f64,
    pub feedback: String,
    pub is_correct: bool,
}

/// Screens of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppMode {
    Home,
    Listening,
    Speaking,
    Reading,
    Writing,
}

impl AppMode {
    /// The four learning modes, in menu order
    pub const LEARNING: [AppMode; 4] = [
        AppMode::Listening,
        AppMode::Speaking,
        AppMode::Reading,
        AppMode::Writing,
    ];

    pub fn title(self) -> &'static str {
        match self {
            AppMode::Home => "Home",
            AppMode::Listening => "Listening",
            AppMode::Speaking => "Speaking",
            AppMode::Reading => "Reading",
            AppMode::Writing => "Writing",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AppMode::Home => "Pick an activity",
            AppMode::Listening => "Listen to funny stories and answer questions",
            AppMode::Speaking => "Chat with Panda Laoshi in real time",
            AppMode::Reading => "Magic flashcards with pictures",
            AppMode::Writing => "Practice writing Chinese characters",
        }
    }
}

/// Flashcard topics offered in reading mode
pub const FLASHCARD_TOPICS: [&str; 6] = ["Animals", "Food", "School", "Family", "Colors", "Sports"];

/// Characters offered in writing mode
pub const PRACTICE_CHARACTERS: [&str; 6] = ["爱", "家", "猫", "水", "火", "月"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashcard_wire_names() {
        let card: Flashcard = serde_json::from_str(
            r#"{"word":"猫","pinyin":"māo","meaning":"cat","exampleSentence":"我有一只猫。"}"#,
        )
        .unwrap();
        assert_eq!(card.example_sentence.as_deref(), Some("我有一只猫。"));
        assert_eq!(card.image_url, None);

        let json = serde_json::to_value(&card).unwrap();
        assert!(json.get("imageUrl").is_none());
        assert_eq!(json["exampleSentence"], "我有一只猫。");
    }

    #[test]
    fn test_writing_result_wire_names() {
        let result: WritingResult =
            serde_json::from_str(r#"{"score":8,"feedback":"Great job!","isCorrect":true}"#).unwrap();
        assert_eq!(result.score, 8.0);
        assert!(result.is_correct);
    }

    #[test]
    fn test_story_answer_check() {
        let story = Story {
            title: "小猫".to_string(),
            content: "小猫喜欢鱼。".to_string(),
            question: "小猫喜欢什么？".to_string(),
            options: vec!["鱼".to_string(), "米饭".to_string()],
            answer: "鱼".to_string(),
        };
        assert!(story.is_correct("鱼"));
        assert!(!story.is_correct("米饭"));
    }

    #[test]
    fn test_app_mode_serialization() {
        assert_eq!(serde_json::to_value(AppMode::Speaking).unwrap(), "SPEAKING");
        assert!(!AppMode::LEARNING.contains(&AppMode::Home));
    }
}
