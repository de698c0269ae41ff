use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info, warn};

use super::client::{ContentModel, GenerateContentRequest};
use super::json::parse_model_json;
use super::types::{Flashcard, Story, WritingResult};
use crate::config::GeminiConfig;
use crate::live::messages::{Blob, Part};

/// Matches the data-URL header the drawing canvas puts in front of the image
const IMAGE_PREFIXES: [&str; 3] = [
    "data:image/png;base64,",
    "data:image/jpeg;base64,",
    "data:image/jpg;base64,",
];

/// Generated lesson content for the listening, reading and writing modes.
///
/// Every operation returns `None` on failure; the cause is logged.
pub struct LessonService {
    model: Arc<dyn ContentModel>,
    text_model: String,
    image_model: String,
}

impl LessonService {
    pub fn new(model: Arc<dyn ContentModel>, config: &GeminiConfig) -> Self {
        Self {
            model,
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    /// Vocabulary card for `topic`
    pub async fn generate_flashcard(&self, topic: &str) -> Option<Flashcard> {
        let prompt = format!(
            "Generate a Chinese flashcard for a child learning Chinese. \
             Topic: \"{}\". \
             Return JSON with: word (Chinese characters), pinyin, meaning (English), \
             and a simple exampleSentence (Chinese).",
            topic
        );
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "word": { "type": "STRING" },
                "pinyin": { "type": "STRING" },
                "meaning": { "type": "STRING" },
                "exampleSentence": { "type": "STRING" }
            },
            "required": ["word", "pinyin", "meaning", "exampleSentence"]
        });

        let card: Option<Flashcard> = self
            .structured("Flashcard", GenerateContentRequest::text(&prompt).with_schema(schema))
            .await;
        if let Some(card) = &card {
            info!("Generated flashcard for {}: {}", topic, card.word);
        }
        card
    }

    /// Illustration for `word` as a `data:image/png;base64,` URL
    pub async fn generate_illustration(&self, word: &str) -> Option<String> {
        let prompt = format!(
            "A cute, simple, flat vector style illustration for children representing the word: \"{}\". \
             White background, colorful, cartoon style.",
            word
        );

        match self
            .model
            .generate_content(&self.image_model, &GenerateContentRequest::text(&prompt))
            .await
        {
            Ok(response) => match response.inline_data() {
                Some(blob) => Some(format!("data:image/png;base64,{}", blob.data)),
                None => {
                    warn!("Image model returned no image for {}", word);
                    None
                }
            },
            Err(e) => {
                error!("Image gen error: {:#}", e);
                None
            }
        }
    }

    /// Flashcard with its illustration attached. The card is still returned
    /// when the illustration fails.
    pub async fn illustrated_flashcard(&self, topic: &str) -> Option<Flashcard> {
        let mut card = self.generate_flashcard(topic).await?;
        card.image_url = self.generate_illustration(&card.word).await;
        Some(card)
    }

    /// Three-sentence story with a comprehension question
    pub async fn generate_story(&self) -> Option<Story> {
        let prompt = "Create a very short (3 sentences), funny story in simple Chinese for a 10-year-old. \
                      Include a comprehension question.";
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "content": { "type": "STRING" },
                "question": { "type": "STRING" },
                "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                "answer": { "type": "STRING" }
            },
            "required": ["title", "content", "question", "options", "answer"]
        });

        self.structured("Story", GenerateContentRequest::text(prompt).with_schema(schema))
            .await
    }

    /// Grade a handwriting attempt of `target`. `image` is base64 PNG, with or
    /// without a data-URL header.
    pub async fn check_handwriting(&self, image: &str, target: &str) -> Option<WritingResult> {
        let data = strip_image_prefix(image);
        let prompt = format!(
            "This is a child's handwriting attempt of the Chinese character \"{0}\". \
             Rate it from 1 to 10 (10 being perfect). Give brief, encouraging feedback in English. \
             Is it recognizable as \"{0}\"?",
            target
        );
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "score": { "type": "NUMBER" },
                "feedback": { "type": "STRING" },
                "isCorrect": { "type": "BOOLEAN" }
            },
            "required": ["score", "feedback", "isCorrect"]
        });

        let request = GenerateContentRequest::parts(vec![
            Part {
                text: None,
                inline_data: Some(Blob {
                    mime_type: "image/png".to_string(),
                    data: data.to_string(),
                }),
            },
            Part {
                text: Some(prompt),
                inline_data: None,
            },
        ])
        .with_schema(schema);

        self.structured("Handwriting", request).await
    }

    async fn structured<T: DeserializeOwned>(
        &self,
        label: &str,
        request: GenerateContentRequest,
    ) -> Option<T> {
        match self.model.generate_content(&self.text_model, &request).await {
            Ok(response) => parse_model_json(&response.text()),
            Err(e) => {
                error!("{} error: {:#}", label, e);
                None
            }
        }
    }
}

/// Remove a leading `data:image/(png|jpeg|jpg);base64,` header
pub fn strip_image_prefix(image: &str) -> &str {
    IMAGE_PREFIXES
        .iter()
        .find_map(|prefix| image.strip_prefix(prefix))
        .unwrap_or(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::client::GenerateContentResponse;
    use parking_lot::Mutex;

    /// Replays canned responses and records the requests it saw
    struct ScriptedModel {
        responses: Mutex<Vec<anyhow::Result<GenerateContentResponse>>>,
        requests: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<anyhow::Result<GenerateContentResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ContentModel for ScriptedModel {
        async fn generate_content(
            &self,
            model: &str,
            request: &GenerateContentRequest,
        ) -> anyhow::Result<GenerateContentResponse> {
            self.requests
                .lock()
                .push((model.to_string(), serde_json::to_value(request).unwrap()));
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
        }
    }

    fn text_response(text: &str) -> anyhow::Result<GenerateContentResponse> {
        Ok(serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
        .unwrap())
    }

    fn image_response(data: &str) -> anyhow::Result<GenerateContentResponse> {
        Ok(serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your picture" },
                { "inlineData": { "mimeType": "image/png", "data": data } }
            ] } }]
        }))
        .unwrap())
    }

    fn service(model: Arc<ScriptedModel>) -> LessonService {
        LessonService::new(model, &GeminiConfig::default())
    }

    const CARD: &str =
        r#"{"word":"猫","pinyin":"māo","meaning":"cat","exampleSentence":"我有一只猫。"}"#;

    #[tokio::test]
    async fn test_generate_flashcard() {
        let model = ScriptedModel::new(vec![text_response(CARD)]);
        let card = service(model.clone()).generate_flashcard("Animals").await.unwrap();

        assert_eq!(card.word, "猫");
        assert_eq!(card.pinyin, "māo");

        let requests = model.requests.lock();
        let (model_name, body) = &requests[0];
        assert_eq!(model_name, "gemini-2.5-flash");
        assert!(body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Topic: \"Animals\""));
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"],
            json!(["word", "pinyin", "meaning", "exampleSentence"])
        );
    }

    #[tokio::test]
    async fn test_fenced_flashcard() {
        let fenced = format!("```json\n{}\n```", CARD);
        let model = ScriptedModel::new(vec![text_response(&fenced)]);
        assert!(service(model).generate_flashcard("Animals").await.is_some());
    }

    #[tokio::test]
    async fn test_malformed_flashcard_is_none() {
        let model = ScriptedModel::new(vec![text_response("Sorry, I can't do that.")]);
        assert!(service(model).generate_flashcard("Animals").await.is_none());
    }

    #[tokio::test]
    async fn test_model_error_is_none() {
        let model = ScriptedModel::new(vec![Err(anyhow::anyhow!("quota exceeded"))]);
        assert!(service(model).generate_story().await.is_none());
    }

    #[tokio::test]
    async fn test_generate_illustration() {
        let model = ScriptedModel::new(vec![image_response("iVBORw0")]);
        let url = service(model.clone()).generate_illustration("猫").await;

        assert_eq!(url.as_deref(), Some("data:image/png;base64,iVBORw0"));
        assert_eq!(model.requests.lock()[0].0, "gemini-2.5-flash-image");
    }

    #[tokio::test]
    async fn test_illustration_without_image_is_none() {
        let model = ScriptedModel::new(vec![text_response("no image today")]);
        assert!(service(model).generate_illustration("猫").await.is_none());
    }

    #[tokio::test]
    async fn test_illustrated_flashcard_attaches_image() {
        let model = ScriptedModel::new(vec![text_response(CARD), image_response("AAAA")]);
        let card = service(model.clone()).illustrated_flashcard("Animals").await.unwrap();

        assert_eq!(card.image_url.as_deref(), Some("data:image/png;base64,AAAA"));
        let requests = model.requests.lock();
        assert!(requests[1].1["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("\"猫\""));
    }

    #[tokio::test]
    async fn test_illustrated_flashcard_survives_image_failure() {
        let model = ScriptedModel::new(vec![text_response(CARD), Err(anyhow::anyhow!("boom"))]);
        let card = service(model).illustrated_flashcard("Animals").await.unwrap();
        assert_eq!(card.image_url, None);
    }

    #[tokio::test]
    async fn test_generate_story() {
        let story = r#"{"title":"小狗","content":"小狗跑。小狗跳。小狗睡觉。","question":"小狗最后做什么？","options":["跑","跳","睡觉"],"answer":"睡觉"}"#;
        let model = ScriptedModel::new(vec![text_response(story)]);
        let story = service(model).generate_story().await.unwrap();

        assert_eq!(story.options.len(), 3);
        assert!(story.is_correct("睡觉"));
    }

    #[tokio::test]
    async fn test_check_handwriting_strips_prefix() {
        let model = ScriptedModel::new(vec![text_response(
            r#"{"score":7,"feedback":"Nice strokes!","isCorrect":true}"#,
        )]);
        let result = service(model.clone())
            .check_handwriting("data:image/png;base64,QUJD", "爱")
            .await
            .unwrap();

        assert_eq!(result.score, 7.0);
        assert!(result.is_correct);

        let requests = model.requests.lock();
        let parts = &requests[0].1["contents"][0]["parts"];
        assert_eq!(
            requests[0].1["generationConfig"]["responseSchema"]["required"],
            json!(["score", "feedback", "isCorrect"])
        );
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert!(parts[1]["text"].as_str().unwrap().contains("\"爱\""));
    }

    #[test]
    fn test_strip_image_prefix() {
        assert_eq!(strip_image_prefix("data:image/png;base64,AAA"), "AAA");
        assert_eq!(strip_image_prefix("data:image/jpeg;base64,AAA"), "AAA");
        assert_eq!(strip_image_prefix("data:image/jpg;base64,AAA"), "AAA");
        assert_eq!(strip_image_prefix("data:image/gif;base64,AAA"), "data:image/gif;base64,AAA");
        assert_eq!(strip_image_prefix("AAA"), "AAA");
    }
}
