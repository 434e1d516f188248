//! Client for the Gemini `generateContent` REST API.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use super::{FaceJudge, JudgeError};
use crate::images::services::InlineImage;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const VERIFY_PROMPT: &str = "You are a highly accurate face verification system. \
Is the person in 'Image A' the *exact same person* as in 'Image B'? Do not be lenient. \
If there is any doubt at all, respond 'no'. Your entire response must be a single word: \
either 'yes' or 'no'.";

pub struct GeminiJudge {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiJudge {
    pub fn new(api_key: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, JudgeError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;
        first_text(response)
    }
}

#[async_trait::async_trait]
impl FaceJudge for GeminiJudge {
    async fn same_person(&self, a: &InlineImage, b: &InlineImage) -> Result<bool, JudgeError> {
        let parts = vec![
            Part::text(VERIFY_PROMPT),
            Part::text("\n--- Image A ---"),
            Part::inline(a),
            Part::text("\n--- Image B ---"),
            Part::inline(b),
        ];
        let reply = self.generate(parts).await?;
        Ok(parse_verdict(&reply))
    }

    async fn summarize(&self, prompt: &str) -> Result<String, JudgeError> {
        self.generate(vec![Part::text(prompt)]).await
    }
}

// --- wire types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn inline(image: &InlineImage) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(&image.data),
            }),
        }
    }
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn first_text(response: GenerateResponse) -> Result<String, JudgeError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| JudgeError::Response("no text part in reply".into()))
}

/// The model is told to answer with a single word; be forgiving about case
/// and stray punctuation, strict about everything else.
pub(crate) fn parse_verdict(reply: &str) -> bool {
    let cleaned: String = reply
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '!'))
        .collect();
    cleaned == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn verdict_accepts_yes_variants() {
        assert!(parse_verdict("yes"));
        assert!(parse_verdict("Yes."));
        assert!(parse_verdict("  YES!  "));
    }

    #[test]
    fn verdict_rejects_everything_else() {
        assert!(!parse_verdict("no"));
        assert!(!parse_verdict("No."));
        assert!(!parse_verdict("yes, it is the same person"));
        assert!(!parse_verdict(""));
    }

    #[test]
    fn inline_part_serializes_with_camel_case_keys() {
        let image = InlineImage {
            mime_type: "image/jpeg".into(),
            data: Bytes::from_static(b"abc"),
        };
        let value = serde_json::to_value(Part::inline(&image)).expect("serialize");
        let inline = value.get("inlineData").expect("inlineData key");
        assert_eq!(inline["mimeType"], "image/jpeg");
        assert_eq!(inline["data"], BASE64.encode(b"abc"));
        assert!(value.get("text").is_none());
    }

    #[test]
    fn text_part_skips_inline_data() {
        let value = serde_json::to_value(Part::text("hello")).expect("serialize");
        assert_eq!(value["text"], "hello");
        assert!(value.get("inlineData").is_none());
    }

    #[test]
    fn first_text_picks_first_candidate() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"yes"}]}},{"content":{"parts":[{"text":"no"}]}}]}"#,
        )
        .expect("deserialize");
        assert_eq!(first_text(response).expect("text"), "yes");
    }

    #[test]
    fn first_text_errors_on_empty_reply() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).expect("deserialize");
        assert!(matches!(
            first_text(response),
            Err(JudgeError::Response(_))
        ));
    }
}
