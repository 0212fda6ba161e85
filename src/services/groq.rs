use serde::{Deserialize, Serialize};

use crate::models::{truncate_chars, AnalysisError, HostedImageRef, RawInferencePayload, BODY_PREVIEW_CHARS};

pub const DEFAULT_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// The key names (typos included) are what the model is asked to produce and
/// what downstream normalization expects first. Do not correct them.
pub const NUTRITION_PROMPT: &str = "Analyze this food image and provide nutritional information for each item. Return ONLY valid JSON in this exact format: {\"items\":[{\"item_name\":\"name\",\"total_calories\":150,\"total_protien\":10,\"toal_carbs\":20,\"toal_fats\":5}]}";

/// Multimodal model that turns a hosted image into nutrition JSON text.
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    async fn analyze(&self, image: &HostedImageRef) -> Result<RawInferencePayload, AnalysisError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    model: String,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Sampling knobs sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub top_p: f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_completion_tokens: 2048,
            top_p: 1.0,
        }
    }
}

pub struct GroqClient {
    api_key: String,
    model: String,
    chat_url: String,
    sampling: SamplingOptions,
    client: reqwest::Client,
}

impl GroqClient {
    pub fn new(
        api_key: String,
        model: String,
        chat_url: String,
        sampling: SamplingOptions,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_key,
            model,
            chat_url,
            sampling,
            client,
        }
    }

    fn build_request(&self, image: &HostedImageRef) -> ChatRequest {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    content_type: "text".to_string(),
                    text: NUTRITION_PROMPT.to_string(),
                },
                ContentPart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData {
                        url: image.url.clone(),
                    },
                },
            ],
        }];

        ChatRequest {
            messages,
            model: self.model.clone(),
            temperature: self.sampling.temperature,
            max_completion_tokens: self.sampling.max_completion_tokens,
            top_p: self.sampling.top_p,
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }
}

/// Pulls `choices[0].message.content` out of a chat completion body.
fn extract_content(response_text: &str) -> Result<String, AnalysisError> {
    let malformed = |reason: String| AnalysisError::InferenceMalformed {
        reason,
        body: response_text.to_string(),
    };

    let chat_response: ChatResponse =
        serde_json::from_str(response_text).map_err(|e| malformed(e.to_string()))?;

    chat_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no choices in response".to_string()))?
        .message
        .ok_or_else(|| malformed("choice has no message".to_string()))?
        .content
        .ok_or_else(|| malformed("message has no content".to_string()))
}

#[async_trait::async_trait]
impl InferenceClient for GroqClient {
    async fn analyze(&self, image: &HostedImageRef) -> Result<RawInferencePayload, AnalysisError> {
        log::debug!("📸 Analyzing image URL: {}", image.url);

        let request = self.build_request(image);
        log::info!("🤖 Sending request to Groq with model: {}", self.model);

        let response = self
            .client
            .post(&self.chat_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::InferenceFailed {
                status: None,
                body: e.without_url().to_string(),
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| AnalysisError::InferenceFailed {
            status: Some(status.as_u16()),
            body: e.without_url().to_string(),
        })?;

        log::debug!("📥 Groq response status: {}", status);
        log::debug!("📄 Groq raw response: {}", response_text);

        if !status.is_success() {
            log::error!("❌ Groq API error ({}): {}", status, response_text);
            return Err(AnalysisError::InferenceFailed {
                status: Some(status.as_u16()),
                body: truncate_chars(&response_text, BODY_PREVIEW_CHARS),
            });
        }

        let content = extract_content(&response_text)?;
        log::info!("💬 Groq response content: {}", content);

        Ok(RawInferencePayload(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hosted() -> HostedImageRef {
        HostedImageRef {
            url: "https://i.ibb.co/abc/food.jpg".to_string(),
        }
    }

    fn client_for(server: &MockServer) -> GroqClient {
        GroqClient::new(
            "test_key".to_string(),
            DEFAULT_MODEL.to_string(),
            format!("{}/openai/v1/chat/completions", server.uri()),
            SamplingOptions::default(),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_prompt_keeps_upstream_key_spellings() {
        for key in ["item_name", "total_calories", "total_protien", "toal_carbs", "toal_fats"] {
            assert!(NUTRITION_PROMPT.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
    }

    #[test]
    fn test_request_shape() {
        let client = GroqClient::new(
            "k".to_string(),
            "m".to_string(),
            DEFAULT_CHAT_URL.to_string(),
            SamplingOptions::default(),
            reqwest::Client::new(),
        );
        let json = serde_json::to_value(client.build_request(&hosted())).unwrap();

        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(json["messages"][0]["content"][1]["image_url"]["url"], hosted().url);
        assert_eq!(json["model"], "m");
        assert_eq!(json["max_completion_tokens"], 2048);
        assert_eq!(json["stream"], false);
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn test_analyze_returns_content_verbatim() {
        let server = MockServer::start().await;
        let content = r#"{"items":[{"item_name":"Apple","total_calories":95}]}"#;

        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer test_key"))
            .and(body_partial_json(json!({
                "stream": false,
                "response_format": { "type": "json_object" }
            })))
            .and(body_string_contains("total_protien"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = client_for(&server).analyze(&hosted()).await.unwrap();
        assert_eq!(payload.as_str(), content);
    }

    #[tokio::test]
    async fn test_error_status_is_inference_failure_with_truncated_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("e".repeat(1000)))
            .mount(&server)
            .await;

        match client_for(&server).analyze(&hosted()).await {
            Err(AnalysisError::InferenceFailed { status, body }) => {
                assert_eq!(status, Some(503));
                assert_eq!(body.len(), BODY_PREVIEW_CHARS);
            }
            other => panic!("expected InferenceFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_content_path_is_malformed() {
        let bodies = [
            json!({}),
            json!({ "choices": [] }),
            json!({ "choices": [{}] }),
            json!({ "choices": [{ "message": {} }] }),
            json!({ "choices": [{ "message": { "content": null } }] }),
        ];

        for body in bodies {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&server)
                .await;

            let err = client_for(&server).analyze(&hosted()).await.unwrap_err();
            assert!(
                matches!(err, AnalysisError::InferenceMalformed { .. }),
                "{} should be malformed",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("upstream hiccup"))
            .mount(&server)
            .await;

        let err = client_for(&server).analyze(&hosted()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InferenceMalformed { .. }));
    }
}
