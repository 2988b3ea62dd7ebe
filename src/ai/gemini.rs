use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate's parts
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn query(&self, model: &str, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self.client
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        Ok(gemini_response.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve_once;

    #[tokio::test]
    async fn generate_content_joins_parts() {
        let (base_url, request) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Too low. "},{"text":"Try harder."}]}}]}"#,
        )
        .await;
        let client = GeminiClient::new("g-key").with_base_url(&base_url);

        let reply = client.query("gemini-2.5-flash", "hi").await.unwrap();
        assert_eq!(reply, "Too low. Try harder.");

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent "));
        assert!(raw.to_lowercase().contains("x-goog-api-key: g-key"));
        assert!(raw.contains(r#""parts":[{"text":"hi"}]"#));
    }

    #[tokio::test]
    async fn blocked_prompt_has_no_text() {
        let (base_url, _request) =
            serve_once("200 OK", r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).await;
        let client = GeminiClient::new("g-key").with_base_url(&base_url);
        assert_eq!(client.query("gemini-2.5-flash", "hi").await.unwrap(), "");
    }

    #[tokio::test]
    async fn missing_model_error_mentions_not_found() {
        let (base_url, _request) = serve_once(
            "404 Not Found",
            r#"{"error":{"code":404,"message":"models/nope is not found","status":"NOT_FOUND"}}"#,
        )
        .await;
        let err = GeminiClient::new("g-key")
            .with_base_url(&base_url)
            .query("nope", "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
