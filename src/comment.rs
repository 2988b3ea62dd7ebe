//! AI game master comments
//!
//! Every evaluated guess gets one best-effort request to the configured
//! provider. Whatever goes wrong (no key, transport error, bad status, empty
//! reply, timeout) the caller still receives a non-empty line to show, and
//! the failure only ends up in the log.

use std::time::Duration;

use log::{debug, warn};

use crate::ai::AiClient;
use crate::config::DEFAULT_COMMENT_TIMEOUT_SECS;
use crate::game::{Evaluation, Outcome, MAX_GUESS, MIN_GUESS};
use crate::logutil::escape_log;

/// Shown when the provider answered with nothing.
pub const EMPTY_REPLY_COMMENT: &str = "Lucky, or maybe skill...";
/// Shown when the key or model setup looks wrong.
pub const SETUP_PROBLEM_COMMENT: &str =
    "Something looks off with the API key setup. Check your settings.";
/// Shown for every other failure.
pub const FALLBACK_COMMENT: &str = "Just keep going. I'm watching.";

/// Everything the game master gets to know about a guess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentRequest {
    pub target: u8,
    pub guess: u8,
    pub outcome: Outcome,
    pub attempts: usize,
}

impl From<&Evaluation> for CommentRequest {
    fn from(eval: &Evaluation) -> Self {
        Self {
            target: eval.target,
            guess: eval.guess,
            outcome: eval.outcome,
            attempts: eval.attempts,
        }
    }
}

pub fn build_prompt(req: &CommentRequest) -> String {
    format!(
        "Situation: the user is playing a game of guessing a number between {min} and {max}.\n\
         Target number: {target}\n\
         Number the user just entered: {guess}\n\
         Result: {result}\n\
         Attempts so far: {attempts}\n\
         \n\
         Instructions:\n\
         - You are the 'AI game master': a little grumpy, but witty.\n\
         - Comment on the result briefly (two sentences at most) and make it fun.\n\
         - Never reveal the target number unless the guess was correct.\n\
         - If the number of attempts is getting large, tease the user a little.\n\
         - If the user got it right, congratulate them reluctantly.",
        min = MIN_GUESS,
        max = MAX_GUESS,
        target = req.target,
        guess = req.guess,
        result = req.outcome.label(),
        attempts = req.attempts,
    )
}

/// Auth and lookup failures point at the setup rather than the network.
fn fallback_for_error(err: &anyhow::Error) -> &'static str {
    let msg = format!("{:#}", err).to_lowercase();
    if msg.contains("not found")
        || msg.contains("401")
        || msg.contains("403")
        || msg.contains("api key")
        || msg.contains("api_key")
    {
        SETUP_PROBLEM_COMMENT
    } else {
        FALLBACK_COMMENT
    }
}

#[derive(Clone)]
pub struct CommentFetcher {
    client: Option<AiClient>,
    model: String,
    timeout: Duration,
}

impl CommentFetcher {
    pub fn new(client: Option<AiClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            timeout: Duration::from_secs(DEFAULT_COMMENT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client(&self) -> Option<&AiClient> {
        self.client.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask for a comment. Always returns displayable text.
    pub async fn fetch(&self, req: &CommentRequest) -> String {
        let Some(client) = &self.client else {
            warn!("no API key configured, using fallback comment");
            return SETUP_PROBLEM_COMMENT.to_string();
        };

        let prompt = build_prompt(req);
        match tokio::time::timeout(self.timeout, client.query(&self.model, &prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("empty comment from {}", client.provider().as_str());
                    EMPTY_REPLY_COMMENT.to_string()
                } else {
                    debug!("comment: {}", escape_log(text));
                    text.to_string()
                }
            }
            Ok(Err(e)) => {
                warn!(
                    "comment request to {} failed: {}",
                    client.provider().as_str(),
                    escape_log(&format!("{:#}", e))
                );
                fallback_for_error(&e).to_string()
            }
            Err(_) => {
                warn!(
                    "comment request to {} timed out after {:?}",
                    client.provider().as_str(),
                    self.timeout
                );
                FALLBACK_COMMENT.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{GeminiClient, OllamaClient};
    use crate::testutil::{serve_once, serve_silent, unused_base_url};

    fn request(outcome: Outcome) -> CommentRequest {
        CommentRequest {
            target: 42,
            guess: 50,
            outcome,
            attempts: 3,
        }
    }

    fn ollama_at(base_url: &str) -> Option<AiClient> {
        Some(AiClient::Ollama(OllamaClient::new(base_url)))
    }

    #[test]
    fn prompt_carries_the_guess_context() {
        let prompt = build_prompt(&request(Outcome::TooHigh));
        assert!(prompt.contains("Target number: 42"));
        assert!(prompt.contains("entered: 50"));
        assert!(prompt.contains("Result: Too high"));
        assert!(prompt.contains("Attempts so far: 3"));
        assert!(prompt.contains("between 1 and 100"));

        let won = build_prompt(&request(Outcome::Correct));
        assert!(won.contains("Result: Correct!"));
    }

    #[test]
    fn request_from_evaluation() {
        let mut game = crate::game::Game::with_target(42);
        let eval = game.evaluate(crate::game::Guess::new(50).unwrap()).unwrap();
        assert_eq!(
            CommentRequest::from(&eval),
            CommentRequest { attempts: 1, ..request(Outcome::TooHigh) }
        );
    }

    #[tokio::test]
    async fn returns_trimmed_reply() {
        let (base_url, request_text) =
            serve_once("200 OK", r#"{"response":"  Too high. Aim lower.\n","done":true}"#).await;
        let fetcher = CommentFetcher::new(ollama_at(&base_url), "llama3.2:latest");

        let text = fetcher.fetch(&request(Outcome::TooHigh)).await;
        assert_eq!(text, "Too high. Aim lower.");

        let raw = request_text.await.unwrap();
        assert!(raw.contains("Target number: 42"));
    }

    #[tokio::test]
    async fn empty_reply_uses_placeholder() {
        let (base_url, _request) = serve_once("200 OK", r#"{"response":"   ","done":true}"#).await;
        let fetcher = CommentFetcher::new(ollama_at(&base_url), "llama3.2:latest");
        assert_eq!(fetcher.fetch(&request(Outcome::TooLow)).await, EMPTY_REPLY_COMMENT);
    }

    #[tokio::test]
    async fn unreachable_service_falls_back() {
        let fetcher = CommentFetcher::new(ollama_at(&unused_base_url().await), "llama3.2:latest");
        let text = fetcher.fetch(&request(Outcome::TooLow)).await;
        assert_eq!(text, FALLBACK_COMMENT);
        assert!(!text.is_empty());
    }

    #[tokio::test]
    async fn missing_key_points_at_settings() {
        let fetcher = CommentFetcher::new(None, "gemini-2.5-flash");
        assert_eq!(fetcher.fetch(&request(Outcome::Correct)).await, SETUP_PROBLEM_COMMENT);
    }

    #[tokio::test]
    async fn not_found_error_points_at_settings() {
        let (base_url, _request) = serve_once(
            "404 Not Found",
            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#,
        )
        .await;
        let client = AiClient::Gemini(GeminiClient::new("g-key").with_base_url(&base_url));
        let fetcher = CommentFetcher::new(Some(client), "gemini-2.5-flash");
        assert_eq!(fetcher.fetch(&request(Outcome::TooHigh)).await, SETUP_PROBLEM_COMMENT);
    }

    #[tokio::test]
    async fn server_error_uses_generic_fallback() {
        let (base_url, _request) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let fetcher = CommentFetcher::new(ollama_at(&base_url), "llama3.2:latest");
        assert_eq!(fetcher.fetch(&request(Outcome::TooHigh)).await, FALLBACK_COMMENT);
    }

    #[tokio::test]
    async fn hung_service_times_out() {
        let fetcher = CommentFetcher::new(ollama_at(&serve_silent().await), "llama3.2:latest")
            .with_timeout(Duration::from_millis(100));
        assert_eq!(fetcher.fetch(&request(Outcome::TooLow)).await, FALLBACK_COMMENT);
    }
}
