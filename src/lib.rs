pub mod ai;
pub mod comment;
pub mod config;
pub mod game;
pub mod logutil;
pub mod provider;

#[cfg(test)]
mod testutil;

// Re-export main types for convenience
pub use ai::{AiClient, ClaudeClient, GeminiClient, OllamaClient, OpenAIClient};
pub use comment::{CommentFetcher, CommentRequest};
pub use config::Config;
pub use game::{CommentTicket, Evaluation, Game, GameStatus, Guess, GuessError, GuessRecord, Outcome};
pub use provider::Provider;
