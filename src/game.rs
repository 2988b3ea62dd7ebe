//! Guess evaluation state machine
//!
//! A [`Game`] owns one session: the secret target, the ordered guess history,
//! the play status and the comment the AI game master last produced. It is a
//! plain value with no I/O so every transition can be driven directly from
//! tests; the UI and the comment fetcher sit around it.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Local};
use log::{debug, trace};
use rand::Rng;
use thiserror::Error;

pub const MIN_GUESS: u8 = 1;
pub const MAX_GUESS: u8 = 100;

/// Comment shown right after a reset.
pub const RESET_COMMENT: &str = "Starting over, huh. Try to do better this time.";

/// Result of comparing a guess with the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    TooHigh,
    TooLow,
    Correct,
}

impl Outcome {
    pub fn of(guess: u8, target: u8) -> Self {
        match guess.cmp(&target) {
            Ordering::Greater => Outcome::TooHigh,
            Ordering::Less => Outcome::TooLow,
            Ordering::Equal => Outcome::Correct,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::TooHigh => "Too high",
            Outcome::TooLow => "Too low",
            Outcome::Correct => "Correct!",
        }
    }
}

/// Why a piece of input was not accepted as a guess
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuessError {
    #[error("Enter a number between 1 and 100.")]
    Empty,
    #[error("'{0}' is not a number. Enter a number between 1 and 100.")]
    NotANumber(String),
    #[error("{0} is out of range. Enter a number between 1 and 100.")]
    OutOfRange(i64),
}

/// A guess that has already been range checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Guess(u8);

impl Guess {
    pub fn new(value: i64) -> Result<Self, GuessError> {
        if (MIN_GUESS as i64..=MAX_GUESS as i64).contains(&value) {
            Ok(Guess(value as u8))
        } else {
            Err(GuessError::OutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl FromStr for Guess {
    type Err = GuessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(GuessError::Empty);
        }
        let value: i64 = trimmed
            .parse()
            .map_err(|_| GuessError::NotANumber(trimmed.to_string()))?;
        Guess::new(value)
    }
}

/// One evaluated guess. Never modified after it is pushed to the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessRecord {
    pub value: u8,
    pub outcome: Outcome,
    pub submitted_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    Won,
}

/// Identifies the comment request a game is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentTicket(u64);

/// What a successful `evaluate` hands back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub guess: u8,
    pub target: u8,
    pub outcome: Outcome,
    pub attempts: usize,
    pub ticket: CommentTicket,
}

#[derive(Debug)]
pub struct Game {
    target: u8,
    history: Vec<GuessRecord>,
    status: GameStatus,
    comment: String,
    pending: Option<CommentTicket>,
    // Survives resets so tickets from an old session never match.
    next_ticket: u64,
}

pub fn draw_target<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(MIN_GUESS..=MAX_GUESS)
}

impl Game {
    pub fn new() -> Self {
        Self::with_target(draw_target(&mut rand::thread_rng()))
    }

    /// Start a session with a known target, clamped into the guess range.
    pub fn with_target(target: u8) -> Self {
        let target = target.clamp(MIN_GUESS, MAX_GUESS);
        trace!("new game, target {}", target);
        Self {
            target,
            history: Vec::new(),
            status: GameStatus::InProgress,
            comment: String::new(),
            pending: None,
            next_ticket: 0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[GuessRecord] {
        &self.history
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_won(&self) -> bool {
        self.status == GameStatus::Won
    }

    /// The target, but only once it has been guessed.
    pub fn revealed_target(&self) -> Option<u8> {
        self.is_won().then_some(self.target)
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn is_comment_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_ticket(&self) -> Option<CommentTicket> {
        self.pending
    }

    /// Whether `evaluate` would do anything right now.
    pub fn can_guess(&self) -> bool {
        self.status == GameStatus::InProgress && self.pending.is_none()
    }

    /// Evaluate a guess against the target.
    ///
    /// Returns `None` without touching any state when the game is already won
    /// or a comment for the previous guess is still outstanding. Otherwise the
    /// guess is recorded and a comment becomes pending under the returned
    /// ticket until [`Game::resolve_comment`] is called with it.
    pub fn evaluate(&mut self, guess: Guess) -> Option<Evaluation> {
        if !self.can_guess() {
            return None;
        }

        let outcome = Outcome::of(guess.value(), self.target);
        self.history.push(GuessRecord {
            value: guess.value(),
            outcome,
            submitted_at: Local::now(),
        });
        if outcome == Outcome::Correct {
            self.status = GameStatus::Won;
        }

        let ticket = CommentTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending = Some(ticket);

        debug!(
            "guess #{}: {} -> {:?}",
            self.history.len(),
            guess.value(),
            outcome
        );

        Some(Evaluation {
            guess: guess.value(),
            target: self.target,
            outcome,
            attempts: self.history.len(),
            ticket,
        })
    }

    /// Attach a comment for the pending request.
    ///
    /// Returns false and leaves the game alone if `ticket` is not the one
    /// being waited on (a reply that arrived after a reset, for instance).
    pub fn resolve_comment(&mut self, ticket: CommentTicket, text: String) -> bool {
        if self.pending != Some(ticket) {
            debug!("discarding stale comment for {:?}", ticket);
            return false;
        }
        self.comment = text;
        self.pending = None;
        true
    }

    pub fn reset(&mut self) {
        self.reset_with(&mut rand::thread_rng());
    }

    pub fn reset_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let next_ticket = self.next_ticket;
        *self = Game {
            comment: RESET_COMMENT.to_string(),
            next_ticket,
            ..Game::with_target(draw_target(rng))
        };
        debug!("game reset");
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
