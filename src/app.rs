use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use number_master::comment::FALLBACK_COMMENT;
use number_master::{
    AiClient, CommentFetcher, CommentRequest, CommentTicket, Config, Evaluation, Game, Guess,
    Provider,
};

/// Longest input the guess box accepts ("100")
pub const MAX_INPUT_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Provider needs a key and none is configured
    NotSet,
    /// Key present, never tested
    Unchecked,
    Checking,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::NotSet => "key needed",
            ConnectionStatus::Unchecked => "not tested",
            ConnectionStatus::Checking => "checking...",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "connection error",
        }
    }
}

/// The one outstanding comment request
struct PendingComment {
    ticket: CommentTicket,
    handle: JoinHandle<String>,
}

pub struct App {
    pub should_quit: bool,

    // Game state
    pub game: Game,
    pub guess_input: String,
    pub input_error: Option<String>,
    comment_task: Option<PendingComment>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Provider state
    pub config: Config,
    /// Where `config` is saved; `None` means the default location
    config_path: Option<PathBuf>,
    /// `--timeout` for this run only, never written to the config file
    timeout_override: Option<Duration>,
    pub current_provider: Provider,
    pub selected_model: String,
    pub fetcher: CommentFetcher,
    pub connection_status: ConnectionStatus,
    connection_task: Option<JoinHandle<bool>>,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub api_key_target_provider: Option<Provider>,
}

impl App {
    pub fn new(config: Config, provider: Provider, model: Option<String>) -> Self {
        let selected_model = model.unwrap_or_else(|| provider.default_model().to_string());

        let mut app = Self {
            should_quit: false,

            game: Game::new(),
            guess_input: String::new(),
            input_error: None,
            comment_task: None,

            animation_frame: 0,

            config,
            config_path: None,
            timeout_override: None,
            current_provider: provider,
            selected_model,
            fetcher: CommentFetcher::new(None, ""),
            connection_status: ConnectionStatus::NotSet,
            connection_task: None,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            api_key_target_provider: None,
        };
        app.rebuild_fetcher();
        app
    }

    /// Use `timeout` for comments in this session without touching the config.
    pub fn with_comment_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self.rebuild_fetcher();
        self
    }

    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Recreate the comment fetcher after the provider, model or key changed.
    pub fn rebuild_fetcher(&mut self) {
        let client = AiClient::from_config(self.current_provider, &self.config);
        self.connection_status = if client.is_some() {
            ConnectionStatus::Unchecked
        } else {
            ConnectionStatus::NotSet
        };
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
        self.fetcher = CommentFetcher::new(client, &self.selected_model)
            .with_timeout(
                self.timeout_override
                    .unwrap_or_else(|| self.config.comment_timeout()),
            );
    }

    // Guess input

    pub fn can_edit_guess(&self) -> bool {
        self.game.can_guess()
    }

    pub fn push_guess_char(&mut self, c: char) {
        if !self.can_edit_guess() || !c.is_ascii_digit() {
            return;
        }
        if self.guess_input.len() < MAX_INPUT_LEN {
            self.guess_input.push(c);
            self.input_error = None;
        }
    }

    pub fn pop_guess_char(&mut self) {
        self.guess_input.pop();
        self.input_error = None;
    }

    /// Validate the input box and evaluate it. Invalid input only sets `input_error`.
    pub fn submit_guess(&mut self) {
        if !self.game.can_guess() {
            return;
        }

        let guess: Guess = match self.guess_input.parse() {
            Ok(guess) => guess,
            Err(e) => {
                self.input_error = Some(e.to_string());
                return;
            }
        };

        self.guess_input.clear();
        self.input_error = None;
        if let Some(eval) = self.game.evaluate(guess) {
            self.spawn_comment(&eval);
        }
    }

    fn spawn_comment(&mut self, eval: &Evaluation) {
        let fetcher = self.fetcher.clone();
        let request = CommentRequest::from(eval);
        let handle = tokio::spawn(async move { fetcher.fetch(&request).await });
        self.comment_task = Some(PendingComment {
            ticket: eval.ticket,
            handle,
        });
    }

    pub fn reset_game(&mut self) {
        if let Some(pending) = self.comment_task.take() {
            pending.handle.abort();
        }
        self.game.reset();
        self.guess_input.clear();
        self.input_error = None;
        self.animation_frame = 0;
        info!("new game started");
    }

    /// Collect finished background work. Called once per loop iteration.
    pub async fn poll_tasks(&mut self) {
        if self.comment_task.as_ref().is_some_and(|p| p.handle.is_finished()) {
            if let Some(pending) = self.comment_task.take() {
                self.finish_comment(pending).await;
            }
        }

        if self.connection_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.connection_task.take() {
                let ok = task.await.unwrap_or(false);
                self.connection_status = if ok {
                    ConnectionStatus::Connected
                } else {
                    ConnectionStatus::Error
                };
            }
        }
    }

    async fn finish_comment(&mut self, pending: PendingComment) {
        let text = match pending.handle.await {
            Ok(text) => text,
            Err(e) => {
                warn!("comment task failed: {}", e);
                FALLBACK_COMMENT.to_string()
            }
        };
        self.game.resolve_comment(pending.ticket, text);
    }

    pub fn tick_animation(&mut self) {
        if self.game.is_comment_pending() || self.connection_status == ConnectionStatus::Checking {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Connection test

    pub fn start_connection_test(&mut self) {
        if self.connection_task.is_some() {
            return;
        }
        let Some(client) = self.fetcher.client().cloned() else {
            self.connection_status = ConnectionStatus::NotSet;
            return;
        };
        let model = self.selected_model.clone();
        self.connection_status = ConnectionStatus::Checking;
        self.connection_task = Some(tokio::spawn(async move {
            client.test_connection(&model).await
        }));
    }

    // Provider picker methods

    pub fn open_provider_picker(&mut self) {
        let current_idx = Provider::all()
            .iter()
            .position(|p| *p == self.current_provider)
            .unwrap_or(0);
        self.provider_picker_state.select(Some(current_idx));
        self.show_provider_picker = true;
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        if len > 0 {
            let i = self.provider_picker_state.selected().unwrap_or(0);
            self.provider_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Act on the highlighted provider: switch to it, or ask for its key first.
    pub fn choose_picked_provider(&mut self) {
        let Some(provider) = self
            .provider_picker_state
            .selected()
            .and_then(|i| Provider::all().get(i).copied())
        else {
            return;
        };

        self.show_provider_picker = false;
        if self.config.key_source(provider).is_none() {
            self.api_key_target_provider = Some(provider);
            self.show_api_key_input = true;
            self.api_key_input.clear();
            self.api_key_input_cursor = 0;
        } else {
            self.switch_provider(provider);
        }
    }

    pub fn switch_provider(&mut self, provider: Provider) {
        if provider != self.current_provider {
            self.selected_model = provider.default_model().to_string();
        }
        self.current_provider = provider;
        self.config.provider = Some(provider.as_str().to_string());
        self.config.default_model = Some(self.selected_model.clone());
        self.save_config();
        self.rebuild_fetcher();
        info!("provider set to {} ({})", provider.as_str(), self.selected_model);
    }

    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        self.config.key_source(provider)
    }

    // API key input methods

    pub fn cancel_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.api_key_target_provider = None;
    }

    pub fn confirm_api_key_input(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if let Some(provider) = self.api_key_target_provider {
            if !key.is_empty() {
                self.config.set_api_key(provider, &key);
                self.switch_provider(provider);
            }
        }
        self.cancel_api_key_input();
    }

    fn save_config(&self) {
        let saved = match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => self.config.save(),
        };
        if let Err(e) = saved {
            warn!("could not save config: {:#}", e);
        }
    }
}
