//! Binary entrypoint for number-master.
//!
//! Starts the terminal game by default. `--check` only runs the provider
//! connection test and exits, which is handy when setting up API keys.
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use number_master::{AiClient, Config, Provider};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "number-master")]
#[command(about = "Guess the number between 1 and 100 while an AI game master comments on every try")]
#[command(version)]
struct Cli {
    /// AI provider for comments: gemini, claude, openai or ollama
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to ask for comments (defaults to the provider's default)
    #[arg(short, long)]
    model: Option<String>,

    /// Seconds to wait for a comment before using a fallback line (this run only)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Log file (defaults to number-master.log in the config directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Test the connection to the provider and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file.clone(), cli.verbose);

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("could not load config, using defaults: {:#}", e);
        Config::new()
    });

    let provider = match cli.provider.as_deref() {
        Some(name) => Provider::from_str(name)
            .ok_or_else(|| anyhow!("unknown provider '{}'", name))?,
        None => config.provider(),
    };
    // A configured model only applies to the provider it was saved with
    let model = cli.model.clone().or_else(|| {
        (provider == config.provider())
            .then(|| config.default_model.clone())
            .flatten()
    });

    if cli.check {
        return check_connection(&config, provider, model).await;
    }

    let mut app = App::new(config, provider, model);
    if let Some(secs) = cli.timeout {
        app = app.with_comment_timeout(Duration::from_secs(secs));
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    info!(
        "starting with provider {} ({})",
        provider.as_str(),
        app.selected_model
    );

    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        app.poll_tasks().await;
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }

    Ok(())
}

async fn check_connection(config: &Config, provider: Provider, model: Option<String>) -> Result<()> {
    let model = model.unwrap_or_else(|| provider.default_model().to_string());
    let Some(client) = AiClient::from_config(provider, config) else {
        let hint = provider.api_key_env().unwrap_or("the config file");
        return Err(anyhow!(
            "no API key for {}. Set {} or add it with the provider picker (P).",
            provider.display_name(),
            hint
        ));
    };

    println!("Testing {} with model {}...", provider.display_name(), model);
    if client.test_connection(&model).await {
        println!("Connected.");
        Ok(())
    } else {
        Err(anyhow!("connection test failed, see the log for details"))
    }
}

fn init_logging(log_file: Option<PathBuf>, verbosity: u8) {
    use std::io::Write;

    // The terminal UI owns stderr, so log records only ever go to a file
    let path = match log_file.map(Ok).unwrap_or_else(Config::default_log_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("warning: logging disabled, no log file location: {:#}", e);
            return;
        }
    };
    let file = match open_log_file(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("warning: logging disabled, cannot open {}: {}", path.display(), e);
            return;
        }
    };

    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity, RUST_LOG directives on top
    let base_level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format(|fmt, record| {
        writeln!(
            fmt,
            "{} [{}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.args()
        )
    });
    builder.target(env_logger::Target::Pipe(Box::new(file)));
    let _ = builder.try_init();
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn timeout_must_be_positive() {
        assert!(Cli::try_parse_from(["number-master", "--timeout", "0"]).is_err());
        let cli = Cli::try_parse_from(["number-master", "--timeout", "3"]).unwrap();
        assert_eq!(cli.timeout, Some(3));
        let cli = Cli::try_parse_from(["number-master"]).unwrap();
        assert_eq!(cli.timeout, None);
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("game.log");
        assert!(open_log_file(&path).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn unusable_log_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        assert!(open_log_file(&blocker.join("game.log")).is_err());
    }
}
