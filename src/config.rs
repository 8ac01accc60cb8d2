use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use thiserror::Error;

use crate::backend::{anthropic, openai};

/// Separator between entries of `--trigger-chars`
const TRIGGER_SEPARATOR: &str = "||";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OpenAI API key is required when using the openai handler")]
    MissingOpenAiKey,

    #[error("Anthropic API key is required when using the anthropic handler")]
    MissingAnthropicKey,

    #[error("num-suggestions must be at least 1")]
    NoSuggestions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Openai,
    Anthropic,
}

impl BackendKind {
    /// Name the backend is registered under
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Openai => "openai",
            BackendKind::Anthropic => "anthropic",
        }
    }
}

/// How in-flight work is shown to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressStyle {
    /// Short-lived information diagnostic at the cursor or selection
    Diagnostic,
    /// `$/progress` work-done reports
    WorkDone,
}

/// Command-line options. Every option can also come from the environment;
/// an explicit flag wins.
#[derive(Debug, Clone, Parser)]
#[command(name = "assist-lsp", version, about)]
pub struct Config {
    /// Backend used for completions and code actions
    #[arg(long, env = "HANDLER", value_enum, default_value = "openai")]
    pub handler: BackendKind,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4.1-mini")]
    pub openai_model: String,

    #[arg(long, env = "OPENAI_MODEL_FOR_CHAT", default_value = "gpt-5")]
    pub openai_model_for_chat: String,

    #[arg(long, env = "OPENAI_ENDPOINT", default_value = openai::DEFAULT_BASE_URL)]
    pub openai_endpoint: String,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_MODEL", default_value = "claude-haiku-4-5")]
    pub anthropic_model: String,

    #[arg(long, env = "ANTHROPIC_MODEL_FOR_CHAT", default_value = "claude-sonnet-4-5")]
    pub anthropic_model_for_chat: String,

    #[arg(long, env = "ANTHROPIC_ENDPOINT", default_value = anthropic::DEFAULT_BASE_URL)]
    pub anthropic_endpoint: String,

    /// Completion debounce delay (ms)
    #[arg(long, env = "DEBOUNCE", default_value_t = 200)]
    pub debounce: u64,

    /// Completion trigger characters, separated by `||`
    #[arg(long, env = "TRIGGER_CHARACTERS", default_value = "{||(|| ")]
    pub trigger_chars: String,

    #[arg(long, env = "NUM_SUGGESTIONS", default_value_t = 1)]
    pub num_suggestions: usize,

    /// Log file path; defaults to the data directory
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// HTTP request timeout (ms)
    #[arg(long, env = "FETCH_TIMEOUT", default_value_t = 15000)]
    pub fetch_timeout: u64,

    /// Code action timeout (ms)
    #[arg(long, env = "ACTION_TIMEOUT", default_value_t = 15000)]
    pub action_timeout: u64,

    /// Completion timeout (ms)
    #[arg(long, env = "COMPLETION_TIMEOUT", default_value_t = 15000)]
    pub completion_timeout: u64,

    /// Send one completion query to the selected backend, print the result and exit
    #[arg(long)]
    pub debug_query: Option<String>,

    #[arg(
        long,
        env = "ENABLE_PROGRESS_SPINNER",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub enable_progress_spinner: bool,

    /// Progress spinner update interval (ms)
    #[arg(long, env = "PROGRESS_UPDATE_INTERVAL", default_value_t = 200)]
    pub progress_update_interval: u64,

    #[arg(long, env = "PROGRESS_STYLE", value_enum, default_value = "diagnostic")]
    pub progress_style: ProgressStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            handler: BackendKind::Openai,
            openai_key: None,
            openai_model: "gpt-4.1-mini".to_string(),
            openai_model_for_chat: "gpt-5".to_string(),
            openai_endpoint: openai::DEFAULT_BASE_URL.to_string(),
            anthropic_key: None,
            anthropic_model: "claude-haiku-4-5".to_string(),
            anthropic_model_for_chat: "claude-sonnet-4-5".to_string(),
            anthropic_endpoint: anthropic::DEFAULT_BASE_URL.to_string(),
            debounce: 200,
            trigger_chars: "{||(|| ".to_string(),
            num_suggestions: 1,
            log_file: None,
            fetch_timeout: 15000,
            action_timeout: 15000,
            completion_timeout: 15000,
            debug_query: None,
            enable_progress_spinner: true,
            progress_update_interval: 200,
            progress_style: ProgressStyle::Diagnostic,
        }
    }
}

impl Config {
    /// Checks that the selected handler has what it needs to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.handler {
            BackendKind::Openai if !has_value(&self.openai_key) => {
                return Err(ConfigError::MissingOpenAiKey);
            }
            BackendKind::Anthropic if !has_value(&self.anthropic_key) => {
                return Err(ConfigError::MissingAnthropicKey);
            }
            _ => {}
        }

        if self.num_suggestions == 0 {
            return Err(ConfigError::NoSuggestions);
        }

        Ok(())
    }

    pub fn trigger_characters(&self) -> Vec<String> {
        self.trigger_chars
            .split(TRIGGER_SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_update_interval.max(1))
    }

    /// Log file to write to, with a leading `~` expanded.
    pub fn log_path(&self) -> PathBuf {
        match &self.log_file {
            Some(path) => expand_tilde(path, dirs::home_dir()),
            None => log_path(),
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// Returns the path to the data directory for assist-lsp.
/// Uses $XDG_DATA_HOME/assist-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/assist-lsp,
/// or ./assist-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the default path of the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("assist-lsp.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("assist-lsp")
}

fn expand_tilde(path: &Path, home_dir: Option<PathBuf>) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match home_dir {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
