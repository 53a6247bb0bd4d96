//! `tasks` binary entry point.
//!
//! Usage: tasks [--api-url <url>] [--token-file <path>] <command>
//!
//! Tokens persist in a JSON file between runs, so `tasks login` once and
//! the other commands reuse the session until it expires.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tasks_core::{ApiClient, ClientConfig, FileTokenStore, Session};
use tracing_subscriber::EnvFilter;

/// Personal task list client.
#[derive(Parser, Debug)]
#[command(name = "tasks")]
#[command(about = "Manage your personal task list from the terminal")]
struct Args {
    /// API root, including the `/api` prefix. Falls back to `TASKS_API_URL`,
    /// then to the production service.
    #[arg(long)]
    api_url: Option<String>,

    /// Where the access/refresh tokens are kept between runs.
    #[arg(long, env = "TASKS_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with a username or email.
    Login {
        identifier: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "TASKS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account. Sign in afterwards with `login`.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        password_confirm: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List tasks, newest first.
    List,
    /// Add a task.
    Add {
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Replace a task's title and description.
    Edit {
        id: u64,
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Flip a task between pending and done.
    Toggle { id: u64 },
    /// Delete a task.
    Rm { id: u64 },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_token_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tasks"))
        .unwrap_or_default()
        .join("tokens.json")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let token_file = args.token_file.unwrap_or_else(default_token_file);
    let config = match args.api_url.as_deref() {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    };
    tracing::debug!(
        api_url = %config.base_url(),
        token_file = %token_file.display(),
        "configuration loaded"
    );

    let tokens = Arc::new(FileTokenStore::open(&token_file)?);
    let api = Arc::new(ApiClient::with_reqwest(config, tokens));
    api.on_session_expired(|| {
        eprintln!("Your session has expired. Run `tasks login` to sign in again.");
    });

    let session = Session::start(api).await;
    commands::run(&session, args.command).await
}
