// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use tether::config::SessionConfig;
use tether::credential::persist::FileStorage;
use tether::error::SessionError;
use tether::session::{LoginRequest, Session};
use tether::transport::ApiRequest;

/// Keeps one tab's API session alive across calls and navigations.
#[derive(Parser)]
#[command(name = "tether", version, about)]
struct Cli {
    #[command(flatten)]
    config: SessionConfig,

    /// Log format (json or text).
    #[arg(long, env = "TETHER_LOG_FORMAT", default_value = "text", global = true)]
    log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TETHER_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session for this tab
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TETHER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session for this tab
    Logout,
    /// Print the session status as JSON
    Status,
    /// Call the API with the session's bearer token
    Call {
        /// HTTP method (GET, POST, ...)
        method: String,
        /// Path relative to the API URL
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Evaluate the route guard for a path
    Guard { path: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&cli.log_level, &cli.log_format);
    tether::ensure_crypto_provider();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: &str, format: &str) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let storage = Arc::new(FileStorage::new(&cli.config.state_dir(), &cli.config.tab_id));
    let session = Session::open(cli.config, storage)?;

    match cli.command {
        Command::Login { email, password } => {
            match session.login(&LoginRequest { email, password }).await {
                Ok(Some(id)) => println!("{}", serde_json::to_string_pretty(&*id)?),
                Ok(None) => println!("logged in"),
                Err(e) => return Ok(report(&e)),
            }
        }
        Command::Logout => {
            session.logout().await;
            println!("logged out");
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&session.status())?);
        }
        Command::Call { method, path, data } => {
            let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                request = request.with_body(serde_json::from_str(&data)?);
            }
            match session.client().send(request).await {
                Ok(resp) => {
                    println!("{}", resp.status);
                    println!("{}", resp.text());
                    if !resp.is_success() {
                        return Ok(1);
                    }
                }
                Err(e) => return Ok(report(&e)),
            }
        }
        Command::Guard { path } => {
            session.navigator().navigate(&path);
            let state = session.guard().evaluate(&path);
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(0)
}

/// Print a session error with its code; exit status 3 means log in again.
fn report(e: &SessionError) -> i32 {
    eprintln!("error [{}]: {e}", e.code());
    if e.requires_login() {
        eprintln!("run `tether login` to start a new session");
        3
    } else {
        1
    }
}
