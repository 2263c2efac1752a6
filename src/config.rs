//! Configuration for noemoji
//!
//! CLI arguments and environment variable handling using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::transport::WsTransportConfig;

/// noemoji - command-line client for the noemoji operation backend
#[derive(Parser, Debug, Clone)]
#[command(name = "noemoji")]
#[command(about = "Log in, submit emoji, and manage your noemoji account")]
pub struct Args {
    /// Backend WebSocket endpoint
    #[arg(long, env = "NOEMOJI_WS_URL", default_value = "ws://localhost:8765")]
    pub ws_url: String,

    /// Deadline for one backend round trip, in milliseconds
    #[arg(long, env = "NOEMOJI_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,

    /// Where the (uid, token) pair is kept between invocations
    /// (default: ~/.noemoji/session.json)
    #[arg(long, env = "NOEMOJI_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a new account
    Register {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        tel: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Password (read from stdin when omitted)
        #[arg(long, env = "NOEMOJI_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log in and store the session
    Login {
        uid: String,
        /// Password (read from stdin when omitted)
        #[arg(long, env = "NOEMOJI_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Revoke the session and forget it locally
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List all users (administrators only)
    Users,

    /// Edit the logged-in user's profile; an empty value clears tel/email
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tel: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Change password (ends the current session)
    Passwd {
        /// New password (read from stdin when omitted)
        #[arg(long, env = "NOEMOJI_NEW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Emoji submissions
    #[command(subcommand)]
    Emoji(EmojiCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum EmojiCommand {
    /// Submit an emoji by id
    Submit { id: i64 },

    /// Show submission history, newest first
    History {
        /// Everyone's submissions (administrators only)
        #[arg(long)]
        all: bool,
    },
}

impl Args {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn transport_config(&self) -> WsTransportConfig {
        WsTransportConfig {
            url: self.ws_url.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Effective session file (falls back to the home directory, then the working directory)
    pub fn session_path(&self) -> PathBuf {
        self.session_file.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".noemoji").join("session.json"))
                .unwrap_or_else(|| PathBuf::from(".noemoji-session.json"))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.ws_url)
            .map_err(|e| format!("NOEMOJI_WS_URL is not a valid URL: {e}"))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(format!(
                "NOEMOJI_WS_URL must use ws:// or wss://, got {}://",
                url.scheme()
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err("NOEMOJI_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }
}
