//! noemoji CLI
//!
//! Usage:
//!   noemoji login alice
//!   noemoji emoji submit 3
//!   NOEMOJI_WS_URL=ws://backend:8765 noemoji whoami
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::{json, Value};
use tracing::{error, warn};

use noemoji::config::{Command, EmojiCommand};
use noemoji::services::ProfileChanges;
use noemoji::types::Profile;
use noemoji::{logging, Args, Client, CredentialRotation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_json)?;

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(2);
    }

    let client = Client::from_args(&args);

    match run(&client, args.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(client: &Client, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Register {
            uid,
            name,
            tel,
            email,
            password,
        } => {
            let secret = read_secret(password, "Password")?;
            let profile = Profile {
                uid: uid.clone(),
                name,
                tel,
                email,
            };
            client.accounts.register(profile, &secret).await?;
            Ok(json!({ "registered": uid }))
        }

        Command::Login { uid, password } => {
            let secret = read_secret(password, "Password")?;
            let session = client.accounts.login(&uid, &secret).await?;
            Ok(json!({ "uid": session.uid }))
        }

        Command::Logout => {
            let outcome = client.accounts.logout().await;
            for failure in outcome.failures() {
                warn!("Token revocation failed: {}", failure);
            }
            Ok(json!({ "logged_out": true, "revoked": outcome.is_clean() }))
        }

        Command::Whoami => Ok(serde_json::to_value(client.accounts.current_user().await?)?),

        Command::Users => Ok(serde_json::to_value(client.accounts.all_users().await?)?),

        Command::Profile { name, tel, email } => {
            let changes = ProfileChanges { name, tel, email };
            let changed = !changes.is_empty();
            let updated = client.accounts.update_profile(changes).await?;
            Ok(json!({ "profile": updated, "logged_out": changed }))
        }

        Command::Passwd { password } => {
            let secret = read_secret(password, "New password")?;
            let revoked = match client.accounts.change_password(&secret).await? {
                CredentialRotation::Rotated => true,
                CredentialRotation::RevokeFailed(e) => {
                    warn!("Password changed but the old token was not revoked: {}", e);
                    false
                }
            };
            Ok(json!({ "changed": true, "revoked": revoked }))
        }

        Command::Emoji(EmojiCommand::Submit { id }) => {
            client.emoji.submit(id).await?;
            Ok(json!({ "submitted": id }))
        }

        Command::Emoji(EmojiCommand::History { all }) => {
            let records = if all {
                client.emoji.global_history().await?
            } else {
                client.emoji.history().await?
            };
            Ok(serde_json::to_value(records)?)
        }
    }
}

/// Use the supplied secret, or read one line from stdin.
fn read_secret(supplied: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(secret) = supplied {
        return Ok(secret);
    }

    eprint!("{prompt}: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        bail!("password is required");
    }
    Ok(secret)
}
