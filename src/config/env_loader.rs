use crate::config::model::Credentials;
use std::env;
use std::io::{self, BufRead, IsTerminal, Write};
use thiserror::Error;

const USER_VAR: &str = "UNF_USER";
const PASS_VAR: &str = "UNF_PASS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing UNF_USER/UNF_PASS in environment for a non-interactive run")]
    MissingCredentials,
    #[error("could not read credentials from the terminal")]
    Prompt(#[from] io::Error),
}

/// Resolves portal credentials before anything else runs. Non-interactive
/// runs (CI, or stdin is not a terminal) must carry both environment
/// variables; interactive runs are prompted for whatever is missing.
pub fn resolve_credentials() -> Result<Credentials, ConfigError> {
    let username = non_empty_var(USER_VAR);
    let password = non_empty_var(PASS_VAR);

    if !interactive() {
        return match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials { username, password }),
            _ => Err(ConfigError::MissingCredentials),
        };
    }

    let username = match username {
        Some(value) => value,
        None => prompt("Username: ")?,
    };
    let password = match password {
        Some(value) => value,
        None => prompt("Password: ")?,
    };
    Ok(Credentials { username, password })
}

fn interactive() -> bool {
    let in_ci = env::var("GITHUB_ACTIONS")
        .map(|value| value == "true")
        .unwrap_or(false);
    !in_ci && io::stdin().is_terminal()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn prompt(label: &str) -> Result<String, ConfigError> {
    print!("{label}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
