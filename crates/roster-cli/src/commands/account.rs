//! Account command handlers

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use roster_core::auth::hash_password;
use roster_core::models::normalize_email;
use roster_core::Config;

use crate::output::{Output, OutputFormat};

/// Register a local account, or replace its password
///
/// The password is taken from `--password` or, failing that, the first line
/// of stdin.
pub fn add(
    config_path: &Path,
    email: &str,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let email = normalize_email(email);
    if email.is_empty() {
        bail!("Email must not be empty");
    }

    let password = match password {
        Some(password) => password,
        None => read_password(output)?,
    };
    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let mut config = Config::load_from_path(config_path).context("Failed to load configuration")?;
    let hash = hash_password(&password).context("Failed to hash password")?;
    config.upsert_account(&email, hash);
    config
        .save_to_path(config_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Account {} saved", email));
    Ok(())
}

/// List registered accounts
pub fn list(config_path: &Path, output: &Output) -> Result<()> {
    let config = Config::load_from_path(config_path).context("Failed to load configuration")?;
    let emails: Vec<&str> = config.accounts.iter().map(|a| a.email.as_str()).collect();

    match output.format {
        OutputFormat::Json => println!("{}", serde_json::json!(emails)),
        OutputFormat::Quiet => {
            for email in &emails {
                println!("{}", email);
            }
        }
        OutputFormat::Human => {
            if emails.is_empty() {
                println!("No accounts. Add one with: roster account add <email>");
                return Ok(());
            }
            for email in &emails {
                println!("{}", email);
            }
        }
    }
    Ok(())
}

fn read_password(output: &Output) -> Result<String> {
    if output.format == OutputFormat::Human {
        eprint!("Password: ");
        io::stderr().flush()?;
    }

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
