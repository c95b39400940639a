//! Roster CLI
//!
//! Command-line interface for Roster - live-synced people records.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use roster_core::Config;

mod app;
mod commands;
mod output;

use app::App;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Roster - live-synced people records")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Optional sign-in before a command runs
#[derive(Args, Clone)]
struct SignIn {
    /// Sign in as this account (password from ROSTER_PASSWORD)
    #[arg(long)]
    email: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a people document, or join another client's
    Init {
        /// Document ID or automerge: URL to join
        #[arg(long, value_name = "ID")]
        join: Option<String>,
    },
    /// Create or replace a person
    #[command(alias = "add")]
    Save {
        name: String,
        age: String,
        #[command(flatten)]
        sign_in: SignIn,
    },
    /// List everyone
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        sign_in: SignIn,
    },
    /// Show one person
    Get {
        name: String,
        #[command(flatten)]
        sign_in: SignIn,
    },
    /// Delete a person
    #[command(alias = "rm")]
    Delete {
        name: String,
        #[command(flatten)]
        sign_in: SignIn,
    },
    /// Print changes to the collection as they happen
    Watch,
    /// Interactive shell (default when no command is given)
    Shell,
    /// Manage local sign-in accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (document ID, sync, storage)
    Status,
    /// Sync with remote server
    Sync,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Add an account or replace its password
    Add {
        email: String,
        /// Password; read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// List accounts
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, sync_url, sync_enabled, email)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.unwrap_or_else(Config::config_file_path);
    let command = cli.command.unwrap_or(Commands::Shell);

    // Commands that only touch the config file
    match command {
        Commands::Config { command } => {
            return match command {
                Some(ConfigCommands::Show) | None => commands::config::show(&config_path, &output),
                Some(ConfigCommands::Set { key, value }) => {
                    commands::config::set(&key, &value, &config_path, &output)
                }
            };
        }
        Commands::Init { join } => {
            return commands::init::run(&config_path, join.as_deref(), &output);
        }
        Commands::Account { command } => {
            return match command {
                AccountCommands::Add { email, password } => {
                    commands::account::add(&config_path, &email, password, &output)
                }
                AccountCommands::List => commands::account::list(&config_path, &output),
            };
        }
        _ => {}
    }

    let app = App::open(&config_path)?;

    let is_write = matches!(command, Commands::Save { .. } | Commands::Delete { .. });
    let is_read = matches!(
        command,
        Commands::List { .. } | Commands::Get { .. } | Commands::Status
    );

    // Pull before reads so they see the latest data, and before writes to a
    // joined document that has not arrived yet
    if is_read || (is_write && app.backend.is_pending_sync().await) {
        app.auto_sync(&output).await;
    }

    let result = match command {
        Commands::Save {
            name,
            age,
            sign_in,
        } => {
            app.sign_in_from_env(sign_in.email.as_deref(), &output).await?;
            commands::person::save(&app, &name, &age, &output).await
        }
        Commands::List { sign_in } => {
            app.sign_in_from_env(sign_in.email.as_deref(), &output).await?;
            commands::person::list(&app, &output).await
        }
        Commands::Get { name, sign_in } => {
            app.sign_in_from_env(sign_in.email.as_deref(), &output).await?;
            commands::person::get(&app, &name, &output).await
        }
        Commands::Delete { name, sign_in } => {
            app.sign_in_from_env(sign_in.email.as_deref(), &output).await?;
            commands::person::delete(&app, &name, &output).await
        }
        Commands::Watch => commands::watch::watch(&app, &output).await,
        Commands::Shell => commands::shell::run(&app, &output).await,
        Commands::Status => commands::status::show(&app, &output).await,
        Commands::Sync => commands::sync::sync(&app, &output).await,
        Commands::Init { .. } | Commands::Config { .. } | Commands::Account { .. } => Ok(()),
    };

    // Push after writes
    if is_write && result.is_ok() {
        app.auto_sync(&output).await;
    }

    result
}

/// Log to stderr, filtered by RUST_LOG (default: warnings only)
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_save_with_email() {
        let cli = Cli::try_parse_from(["roster", "save", "Leo", "30", "--email", "ana@example.com"])
            .unwrap();
        match cli.command {
            Some(Commands::Save { name, age, sign_in }) => {
                assert_eq!(name, "Leo");
                assert_eq!(age, "30");
                assert_eq!(sign_in.email.as_deref(), Some("ana@example.com"));
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn test_parse_init_join() {
        let cli = Cli::try_parse_from(["roster", "init", "--join", "automerge:abc"]).unwrap();
        match cli.command {
            Some(Commands::Init { join }) => assert_eq!(join.as_deref(), Some("automerge:abc")),
            _ => panic!("expected init"),
        }

        let cli = Cli::try_parse_from(["roster", "init"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Init { join: None })));
    }

    #[test]
    fn test_no_command_defaults_to_shell() {
        let cli = Cli::try_parse_from(["roster", "--json"]).unwrap();
        assert!(cli.json);
        assert!(cli.command.is_none());
    }
}
