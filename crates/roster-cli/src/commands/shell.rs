//! Interactive shell
//!
//! A single-screen loop: commands are read from stdin while session and
//! collection notices are printed as they arrive.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use roster_core::{CollectionWatcher, Credentials, Notice, Operation, Person, SubscriptionError};

use crate::app::App;
use crate::output::{Output, OutputFormat};

const HELP: &str = "\
Commands:
  login <email> <password>   sign in
  logout                     sign out
  save <name> <age>          create or replace a person
  load                       list everyone
  delete <name>              remove a person
  help                       show this help
  quit                       leave the shell";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Login { email: String, password: String },
    Logout,
    Save { name: String, age: String },
    Load,
    Delete { name: String },
    Help,
    Quit,
    Empty,
}

impl ShellCommand {
    /// Parse one input line
    ///
    /// For `save`, the last word is the age and everything before it the
    /// name. Missing fields are passed through empty so the store reports
    /// them.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(ShellCommand::Empty);
        };
        let args: Vec<&str> = words.collect();

        match command {
            "login" => match args.as_slice() {
                [email, password] => Ok(ShellCommand::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                }),
                _ => Err("usage: login <email> <password>".to_string()),
            },
            "logout" => Ok(ShellCommand::Logout),
            "save" => {
                let (name, age) = match args.split_last() {
                    Some((age, name)) if !name.is_empty() => (name.join(" "), age.to_string()),
                    Some((name, _)) => (name.to_string(), String::new()),
                    None => (String::new(), String::new()),
                };
                Ok(ShellCommand::Save { name, age })
            }
            "load" | "list" => Ok(ShellCommand::Load),
            "delete" | "rm" => Ok(ShellCommand::Delete {
                name: args.join(" "),
            }),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" => Ok(ShellCommand::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

/// Run the shell until `quit` or end of input
pub async fn run(app: &App, output: &Output) -> Result<()> {
    if app.sync_configured() {
        app.backend.start_live_sync().await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = app.session.subscribe();
    let mut session_open = true;
    let mut collection = Some(app.people.on_collection_changed().await?);

    output.message("Roster shell. Type 'help' for commands.");
    prompt(output);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ShellCommand::parse(&line) {
                    Ok(ShellCommand::Quit) => break,
                    Ok(command) => execute(app, command, output).await,
                    Err(usage) => eprintln!("{}", usage),
                }
                prompt(output);
            }
            state = session.next(), if session_open => match state {
                Some(state) => output.notice(&Notice::from_session(&state)),
                None => session_open = false,
            },
            update = next_snapshot(&mut collection), if collection.is_some() => match update {
                Some(Ok(people)) => output.notice(&Notice::CollectionChanged(people)),
                Some(Err(e)) => {
                    output.notice(&Notice::failed(Operation::Watch, e));
                    collection = None;
                }
                None => collection = None,
            },
        }
    }

    app.backend.stop_live_sync().await;
    Ok(())
}

async fn execute(app: &App, command: ShellCommand, output: &Output) {
    match command {
        ShellCommand::Login { email, password } => {
            // Success is reported by the session watcher
            if let Err(e) = app.session.login(&Credentials::new(email, password)).await {
                output.notice(&Notice::failed(Operation::SignIn, e));
            }
        }
        ShellCommand::Logout => app.session.logout().await,
        ShellCommand::Save { name, age } => {
            output.notice(&Notice::from_save(app.people.save_input(&name, &age).await));
        }
        ShellCommand::Load => {
            let notice = Notice::from_load(app.people.load_all().await);
            output.notice(&notice);
            if let (OutputFormat::Human, Some(people)) = (output.format, notice.people()) {
                print_table(people);
            }
        }
        ShellCommand::Delete { name } => {
            output.notice(&Notice::from_delete(app.people.delete(&name).await));
        }
        ShellCommand::Help => output.message(HELP),
        ShellCommand::Quit | ShellCommand::Empty => {}
    }
}

async fn next_snapshot(
    watcher: &mut Option<CollectionWatcher>,
) -> Option<Result<Vec<Person>, SubscriptionError>> {
    watcher.as_mut()?.next().await
}

fn print_table(people: &[Person]) {
    for person in people {
        println!("  {}", person);
    }
}

fn prompt(output: &Output) {
    if output.format == OutputFormat::Human {
        print!("> ");
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save(name: &str, age: &str) -> ShellCommand {
        ShellCommand::Save {
            name: name.to_string(),
            age: age.to_string(),
        }
    }

    #[test]
    fn test_parse_save() {
        assert_eq!(ShellCommand::parse("save Leo 30"), Ok(save("Leo", "30")));
        assert_eq!(
            ShellCommand::parse("save Ana Maria 41"),
            Ok(save("Ana Maria", "41"))
        );
        assert_eq!(ShellCommand::parse("save Leo"), Ok(save("Leo", "")));
        assert_eq!(ShellCommand::parse("save"), Ok(save("", "")));
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            ShellCommand::parse("login ana@example.com hunter2"),
            Ok(ShellCommand::Login {
                email: "ana@example.com".to_string(),
                password: "hunter2".to_string(),
            })
        );
        assert!(ShellCommand::parse("login ana@example.com").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ShellCommand::parse("  "), Ok(ShellCommand::Empty));
        assert_eq!(ShellCommand::parse("load"), Ok(ShellCommand::Load));
        assert_eq!(ShellCommand::parse("logout"), Ok(ShellCommand::Logout));
        assert_eq!(ShellCommand::parse("exit"), Ok(ShellCommand::Quit));
        assert_eq!(
            ShellCommand::parse("delete Unknown"),
            Ok(ShellCommand::Delete {
                name: "Unknown".to_string()
            })
        );
        assert!(ShellCommand::parse("dance").is_err());
    }

    #[tokio::test]
    async fn test_execute_against_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                "data_dir = {:?}\n",
                dir.path().join("data").to_string_lossy()
            ),
        )
        .unwrap();
        let app = App::open(&config_path).unwrap();
        let output = Output::new(OutputFormat::Quiet);

        execute(&app, save("Leo", "30"), &output).await;
        execute(&app, save("Leo", "31"), &output).await;
        execute(&app, save("Max", "abc"), &output).await;
        execute(
            &app,
            ShellCommand::Delete {
                name: "Unknown".to_string(),
            },
            &output,
        )
        .await;

        assert_eq!(
            app.people.load_all().await.unwrap(),
            vec![Person::new("Leo", 31.0)]
        );
    }
}
