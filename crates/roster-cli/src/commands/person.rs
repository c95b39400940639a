//! Person command handlers

use anyhow::{bail, Result};

use roster_core::Notice;

use crate::app::App;
use crate::output::Output;

/// Create or replace a person
pub async fn save(app: &App, name: &str, age: &str, output: &Output) -> Result<()> {
    let notice = Notice::from_save(app.people.save_input(name, age).await);
    finish(notice, output)
}

/// List everyone, ordered by name
pub async fn list(app: &App, output: &Output) -> Result<()> {
    let people = app.people.load_all().await?;
    output.print_people(&people);
    Ok(())
}

/// Show one person
pub async fn get(app: &App, name: &str, output: &Output) -> Result<()> {
    match app.people.get(name).await? {
        Some(person) => {
            output.print_person(&person);
            Ok(())
        }
        None => bail!("No person named '{}'", name),
    }
}

/// Remove a person; removing someone who isn't there still succeeds
pub async fn delete(app: &App, name: &str, output: &Output) -> Result<()> {
    let notice = Notice::from_delete(app.people.delete(name).await);
    finish(notice, output)
}

/// Print a successful notice, or turn a failed one into the command error
fn finish(notice: Notice, output: &Output) -> Result<()> {
    let status = notice.status();
    match notice {
        Notice::Failed { error, .. } => Err(anyhow::Error::new(error).context(status)),
        _ => {
            output.success(&status);
            Ok(())
        }
    }
}
