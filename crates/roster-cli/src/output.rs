//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use roster_core::{Notice, Person, ViewDelta};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single person
    pub fn print_person(&self, person: &Person) {
        match self.format {
            OutputFormat::Human => {
                println!("Name: {}", person.name);
                println!("Age:  {}", age_or_dash(person));
            }
            OutputFormat::Json => println!("{}", to_json(person)),
            OutputFormat::Quiet => println!("{}", person.name),
        }
    }

    /// Print the people collection
    pub fn print_people(&self, people: &[Person]) {
        match self.format {
            OutputFormat::Human => {
                if people.is_empty() {
                    println!("No people found.");
                    return;
                }
                let width = people
                    .iter()
                    .map(|p| p.name.chars().count())
                    .max()
                    .unwrap_or(0)
                    .min(40);
                for person in people {
                    println!(
                        "{:<width$} | {}",
                        truncate(&person.name, 40),
                        age_or_dash(person),
                        width = width
                    );
                }
                println!("\n{}", count_label(people.len()));
            }
            OutputFormat::Json => println!("{}", to_json(people)),
            OutputFormat::Quiet => {
                for person in people {
                    println!("{}", person.name);
                }
            }
        }
    }

    /// Print what changed between two snapshots
    pub fn print_delta(&self, delta: &ViewDelta, total: usize) {
        match self.format {
            OutputFormat::Human => {
                for person in &delta.added {
                    println!("+ {}", person);
                }
                for person in &delta.updated {
                    println!("~ {}", person);
                }
                for name in &delta.removed {
                    println!("- {}", name);
                }
                println!("({})", count_label(total));
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"delta": delta, "total": total})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an operation outcome
    ///
    /// Failures go to stderr, even in quiet mode.
    pub fn notice(&self, notice: &Notice) {
        if notice.is_failure() {
            match self.format {
                OutputFormat::Json => eprintln!(
                    "{}",
                    serde_json::json!({"status": "error", "message": notice.status()})
                ),
                _ => eprintln!("✗ {}", notice),
            }
            return;
        }

        match self.format {
            OutputFormat::Human => println!("• {}", notice),
            OutputFormat::Json => {
                let mut value = serde_json::json!({"status": "ok", "message": notice.status()});
                if let Some(people) = notice.people() {
                    value["people"] = serde_json::json!(people);
                }
                println!("{}", value);
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

fn age_or_dash(person: &Person) -> String {
    match person.age {
        Some(_) => person.age_display(),
        None => "-".to_string(),
    }
}

fn count_label(count: usize) -> String {
    match count {
        1 => "1 person".to_string(),
        n => format!("{} people", n),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
