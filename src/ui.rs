use colored::Colorize;
use declarative::{ApplyResult, ErrorCategory, ProgressCallback};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.len()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a line diff between two versions of a file
pub fn diff(label: &str, old: &str, new: &str) {
    println!("  {} {}", "~".yellow(), label.bold());
    let diff = similar::TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                print!("    {}", format!("- {change}").red());
            }
            similar::ChangeTag::Insert => {
                print!("    {}", format!("+ {change}").green());
            }
            similar::ChangeTag::Equal => {}
        }
        if change.missing_newline() {
            println!();
        }
    }
}

/// Category of the convergence error behind a failure, if there is one
pub fn failure_category(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<declarative::Error>())
        .map(declarative::Error::category)
}

/// Print a fatal error followed by advice for its category
pub fn fatal(err: &anyhow::Error) {
    error(&format!("{err:#}"));
    if let Some(category) = failure_category(err) {
        eprintln!("  {} {}", format!("{category}:").yellow(), category.advice());
    }
}

/// Step-by-step console output for a converge run
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    step: usize,
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self { step: 0, quiet }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_step_start(&mut self, _id: &str, description: &str) {
        self.step += 1;
        if !self.quiet {
            println!("{} {}", format!("[{:>2}]", self.step).blue().bold(), description);
        }
    }

    fn on_step_complete(&mut self, id: &str, result: &ApplyResult) {
        if self.quiet {
            return;
        }
        let label = match result {
            ApplyResult::NoChange => result.label().dimmed(),
            ApplyResult::Skipped { reason } => format!("skipped ({})", reason).yellow(),
            _ => result.label().green(),
        };
        println!("     {} {}", id.dimmed(), label);
    }
}
