use std::sync::Arc;

use chrono::Local;

use crate::daemon::events::Stage;
use crate::storage::CommandLog;
use crate::tool::{ToolOutput, ToolRunner};

/// Result of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub success: bool,
    /// Empty on success.
    pub diagnostic: String,
}

impl Invocation {
    fn ok() -> Self {
        Self {
            success: true,
            diagnostic: String::new(),
        }
    }

    fn failed(diagnostic: String) -> Self {
        Self {
            success: false,
            diagnostic,
        }
    }
}

/// Runs external commands on the blocking pool and records each one in the
/// command log.
pub struct ToolInvoker {
    runner: Arc<dyn ToolRunner>,
    log: Arc<dyn CommandLog>,
}

impl ToolInvoker {
    pub fn new(runner: Arc<dyn ToolRunner>, log: Arc<dyn CommandLog>) -> Self {
        Self { runner, log }
    }

    /// Run `argv` to completion. Never fails: every problem is folded into
    /// the returned diagnostic.
    pub async fn invoke(&self, stage: Stage, argv: Vec<String>) -> Invocation {
        let command_line = argv.join(" ");
        let label = stage.failure_label();

        let result = if argv.is_empty() {
            Err("Empty command".to_string())
        } else {
            let runner = Arc::clone(&self.runner);
            match tokio::task::spawn_blocking(move || runner.run(&argv)).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("Task join error: {}", e)),
            }
        };

        let (invocation, entry) = match result {
            Ok(output) if output.success() => {
                let body = format!("{}{}", output.stdout, output.stderr);
                (
                    Invocation::ok(),
                    format_entry("Command:", &command_line, &body, "--- End Command ---"),
                )
            }
            Ok(output) => {
                let diagnostic = exit_diagnostic(label, &command_line, &output);
                let entry = format_entry(
                    "ERROR in Command:",
                    &command_line,
                    &diagnostic,
                    "--- End Error ---",
                );
                (Invocation::failed(diagnostic), entry)
            }
            Err(e) => {
                let diagnostic = format!("{}: could not run '{}': {}", label, command_line, e);
                let entry = format_entry(
                    "Unexpected ERROR:",
                    &command_line,
                    &diagnostic,
                    "--- End Error ---",
                );
                (Invocation::failed(diagnostic), entry)
            }
        };

        if let Err(e) = self.log.append_entry(&entry).await {
            tracing::error!("Failed to write command log entry: {:#}", e);
        }

        invocation
    }
}

fn exit_diagnostic(label: &str, command_line: &str, output: &ToolOutput) -> String {
    let code = match output.exit_code {
        Some(c) => c.to_string(),
        None => "none (terminated by signal)".to_string(),
    };
    format!(
        "{}: Command '{}' failed with code {}.\nStdout: {}\nStderr: {}",
        label, command_line, code, output.stdout, output.stderr
    )
}

fn format_entry(header: &str, command_line: &str, body: &str, footer: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let mut entry = format!("\n--- {} --- {} {} ---\n{}", timestamp, header, command_line, body);
    if !entry.ends_with('\n') {
        entry.push('\n');
    }
    entry.push_str(footer);
    entry.push('\n');
    entry
}
