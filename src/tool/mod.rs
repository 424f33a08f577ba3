// External tool execution with real and mock implementations.

use std::collections::VecDeque;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for running an external command to completion.
///
/// Implementations block the calling thread. An `Err` means the process
/// could not be started or waited on at all.
pub trait ToolRunner: Send + Sync {
    fn run(&self, argv: &[String]) -> anyhow::Result<ToolOutput>;
}

// --- Real implementation using std::process ---

pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, argv: &[String]) -> anyhow::Result<ToolOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Empty command"))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to execute '{}': {}", program, e))?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// --- Mock implementation for testing ---

/// Scripted outcome of one mocked invocation.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    LaunchError(String),
}

impl MockOutcome {
    pub fn ok() -> Self {
        Self::Exit {
            code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stdout: &str, stderr: &str) -> Self {
        Self::Exit {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub fn launch_error(msg: &str) -> Self {
        Self::LaunchError(msg.to_string())
    }
}

/// Mock runner that replays scripted outcomes in order and records every argv.
///
/// Once the script is exhausted every further call succeeds with empty output.
#[derive(Clone, Default)]
pub struct MockToolRunner {
    outcomes: Arc<Mutex<VecDeque<MockOutcome>>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    delay: Duration,
}

impl MockToolRunner {
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long inside every call, simulating a slow tool.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ToolRunner for MockToolRunner {
    fn run(&self, argv: &[String]) -> anyhow::Result<ToolOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MockOutcome::ok);

        match outcome {
            MockOutcome::Exit {
                code,
                stdout,
                stderr,
            } => Ok(ToolOutput {
                exit_code: Some(code),
                stdout,
                stderr,
            }),
            MockOutcome::LaunchError(msg) => Err(anyhow::anyhow!(msg)),
        }
    }
}
