//! Run command
//!
//! Runs an external command as a retry task: a non-zero exit status (or a
//! failure to spawn) is a failed attempt. On success the command's captured
//! stdout is written to our stdout; on exhaustion the first attempt's stderr is
//! replayed and the command fails with the first error.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use tracing::{debug, info};
use wheelretry_core::config::ConfigLoader;
use wheelretry_core::retry::{RetryError, RetryTask, Retryable};
use wheelretry_core::scheduler::HashedWheelTimer;

use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let mut config = ConfigLoader::new()?.load(config_path)?;
    args.apply_to(&mut config);
    config.validate().context("Invalid retry configuration")?;

    let attempt = CommandAttempt::from_argv(&args.command)?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| attempt.program.clone());

    let timer = Arc::new(HashedWheelTimer::with_config(&config.scheduler)?);
    debug!(
        task = %name,
        tick_ms = config.scheduler.tick_duration_ms,
        max_attempts = config.retry.max_attempts,
        "starting retry task"
    );

    let result = RetryTask::new(name.clone(), attempt, timer)
        .with_config(config.retry.clone())
        .execute_async()
        .await;

    match result {
        Ok(output) => {
            info!(task = %name, attempt = output.attempt, "command succeeded");
            std::io::stdout().write_all(&output.stdout)?;
            Ok(())
        }
        Err(RetryError::Failed { attempts, source }) => {
            if let CommandFailure::Exit { stderr, .. } = &source {
                std::io::stderr().write_all(stderr)?;
            }
            bail!(
                "{} failed after {} attempts, first error: {}",
                name,
                attempts,
                source
            )
        }
        Err(e) => Err(e.into()),
    }
}

/// Output of a successful attempt
#[derive(Debug)]
pub struct CommandOutput {
    pub attempt: u32,
    pub stdout: Vec<u8>,
}

/// Why an attempt failed
#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}", exit_description(.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: Vec<u8>,
    },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// One external command, run once per attempt
#[derive(Debug)]
pub struct CommandAttempt {
    program: String,
    args: Vec<String>,
    attempts: u32,
}

impl CommandAttempt {
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("No command given");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            attempts: 0,
        })
    }
}

impl Retryable for CommandAttempt {
    type Output = CommandOutput;
    type Error = CommandFailure;

    fn attempt(&mut self) -> std::result::Result<CommandOutput, CommandFailure> {
        self.attempts += 1;
        let output = duct::cmd(self.program.as_str(), &self.args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|source| CommandFailure::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(CommandOutput {
                attempt: self.attempts,
                stdout: output.stdout,
            })
        } else {
            Err(CommandFailure::Exit {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: output.stderr,
            })
        }
    }
}
