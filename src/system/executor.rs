// src/system/executor.rs

use crate::{
    constants::CREDENTIAL_ENV_VARS,
    models::{Credentials, ExecResult},
};
use std::fmt;
use std::io::ErrorKind;
use std::process::{Command as StdCommand, Output, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' exited with code {code}: {stderr}")]
    NonZeroExitStatus {
        command: String,
        code: i32,
        stderr: String,
    },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Exit code and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Splits a command line into program and arguments using shell quoting rules.
pub fn split_command(command_line: &str) -> Result<Vec<String>, ExecutionError> {
    let trimmed = command_line.trim();
    let parts =
        shlex::split(trimmed).ok_or_else(|| ExecutionError::CommandParse(trimmed.to_string()))?;
    if parts.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    Ok(parts)
}

fn build_command(program: &str, args: &[String], env: &[(String, String)]) -> StdCommand {
    let mut command = StdCommand::new(program);
    command.args(args);
    // Ambient credentials of the calling process must never leak into the child.
    for var in CREDENTIAL_ENV_VARS {
        command.env_remove(var);
    }
    command
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn spawn_and_wait(
    argv: &[String],
    env: &[(String, String)],
    display: &str,
) -> Result<Output, ExecutionError> {
    let (program, args) = argv.split_first().ok_or(ExecutionError::EmptyCommand)?;

    match build_command(program, args, env).output() {
        Ok(output) => Ok(output),
        // Fallback for Windows built-ins like `echo`.
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            let mut cmd_args = vec!["/C".to_string()];
            cmd_args.extend(argv.iter().cloned());
            build_command("cmd", &cmd_args, env)
                .output()
                .map_err(|e| ExecutionError::CommandFailed(display.to_string(), e))
        }
        Err(e) => Err(ExecutionError::CommandFailed(display.to_string(), e)),
    }
}

/// Runs `argv` to completion with only the given credential environment,
/// capturing stdout and stderr. A non-zero exit is not an error here.
pub fn run_captured(
    argv: &[String],
    env: &[(String, String)],
) -> Result<CapturedOutput, ExecutionError> {
    let display = argv.join(" ");
    log::trace!("Spawning '{}'", display);
    let output = spawn_and_wait(argv, env, &display)?;

    let stdout =
        String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
            command: display.clone(),
            source: e,
        })?;
    let stderr =
        String::from_utf8(output.stderr).map_err(|e| ExecutionError::InvalidUtf8Output {
            command: display.clone(),
            source: e,
        })?;

    Ok(CapturedOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

/// Like [`run_captured`], but a non-zero exit becomes an error. Returns stdout.
pub fn run_checked(argv: &[String], env: &[(String, String)]) -> Result<String, ExecutionError> {
    let output = run_captured(argv, env)?;
    if output.exit_code != 0 {
        return Err(ExecutionError::NonZeroExitStatus {
            command: argv.join(" "),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Runs an operator command on behalf of one account.
pub trait CommandRunner: Send + Sync + fmt::Debug {
    fn run(&self, command: &[String], credentials: &Credentials) -> ExecResult;
}

/// Spawns real processes with the credentials exported as environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &[String], credentials: &Credentials) -> ExecResult {
        match run_captured(command, &credentials.to_env_vars()) {
            Ok(out) => ExecResult {
                exit_code: out.exit_code,
                stdout: out.stdout,
                stderr: out.stderr,
                error: None,
            },
            Err(e) => ExecResult::failed(e),
        }
    }
}
