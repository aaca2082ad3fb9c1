//! # Bulk Processor
//!
//! Runs one command against every account a bulk resolution produces.
//!
//! The run is split in three phases. Resolution and the confirmation gate
//! happen on the calling thread, and nothing external is touched before the
//! operator types the confirmation literal. Then a fixed pool of
//! [`WORKER_COUNT`] workers pulls traversal jobs from a channel, runs the
//! command with each job's credentials and pushes the result back. The caller
//! drains exactly one result per job.
//!
//! A failing job is recorded in its own [`ExecResult`]; it never aborts its
//! siblings.

use crate::{
    constants::{CONFIRMATION_TEXT, WORKER_COUNT},
    core::{
        grapher::{GraphError, Grapher},
        path::{Path, TraverseOptions},
    },
    models::ExecResult,
    system::executor::CommandRunner,
};
use crossbeam_channel::unbounded;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Confirmation declined; no account was touched.")]
    Declined,
    #[error("Could not read confirmation: {0}")]
    Confirmation(#[from] io::Error),
    #[error("No command specified to run.")]
    EmptyCommand,
}

/// What to run and where.
#[derive(Debug, Clone, Default)]
pub struct BulkRequest {
    /// Tag filters (or a single direct account id) selecting the targets.
    pub args: Vec<String>,
    pub role_names: Vec<String>,
    pub profile_names: Vec<String>,
    /// Program and arguments, already split.
    pub command: Vec<String>,
    /// Skip the typed confirmation.
    pub skip_confirm: bool,
    /// Reuse the first account's role and profile choice for the rest.
    pub pin_selection: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct Processor {
    grapher: Grapher,
    options: TraverseOptions,
    runner: Arc<dyn CommandRunner>,
}

impl Processor {
    pub fn new(grapher: Grapher, options: TraverseOptions, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            grapher,
            options,
            runner,
        }
    }

    /// Runs the request, confirming on stdin/stderr.
    pub fn exec(&self, request: &BulkRequest) -> Result<BTreeMap<String, ExecResult>, ProcessorError> {
        let stdin = io::stdin();
        self.exec_with_io(request, &mut stdin.lock(), &mut io::stderr())
    }

    /// Runs the request, reading the confirmation from `input` and writing the
    /// target listing to `output`. Results are keyed by account id.
    pub fn exec_with_io<R: BufRead, W: Write>(
        &self,
        request: &BulkRequest,
        input: &mut R,
        output: &mut W,
    ) -> Result<BTreeMap<String, ExecResult>, ProcessorError> {
        if request.command.is_empty() {
            return Err(ProcessorError::EmptyCommand);
        }

        // 1. Resolve every target. Failures here happen before anything is touched.
        let paths = if request.pin_selection {
            self.grapher.resolve_all_pinned(
                &request.args,
                &request.role_names,
                &request.profile_names,
            )?
        } else {
            self.grapher
                .resolve_all(&request.args, &request.role_names, &request.profile_names)?
        };

        // 2. Gate on the typed confirmation.
        if !request.skip_confirm {
            confirm(&paths, input, output)?;
        }

        // 3. Fan out.
        Ok(self.run_pool(paths, &request.command, request.show_progress))
    }

    fn run_job(&self, path: &Path, command: &[String]) -> ExecResult {
        match path.traverse(&self.options) {
            Ok(credentials) => self.runner.run(command, &credentials),
            Err(e) => {
                log::warn!("Traversal of {} failed: {}", path, e);
                ExecResult::failed(e)
            }
        }
    }

    fn run_pool(
        &self,
        paths: Vec<Path>,
        command: &[String],
        show_progress: bool,
    ) -> BTreeMap<String, ExecResult> {
        let total = paths.len();
        let progress = progress_bar(total as u64, show_progress);
        let (job_tx, job_rx) = unbounded::<Path>();
        let (result_tx, result_rx) = unbounded::<(String, ExecResult)>();

        // 1. Queue every job up front; workers stop when the queue drains.
        for path in paths {
            // Receivers outlive this loop, so sending cannot fail.
            let _ = job_tx.send(path);
        }
        drop(job_tx);

        let mut results = BTreeMap::new();
        thread::scope(|scope| {
            // 2. Start the fixed pool.
            for worker in 0..WORKER_COUNT {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for path in job_rx.iter() {
                        let key = path
                            .target_account()
                            .map(|a| a.id.clone())
                            .unwrap_or_else(|| path.to_string());
                        log::debug!("Worker {} running {}", worker, key);
                        let result = self.run_job(&path, command);
                        if result_tx.send((key, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            // 3. Drain exactly one result per job.
            for (key, result) in result_rx.iter().take(total) {
                progress.set_message(key.clone());
                progress.inc(1);
                results.insert(key, result);
            }
        });

        progress.finish_and_clear();
        results
    }
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Lists the targets and requires the exact confirmation literal.
pub fn confirm<R: BufRead, W: Write>(
    paths: &[Path],
    input: &mut R,
    output: &mut W,
) -> Result<(), ProcessorError> {
    writeln!(output, "The following accounts are targeted:")?;
    for path in paths {
        match path.target_account() {
            Some(account) if account.tags.iter().next().is_some() => {
                writeln!(output, "  {} ({})", account.id, account.tags)?;
            }
            Some(account) => writeln!(output, "  {}", account.id)?,
            None => writeln!(output, "  {}", path)?,
        }
    }
    write!(output, "Type '{}' to continue: ", CONFIRMATION_TEXT)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 || line.trim_end_matches(['\r', '\n']) != CONFIRMATION_TEXT {
        log::info!("Bulk run not confirmed");
        return Err(ProcessorError::Declined);
    }
    Ok(())
}
