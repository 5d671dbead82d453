//! High-level, ergonomic library API: execute a notebook file (or several,
//! in order) and write the executed document next to it or in place.
//! Prefer these entrypoints over the lower-level `io`, `core` and `kernel`
//! modules when embedding nbrun.
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::core::executor::Executor;
use crate::core::params::ExecutionConfig;
use crate::core::paths::{output_path, working_dir};
use crate::error::{Error, Result};
use crate::io::{NotebookGuard, read_notebook};
use crate::types::OutputMode;

/// Paths involved in one successful notebook run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotebookRun {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Load `input`, execute it with `executor`, and write the result.
///
/// The executed (or partially executed) notebook is written whether or not
/// execution succeeds; an execution error is returned only after the write.
/// `base` supplies timeout, kernel and error policy; the working directory is
/// always the notebook's own directory.
pub fn execute_notebook<E: Executor + ?Sized>(
    input: &Path,
    mode: OutputMode,
    executor: &E,
    base: &ExecutionConfig,
) -> Result<NotebookRun> {
    if !input.exists() {
        return Err(Error::InvalidPath {
            path: input.to_path_buf(),
        });
    }
    let output = output_path(input, mode);

    let notebook = read_notebook(input)?;
    let config = base.for_working_dir(&working_dir(input)?);
    info!("Executing {:?} -> {:?} (kernel {})", input, output, config.kernel_name);

    let mut guard = NotebookGuard::new(notebook, &output);
    let outcome = executor.execute(&mut guard, &config);
    let written = guard.commit();

    match (outcome, written) {
        (Ok(()), Ok(())) => Ok(NotebookRun {
            input: input.to_path_buf(),
            output,
        }),
        (Ok(()), Err(write_err)) => Err(write_err),
        (Err(exec_err), Ok(())) => Err(exec_err),
        (Err(exec_err), Err(write_err)) => {
            error!("Failed to write {:?}: {}", output, write_err);
            Err(exec_err)
        }
    }
}

/// Execute notebooks strictly in the given order, stopping at the first
/// failure. The failing notebook is still written before its error is returned.
pub fn execute_notebooks<P, E>(
    inputs: &[P],
    mode: OutputMode,
    executor: &E,
    base: &ExecutionConfig,
) -> Result<Vec<NotebookRun>>
where
    P: AsRef<Path>,
    E: Executor + ?Sized,
{
    let mut runs = Vec::with_capacity(inputs.len());
    for input in inputs {
        runs.push(execute_notebook(input.as_ref(), mode, executor, base)?);
    }
    Ok(runs)
}
