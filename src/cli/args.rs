use clap::Parser;
use std::path::PathBuf;

use nbrun::OutputMode;
use nbrun::core::params::{DEFAULT_KERNEL_NAME, DEFAULT_TIMEOUT};

use super::errors::AppError;

/// Executes Jupyter Notebooks from the command line.
///
/// Expects one or more file paths as arguments. Each notebook is executed in
/// its own directory and written to `<name>-output.ipynb` next to it. Errors
/// are printed to the console and the command exits non-zero.
///
/// Example:
///
///     $ nbrun ./src/notebooks.ipynb
#[derive(Parser, Debug)]
#[command(name = "nbrun", version, verbatim_doc_comment)]
pub struct CliArgs {
    /// Notebook files to execute, in order
    #[arg(value_name = "NOTEBOOK_PATHS", value_parser = existing_path)]
    pub notebook_paths: Vec<PathBuf>,

    /// Per-cell timeout in seconds (0 disables the timeout)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Kernel to execute the notebooks with
    #[arg(long, default_value = DEFAULT_KERNEL_NAME)]
    pub kernel: String,

    /// Where to write executed notebooks (suffixed or in-place)
    #[arg(long, value_enum, default_value_t = nbrun::OutputMode::Suffixed)]
    pub output_mode: OutputMode,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}

/// Reject paths that do not exist before any notebook is touched.
fn existing_path(value: &str) -> Result<PathBuf, AppError> {
    if value.is_empty() {
        return Err(AppError::EmptyPath);
    }
    let path = PathBuf::from(value);
    if !path.exists() {
        return Err(AppError::PathNotFound {
            path: value.to_string(),
        });
    }
    Ok(path)
}
