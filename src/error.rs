//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O errors and provides semantic variants for path
//! validation, notebook parsing, cell execution failures, and kernel faults.
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path does not exist: {}", .path.display())]
    InvalidPath { path: PathBuf },

    #[error("Failed to parse notebook {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error(transparent)]
    CellExecution(#[from] CellExecutionError),

    #[error("Cell {cell_index} timed out after {}s waiting for the kernel", .timeout.as_secs())]
    CellTimeout { cell_index: usize, timeout: Duration },

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl Error {
    /// Errors raised while the notebook was executing, after it was loaded.
    /// These are the failures for which a partially executed notebook exists.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Error::CellExecution(_)
                | Error::CellTimeout { .. }
                | Error::Kernel(KernelError::DeadKernel | KernelError::Protocol(_) | KernelError::Transport(_))
        )
    }

    pub fn parse<E: fmt::Display>(path: impl Into<PathBuf>, e: E) -> Self {
        Error::Parse {
            path: path.into(),
            reason: e.to_string(),
        }
    }
}

/// A code cell replied with an error while errors were not allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellExecutionError {
    pub cell_index: usize,
    pub source: String,
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl fmt::Display for CellExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "An error occurred while executing the following cell:")?;
        writeln!(f, "------------------")?;
        writeln!(f, "{}", self.source.trim_end())?;
        writeln!(f, "------------------")?;
        writeln!(f)?;
        for line in &self.traceback {
            writeln!(f, "{}", line)?;
        }
        write!(f, "{}: {}", self.ename, self.evalue)
    }
}

impl std::error::Error for CellExecutionError {}

/// Failures of the kernel process or of the messaging channel to it.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("No such kernel named {0}")]
    NoSuchKernel(String),

    #[error("Failed to launch kernel {name}: {reason}")]
    Launch { name: String, reason: String },

    #[error("Kernel didn't respond in {}s", .0.as_secs())]
    StartupTimeout(Duration),

    #[error("Kernel died")]
    DeadKernel,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl KernelError {
    pub fn transport<E: fmt::Display>(e: E) -> Self {
        KernelError::Transport(e.to_string())
    }

    pub fn protocol<E: fmt::Display>(e: E) -> Self {
        KernelError::Protocol(e.to_string())
    }
}
