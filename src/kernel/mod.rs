//! Jupyter kernel execution engine.
//!
//! `KernelExecutor` resolves a kernelspec, launches the kernel process with
//! a fresh connection file, talks to it over ZeroMQ using the Jupyter
//! messaging protocol, and runs the notebook through the shared cell loop.
//! Layout: `spec` (discovery), `connection` (ports and key), `message`
//! (wire format), `launcher` (process), `client` (sockets), `outputs`
//! (iopub -> notebook outputs) and `session` (blocking facade).
pub mod client;
pub mod connection;
pub mod launcher;
pub mod message;
pub mod outputs;
pub mod session;
pub mod spec;

pub use session::KernelSession;
pub use spec::{KernelSpec, find_kernel_spec};

use std::path::PathBuf;

use tracing::info;

use crate::core::executor::{Executor, run_cells};
use crate::core::params::ExecutionConfig;
use crate::error::Result;
use crate::notebook::Notebook;

/// Executes notebooks against a real Jupyter kernel, one kernel per notebook.
///
/// Execution blocks the calling thread on a private tokio runtime, so it must
/// not be called from async code; inside a runtime it fails with
/// `KernelError::Launch`. Use `tokio::task::spawn_blocking` there.
#[derive(Debug, Clone, Default)]
pub struct KernelExecutor {
    /// Overrides the standard kernelspec search path when set
    kernel_dirs: Option<Vec<PathBuf>>,
}

impl KernelExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernel_dirs(dirs: Vec<PathBuf>) -> Self {
        Self {
            kernel_dirs: Some(dirs),
        }
    }

    fn resolve(&self, name: &str) -> Result<KernelSpec> {
        match &self.kernel_dirs {
            Some(dirs) => spec::find_kernel_spec_in(name, dirs),
            None => find_kernel_spec(name),
        }
    }
}

impl Executor for KernelExecutor {
    fn execute(&self, notebook: &mut Notebook, config: &ExecutionConfig) -> Result<()> {
        let spec = self.resolve(&config.kernel_name)?;
        let mut session = KernelSession::start(&config.kernel_name, &spec, config)?;
        let summary = run_cells(notebook, config, &mut session)?;
        info!(
            "Executed {} cells ({} skipped, {} errors)",
            summary.executed, summary.skipped, summary.errors
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, KernelError};
    use crate::notebook::Cell;

    #[tokio::test]
    async fn refuses_to_block_inside_a_runtime() {
        let executor = KernelExecutor::with_kernel_dirs(vec![]);
        let mut notebook = Notebook::with_cells(vec![Cell::code("print(1)")]);

        let err = executor
            .execute(&mut notebook, &ExecutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::Kernel(KernelError::Launch { .. })));
        assert!(notebook.cells[0].as_code().unwrap().outputs.is_empty());
    }
}
