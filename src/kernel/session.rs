use std::time::Duration;

use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use super::client::KernelClient;
use super::connection::ConnectionInfo;
use super::launcher::KernelProcess;
use super::spec::KernelSpec;
use crate::core::executor::{CellReply, CellRunner};
use crate::core::params::ExecutionConfig;
use crate::error::{Error, KernelError, Result};
use crate::notebook::CodeCell;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A launched kernel plus the runtime driving its sockets.
///
/// All calls block the current thread. The kernel is asked to shut down and
/// then killed if necessary when the session is dropped.
pub struct KernelSession {
    // taken on drop so the sockets close inside the runtime
    client: Option<KernelClient>,
    process: KernelProcess,
    kernel_info: Value,
    // dropped after the sockets and process that depend on it
    runtime: Runtime,
    // removed from disk on drop, after the kernel is gone
    _connection_file: NamedTempFile,
}

impl KernelSession {
    /// Launch `name` and wait until it is ready.
    ///
    /// Fails with `KernelError::Launch` when called from inside a tokio
    /// runtime, since the session blocks on its own runtime.
    pub fn start(name: &str, spec: &KernelSpec, config: &ExecutionConfig) -> Result<Self> {
        if Handle::try_current().is_ok() {
            return Err(KernelError::Launch {
                name: name.to_string(),
                reason: "cannot start a blocking kernel session inside an async runtime".into(),
            }
            .into());
        }
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let info = ConnectionInfo::allocate(name)?;
        let connection_file = info.write_file(None)?;

        let (process, client, kernel_info) = runtime.block_on(async {
            let mut process = KernelProcess::spawn(name, spec, connection_file.path(), config.working_dir.as_deref())?;
            let (client, kernel_info) =
                KernelClient::connect_when_ready(&info, &mut process, config.startup_timeout).await?;
            Ok::<_, Error>((process, client, kernel_info))
        })?;

        let language = kernel_info
            .pointer("/language_info/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown language");
        info!("Started kernel {} ({})", name, language);

        Ok(Self {
            client: Some(client),
            process,
            kernel_info,
            runtime,
            _connection_file: connection_file,
        })
    }
}

impl CellRunner for KernelSession {
    fn language_info(&self) -> Option<Value> {
        self.kernel_info.get("language_info").cloned()
    }

    fn run_cell(&mut self, cell_index: usize, cell: &mut CodeCell, timeout: Option<Duration>) -> Result<CellReply> {
        let client = self.client.as_mut().ok_or(KernelError::DeadKernel)?;
        let process = &mut self.process;
        self.runtime.block_on(client.execute(cell_index, cell, timeout, process))
    }
}

impl Drop for KernelSession {
    fn drop(&mut self) {
        debug!("Shutting down kernel {}", self.process.name());
        let Some(mut client) = self.client.take() else {
            return;
        };
        let process = &mut self.process;
        self.runtime.block_on(async move {
            client.shutdown().await;
            process.wait_or_kill(SHUTDOWN_GRACE).await;
            drop(client);
        });
    }
}
