use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::spec::KernelSpec;
use crate::error::{KernelError, Result};

/// A running kernel process. Killed when dropped.
pub struct KernelProcess {
    name: String,
    child: Child,
}

impl KernelProcess {
    /// Start the kernel described by `spec`. Must be called inside a tokio runtime.
    pub fn spawn(name: &str, spec: &KernelSpec, connection_file: &Path, working_dir: Option<&Path>) -> Result<Self> {
        let argv = spec.command_line(connection_file);
        let (program, args) = argv.split_first().ok_or_else(|| KernelError::Launch {
            name: name.to_string(),
            reason: "empty command line".into(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        debug!("Launching kernel {}: {:?} (cwd {:?})", name, argv, working_dir);
        let child = cmd.spawn().map_err(|e| KernelError::Launch {
            name: name.to_string(),
            reason: format!("{}: {}", program, e),
        })?;

        Ok(Self {
            name: name.to_string(),
            child,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_exited(&mut self) -> bool {
        !matches!(self.child.try_wait(), Ok(None))
    }

    /// Give the kernel `grace` to exit on its own, then kill it.
    pub async fn wait_or_kill(&mut self, grace: Duration) {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Kernel {} exited with {}", self.name, status),
            Ok(Err(e)) => warn!("Failed waiting for kernel {}: {}", self.name, e),
            Err(_) => {
                warn!("Kernel {} did not exit within {:?}, killing it", self.name, grace);
                if let Err(e) = self.child.kill().await {
                    warn!("Failed to kill kernel {}: {}", self.name, e);
                }
            }
        }
    }
}
