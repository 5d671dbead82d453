use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ErrorPolicy;

/// Per-cell timeout used unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
/// How long a freshly launched kernel has to answer `kernel_info_request`.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_KERNEL_NAME: &str = "python3";

/// Options handed to the executor for a single notebook run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-cell timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    pub startup_timeout: Duration,
    pub kernel_name: String,
    /// Directory the kernel runs in so relative paths inside the notebook resolve
    pub working_dir: Option<PathBuf>,
    pub error_policy: ErrorPolicy,
    /// Record `metadata.execution` timestamps on executed cells
    pub record_timing: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            kernel_name: DEFAULT_KERNEL_NAME.to_string(),
            working_dir: None,
            error_policy: ErrorPolicy::Abort,
            record_timing: true,
        }
    }
}

impl ExecutionConfig {
    /// Copy of this configuration bound to one notebook's working directory.
    pub fn for_working_dir(&self, dir: &Path) -> Self {
        Self {
            working_dir: Some(dir.to_path_buf()),
            ..self.clone()
        }
    }

    /// Seconds on the command line; 0 disables the timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }
}
