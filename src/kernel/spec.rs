//! Kernelspec discovery: map a kernel name such as `python3` to the command
//! line that starts it.
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;
use tracing::debug;

use crate::error::{KernelError, Result};

/// Contents of a `kernel.json`, plus the directory it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KernelSpec {
    pub argv: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(skip)]
    pub resource_dir: Option<PathBuf>,
}

impl KernelSpec {
    /// ipykernel started from whatever `python3` is on `PATH`.
    pub fn native_python() -> Self {
        let python = if cfg!(windows) { "python" } else { "python3" };
        Self {
            argv: vec![
                python.into(),
                "-m".into(),
                "ipykernel_launcher".into(),
                "-f".into(),
                "{connection_file}".into(),
            ],
            display_name: "Python 3 (ipykernel)".into(),
            language: "python".into(),
            env: HashMap::new(),
            resource_dir: None,
        }
    }

    /// Command line with `{connection_file}` and `{resource_dir}` filled in.
    pub fn command_line(&self, connection_file: &Path) -> Vec<String> {
        let resource_dir = self
            .resource_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{connection_file}", &connection_file.to_string_lossy())
                    .replace("{resource_dir}", &resource_dir)
            })
            .collect()
    }
}

/// Resolve `name` against the Jupyter data directories.
pub fn find_kernel_spec(name: &str) -> Result<KernelSpec> {
    find_kernel_spec_in(name, &kernel_dirs())
}

pub fn find_kernel_spec_in(name: &str, dirs: &[PathBuf]) -> Result<KernelSpec> {
    for dir in dirs {
        let resource_dir = dir.join(name);
        let file = resource_dir.join("kernel.json");
        if !file.is_file() {
            continue;
        }
        debug!("Using kernelspec {:?}", file);
        let text = fs::read_to_string(&file).map_err(|e| KernelError::Launch {
            name: name.to_string(),
            reason: format!("cannot read {}: {}", file.display(), e),
        })?;
        let mut spec: KernelSpec = serde_json::from_str(&text).map_err(|e| KernelError::Launch {
            name: name.to_string(),
            reason: format!("invalid {}: {}", file.display(), e),
        })?;
        if spec.argv.is_empty() {
            return Err(KernelError::Launch {
                name: name.to_string(),
                reason: format!("{} has an empty argv", file.display()),
            }
            .into());
        }
        spec.resource_dir = Some(resource_dir);
        return Ok(spec);
    }

    if name == "python3" {
        debug!("No kernelspec for python3 installed, falling back to ipykernel");
        return Ok(KernelSpec::native_python());
    }
    Err(KernelError::NoSuchKernel(name.to_string()).into())
}

/// `kernels/` directories in Jupyter's search order: `JUPYTER_PATH`, the user
/// data dir, the active environment, then system locations.
pub fn kernel_dirs() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();

    if let Some(paths) = env::var_os("JUPYTER_PATH") {
        roots.extend(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
    }
    if let Some(dir) = user_data_dir() {
        roots.push(dir);
    }
    for var in ["CONDA_PREFIX", "VIRTUAL_ENV"] {
        if let Some(prefix) = env::var_os(var) {
            roots.push(PathBuf::from(prefix).join("share").join("jupyter"));
        }
    }
    if cfg!(windows) {
        if let Some(data) = env::var_os("PROGRAMDATA") {
            roots.push(PathBuf::from(data).join("jupyter"));
        }
    } else {
        roots.push(PathBuf::from("/usr/local/share/jupyter"));
        roots.push(PathBuf::from("/usr/share/jupyter"));
    }

    let mut dirs: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        let kernels = root.join("kernels");
        if !dirs.contains(&kernels) {
            dirs.push(kernels);
        }
    }
    dirs
}

fn user_data_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os("JUPYTER_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    let base = BaseDirs::new()?;
    if cfg!(target_os = "macos") {
        Some(base.home_dir().join("Library").join("Jupyter"))
    } else {
        Some(base.data_dir().join("jupyter"))
    }
}
