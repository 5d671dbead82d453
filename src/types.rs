//! Shared types and enums used across nbrun.
//! Includes `OutputMode` (where an executed notebook is written) and
//! `ErrorPolicy` (what a failing cell does to the rest of the run).
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Where the executed notebook is written.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// `name.ipynb` is written to `name-output.ipynb` next to it.
    #[default]
    Suffixed,
    /// The input file is overwritten.
    InPlace,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputMode::Suffixed => "suffixed",
            OutputMode::InPlace => "in-place",
        };
        write!(f, "{}", s)
    }
}

/// What happens when a cell replies with an error.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Stop at the first failing cell and raise its error.
    #[default]
    Abort,
    /// Record the error output and keep executing the remaining cells.
    Continue,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::Abort => write!(f, "abort"),
            ErrorPolicy::Continue => write!(f, "continue"),
        }
    }
}
