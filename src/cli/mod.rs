//! Command Line Interface (CLI) layer for nbrun.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) that executes each notebook in
//! turn and reports failures. It wires user-provided options to the
//! library functionality exposed via `nbrun::api`.
//!
//! If you are embedding nbrun into another application, prefer using
//! the high-level `nbrun::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
